//! Keyword categorization and report content parsing.

use serde::{Deserialize, Serialize};
use symptoms_integrity::*;
use tujali_shared::{HealthError, HealthResult};

/// Matches needed for full confidence
pub const DEFAULT_CONFIDENCE_DIVISOR: f64 = 3.0;

/// Outcome of categorizing one symptom text
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Categorization {
    pub category: SymptomCategory,
    /// In `[0, 1]`
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
}

impl Categorization {
    fn other() -> Self {
        Self {
            category: SymptomCategory::Other,
            confidence: 0.0,
            matched_keywords: Vec::new(),
        }
    }
}

/// Keyword categorizer over a [`KeywordTable`]
#[derive(Clone, Debug)]
pub struct Categorizer {
    table: KeywordTable,
    confidence_divisor: f64,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self {
            table: KeywordTable::default(),
            confidence_divisor: DEFAULT_CONFIDENCE_DIVISOR,
        }
    }
}

impl Categorizer {
    pub fn new(table: KeywordTable, confidence_divisor: f64) -> HealthResult<Self> {
        if !confidence_divisor.is_finite() || confidence_divisor <= 0.0 {
            return Err(HealthError::validation("Confidence divisor must be a positive number"));
        }
        Ok(Self {
            table,
            confidence_divisor,
        })
    }

    pub fn table(&self) -> &KeywordTable {
        &self.table
    }

    /// Categorize free text.
    ///
    /// The category with the most matching keywords wins; ties go to the
    /// earlier category. A single-word keyword matches when it occurs inside
    /// any word, a multi-word keyword when it occurs anywhere in the text.
    pub fn categorize(&self, text: &str) -> Categorization {
        let text = text.to_lowercase();
        let words: Vec<&str> = text.split_whitespace().collect();

        let mut best = Categorization::other();
        for entry in self.table.entries() {
            let matched: Vec<String> = entry
                .keywords
                .iter()
                .filter(|keyword| {
                    if keyword.contains(char::is_whitespace) {
                        text.contains(keyword.as_str())
                    } else {
                        words.iter().any(|w| w.contains(keyword.as_str()))
                    }
                })
                .cloned()
                .collect();

            if matched.len() > best.matched_keywords.len() {
                best = Categorization {
                    category: entry.category,
                    confidence: (matched.len() as f64 / self.confidence_divisor).min(1.0),
                    matched_keywords: matched,
                };
            }
        }
        best
    }
}

// ============================================================================
// Content parsing
// ============================================================================

/// Structured view of a report's free-text content
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ParsedContent {
    /// First non-empty line, lowercased, without a `chief complaint:` prefix
    pub symptom_text: String,
    /// From a `severity:` line, `None` when absent
    pub severity: Option<Severity>,
    /// From a `location:` line
    pub location: Option<String>,
}

const COMPLAINT_PREFIX: &str = "chief complaint:";

/// Parse report content. Returns `None` when there is no symptom text.
pub fn parse_report_content(content: &str) -> Option<ParsedContent> {
    let lowered = content.to_lowercase();
    let lines: Vec<&str> = lowered.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let first = lines.first()?;
    let symptom_text = first.replace(COMPLAINT_PREFIX, "").trim().to_string();
    if symptom_text.is_empty() {
        return None;
    }

    let mut severity = None;
    let mut location = None;
    for line in &lines {
        if let Some((_, value)) = line.rsplit_once("severity:") {
            severity = Some(severity_from_label(value));
        } else if let Some((_, value)) = line.rsplit_once("location:") {
            let value = value.trim();
            if !value.is_empty() {
                location = Some(value.to_string());
            }
        }
    }

    Some(ParsedContent {
        symptom_text,
        severity,
        location,
    })
}

fn severity_from_label(label: &str) -> Severity {
    let label = label.to_lowercase();
    if label.contains("mild") {
        Severity::Mild
    } else if label.contains("moderate") {
        Severity::Moderate
    } else if label.contains("severe") {
        Severity::Severe
    } else {
        Severity::Unknown
    }
}

/// Guess a severity from descriptive words in the symptom text
pub fn infer_severity(text: &str) -> Severity {
    let text = text.to_lowercase();
    if text.contains("severe") || text.contains("unbearable") {
        Severity::Severe
    } else if text.contains("moderate") {
        Severity::Moderate
    } else if text.contains("mild") || text.contains("slight") {
        Severity::Mild
    } else {
        Severity::Unknown
    }
}
