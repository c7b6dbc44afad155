//! Symptom Surveillance Integrity
//!
//! Entry types for symptom reports, the keyword table the categorizer
//! matches against, and the tunable outbreak thresholds.

use chrono::{DateTime, Utc};
use clinic_integrity::{Appointment, NewBooking, Patient};
use serde::{Deserialize, Serialize};
use tujali_shared::{string_enum, HealthError, HealthResult, ValidationErrorCode, ValidationResult};

string_enum! {
    /// Symptom categories in tie-breaking order
    pub enum SymptomCategory {
        Respiratory => "respiratory",
        Fever => "fever",
        Gastrointestinal => "gastrointestinal",
        Pain => "pain",
        Fatigue => "fatigue",
        Neurological => "neurological",
        Skin => "skin",
        /// Nothing matched
        Other => "other",
    }
}

impl SymptomCategory {
    /// Position in declaration order
    pub fn rank(&self) -> usize {
        SymptomCategory::ALL
            .iter()
            .position(|c| c == self)
            .unwrap_or(SymptomCategory::ALL.len())
    }
}

string_enum! {
    pub enum Severity {
        Mild => "mild",
        Moderate => "moderate",
        Severe => "severe",
        Unknown => "unknown",
    }
}

impl Severity {
    /// Weight used for the dashboard's average severity
    pub fn score(&self) -> f64 {
        match self {
            Severity::Severe => 1.0,
            Severity::Moderate => 0.5,
            Severity::Mild | Severity::Unknown => 0.0,
        }
    }
}

string_enum! {
    pub enum ReportChannel {
        Ussd => "ussd",
        Web => "web",
        WalkIn => "walk_in",
    }
}

/// Symptom report entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SymptomReport {
    pub id: i64,
    /// Walk-in reports have no patient record
    pub patient_id: Option<i64>,
    /// Free text as captured; may carry `severity:` / `location:` lines
    pub content: String,
    pub severity: Severity,
    pub location: Option<String>,
    pub channel: ReportChannel,
    pub reported_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewSymptomReport {
    pub patient_id: Option<i64>,
    pub content: String,
    pub severity: Severity,
    pub location: Option<String>,
    pub channel: ReportChannel,
    pub reported_at: DateTime<Utc>,
}

pub fn validate_new_report(report: &NewSymptomReport) -> ValidationResult {
    let mut result = ValidationResult::new();
    if report.content.trim().is_empty() {
        result.add_error("content", "Symptom description is required", ValidationErrorCode::Required);
    }
    if report.content.chars().count() > 2000 {
        result.add_error("content", "Symptom description cannot exceed 2000 characters", ValidationErrorCode::TooLong);
    }
    result
}

// ============================================================================
// Keyword table
// ============================================================================

/// Keywords for one category
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CategoryKeywords {
    pub category: SymptomCategory,
    pub keywords: Vec<String>,
}

/// Keyword lists per category, kept in declaration order
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct KeywordTable {
    entries: Vec<CategoryKeywords>,
}

impl KeywordTable {
    /// Build a table from configured entries.
    ///
    /// Entries are reordered into declaration order and keywords lowercased.
    /// `other` and duplicate categories are rejected.
    pub fn new(mut entries: Vec<CategoryKeywords>) -> HealthResult<Self> {
        let mut result = ValidationResult::new();
        for (i, entry) in entries.iter().enumerate() {
            if entry.category == SymptomCategory::Other {
                result.add_error("category", "'other' cannot have keywords", ValidationErrorCode::InvalidReference);
            }
            if entries[..i].iter().any(|e| e.category == entry.category) {
                result.add_error(
                    "category",
                    &format!("Duplicate keyword list for '{}'", entry.category),
                    ValidationErrorCode::DuplicateValue,
                );
            }
        }
        result.into_result()?;

        entries.sort_by_key(|e| e.category.rank());
        for entry in &mut entries {
            entry.keywords = entry
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CategoryKeywords] {
        &self.entries
    }

    pub fn keywords_for(&self, category: SymptomCategory) -> &[String] {
        self.entries
            .iter()
            .find(|e| e.category == category)
            .map(|e| e.keywords.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        fn words(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        let entries = vec![
            CategoryKeywords {
                category: SymptomCategory::Respiratory,
                keywords: words(&[
                    "cough", "breath", "wheeze", "sneeze", "congest", "phlegm", "mucus", "nasal",
                    "runny nose", "stuffy nose", "shortness of breath", "sob", "difficulty breathing",
                    "chest tightness", "wheezing", "sore throat", "throat pain", "hoarse",
                    "laryngitis", "pneumonia", "bronchitis",
                ]),
            },
            CategoryKeywords {
                category: SymptomCategory::Fever,
                keywords: words(&[
                    "fever", "temperature", "chills", "sweat", "hot", "warm", "high temp",
                    "feverish", "running a temperature", "pyrexia", "high fever", "low-grade fever",
                ]),
            },
            CategoryKeywords {
                category: SymptomCategory::Gastrointestinal,
                keywords: words(&[
                    "nausea", "vomit", "diarrhea", "constipat", "stomach", "belly", "abdomen",
                    "indigestion", "heartburn", "bloat", "cramp", "upset stomach", "stomachache",
                    "stomach pain", "abdominal pain", "diarrhoea", "loose stool", "vomiting",
                ]),
            },
            CategoryKeywords {
                category: SymptomCategory::Pain,
                keywords: words(&[
                    "headache", "migraine", "pain", "ache", "sore", "hurt", "throb", "sting",
                    "cramp", "spasm", "tender", "tenderness", "body ache", "muscle pain",
                    "joint pain", "back pain", "neck pain", "earache", "toothache",
                ]),
            },
            CategoryKeywords {
                category: SymptomCategory::Fatigue,
                keywords: words(&[
                    "tire", "exhaust", "fatigue", "weak", "letharg", "drain", "run down",
                    "low energy", "weary", "sleepy", "drowsy", "lack of energy",
                ]),
            },
            CategoryKeywords {
                category: SymptomCategory::Neurological,
                keywords: words(&[
                    "dizzy", "lightheaded", "faint", "numb", "tingl", "seizure", "confus",
                    "memory loss", "forget", "head spin", "vertigo", "vision problem",
                    "blurred vision", "double vision", "loss of balance", "coordination",
                ]),
            },
            CategoryKeywords {
                category: SymptomCategory::Skin,
                keywords: words(&[
                    "rash", "itch", "hive", "bump", "lesion", "sore", "blister", "dry skin",
                    "peeling", "redness", "swelling", "inflammation", "skin irritation", "hives",
                    "urticaria", "dermatitis", "eczema",
                ]),
            },
        ];
        Self { entries }
    }
}

// ============================================================================
// Outbreak thresholds
// ============================================================================

/// Tunable outbreak heuristic parameters, not epidemiological constants
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutbreakThresholds {
    /// Rolling window length ending at the evaluation time
    pub window_days: i64,
    /// Reports needed in the window to raise a signal
    pub min_count: usize,
    /// Signals with more reports than this are `High`
    pub high_above: usize,
}

impl Default for OutbreakThresholds {
    fn default() -> Self {
        Self {
            window_days: 7,
            min_count: 3,
            high_above: 5,
        }
    }
}

impl OutbreakThresholds {
    pub fn validate(&self) -> HealthResult<()> {
        if self.window_days < 1 {
            return Err(HealthError::validation("Outbreak window must be at least one day"));
        }
        if self.min_count == 0 {
            return Err(HealthError::validation("Outbreak minimum count must be positive"));
        }
        if self.high_above < self.min_count {
            return Err(HealthError::validation(
                "High outbreak threshold cannot be below the minimum count",
            ));
        }
        Ok(())
    }
}

string_enum! {
    /// Signal label as providers read it
    pub enum OutbreakLevel {
        Medium => "Medium",
        High => "High",
    }
}

// ============================================================================
// Walk-in intake
// ============================================================================

string_enum! {
    /// How long the complaint has lasted
    pub enum SymptomDuration {
        LessThanDay => "less_than_day",
        OneToThreeDays => "1-3_days",
        FourToSevenDays => "4-7_days",
        OneToTwoWeeks => "1-2_weeks",
        MoreThanTwoWeeks => "more_than_2_weeks",
    }
}

impl SymptomDuration {
    pub fn label(&self) -> &'static str {
        match self {
            SymptomDuration::LessThanDay => "Less than a day",
            SymptomDuration::OneToThreeDays => "1-3 days",
            SymptomDuration::FourToSevenDays => "4-7 days",
            SymptomDuration::OneToTwoWeeks => "1-2 weeks",
            SymptomDuration::MoreThanTwoWeeks => "More than 2 weeks",
        }
    }
}

string_enum! {
    /// Where on the body the complaint is felt
    pub enum BodySite {
        Head => "head",
        Chest => "chest",
        Abdomen => "abdomen",
        Back => "back",
        ArmsLegs => "arms_legs",
        Pelvic => "pelvic",
        AllOver => "all_over",
    }
}

impl BodySite {
    pub fn label(&self) -> &'static str {
        match self {
            BodySite::Head => "Head",
            BodySite::Chest => "Chest",
            BodySite::Abdomen => "Abdomen",
            BodySite::Back => "Back",
            BodySite::ArmsLegs => "Arms/Legs",
            BodySite::Pelvic => "Pelvic",
            BodySite::AllOver => "All over",
        }
    }
}

/// A front-desk visit: the patient (by phone), an appointment, the intake
/// report and the journey entry. The report's `patient_id` is replaced by
/// the resolved patient's id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewWalkIn {
    pub booking: NewBooking,
    pub report: NewSymptomReport,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WalkInRecord {
    pub patient: Patient,
    pub patient_created: bool,
    pub appointment: Appointment,
    pub report: SymptomReport,
}

// ============================================================================
// Store interface
// ============================================================================

pub trait SymptomStore: Send + Sync {
    fn insert_report(&self, report: &NewSymptomReport) -> HealthResult<SymptomReport>;
    /// Oldest first; `since` bounds `reported_at` inclusively
    fn list_reports(&self, since: Option<DateTime<Utc>>) -> HealthResult<Vec<SymptomReport>>;
    /// Oldest first
    fn list_patient_reports(&self, patient_id: i64) -> HealthResult<Vec<SymptomReport>>;
}

pub trait IntakeStore: Send + Sync {
    /// Write every record of a walk-in in one transaction
    fn insert_walk_in(&self, walk_in: &NewWalkIn) -> HealthResult<WalkInRecord>;
}
