//! Surveillance dashboard aggregation.

use crate::categorize::Categorizer;
use crate::outbreak::{detect_outbreaks, OutbreakSignal};
use crate::reports::{analyze_report, AnalyzedSymptom};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use symptoms_integrity::*;
use tujali_shared::HealthResult;

const TOP_SYMPTOMS: usize = 5;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CountEntry {
    pub label: String,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SymptomDashboard {
    pub total_symptoms: usize,
    pub unique_symptoms: usize,
    /// Every category, `other` included, zero when unseen
    pub category_counts: BTreeMap<String, usize>,
    pub severity_counts: BTreeMap<String, usize>,
    /// Most frequent first
    pub location_counts: Vec<CountEntry>,
    pub daily_counts: BTreeMap<NaiveDate, usize>,
    pub top_symptoms: Vec<CountEntry>,
    /// Mean of severe = 1, moderate = 0.5, anything else 0
    pub average_severity: f64,
    pub outbreak_signals: Vec<OutbreakSignal>,
    /// Newest first
    pub symptoms: Vec<AnalyzedSymptom>,
}

/// Aggregate already-analyzed symptoms
pub fn build_dashboard(
    mut symptoms: Vec<AnalyzedSymptom>,
    now: DateTime<Utc>,
    thresholds: &OutbreakThresholds,
) -> SymptomDashboard {
    let mut category_counts: BTreeMap<String, usize> =
        SymptomCategory::ALL.iter().map(|c| (c.to_string(), 0)).collect();
    let mut severity_counts: BTreeMap<String, usize> = Severity::ALL.iter().map(|s| (s.to_string(), 0)).collect();
    let mut locations: HashMap<&str, usize> = HashMap::new();
    let mut daily_counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut frequency: HashMap<&str, usize> = HashMap::new();
    let mut severity_total = 0.0;

    for symptom in &symptoms {
        *category_counts.entry(symptom.category.to_string()).or_default() += 1;
        *severity_counts.entry(symptom.severity.to_string()).or_default() += 1;
        *locations.entry(symptom.location.as_str()).or_default() += 1;
        *daily_counts.entry(symptom.reported_at.date_naive()).or_default() += 1;
        *frequency.entry(symptom.symptom.as_str()).or_default() += 1;
        severity_total += symptom.severity.score();
    }

    let unique_symptoms = frequency.len();
    let location_counts = ranked(locations, usize::MAX);
    let top_symptoms = ranked(frequency, TOP_SYMPTOMS);
    let average_severity = if symptoms.is_empty() {
        0.0
    } else {
        severity_total / symptoms.len() as f64
    };

    let outbreak_signals = detect_outbreaks(&symptoms, now, thresholds);
    symptoms.sort_by(|a, b| b.reported_at.cmp(&a.reported_at));

    SymptomDashboard {
        total_symptoms: symptoms.len(),
        unique_symptoms,
        category_counts,
        severity_counts,
        location_counts,
        daily_counts,
        top_symptoms,
        average_severity,
        outbreak_signals,
        symptoms,
    }
}

fn ranked(counts: HashMap<&str, usize>, limit: usize) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(label, count)| CountEntry {
            label: label.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    entries.truncate(limit);
    entries
}

/// Dashboard over every stored report
pub fn symptom_dashboard<S>(
    store: &S,
    categorizer: &Categorizer,
    thresholds: &OutbreakThresholds,
    now: DateTime<Utc>,
) -> HealthResult<SymptomDashboard>
where
    S: SymptomStore + ?Sized,
{
    let symptoms = store
        .list_reports(None)?
        .iter()
        .filter_map(|r| analyze_report(categorizer, r))
        .collect();
    Ok(build_dashboard(symptoms, now, thresholds))
}
