//! Recording symptom reports and reading them back categorized.

use crate::categorize::{infer_severity, parse_report_content, Categorizer};
use chrono::{DateTime, Utc};
use clinic::track_interaction;
use clinic_integrity::{ClinicStore, InteractionKind, NewInteraction};
use serde::{Deserialize, Serialize};
use serde_json::json;
use symptoms_integrity::*;
use tracing::info;
use tujali_shared::{HealthError, HealthResult};

/// Location label for reports that name none
pub const UNSPECIFIED_LOCATION: &str = "Not specified";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportSymptomInput {
    pub patient_id: Option<i64>,
    pub content: String,
    /// Inferred from the content when absent
    pub severity: Option<Severity>,
    pub location: Option<String>,
    pub channel: ReportChannel,
}

/// A stored report together with how it was categorized
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LoggedSymptom {
    pub report: SymptomReport,
    pub category: SymptomCategory,
    pub confidence: f64,
}

/// Store a symptom report and record a `symptom` interaction for its patient
pub fn report_symptom<S>(store: &S, categorizer: &Categorizer, input: ReportSymptomInput) -> HealthResult<LoggedSymptom>
where
    S: ClinicStore + SymptomStore + ?Sized,
{
    if let Some(patient_id) = input.patient_id {
        store
            .get_patient(patient_id)?
            .ok_or_else(|| HealthError::not_found("Patient", patient_id))?;
    }

    let content = input.content.trim().to_string();
    let parsed = parse_report_content(&content);
    let severity = input
        .severity
        .or_else(|| parsed.as_ref().and_then(|p| p.severity))
        .unwrap_or_else(|| infer_severity(&content));
    let location = input
        .location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .or_else(|| parsed.as_ref().and_then(|p| p.location.clone()));

    let new = NewSymptomReport {
        patient_id: input.patient_id,
        content,
        severity,
        location,
        channel: input.channel,
        reported_at: Utc::now(),
    };
    validate_new_report(&new).into_result()?;

    let report = store.insert_report(&new)?;
    let symptom_text = parsed.map(|p| p.symptom_text).unwrap_or_else(|| report.content.to_lowercase());
    let categorization = categorizer.categorize(&symptom_text);
    info!(
        report_id = report.id,
        category = %categorization.category,
        severity = %report.severity,
        channel = %report.channel,
        "symptom reported"
    );

    if let Some(patient_id) = report.patient_id {
        track_interaction(
            store,
            NewInteraction::now(patient_id, InteractionKind::Symptom, format!("Reported symptom: {}", symptom_text))
                .with_metadata(json!({
                    "report_id": report.id,
                    "category": categorization.category,
                    "severity": report.severity,
                    "channel": report.channel,
                })),
        );
    }

    Ok(LoggedSymptom {
        report,
        category: categorization.category,
        confidence: categorization.confidence,
    })
}

/// One report as the dashboard sees it
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalyzedSymptom {
    pub report_id: i64,
    pub patient_id: Option<i64>,
    pub symptom: String,
    /// First word of the symptom text
    pub normalized_name: String,
    pub category: SymptomCategory,
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
    pub severity: Severity,
    pub location: String,
    pub channel: ReportChannel,
    pub reported_at: DateTime<Utc>,
}

/// Categorize a stored report. Reports without symptom text yield `None`.
///
/// The stored severity wins over a `severity:` line unless it is unknown.
pub fn analyze_report(categorizer: &Categorizer, report: &SymptomReport) -> Option<AnalyzedSymptom> {
    let parsed = parse_report_content(&report.content)?;
    let categorization = categorizer.categorize(&parsed.symptom_text);

    let severity = match report.severity {
        Severity::Unknown => parsed.severity.unwrap_or(Severity::Unknown),
        known => known,
    };
    let location = report
        .location
        .clone()
        .or(parsed.location)
        .unwrap_or_else(|| UNSPECIFIED_LOCATION.to_string());
    let normalized_name = parsed
        .symptom_text
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();

    Some(AnalyzedSymptom {
        report_id: report.id,
        patient_id: report.patient_id,
        symptom: parsed.symptom_text,
        normalized_name,
        category: categorization.category,
        confidence: categorization.confidence,
        matched_keywords: categorization.matched_keywords,
        severity,
        location,
        channel: report.channel,
        reported_at: report.reported_at,
    })
}

/// Every stored report since `since`, categorized, oldest first
pub fn analyzed_reports<S>(store: &S, categorizer: &Categorizer, since: Option<DateTime<Utc>>) -> HealthResult<Vec<AnalyzedSymptom>>
where
    S: SymptomStore + ?Sized,
{
    Ok(store
        .list_reports(since)?
        .iter()
        .filter_map(|r| analyze_report(categorizer, r))
        .collect())
}

pub fn patient_reports<S>(store: &S, patient_id: i64) -> HealthResult<Vec<SymptomReport>>
where
    S: SymptomStore + ?Sized,
{
    store.list_patient_reports(patient_id)
}
