//! Outbreak signals: clusters of the same symptom within a rolling window.
//!
//! This is a reporting heuristic with tunable thresholds. It flags a key
//! (category plus the first word of the symptom) once enough reports fall
//! inside the window.

use crate::reports::AnalyzedSymptom;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use symptoms_integrity::*;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct OutbreakSignal {
    pub symptom: String,
    pub category: SymptomCategory,
    pub count: usize,
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
    pub severity: OutbreakLevel,
}

/// Signals for reports inside the window ending at `now`, largest and most
/// recent first
pub fn detect_outbreaks(
    symptoms: &[AnalyzedSymptom],
    now: DateTime<Utc>,
    thresholds: &OutbreakThresholds,
) -> Vec<OutbreakSignal> {
    let window_start = now - Duration::days(thresholds.window_days);

    let mut buckets: HashMap<(SymptomCategory, &str), (usize, NaiveDate, NaiveDate)> = HashMap::new();
    for symptom in symptoms {
        if symptom.reported_at < window_start || symptom.reported_at > now {
            continue;
        }
        let day = symptom.reported_at.date_naive();
        buckets
            .entry((symptom.category, symptom.normalized_name.as_str()))
            .and_modify(|(count, first, last)| {
                *count += 1;
                *first = (*first).min(day);
                *last = (*last).max(day);
            })
            .or_insert((1, day, day));
    }

    let mut signals: Vec<OutbreakSignal> = buckets
        .into_iter()
        .filter(|(_, (count, _, _))| *count >= thresholds.min_count)
        .map(|((category, symptom), (count, first_seen, last_seen))| OutbreakSignal {
            symptom: symptom.to_string(),
            category,
            count,
            first_seen,
            last_seen,
            severity: if count > thresholds.high_above {
                OutbreakLevel::High
            } else {
                OutbreakLevel::Medium
            },
        })
        .collect();

    signals.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(b.last_seen.cmp(&a.last_seen))
            .then_with(|| a.symptom.cmp(&b.symptom))
    });
    signals
}
