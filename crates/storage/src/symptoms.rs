//! Symptom report store implementation.

use crate::clinic::write_booking;
use crate::database::{text_enum, Database, DatabaseError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use symptoms_integrity::*;
use tujali_shared::HealthResult;

const REPORT_COLUMNS: &str = "id, patient_id, content, severity, location, channel, reported_at";

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<SymptomReport> {
    Ok(SymptomReport {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        content: row.get(2)?,
        severity: text_enum(row, 3)?,
        location: row.get(4)?,
        channel: text_enum(row, 5)?,
        reported_at: row.get(6)?,
    })
}

fn insert_report_row(conn: &Connection, report: &NewSymptomReport) -> Result<SymptomReport, DatabaseError> {
    conn.execute(
        "INSERT INTO symptom_reports (patient_id, content, severity, location, channel, reported_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            report.patient_id,
            report.content,
            report.severity.as_str(),
            report.location,
            report.channel.as_str(),
            report.reported_at,
        ],
    )?;
    let id = conn.last_insert_rowid();
    Ok(conn.query_row(
        &format!("SELECT {} FROM symptom_reports WHERE id = ?1", REPORT_COLUMNS),
        [id],
        report_from_row,
    )?)
}

impl SymptomStore for Database {
    fn insert_report(&self, report: &NewSymptomReport) -> HealthResult<SymptomReport> {
        self.write(|tx| insert_report_row(tx, report))
    }

    fn list_reports(&self, since: Option<DateTime<Utc>>) -> HealthResult<Vec<SymptomReport>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM symptom_reports WHERE (?1 IS NULL OR reported_at >= ?1) ORDER BY reported_at, id",
                REPORT_COLUMNS
            ))?;
            let rows = stmt.query_map(params![since], report_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn list_patient_reports(&self, patient_id: i64) -> HealthResult<Vec<SymptomReport>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM symptom_reports WHERE patient_id = ?1 ORDER BY reported_at, id",
                REPORT_COLUMNS
            ))?;
            let rows = stmt.query_map([patient_id], report_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }
}

impl IntakeStore for Database {
    fn insert_walk_in(&self, walk_in: &NewWalkIn) -> HealthResult<WalkInRecord> {
        self.write(|tx| {
            let booked = write_booking(tx, &walk_in.booking)?;
            let mut report = walk_in.report.clone();
            report.patient_id = Some(booked.patient.id);
            let report = insert_report_row(tx, &report)?;
            Ok(WalkInRecord {
                patient: booked.patient,
                patient_created: booked.patient_created,
                appointment: booked.appointment,
                report,
            })
        })
    }
}
