//! Schema creation and version management.

use crate::database::{Database, DatabaseError, DatabaseResult};
use rusqlite::Connection;

pub const SCHEMA_VERSION: i32 = 2;

pub fn run_migrations(db: &Database) -> DatabaseResult<()> {
    db.with_connection_mut(|conn| {
        create_migrations_table(conn)?;

        let current_version = get_schema_version(conn)?;
        if current_version > SCHEMA_VERSION {
            return Err(DatabaseError::Migration(format!(
                "database schema v{} is newer than this build (v{})",
                current_version, SCHEMA_VERSION
            )));
        }

        if current_version < 1 {
            let tx = conn.transaction()?;
            migrate_v1(&tx)?;
            set_schema_version(&tx, 1)?;
            tx.commit()?;
            tracing::info!(version = 1, "applied schema migration");
        }

        if current_version < 2 {
            let tx = conn.transaction()?;
            migrate_v2(&tx)?;
            set_schema_version(&tx, 2)?;
            tx.commit()?;
            tracing::info!(version = 2, "applied schema migration");
        }

        Ok(())
    })
}

fn create_migrations_table(conn: &Connection) -> DatabaseResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

fn get_schema_version(conn: &Connection) -> DatabaseResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> DatabaseResult<()> {
    conn.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: initial schema
fn migrate_v1(conn: &Connection) -> DatabaseResult<()> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS providers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            specialization TEXT NOT NULL,
            license_number TEXT NOT NULL,
            languages TEXT NOT NULL DEFAULT '[]',
            location TEXT,
            consultation_fee REAL NOT NULL DEFAULT 500,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS patients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            phone_number TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            age INTEGER,
            gender TEXT,
            location TEXT,
            language TEXT NOT NULL DEFAULT 'en',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS appointments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_id INTEGER NOT NULL REFERENCES patients(id),
            provider_id INTEGER NOT NULL REFERENCES providers(id),
            date TEXT NOT NULL,
            time TEXT NOT NULL,
            visit_type TEXT NOT NULL,
            status TEXT NOT NULL,
            price REAL NOT NULL DEFAULT 0,
            payment_status TEXT NOT NULL,
            source TEXT NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id, date);
        CREATE INDEX IF NOT EXISTS idx_appointments_provider ON appointments(provider_id, date);

        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            provider_id INTEGER NOT NULL REFERENCES providers(id),
            patient_id INTEGER NOT NULL REFERENCES patients(id),
            content TEXT NOT NULL,
            sender TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(provider_id, patient_id);

        CREATE TABLE IF NOT EXISTS prescriptions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            provider_id INTEGER NOT NULL REFERENCES providers(id),
            patient_id INTEGER NOT NULL REFERENCES patients(id),
            medications TEXT NOT NULL,
            instructions TEXT,
            collection_method TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS lab_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_id INTEGER NOT NULL REFERENCES patients(id),
            provider_id INTEGER NOT NULL REFERENCES providers(id),
            test_name TEXT NOT NULL,
            test_type TEXT NOT NULL,
            fee REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            results TEXT,
            reference_range TEXT,
            is_abnormal INTEGER NOT NULL DEFAULT 0,
            urgency TEXT NOT NULL,
            notes TEXT,
            test_date TEXT NOT NULL,
            result_date TEXT
        );

        CREATE TABLE IF NOT EXISTS payments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            appointment_id INTEGER NOT NULL REFERENCES appointments(id),
            amount REAL NOT NULL,
            phone_number TEXT,
            method TEXT NOT NULL,
            currency TEXT NOT NULL DEFAULT 'KES',
            status TEXT NOT NULL,
            reference TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            paid_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_payments_appointment ON payments(appointment_id);

        CREATE TABLE IF NOT EXISTS payment_refunds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payment_id INTEGER NOT NULL REFERENCES payments(id),
            amount REAL NOT NULL,
            reason TEXT NOT NULL,
            status TEXT NOT NULL,
            processed_by INTEGER REFERENCES users(id),
            processed_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS symptom_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_id INTEGER REFERENCES patients(id),
            content TEXT NOT NULL,
            severity TEXT NOT NULL,
            location TEXT,
            channel TEXT NOT NULL,
            reported_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_symptom_reports_time ON symptom_reports(reported_at);

        CREATE TABLE IF NOT EXISTS user_interactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_id INTEGER NOT NULL REFERENCES patients(id),
            interaction_type TEXT NOT NULL,
            description TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_interactions_patient ON user_interactions(patient_id, created_at);
        ",
    )?;
    Ok(())
}

/// Migration v2: receipt download tracking
fn migrate_v2(conn: &Connection) -> DatabaseResult<()> {
    conn.execute_batch("ALTER TABLE payments ADD COLUMN receipt_sent_at TEXT;")?;
    Ok(())
}
