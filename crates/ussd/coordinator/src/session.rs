//! In-memory USSD sessions keyed by phone number and carrier session id.
//!
//! The accumulated input is authoritative, so a lost session only costs
//! the bookkeeping below; the store never decides what screen comes next.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use ussd_integrity::UssdRequest;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UssdSession {
    pub session_id: String,
    pub phone_number: String,
    pub service_code: String,
    /// Raw accumulated input from the latest request
    pub text: String,
    /// Accepted selections
    pub path: Vec<String>,
    /// Node the latest screen was rendered from
    pub node_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

type SessionKey = (String, String);

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<SessionKey, UssdSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(phone_number: &str, session_id: &str) -> SessionKey {
        (phone_number.trim().to_string(), session_id.trim().to_string())
    }

    /// Create or update the session for a request
    pub fn record(&self, request: &UssdRequest, path: Vec<String>, node_id: &str, now: DateTime<Utc>) -> UssdSession {
        let key = Self::key(&request.phone_number, &request.session_id);
        let mut entry = self.sessions.entry(key).or_insert_with(|| UssdSession {
            session_id: request.session_id.trim().to_string(),
            phone_number: request.phone_number.trim().to_string(),
            service_code: request.service_code.trim().to_string(),
            text: String::new(),
            path: Vec::new(),
            node_id: String::new(),
            first_seen: now,
            last_seen: now,
        });
        entry.text = request.text.clone();
        entry.path = path;
        entry.node_id = node_id.to_string();
        entry.last_seen = now;
        entry.value().clone()
    }

    pub fn get(&self, phone_number: &str, session_id: &str) -> Option<UssdSession> {
        self.sessions
            .get(&Self::key(phone_number, session_id))
            .map(|s| s.value().clone())
    }

    /// Drop a session once its terminal action has run
    pub fn end(&self, phone_number: &str, session_id: &str) -> Option<UssdSession> {
        self.sessions
            .remove(&Self::key(phone_number, session_id))
            .map(|(_, session)| session)
    }

    /// Remove sessions idle for longer than `ttl`; returns how many went
    pub fn purge_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| now - session.last_seen <= ttl);
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            debug!(purged, "expired USSD sessions purged");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
