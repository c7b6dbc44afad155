//! Provider/patient messaging.

use crate::journey::track_interaction;
use chrono::{DateTime, Utc};
use clinic_integrity::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use tujali_shared::{HealthError, HealthResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SendMessageInput {
    pub provider_id: i64,
    pub patient_id: i64,
    pub content: String,
    pub sender: SenderType,
}

pub fn send_message<S>(store: &S, input: SendMessageInput) -> HealthResult<Message>
where
    S: ClinicStore + ?Sized,
{
    let patient = store
        .get_patient(input.patient_id)?
        .ok_or_else(|| HealthError::not_found("Patient", input.patient_id))?;
    store
        .get_provider(input.provider_id)?
        .ok_or_else(|| HealthError::not_found("Provider", input.provider_id))?;

    let new = NewMessage {
        provider_id: input.provider_id,
        patient_id: patient.id,
        content: input.content.trim().to_string(),
        sender: input.sender,
        created_at: Utc::now(),
    };
    validate_new_message(&new).into_result()?;

    let message = store.insert_message(&new)?;
    debug!(message_id = message.id, sender = %message.sender, "message stored");

    let description = match message.sender {
        SenderType::Patient => "Sent a message to provider",
        SenderType::Provider => "Received a message from provider",
    };
    track_interaction(store, NewInteraction::now(patient.id, InteractionKind::Message, description));
    Ok(message)
}

/// Full conversation, oldest first
pub fn conversation<S>(store: &S, provider_id: i64, patient_id: i64) -> HealthResult<Vec<Message>>
where
    S: MessageStore + ?Sized,
{
    store.list_conversation(provider_id, patient_id)
}

/// Mark the patient's messages in a conversation as read by the provider
pub fn mark_conversation_read<S>(store: &S, provider_id: i64, patient_id: i64) -> HealthResult<usize>
where
    S: MessageStore + ?Sized,
{
    store.mark_read(provider_id, patient_id, SenderType::Patient)
}

/// One row of a provider's inbox
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub patient_id: i64,
    pub patient_name: String,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    /// Unread messages sent by the patient
    pub unread_count: usize,
}

/// Provider inbox, most recently active conversation first
pub fn conversation_list<S>(store: &S, provider_id: i64) -> HealthResult<Vec<ConversationSummary>>
where
    S: ClinicStore + ?Sized,
{
    // Newest first, so the first message seen per patient is the latest
    let messages = store.list_provider_messages(provider_id)?;

    let mut order: Vec<i64> = Vec::new();
    let mut summaries: HashMap<i64, ConversationSummary> = HashMap::new();
    for message in messages {
        let unread = usize::from(message.sender == SenderType::Patient && !message.is_read);
        match summaries.get_mut(&message.patient_id) {
            Some(summary) => summary.unread_count += unread,
            None => {
                let patient_name = store
                    .get_patient(message.patient_id)?
                    .map(|p| p.name)
                    .unwrap_or_else(|| "Unknown patient".to_string());
                order.push(message.patient_id);
                summaries.insert(
                    message.patient_id,
                    ConversationSummary {
                        patient_id: message.patient_id,
                        patient_name,
                        last_message: message.content,
                        last_message_at: message.created_at,
                        unread_count: unread,
                    },
                );
            }
        }
    }

    Ok(order.into_iter().filter_map(|id| summaries.remove(&id)).collect())
}
