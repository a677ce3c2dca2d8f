// Reconciliation of optimistic placeholders against authoritative messages.
//
// When a batch of authoritative messages arrives (history fetch or real-time
// event), each pending placeholder must either be replaced by its
// server-confirmed counterpart or retained untouched. The merge is purely
// additive: nothing is ever silently dropped.
//
// This is deliberately a pure module. The store applies passes; this file
// only decides them.

use log::debug;
use std::collections::HashMap;

use crate::models::{Message, MessageKind, MessageState};

/// Maximum distance in seconds between a placeholder's timestamp and an
/// authoritative candidate's for the two to be considered the same message.
pub const MATCH_WINDOW_SECS: i64 = 120;

/// Decide whether `candidate` is the server-confirmed counterpart of
/// `placeholder`.
///
/// The correlation-id echo is checked first; when the backend echoes the
/// client reference there is nothing to guess. Otherwise the heuristic
/// rules apply in order: direction, time window, then a kind-specific
/// content rule.
pub fn is_counterpart(placeholder: &Message, candidate: &Message) -> bool {
    if let (Some(ours), Some(theirs)) = (&placeholder.client_id, &candidate.client_id) {
        if ours == theirs {
            return true;
        }
    }

    if placeholder.direction != candidate.direction {
        return false;
    }

    let distance = (candidate.timestamp - placeholder.timestamp).num_seconds().abs();
    if distance > MATCH_WINDOW_SECS {
        return false;
    }

    if placeholder.kind.is_media() {
        return candidate.kind == placeholder.kind;
    }

    match placeholder.kind {
        MessageKind::Template => {
            if candidate.kind == MessageKind::Template {
                return true;
            }
            // The backend may prepend header/footer text to a rendered
            // template, so containment is tolerated. An empty placeholder
            // body would match everything and never does.
            let trimmed = placeholder.text.trim();
            !trimmed.is_empty() && candidate.text.contains(trimmed)
        }
        _ => candidate.text.trim() == placeholder.text.trim(),
    }
}

/// Run one reconciliation pass: merge `incoming` authoritative messages into
/// `current`, replacing matched placeholders in their slot and appending the
/// rest, then restore the list invariants.
///
/// Placeholders are processed in list order and each candidate can be
/// consumed at most once, so two placeholders never claim the same
/// authoritative message. Unmatched placeholders are retained as-is until a
/// future pass matches them.
pub fn reconcile(current: &[Message], incoming: &[Message]) -> Vec<Message> {
    let mut consumed = vec![false; incoming.len()];
    let mut merged: Vec<Message> = Vec::with_capacity(current.len() + incoming.len());

    for message in current {
        if message.is_pending() {
            let matched = incoming
                .iter()
                .enumerate()
                .find(|&(i, candidate)| !consumed[i] && is_counterpart(message, candidate));

            if let Some((i, candidate)) = matched {
                consumed[i] = true;
                let mut confirmed = candidate.clone();
                confirmed.state = MessageState::Confirmed;
                // Keep the correlation visible even when the backend does
                // not echo it, so a duplicate delivery of the same record
                // still reconciles by id.
                if confirmed.client_id.is_none() {
                    confirmed.client_id = message.client_id.clone();
                }
                debug!(
                    "Reconciled placeholder {} with authoritative message {}",
                    message.id, confirmed.id
                );
                merged.push(confirmed);
                continue;
            }
        }
        merged.push(message.clone());
    }

    let mut appended = 0;
    for (i, candidate) in incoming.iter().enumerate() {
        if !consumed[i] {
            let mut message = candidate.clone();
            message.state = MessageState::Confirmed;
            merged.push(message);
            appended += 1;
        }
    }
    if appended > 0 {
        debug!("Appended {} new authoritative messages", appended);
    }

    dedup_and_sort(merged)
}

/// Restore the two list invariants: unique by id (last occurrence wins) and
/// ascending timestamp order.
///
/// The sort is stable, so records with equal timestamps keep their merge
/// order regardless of network arrival order or duplicate delivery.
pub fn dedup_and_sort(messages: Vec<Message>) -> Vec<Message> {
    let mut slot_by_id: HashMap<String, usize> = HashMap::with_capacity(messages.len());
    let mut kept: Vec<Message> = Vec::with_capacity(messages.len());

    for message in messages {
        match slot_by_id.get(&message.id) {
            Some(&slot) => kept[slot] = message,
            None => {
                slot_by_id.insert(message.id.clone(), kept.len());
                kept.push(message);
            }
        }
    }

    kept.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    kept
}
