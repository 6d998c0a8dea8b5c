//! Batch aggregates over messages.

use std::collections::HashSet;

use neuralese_core::Message;

/// Mean length in characters; empty messages count as 0, no messages give 0.
pub fn avg_len(messages: &[Message]) -> f64 {
    if messages.is_empty() {
        return 0.0;
    }
    let total: usize = messages.iter().map(Message::char_len).sum();
    total as f64 / messages.len() as f64
}

/// Messages beyond the first occurrence of each distinct text.
pub fn count_collisions(messages: &[Message]) -> usize {
    let distinct: HashSet<&str> = messages.iter().map(Message::as_str).collect();
    messages.len() - distinct.len()
}

/// `(n - distinct) / max(1, n)`.
pub fn collision_rate(messages: &[Message]) -> f64 {
    count_collisions(messages) as f64 / messages.len().max(1) as f64
}
