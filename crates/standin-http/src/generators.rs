//! Generator Library: tokens, codes, ids, timestamps.
//!
//! These back the `{$function}` markers in response templates. Sequential
//! ids are the only stateful generators; they live in an explicit
//! [`SequenceRegistry`] owned by the process and passed by reference, one
//! counter slot per name with its own lock.

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Per-name sequential counters. Concurrent reads of the same name are
/// serialized on that name's slot, so ids are never duplicated or skipped.
#[derive(Debug, Default)]
pub struct SequenceRegistry {
    slots: Mutex<HashMap<String, Arc<Mutex<u64>>>>,
}

impl SequenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, name: &str) -> Arc<Mutex<u64>> {
        let mut slots = self.slots.lock();
        slots
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(0)))
            .clone()
    }

    /// Increment and return the counter for `name`.
    pub fn next(&self, name: &str) -> u64 {
        let slot = self.slot(name);
        let mut counter = slot.lock();
        *counter += 1;
        *counter
    }

    /// Current counter value without incrementing.
    pub fn current(&self, name: &str) -> u64 {
        *self.slot(name).lock()
    }
}

/// The fixed registry of named generator functions available to templates.
pub struct Generators {
    webhook_base_url: String,
    sequences: Arc<SequenceRegistry>,
}

impl Generators {
    /// Every name a `{$name}` marker may reference.
    pub const NAMES: [&'static str; 10] = [
        "access_token",
        "refresh_token",
        "token_pair",
        "verification_code",
        "session_id",
        "hash",
        "random_code",
        "next_id",
        "current_timestamp",
        "webhook_url",
    ];

    pub fn new(webhook_base_url: String, sequences: Arc<SequenceRegistry>) -> Self {
        Self {
            webhook_base_url,
            sequences,
        }
    }

    /// Resolve a generator marker to its substitution value.
    /// `token_pair` substitutes as "access,refresh", comma-joined.
    pub fn resolve(&self, name: &str) -> Option<String> {
        let value = match name {
            "access_token" => access_token(),
            "refresh_token" => refresh_token(),
            "token_pair" => {
                let (access, refresh) = token_pair();
                format!("{access},{refresh}")
            }
            "verification_code" | "random_code" => random_code(6),
            "session_id" => Uuid::new_v4().to_string(),
            "hash" => hex_string(),
            "next_id" => next_id(&self.sequences, "default"),
            "current_timestamp" => current_timestamp(),
            "webhook_url" => self.webhook_base_url.clone(),
            _ => return None,
        };
        Some(value)
    }

    pub fn sequences(&self) -> &SequenceRegistry {
        &self.sequences
    }
}

/// UUID plus an epoch suffix for uniqueness across restarts.
pub fn access_token() -> String {
    format!("{}-{}", Uuid::new_v4(), Utc::now().timestamp())
}

pub fn refresh_token() -> String {
    Uuid::new_v4().to_string()
}

pub fn token_pair() -> (String, String) {
    (access_token(), refresh_token())
}

/// Random numeric code of the given length.
pub fn random_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// 32 lowercase hex characters.
pub fn hex_string() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Whole-second UTC epoch as a string.
pub fn current_timestamp() -> String {
    Utc::now().timestamp().to_string()
}

/// ISO-8601 UTC timestamp without offset, microsecond precision.
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Sequential id folded into the range 1..=10.
fn next_id(sequences: &SequenceRegistry, name: &str) -> String {
    (sequences.next(name) % 10 + 1).to_string()
}
