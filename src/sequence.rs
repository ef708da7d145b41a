// 🔢 Identifier Generator - Monotonic counters per key
//
// Each counter key ("person", "bank_account_number") has its own sequence,
// starting at 1. References are zero-padded to 8 digits.

use crate::config::{BAN_COUNTER, BAN_PREFIX, PERSON_COUNTER, PERSON_PREFIX};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Mutex;

/// Source of monotonically increasing sequence numbers
pub trait SequenceGenerator {
    /// Increment the counter for `key` and return the new value
    fn next_sequence(&self, key: &str) -> Result<u64>;
}

/// Format a sequence number as a bank account number
pub fn format_ban(seq: u64) -> String {
    format!("{}-{:08}", BAN_PREFIX, seq)
}

/// Format a sequence number as a person reference
pub fn format_person_id(seq: u64) -> String {
    format!("{}-{:08}", PERSON_PREFIX, seq)
}

pub fn next_ban<G: SequenceGenerator + ?Sized>(generator: &G) -> Result<String> {
    Ok(format_ban(generator.next_sequence(BAN_COUNTER)?))
}

pub fn next_person_id<G: SequenceGenerator + ?Sized>(generator: &G) -> Result<String> {
    Ok(format_person_id(generator.next_sequence(PERSON_COUNTER)?))
}

// ============================================================================
// IN-MEMORY GENERATOR
// ============================================================================

#[derive(Debug, Default)]
pub struct MemorySequence {
    counters: Mutex<HashMap<String, u64>>,
}

impl MemorySequence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SequenceGenerator for MemorySequence {
    fn next_sequence(&self, key: &str) -> Result<u64> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| anyhow::anyhow!("Sequence counters poisoned for key: {}", key))?;
        let seq = counters.entry(key.to_string()).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }
}
