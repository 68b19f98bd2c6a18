//! Audit recording for handled invocations.
//!
//! One entry per handled request, recorded before the response is
//! returned. Entries are hash-chained for tamper evidence.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Mutex;

use warden_core::{ConversationId, RequestId, SubjectId, Timestamp};

use crate::error::{AgentError, AgentResult};

/// Outcome recorded for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditDecision {
    Permit,
    Deny,
    Error,
}

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub request_id: RequestId,
    pub subject: SubjectId,
    pub conversation: ConversationId,
    pub decision: AuditDecision,
    pub detail: String,
    pub timestamp: Timestamp,
    pub duration_ms: u64,
}

/// Thread-safe, in-memory, hash-chained audit log.
///
/// Each entry's hash covers the previous hash plus the entry's canonical
/// JSON, so truncation or edits anywhere in the chain are detectable.
#[derive(Default)]
pub struct AuditLog {
    records: Mutex<Vec<(AuditEntry, [u8; 32])>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry. Returns the entry's chain hash.
    pub fn record(&self, entry: AuditEntry) -> AgentResult<String> {
        let entry_json = serde_json::to_vec(&entry)
            .map_err(|e| AgentError::Checkpoint(format!("audit serialization failed: {e}")))?;

        let mut records = self
            .records
            .lock()
            .map_err(|_| AgentError::Checkpoint("audit lock poisoned".into()))?;

        let mut hasher = Sha256::new();
        if let Some((_, previous)) = records.last() {
            hasher.update(previous);
        }
        hasher.update(&entry_json);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hasher.finalize());

        records.push((entry, hash));
        Ok(hex::encode(hash))
    }

    pub fn entries(&self) -> AgentResult<Vec<AuditEntry>> {
        let records = self
            .records
            .lock()
            .map_err(|_| AgentError::Checkpoint("audit lock poisoned".into()))?;
        Ok(records.iter().map(|(entry, _)| entry.clone()).collect())
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute the chain and compare against the stored hashes.
    pub fn verify_chain(&self) -> AgentResult<bool> {
        let records = self
            .records
            .lock()
            .map_err(|_| AgentError::Checkpoint("audit lock poisoned".into()))?;

        let mut previous: Option<[u8; 32]> = None;
        for (entry, stored) in records.iter() {
            let entry_json = serde_json::to_vec(entry)
                .map_err(|e| AgentError::Checkpoint(format!("audit serialization failed: {e}")))?;
            let mut hasher = Sha256::new();
            if let Some(hash) = previous {
                hasher.update(hash);
            }
            hasher.update(&entry_json);
            let mut recomputed = [0u8; 32];
            recomputed.copy_from_slice(&hasher.finalize());
            if &recomputed != stored {
                return Ok(false);
            }
            previous = Some(recomputed);
        }
        Ok(true)
    }
}
