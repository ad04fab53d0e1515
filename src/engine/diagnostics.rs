//! Diagnostics (§7): the record of every per-call failure a run collected
//! instead of aborting on (`ErrorMode::Collect`). Each record carries
//! enough to reproduce the failure from the Slice alone.

use serde::{Deserialize, Serialize};

use crate::engine::errors::BacktestError;
use crate::engine::hashing::content_hash;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsRecord {
    pub call_id: String,
    pub kind: String,
    pub message: String,
    /// Content hash of the inputs that produced the failure (the call id
    /// plus the error's own message), so two runs over identical inputs
    /// produce byte-identical diagnostics.
    pub input_hash: String,
}

impl DiagnosticsRecord {
    pub fn from_error(call_id: impl Into<String>, error: &BacktestError) -> Self {
        let call_id = call_id.into();
        let message = error.to_string();
        let input_hash = content_hash(&(call_id.as_str(), message.as_str()));
        Self { call_id, kind: error.kind().to_string(), message, input_hash }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub records: Vec<DiagnosticsRecord>,
}

impl Diagnostics {
    pub fn record(&mut self, call_id: impl Into<String>, error: &BacktestError) {
        self.records.push(DiagnosticsRecord::from_error(call_id, error));
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Records in deterministic `callId` order, for stable diagnostics
    /// output regardless of the (parallel) order failures were observed in.
    pub fn sorted(&self) -> Vec<&DiagnosticsRecord> {
        let mut out: Vec<&DiagnosticsRecord> = self.records.iter().collect();
        out.sort_by(|a, b| a.call_id.cmp(&b.call_id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_sort() {
        let mut diag = Diagnostics::default();
        diag.record("c2", &BacktestError::DataIntegrity("bad bar".to_string()));
        diag.record("c1", &BacktestError::DataIntegrity("bad bar".to_string()));
        assert_eq!(diag.len(), 2);
        let sorted = diag.sorted();
        assert_eq!(sorted[0].call_id, "c1");
        assert_eq!(sorted[1].call_id, "c2");
    }

    #[test]
    fn test_input_hash_deterministic_for_same_call_and_message() {
        let err = BacktestError::DataIntegrity("x".to_string());
        let a = DiagnosticsRecord::from_error("c1", &err);
        let b = DiagnosticsRecord::from_error("c1", &err);
        assert_eq!(a.input_hash, b.input_hash);
    }
}
