//! Call entity (§3): an alert/signal emitted by a named caller at a
//! timestamp for a token. Immutable.

use serde::{Deserialize, Serialize};

use crate::engine::time::UnixMs;

/// A (address, chain) pair identifying a tradeable token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRef {
    pub address: String,
    pub chain: String,
}

impl TokenRef {
    pub fn new(address: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            chain: chain.into(),
        }
    }
}

impl std::fmt::Display for TokenRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.chain, self.address)
    }
}

/// A historical alert. `callTimestamp` is the *observation* time; entry is
/// derived from it via `entryDelayMs` (§4.C).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub call_id: String,
    pub caller: String,
    pub token: TokenRef,
    pub call_timestamp: UnixMs,
}

impl Call {
    pub fn new(
        call_id: impl Into<String>,
        caller: impl Into<String>,
        token: TokenRef,
        call_timestamp: UnixMs,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            caller: caller.into(),
            token,
            call_timestamp,
        }
    }
}
