//! RunId (§3): a 128-bit, time-sortable identifier for every persisted
//! artifact. UUID v7 semantics, via the `v7` feature of the `uuid` crate.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    /// Generate a new, time-sortable RunId from the current instant. This
    /// is the one place in the crate allowed to read wall-clock time — it
    /// stamps a *result identifier*, not simulation state.
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Deterministic RunId from an explicit millisecond timestamp plus
    /// random bytes — used in tests so RunIds are reproducible without
    /// calling into wall-clock time. Lays out the 16 bytes by hand per the
    /// UUIDv7 layout (48-bit big-endian ms, 4-bit version, 12-bit rand_a,
    /// 2-bit variant, 62-bit rand_b) rather than relying on the `uuid`
    /// crate's seed-injection surface, which varies across versions.
    pub fn from_parts(unix_ms: u64, random: [u8; 10]) -> Self {
        let ms_be = unix_ms.to_be_bytes();
        let mut bytes = [0u8; 16];
        bytes[0..6].copy_from_slice(&ms_be[2..8]);
        bytes[6] = 0x70 | (random[0] & 0x0F);
        bytes[7] = random[1];
        bytes[8] = 0x80 | (random[2] & 0x3F);
        bytes[9..16].copy_from_slice(&random[3..10]);
        Self(uuid::Uuid::from_bytes(bytes))
    }

    pub fn as_string(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
