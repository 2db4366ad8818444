//! Cooldown gates blocking repeated actions until a stored expiry passes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection returned while an action is still cooling down.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("`{action}` is cooling down for another {remaining_ms} ms")]
pub struct CooldownActive {
    pub action: String,
    pub remaining_ms: u64,
    pub expires_at_ms: u64,
}

/// Per-action expiry timestamps in epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownGate {
    #[serde(default)]
    expiries: BTreeMap<String, u64>,
}

impl CooldownGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a gate from persisted expiries.
    #[must_use]
    pub const fn from_expiries(expiries: BTreeMap<String, u64>) -> Self {
        Self { expiries }
    }

    #[must_use]
    pub const fn expiries(&self) -> &BTreeMap<String, u64> {
        &self.expiries
    }

    /// Reject the action while `now < expiry`.
    ///
    /// # Errors
    ///
    /// Returns [`CooldownActive`] with the remaining time while cooling down.
    pub fn check(&self, action: &str, now_ms: u64) -> Result<(), CooldownActive> {
        match self.expiries.get(action) {
            Some(&expires_at_ms) if now_ms < expires_at_ms => Err(CooldownActive {
                action: action.to_string(),
                remaining_ms: expires_at_ms - now_ms,
                expires_at_ms,
            }),
            _ => Ok(()),
        }
    }

    /// Record `now + duration` as the new expiry for `action`.
    pub fn activate(&mut self, action: &str, duration_ms: u64, now_ms: u64) -> u64 {
        let expires_at = now_ms.saturating_add(duration_ms);
        if duration_ms > 0 {
            self.expiries.insert(action.to_string(), expires_at);
        }
        expires_at
    }

    /// Check and, when allowed, activate in one step.
    ///
    /// # Errors
    ///
    /// Returns [`CooldownActive`] without touching the stored expiry.
    pub fn try_activate(
        &mut self,
        action: &str,
        duration_ms: u64,
        now_ms: u64,
    ) -> Result<u64, CooldownActive> {
        self.check(action, now_ms)?;
        Ok(self.activate(action, duration_ms, now_ms))
    }

    #[must_use]
    pub fn is_cooling(&self, action: &str, now_ms: u64) -> bool {
        self.check(action, now_ms).is_err()
    }

    #[must_use]
    pub fn remaining_ms(&self, action: &str, now_ms: u64) -> u64 {
        self.check(action, now_ms)
            .err()
            .map_or(0, |active| active.remaining_ms)
    }

    pub fn clear(&mut self, action: &str) {
        self.expiries.remove(action);
    }

    /// Drop entries whose expiry has passed.
    pub fn prune(&mut self, now_ms: u64) {
        self.expiries.retain(|_, expires_at| now_ms < *expires_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_until_expiry_then_accepts() {
        let mut gate = CooldownGate::new();
        gate.activate("shear", 8_000, 1_000);

        let err = gate.check("shear", 5_000).unwrap_err();
        assert_eq!(err.action, "shear");
        assert_eq!(err.remaining_ms, 4_000);
        assert_eq!(err.expires_at_ms, 9_000);
        assert!(gate.is_cooling("shear", 8_999));
        assert!(gate.check("shear", 9_000).is_ok());
        assert!(gate.check("graze", 5_000).is_ok());
    }

    #[test]
    fn try_activate_leaves_expiry_untouched_on_rejection() {
        let mut gate = CooldownGate::new();
        gate.try_activate("cafe", 25_000, 0).unwrap();
        assert!(gate.try_activate("cafe", 25_000, 10_000).is_err());
        assert_eq!(gate.expiries().get("cafe"), Some(&25_000));
        assert_eq!(gate.try_activate("cafe", 25_000, 25_000), Ok(50_000));
    }

    #[test]
    fn zero_duration_never_blocks() {
        let mut gate = CooldownGate::new();
        gate.activate("wheel", 0, 100);
        assert!(gate.check("wheel", 100).is_ok());
        assert!(gate.expiries().is_empty());
    }

    #[test]
    fn prune_and_serde_roundtrip() {
        let mut gate = CooldownGate::new();
        gate.activate("old", 10, 0);
        gate.activate("new", 1_000, 0);
        gate.prune(500);
        assert_eq!(gate.expiries().len(), 1);
        assert_eq!(gate.remaining_ms("new", 500), 500);

        let json = serde_json::to_string(&gate).unwrap();
        let restored: CooldownGate = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, gate);
    }
}
