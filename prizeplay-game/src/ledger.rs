//! Durable per-player progress: counters, inventory and cooldown expiries.
//!
//! A [`ProgressLedger`] is read once when opened and, with auto-flush on,
//! written back on every mutation. Persisted snapshots carry a schema
//! version and an XxHash64 checksum so a damaged or foreign record is
//! reported instead of silently replaced with defaults.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::hash::Hasher;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use twox_hash::XxHash64;

use crate::constants::{LEDGER_CHECKSUM_SEED, LEDGER_SCHEMA_VERSION, LOG_TARGET_LEDGER};
use crate::cooldown::CooldownGate;

/// Key-value persistence backend for ledgers.
/// Platform-specific implementations should provide this
pub trait LedgerStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the raw record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn load(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Replace the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn store(&self, key: &str, payload: &str) -> Result<(), Self::Error>;

    /// Delete the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be deleted.
    fn remove(&self, key: &str) -> Result<(), Self::Error>;
}

impl<S: LedgerStorage + ?Sized> LedgerStorage for &S {
    type Error = S::Error;

    fn load(&self, key: &str) -> Result<Option<String>, Self::Error> {
        (**self).load(key)
    }

    fn store(&self, key: &str, payload: &str) -> Result<(), Self::Error> {
        (**self).store(key, payload)
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        (**self).remove(key)
    }
}

/// In-memory storage; clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    records: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw record for `key`, as a persistent store would hold it.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.records.borrow().get(key).cloned()
    }

    /// Overwrite the raw record for `key`.
    pub fn put_raw(&self, key: &str, payload: impl Into<String>) {
        self.records
            .borrow_mut()
            .insert(key.to_string(), payload.into());
    }
}

impl LedgerStorage for MemoryStorage {
    type Error = Infallible;

    fn load(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.raw(key))
    }

    fn store(&self, key: &str, payload: &str) -> Result<(), Self::Error> {
        self.put_raw(key, payload);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.records.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::Cell;
    use std::io;
    use std::rc::Rc;

    use super::{LedgerStorage, MemoryStorage};

    /// Memory storage that accepts a set number of writes and then fails.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct FlakyStorage {
        pub(crate) inner: MemoryStorage,
        writes_left: Rc<Cell<usize>>,
    }

    impl FlakyStorage {
        pub(crate) fn allow_writes(&self, writes: usize) {
            self.writes_left.set(writes);
        }
    }

    impl LedgerStorage for FlakyStorage {
        type Error = io::Error;

        fn load(&self, key: &str) -> Result<Option<String>, Self::Error> {
            Ok(self.inner.raw(key))
        }

        fn store(&self, key: &str, payload: &str) -> Result<(), Self::Error> {
            let left = self.writes_left.get();
            if left == 0 {
                return Err(io::Error::other("disk full"));
            }
            self.writes_left.set(left - 1);
            self.inner.put_raw(key, payload);
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<(), Self::Error> {
            self.inner.remove(key).map_err(|never| match never {})
        }
    }
}

/// Errors raised while opening, mutating or persisting a ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage failure for ledger `{key}`")]
    Storage {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("ledger `{key}` is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("ledger `{key}` has unsupported schema version {found} (expected {expected})")]
    UnsupportedVersion {
        key: String,
        found: u32,
        expected: u32,
    },
    #[error("not enough `{counter}`: balance {balance}, requested {requested}")]
    InsufficientFunds {
        counter: String,
        balance: i64,
        requested: i64,
    },
    #[error("not enough `{item}`: held {held}, requested {requested}")]
    InsufficientItems {
        item: String,
        held: u32,
        requested: u32,
    },
    #[error("failed to encode ledger `{key}`")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LedgerError {
    /// Whether the persisted record itself is unusable.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupt { .. } | Self::UnsupportedVersion { .. })
    }
}

/// Mutable ledger contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub counters: BTreeMap<String, i64>,
    #[serde(default)]
    pub inventory: BTreeMap<String, u32>,
    #[serde(default)]
    pub cooldowns: BTreeMap<String, u64>,
}

impl LedgerState {
    fn checksum(&self) -> Result<u64, serde_json::Error> {
        let canonical = serde_json::to_vec(self)?;
        let mut hasher = XxHash64::with_seed(LEDGER_CHECKSUM_SEED);
        hasher.write(&canonical);
        Ok(hasher.finish())
    }
}

/// Persisted envelope around [`LedgerState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub checksum: u64,
    pub state: LedgerState,
}

impl LedgerSnapshot {
    fn seal(state: LedgerState) -> Result<Self, serde_json::Error> {
        let checksum = state.checksum()?;
        Ok(Self {
            version: LEDGER_SCHEMA_VERSION,
            checksum,
            state,
        })
    }

    fn unseal(key: &str, raw: &str) -> Result<LedgerState, LedgerError> {
        let snapshot: Self = serde_json::from_str(raw).map_err(|err| LedgerError::Corrupt {
            key: key.to_string(),
            reason: err.to_string(),
        })?;
        if snapshot.version != LEDGER_SCHEMA_VERSION {
            return Err(LedgerError::UnsupportedVersion {
                key: key.to_string(),
                found: snapshot.version,
                expected: LEDGER_SCHEMA_VERSION,
            });
        }
        let expected = snapshot
            .state
            .checksum()
            .map_err(|err| LedgerError::Corrupt {
                key: key.to_string(),
                reason: err.to_string(),
            })?;
        if expected != snapshot.checksum {
            return Err(LedgerError::Corrupt {
                key: key.to_string(),
                reason: format!(
                    "checksum mismatch (stored {:#018x}, computed {expected:#018x})",
                    snapshot.checksum
                ),
            });
        }
        Ok(snapshot.state)
    }
}

/// Durable counters bound to one storage key.
#[derive(Debug)]
pub struct ProgressLedger<S: LedgerStorage> {
    key: String,
    storage: S,
    state: LedgerState,
    auto_flush: bool,
    dirty: bool,
}

impl<S: LedgerStorage> ProgressLedger<S> {
    /// Open the ledger stored under `key`, starting empty when absent.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] when the backend fails and
    /// [`LedgerError::Corrupt`] / [`LedgerError::UnsupportedVersion`] when the
    /// stored record cannot be trusted.
    pub fn open(storage: S, key: impl Into<String>) -> Result<Self, LedgerError> {
        let key = key.into();
        let raw = storage.load(&key).map_err(|err| storage_error(&key, err))?;
        let state = match raw {
            Some(raw) => LedgerSnapshot::unseal(&key, &raw)?,
            None => LedgerState::default(),
        };
        Ok(Self {
            key,
            storage,
            state,
            auto_flush: true,
            dirty: false,
        })
    }

    /// Open the ledger, discarding an unusable record instead of failing.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] when the backend itself fails.
    pub fn open_or_reset(storage: S, key: impl Into<String>) -> Result<Self, LedgerError> {
        let key = key.into();
        let raw = storage.load(&key).map_err(|err| storage_error(&key, err))?;
        let state = match raw.map(|raw| LedgerSnapshot::unseal(&key, &raw)) {
            Some(Ok(state)) => state,
            Some(Err(err)) if err.is_corruption() => {
                log::warn!(target: LOG_TARGET_LEDGER, "resetting ledger: {err}");
                storage.remove(&key).map_err(|err| storage_error(&key, err))?;
                LedgerState::default()
            }
            Some(Err(err)) => return Err(err),
            None => LedgerState::default(),
        };
        Ok(Self {
            key,
            storage,
            state,
            auto_flush: true,
            dirty: false,
        })
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub const fn state(&self) -> &LedgerState {
        &self.state
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub const fn auto_flush(&self) -> bool {
        self.auto_flush
    }

    /// Toggle write-through. Turning it back on flushes pending changes.
    ///
    /// # Errors
    ///
    /// Returns an error if pending changes cannot be persisted.
    pub fn set_auto_flush(&mut self, enabled: bool) -> Result<(), LedgerError> {
        self.auto_flush = enabled;
        if enabled && self.dirty {
            self.flush()?;
        }
        Ok(())
    }

    /// Apply several changes with a single write at the end.
    ///
    /// The changes are all-or-nothing: when the closure fails or the final
    /// write is rejected, the in-memory state returns to what it was before.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a ledger error if the batched
    /// changes cannot be persisted.
    pub fn transaction<T, E>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<LedgerError>,
    {
        let auto_flush = self.auto_flush;
        let before = self.state.clone();
        let was_dirty = self.dirty;
        self.auto_flush = false;
        let result = match f(self) {
            Ok(value) if auto_flush && self.dirty => self.flush().map(|()| value).map_err(E::from),
            other => other,
        };
        self.auto_flush = auto_flush;
        if result.is_err() {
            self.state = before;
            self.dirty = was_dirty;
        }
        result
    }

    /// Current counter value, 0 when unset.
    #[must_use]
    pub fn get(&self, counter: &str) -> i64 {
        self.state.counters.get(counter).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn has_counter(&self, counter: &str) -> bool {
        self.state.counters.contains_key(counter)
    }

    /// Seed `counter` with `value` if it has never been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    pub fn ensure(&mut self, counter: &str, value: i64) -> Result<i64, LedgerError> {
        if let Some(existing) = self.state.counters.get(counter) {
            return Ok(*existing);
        }
        self.set(counter, value)
    }

    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    pub fn set(&mut self, counter: &str, value: i64) -> Result<i64, LedgerError> {
        self.mutate(|state| {
            state.counters.insert(counter.to_string(), value);
        })?;
        Ok(value)
    }

    /// Saturating add, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    pub fn add(&mut self, counter: &str, delta: i64) -> Result<i64, LedgerError> {
        let next = self.get(counter).saturating_add(delta);
        self.set(counter, next)
    }

    /// Add and clamp into `[min, max]`, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    pub fn add_clamped(
        &mut self,
        counter: &str,
        delta: i64,
        min: i64,
        max: i64,
    ) -> Result<i64, LedgerError> {
        let next = self.get(counter).saturating_add(delta).clamp(min, max);
        self.set(counter, next)
    }

    /// Deduct `amount` without letting the counter go negative.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientFunds`] without changing the balance.
    pub fn spend(&mut self, counter: &str, amount: i64) -> Result<i64, LedgerError> {
        let balance = self.get(counter);
        if amount < 0 || balance < amount {
            return Err(LedgerError::InsufficientFunds {
                counter: counter.to_string(),
                balance,
                requested: amount,
            });
        }
        self.set(counter, balance - amount)
    }

    #[must_use]
    pub fn count(&self, item: &str) -> u32 {
        self.state.inventory.get(item).copied().unwrap_or(0)
    }

    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    pub fn grant(&mut self, item: &str, qty: u32) -> Result<u32, LedgerError> {
        let held = self.count(item).saturating_add(qty);
        if qty > 0 {
            self.mutate(|state| {
                state.inventory.insert(item.to_string(), held);
            })?;
        }
        Ok(held)
    }

    /// Remove `qty` units of `item`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientItems`] when fewer are held.
    pub fn consume(&mut self, item: &str, qty: u32) -> Result<u32, LedgerError> {
        let held = self.count(item);
        if held < qty {
            return Err(LedgerError::InsufficientItems {
                item: item.to_string(),
                held,
                requested: qty,
            });
        }
        let left = held - qty;
        self.mutate(|state| {
            if left == 0 {
                state.inventory.remove(item);
            } else {
                state.inventory.insert(item.to_string(), left);
            }
        })?;
        Ok(left)
    }

    /// Cooldown gate rebuilt from persisted expiries.
    #[must_use]
    pub fn cooldowns(&self) -> CooldownGate {
        CooldownGate::from_expiries(self.state.cooldowns.clone())
    }

    /// Persist the expiries held by `gate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    pub fn store_cooldowns(&mut self, gate: &CooldownGate) -> Result<(), LedgerError> {
        if &self.state.cooldowns == gate.expiries() {
            return Ok(());
        }
        self.mutate(|state| state.cooldowns = gate.expiries().clone())
    }

    /// Write the current state to storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be encoded or stored.
    pub fn flush(&mut self) -> Result<(), LedgerError> {
        let snapshot =
            LedgerSnapshot::seal(self.state.clone()).map_err(|source| LedgerError::Encode {
                key: self.key.clone(),
                source,
            })?;
        let payload = serde_json::to_string(&snapshot).map_err(|source| LedgerError::Encode {
            key: self.key.clone(),
            source,
        })?;
        self.storage
            .store(&self.key, &payload)
            .map_err(|err| storage_error(&self.key, err))?;
        self.dirty = false;
        Ok(())
    }

    /// Forget all progress, including the persisted record.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted record cannot be removed.
    pub fn reset(&mut self) -> Result<(), LedgerError> {
        self.storage
            .remove(&self.key)
            .map_err(|err| storage_error(&self.key, err))?;
        self.state = LedgerState::default();
        self.dirty = false;
        log::info!(target: LOG_TARGET_LEDGER, "ledger `{}` reset", self.key);
        Ok(())
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Apply `change`, writing it through when auto-flush is on. A rejected
    /// write leaves the in-memory state untouched.
    fn mutate(&mut self, change: impl FnOnce(&mut LedgerState)) -> Result<(), LedgerError> {
        if !self.auto_flush {
            change(&mut self.state);
            self.dirty = true;
            return Ok(());
        }
        let before = self.state.clone();
        let was_dirty = self.dirty;
        change(&mut self.state);
        self.dirty = true;
        if let Err(err) = self.flush() {
            self.state = before;
            self.dirty = was_dirty;
            return Err(err);
        }
        Ok(())
    }
}

fn storage_error<E>(key: &str, err: E) -> LedgerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    LedgerError::Storage {
        key: key.to_string(),
        source: Box::new(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_survive_reopen() {
        let storage = MemoryStorage::new();
        {
            let mut ledger = ProgressLedger::open(storage.clone(), "puzzle").unwrap();
            ledger.add("coins", 120).unwrap();
            ledger.grant("piece-3", 1).unwrap();
        }
        let ledger = ProgressLedger::open(storage, "puzzle").unwrap();
        assert_eq!(ledger.get("coins"), 120);
        assert_eq!(ledger.count("piece-3"), 1);
        assert!(!ledger.is_dirty());
    }

    #[test]
    fn spend_never_goes_negative() {
        let mut ledger = ProgressLedger::open(MemoryStorage::new(), "box").unwrap();
        ledger.set("coins", 90).unwrap();
        let err = ledger.spend("coins", 100).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                balance: 90,
                requested: 100,
                ..
            }
        ));
        assert_eq!(ledger.get("coins"), 90);
        assert_eq!(ledger.spend("coins", 90).unwrap(), 0);
        assert!(ledger.spend("coins", -5).is_err());
    }

    #[test]
    fn manual_flush_defers_writes() {
        let storage = MemoryStorage::new();
        let mut ledger = ProgressLedger::open(storage.clone(), "quest").unwrap();
        ledger.set_auto_flush(false).unwrap();
        ledger.set("step", 3).unwrap();
        assert!(ledger.is_dirty());
        assert!(storage.raw("quest").is_none());
        ledger.flush().unwrap();
        assert!(storage.raw("quest").is_some());
        assert!(!ledger.is_dirty());
    }

    #[test]
    fn garbage_record_is_reported_not_discarded() {
        let storage = MemoryStorage::new();
        storage.put_raw("sheep", "{not json");
        let err = ProgressLedger::open(storage.clone(), "sheep").unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(storage.raw("sheep").as_deref(), Some("{not json"));
    }

    #[test]
    fn tampered_counters_fail_checksum() {
        let storage = MemoryStorage::new();
        let mut ledger = ProgressLedger::open(storage.clone(), "map").unwrap();
        ledger.set("coins", 10).unwrap();
        let tampered = storage
            .raw("map")
            .unwrap()
            .replace("\"coins\":10", "\"coins\":99999");
        storage.put_raw("map", tampered);

        let err = ProgressLedger::open(storage.clone(), "map").unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt { ref reason, .. } if reason.contains("checksum")));

        let recovered = ProgressLedger::open_or_reset(storage.clone(), "map").unwrap();
        assert_eq!(recovered.get("coins"), 0);
        assert!(storage.raw("map").is_none());
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let storage = MemoryStorage::new();
        let state = LedgerState::default();
        let checksum = state.checksum().unwrap();
        let future = LedgerSnapshot {
            version: LEDGER_SCHEMA_VERSION + 1,
            checksum,
            state,
        };
        storage.put_raw("future", serde_json::to_string(&future).unwrap());
        let err = ProgressLedger::open(storage, "future").unwrap_err();
        assert!(matches!(err, LedgerError::UnsupportedVersion { found: 2, .. }));
    }

    #[test]
    fn inventory_consume_and_cooldowns_persist() {
        let storage = MemoryStorage::new();
        let mut ledger = ProgressLedger::open(storage.clone(), "pet").unwrap();
        ledger.grant("apple", 2).unwrap();
        assert_eq!(ledger.consume("apple", 1).unwrap(), 1);
        assert!(ledger.consume("apple", 5).is_err());
        assert_eq!(ledger.consume("apple", 1).unwrap(), 0);
        assert!(ledger.state().inventory.is_empty());

        let mut gate = ledger.cooldowns();
        gate.activate("graze", 4_000, 1_000);
        ledger.store_cooldowns(&gate).unwrap();

        let reopened = ProgressLedger::open(storage, "pet").unwrap();
        assert!(reopened.cooldowns().is_cooling("graze", 2_000));
    }

    #[test]
    fn ensure_seeds_only_missing_counters() {
        let mut ledger = ProgressLedger::open(MemoryStorage::new(), "pet").unwrap();
        assert_eq!(ledger.ensure("coins", 100).unwrap(), 100);
        ledger.add("coins", -40).unwrap();
        assert_eq!(ledger.ensure("coins", 100).unwrap(), 60);
        assert_eq!(
            ledger.add_clamped("happiness", 500, 0, 100).unwrap(),
            100
        );
    }

    #[test]
    fn transaction_writes_once() {
        let storage = MemoryStorage::new();
        let mut ledger = ProgressLedger::open(storage.clone(), "bank").unwrap();
        let result: Result<i64, LedgerError> = ledger.transaction(|ledger| {
            ledger.add("coins", 50)?;
            assert!(storage.raw("bank").is_none());
            ledger.add("coins", 25)
        });
        assert_eq!(result.unwrap(), 75);
        assert!(ledger.auto_flush());
        let reopened = ProgressLedger::open(storage, "bank").unwrap();
        assert_eq!(reopened.get("coins"), 75);
    }

    #[test]
    fn rejected_write_leaves_memory_untouched() {
        let storage = testing::FlakyStorage::default();
        storage.allow_writes(1);
        let mut ledger = ProgressLedger::open(storage.clone(), "box").unwrap();
        ledger.set("coins", 500).unwrap();

        assert!(matches!(
            ledger.spend("coins", 100),
            Err(LedgerError::Storage { .. })
        ));
        assert_eq!(ledger.get("coins"), 500);
        assert!(ledger.grant("gift", 1).is_err());
        assert_eq!(ledger.count("gift"), 0);
        assert!(!ledger.is_dirty());
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let storage = testing::FlakyStorage::default();
        storage.allow_writes(1);
        let mut ledger = ProgressLedger::open(storage.clone(), "bank").unwrap();
        ledger.set("coins", 100).unwrap();

        let result: Result<(), LedgerError> = ledger.transaction(|ledger| {
            ledger.spend("coins", 40)?;
            ledger.add("plays", 1)?;
            Ok(())
        });
        assert!(matches!(result, Err(LedgerError::Storage { .. })));
        assert_eq!(ledger.get("coins"), 100);
        assert_eq!(ledger.get("plays"), 0);
        assert!(ledger.auto_flush());

        storage.allow_writes(5);
        let refused: Result<(), LedgerError> = ledger.transaction(|ledger| {
            ledger.add("plays", 1)?;
            ledger.spend("coins", 1_000)?;
            Ok(())
        });
        assert!(refused.is_err());
        assert_eq!(ledger.get("plays"), 0);

        ledger.add("plays", 1).unwrap();
        let reopened = ProgressLedger::open(storage.inner.clone(), "bank").unwrap();
        assert_eq!((reopened.get("coins"), reopened.get("plays")), (100, 1));
    }

    #[test]
    fn reset_clears_state_and_record() {
        let storage = MemoryStorage::new();
        let mut ledger = ProgressLedger::open(storage.clone(), "quest").unwrap();
        ledger.set("step", 4).unwrap();
        ledger.reset().unwrap();
        assert_eq!(ledger.get("step"), 0);
        assert!(storage.raw("quest").is_none());
    }
}
