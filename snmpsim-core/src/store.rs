//! The shared table of simulated readings.
//!
//! The key set is fixed when the store is built from the engine's initial OID
//! set; afterwards only values change. Every access goes through the
//! sharded reader/writer locks of a [`DashMap`](dashmap::DashMap), so readers
//! serving requests never observe a half-written value and no write from the
//! mutation task is lost.

use crate::{
    oid::Oid,
    snmp::{ReadError, ReadHandler, VarValue},
    FxDashMap, Value,
};
use thiserror::Error as ThisError;

#[derive(Debug, Default)]
pub struct ValueStore {
    values: FxDashMap<String, Value>,
}

impl ValueStore {
    /// Creates a store whose key set is exactly `keys`, every value Absent.
    pub fn new(keys: impl IntoIterator<Item = Oid>) -> Self {
        let values = FxDashMap::default();
        for oid in keys {
            values.insert(oid.to_key(), Value::Absent);
        }
        Self { values }
    }

    /// Looks up the current value of `oid`. `None` means the key is not part
    /// of the store.
    pub fn get(&self, oid: &Oid) -> Option<Value> {
        self.values.get(&oid.to_key()).map(|entry| entry.value().clone())
    }

    /// Replaces the value of an existing key. Keys outside the initial set are
    /// rejected rather than added.
    pub fn set(&self, oid: &Oid, value: Value) -> Result<(), StoreError> {
        match self.values.get_mut(&oid.to_key()) {
            Some(mut entry) => {
                *entry = value;
                Ok(())
            }
            None => Err(StoreError::UnknownOid(oid.clone())),
        }
    }

    /// Applies `f` to the current value of `oid` while holding its write
    /// guard, so read-modify-write updates are never interleaved with
    /// another writer.
    pub fn update<T, E>(
        &self,
        oid: &Oid,
        f: impl FnOnce(&mut Value) -> Result<T, E>,
    ) -> Result<Result<T, E>, StoreError> {
        match self.values.get_mut(&oid.to_key()) {
            Some(mut entry) => Ok(f(entry.value_mut())),
            None => Err(StoreError::UnknownOid(oid.clone())),
        }
    }

    pub fn contains(&self, oid: &Oid) -> bool {
        self.values.contains_key(&oid.to_key())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The single read dispatch for every registered OID.
impl ReadHandler for ValueStore {
    fn read(&self, oid: &Oid) -> Result<VarValue, ReadError> {
        match self.get(oid) {
            None => Err(ReadError::UnknownOid(oid.clone())),
            Some(Value::Absent) => Err(ReadError::IllegalValue(oid.clone())),
            Some(Value::Boolean(b)) => Ok(VarValue::Boolean(b)),
            Some(Value::Integer(i)) => Ok(VarValue::Integer(i)),
            Some(Value::String(s)) => Ok(VarValue::OctetString(s.into_bytes())),
        }
    }
}

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("OID {0} is not part of the value store")]
    UnknownOid(Oid),
}
