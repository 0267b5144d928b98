use crate::{config::SimConfig, oid::Oid, snmp::Agent, store::ValueStore};
use std::sync::Arc;

/// The value store and the agent serving it, built from an engine's keys.
pub struct Device {
    pub store: Arc<ValueStore>,
    pub agent: Agent,
}

impl Device {
    /// Parses every key, creates the store with exactly the keys that parsed,
    /// and registers each of them with a new agent.
    ///
    /// A key that does not parse, or that SNMP cannot carry, is logged and
    /// left out; startup carries on with the rest.
    pub fn from_keys(keys: impl IntoIterator<Item = String>, config: &SimConfig) -> Self {
        let mut oids = Vec::new();
        for key in keys {
            match Oid::parse(&key) {
                Ok(oid) => oids.push(oid),
                Err(err) => tracing::warn!("Bad OID, not registered: {err}"),
            }
        }

        let store = Arc::new(ValueStore::new(oids.iter().cloned()));
        let mut agent = Agent::new(store.clone());
        agent.set_communities(&config.ro_community, &config.rw_community);
        for oid in oids {
            if let Err(err) = agent.register_read_only(oid) {
                tracing::warn!("Bad OID, not registered: {err}");
            }
        }
        tracing::info!("Registered {} OIDs", agent.registered().count());

        Self { store, agent }
    }
}
