//! The core of an SNMP device simulator: a store of OID-addressed readings
//! that a script mutates while an agent serves them over UDP.
//!
//! # Organization
//! - [`Oid`] and [`Value`] are the leaf types
//! - [`ValueStore`] is the synchronized table shared by both tasks
//! - [`snmp`] holds the BER codec and the read-only [`Agent`]
//! - [`Responder`] is the request-serving loop that owns the socket
//! - [`run_program`] is the mutation task, driving an [`Engine`]
//! - [`Shutdown`] and [`Sim`] coordinate the two tasks and their exit
//!
//! [`simulate`] wires all of these together for one device.

use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;

pub mod oid;
pub use oid::{Oid, OidError};

mod value;
pub use value::Value;

pub mod store;
pub use store::{StoreError, ValueStore};

pub mod snmp;
pub use snmp::{Agent, CodecError, ReadError, ReadHandler};

pub mod config;
pub use config::SimConfig;

mod device;
pub use device::Device;

pub mod engine;
pub use engine::Engine;

pub mod shutdown;
pub use shutdown::{ExitStatus, Shutdown};

pub mod responder;
pub use responder::{Responder, ResponderState, TransportError};

mod mutation;
pub use mutation::run_program;

pub mod sim;
pub use sim::{simulate, Sim, SimError};

/// A [`DashMap`] using the faster, non-cryptographic Fx hasher.
pub type FxDashMap<K, V> = DashMap<K, V, BuildHasherDefault<FxHasher>>;
