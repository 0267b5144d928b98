//! A minimal community-based SNMP agent (v1 and v2c) over a hand-written BER
//! codec.

pub mod ber;

mod pdu;
pub use pdu::{DecodeError, ErrorStatus, Message, Pdu, PduType, VarBind, VarValue, Version};

mod agent;
pub use agent::{
    Agent, CodecError, ReadError, ReadHandler, DEFAULT_RO_COMMUNITY, DEFAULT_RW_COMMUNITY,
    MAX_BULK_VARBINDS, MAX_MESSAGE_SIZE,
};
