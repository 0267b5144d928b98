use crate::snmp::{DEFAULT_RO_COMMUNITY, DEFAULT_RW_COMMUNITY};
use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

/// The well-known SNMP agent port.
pub const SNMP_PORT: u16 = 161;

/// How long the responder waits for a datagram before re-checking shutdown.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for one simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Address the responder binds its UDP socket to.
    pub bind: SocketAddr,
    /// Receive timeout; also the worst-case delay before shutdown is noticed.
    pub recv_timeout: Duration,
    pub ro_community: String,
    pub rw_community: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, SNMP_PORT)),
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            ro_community: DEFAULT_RO_COMMUNITY.to_string(),
            rw_community: DEFAULT_RW_COMMUNITY.to_string(),
        }
    }
}
