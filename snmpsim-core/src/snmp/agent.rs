use super::{
    ber::{self, BerError},
    pdu::{DecodeError, ErrorStatus, Message, Pdu, PduType, VarBind, VarValue, Version},
};
use crate::oid::Oid;
use std::{
    collections::BTreeSet,
    ops::Bound::{Excluded, Unbounded},
    sync::Arc,
};
use thiserror::Error as ThisError;

pub const DEFAULT_RO_COMMUNITY: &str = "public";
pub const DEFAULT_RW_COMMUNITY: &str = "private";

/// Upper bound on the bindings a single `GetBulkRequest` may produce.
pub const MAX_BULK_VARBINDS: usize = 256;

/// Largest response the agent sends: the UDP payload limit over IPv4.
pub const MAX_MESSAGE_SIZE: usize = 65507;

/// Resolves a registered OID to the value the agent should encode.
pub trait ReadHandler: Send + Sync {
    fn read(&self, oid: &Oid) -> Result<VarValue, ReadError>;
}

/// Per-request failures of a [`ReadHandler`]. Both turn into error responses
/// for the peer; neither stops the agent.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("Unknown OID {0}")]
    UnknownOid(Oid),
    #[error("Illegal value for OID {0}")]
    IllegalValue(Oid),
}

/// A read-only SNMP agent.
///
/// Every registered OID is served by one shared [`ReadHandler`]. The agent
/// keeps the registered OIDs ordered so `GetNext` and `GetBulk` can walk them.
pub struct Agent {
    ro_community: Vec<u8>,
    rw_community: Vec<u8>,
    objects: BTreeSet<Oid>,
    handler: Arc<dyn ReadHandler>,
}

impl Agent {
    /// Creates an agent with the default `public` / `private` communities and
    /// nothing registered.
    pub fn new(handler: Arc<dyn ReadHandler>) -> Self {
        Self {
            ro_community: DEFAULT_RO_COMMUNITY.as_bytes().to_vec(),
            rw_community: DEFAULT_RW_COMMUNITY.as_bytes().to_vec(),
            objects: BTreeSet::new(),
            handler,
        }
    }

    /// Sets the read-only and read-write communities.
    pub fn set_communities(&mut self, read_only: &str, read_write: &str) {
        self.ro_community = read_only.as_bytes().to_vec();
        self.rw_community = read_write.as_bytes().to_vec();
    }

    /// Makes `oid` readable through the shared handler.
    pub fn register_read_only(&mut self, oid: Oid) -> Result<(), BerError> {
        ber::check_encodable(&oid)?;
        self.objects.insert(oid);
        Ok(())
    }

    pub fn is_registered(&self, oid: &Oid) -> bool {
        self.objects.contains(oid)
    }

    pub fn registered(&self) -> impl Iterator<Item = &Oid> {
        self.objects.iter()
    }

    /// Decodes a request, dispatches it and encodes the response.
    ///
    /// An `Err` means the datagram must be dropped without an answer: it was
    /// malformed, carried the wrong community, or was not a request.
    ///
    /// A response larger than [`MAX_MESSAGE_SIZE`] is cut down: `GetBulk`
    /// answers lose trailing bindings until they fit, anything else becomes a
    /// `tooBig` error with no bindings.
    pub fn process_datagram(&self, datagram: &[u8]) -> Result<Vec<u8>, CodecError> {
        let request = Message::decode(datagram)?;
        let kind = request.pdu.kind;
        let response = self.handle(request)?;
        let encoded = response.encode()?;
        if encoded.len() <= MAX_MESSAGE_SIZE {
            return Ok(encoded);
        }

        tracing::debug!("Response of {} bytes does not fit a datagram", encoded.len());
        let Message {
            version,
            community,
            pdu,
        } = response;
        match kind {
            PduType::GetBulkRequest => fit_bulk(version, &community, &pdu),
            _ => {
                let pdu = Pdu {
                    error_status: ErrorStatus::TooBig as i64,
                    error_index: 0,
                    varbinds: Vec::new(),
                    ..pdu
                };
                Ok(Message {
                    version,
                    community,
                    pdu,
                }
                .encode()?)
            }
        }
    }

    fn handle(&self, request: Message) -> Result<Message, CodecError> {
        let Message {
            version,
            community,
            pdu,
        } = request;

        let read_allowed = community == self.ro_community || community == self.rw_community;
        let write_allowed = community == self.rw_community;
        let allowed = match pdu.kind {
            PduType::SetRequest => write_allowed,
            _ => read_allowed,
        };
        if !allowed {
            Err(CodecError::BadCommunity {
                community: String::from_utf8_lossy(&community).into_owned(),
                kind: pdu.kind,
            })?
        }

        let pdu = match pdu.kind {
            PduType::GetRequest => self.get(version, &pdu),
            PduType::GetNextRequest => self.get_next(version, &pdu),
            PduType::GetBulkRequest => self.get_bulk(&pdu),
            PduType::SetRequest => {
                let status = match version {
                    Version::V1 => ErrorStatus::NoSuchName,
                    Version::V2c => ErrorStatus::NotWritable,
                };
                pdu.error_response(status, usize::from(!pdu.varbinds.is_empty()))
            }
            PduType::Response => Err(CodecError::UnexpectedPdu(pdu.kind))?,
        };

        Ok(Message {
            version,
            community,
            pdu,
        })
    }

    /// Reads a registered OID through the handler.
    fn lookup(&self, oid: &Oid) -> Result<VarValue, ReadError> {
        if !self.objects.contains(oid) {
            return Err(ReadError::UnknownOid(oid.clone()));
        }
        self.handler.read(oid)
    }

    /// The first readable binding after `oid` in OID order. OIDs the
    /// handler does not know are skipped.
    fn successor(&self, oid: &Oid) -> Result<Option<VarBind>, ReadError> {
        for next in self.objects.range((Excluded(oid), Unbounded)) {
            match self.handler.read(next) {
                Ok(value) => return Ok(Some(VarBind::new(next.clone(), value))),
                Err(ReadError::UnknownOid(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    fn get(&self, version: Version, pdu: &Pdu) -> Pdu {
        let mut varbinds = Vec::with_capacity(pdu.varbinds.len());
        for (i, varbind) in pdu.varbinds.iter().enumerate() {
            match self.lookup(&varbind.oid) {
                Ok(value) => varbinds.push(VarBind::new(varbind.oid.clone(), value)),
                Err(err @ ReadError::UnknownOid(_)) => {
                    tracing::debug!("{err}");
                    match version {
                        Version::V1 => return pdu.error_response(ErrorStatus::NoSuchName, i + 1),
                        Version::V2c => varbinds
                            .push(VarBind::new(varbind.oid.clone(), VarValue::NoSuchObject)),
                    }
                }
                Err(err @ ReadError::IllegalValue(_)) => {
                    tracing::debug!("{err}");
                    return pdu.error_response(ErrorStatus::GenErr, i + 1);
                }
            }
        }
        pdu.response(varbinds)
    }

    fn get_next(&self, version: Version, pdu: &Pdu) -> Pdu {
        let mut varbinds = Vec::with_capacity(pdu.varbinds.len());
        for (i, varbind) in pdu.varbinds.iter().enumerate() {
            match self.successor(&varbind.oid) {
                Ok(Some(next)) => varbinds.push(next),
                Ok(None) => match version {
                    Version::V1 => return pdu.error_response(ErrorStatus::NoSuchName, i + 1),
                    Version::V2c => varbinds
                        .push(VarBind::new(varbind.oid.clone(), VarValue::EndOfMibView)),
                },
                Err(err) => {
                    tracing::debug!("{err}");
                    return pdu.error_response(ErrorStatus::GenErr, i + 1);
                }
            }
        }
        pdu.response(varbinds)
    }

    fn get_bulk(&self, pdu: &Pdu) -> Pdu {
        let count = pdu.varbinds.len();
        let non_repeaters = pdu.error_status.clamp(0, count as i64) as usize;
        let max_repetitions = pdu.error_index.clamp(0, MAX_BULK_VARBINDS as i64) as usize;

        let mut varbinds = Vec::new();
        for (i, varbind) in pdu.varbinds[..non_repeaters].iter().enumerate() {
            match self.successor(&varbind.oid) {
                Ok(Some(next)) => varbinds.push(next),
                Ok(None) => {
                    varbinds.push(VarBind::new(varbind.oid.clone(), VarValue::EndOfMibView))
                }
                Err(err) => {
                    tracing::debug!("{err}");
                    return pdu.error_response(ErrorStatus::GenErr, i + 1);
                }
            }
        }

        let mut cursors: Vec<Oid> = pdu.varbinds[non_repeaters..]
            .iter()
            .map(|varbind| varbind.oid.clone())
            .collect();
        'repetitions: for _ in 0..max_repetitions {
            let mut exhausted = true;
            for (offset, cursor) in cursors.iter_mut().enumerate() {
                if varbinds.len() >= MAX_BULK_VARBINDS {
                    break 'repetitions;
                }
                match self.successor(cursor) {
                    Ok(Some(next)) => {
                        exhausted = false;
                        *cursor = next.oid.clone();
                        varbinds.push(next);
                    }
                    Ok(None) => varbinds.push(VarBind::new(cursor.clone(), VarValue::EndOfMibView)),
                    Err(err) => {
                        tracing::debug!("{err}");
                        return pdu.error_response(ErrorStatus::GenErr, non_repeaters + offset + 1);
                    }
                }
            }
            if exhausted {
                break;
            }
        }
        pdu.response(varbinds)
    }
}

/// Encodes the longest prefix of a bulk response's bindings that fits in
/// [`MAX_MESSAGE_SIZE`].
fn fit_bulk(version: Version, community: &[u8], pdu: &Pdu) -> Result<Vec<u8>, CodecError> {
    let encode_prefix = |len: usize| {
        Message {
            version,
            community: community.to_vec(),
            pdu: Pdu {
                varbinds: pdu.varbinds[..len].to_vec(),
                ..pdu.clone()
            },
        }
        .encode()
    };

    // `fits` holds the first `len` bindings; `too_long` bindings never fit
    let mut fits = encode_prefix(0)?;
    let (mut len, mut too_long) = (0, pdu.varbinds.len());
    while too_long - len > 1 {
        let mid = len + (too_long - len) / 2;
        let encoded = encode_prefix(mid)?;
        if encoded.len() <= MAX_MESSAGE_SIZE {
            fits = encoded;
            len = mid;
        } else {
            too_long = mid;
        }
    }
    tracing::debug!("Bulk response cut to {len} of {} bindings", pdu.varbinds.len());
    Ok(fits)
}

/// Reasons a datagram is dropped without a response.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed request: {0}")]
    Decode(#[from] DecodeError),
    #[error("Community '{community}' may not issue {kind:?}")]
    BadCommunity { community: String, kind: PduType },
    #[error("Unexpected {0:?} sent to the agent")]
    UnexpectedPdu(PduType),
    #[error("Failed to encode the response: {0}")]
    Encode(#[from] BerError),
}
