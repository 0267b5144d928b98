//! SNMPv1 and SNMPv2c messages (RFC 1157, RFC 3416).

use super::ber::{self, BerError, Decoder};
use crate::oid::Oid;
use thiserror::Error as ThisError;

const TAG_NO_SUCH_OBJECT: u8 = 0x80;
const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
const TAG_END_OF_MIB_VIEW: u8 = 0x82;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2c,
}

impl Version {
    fn from_wire(value: i64) -> Result<Self, DecodeError> {
        match value {
            0 => Ok(Version::V1),
            1 => Ok(Version::V2c),
            other => Err(DecodeError::UnsupportedVersion(other)),
        }
    }

    fn to_wire(self) -> i64 {
        match self {
            Version::V1 => 0,
            Version::V2c => 1,
        }
    }
}

/// The PDU types this agent understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    Response,
    SetRequest,
    GetBulkRequest,
}

impl PduType {
    fn from_tag(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            0xa0 => Ok(PduType::GetRequest),
            0xa1 => Ok(PduType::GetNextRequest),
            0xa2 => Ok(PduType::Response),
            0xa3 => Ok(PduType::SetRequest),
            0xa5 => Ok(PduType::GetBulkRequest),
            other => Err(DecodeError::UnsupportedPdu(other)),
        }
    }

    fn tag(self) -> u8 {
        match self {
            PduType::GetRequest => 0xa0,
            PduType::GetNextRequest => 0xa1,
            PduType::Response => 0xa2,
            PduType::SetRequest => 0xa3,
            PduType::GetBulkRequest => 0xa5,
        }
    }
}

/// Values of the `error-status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    NoError = 0,
    TooBig = 1,
    NoSuchName = 2,
    GenErr = 5,
    NotWritable = 17,
}

/// The value half of a variable binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarValue {
    Null,
    Boolean(bool),
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectId(Oid),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    /// Any other type, kept verbatim so it can be echoed back.
    Other { tag: u8, contents: Vec<u8> },
}

impl VarValue {
    fn decode(tag: u8, contents: &[u8]) -> Result<Self, DecodeError> {
        Ok(match tag {
            ber::TAG_NULL => VarValue::Null,
            ber::TAG_BOOLEAN => match contents {
                [b] => VarValue::Boolean(*b != 0),
                _ => Err(DecodeError::BadBoolean)?,
            },
            ber::TAG_INTEGER => VarValue::Integer(ber::decode_integer(contents)?),
            ber::TAG_OCTET_STRING => VarValue::OctetString(contents.to_vec()),
            ber::TAG_OID => VarValue::ObjectId(ber::decode_oid(contents)?),
            TAG_NO_SUCH_OBJECT => VarValue::NoSuchObject,
            TAG_NO_SUCH_INSTANCE => VarValue::NoSuchInstance,
            TAG_END_OF_MIB_VIEW => VarValue::EndOfMibView,
            tag => VarValue::Other {
                tag,
                contents: contents.to_vec(),
            },
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), BerError> {
        match self {
            VarValue::Null => ber::encode_null(out),
            VarValue::Boolean(b) => ber::encode_boolean(*b, out),
            VarValue::Integer(i) => ber::encode_integer(ber::TAG_INTEGER, *i, out),
            VarValue::OctetString(s) => ber::encode_octets(s, out),
            VarValue::ObjectId(oid) => ber::encode_oid(oid, out)?,
            VarValue::NoSuchObject => ber::encode_tlv(TAG_NO_SUCH_OBJECT, &[], out),
            VarValue::NoSuchInstance => ber::encode_tlv(TAG_NO_SUCH_INSTANCE, &[], out),
            VarValue::EndOfMibView => ber::encode_tlv(TAG_END_OF_MIB_VIEW, &[], out),
            VarValue::Other { tag, contents } => ber::encode_tlv(*tag, contents, out),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: VarValue,
}

impl VarBind {
    pub fn new(oid: Oid, value: VarValue) -> Self {
        Self { oid, value }
    }
}

/// A protocol data unit. For `GetBulkRequest` the two status fields carry
/// `non-repeaters` and `max-repetitions` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub kind: PduType,
    pub request_id: i32,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Builds the response to `self`, carrying `varbinds`.
    pub fn response(&self, varbinds: Vec<VarBind>) -> Self {
        Self {
            kind: PduType::Response,
            request_id: self.request_id,
            error_status: ErrorStatus::NoError as i64,
            error_index: 0,
            varbinds,
        }
    }

    /// Builds an error response that echoes the request's bindings.
    /// `index` is one-based, zero when no binding is at fault.
    pub fn error_response(&self, status: ErrorStatus, index: usize) -> Self {
        Self {
            kind: PduType::Response,
            request_id: self.request_id,
            error_status: status as i64,
            error_index: index as i64,
            varbinds: self.varbinds.clone(),
        }
    }
}

/// A complete community-based SNMP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: Version,
    pub community: Vec<u8>,
    pub pdu: Pdu,
}

impl Message {
    /// Parses a datagram. The whole datagram must be one message.
    pub fn decode(datagram: &[u8]) -> Result<Self, DecodeError> {
        let mut outer = Decoder::new(datagram);
        let mut message = outer.read_sequence()?;
        if !outer.is_empty() {
            Err(DecodeError::TrailingBytes)?
        }

        let version = Version::from_wire(message.read_integer()?)?;
        let community = message.read_octets()?.to_vec();

        let (tag, contents) = message.read_tlv()?;
        let kind = PduType::from_tag(tag)?;
        if kind == PduType::GetBulkRequest && version == Version::V1 {
            Err(DecodeError::UnsupportedPdu(tag))?
        }
        let mut pdu = Decoder::new(contents);
        let request_id = i32::try_from(pdu.read_integer()?)
            .map_err(|_| DecodeError::RequestIdOutOfRange)?;
        let error_status = pdu.read_integer()?;
        let error_index = pdu.read_integer()?;

        let mut list = pdu.read_sequence()?;
        let mut varbinds = Vec::new();
        while !list.is_empty() {
            let mut varbind = list.read_sequence()?;
            let oid = varbind.read_oid()?;
            let (tag, contents) = varbind.read_tlv()?;
            varbinds.push(VarBind::new(oid, VarValue::decode(tag, contents)?));
        }

        Ok(Self {
            version,
            community,
            pdu: Pdu {
                kind,
                request_id,
                error_status,
                error_index,
                varbinds,
            },
        })
    }

    /// Serializes the message.
    pub fn encode(&self) -> Result<Vec<u8>, BerError> {
        let mut list = Vec::new();
        for varbind in &self.pdu.varbinds {
            let mut contents = Vec::new();
            ber::encode_oid(&varbind.oid, &mut contents)?;
            varbind.value.encode(&mut contents)?;
            ber::encode_tlv(ber::TAG_SEQUENCE, &contents, &mut list);
        }

        let mut pdu = Vec::with_capacity(list.len() + 16);
        ber::encode_integer(ber::TAG_INTEGER, self.pdu.request_id as i64, &mut pdu);
        ber::encode_integer(ber::TAG_INTEGER, self.pdu.error_status, &mut pdu);
        ber::encode_integer(ber::TAG_INTEGER, self.pdu.error_index, &mut pdu);
        ber::encode_tlv(ber::TAG_SEQUENCE, &list, &mut pdu);

        let mut message = Vec::with_capacity(pdu.len() + self.community.len() + 16);
        ber::encode_integer(ber::TAG_INTEGER, self.version.to_wire(), &mut message);
        ber::encode_octets(&self.community, &mut message);
        ber::encode_tlv(self.pdu.kind.tag(), &pdu, &mut message);

        let mut out = Vec::with_capacity(message.len() + 4);
        ber::encode_tlv(ber::TAG_SEQUENCE, &message, &mut out);
        Ok(out)
    }
}

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error(transparent)]
    Ber(#[from] BerError),
    #[error("Unsupported SNMP version {0}")]
    UnsupportedVersion(i64),
    #[error("Unsupported PDU type {0:#04x}")]
    UnsupportedPdu(u8),
    #[error("The request id does not fit in 32 bits")]
    RequestIdOutOfRange,
    #[error("A boolean must be exactly one byte")]
    BadBoolean,
    #[error("Bytes follow the end of the message")]
    TrailingBytes,
}
