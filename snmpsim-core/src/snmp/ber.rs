//! The subset of ASN.1 Basic Encoding Rules needed by SNMP: definite lengths,
//! single-byte tags, and the primitive types SNMP messages carry.

use crate::oid::Oid;
use thiserror::Error as ThisError;

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OID: u8 = 0x06;
pub const TAG_SEQUENCE: u8 = 0x30;

/// Reads tag-length-value triples out of a byte slice.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    bytes: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reads the next element, returning its tag and contents.
    pub fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), BerError> {
        let (&tag, rest) = self.bytes.split_first().ok_or(BerError::Truncated)?;
        if tag & 0x1f == 0x1f {
            Err(BerError::LongTag)?
        }
        let (&first, mut rest) = rest.split_first().ok_or(BerError::Truncated)?;
        let len = if first & 0x80 == 0 {
            first as usize
        } else {
            let octets = (first & 0x7f) as usize;
            if octets == 0 {
                Err(BerError::IndefiniteLength)?
            }
            if octets > 4 || rest.len() < octets {
                Err(BerError::BadLength)?
            }
            let len = rest[..octets]
                .iter()
                .fold(0usize, |acc, &b| (acc << 8) | b as usize);
            rest = &rest[octets..];
            len
        };
        if rest.len() < len {
            Err(BerError::Truncated)?
        }
        let (contents, rest) = rest.split_at(len);
        self.bytes = rest;
        Ok((tag, contents))
    }

    /// Reads the next element and checks that it carries `tag`.
    pub fn expect(&mut self, tag: u8) -> Result<&'a [u8], BerError> {
        let (actual, contents) = self.read_tlv()?;
        if actual != tag {
            Err(BerError::UnexpectedTag {
                expected: tag,
                actual,
            })?
        }
        Ok(contents)
    }

    pub fn read_sequence(&mut self) -> Result<Decoder<'a>, BerError> {
        Ok(Decoder::new(self.expect(TAG_SEQUENCE)?))
    }

    pub fn read_integer(&mut self) -> Result<i64, BerError> {
        decode_integer(self.expect(TAG_INTEGER)?)
    }

    pub fn read_octets(&mut self) -> Result<&'a [u8], BerError> {
        self.expect(TAG_OCTET_STRING)
    }

    pub fn read_oid(&mut self) -> Result<Oid, BerError> {
        decode_oid(self.expect(TAG_OID)?)
    }
}

/// Decodes a two's complement big-endian integer of at most eight bytes.
pub fn decode_integer(contents: &[u8]) -> Result<i64, BerError> {
    if contents.is_empty() || contents.len() > 8 {
        Err(BerError::BadInteger)?
    }
    let negative = contents[0] & 0x80 != 0;
    let initial = if negative { -1i64 } else { 0 };
    Ok(contents
        .iter()
        .fold(initial, |acc, &b| (acc << 8) | b as i64))
}

/// Decodes the contents of an OBJECT IDENTIFIER.
pub fn decode_oid(contents: &[u8]) -> Result<Oid, BerError> {
    if contents.is_empty() {
        Err(BerError::BadOid)?
    }
    let mut subidentifiers = Vec::new();
    let mut current: u64 = 0;
    let mut in_progress = false;
    for &b in contents {
        if !in_progress && b == 0x80 {
            // Non-minimal encoding.
            Err(BerError::BadOid)?
        }
        current = (current << 7) | (b & 0x7f) as u64;
        if current > u32::MAX as u64 + 80 {
            Err(BerError::BadOid)?
        }
        in_progress = b & 0x80 != 0;
        if !in_progress {
            subidentifiers.push(current);
            current = 0;
        }
    }
    if in_progress {
        Err(BerError::BadOid)?
    }

    let first = subidentifiers[0];
    let (a, b) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };
    let mut components = Vec::with_capacity(subidentifiers.len() + 1);
    components.push(a);
    components.push(u32::try_from(b).map_err(|_| BerError::BadOid)?);
    for &sub in &subidentifiers[1..] {
        components.push(u32::try_from(sub).map_err(|_| BerError::BadOid)?);
    }
    Ok(Oid::new(components))
}

/// Appends a definite length.
pub fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
}

pub fn encode_tlv(tag: u8, contents: &[u8], out: &mut Vec<u8>) {
    out.push(tag);
    encode_length(contents.len(), out);
    out.extend_from_slice(contents);
}

/// Appends an integer with the given tag in its shortest two's complement form.
pub fn encode_integer(tag: u8, value: i64, out: &mut Vec<u8>) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    encode_tlv(tag, &bytes[start..], out);
}

pub fn encode_octets(contents: &[u8], out: &mut Vec<u8>) {
    encode_tlv(TAG_OCTET_STRING, contents, out);
}

pub fn encode_boolean(value: bool, out: &mut Vec<u8>) {
    encode_tlv(TAG_BOOLEAN, &[if value { 0xff } else { 0x00 }], out);
}

pub fn encode_null(out: &mut Vec<u8>) {
    encode_tlv(TAG_NULL, &[], out);
}

/// Checks that `oid` has a BER encoding: at least two components, the first
/// one of 0, 1 or 2, and a second below 40 unless the first is 2.
pub fn check_encodable(oid: &Oid) -> Result<(), BerError> {
    match oid.components() {
        [0 | 1, b, ..] if *b < 40 => Ok(()),
        [2, b, ..] if *b <= u32::MAX - 80 => Ok(()),
        _ => Err(BerError::UnencodableOid(oid.clone())),
    }
}

pub fn encode_oid(oid: &Oid, out: &mut Vec<u8>) -> Result<(), BerError> {
    check_encodable(oid)?;
    let components = oid.components();
    let mut contents = Vec::with_capacity(components.len() + 4);
    push_subidentifier(components[0] * 40 + components[1], &mut contents);
    for &component in &components[2..] {
        push_subidentifier(component, &mut contents);
    }
    encode_tlv(TAG_OID, &contents, out);
    Ok(())
}

fn push_subidentifier(value: u32, out: &mut Vec<u8>) {
    let mut groups = [0u8; 5];
    let mut n = 0;
    let mut rest = value;
    loop {
        groups[n] = (rest & 0x7f) as u8;
        n += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let more = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | more);
    }
}

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum BerError {
    #[error("Too few bytes for the encoded element")]
    Truncated,
    #[error("Multi-byte tags are not supported")]
    LongTag,
    #[error("Indefinite lengths are not allowed")]
    IndefiniteLength,
    #[error("The length field is malformed")]
    BadLength,
    #[error("Expected tag {expected:#04x}, found {actual:#04x}")]
    UnexpectedTag { expected: u8, actual: u8 },
    #[error("The integer is empty or wider than 64 bits")]
    BadInteger,
    #[error("The object identifier is malformed")]
    BadOid,
    #[error("OID {0} has no BER encoding")]
    UnencodableOid(Oid),
}
