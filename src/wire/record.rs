//! Resource-record payload (rdata) parsing for the record types this
//! crate recognises: A, AAAA, PTR, SRV, TXT. Built on top of
//! [`crate::wire::name`].

use crate::wire::name::{self, DomainName};
use bytes::Bytes;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Resource record types recognised by this library. Anything else is
/// delivered to the caller as [`RecordType::Unknown`] with its raw
/// rdata, per S:6 of the wire contract: such records are not
/// structurally decoded.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecordType {
    A,
    Ptr,
    Txt,
    Aaaa,
    Srv,
    Unknown(u16),
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            12 => RecordType::Ptr,
            16 => RecordType::Txt,
            28 => RecordType::Aaaa,
            33 => RecordType::Srv,
            other => RecordType::Unknown(other),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::Ptr => 12,
            RecordType::Txt => 16,
            RecordType::Aaaa => 28,
            RecordType::Srv => 33,
            RecordType::Unknown(value) => value,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::Ptr => write!(f, "PTR"),
            RecordType::Txt => write!(f, "TXT"),
            RecordType::Aaaa => write!(f, "AAAA"),
            RecordType::Srv => write!(f, "SRV"),
            RecordType::Unknown(n) => write!(f, "TYPE{n}"),
        }
    }
}

/// The wire-format class field, kept exactly as received: bit 15 is
/// overloaded by mDNS as the "unicast response requested" (on
/// questions) or "cache-flush" (on answers) bit and must be masked off
/// before any comparison against `IN`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RawClass(pub u16);

/// The Internet class, `IN` (1); the only class this library writes,
/// and the only one records are expected to present once bit 15 is
/// masked off.
pub const CLASS_IN: u16 = 1;

impl RawClass {
    pub fn new(class: u16, flush_or_unicast_requested: bool) -> Self {
        RawClass(if flush_or_unicast_requested {
            class | 0x8000
        } else {
            class & 0x7FFF
        })
    }

    /// The class value with bit 15 masked off.
    pub fn class(&self) -> u16 {
        self.0 & 0x7FFF
    }

    /// Bit 15: "QU" on a question, "cache-flush" on an answer.
    pub fn flush_or_unicast_requested(&self) -> bool {
        self.0 & 0x8000 != 0
    }

    pub fn is_in(&self) -> bool {
        self.class() == CLASS_IN
    }
}

/// One decoded TXT-record key/value pair. `value` is `None` for a bare
/// key (no `=` present), and `Some("")` for `key=` (an explicit, empty
/// value) — the two are distinct per S:4.2.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TxtEntry {
    pub key: String,
    pub value: Option<String>,
}

/// SRV rdata: priority, weight, port, and a target name.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Srv {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: DomainName,
}

/// The recognised rdata shapes, paired with their [`RecordType`] by
/// construction. Unrecognised types are not decoded here — they are
/// the raw-rdata path described in the message codec.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ptr(DomainName),
    Srv(Srv),
    Txt(Vec<TxtEntry>),
    Raw { rtype: u16, octets: Bytes },
}

impl RecordData {
    pub fn rtype(&self) -> RecordType {
        match self {
            RecordData::A(_) => RecordType::A,
            RecordData::Aaaa(_) => RecordType::Aaaa,
            RecordData::Ptr(_) => RecordType::Ptr,
            RecordData::Srv(_) => RecordType::Srv,
            RecordData::Txt(_) => RecordType::Txt,
            RecordData::Raw { rtype, .. } => RecordType::Unknown(*rtype),
        }
    }
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordData::A(addr) => write!(f, "{addr}"),
            RecordData::Aaaa(addr) => write!(f, "{addr}"),
            RecordData::Ptr(name) => write!(f, "{name}"),
            RecordData::Srv(srv) => {
                write!(f, "{} {} {} {}", srv.priority, srv.weight, srv.port, srv.target)
            }
            RecordData::Txt(entries) => {
                let rendered = entries
                    .iter()
                    .map(|e| match &e.value {
                        Some(v) => format!("{}={}", e.key, v),
                        None => e.key.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                write!(f, "{rendered}")
            }
            RecordData::Raw { rtype, octets } => write!(f, "(rdata for TYPE{rtype}, {} octets)", octets.len()),
        }
    }
}

/// Dispatches to the appropriate typed parser for `rtype` and wraps the
/// result in a [`RecordData`], falling back to [`RecordData::Raw`] for
/// unrecognised types and for records that fail their schema check (a
/// too-short SRV, or a wrong-length A/AAAA payload) rather than losing
/// the rdata entirely.
pub fn parse_rdata(
    rtype: RecordType,
    buffer: &[u8],
    rdata_offset: usize,
    rdata_length: usize,
) -> RecordData {
    let raw = || {
        let end = rdata_offset.saturating_add(rdata_length).min(buffer.len());
        let start = rdata_offset.min(end);
        RecordData::Raw {
            rtype: rtype.into(),
            octets: Bytes::copy_from_slice(&buffer[start..end]),
        }
    };
    match rtype {
        RecordType::A => parse_a(buffer, rdata_offset, rdata_length)
            .map(RecordData::A)
            .unwrap_or_else(raw),
        RecordType::Aaaa => parse_aaaa(buffer, rdata_offset, rdata_length)
            .map(RecordData::Aaaa)
            .unwrap_or_else(raw),
        RecordType::Ptr => RecordData::Ptr(parse_ptr(buffer, rdata_offset)),
        RecordType::Srv => parse_srv(buffer, rdata_offset, rdata_length)
            .map(RecordData::Srv)
            .unwrap_or_else(raw),
        RecordType::Txt => RecordData::Txt(parse_txt(buffer, rdata_offset, rdata_length)),
        RecordType::Unknown(_) => raw(),
    }
}

/// Interprets the rdata at `rdata_offset` as a single compressible
/// name. `rdata_length` is advisory: parsing uses the name codec and
/// may follow compression pointers anywhere in `buffer`, not just
/// within the advised length.
pub fn parse_ptr(buffer: &[u8], rdata_offset: usize) -> DomainName {
    name::DomainName::read(buffer, rdata_offset).0
}

/// Reads priority, weight, and port as three big-endian `u16` values,
/// then decodes the target name from the position immediately
/// following. Returns `None` if `rdata_length < 6`.
pub fn parse_srv(buffer: &[u8], rdata_offset: usize, rdata_length: usize) -> Option<Srv> {
    if rdata_length < 6 {
        return None;
    }
    let priority = read_u16(buffer, rdata_offset)?;
    let weight = read_u16(buffer, rdata_offset + 2)?;
    let port = read_u16(buffer, rdata_offset + 4)?;
    let (target, _) = DomainName::read(buffer, rdata_offset + 6);
    Some(Srv {
        priority,
        weight,
        port,
        target,
    })
}

/// Requires `rdata_length == 4`; the four octets are the address in
/// network order.
pub fn parse_a(buffer: &[u8], rdata_offset: usize, rdata_length: usize) -> Option<Ipv4Addr> {
    if rdata_length != 4 {
        return None;
    }
    let octets: [u8; 4] = buffer.get(rdata_offset..rdata_offset + 4)?.try_into().ok()?;
    Some(Ipv4Addr::from(octets))
}

/// Requires `rdata_length == 16`; copied verbatim.
pub fn parse_aaaa(buffer: &[u8], rdata_offset: usize, rdata_length: usize) -> Option<Ipv6Addr> {
    if rdata_length != 16 {
        return None;
    }
    let octets: [u8; 16] = buffer
        .get(rdata_offset..rdata_offset + 16)?
        .try_into()
        .ok()?;
    Some(Ipv6Addr::from(octets))
}

/// Walks the rdata region as a sequence of length-prefixed character
/// strings and decodes each into a [`TxtEntry`] per S:4.2's rules: a
/// zero-length string is skipped; an `=` at position 0 is malformed and
/// skipped; an `=` elsewhere splits key and value; no `=` at all yields
/// a bare key with no value.
pub fn parse_txt(buffer: &[u8], rdata_offset: usize, rdata_length: usize) -> Vec<TxtEntry> {
    let mut entries = Vec::new();
    let end = rdata_offset.saturating_add(rdata_length).min(buffer.len());
    let mut cursor = rdata_offset;

    while cursor < end {
        let Some(&len) = buffer.get(cursor) else {
            break;
        };
        let start = cursor + 1;
        let string_end = start + len as usize;
        if string_end > end {
            break;
        }
        let s = &buffer[start..string_end];
        cursor = string_end;

        if s.is_empty() {
            continue;
        }
        match s.iter().position(|&b| b == b'=') {
            Some(0) => continue,
            Some(p) => entries.push(TxtEntry {
                key: String::from_utf8_lossy(&s[..p]).into_owned(),
                value: Some(String::from_utf8_lossy(&s[p + 1..]).into_owned()),
            }),
            None => entries.push(TxtEntry {
                key: String::from_utf8_lossy(s).into_owned(),
                value: None,
            }),
        }
    }

    entries
}

fn read_u16(buffer: &[u8], offset: usize) -> Option<u16> {
    let bytes: [u8; 2] = buffer.get(offset..offset + 2)?.try_into().ok()?;
    Some(u16::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_txt_parsing() {
        let rdata = [
            0x0a, b'k', b'e', b'y', b'=', b'v', b'a', b'l', b'u', b'e', b'1', 0x03, b'k', b'e',
            b'y', 0x04, b'k', b'=', b'=', b'v',
        ];
        let entries = parse_txt(&rdata, 0, rdata.len());
        assert_eq!(
            entries,
            vec![
                TxtEntry {
                    key: "key".to_string(),
                    value: Some("value1".to_string()),
                },
                TxtEntry {
                    key: "key".to_string(),
                    value: None,
                },
                TxtEntry {
                    key: "k".to_string(),
                    value: Some("=v".to_string()),
                },
            ]
        );
    }

    #[test]
    fn txt_zero_length_rdata_yields_zero_records() {
        assert_eq!(parse_txt(&[], 0, 0), Vec::new());
    }

    #[test]
    fn s5_a_record() {
        let rdata = [0xC0, 0xA8, 0x01, 0x7B];
        assert_eq!(parse_a(&rdata, 0, 4), Some(Ipv4Addr::new(192, 168, 1, 123)));
        assert_eq!(parse_a(&rdata, 0, 5), None);
    }

    #[test]
    fn srv_too_short_is_none() {
        assert_eq!(parse_srv(&[0, 0, 0, 0, 0], 0, 5), None);
    }

    #[test]
    fn parse_rdata_dispatches_on_type_and_falls_back_to_raw() {
        let a_rdata = [192, 168, 1, 123];
        match parse_rdata(RecordType::A, &a_rdata, 0, 4) {
            RecordData::A(addr) => assert_eq!(addr, Ipv4Addr::new(192, 168, 1, 123)),
            other => panic!("expected RecordData::A, got {other:?}"),
        }

        // wrong length for A: falls back to Raw rather than disappearing
        match parse_rdata(RecordType::A, &a_rdata, 0, 3) {
            RecordData::Raw { rtype, octets } => {
                assert_eq!(rtype, u16::from(RecordType::A));
                assert_eq!(&octets[..], &a_rdata[..3]);
            }
            other => panic!("expected RecordData::Raw, got {other:?}"),
        }

        let unknown_rdata = [1, 2, 3];
        match parse_rdata(RecordType::Unknown(999), &unknown_rdata, 0, 3) {
            RecordData::Raw { rtype, octets } => {
                assert_eq!(rtype, 999);
                assert_eq!(&octets[..], &unknown_rdata[..]);
            }
            other => panic!("expected RecordData::Raw, got {other:?}"),
        }
    }

    #[test]
    fn s6_qu_bit_tolerance() {
        let plain = RawClass(0x0001);
        let qu = RawClass(0x8001);
        assert_eq!(plain.class(), qu.class());
        assert!(plain.is_in());
        assert!(qu.is_in());
        assert!(!plain.flush_or_unicast_requested());
        assert!(qu.flush_or_unicast_requested());
    }
}
