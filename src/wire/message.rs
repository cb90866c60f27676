//! The 12-octet DNS header plus the four counted sections (questions,
//! answers, authority, additional) that make up a full message.
//!
//! Parsing is callback-driven rather than building an owned `Message`
//! struct up front: a caller interested only in answers of one type
//! never pays to allocate a `Vec` of questions it will discard, and a
//! truncated or hostile packet still yields every record successfully
//! read before the point of failure.

use crate::wire::name::{self, WireWriter, WriteError};
use crate::wire::record::RecordType;

/// Bit 15 (QR): message is a response.
pub const FLAG_QR: u16 = 0x8000;
/// Bits 11-14: opcode. Always 0 (standard query) for mDNS/DNS-SD.
pub const FLAG_AA: u16 = 0x0400;
pub const FLAG_TC: u16 = 0x0200;
pub const FLAG_RD: u16 = 0x0100;
pub const FLAG_RA: u16 = 0x0080;

/// The 12-octet message header. Section counts are not retained beyond
/// parsing: S:3's invariant that "the sum of section counts may exceed
/// what the packet actually contains" means the authoritative record of
/// how many records actually got delivered is the return value of
/// [`parse`], not these fields.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl Header {
    pub fn parse(buffer: &[u8]) -> Option<Header> {
        Some(Header {
            id: read_u16(buffer, 0)?,
            flags: read_u16(buffer, 2)?,
            qdcount: read_u16(buffer, 4)?,
            ancount: read_u16(buffer, 6)?,
            nscount: read_u16(buffer, 8)?,
            arcount: read_u16(buffer, 10)?,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn write(
        writer: &mut WireWriter,
        transaction_id: u16,
        flags: u16,
        qdcount: u16,
        ancount: u16,
        nscount: u16,
        arcount: u16,
    ) -> Result<(), WriteError> {
        writer.put_u16(transaction_id)?;
        writer.put_u16(flags)?;
        writer.put_u16(qdcount)?;
        writer.put_u16(ancount)?;
        writer.put_u16(nscount)?;
        writer.put_u16(arcount)
    }
}

/// Which section a delivered question or record came from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Section {
    Question,
    Answer,
    Authority,
    Additional,
}

/// A resource record delivered to a [`MessageSink`]. `rclass` and
/// `cache_flush` are already split out of the raw wire class field, per
/// S:4.3 step 4 ("class & 0x7FFF").
#[derive(Debug, Copy, Clone)]
pub struct RecordEntry<'a> {
    pub section: Section,
    pub transaction_id: u16,
    pub rtype: u16,
    pub rclass: u16,
    pub cache_flush: bool,
    pub ttl: u32,
    pub buffer: &'a [u8],
    pub rdata_offset: usize,
    pub rdata_length: usize,
}

/// The callback sink invoked once per question and once per resource
/// record during [`parse`]. Returning `false` from either method aborts
/// iteration for the remainder of that `parse` call, mirroring the
/// source's "nonzero return aborts" contract.
pub trait MessageSink {
    fn on_question(
        &mut self,
        section: Section,
        transaction_id: u16,
        qtype: u16,
        qclass: u16,
        unicast_requested: bool,
    ) -> bool;

    fn on_record(&mut self, entry: RecordEntry<'_>) -> bool;
}

/// Adapts two `FnMut` closures into a [`MessageSink`], for callers who
/// would rather not define a type just to parse one message.
pub struct FnSink<Q, R> {
    pub on_question: Q,
    pub on_record: R,
}

impl<Q, R> MessageSink for FnSink<Q, R>
where
    Q: FnMut(Section, u16, u16, u16, bool) -> bool,
    R: FnMut(RecordEntry<'_>) -> bool,
{
    fn on_question(
        &mut self,
        section: Section,
        transaction_id: u16,
        qtype: u16,
        qclass: u16,
        unicast_requested: bool,
    ) -> bool {
        (self.on_question)(section, transaction_id, qtype, qclass, unicast_requested)
    }

    fn on_record(&mut self, entry: RecordEntry<'_>) -> bool {
        (self.on_record)(entry)
    }
}

/// Parses the header and all four sections of `buffer`, delivering each
/// question and record to `sink` in wire order. Returns the number of
/// records (answers, authority, and additional combined; not
/// questions) successfully delivered.
///
/// If `only_last_question_match` is set, records whose type does not
/// match it are skipped (not delivered, though the cursor still
/// advances past them) — this is how the DNS-SD operations layer
/// demultiplexes answers on a socket that has issued more than one
/// query, per S:4.3's `only_last_question_match` option.
///
/// Any read that would run past `buffer`'s end stops the loop cleanly;
/// records already delivered remain delivered.
pub fn parse<S: MessageSink>(
    buffer: &[u8],
    sink: &mut S,
    only_last_question_match: Option<RecordType>,
) -> usize {
    let Some(header) = Header::parse(buffer) else {
        return 0;
    };
    let mut cursor = 12usize;
    let mut delivered = 0usize;

    for _ in 0..header.qdcount {
        let Some(after_name) = name::skip(buffer, cursor) else {
            return delivered;
        };
        let (Some(qtype), Some(qclass_raw)) = (
            read_u16(buffer, after_name),
            read_u16(buffer, after_name + 2),
        ) else {
            return delivered;
        };
        cursor = after_name + 4;
        let keep_going = sink.on_question(
            Section::Question,
            header.id,
            qtype,
            qclass_raw & 0x7FFF,
            qclass_raw & 0x8000 != 0,
        );
        if !keep_going {
            return delivered;
        }
    }

    let sections = [
        (Section::Answer, header.ancount),
        (Section::Authority, header.nscount),
        (Section::Additional, header.arcount),
    ];

    for (section, count) in sections {
        for _ in 0..count {
            let Some(after_name) = name::skip(buffer, cursor) else {
                return delivered;
            };
            let (Some(rtype), Some(rclass_raw), Some(ttl), Some(rdlength)) = (
                read_u16(buffer, after_name),
                read_u16(buffer, after_name + 2),
                read_u32(buffer, after_name + 4),
                read_u16(buffer, after_name + 8),
            ) else {
                return delivered;
            };
            let rdata_offset = after_name + 10;
            let rdata_length = rdlength as usize;
            if rdata_offset.checked_add(rdata_length).map(|e| e > buffer.len()) != Some(false) {
                return delivered;
            }
            cursor = rdata_offset + rdata_length;

            if let Some(expected) = only_last_question_match {
                if RecordType::from(rtype) != expected {
                    continue;
                }
            }

            let entry = RecordEntry {
                section,
                transaction_id: header.id,
                rtype,
                rclass: rclass_raw & 0x7FFF,
                cache_flush: rclass_raw & 0x8000 != 0,
                ttl,
                buffer,
                rdata_offset,
                rdata_length,
            };
            delivered += 1;
            if !sink.on_record(entry) {
                return delivered;
            }
        }
    }

    delivered
}

fn read_u16(buffer: &[u8], offset: usize) -> Option<u16> {
    let bytes: [u8; 2] = buffer.get(offset..offset + 2)?.try_into().ok()?;
    Some(u16::from_be_bytes(bytes))
}

fn read_u32(buffer: &[u8], offset: usize) -> Option<u32> {
    let bytes: [u8; 4] = buffer.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}
