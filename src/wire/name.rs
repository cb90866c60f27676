//! Domain name encoding and decoding, including RFC 1035 S:4.1.4 pointer
//! compression.
//!
//! Every other codec in this crate delegates to the functions here: the
//! pointer-compression scheme is the one genuinely hard part of the DNS
//! wire format, and keeping it in one place means there is exactly one
//! loop-detection implementation to get right.

use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

/// Maximum encoded length of a domain name: the number of labels plus
/// the sum of the lengths of the labels.
pub const DOMAINNAME_MAX_LEN: usize = 255;

/// Maximum length of a single label in a domain name.
pub const LABEL_MAX_LEN: usize = 63;

/// Top two bits of a length octet that mark it as a pointer rather than
/// a label length.
const POINTER_TAG: u8 = 0b1100_0000;

/// Low 14 bits of a two-octet pointer are the target offset.
const POINTER_OFFSET_MASK: u16 = 0x3FFF;

/// Bound on the number of distinct offsets a single name decode may
/// jump to before it is considered a compression loop. RFC 1035 S:4.1.4
/// pointers are 14 bits wide; in practice a well-formed message never
/// needs more than a handful of jumps to resolve one name, so a small
/// fixed table catches loops without ever allocating.
const MAX_VISITED_POINTERS: usize = 32;

/// A small fixed-capacity set of pointer target offsets, used to detect
/// compression loops without heap allocation.
struct VisitedOffsets {
    slots: [u16; MAX_VISITED_POINTERS],
    count: usize,
}

impl VisitedOffsets {
    fn new() -> Self {
        Self {
            slots: [0; MAX_VISITED_POINTERS],
            count: 0,
        }
    }

    /// Records `offset` as visited. Returns `false` if it was already
    /// present (a loop) or if the table is full (treated as a loop for
    /// safety, since no legitimate name needs this many jumps).
    fn mark(&mut self, offset: u16) -> bool {
        if self.slots[..self.count].contains(&offset) {
            return false;
        }
        if self.count == self.slots.len() {
            return false;
        }
        self.slots[self.count] = offset;
        self.count += 1;
        true
    }
}

/// Decodes the name starting at `offset`, writing the dotted-string
/// form into `scratch` and returning a slice of it together with the
/// offset of the first byte after the name *at the original position*
/// (i.e. after the terminating zero octet, or after the two-octet
/// pointer, whichever terminates the outermost level — offsets visited
/// only by following a pointer never advance this returned offset).
///
/// Malformed input (illegal length-octet bits, a compression loop, a
/// pointer past the end of the buffer) yields an empty slice; the
/// returned offset is still valid for resuming parsing of whatever
/// follows, per the "parse what you can" error model.
///
/// Non-ASCII label bytes degrade to an empty slice here, since this
/// function promises a `&str`; the lossless byte-level representation
/// is `DomainName`/`Label`, which do not require valid UTF-8.
pub fn extract<'s>(buffer: &[u8], offset: usize, scratch: &'s mut [u8]) -> (&'s str, usize) {
    let mut visited = VisitedOffsets::new();
    let mut cursor = offset;
    let mut outer_after: Option<usize> = None;
    let mut written = 0usize;
    let mut first_label = true;

    loop {
        let Some(&len_octet) = buffer.get(cursor) else {
            let after = outer_after.unwrap_or(buffer.len());
            return (decode_scratch(scratch, written), after);
        };
        match len_octet & POINTER_TAG {
            0b0000_0000 if len_octet == 0 => {
                let after = *outer_after.get_or_insert(cursor + 1);
                return (decode_scratch(scratch, written), after);
            }
            0b0000_0000 => {
                let label_len = len_octet as usize;
                let start = cursor + 1;
                let end = start + label_len;
                if end > buffer.len() {
                    let after = outer_after.unwrap_or(buffer.len());
                    return (decode_scratch(scratch, written), after);
                }
                if !first_label && written < scratch.len() {
                    scratch[written] = b'.';
                    written += 1;
                }
                first_label = false;
                for &b in &buffer[start..end] {
                    if written < scratch.len() {
                        scratch[written] = b;
                        written += 1;
                    }
                }
                cursor = end;
            }
            POINTER_TAG => {
                let Some(&lo) = buffer.get(cursor + 1) else {
                    let after = *outer_after.get_or_insert(cursor + 1);
                    return ("", after);
                };
                let after = *outer_after.get_or_insert(cursor + 2);
                let ptr = (u16::from(len_octet & !POINTER_TAG) << 8 | u16::from(lo))
                    & POINTER_OFFSET_MASK;
                let ptr = ptr as usize;
                if ptr >= buffer.len() || !visited.mark(ptr as u16) {
                    return ("", after);
                }
                cursor = ptr;
            }
            _ => {
                let after = *outer_after.get_or_insert(cursor + 1);
                return ("", after);
            }
        }
    }
}

fn decode_scratch(scratch: &[u8], written: usize) -> &str {
    std::str::from_utf8(&scratch[..written]).unwrap_or("")
}

/// Advances past a name without materializing it. Applies the same
/// termination rules as [`extract`] but does not follow pointers: a
/// pointer is two octets and terminates the name immediately. Returns
/// `None` on truncation (a length octet, label, or pointer octet runs
/// past `buffer`'s end).
pub fn skip(buffer: &[u8], offset: usize) -> Option<usize> {
    let mut cursor = offset;
    loop {
        let len_octet = *buffer.get(cursor)?;
        match len_octet & POINTER_TAG {
            0b0000_0000 if len_octet == 0 => return Some(cursor + 1),
            0b0000_0000 => {
                let label_len = len_octet as usize;
                let end = cursor.checked_add(1)?.checked_add(label_len)?;
                if end > buffer.len() {
                    return None;
                }
                cursor = end;
            }
            POINTER_TAG => {
                if buffer.get(cursor + 1).is_none() {
                    return None;
                }
                return Some(cursor + 2);
            }
            _ => return Some(cursor + 1),
        }
    }
}

/// Compares two encoded names label-by-label, case-insensitively per
/// RFC 1035 S:2.3.3 (ASCII only), following pointers in both operands.
/// Returns `true` iff the fully-decoded label sequences match exactly.
pub fn equal(buf_a: &[u8], off_a: usize, buf_b: &[u8], off_b: usize) -> bool {
    let mut cursor_a = off_a;
    let mut cursor_b = off_b;
    let mut visited_a = VisitedOffsets::new();
    let mut visited_b = VisitedOffsets::new();
    loop {
        let label_a = match next_label(buf_a, &mut cursor_a, &mut visited_a) {
            Some(l) => l,
            None => return false,
        };
        let label_b = match next_label(buf_b, &mut cursor_b, &mut visited_b) {
            Some(l) => l,
            None => return false,
        };
        match (label_a, label_b) {
            (None, None) => return true,
            (Some(a), Some(b)) => {
                if !a.eq_ignore_ascii_case(b) {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

/// Yields the next label in a name, transparently following pointers.
/// `Some(None)` is the terminating zero label; `Some(Some(bytes))` is a
/// literal label; `None` is truncation, a malformed length octet, or a
/// compression loop.
fn next_label<'a>(
    buffer: &'a [u8],
    cursor: &mut usize,
    visited: &mut VisitedOffsets,
) -> Option<Option<&'a [u8]>> {
    loop {
        let len_octet = *buffer.get(*cursor)?;
        match len_octet & POINTER_TAG {
            0b0000_0000 if len_octet == 0 => {
                *cursor += 1;
                return Some(None);
            }
            0b0000_0000 => {
                let label_len = len_octet as usize;
                let start = *cursor + 1;
                let end = start.checked_add(label_len)?;
                if end > buffer.len() {
                    return None;
                }
                let bytes = &buffer[start..end];
                *cursor = end;
                return Some(Some(bytes));
            }
            POINTER_TAG => {
                let lo = *buffer.get(*cursor + 1)?;
                let ptr = (u16::from(len_octet & !POINTER_TAG) << 8 | u16::from(lo))
                    & POINTER_OFFSET_MASK;
                let ptr = ptr as usize;
                if ptr >= buffer.len() || !visited.mark(ptr as u16) {
                    return None;
                }
                *cursor = ptr;
            }
            _ => return None,
        }
    }
}

/// Errors that can arise writing a name or pointer to a capacity-bounded
/// buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum WriteError {
    /// The encoded bytes do not fit in the remaining output capacity.
    Overflow,
    /// A pointer target does not fit in 14 bits.
    PointerOffsetTooLarge,
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WriteError::Overflow => write!(f, "output buffer capacity exceeded"),
            WriteError::PointerOffsetTooLarge => {
                write!(f, "compression pointer offset does not fit in 14 bits")
            }
        }
    }
}

impl std::error::Error for WriteError {}

/// A capacity-bounded append cursor over a caller-owned output buffer.
/// All writes fail with [`WriteError::Overflow`] rather than growing the
/// buffer or panicking, matching this crate's "operation fails wholesale,
/// no partial packet is emitted" error model.
pub struct WireWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> WireWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn put_u8(&mut self, value: u8) -> Result<(), WriteError> {
        self.put_bytes(&[value])
    }

    pub fn put_u16(&mut self, value: u16) -> Result<(), WriteError> {
        self.put_bytes(&value.to_be_bytes())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<(), WriteError> {
        self.put_bytes(&value.to_be_bytes())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), WriteError> {
        let end = self.len.checked_add(bytes.len()).ok_or(WriteError::Overflow)?;
        if end > self.buf.len() {
            return Err(WriteError::Overflow);
        }
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }

    /// Overwrites a previously-written `u16` at `at`, used to backpatch
    /// an rdlength field once the rdata has been written.
    pub fn patch_u16(&mut self, at: usize, value: u16) {
        self.buf[at..at + 2].copy_from_slice(&value.to_be_bytes());
    }
}

/// Writes `name` in full label form followed by a zero terminator,
/// returning the offset at which each label (including the trailing
/// root label) begins. Callers building compressed names that share a
/// common suffix use these offsets as later pointer targets.
pub fn write_literal_with_label_offsets(
    writer: &mut WireWriter,
    name: &DomainName,
) -> Result<Vec<usize>, WriteError> {
    let mut offsets = Vec::with_capacity(name.labels.len());
    for label in &name.labels {
        offsets.push(writer.len());
        writer.put_u8(label.len())?;
        writer.put_bytes(label.octets())?;
    }
    Ok(offsets)
}

/// Writes `name` in full label form followed by a zero terminator.
pub fn write_literal(writer: &mut WireWriter, name: &DomainName) -> Result<(), WriteError> {
    write_literal_with_label_offsets(writer, name).map(|_| ())
}

/// Builds `prefix_leaf`'s own labels (its trailing root label dropped)
/// followed by all of `suffix`'s labels, e.g. `prefixed("My Printer.",
/// "_http._tcp.local.")` yields `"My Printer._http._tcp.local."`.
/// Returns `None` if the combined name would exceed
/// [`DOMAINNAME_MAX_LEN`].
pub fn prefixed(prefix_leaf: &DomainName, suffix: &DomainName) -> Option<DomainName> {
    let mut labels = prefix_leaf.labels.clone();
    labels.pop();
    labels.extend(suffix.labels.iter().cloned());
    DomainName::from_labels(labels)
}

/// Writes only a two-octet pointer to `ref_offset`.
pub fn write_pointer(writer: &mut WireWriter, ref_offset: u16) -> Result<(), WriteError> {
    if ref_offset > POINTER_OFFSET_MASK {
        return Err(WriteError::PointerOffsetTooLarge);
    }
    writer.put_u16(POINTER_TAG as u16 * 0x100 | ref_offset)
}

/// Writes the labels of `name` up to (but not including) its trailing
/// root label, followed by a pointer to `ref_offset` in place of the
/// final zero terminator. This is the common case for building answers
/// whose domains end with a previously-written service suffix: the
/// suffix is written once, full-length, elsewhere in the message, and
/// every subsequent name referencing it writes only its own distinct
/// prefix labels plus a two-octet pointer back to that suffix.
pub fn write_literal_with_suffix_pointer(
    writer: &mut WireWriter,
    name: &DomainName,
    suffix_label_count: usize,
    ref_offset: u16,
) -> Result<(), WriteError> {
    let prefix_len = name.labels.len().saturating_sub(suffix_label_count);
    for label in &name.labels[..prefix_len] {
        writer.put_u8(label.len())?;
        writer.put_bytes(label.octets())?;
    }
    write_pointer(writer, ref_offset)
}

/// A domain name is a sequence of labels, where each label is a length
/// octet followed by that number of octets. A label must be 63 octets
/// or shorter; a name must be 255 octets or shorter in total, including
/// both length and label octets.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DomainName {
    pub labels: Vec<Label>,
    // INVARIANT: len == len(labels) + sum(map(len, labels))
    len: usize,
}

impl DomainName {
    pub fn root_domain() -> Self {
        DomainName {
            labels: vec![Label::new()],
            len: 1,
        }
    }

    pub fn is_root(&self) -> bool {
        self.len == 1 && self.labels[0].is_empty()
    }

    pub fn encoded_len(&self) -> usize {
        self.len
    }

    pub fn to_dotted_string(&self) -> String {
        if self.is_root() {
            return ".".to_string();
        }

        let mut out = String::with_capacity(self.len);
        let mut first = true;
        for label in &self.labels {
            if first {
                first = false;
            } else {
                out.push('.');
            }
            for octet in label.octets() {
                out.push(*octet as char);
            }
        }

        out
    }

    pub fn from_dotted_string(s: &str) -> Option<Self> {
        if s == "." {
            return Some(Self::root_domain());
        }

        let chunks = s.split('.').collect::<Vec<_>>();
        let mut labels = Vec::with_capacity(chunks.len());

        for (i, label_chars) in chunks.iter().enumerate() {
            if label_chars.is_empty() && i != chunks.len() - 1 {
                return None;
            }

            match label_chars.as_bytes().try_into() {
                Ok(label) => labels.push(label),
                Err(_) => return None,
            }
        }

        Self::from_labels(labels)
    }

    pub fn from_labels(labels: Vec<Label>) -> Option<Self> {
        if labels.is_empty() {
            return None;
        }

        let mut len = labels.len();
        let mut blank_label = false;

        for label in &labels {
            if blank_label {
                return None;
            }

            blank_label |= label.is_empty();
            len += label.len() as usize;
        }

        if blank_label && len <= DOMAINNAME_MAX_LEN {
            Some(Self { labels, len })
        } else {
            None
        }
    }

    /// Decodes a name at `offset`, returning the owned `DomainName` and
    /// the offset of the first byte after it at the original position.
    /// Unlike [`extract`] this never fails to allocate a result: a
    /// malformed or looping name decodes as the root domain, since
    /// `DomainName` cannot represent "no name at all".
    pub fn read(buffer: &[u8], offset: usize) -> (DomainName, usize) {
        let mut scratch = [0u8; DOMAINNAME_MAX_LEN * 4];
        let (decoded, after) = extract(buffer, offset, &mut scratch);
        // `extract` returns the name without its trailing dot (S:4.1), but
        // `from_dotted_string` requires one to mark the root label - add
        // it back before reparsing, or every non-root name would silently
        // collapse to root.
        let name = if decoded.is_empty() {
            DomainName::root_domain()
        } else {
            let mut dotted = String::with_capacity(decoded.len() + 1);
            dotted.push_str(decoded);
            dotted.push('.');
            DomainName::from_dotted_string(&dotted).unwrap_or_else(DomainName::root_domain)
        };
        (name, after)
    }

    pub fn write(&self, writer: &mut WireWriter) -> Result<(), WriteError> {
        write_literal(writer, self)
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainName")
            .field("to_dotted_string()", &self.to_dotted_string())
            .finish()
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", &self.to_dotted_string())
    }
}

impl FromStr for DomainName {
    type Err = DomainNameFromStr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DomainName::from_dotted_string(s).ok_or(DomainNameFromStr::NoParse)
    }
}

/// Errors that can arise when converting a `&str` into a `DomainName`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DomainNameFromStr {
    NoParse,
}

impl fmt::Display for DomainNameFromStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "could not parse string to domain name")
    }
}

impl std::error::Error for DomainNameFromStr {}

/// A label is a sequence of octets, compared as case-insensitive ASCII.
/// A label can be no longer than 63 octets.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Label {
    /// Private so constructing an invalid `Label` is impossible.
    octets: Bytes,
}

impl Label {
    pub fn new() -> Self {
        Self {
            octets: Bytes::new(),
        }
    }

    #[allow(clippy::missing_panics_doc)]
    pub fn len(&self) -> u8 {
        // safe as the `TryFrom` ensures a label is <= 63 bytes
        self.octets.len().try_into().unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.octets.is_empty()
    }

    pub fn octets(&self) -> &[u8] {
        &self.octets
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<&[u8]> for Label {
    type Error = LabelTryFromOctetsError;

    fn try_from(mixed_case_octets: &[u8]) -> Result<Self, Self::Error> {
        if mixed_case_octets.len() > LABEL_MAX_LEN {
            return Err(LabelTryFromOctetsError::TooLong);
        }

        Ok(Self {
            octets: Bytes::copy_from_slice(&mixed_case_octets.to_ascii_lowercase()),
        })
    }
}

/// Errors that can arise when converting a `[u8]` into a `Label`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum LabelTryFromOctetsError {
    TooLong,
}

// A hand-written impl, not a derive: `len` must stay equal to the sum
// of the label lengths, which a derived impl cannot enforce.
#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for DomainName {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let num_labels = u.int_in_range::<usize>(0..=10)?;
        let mut labels = Vec::new();
        for _ in 0..num_labels {
            labels.push(u.arbitrary()?);
        }
        labels.push(Label::new());
        Ok(DomainName::from_labels(labels).unwrap())
    }
}

#[cfg(any(feature = "test-util", test))]
impl<'a> arbitrary::Arbitrary<'a> for Label {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Label> {
        let label_len = u.int_in_range::<u8>(1..=20)?;
        let mut octets = Vec::with_capacity(label_len.into());
        for b in u.bytes(label_len.into())? {
            let ascii_byte = if b.is_ascii() { *b } else { *b % 128 };
            octets.push(if ascii_byte == b'.' || (ascii_byte as char).is_whitespace() {
                b'x'
            } else {
                ascii_byte.to_ascii_lowercase()
            });
        }
        Ok(Self {
            octets: Bytes::from(octets),
        })
    }
}
