//! DNS-SD Operations (RFC 6763): the four fixed message shapes this
//! library emits, each a thin composition over the message codec with
//! preset flags and record layouts. Every composed packet exploits name
//! compression so that a service suffix, once written, is referenced
//! everywhere else by a two-octet pointer.

use crate::wire::message::{Header, FLAG_AA, FLAG_QR};
use crate::wire::name::{self, DomainName, WireWriter, WriteError};
use std::net::{Ipv4Addr, Ipv6Addr};

/// The well-known mDNS UDP port.
pub const MDNS_PORT: u16 = 5353;

/// The IPv4 mDNS multicast group.
pub const MDNS_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// The IPv6 mDNS multicast group.
pub const MDNS_GROUP_V6: [u8; 16] = [
    0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xfb,
];

/// The DNS-SD service-type enumeration name (RFC 6763 S:9).
pub const SERVICE_ENUMERATION_NAME: &str = "_services._dns-sd._udp.local.";

/// Recommended TTL, in seconds, for the service-type enumeration PTR
/// answered by [`discovery_answer`] (RFC 6762 S:10).
pub const DISCOVERY_TTL_SECS: u32 = 4500;

/// Recommended TTL, in seconds, for the short-lived service records
/// (PTR, SRV, TXT) emitted by [`query_answer`].
pub const SERVICE_RECORD_TTL_SECS: u32 = 10;

/// Recommended TTL, in seconds, for the host address records (A, AAAA)
/// emitted by [`query_answer`].
pub const HOST_RECORD_TTL_SECS: u32 = 60;

const CLASS_IN: u16 = 1;

fn put_record_header(
    writer: &mut WireWriter,
    rtype: u16,
    rclass: u16,
    ttl: u32,
) -> Result<usize, WriteError> {
    writer.put_u16(rtype)?;
    writer.put_u16(rclass)?;
    writer.put_u32(ttl)?;
    let rdlength_at = writer.len();
    writer.put_u16(0)?; // rdlength, backpatched once rdata is written
    Ok(rdlength_at)
}

fn patch_rdlength(writer: &mut WireWriter, rdlength_at: usize) {
    let rdata_len = writer.len() - (rdlength_at + 2);
    writer.patch_u16(rdlength_at, rdata_len as u16);
}

/// Builds a Discovery-Send query (RFC 6763 S:9): a single PTR question
/// for [`SERVICE_ENUMERATION_NAME`], sent to the multicast group on
/// [`MDNS_PORT`]. Matches S3: header `0000 0000 0001 0000 0000 0000`
/// followed by the compressed name and `000C 0001`.
pub fn discovery_send(out: &mut [u8]) -> Result<usize, WriteError> {
    let mut writer = WireWriter::new(out);
    Header::write(&mut writer, 0, 0, 1, 0, 0, 0)?;
    let enumeration_name = DomainName::from_dotted_string(SERVICE_ENUMERATION_NAME)
        .expect("SERVICE_ENUMERATION_NAME is a valid domain name");
    name::write_literal(&mut writer, &enumeration_name)?;
    writer.put_u16(u16::from(crate::wire::record::RecordType::Ptr))?;
    writer.put_u16(CLASS_IN)?;
    Ok(writer.len())
}

/// Builds a Discovery-Answer: a unicast, authoritative response
/// carrying one PTR record mapping [`SERVICE_ENUMERATION_NAME`] to
/// `service` (the service type being advertised). Transaction ID is
/// forced to 0 per RFC 6762 S:18.1.
pub fn discovery_answer(out: &mut [u8], service: &DomainName) -> Result<usize, WriteError> {
    let mut writer = WireWriter::new(out);
    Header::write(&mut writer, 0, FLAG_QR | FLAG_AA, 0, 1, 0, 0)?;
    let enumeration_name = DomainName::from_dotted_string(SERVICE_ENUMERATION_NAME)
        .expect("SERVICE_ENUMERATION_NAME is a valid domain name");
    name::write_literal(&mut writer, &enumeration_name)?;
    let rdlength_at = put_record_header(
        &mut writer,
        u16::from(crate::wire::record::RecordType::Ptr),
        CLASS_IN,
        DISCOVERY_TTL_SECS,
    )?;
    name::write_literal(&mut writer, service)?;
    patch_rdlength(&mut writer, rdlength_at);
    Ok(writer.len())
}

/// Builds a Query-Send: a single question `(name, qtype, IN)`. Whether
/// a receiver should later demultiplex replies by `qtype` is the
/// `only_last_question_match` concern of [`crate::wire::message::parse`],
/// not this function: this library keeps no hidden per-socket state.
pub fn query_send(
    out: &mut [u8],
    name_value: &DomainName,
    qtype: crate::wire::record::RecordType,
) -> Result<usize, WriteError> {
    let mut writer = WireWriter::new(out);
    Header::write(&mut writer, 0, 0, 1, 0, 0, 0)?;
    name::write_literal(&mut writer, name_value)?;
    writer.put_u16(u16::from(qtype))?;
    writer.put_u16(CLASS_IN)?;
    Ok(writer.len())
}

/// The caller-supplied facts needed to answer a service query: an
/// instance leaf label (e.g. `"My Printer."`), the full, dotted service
/// type (e.g. `"_http._tcp.local."`), a host leaf label (e.g.
/// `"printer1."`), a port, optional IPv4/IPv6 addresses, and optional
/// raw TXT rdata.
pub struct ServiceAnswer<'a> {
    pub instance: &'a DomainName,
    pub service: &'a DomainName,
    pub host: &'a DomainName,
    pub port: u16,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub txt: &'a [u8],
}

/// Builds a Query-Answer: a four-record reply (PTR, SRV, and whichever
/// of A/AAAA/TXT the caller supplied) bundled in one packet, with
/// `ttl_override` applied to every record instead of the usual
/// service/host TTL split — used by [`goodbye`] to announce a TTL-0
/// withdrawal using the exact same record layout.
fn build_service_answer(
    out: &mut [u8],
    answer: &ServiceAnswer<'_>,
    ttl_override: Option<u32>,
) -> Result<usize, WriteError> {
    let local =
        DomainName::from_dotted_string("local.").expect("\"local.\" is a valid domain name");

    let instance_full =
        name::prefixed(answer.instance, answer.service).ok_or(WriteError::Overflow)?;
    let host_full = name::prefixed(answer.host, &local).ok_or(WriteError::Overflow)?;

    let service_ttl = ttl_override.unwrap_or(SERVICE_RECORD_TTL_SECS);
    let host_ttl = ttl_override.unwrap_or(HOST_RECORD_TTL_SECS);

    let mut additional_count = 1u16; // SRV is always present
    if answer.ipv4.is_some() {
        additional_count += 1;
    }
    if answer.ipv6.is_some() {
        additional_count += 1;
    }
    if !answer.txt.is_empty() {
        additional_count += 1;
    }

    let mut writer = WireWriter::new(out);
    Header::write(
        &mut writer,
        0,
        FLAG_QR | FLAG_AA,
        0,
        1,
        0,
        additional_count,
    )?;

    // Answer: PTR <service> -> <instance>.<service>
    let service_offsets = name::write_literal_with_label_offsets(&mut writer, answer.service)?;
    let rdlength_at = put_record_header(
        &mut writer,
        u16::from(crate::wire::record::RecordType::Ptr),
        CLASS_IN,
        service_ttl,
    )?;
    let instance_rdata_offset = writer.len();
    name::write_literal_with_suffix_pointer(
        &mut writer,
        &instance_full,
        answer.service.labels.len(),
        service_offsets[0] as u16,
    )?;
    patch_rdlength(&mut writer, rdlength_at);

    // Additional: SRV <instance>.<service> -> (0, 0, port, <host>.local.)
    name::write_pointer(&mut writer, instance_rdata_offset as u16)?;
    let rdlength_at = put_record_header(
        &mut writer,
        u16::from(crate::wire::record::RecordType::Srv),
        CLASS_IN,
        service_ttl,
    )?;
    writer.put_u16(0)?; // priority
    writer.put_u16(0)?; // weight
    writer.put_u16(answer.port)?;
    // the service name's trailing labels are "local." too, so point the
    // host's own "local." suffix at whichever "local" label offset was
    // written as part of the service name rather than repeating it
    let local_label_offset = service_offsets[service_offsets.len() - 2] as u16;
    let host_name_offset = writer.len();
    name::write_literal_with_suffix_pointer(&mut writer, &host_full, local.labels.len(), local_label_offset)?;
    patch_rdlength(&mut writer, rdlength_at);

    // Additional: A <host>.local. -> ipv4
    if let Some(ipv4) = answer.ipv4 {
        name::write_pointer(&mut writer, host_name_offset as u16)?;
        let rdlength_at = put_record_header(
            &mut writer,
            u16::from(crate::wire::record::RecordType::A),
            CLASS_IN,
            host_ttl,
        )?;
        writer.put_bytes(&ipv4.octets())?;
        patch_rdlength(&mut writer, rdlength_at);
    }

    // Additional: AAAA <host>.local. -> ipv6
    if let Some(ipv6) = answer.ipv6 {
        name::write_pointer(&mut writer, host_name_offset as u16)?;
        let rdlength_at = put_record_header(
            &mut writer,
            u16::from(crate::wire::record::RecordType::Aaaa),
            CLASS_IN,
            host_ttl,
        )?;
        writer.put_bytes(&ipv6.octets())?;
        patch_rdlength(&mut writer, rdlength_at);
    }

    // Additional: TXT <instance>.<service> -> answer.txt
    if !answer.txt.is_empty() {
        name::write_pointer(&mut writer, instance_rdata_offset as u16)?;
        let rdlength_at = put_record_header(
            &mut writer,
            u16::from(crate::wire::record::RecordType::Txt),
            CLASS_IN,
            service_ttl,
        )?;
        writer.put_bytes(answer.txt)?;
        patch_rdlength(&mut writer, rdlength_at);
    }

    Ok(writer.len())
}

/// Builds a Query-Answer per RFC 6763: PTR, SRV, and whichever of
/// A/AAAA/TXT the caller supplied, using the standard service/host TTL
/// split (10s / 60s).
pub fn query_answer(out: &mut [u8], answer: &ServiceAnswer<'_>) -> Result<usize, WriteError> {
    build_service_answer(out, answer, None)
}

/// Builds a goodbye packet (RFC 6762 S:10.1): the same record layout as
/// [`query_answer`] but with every TTL forced to 0, announcing that a
/// service instance is being withdrawn.
pub fn goodbye(out: &mut [u8], answer: &ServiceAnswer<'_>) -> Result<usize, WriteError> {
    build_service_answer(out, answer, Some(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::message::{parse, FnSink, Section};
    use crate::wire::record::RecordType;

    #[test]
    fn discovery_send_matches_fixed_layout() {
        let mut buf = [0u8; 64];
        let n = discovery_send(&mut buf).unwrap();
        assert_eq!(&buf[..12], &[0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&buf[n - 4..n], &[0x00, 0x0C, 0x00, 0x01]);
        // "_services._dns-sd._udp.local." encodes as 30 octets: five
        // length-prefixed labels (9+7+4+5 label octets, 5 length octets).
        assert_eq!(n, 12 + 30 + 4);
    }

    #[test]
    fn discovery_send_round_trips_through_message_parse() {
        let mut buf = [0u8; 64];
        let n = discovery_send(&mut buf).unwrap();
        let mut seen_qtype = None;
        let mut sink = FnSink {
            on_question: |_, _, qtype, qclass, _| {
                seen_qtype = Some((qtype, qclass));
                true
            },
            on_record: |_| true,
        };
        let delivered = parse(&buf[..n], &mut sink, None);
        assert_eq!(delivered, 0);
        assert_eq!(seen_qtype, Some((u16::from(RecordType::Ptr), CLASS_IN)));
    }

    #[test]
    fn query_answer_carries_all_supplied_records() {
        let instance = DomainName::from_dotted_string("My Printer.").unwrap();
        let service = DomainName::from_dotted_string("_http._tcp.local.").unwrap();
        let host = DomainName::from_dotted_string("printer1.").unwrap();
        let answer = ServiceAnswer {
            instance: &instance,
            service: &service,
            host: &host,
            port: 631,
            ipv4: Some(Ipv4Addr::new(192, 168, 1, 50)),
            ipv6: None,
            txt: b"\x09txtvers=1",
        };

        let mut buf = [0u8; 512];
        let n = query_answer(&mut buf, &answer).unwrap();

        let mut sections = Vec::new();
        let mut sink = FnSink {
            on_question: |_, _, _, _, _| true,
            on_record: |entry: crate::wire::message::RecordEntry<'_>| {
                sections.push((entry.section, RecordType::from(entry.rtype), entry.ttl));
                true
            },
        };
        let delivered = parse(&buf[..n], &mut sink, None);
        assert_eq!(delivered, 4);
        assert_eq!(
            sections,
            vec![
                (Section::Answer, RecordType::Ptr, SERVICE_RECORD_TTL_SECS),
                (Section::Additional, RecordType::Srv, SERVICE_RECORD_TTL_SECS),
                (Section::Additional, RecordType::A, HOST_RECORD_TTL_SECS),
                (Section::Additional, RecordType::Txt, SERVICE_RECORD_TTL_SECS),
            ]
        );
    }

    #[test]
    fn goodbye_forces_every_ttl_to_zero() {
        let instance = DomainName::from_dotted_string("My Printer.").unwrap();
        let service = DomainName::from_dotted_string("_http._tcp.local.").unwrap();
        let host = DomainName::from_dotted_string("printer1.").unwrap();
        let answer = ServiceAnswer {
            instance: &instance,
            service: &service,
            host: &host,
            port: 631,
            ipv4: None,
            ipv6: None,
            txt: b"",
        };

        let mut buf = [0u8; 512];
        let n = goodbye(&mut buf, &answer).unwrap();

        let mut ttls = Vec::new();
        let mut sink = FnSink {
            on_question: |_, _, _, _, _| true,
            on_record: |entry: crate::wire::message::RecordEntry<'_>| {
                ttls.push(entry.ttl);
                true
            },
        };
        parse(&buf[..n], &mut sink, None);
        assert!(ttls.iter().all(|&ttl| ttl == 0));
        assert_eq!(ttls.len(), 2);
    }
}
