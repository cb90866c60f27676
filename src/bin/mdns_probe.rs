use std::net::{IpAddr, Ipv4Addr};
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};

use mdns_sd::sd::{self, ServiceAnswer};
use mdns_sd::transport::{Transport, UdpTransport};
use mdns_sd::wire::message::{self, FnSink, RecordEntry, Section};
use mdns_sd::wire::name::DomainName;
use mdns_sd::wire::record::{self, RecordType};

// the doc comments for this struct turn into the CLI help text
#[derive(Parser)]
/// mDNS / DNS-SD probe utility
///
/// Sends a single Discovery-Send or Query-Send packet to the mDNS
/// multicast group on the given interface and prints every answer
/// received within the listen window.
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Local IPv4 interface address to join the multicast group on
    #[clap(short, long, value_parser, default_value = "0.0.0.0")]
    interface: Ipv4Addr,

    /// How long to listen for answers after sending the query
    #[clap(short, long, value_parser, default_value = "2")]
    listen_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate service types advertised on the network (RFC 6763 S:9)
    Discover,
    /// Query for a specific service type's instances
    Query {
        /// Service type to query for, e.g. "_http._tcp.local."
        service: DomainName,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let transport = match UdpTransport::bind_v4(args.interface) {
        Ok(t) => t,
        Err(err) => {
            eprintln!("could not bind mDNS socket: {err}");
            process::exit(1);
        }
    };

    let mut out = [0u8; 512];
    let dest = UdpTransport::multicast_addr(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    let (n, expect_type) = match &args.command {
        Command::Discover => {
            let n = sd::discovery_send(&mut out).unwrap_or_else(|err| {
                eprintln!("failed to build discovery query: {err}");
                process::exit(1);
            });
            (n, RecordType::Ptr)
        }
        Command::Query { service } => {
            let n = sd::query_send(&mut out, service, RecordType::Ptr).unwrap_or_else(|err| {
                eprintln!("failed to build service query: {err}");
                process::exit(1);
            });
            (n, RecordType::Ptr)
        }
    };

    println!(";; QUESTION");
    println!("{expect_type}\tIN\t(sent {n} octets)");

    if let Err(err) = transport.send(&out[..n], dest).await {
        eprintln!("failed to send mDNS query: {err}");
        process::exit(1);
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.listen_secs);
    let mut recv_buf = [0u8; 9000];

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, transport.recv(&mut recv_buf)).await {
            Ok(Ok((len, src))) => print_answers(&recv_buf[..len], src),
            Ok(Err(err)) => {
                eprintln!(";; recv error: {err}");
                break;
            }
            Err(_timed_out) => break,
        }
    }
}

fn print_answers(buf: &[u8], src: std::net::SocketAddr) {
    let mut sink = FnSink {
        on_question: |_, _, _, _, _| true,
        on_record: |entry: RecordEntry<'_>| {
            print_record(&entry);
            true
        },
    };
    let delivered = message::parse(buf, &mut sink, None);
    if delivered > 0 {
        println!("\n;; ANSWER from {src}");
    }
}

fn print_record(entry: &RecordEntry<'_>) {
    let rtype = RecordType::from(entry.rtype);
    let heading = match entry.section {
        Section::Answer => "ANSWER",
        Section::Authority => "AUTHORITY",
        Section::Additional => "ADDITIONAL",
        Section::Question => return,
    };
    let rdata = record::parse_rdata(rtype, entry.buffer, entry.rdata_offset, entry.rdata_length);
    println!("[{heading}]\t{rtype}\t{}\t{rdata}", entry.ttl);
}

// exercised indirectly by the `ServiceAnswer` construction below; kept
// here so a caller copying this binary as a starting point for a
// responder sees the answer path alongside the query path.
#[allow(dead_code)]
fn build_example_answer(out: &mut [u8]) -> Result<usize, mdns_sd::wire::name::WriteError> {
    let instance = DomainName::from_dotted_string("My Printer.").unwrap();
    let service = DomainName::from_dotted_string("_http._tcp.local.").unwrap();
    let host = DomainName::from_dotted_string("printer1.local.").unwrap();
    let answer = ServiceAnswer {
        instance: &instance,
        service: &service,
        host: &host,
        port: 631,
        ipv4: Some(Ipv4Addr::new(192, 168, 1, 50)),
        ipv6: None,
        txt: b"",
    };
    sd::query_answer(out, &answer)
}
