#![no_main]
use libfuzzer_sys::fuzz_target;

use mdns_sd::wire::message::{self, FnSink};
use mdns_sd::wire::name::DomainName;

// Arbitrary bytes are never a valid reason to panic: `message::parse` and
// `DomainName::read` must return cleanly (possibly with the root name, or
// zero records delivered) for any input, truncated or malformed.
fuzz_target!(|data: &[u8]| {
    let mut sink = FnSink {
        on_question: |_, _, _, _, _| true,
        on_record: |_| true,
    };
    message::parse(data, &mut sink, None);

    let (name, after) = DomainName::read(data, 0);
    assert!(after <= data.len().max(1));
    let _ = name.to_dotted_string();
});
