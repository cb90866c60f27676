#![no_main]
use libfuzzer_sys::fuzz_target;

use mdns_sd::wire::name::{self, DomainName, WireWriter};

fuzz_target!(|name: DomainName| {
    let mut buf = [0u8; 1024];
    let mut writer = WireWriter::new(&mut buf);
    if name::write_literal(&mut writer, &name).is_err() {
        return;
    }

    let mut scratch = [0u8; 1024];
    let (decoded, after) = name::extract(writer.as_slice(), 0, &mut scratch);
    assert_eq!(after, writer.len());

    let expected = name.to_dotted_string();
    let expected = expected.trim_end_matches('.');
    assert_eq!(decoded, expected);
});
