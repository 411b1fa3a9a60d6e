#![no_main]
use libfuzzer_sys::fuzz_target;
use omapi::InBuffer;

fuzz_target!(|data: &[u8]| {
    let mut buf = InBuffer::new();
    if buf.feed(data).is_err() {
        return;
    }

    let got = match buf.parse_message() {
        Ok(Some(m)) => m,
        _ => return,
    };

    let encoded = got.as_string(false).expect("a parsed message always re-serialises");

    let mut roundtrip = InBuffer::new();
    roundtrip.feed(&encoded).expect("re-encoded message is within the size limit");
    let got2 = roundtrip
        .parse_message()
        .expect("re-encoded message must parse")
        .expect("re-encoded message is complete");

    assert_eq!(got, got2);
});
