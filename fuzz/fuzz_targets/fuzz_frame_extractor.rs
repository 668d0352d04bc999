//! Fuzz target: `FrameExtractor::feed`
//!
//! Drives arbitrary byte sequences into the host-side frame extractor,
//! split at a fuzzer-chosen point, and checks that it never panics, never
//! yields a payload containing a frame delimiter and never holds more
//! than its limit between calls.
//!
//! cargo fuzz run fuzz_frame_extractor

#![no_main]

use homecage_ac::host::extractor::FrameExtractor;
use homecage_ac::protocol::{AcMessage, FRAME_END, FRAME_START};
use libfuzzer_sys::fuzz_target;

const LIMIT: usize = 512;

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let at = usize::from(split).min(rest.len());
    let mut extractor = FrameExtractor::new(LIMIT);

    for chunk in [&rest[..at], &rest[at..]] {
        for payload in extractor.feed(chunk) {
            assert!(!payload.contains(FRAME_START), "nested opener in {payload:?}");
            assert!(!payload.contains(FRAME_END), "terminator in {payload:?}");
            let _ = AcMessage::parse(&payload);
        }
        assert!(extractor.pending() <= LIMIT, "extractor holds {} bytes", extractor.pending());
    }

    // After a clear the extractor must accept bytes cleanly again.
    extractor.clear();
    assert_eq!(extractor.pending(), 0);
    let _ = extractor.feed(rest);
});
