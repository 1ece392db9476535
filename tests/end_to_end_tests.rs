use hash_trace::{
    trace_hash, HashTrace, ReaderSource, TraceDecoder, TraceExtractor, TraceId, TraceLevel,
    TracePrinter, TraceTable,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::io::Cursor;
use tempfile::tempdir;

const BOOT: TraceId = HashTrace::info("boot complete");
const DISK: TraceId = HashTrace::warning("disk low: {} blocks left on {:#x}");
const FAULT: TraceId = HashTrace::error("fault {:#b} code {}");

// The same call sites, as the extractor sees them in an instrumented program.
static INSTRUMENTED_SOURCE: &str = r#"
const BOOT: TraceId = HashTrace::info("boot complete");
const DISK: TraceId = HashTrace::warning("disk low: {} blocks left on {:#x}");
const FAULT: TraceId =
    HashTrace::error(
        "fault {:#b} code {}");
"#;

#[test]
fn test_compile_time_ids_match_extracted_hashes() {
    assert_eq!(BOOT.as_str(), trace_hash(TraceLevel::Info, "boot complete"));
    assert_eq!(
        DISK.to_string(),
        trace_hash(TraceLevel::Warning, "disk low: {} blocks left on {:#x}")
    );
    assert_eq!(FAULT.as_str().len(), 32);
}

#[test]
fn test_extract_print_decode() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::write(src.path().join("app.rs"), INSTRUMENTED_SOURCE).unwrap();

    let path = TraceExtractor::new([".rs"]).extract(src.path(), out.path()).unwrap();
    let table = TraceTable::load(&path).unwrap();
    assert_eq!(table.len(), 3);

    let mut printer = TracePrinter::new(Vec::new());
    printer.print(BOOT, &[]).unwrap();
    printer.print(DISK, &[42, 0x1f]).unwrap();
    printer.print(FAULT, &[0b101, -3]).unwrap();
    let mut stream = b"plain output\n".to_vec();
    stream.extend(printer.into_inner());

    let mut decoded = Vec::new();
    let stats = TraceDecoder::new(table)
        .run(ReaderSource::new(Cursor::new(stream)), &mut decoded)
        .unwrap();

    assert_eq!(
        String::from_utf8(decoded).unwrap(),
        "plain output\n\
         I:boot complete\n\
         W:disk low: 42 blocks left on 0x1f\n\
         E:fault 0b101 code -3\n"
    );
    assert_eq!(stats.decoded, 3);
    assert_eq!(stats.failed, 0);
}

#[test]
fn test_hash_is_deterministic_across_runs() {
    let first: Vec<String> = (0..3).map(|_| trace_hash(TraceLevel::Error, "x")).collect();
    assert!(first.iter().all(|hash| hash == &first[0]));
    assert_eq!(first[0], HashTrace::error("x").to_string());
}
