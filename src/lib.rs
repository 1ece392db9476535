//! # Hash Trace
//!
//! A hashed-string log protocol: instrumented programs print a 128-bit hash
//! of each trace message plus its numeric arguments, and a decoder turns
//! those lines back into text using a table generated from the sources.
//!
//! * **Small output**: a trace line is 32 hex characters plus its arguments,
//!   however long the message is
//! * **No runtime strings**: message text lives only in the table, hashes are
//!   computed at compile time
//! * **Mixed streams**: lines without a known hash pass through untouched
//!
//! ## Main Components
//!
//! * `TraceExtractor`: scans source trees for `HashTrace::<level>("...")`
//!   call sites and writes `trace.csv`
//! * `TraceDecoder`: loads the table and decodes a stream of output lines
//! * `HashTrace` / `TracePrinter`: compile-time ids and the line encoder used
//!   by instrumented code
//! * `md5`: the `const fn` digest shared by both sides
//!
//! ## Quick Start
//!
//! ```
//! use hash_trace::{extractor, HashTrace, TraceDecoder, TracePrinter};
//! use std::path::Path;
//!
//! // Build time: find call sites and build the table
//! let source = r#"trace.print(HashTrace::info("value={}"), v);"#;
//! let sites = extractor::scan_source(Path::new("main.cpp"), source);
//! let table = extractor::build_table(&sites).to_lookup();
//!
//! // Run time: the program prints the hash and its arguments in hex
//! let mut encoded = Vec::new();
//! TracePrinter::new(&mut encoded)
//!     .print(HashTrace::info("value={}"), &[42])
//!     .unwrap();
//!
//! // Decode
//! let decoder = TraceDecoder::new(table);
//! let line = String::from_utf8(encoded).unwrap();
//! assert_eq!(decoder.decode_line(line.trim_end()), "I:value=42");
//! ```

pub mod canonical;
pub mod config;
pub mod decoder;
pub mod error;
pub mod extractor;
pub mod hash_table;
pub mod hash_trace;
pub mod md5;
pub mod template;

pub use canonical::{trace_hash, CanonicalMessage, TraceLevel};
pub use decoder::{
    decode_line, Decoded, LineSource, ProcessSource, ReaderSource, RunStats, TraceDecoder,
};
pub use error::{DecodeError, RowError, TemplateError, TraceError};
pub use extractor::{TraceCallSite, TraceExtractor};
pub use hash_table::{HashTable, HashTableEntry, TraceTable};
pub use hash_trace::{HashTrace, TraceId, TracePrinter};
pub use template::ColorMode;
