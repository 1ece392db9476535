//! Constants shared by the build-time extractor and the run-time decoder.
//!
//! Both sides must agree on every value here: changing any of them changes
//! either the hashes or the table format.

/// Literal token that starts every trace call site, e.g. `HashTrace::info("...")`.
pub const CALL_MARKER: &str = "HashTrace::";

/// Width of a hex-encoded digest (128 bits, two chars per byte).
pub const HASH_HEX_LEN: usize = 32;

/// Name of the table file written into the output directory.
pub const TABLE_FILE_NAME: &str = "trace.csv";

/// Field separator of the table file.
pub const TABLE_DELIMITER: char = ';';

/// Quote character used when a message needs escaping in the table file.
pub const TABLE_QUOTE: char = '"';

/// Source file extensions scanned when none are given.
pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &[".cpp", ".h"];

/// Separator between the hash and each argument on an encoded log line.
pub const ARGUMENT_SEPARATOR: char = ' ';
