//! The emitting side of the protocol.
//!
//! Instrumented code names its messages with `HashTrace::<level>("text")`,
//! which the extractor finds in the source, and which evaluates at compile
//! time to the same hash the extractor records:
//!
//! ```
//! use hash_trace::{HashTrace, TraceId, TracePrinter};
//!
//! const LOW_DISK: TraceId = HashTrace::warning("disk low: {} blocks");
//!
//! let mut out = Vec::new();
//! let mut printer = TracePrinter::new(&mut out);
//! printer.print(LOW_DISK, &[0x2a]).unwrap();
//! assert_eq!(out, format!("{} 2a\n", LOW_DISK).into_bytes());
//! ```

use std::fmt;
use std::io::{self, Write};

use crate::canonical::TraceLevel;
use crate::config::{ARGUMENT_SEPARATOR, HASH_HEX_LEN};
use crate::md5;

/// Hex-encoded hash of a canonical message.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId {
    hex: [u8; HASH_HEX_LEN],
}

impl TraceId {
    /// Hash of `prefix(level) + text`.
    pub const fn of(level: TraceLevel, text: &str) -> Self {
        let digest = md5::md5_concat(level.prefix().as_bytes(), text.as_bytes());
        Self {
            hex: md5::to_hex(&digest),
        }
    }

    pub fn as_str(&self) -> &str {
        // to_hex only produces ASCII hex digits
        std::str::from_utf8(&self.hex).unwrap_or_default()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({})", self.as_str())
    }
}

/// Call-site constructors; the method names are the levels the extractor
/// recognises.
pub struct HashTrace;

impl HashTrace {
    pub const fn info(text: &str) -> TraceId {
        TraceId::of(TraceLevel::Info, text)
    }

    pub const fn warning(text: &str) -> TraceId {
        TraceId::of(TraceLevel::Warning, text)
    }

    pub const fn error(text: &str) -> TraceId {
        TraceId::of(TraceLevel::Error, text)
    }
}

/// Writes encoded trace lines: the hash, then each argument as ` <hex>`.
pub struct TracePrinter<W: Write> {
    out: W,
}

impl<W: Write> TracePrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Emits one line. Negative arguments are written as `-<hex>`.
    pub fn print(&mut self, id: TraceId, args: &[i64]) -> io::Result<()> {
        self.out.write_all(id.as_str().as_bytes())?;
        for &arg in args {
            let sign = if arg < 0 { "-" } else { "" };
            write!(self.out, "{ARGUMENT_SEPARATOR}{sign}{:x}", arg.unsigned_abs())?;
        }
        self.out.write_all(b"\n")
    }

    /// Flushes the underlying writer, for buffered or line-oriented sinks.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::trace_hash;

    #[test]
    fn test_const_id_matches_runtime_hash() {
        const ID: TraceId = HashTrace::error("Byczy {:#b} Byk {}");
        assert_eq!(ID.as_str(), trace_hash(TraceLevel::Error, "Byczy {:#b} Byk {}"));
    }

    #[test]
    fn test_printer_line_layout() {
        let id = HashTrace::info("x={} y={}");
        let mut printer = TracePrinter::new(Vec::new());
        printer.print(id, &[255, -16]).unwrap();
        printer.print(id, &[]).unwrap();
        let text = String::from_utf8(printer.into_inner()).unwrap();
        assert_eq!(text, format!("{id} ff -10\n{id}\n"));
    }

    #[test]
    fn test_printer_flush_reaches_sink() {
        let id = HashTrace::warning("late {}");
        let mut printer = TracePrinter::new(io::BufWriter::new(Vec::new()));
        printer.print(id, &[7]).unwrap();
        printer.flush().unwrap();

        let writer = printer.into_inner();
        assert!(writer.buffer().is_empty());
        assert_eq!(writer.get_ref(), format!("{id} 7\n").as_bytes());
    }
}
