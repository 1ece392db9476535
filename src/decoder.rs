//! Run-time translation of hash-coded output back into text.
//!
//! An encoded line is a 32 character hash, optionally followed by
//! space-separated hexadecimal arguments:
//!
//! ```text
//! 3f1c...e9 2a ff
//! ```
//!
//! Lines that do not start with a known hash are passed through unchanged, so
//! ordinary program output can be mixed freely with trace lines. A line that
//! starts with a known hash but cannot be decoded is emitted with a
//! `<decode error: ...>` marker in front of the raw text; the stream goes on.

use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdout, Command, Stdio};

use log::{debug, info, warn};

use crate::config::{ARGUMENT_SEPARATOR, HASH_HEX_LEN};
use crate::error::{DecodeError, TraceError};
use crate::hash_table::TraceTable;
use crate::template::{self, ColorMode};

/// Source of raw log lines for [`TraceDecoder::run`].
///
/// The sequence is finite and consumed once.
pub trait LineSource {
    type Lines: Iterator<Item = io::Result<String>>;

    fn produce_lines(self) -> Result<Self::Lines, TraceError>;
}

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub lines: usize,
    pub decoded: usize,
    pub passed_through: usize,
    pub failed: usize,
}

/// Outcome of decoding a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The line carried a known hash and was rendered.
    Message(String),
    /// Not a trace line.
    PassThrough,
}

/// Decodes lines against an immutable table.
#[derive(Debug, Clone)]
pub struct TraceDecoder {
    table: TraceTable,
    colors: ColorMode,
}

impl TraceDecoder {
    pub fn new(table: TraceTable) -> Self {
        Self {
            table,
            colors: ColorMode::default(),
        }
    }

    pub fn with_color_mode(mut self, colors: ColorMode) -> Self {
        self.colors = colors;
        self
    }

    /// Decodes one line, never failing: unknown lines come back unchanged
    /// and undecodable trace lines come back marked.
    pub fn decode_line(&self, line: &str) -> String {
        match self.try_decode_line(line) {
            Ok(Decoded::Message(message)) => message,
            Ok(Decoded::PassThrough) => line.to_string(),
            Err(err) => error_line(line, &err),
        }
    }

    pub fn try_decode_line(&self, line: &str) -> Result<Decoded, DecodeError> {
        decode_with(&self.table, self.colors, line)
    }

    /// Decodes every line from `source` into `out`, one output line per input
    /// line, flushing after each.
    ///
    /// Per-line decode failures are contained. Reading from the source or
    /// writing to `out` failing ends the run with an error.
    pub fn run<S, W>(&self, source: S, out: &mut W) -> Result<RunStats, TraceError>
    where
        S: LineSource,
        W: Write,
    {
        let mut stats = RunStats::default();
        for line in source.produce_lines()? {
            let line = line?;
            stats.lines += 1;
            let rendered = match self.try_decode_line(&line) {
                Ok(Decoded::Message(message)) => {
                    stats.decoded += 1;
                    message
                }
                Ok(Decoded::PassThrough) => {
                    stats.passed_through += 1;
                    line
                }
                Err(err) => {
                    stats.failed += 1;
                    debug!("line {}: {}", stats.lines, err);
                    error_line(&line, &err)
                }
            };
            writeln!(out, "{rendered}")?;
            out.flush()?;
        }

        if stats.failed > 0 {
            warn!("{} of {} lines could not be decoded", stats.failed, stats.lines);
        }
        info!(
            "{} lines: {} decoded, {} passed through, {} failed",
            stats.lines, stats.decoded, stats.passed_through, stats.failed
        );
        Ok(stats)
    }
}

/// Decodes `line` against `table`, leaving colour marks as they are.
pub fn decode_line(line: &str, table: &TraceTable) -> String {
    match decode_with(table, ColorMode::Keep, line) {
        Ok(Decoded::Message(message)) => message,
        Ok(Decoded::PassThrough) => line.to_string(),
        Err(err) => error_line(line, &err),
    }
}

fn decode_with(table: &TraceTable, colors: ColorMode, line: &str) -> Result<Decoded, DecodeError> {
    let Some(template) = line.get(..HASH_HEX_LEN).and_then(|hash| table.get(hash)) else {
        return Ok(Decoded::PassThrough);
    };

    let mut tokens = line.split(ARGUMENT_SEPARATOR);
    if let Some(first) = tokens.next() {
        if first.len() != HASH_HEX_LEN {
            return Err(DecodeError::MalformedHashToken(first.to_string()));
        }
    }
    let args = tokens.map(parse_hex_arg).collect::<Result<Vec<_>, _>>()?;

    let message = if args.is_empty() {
        template.to_string()
    } else {
        template::substitute(template, &args)?
    };
    Ok(Decoded::Message(template::apply_color_marks(&message, colors)))
}

fn error_line(line: &str, err: &DecodeError) -> String {
    format!("<decode error: {err}> {line}")
}

/// Parses a hex argument token: optional sign, optional `0x`, hex digits.
pub fn parse_hex_arg(token: &str) -> Result<i128, DecodeError> {
    let invalid = || DecodeError::InvalidArgument(token.to_string());

    let (negative, unsigned) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };
    let digits = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
        .unwrap_or(unsigned);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let magnitude = u128::from_str_radix(digits, 16).map_err(|_| invalid())?;
    if negative {
        0i128.checked_sub_unsigned(magnitude).ok_or_else(invalid)
    } else {
        i128::try_from(magnitude).map_err(|_| invalid())
    }
}

/// Lines read from any buffered reader, such as a file or stdin.
pub struct ReaderSource<R: BufRead> {
    reader: R,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for ReaderSource<R> {
    type Lines = LossyLines<R>;

    fn produce_lines(self) -> Result<Self::Lines, TraceError> {
        Ok(LossyLines::new(self.reader))
    }
}

/// Standard output of a child process.
///
/// Stderr is inherited. The exit status is only logged: it is not part of
/// what the decoder reports.
pub struct ProcessSource {
    program: String,
    args: Vec<String>,
}

impl ProcessSource {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl LineSource for ProcessSource {
    type Lines = ProcessLines;

    fn produce_lines(self) -> Result<Self::Lines, TraceError> {
        let spawn_error = |source| TraceError::Spawn {
            program: self.program.clone(),
            source,
        };
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_error)?;
        let stdout = child.stdout.take().ok_or_else(|| {
            spawn_error(io::Error::new(io::ErrorKind::Other, "stdout was not captured"))
        })?;
        debug!("started {} (pid {})", self.program, child.id());

        Ok(ProcessLines {
            lines: Some(LossyLines::new(BufReader::new(stdout))),
            child: Some(child),
            program: self.program,
        })
    }
}

/// Lines of a running child; reaps the child once its output ends.
///
/// Dropped before the output ends, the pipe is closed and the child killed
/// before it is reaped.
pub struct ProcessLines {
    lines: Option<LossyLines<BufReader<ChildStdout>>>,
    child: Option<Child>,
    program: String,
}

impl ProcessLines {
    fn reap(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if self.lines.take().is_some() {
            debug!("stopping {} before its output ended", self.program);
            if let Err(err) = child.kill() {
                debug!("failed to kill {}: {}", self.program, err);
            }
        }
        match child.wait() {
            Ok(status) => debug!("{} exited with {}", self.program, status),
            Err(err) => warn!("failed to wait for {}: {}", self.program, err),
        }
    }
}

impl Iterator for ProcessLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.as_mut()?.next();
        if line.is_none() {
            self.lines = None;
            self.reap();
        }
        line
    }
}

impl Drop for ProcessLines {
    fn drop(&mut self) {
        self.reap();
    }
}

/// Like `BufRead::lines`, but invalid UTF-8 is replaced instead of failing
/// the line, and `\r\n` endings are trimmed.
pub struct LossyLines<R: BufRead> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LossyLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_arg() {
        assert_eq!(parse_hex_arg("2a"), Ok(42));
        assert_eq!(parse_hex_arg("FF"), Ok(255));
        assert_eq!(parse_hex_arg("0x10"), Ok(16));
        assert_eq!(parse_hex_arg("-10"), Ok(-16));
        assert_eq!(parse_hex_arg("ffffffffffffffff"), Ok(u64::MAX as i128));
        assert!(parse_hex_arg("zz").is_err());
        assert!(parse_hex_arg("").is_err());
        assert!(parse_hex_arg("-").is_err());
        assert!(parse_hex_arg("0x").is_err());
        assert!(parse_hex_arg("+-1").is_err());
    }

    #[test]
    fn test_lossy_lines() {
        let data: &[u8] = b"one\r\ntw\xffo\nlast";
        let lines: Vec<String> = LossyLines::new(data).map(Result::unwrap).collect();
        assert_eq!(lines, vec!["one", "tw\u{fffd}o", "last"]);
    }
}
