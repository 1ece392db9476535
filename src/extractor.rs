//! Build-time extraction of trace call sites into a hash table.
//!
//! A call site is the marker `HashTrace::`, a method name whose last segment
//! is the level, and a parenthesised argument list starting with a string
//! literal:
//!
//! ```text
//! printer.print(HashTrace::warning(
//!     "Byczy {} Byk"), 10);
//! ```
//!
//! This is a textual convention, not a language parser. Line breaks are
//! allowed between the method name, the parenthesis and the literal, but the
//! literal itself must end on the line it starts on, unless the line ends in
//! a backslash splice.

use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use crate::canonical::{CanonicalMessage, TraceLevel};
use crate::config::{CALL_MARKER, DEFAULT_SOURCE_EXTENSIONS};
use crate::error::TraceError;
use crate::hash_table::HashTable;

lazy_static! {
    /// Everything up to and including the opening quote of the literal.
    /// Group 1 is the (possibly namespaced) method name.
    static ref CALL_SITE: Regex = Regex::new(&format!(
        r#"{}([A-Za-z_]\w*(?:(?:::|\.)[A-Za-z_]\w*)*)\s*\(\s*""#,
        regex::escape(CALL_MARKER)
    ))
    .expect("call site pattern is valid");
}

/// A single instrumentation call found in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceCallSite {
    pub level: TraceLevel,
    /// Unescaped contents of the string literal.
    pub raw_text: String,
    pub path: PathBuf,
    /// 1-based line of the marker.
    pub line: usize,
}

impl TraceCallSite {
    pub fn canonical(&self) -> CanonicalMessage {
        CanonicalMessage::new(self.level, &self.raw_text)
    }
}

/// Scans source trees for call sites and writes the resulting table.
#[derive(Debug, Clone)]
pub struct TraceExtractor {
    extensions: Vec<String>,
}

impl Default for TraceExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_EXTENSIONS.iter().copied())
    }
}

impl TraceExtractor {
    /// `extensions` are matched against the end of each file name, so both
    /// `.cpp` and `cpp` work.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches_extension(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }

    /// Collects call sites from every matching file under `root`.
    ///
    /// Files are visited in sorted path order. A file that cannot be read or
    /// is not UTF-8 is logged and skipped; only an unreadable `root` fails.
    pub fn scan(&self, root: &Path) -> Result<Vec<TraceCallSite>, TraceError> {
        let mut files = Vec::new();
        let entries = fs::read_dir(root).map_err(|source| TraceError::SourceRoot {
            path: root.to_path_buf(),
            source,
        })?;
        self.collect_files(entries, &mut files);
        files.sort();

        let mut call_sites = Vec::new();
        for path in &files {
            let text = match fs::read(path).map(String::from_utf8) {
                Ok(Ok(text)) => text,
                Ok(Err(err)) => {
                    warn!("skipping {}: not valid UTF-8 ({})", path.display(), err);
                    continue;
                }
                Err(err) => {
                    warn!("skipping {}: {}", path.display(), err);
                    continue;
                }
            };
            let found = scan_source(path, &text);
            debug!("{}: {} call sites", path.display(), found.len());
            call_sites.extend(found);
        }
        debug!("scanned {} files under {}", files.len(), root.display());
        Ok(call_sites)
    }

    /// Runs scan, build and write. Returns the path of the written table.
    pub fn extract(&self, root: &Path, output_dir: &Path) -> Result<PathBuf, TraceError> {
        let call_sites = self.scan(root)?;
        let table = build_table(&call_sites);
        let path = write(&table, output_dir)?;
        info!("{} trace messages written to {}", table.len(), path.display());
        Ok(path)
    }

    fn collect_files(&self, entries: fs::ReadDir, files: &mut Vec<PathBuf>) {
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping directory entry: {}", err);
                    continue;
                }
            };
            let path = entry.path();
            // Symlinked directories are not followed, symlinked files are.
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                match fs::read_dir(&path) {
                    Ok(children) => self.collect_files(children, files),
                    Err(err) => warn!("skipping directory {}: {}", path.display(), err),
                }
            } else if self.matches_extension(&path) && path.is_file() {
                files.push(path);
            }
        }
    }
}

/// Finds every non-overlapping call site in `text`.
pub fn scan_source(path: &Path, text: &str) -> Vec<TraceCallSite> {
    let mut call_sites = Vec::new();
    let mut pos = 0;
    let mut line = 1;
    let mut line_counted_to = 0;

    while let Some(captures) = CALL_SITE.captures_at(text, pos) {
        let (Some(whole), Some(method)) = (captures.get(0), captures.get(1)) else {
            break;
        };
        line += text[line_counted_to..whole.start()].matches('\n').count();
        line_counted_to = whole.start();

        let level_name = method
            .as_str()
            .rsplit(|c: char| c == ':' || c == '.')
            .next()
            .unwrap_or_default();

        match read_literal(text, whole.end()) {
            Some((raw_text, end)) => {
                call_sites.push(TraceCallSite {
                    level: TraceLevel::from_method(level_name),
                    raw_text,
                    path: path.to_path_buf(),
                    line,
                });
                pos = end;
            }
            None => {
                warn!(
                    "{}:{}: unterminated string literal in trace call, skipped",
                    path.display(),
                    line
                );
                pos = whole.end();
            }
        }
    }
    call_sites
}

/// Maps each call site to an entry, in discovery order, keeping duplicates.
pub fn build_table(call_sites: &[TraceCallSite]) -> HashTable {
    let mut table = HashTable::new();
    for call_site in call_sites {
        table.push(call_site.canonical());
    }
    table
}

/// Writes `trace.csv` into `output_dir`.
pub fn write(table: &HashTable, output_dir: &Path) -> Result<PathBuf, TraceError> {
    table.save(output_dir)
}

/// Reads a C-style string literal body starting right after the opening
/// quote. Returns the unescaped text and the byte offset after the closing
/// quote, or `None` when the line or input ends first. Backslash-newline
/// splices are removed.
fn read_literal(text: &str, start: usize) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut chars = text[start..].char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            '"' => return Some((out, start + offset + 1)),
            '\n' => return None,
            '\\' => {
                let (_, escaped) = chars.next()?;
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'a' => out.push('\x07'),
                    'b' => out.push('\x08'),
                    'f' => out.push('\x0c'),
                    'v' => out.push('\x0b'),
                    'x' => {
                        let mut value = 0u32;
                        let mut digits = 0;
                        while digits < 2 {
                            match chars.peek().and_then(|&(_, d)| d.to_digit(16)) {
                                Some(d) => {
                                    value = value * 16 + d;
                                    digits += 1;
                                    chars.next();
                                }
                                None => break,
                            }
                        }
                        if digits == 0 {
                            out.push('x');
                        } else {
                            out.push(char::from_u32(value)?);
                        }
                    }
                    '0'..='7' => {
                        let mut value = escaped.to_digit(8)?;
                        let mut digits = 1;
                        while digits < 3 {
                            match chars.peek().and_then(|&(_, d)| d.to_digit(8)) {
                                Some(d) => {
                                    value = value * 8 + d;
                                    digits += 1;
                                    chars.next();
                                }
                                None => break,
                            }
                        }
                        out.push(char::from_u32(value)?);
                    }
                    // line splice
                    '\n' => {}
                    '\r' if chars.peek().map(|&(_, c)| c) == Some('\n') => {
                        chars.next();
                    }
                    // \\ \" \' \? and unknown escapes keep the character
                    other => out.push(other),
                }
            }
            other => out.push(other),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_literal_escapes() {
        let text = r#"a\"b\\c\n\x41\101\?"tail"#;
        let (literal, end) = read_literal(text, 0).unwrap();
        assert_eq!(literal, "a\"b\\c\nAA?");
        assert_eq!(&text[end..], "tail");
    }

    #[test]
    fn test_read_literal_stops_at_line_end() {
        assert_eq!(read_literal("never\nclosed\"", 0), None);
        assert_eq!(read_literal("eof", 0), None);
    }

    #[test]
    fn test_read_literal_joins_spliced_lines() {
        let (literal, end) = read_literal("first \\\n  second\\\r\n!\" x", 0).unwrap();
        assert_eq!(literal, "first   second!");
        assert_eq!(end, 21);
    }

    #[test]
    fn test_extension_matching() {
        let extractor = TraceExtractor::default();
        assert!(extractor.matches_extension(Path::new("src/main.cpp")));
        assert!(extractor.matches_extension(Path::new("inc/trace.h")));
        assert!(!extractor.matches_extension(Path::new("inc/trace.hpp")));
        assert!(!extractor.matches_extension(Path::new("notes.txt")));
    }
}
