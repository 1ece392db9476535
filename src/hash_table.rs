//! The lookup table bridging build time and run time.
//!
//! On disk the table is `trace.csv`: one `hash;message` record per line, no
//! header. The message field is quoted CSV-style (`"..."` with `""` for a
//! quote) only when it contains the delimiter, a quote or a line break, so
//! plain messages stay human-readable.
//!
//! Hash uniqueness is never checked. When two rows share a hash the later one
//! wins once the table is loaded into a [`TraceTable`].

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::canonical::CanonicalMessage;
use crate::config::{HASH_HEX_LEN, TABLE_DELIMITER, TABLE_FILE_NAME, TABLE_QUOTE};
use crate::error::{RowError, TraceError};

/// One `(hash, canonical message)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashTableEntry {
    pub hash: String,
    pub message: String,
}

impl HashTableEntry {
    pub fn new(message: CanonicalMessage) -> Self {
        Self {
            hash: message.hash(),
            message: message.into_string(),
        }
    }
}

/// Entries in discovery order, as produced by the extractor.
///
/// Append-only. Identical messages found at several call sites produce
/// several identical entries.
#[derive(Debug, Default, Clone)]
pub struct HashTable {
    entries: Vec<HashTableEntry>,
}

impl HashTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: CanonicalMessage) {
        self.entries.push(HashTableEntry::new(message));
    }

    pub fn entries(&self) -> &[HashTableEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes every entry as one record.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for entry in &self.entries {
            write_record(out, &entry.hash, &entry.message)?;
        }
        Ok(())
    }

    /// Writes `trace.csv` into `output_dir`, which must already exist.
    pub fn save(&self, output_dir: &Path) -> Result<PathBuf, TraceError> {
        let path = output_dir.join(TABLE_FILE_NAME);
        let write = || -> io::Result<()> {
            let mut out = BufWriter::new(File::create(&path)?);
            self.write_to(&mut out)?;
            out.flush()
        };
        write().map_err(|source| TraceError::TableWrite {
            path: path.clone(),
            source,
        })?;
        debug!("wrote {} entries to {}", self.entries.len(), path.display());
        Ok(path)
    }

    /// Builds the lookup mapping directly, with the same overwrite rule as
    /// loading the saved file.
    pub fn to_lookup(&self) -> TraceTable {
        self.entries
            .iter()
            .map(|entry| (entry.hash.clone(), entry.message.clone()))
            .collect()
    }
}

/// Immutable hash → message mapping used by the decoder.
#[derive(Debug, Default, Clone)]
pub struct TraceTable {
    messages: HashMap<String, String>,
}

impl TraceTable {
    /// Loads a table file. Malformed rows are skipped with a warning.
    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let bytes = fs::read(path).map_err(|source| TraceError::TableRead {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::parse(&String::from_utf8_lossy(&bytes));
        debug!("loaded {} messages from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parses table text. Later rows overwrite earlier rows with the same hash.
    ///
    /// # Examples
    ///
    /// ```
    /// # use hash_trace::TraceTable;
    /// let text = "0123456789abcdef0123456789abcdef;I:first\n\
    ///             not a row\n\
    ///             0123456789abcdef0123456789abcdef;I:second\n";
    /// let table = TraceTable::parse(text);
    ///
    /// // The malformed row is skipped, the duplicate hash keeps the later message
    /// assert_eq!(table.len(), 1);
    /// assert_eq!(table.get("0123456789abcdef0123456789abcdef"), Some("I:second"));
    /// ```
    pub fn parse(text: &str) -> Self {
        let mut messages = HashMap::new();
        for (row, record) in Records::new(text) {
            match record.and_then(into_entry) {
                Ok(Some((hash, message))) => {
                    messages.insert(hash, message);
                }
                Ok(None) => {}
                Err(err) => warn!("skipping trace table row {}: {}", row, err),
            }
        }
        Self { messages }
    }

    pub fn get(&self, hash: &str) -> Option<&str> {
        self.messages.get(hash).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl FromIterator<(String, String)> for TraceTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

/// Returns true for exactly 32 lowercase hex characters.
pub fn is_table_hash(candidate: &str) -> bool {
    candidate.len() == HASH_HEX_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn write_record<W: Write>(out: &mut W, hash: &str, message: &str) -> io::Result<()> {
    let needs_quotes = message
        .chars()
        .any(|c| c == TABLE_DELIMITER || c == TABLE_QUOTE || c == '\n' || c == '\r');
    if needs_quotes {
        let doubled = TABLE_QUOTE.to_string().repeat(2);
        let escaped = message.replace(TABLE_QUOTE, &doubled);
        writeln!(out, "{hash}{TABLE_DELIMITER}{TABLE_QUOTE}{escaped}{TABLE_QUOTE}")
    } else {
        writeln!(out, "{hash}{TABLE_DELIMITER}{message}")
    }
}

// Blank lines yield `Ok(None)`.
fn into_entry(fields: Vec<String>) -> Result<Option<(String, String)>, RowError> {
    if fields.len() == 1 && fields[0].is_empty() {
        return Ok(None);
    }
    let [hash, message]: [String; 2] = fields
        .try_into()
        .map_err(|fields: Vec<String>| RowError::FieldCount(fields.len()))?;
    if !is_table_hash(&hash) {
        return Err(RowError::InvalidHash(hash));
    }
    Ok(Some((hash, message)))
}

/// CSV-style record splitter yielding `(row number, fields)`.
///
/// Row numbers are the 1-based line on which the record starts; a quoted
/// field may span several lines.
struct Records<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Records<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0, line: 0 }
    }

    fn read_record(&mut self) -> Result<Vec<String>, RowError> {
        let text = self.text;
        let bytes = text.as_bytes();
        let mut fields = Vec::new();

        loop {
            let mut field = String::new();

            if bytes.get(self.pos) == Some(&(TABLE_QUOTE as u8)) {
                self.pos += 1;
                loop {
                    let Some(offset) = text[self.pos..].find(TABLE_QUOTE) else {
                        self.line += text[self.pos..].matches('\n').count();
                        self.pos = text.len();
                        return Err(RowError::UnterminatedQuote);
                    };
                    let quote = self.pos + offset;
                    field.push_str(&text[self.pos..quote]);
                    self.line += text[self.pos..quote].matches('\n').count();
                    if bytes.get(quote + 1) == Some(&(TABLE_QUOTE as u8)) {
                        field.push(TABLE_QUOTE);
                        self.pos = quote + 2;
                    } else {
                        self.pos = quote + 1;
                        break;
                    }
                }
            }

            let end = text[self.pos..]
                .find(|c: char| c == TABLE_DELIMITER || c == '\n')
                .map_or(text.len(), |offset| self.pos + offset);
            field.push_str(&text[self.pos..end]);
            self.pos = end;

            if bytes.get(end) == Some(&(TABLE_DELIMITER as u8)) {
                fields.push(field);
                self.pos += 1;
                continue;
            }

            if end < text.len() {
                self.pos += 1;
                self.line += 1;
            }
            if field.ends_with('\r') {
                field.pop();
            }
            fields.push(field);
            return Ok(fields);
        }
    }
}

impl Iterator for Records<'_> {
    type Item = (usize, Result<Vec<String>, RowError>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.text.len() {
            return None;
        }
        let row = self.line + 1;
        Some((row, self.read_record()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(text: &str) -> Vec<(usize, Result<Vec<String>, RowError>)> {
        Records::new(text).collect()
    }

    #[test]
    fn test_plain_records() {
        let rows = records("a;b\nc;d\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], (1, Ok(vec!["a".to_string(), "b".to_string()])));
        assert_eq!(rows[1], (2, Ok(vec!["c".to_string(), "d".to_string()])));
    }

    #[test]
    fn test_crlf_and_missing_final_newline() {
        let rows = records("a;b\r\nc;d");
        assert_eq!(rows[0].1, Ok(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(rows[1].1, Ok(vec!["c".to_string(), "d".to_string()]));
    }

    #[test]
    fn test_quoted_field_spanning_lines() {
        let rows = records("h;\"x;\"\"y\"\"\nz\"\nnext;row\n");
        assert_eq!(rows[0], (1, Ok(vec!["h".to_string(), "x;\"y\"\nz".to_string()])));
        assert_eq!(rows[1].0, 3);
    }

    #[test]
    fn test_unterminated_quote() {
        let rows = records("h;\"never closed\n");
        assert_eq!(rows, vec![(1, Err(RowError::UnterminatedQuote))]);
    }

    #[test]
    fn test_write_record_quotes_only_when_needed() {
        let mut out = Vec::new();
        write_record(&mut out, "h", "plain {}").unwrap();
        write_record(&mut out, "h", "a;b \"c\"").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "h;plain {}\nh;\"a;b \"\"c\"\"\"\n");
    }

    #[test]
    fn test_table_hash_shape() {
        assert!(is_table_hash("0123456789abcdef0123456789abcdef"));
        assert!(!is_table_hash("0123456789ABCDEF0123456789ABCDEF"));
        assert!(!is_table_hash("0123456789abcdef"));
    }
}
