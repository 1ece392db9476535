use std::fmt;

use crate::md5;

/// Severity of a trace call site.
///
/// The level is taken from the method name of the call site and only
/// contributes a short prefix to the hashed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceLevel {
    Info,
    Warning,
    Error,
    /// Any method name that is not one of the known levels.
    None,
}

impl TraceLevel {
    /// Maps a method name to a level. Matching is case-sensitive.
    pub fn from_method(name: &str) -> Self {
        match name {
            "info" => TraceLevel::Info,
            "warning" => TraceLevel::Warning,
            "error" => TraceLevel::Error,
            _ => TraceLevel::None,
        }
    }

    /// Prefix prepended to the message text before hashing.
    pub const fn prefix(self) -> &'static str {
        match self {
            TraceLevel::Info => "I:",
            TraceLevel::Warning => "W:",
            TraceLevel::Error => "E:",
            TraceLevel::None => "",
        }
    }
}

/// Level-prefixed message text, the input of the hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalMessage(String);

impl CanonicalMessage {
    pub fn new(level: TraceLevel, raw_text: &str) -> Self {
        let prefix = level.prefix();
        let mut text = String::with_capacity(prefix.len() + raw_text.len());
        text.push_str(prefix);
        text.push_str(raw_text);
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 32-char lowercase hex MD5 of the message bytes.
    pub fn hash(&self) -> String {
        md5::hex_digest(&[], self.0.as_bytes())
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash of `(level, raw_text)` without materialising the canonical message.
pub fn trace_hash(level: TraceLevel, raw_text: &str) -> String {
    md5::hex_digest(level.prefix().as_bytes(), raw_text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_prefixes() {
        assert_eq!(CanonicalMessage::new(TraceLevel::Warning, "disk low").as_str(), "W:disk low");
        assert_eq!(CanonicalMessage::new(TraceLevel::Info, "up").as_str(), "I:up");
        assert_eq!(CanonicalMessage::new(TraceLevel::Error, "down").as_str(), "E:down");
        assert_eq!(CanonicalMessage::new(TraceLevel::None, "plain").as_str(), "plain");
    }

    #[test]
    fn test_method_names_are_case_sensitive() {
        assert_eq!(TraceLevel::from_method("info"), TraceLevel::Info);
        assert_eq!(TraceLevel::from_method("Info"), TraceLevel::None);
        assert_eq!(TraceLevel::from_method("debug"), TraceLevel::None);
    }

    #[test]
    fn test_hash_is_stable() {
        let message = CanonicalMessage::new(TraceLevel::Info, "abc");
        assert_eq!(message.hash(), message.hash());
        assert_eq!(message.hash(), trace_hash(TraceLevel::Info, "abc"));
        // md5("a") from RFC 1321, reached through the unprefixed level
        assert_eq!(trace_hash(TraceLevel::None, "a"), "0cc175b9c0f1b6a831c399e269772661");
    }
}
