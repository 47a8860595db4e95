//! Stream metadata: newline-separated `key=value` pairs.

use std::fmt;

use crate::error::{Result, SeaError};

/// Parsed metadata block.
///
/// Keys are looked up case-insensitively and may not contain `=` or
/// newlines; values are case-sensitive and may not contain newlines.
/// Entry order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a metadata blob. Empty lines are skipped; every other line
    /// must contain a `=` separator.
    pub fn parse(blob: &str) -> Result<Self> {
        let mut metadata = Self::new();
        for line in blob.lines() {
            if line.is_empty() {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                SeaError::ParamOutOfRange(format!("metadata line without '=': {line:?}"))
            })?;
            metadata.insert(key, value)?;
        }
        Ok(metadata)
    }

    /// Add or replace an entry. Replacement matches the key
    /// case-insensitively.
    pub fn insert(&mut self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() || key.contains('=') || key.contains('\n') {
            return Err(SeaError::ParamOutOfRange(format!(
                "invalid metadata key: {key:?}"
            )));
        }
        if value.contains('\n') {
            return Err(SeaError::ParamOutOfRange(format!(
                "invalid metadata value for {key:?}"
            )));
        }
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Value for `key`, compared case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}
