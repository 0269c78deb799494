//! Pack identity.
//!
//! A pack is named by a structured [`PackKey`] (header, line, sub-index,
//! sequence). The display identifier
//! `{prefix}-{header_id}-{line_id}-{sub_index}-{pack_sequence}` is only
//! produced at the label boundary and parsed back from scans.
//!
//! Aggregates never look at identifiers directly: they take a [`PackScope`],
//! which names either every pack of a header or every pack of a line.
//! There is no unscoped variant.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReceivingError;

pub const DEFAULT_PREFIX: &str = "PKG";

const SEPARATOR: char = '-';

/// Leading segment of every pack identifier.
///
/// ASCII alphanumeric only, so the separator stays unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackPrefix(String);

impl PackPrefix {
    pub fn new(prefix: &str) -> Result<Self, ReceivingError> {
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ReceivingError::InvalidInput(format!(
                "pack prefix must be non-empty ASCII alphanumeric, got '{prefix}'"
            )));
        }
        Ok(Self(prefix.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PackPrefix {
    fn default() -> Self {
        Self(DEFAULT_PREFIX.to_string())
    }
}

impl fmt::Display for PackPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite key of one pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackKey {
    pub header_id: i64,
    pub line_id: i64,
    /// Pack group within the line (a lot, or one definition round). 1-based.
    pub sub_index: u32,
    /// Position within the pack group. 1-based.
    pub pack_sequence: u32,
}

impl PackKey {
    /// Serialize to the display identifier printed on labels.
    pub fn identifier(&self, prefix: &PackPrefix) -> String {
        format!(
            "{prefix}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
            self.header_id, self.line_id, self.sub_index, self.pack_sequence
        )
    }

    /// Decompose a scanned identifier.
    ///
    /// Only the canonical form is accepted: right prefix, exactly five
    /// segments, plain decimal numbers without sign or leading zeros.
    pub fn parse(prefix: &PackPrefix, identifier: &str) -> Option<Self> {
        let mut parts = identifier.split(SEPARATOR);
        if parts.next()? != prefix.as_str() {
            return None;
        }
        let header_id = parse_segment(parts.next()?)?;
        let line_id = parse_segment(parts.next()?)?;
        let sub_index = u32::try_from(parse_segment(parts.next()?)?).ok()?;
        let pack_sequence = u32::try_from(parse_segment(parts.next()?)?).ok()?;
        if parts.next().is_some() {
            return None;
        }

        let key = Self {
            header_id,
            line_id,
            sub_index,
            pack_sequence,
        };
        (key.identifier(prefix) == identifier).then_some(key)
    }

    pub fn header_scope(&self) -> PackScope {
        PackScope::Header(self.header_id)
    }

    pub fn line_scope(&self) -> PackScope {
        PackScope::Line {
            header_id: self.header_id,
            line_id: self.line_id,
        }
    }
}

fn parse_segment(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i64>().ok().filter(|v| *v > 0)
}

/// The set of packs an aggregate query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackScope {
    /// Every pack under one header.
    Header(i64),
    /// Every pack under one line of a header.
    Line { header_id: i64, line_id: i64 },
}

impl PackScope {
    pub fn header_id(&self) -> i64 {
        match self {
            PackScope::Header(h) => *h,
            PackScope::Line { header_id, .. } => *header_id,
        }
    }

    /// Identifier prefix shared by every pack in scope.
    ///
    /// Ends with the separator, so header 1 never matches header 12.
    pub fn prefix(&self, prefix: &PackPrefix) -> String {
        match self {
            PackScope::Header(h) => format!("{prefix}{SEPARATOR}{h}{SEPARATOR}"),
            PackScope::Line { header_id, line_id } => {
                format!("{prefix}{SEPARATOR}{header_id}{SEPARATOR}{line_id}{SEPARATOR}")
            }
        }
    }

    pub fn contains(&self, key: &PackKey) -> bool {
        match self {
            PackScope::Header(h) => key.header_id == *h,
            PackScope::Line { header_id, line_id } => {
                key.header_id == *header_id && key.line_id == *line_id
            }
        }
    }
}

/// Keys for one pack group: sequences `1..=count`.
pub fn generate_keys(header_id: i64, line_id: i64, sub_index: u32, count: u32) -> Vec<PackKey> {
    (1..=count)
        .map(|pack_sequence| PackKey {
            header_id,
            line_id,
            sub_index,
            pack_sequence,
        })
        .collect()
}
