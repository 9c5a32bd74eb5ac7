// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Human-readable byte sizes for section layouts.
//!
//! Device sections on a microcontroller target are small, so sizes are
//! usually written in kilobytes (`"64K"`), occasionally megabytes.

use crate::AllocError;
use std::fmt;

/// A non-zero byte count with human-readable parsing.
///
/// # Parsing
/// - `"64K"` or `"64KB"` → 64 × 1024 bytes
/// - `"1M"` or `"1MB"` → 1 × 1024² bytes
/// - `"512B"` or `"512"` → raw byte count
///
/// # Examples
/// ```
/// use section_alloc::ByteSize;
///
/// let s = ByteSize::parse("16K").unwrap();
/// assert_eq!(s.as_bytes(), 16 * 1024);
/// assert_eq!(s.to_string(), "16 KB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize {
    bytes: usize,
}

impl ByteSize {
    /// Creates a size from a byte count.
    pub const fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    /// Creates a size from kilobytes.
    pub const fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * 1024 }
    }

    /// Returns the size in bytes.
    pub const fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Parses a human-readable size string. Case-insensitive; surrounding
    /// whitespace is ignored.
    pub fn parse(s: &str) -> Result<Self, AllocError> {
        let trimmed = s.trim();
        let invalid = |detail: &str| AllocError::InvalidSize {
            input: s.to_string(),
            detail: detail.to_string(),
        };
        if trimmed.is_empty() {
            return Err(invalid("empty size string"));
        }

        let upper = trimmed.to_uppercase();
        let (num_str, multiplier) = if let Some(n) = upper.strip_suffix("MB") {
            (n, 1024 * 1024)
        } else if let Some(n) = upper.strip_suffix('M') {
            (n, 1024 * 1024)
        } else if let Some(n) = upper.strip_suffix("KB") {
            (n, 1024)
        } else if let Some(n) = upper.strip_suffix('K') {
            (n, 1024)
        } else if let Some(n) = upper.strip_suffix('B') {
            (n, 1)
        } else {
            (upper.as_str(), 1)
        };

        let value: usize = num_str
            .trim()
            .parse()
            .map_err(|_| invalid("expected a number followed by an optional K or M suffix"))?;
        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("size overflows usize"))?;
        if bytes == 0 {
            return Err(invalid("size must be non-zero"));
        }
        Ok(Self { bytes })
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes >= 1024 * 1024 && self.bytes % (1024 * 1024) == 0 {
            write!(f, "{} MB", self.bytes / (1024 * 1024))
        } else if self.bytes >= 1024 && self.bytes % 1024 == 0 {
            write!(f, "{} KB", self.bytes / 1024)
        } else {
            write!(f, "{} B", self.bytes)
        }
    }
}

impl serde::Serialize for ByteSize {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string().replace(' ', ""))
    }
}

impl<'de> serde::Deserialize<'de> for ByteSize {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ByteSize::parse(&s).map_err(serde::de::Error::custom)
    }
}
