// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Section layout for a device session, loaded from TOML or built in code.
//!
//! # TOML Format
//! ```toml
//! word_size = 8
//! device_id = 0
//!
//! [heap]
//! start = 0x2000_0000
//! size = "64K"
//!
//! [workspace]
//! start = 0x2001_0000
//! size = "16K"
//! ```

use std::path::Path;

use section_alloc::{ByteSize, DevPtr, SectionKind};

use crate::DeviceError;

/// Placement of one section in the device address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SectionConfig {
    /// First device address of the section.
    pub start: DevPtr,
    /// Section length (human-readable, e.g. `"64K"`).
    pub size: ByteSize,
}

impl SectionConfig {
    /// One past the last address, or `None` if the section wraps the
    /// address space.
    pub fn end(&self) -> Option<u64> {
        self.start.value().checked_add(self.size.as_bytes() as u64)
    }
}

/// Layout of a device session: word size plus one region per section.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionConfig {
    /// Device word size in bytes; every allocation is padded to it.
    #[serde(default = "default_word_size")]
    pub word_size: usize,
    /// Device id the session answers to.
    #[serde(default)]
    pub device_id: u32,
    pub heap: SectionConfig,
    pub workspace: SectionConfig,
}

fn default_word_size() -> usize {
    8
}

impl SessionConfig {
    /// Loads a layout from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, DeviceError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DeviceError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses a layout from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, DeviceError> {
        toml::from_str(toml_str)
            .map_err(|e| DeviceError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises the layout to TOML.
    pub fn to_toml(&self) -> Result<String, DeviceError> {
        toml::to_string_pretty(self)
            .map_err(|e| DeviceError::Config(format!("TOML serialise error: {e}")))
    }

    /// The region configured for `kind`.
    pub fn section(&self, kind: SectionKind) -> &SectionConfig {
        match kind {
            SectionKind::Heap => &self.heap,
            SectionKind::Workspace => &self.workspace,
        }
    }

    /// Checks word size, alignment, bounds and overlap.
    pub fn validate(&self) -> Result<(), DeviceError> {
        let word = self.word_size;
        if word == 0 || !word.is_power_of_two() {
            return Err(DeviceError::Config(format!(
                "word size {word} is not a power of two"
            )));
        }

        for kind in SectionKind::ALL {
            let section = self.section(kind);
            let size = section.size.as_bytes();
            if !section.start.is_aligned(word) {
                return Err(DeviceError::Config(format!(
                    "{kind} start {} is not aligned to the {word}-byte word",
                    section.start
                )));
            }
            if size % word != 0 {
                return Err(DeviceError::Config(format!(
                    "{kind} size {size} is not a multiple of the {word}-byte word"
                )));
            }
            if section.end().is_none() {
                return Err(DeviceError::Config(format!(
                    "{kind} section at {} overflows the address space",
                    section.start
                )));
            }
        }

        let (heap, ws) = (&self.heap, &self.workspace);
        let heap_end = heap.end().unwrap_or(u64::MAX);
        let ws_end = ws.end().unwrap_or(u64::MAX);
        if heap.start.value() < ws_end && ws.start.value() < heap_end {
            return Err(DeviceError::Config(format!(
                "heap [{}, {:#010x}) overlaps workspace [{}, {:#010x})",
                heap.start, heap_end, ws.start, ws_end
            )));
        }
        Ok(())
    }

    /// Lowest start address and the byte length reaching the highest end.
    pub fn address_span(&self) -> (DevPtr, usize) {
        let start = self.heap.start.min(self.workspace.start);
        let end = SectionKind::ALL
            .iter()
            .filter_map(|kind| self.section(*kind).end())
            .max()
            .unwrap_or(start.value());
        (start, (end - start.value()) as usize)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            word_size: default_word_size(),
            device_id: 0,
            heap: SectionConfig {
                start: DevPtr::new(0x2000_0000),
                size: ByteSize::from_kb(64),
            },
            workspace: SectionConfig {
                start: DevPtr::new(0x2001_0000),
                size: ByteSize::from_kb(16),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let c = SessionConfig::default();
        c.validate().unwrap();
        assert_eq!(c.word_size, 8);
        assert_eq!(c.heap.end(), Some(0x2001_0000));
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
word_size = 4
device_id = 2

[heap]
start = 0x1000
size = "4K"

[workspace]
start = 0x3000
size = 1024
"#;
        let c = SessionConfig::from_toml(toml).unwrap();
        assert_eq!(c.word_size, 4);
        assert_eq!(c.device_id, 2);
        assert_eq!(c.heap.start, DevPtr::new(0x1000));
        assert_eq!(c.heap.size.as_bytes(), 4096);
        assert_eq!(c.workspace.size.as_bytes(), 1024);
        c.validate().unwrap();
    }

    #[test]
    fn test_word_size_defaults() {
        let toml = r#"
[heap]
start = 0
size = "1K"

[workspace]
start = 2048
size = "1K"
"#;
        let c = SessionConfig::from_toml(toml).unwrap();
        assert_eq!(c.word_size, 8);
        assert_eq!(c.device_id, 0);
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = SessionConfig::default();
        let toml = c.to_toml().unwrap();
        let back = SessionConfig::from_toml(&toml).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_rejects_bad_word_size() {
        let c = SessionConfig {
            word_size: 6,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(DeviceError::Config(_))));
    }

    #[test]
    fn test_rejects_unaligned_start() {
        let mut c = SessionConfig::default();
        c.workspace.start = DevPtr::new(0x2001_0004);
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("not aligned"));
    }

    #[test]
    fn test_rejects_ragged_size() {
        let mut c = SessionConfig::default();
        c.heap.size = ByteSize::from_bytes(100);
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("multiple"));
    }

    #[test]
    fn test_rejects_overlap() {
        let mut c = SessionConfig::default();
        c.workspace.start = DevPtr::new(0x2000_fff8);
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("overlaps"));
    }

    #[test]
    fn test_adjacent_sections_allowed() {
        let mut c = SessionConfig::default();
        c.workspace.start = DevPtr::new(0x1fff_c000);
        c.validate().unwrap();
    }

    #[test]
    fn test_address_span() {
        let c = SessionConfig::default();
        let (base, len) = c.address_span();
        assert_eq!(base, DevPtr::new(0x2000_0000));
        assert_eq!(len, 0x1_4000);
    }

    #[test]
    fn test_parse_error() {
        assert!(SessionConfig::from_toml("word_size = \"eight\"").is_err());
    }
}
