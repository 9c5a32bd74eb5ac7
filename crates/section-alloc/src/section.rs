// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device memory sections.

use std::fmt;

/// The device memory section an allocation is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    /// Long-lived device-resident tensors and weights.
    Heap,
    /// Transient scratch buffers requested by operators.
    Workspace,
}

impl SectionKind {
    /// All sections, in layout order.
    pub const ALL: [SectionKind; 2] = [SectionKind::Heap, SectionKind::Workspace];

    /// Returns the section's name as used in logs and configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Heap => "heap",
            SectionKind::Workspace => "workspace",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
