// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device context addressing.

use std::fmt;

/// The kind of device an operation is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Host memory.
    Cpu,
    /// The attached snps_ev accelerator.
    SnpsEv,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Cpu => "cpu",
            DeviceKind::SnpsEv => "snps_ev",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(device kind, device id)` pair tagging every device API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct DeviceContext {
    pub kind: DeviceKind,
    pub device_id: u32,
}

impl DeviceContext {
    /// The host context.
    pub const fn cpu() -> Self {
        Self {
            kind: DeviceKind::Cpu,
            device_id: 0,
        }
    }

    /// An snps_ev device context.
    pub const fn snps_ev(device_id: u32) -> Self {
        Self {
            kind: DeviceKind::SnpsEv,
            device_id,
        }
    }
}

impl fmt::Display for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.device_id)
    }
}

/// Attributes that can be queried through [`crate::DeviceApi::get_attr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceAttr {
    /// Whether the device is present.
    Exist,
    MaxThreadsPerBlock,
    WarpSize,
    MaxSharedMemoryPerBlock,
}
