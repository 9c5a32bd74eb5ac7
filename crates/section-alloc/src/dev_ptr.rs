// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Typed device addresses.
//!
//! A [`DevPtr`] is an address in the *device's* address space. It is a plain
//! integer newtype with no conversion to or from host pointers, so a device
//! address can never be dereferenced on the host by accident. Bounds are not
//! the type's concern; the owning [`crate::SectionAllocator`] enforces them.

use std::fmt;

/// An address in the attached device's memory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct DevPtr(u64);

impl DevPtr {
    /// Wraps a raw device address.
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw device address.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns this address advanced by `bytes`, or `None` on overflow.
    pub fn offset(self, bytes: usize) -> Option<DevPtr> {
        u64::try_from(bytes)
            .ok()
            .and_then(|b| self.0.checked_add(b))
            .map(DevPtr)
    }

    /// Returns the byte distance from `base` to `self`, or `None` if
    /// `self` lies below `base`.
    pub fn distance_from(self, base: DevPtr) -> Option<usize> {
        self.0
            .checked_sub(base.0)
            .and_then(|d| usize::try_from(d).ok())
    }

    /// Returns `true` if the address is a multiple of `alignment`.
    pub fn is_aligned(self, alignment: usize) -> bool {
        alignment != 0 && self.0 % alignment as u64 == 0
    }
}

impl fmt::Display for DevPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        let p = DevPtr::new(0x2000_0000);
        assert_eq!(p.offset(0x10), Some(DevPtr::new(0x2000_0010)));
        assert_eq!(DevPtr::new(u64::MAX).offset(1), None);
    }

    #[test]
    fn test_distance_from() {
        let base = DevPtr::new(0x100);
        assert_eq!(DevPtr::new(0x140).distance_from(base), Some(0x40));
        assert_eq!(DevPtr::new(0x80).distance_from(base), None);
    }

    #[test]
    fn test_alignment() {
        assert!(DevPtr::new(0x40).is_aligned(8));
        assert!(!DevPtr::new(0x41).is_aligned(8));
        assert!(!DevPtr::new(0x40).is_aligned(0));
    }

    #[test]
    fn test_display() {
        assert_eq!(DevPtr::new(0x2000_0000).to_string(), "0x20000000");
        assert_eq!(DevPtr::new(0x40).to_string(), "0x00000040");
    }
}
