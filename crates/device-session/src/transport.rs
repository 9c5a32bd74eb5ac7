// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Low-level device transport.
//!
//! A [`LowLevelDevice`] moves raw bytes to and from device addresses. How it
//! reaches the hardware (serial link, debug probe, RPC) is outside this
//! crate. [`HostLowLevelDevice`] simulates the device in process memory and
//! is what the tests and the CLI self-test run against.

use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use section_alloc::DevPtr;

use crate::error::TransportError;

/// Byte-level access to an attached device.
pub trait LowLevelDevice: fmt::Debug + Send + Sync {
    /// Fill `buf` with the bytes starting at `addr`.
    fn read(&self, addr: DevPtr, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Write `data` starting at `addr`.
    fn write(&self, addr: DevPtr, data: &[u8]) -> Result<(), TransportError>;

    /// Human-readable device name for logs and errors.
    fn name(&self) -> &str;
}

/// A simulated device backed by a host byte vector mapped at `base`.
pub struct HostLowLevelDevice {
    name: String,
    base: DevPtr,
    memory: Mutex<Vec<u8>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl HostLowLevelDevice {
    /// Simulate `size` zeroed bytes of device memory starting at `base`.
    pub fn new(base: DevPtr, size: usize) -> Self {
        Self {
            name: format!("host-sim@{base}"),
            base,
            memory: Mutex::new(vec![0; size]),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Simulate exactly the address span covered by a session layout.
    pub fn covering(config: &crate::SessionConfig) -> Self {
        let (base, size) = config.address_span();
        Self::new(base, size)
    }

    pub fn base(&self) -> DevPtr {
        self.base
    }

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Number of `read` calls served so far, including failed ones.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `write` calls served so far, including failed ones.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.memory.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn range(
        &self,
        op: &'static str,
        addr: DevPtr,
        len: usize,
        mem_len: usize,
    ) -> Result<Range<usize>, TransportError> {
        let out_of_range = || TransportError::OutOfRange {
            op,
            addr,
            len,
            device: self.name.clone(),
        };
        let start = addr.distance_from(self.base).ok_or_else(out_of_range)?;
        let end = start.checked_add(len).ok_or_else(out_of_range)?;
        if end > mem_len {
            return Err(out_of_range());
        }
        Ok(start..end)
    }
}

impl LowLevelDevice for HostLowLevelDevice {
    fn read(&self, addr: DevPtr, buf: &mut [u8]) -> Result<(), TransportError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let memory = self.lock();
        let range = self.range("read", addr, buf.len(), memory.len())?;
        buf.copy_from_slice(&memory[range]);
        Ok(())
    }

    fn write(&self, addr: DevPtr, data: &[u8]) -> Result<(), TransportError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut memory = self.lock();
        let mem_len = memory.len();
        let range = self.range("write", addr, data.len(), mem_len)?;
        memory[range].copy_from_slice(data);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for HostLowLevelDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostLowLevelDevice")
            .field("base", &self.base)
            .field("size", &self.size())
            .field("reads", &self.read_count())
            .field("writes", &self.write_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> HostLowLevelDevice {
        HostLowLevelDevice::new(DevPtr::new(0x1000), 64)
    }

    #[test]
    fn test_write_then_read() {
        let dev = device();
        dev.write(DevPtr::new(0x1010), &[1, 2, 3, 4]).unwrap();

        let mut buf = [0u8; 4];
        dev.read(DevPtr::new(0x1010), &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(dev.read_count(), 1);
        assert_eq!(dev.write_count(), 1);
    }

    #[test]
    fn test_memory_starts_zeroed() {
        let dev = device();
        let mut buf = [0xffu8; 8];
        dev.read(DevPtr::new(0x1000), &mut buf).unwrap();
        assert_eq!(buf, [0; 8]);
    }

    #[test]
    fn test_below_base_rejected() {
        let dev = device();
        let mut buf = [0u8; 1];
        let err = dev.read(DevPtr::new(0x0fff), &mut buf).unwrap_err();
        assert!(matches!(err, TransportError::OutOfRange { op: "read", .. }));
    }

    #[test]
    fn test_past_end_rejected() {
        let dev = device();
        // Last valid byte is 0x103f.
        dev.write(DevPtr::new(0x103f), &[7]).unwrap();
        let err = dev.write(DevPtr::new(0x103f), &[7, 8]).unwrap_err();
        assert!(matches!(err, TransportError::OutOfRange { op: "write", len: 2, .. }));
    }

    #[test]
    fn test_zero_length_access() {
        let dev = device();
        dev.write(DevPtr::new(0x1040), &[]).unwrap();
        dev.read(DevPtr::new(0x1000), &mut []).unwrap();
    }

    #[test]
    fn test_covering_default_layout() {
        let config = crate::SessionConfig::default();
        let dev = HostLowLevelDevice::covering(&config);
        assert_eq!(dev.base(), DevPtr::new(0x2000_0000));
        assert_eq!(dev.size(), 80 * 1024);
    }
}
