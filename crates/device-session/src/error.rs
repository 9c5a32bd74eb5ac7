// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for sessions, transports, and the device API.
//!
//! Every error here is terminal for the operation that raised it. Nothing is
//! retried at this layer; the embedding runtime decides whether to abort.

use crate::{DeviceContext, DeviceHandle, DeviceKind, SessionId};
use section_alloc::{AllocError, DevPtr, SectionKind};

/// Failures reported by a [`crate::LowLevelDevice`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The access falls outside the memory the device exposes.
    #[error("{op} of {len} bytes at {addr} is outside device '{device}'")]
    OutOfRange {
        op: &'static str,
        addr: DevPtr,
        len: usize,
        device: String,
    },

    /// The transport itself failed.
    #[error("device '{device}' failed: {detail}")]
    Failed { device: String, detail: String },
}

/// Errors raised by [`crate::Session`] and [`crate::SnpsEvDeviceApi`].
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// A section could not satisfy an allocation or free.
    #[error("allocation failed: {0}")]
    Allocation(#[from] AllocError),

    /// A device-to-device copy spans two sessions.
    #[error("attempt to copy data between different snps_ev sessions ({from} != {to})")]
    SessionMismatch { from: SessionId, to: SessionId },

    /// A device-to-device copy names two different device ids.
    #[error("can only copy between the same snps_ev device ({from} != {to})")]
    DeviceIdMismatch { from: u32, to: u32 },

    /// The pair of copy contexts is not one this adapter handles.
    #[error("expected copy from/to snps_ev device or between snps_ev devices, got {from} -> {to}")]
    UnsupportedCopyDirection { from: DeviceKind, to: DeviceKind },

    /// A copy endpoint is a host buffer where its context says device, or
    /// the other way round.
    #[error("{side} endpoint does not match its {context} context")]
    EndpointMismatch {
        side: &'static str,
        context: DeviceKind,
    },

    /// A copy would run past the end of one of its buffers.
    #[error("copy of {size} bytes at offset {offset} overruns {side} buffer of {len} bytes")]
    CopyOutOfBounds {
        side: &'static str,
        offset: usize,
        size: usize,
        len: usize,
    },

    /// A handle was released through the wrong free call.
    #[error("handle at {addr} belongs to section \"{actual}\", not \"{expected}\"")]
    WrongSection {
        addr: DevPtr,
        expected: SectionKind,
        actual: SectionKind,
    },

    /// The operation was addressed to a context this adapter does not serve.
    #[error("unsupported device context {0}")]
    UnsupportedContext(DeviceContext),

    /// No session has been entered on the calling thread.
    #[error("no snps_ev session is active on this thread")]
    NoActiveSession,

    /// The low-level device reported a failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The session configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A free the device API refused. The handle comes back with the error, so
/// its range stays reachable and can be released through the right call.
#[derive(Debug, thiserror::Error)]
#[error("cannot free {}: {error}", .handle.dev_ptr())]
pub struct FreeError {
    error: DeviceError,
    handle: DeviceHandle,
}

impl FreeError {
    pub(crate) fn new(error: DeviceError, handle: DeviceHandle) -> Self {
        Self { error, handle }
    }

    pub fn error(&self) -> &DeviceError {
        &self.error
    }

    /// Takes the handle back, dropping the error.
    pub fn into_handle(self) -> DeviceHandle {
        self.handle
    }

    pub fn into_parts(self) -> (DeviceError, DeviceHandle) {
        (self.error, self.handle)
    }
}
