// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # device-session
//!
//! Sessions on an attached snps_ev accelerator and the device API a graph
//! runtime drives them through.
//!
//! # Key Components
//!
//! - [`LowLevelDevice`] — byte-level read/write transport to the device.
//!   [`HostLowLevelDevice`] simulates one in host memory.
//! - [`Session`] — one attached device plus a Heap and a Workspace
//!   [`section_alloc::SectionAllocator`]. Sessions are shared via `Arc` and
//!   can be made current on a thread with [`Session::enter`].
//! - [`DeviceHandle`] — an allocation tagged with its owning session.
//! - [`DeviceApi`] / [`SnpsEvDeviceApi`] — alloc, free, copy and sync,
//!   looked up by name through [`registry`].
//! - [`SessionConfig`] — section layout from TOML.
//!
//! # Ownership Model
//!
//! ```text
//! SnpsEvDeviceApi::alloc_data_space(ctx, size, align)
//!       │  Session::current()
//!       ▼
//!   Session ──► SectionAllocator (Heap) ──► DevPtr
//!       │
//!       ▼
//!   DeviceHandle { ptr, section, size, Arc<Session> }
//!       │
//!       │  free_data_space(ctx, handle)   (consumes the handle, or returns
//!       │                                 it inside FreeError)
//!       ▼
//!   Session::free_in_section()
//! ```
//!
//! Every copy goes through the owning session's `LowLevelDevice`. A
//! device-to-device copy between handles of different sessions is rejected
//! before the device is touched.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use device_session::{
//!     CopySource, CopyTarget, DeviceApi, DeviceContext, HostLowLevelDevice, Session,
//!     SessionConfig, SnpsEvDeviceApi,
//! };
//!
//! let config = SessionConfig::default();
//! let session = Session::open(&config, Arc::new(HostLowLevelDevice::covering(&config))).unwrap();
//! let _scope = Session::enter(&session);
//!
//! let api = SnpsEvDeviceApi::global();
//! let ev = DeviceContext::snps_ev(0);
//! let buf = api.alloc_data_space(ev, 4, 4).unwrap();
//! api.copy_data_from_to(CopySource::host(&[1, 2, 3, 4]), CopyTarget::device(&buf, 0), 4,
//!     DeviceContext::cpu(), ev).unwrap();
//!
//! let mut out = [0u8; 4];
//! api.copy_data_from_to(CopySource::device(&buf, 0), CopyTarget::host(&mut out), 4,
//!     ev, DeviceContext::cpu()).unwrap();
//! assert_eq!(out, [1, 2, 3, 4]);
//! api.free_data_space(ev, buf).unwrap();
//! ```

mod config;
mod context;
mod current;
mod device_api;
mod error;
mod handle;
pub mod registry;
mod session;
mod transport;

pub use config::{SectionConfig, SessionConfig};
pub use context::{DeviceAttr, DeviceContext, DeviceKind};
pub use current::SessionScope;
pub use device_api::{CopySource, CopyTarget, DeviceApi, SnpsEvDeviceApi};
pub use error::{DeviceError, FreeError, TransportError};
pub use handle::DeviceHandle;
pub use session::{Session, SessionId};
pub use transport::{HostLowLevelDevice, LowLevelDevice};
