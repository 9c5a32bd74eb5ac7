// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The compiled operator boundary.
//!
//! A graph runtime never computes anything itself: each `tvm_op` node names
//! a function in an [`OperatorModule`], and the runtime calls it with the
//! node's input and output buffers. How the module was produced (compiled
//! object, interpreter, host closures) is the module's business.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use device_session::{
    CopySource, CopyTarget, DeviceApi, DeviceContext, DeviceError, DeviceHandle, FreeError,
    Session,
};
use host_tensor::{DType, HostTensor, Shape, TensorError};

/// Errors raised by operator functions.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("function '{0}' not found")]
    FunctionNotFound(String),

    #[error("function '{func}' expects {expected} arguments, got {actual}")]
    ArgCount {
        func: String,
        expected: usize,
        actual: usize,
    },

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("{0}")]
    Free(#[from] FreeError),

    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),

    #[error("function '{func}' failed: {detail}")]
    Failed { func: String, detail: String },
}

/// One buffer passed to an operator function.
#[derive(Debug, Clone, Copy)]
pub struct OpArg<'a> {
    pub handle: &'a DeviceHandle,
    pub shape: &'a Shape,
    pub dtype: DType,
}

impl OpArg<'_> {
    /// Bytes the entry occupies (may be less than its storage buffer).
    pub fn size_bytes(&self) -> usize {
        self.shape.size_bytes(self.dtype)
    }
}

/// What an operator function can reach while it runs: the device API, the
/// context it executes on, and the owning session.
///
/// Workspace requests always land in the env's own session, whichever
/// session is current on the calling thread.
pub struct OpEnv<'a> {
    pub(crate) api: &'a dyn DeviceApi,
    pub(crate) ctx: DeviceContext,
    pub(crate) session: &'a Arc<Session>,
}

impl<'a> OpEnv<'a> {
    pub fn new(api: &'a dyn DeviceApi, ctx: DeviceContext, session: &'a Arc<Session>) -> Self {
        Self { api, ctx, session }
    }

    pub fn ctx(&self) -> DeviceContext {
        self.ctx
    }

    pub fn session(&self) -> &Arc<Session> {
        self.session
    }

    /// Copies the first `len` bytes of `handle` to the host.
    pub fn read_bytes(&self, handle: &DeviceHandle, len: usize) -> Result<Vec<u8>, DeviceError> {
        let mut out = vec![0u8; len];
        self.api.copy_data_from_to(
            CopySource::device(handle, 0),
            CopyTarget::host(&mut out),
            len,
            self.ctx,
            DeviceContext::cpu(),
        )?;
        Ok(out)
    }

    /// Copies `data` to the start of `handle`.
    pub fn write_bytes(&self, handle: &DeviceHandle, data: &[u8]) -> Result<(), DeviceError> {
        self.api.copy_data_from_to(
            CopySource::host(data),
            CopyTarget::device(handle, 0),
            data.len(),
            DeviceContext::cpu(),
            self.ctx,
        )
    }

    /// Copies `size` bytes between two device buffers of this session.
    pub fn copy_device(
        &self,
        from: &DeviceHandle,
        to: &DeviceHandle,
        size: usize,
    ) -> Result<(), DeviceError> {
        self.api.copy_data_from_to(
            CopySource::device(from, 0),
            CopyTarget::device(to, 0),
            size,
            self.ctx,
            self.ctx,
        )
    }

    /// Reads an argument into a host tensor of the argument's shape.
    pub fn read_tensor(&self, arg: &OpArg<'_>) -> Result<HostTensor, ModuleError> {
        let bytes = self.read_bytes(arg.handle, arg.size_bytes())?;
        Ok(HostTensor::from_bytes(arg.shape.clone(), arg.dtype, bytes)?)
    }

    /// Writes a host tensor into an argument. Shape and dtype must match.
    pub fn write_tensor(&self, arg: &OpArg<'_>, tensor: &HostTensor) -> Result<(), ModuleError> {
        if tensor.dtype() != arg.dtype {
            return Err(TensorError::DTypeMismatch {
                actual: tensor.dtype(),
                requested: arg.dtype,
            }
            .into());
        }
        if tensor.size_bytes() != arg.size_bytes() {
            return Err(TensorError::BufferSizeMismatch {
                expected: arg.size_bytes(),
                actual: tensor.size_bytes(),
            }
            .into());
        }
        Ok(self.write_bytes(arg.handle, tensor.as_bytes())?)
    }

    /// Takes `size` bytes of scratch from the session's Workspace.
    pub fn alloc_workspace(&self, size: usize) -> Result<DeviceHandle, DeviceError> {
        let _scope = Session::enter(self.session);
        self.api.alloc_workspace(self.ctx, size)
    }

    pub fn free_workspace(&self, handle: DeviceHandle) -> Result<(), FreeError> {
        self.api.free_workspace(self.ctx, handle)
    }
}

/// A unit of compiled operator entry points.
pub trait OperatorModule: Send + Sync {
    /// Module name, for logs and errors.
    fn name(&self) -> &str;

    /// Whether `func` can be called.
    fn has_function(&self, func: &str) -> bool;

    /// Runs `func` over `args` (inputs first, then outputs).
    fn call(&self, func: &str, args: &[OpArg<'_>], env: &OpEnv<'_>) -> Result<(), ModuleError>;
}

/// Signature of a [`FunctionModule`] entry.
pub type OpFn = dyn Fn(&[OpArg<'_>], &OpEnv<'_>) -> Result<(), ModuleError> + Send + Sync;

/// An [`OperatorModule`] backed by a table of host closures.
///
/// # Example
/// ```
/// use graph_runtime::{FunctionModule, OperatorModule};
///
/// let module = FunctionModule::new("host")
///     .with_function("identity", |args, env| {
///         let input = env.read_tensor(&args[0])?;
///         env.write_tensor(&args[1], &input)
///     });
/// assert!(module.has_function("identity"));
/// ```
pub struct FunctionModule {
    name: String,
    functions: BTreeMap<String, Arc<OpFn>>,
}

impl FunctionModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) a function and returns the module.
    pub fn with_function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[OpArg<'_>], &OpEnv<'_>) -> Result<(), ModuleError> + Send + Sync + 'static,
    {
        self.register(name, f);
        self
    }

    /// Adds (or replaces) a function.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[OpArg<'_>], &OpEnv<'_>) -> Result<(), ModuleError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl OperatorModule for FunctionModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_function(&self, func: &str) -> bool {
        self.functions.contains_key(func)
    }

    fn call(&self, func: &str, args: &[OpArg<'_>], env: &OpEnv<'_>) -> Result<(), ModuleError> {
        let f = self
            .functions
            .get(func)
            .ok_or_else(|| ModuleError::FunctionNotFound(func.to_string()))?;
        f(args, env)
    }
}

impl fmt::Debug for FunctionModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionModule")
            .field("name", &self.name)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_session::{HostLowLevelDevice, SessionConfig, SnpsEvDeviceApi};
    use section_alloc::SectionKind;

    fn session() -> Arc<Session> {
        let config = SessionConfig::default();
        Session::open(&config, Arc::new(HostLowLevelDevice::covering(&config))).unwrap()
    }

    #[test]
    fn test_function_lookup() {
        let m = FunctionModule::new("m")
            .with_function("b", |_, _| Ok(()))
            .with_function("a", |_, _| Ok(()));
        assert_eq!(m.name(), "m");
        assert!(m.has_function("a"));
        assert!(!m.has_function("c"));
        assert_eq!(m.function_names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(format!("{m:?}").contains("FunctionModule"));
    }

    #[test]
    fn test_call_unknown() {
        let s = session();
        let env = OpEnv::new(SnpsEvDeviceApi::global(), DeviceContext::snps_ev(0), &s);
        let m = FunctionModule::new("m");
        assert!(matches!(
            m.call("missing", &[], &env),
            Err(ModuleError::FunctionNotFound(_))
        ));
    }

    #[test]
    fn test_env_tensor_roundtrip() {
        let s = session();
        let api = SnpsEvDeviceApi::global();
        let env = OpEnv::new(api, DeviceContext::snps_ev(0), &s);
        let shape = Shape::vector(3);
        let handle = api.alloc_data_space_in(&s, 12, 4).unwrap();
        let arg = OpArg {
            handle: &handle,
            shape: &shape,
            dtype: DType::Float32,
        };

        let t = HostTensor::from_f32(shape.clone(), &[1.0, 2.5, -3.0]).unwrap();
        env.write_tensor(&arg, &t).unwrap();
        assert_eq!(env.read_tensor(&arg).unwrap(), t);

        let wrong = HostTensor::zeros(shape.clone(), DType::Int32);
        assert!(matches!(
            env.write_tensor(&arg, &wrong),
            Err(ModuleError::Tensor(TensorError::DTypeMismatch { .. }))
        ));
        api.free_data_space(DeviceContext::snps_ev(0), handle).unwrap();
    }

    #[test]
    fn test_env_workspace_without_current_session() {
        let s = session();
        assert!(!Session::has_current());
        let env = OpEnv::new(SnpsEvDeviceApi::global(), DeviceContext::snps_ev(0), &s);

        let scratch = env.alloc_workspace(20).unwrap();
        assert_eq!(s.allocated_bytes(SectionKind::Workspace), 24);
        env.free_workspace(scratch).unwrap();
        assert_eq!(s.allocated_bytes(SectionKind::Workspace), 0);
        assert!(!Session::has_current());
    }

    #[test]
    fn test_env_workspace_ignores_other_current_session() {
        let own = session();
        let other = session();
        let _scope = Session::enter(&other);
        let env = OpEnv::new(SnpsEvDeviceApi::global(), DeviceContext::snps_ev(0), &own);

        let scratch = env.alloc_workspace(16).unwrap();
        assert!(Arc::ptr_eq(scratch.session(), &own));
        assert_eq!(own.allocated_bytes(SectionKind::Workspace), 16);
        assert_eq!(other.allocated_bytes(SectionKind::Workspace), 0);
        env.free_workspace(scratch).unwrap();

        // The thread's current session is restored afterwards.
        assert!(Arc::ptr_eq(&Session::current().unwrap(), &other));
    }
}
