// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The graph executor.
//!
//! ```text
//! GraphRuntime::create(graph_json, module, session, ctx)
//!     │  validate graph, resolve module functions,
//!     │  one Heap buffer per storage id
//!     ▼
//! set_input(i, tensor)   host → device
//!     ▼
//! run()                  module.call(func, [inputs.., outputs..]) per op
//!     ▼
//! get_output(i, tensor)  device → host
//!     ▼
//! drop                   storage buffers freed
//! ```
//!
//! All memory traffic goes through the device API; the runtime never
//! touches the low-level device directly.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use device_session::{
    CopySource, CopyTarget, DeviceApi, DeviceContext, DeviceError, DeviceHandle, Session,
    SnpsEvDeviceApi,
};
use graph_ir::{graph::Validated, EntryInfo, ProgramGraph};
use host_tensor::HostTensor;
use section_alloc::SectionKind;

use crate::{OpArg, OpEnv, OperatorModule, RunMetrics, RuntimeConfig, RuntimeError};

/// Executes a validated graph program on one snps_ev session.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use device_session::{DeviceContext, HostLowLevelDevice, Session, SessionConfig};
/// use graph_runtime::{FunctionModule, GraphRuntime};
/// use host_tensor::{HostTensor, Shape};
///
/// let json = r#"{
///   "nodes": [
///     {"op": "null", "name": "x", "inputs": []},
///     {"op": "tvm_op", "name": "copy", "inputs": [[0, 0, 0]],
///      "attrs": {"func_name": "identity", "num_inputs": "1", "num_outputs": "1"}}
///   ],
///   "arg_nodes": [0],
///   "heads": [[1, 0, 0]],
///   "attrs": {
///     "storage_id": ["list_int", [0, 1]],
///     "shape": ["list_shape", [[2], [2]]],
///     "dltype": ["list_str", ["float32", "float32"]]
///   }
/// }"#;
/// let module = FunctionModule::new("host").with_function("identity", |args, env| {
///     let input = env.read_tensor(&args[0])?;
///     env.write_tensor(&args[1], &input)
/// });
///
/// let config = SessionConfig::default();
/// let session = Session::open(&config, Arc::new(HostLowLevelDevice::covering(&config))).unwrap();
/// let rt = GraphRuntime::create(json, Arc::new(module), session, DeviceContext::snps_ev(0)).unwrap();
///
/// rt.set_input(0, &HostTensor::from_f32(Shape::vector(2), &[1.5, 2.5]).unwrap()).unwrap();
/// rt.run().unwrap();
/// assert_eq!(rt.output_tensor(0).unwrap().to_f32_vec().unwrap(), vec![1.5, 2.5]);
/// ```
pub struct GraphRuntime {
    graph: ProgramGraph<Validated>,
    module: Arc<dyn OperatorModule>,
    session: Arc<Session>,
    ctx: DeviceContext,
    api: &'static dyn DeviceApi,
    /// One buffer per storage slot, in storage-plan order.
    storage: Vec<DeviceHandle>,
    /// Entry id → index into `storage`.
    entry_storage: Vec<usize>,
    profiling: bool,
}

impl GraphRuntime {
    /// Parses and validates `graph_json`, then builds a runtime for it.
    pub fn create(
        graph_json: &str,
        module: Arc<dyn OperatorModule>,
        session: Arc<Session>,
        ctx: DeviceContext,
    ) -> Result<Self, RuntimeError> {
        let graph = ProgramGraph::from_json("graph", graph_json)?.validate()?;
        Self::with_graph(graph, module, session, ctx)
    }

    /// Opens a session on `device` with the configured layout and builds a
    /// runtime for the configured graph.
    pub fn load(
        config: &RuntimeConfig,
        module: Arc<dyn OperatorModule>,
        device: Arc<dyn device_session::LowLevelDevice>,
    ) -> Result<Self, RuntimeError> {
        let session = Session::open(&config.session, device)?;
        let graph = config.load_graph()?;
        let ctx = DeviceContext::snps_ev(config.session.device_id);
        let mut runtime = Self::with_graph(graph, module, session, ctx)?;
        runtime.set_profiling(config.enable_profiling);
        Ok(runtime)
    }

    /// Builds a runtime for an already validated graph.
    ///
    /// `ctx` must name the session's device, and every operator's function
    /// must exist in `module`. Storage is
    /// allocated from the session's Heap; if any buffer cannot be
    /// allocated, the ones already taken are released.
    pub fn with_graph(
        graph: ProgramGraph<Validated>,
        module: Arc<dyn OperatorModule>,
        session: Arc<Session>,
        ctx: DeviceContext,
    ) -> Result<Self, RuntimeError> {
        let api: &'static dyn DeviceApi = SnpsEvDeviceApi::global();
        api.set_device(ctx)?;
        if ctx.device_id != session.device_id() {
            return Err(DeviceError::DeviceIdMismatch {
                from: ctx.device_id,
                to: session.device_id(),
            }
            .into());
        }

        for (_, node) in graph.op_nodes() {
            let func = node.func_name().unwrap_or_default();
            if !module.has_function(func) {
                return Err(RuntimeError::MissingFunction {
                    module: module.name().to_string(),
                    node: node.name.clone(),
                    func: func.to_string(),
                });
            }
        }

        let plan = graph.storage_plan();
        let _scope = Session::enter(&session);
        let mut storage = Vec::with_capacity(plan.slots.len());
        for slot in &plan.slots {
            match api.alloc_data_space(ctx, slot.size_bytes, session.word_size()) {
                Ok(handle) => storage.push(handle),
                Err(e) => {
                    release(api, ctx, storage);
                    return Err(e.into());
                }
            }
        }

        let slot_index: BTreeMap<usize, usize> = plan
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.storage_id, i))
            .collect();
        let entry_storage = graph
            .entries()
            .iter()
            .map(|entry| slot_index[&entry.storage_id])
            .collect();

        tracing::info!(
            "{} on {} with module '{}': {} buffers, {} heap bytes",
            graph.summary(),
            session.id(),
            module.name(),
            storage.len(),
            plan.padded_bytes(session.word_size()),
        );

        Ok(Self {
            graph,
            module,
            session,
            ctx,
            api,
            storage,
            entry_storage,
            profiling: true,
        })
    }

    pub fn set_profiling(&mut self, enabled: bool) {
        self.profiling = enabled;
    }

    pub fn graph(&self) -> &ProgramGraph<Validated> {
        &self.graph
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn num_inputs(&self) -> usize {
        self.graph.input_nodes().len()
    }

    pub fn num_outputs(&self) -> usize {
        self.graph.outputs().len()
    }

    /// Bytes requested across all storage buffers.
    pub fn storage_bytes(&self) -> usize {
        self.storage.iter().map(DeviceHandle::size).sum()
    }

    /// Copies `tensor` into graph input `index`.
    pub fn set_input(&self, index: usize, tensor: &HostTensor) -> Result<(), RuntimeError> {
        let eid = self.input_entry(index)?;
        self.check_tensor(eid, tensor)?;
        let handle = self.handle_of(eid);
        self.api.copy_data_from_to(
            CopySource::host(tensor.as_bytes()),
            CopyTarget::device(handle, 0),
            tensor.size_bytes(),
            DeviceContext::cpu(),
            self.ctx,
        )?;
        tracing::debug!("input {index} set ({} bytes at {})", tensor.size_bytes(), handle.dev_ptr());
        Ok(())
    }

    /// Copies `tensor` into the input called `name`.
    pub fn set_input_by_name(&self, name: &str, tensor: &HostTensor) -> Result<(), RuntimeError> {
        let index = self
            .graph
            .input_index(name)
            .ok_or_else(|| RuntimeError::UnknownInput(name.to_string()))?;
        self.set_input(index, tensor)
    }

    /// Runs every operator node in order.
    pub fn run(&self) -> Result<RunMetrics, RuntimeError> {
        let run_start = Instant::now();
        let _scope = Session::enter(&self.session);
        let env = OpEnv::new(self.api, self.ctx, &self.session);
        let mut metrics = RunMetrics::new();
        let mut ops = 0;

        for (nid, node) in self.graph.op_nodes() {
            let func = node.func_name().unwrap_or_default();
            let mut args = Vec::with_capacity(node.inputs.len() + node.num_outputs());
            for input in &node.inputs {
                args.push(self.op_arg(input.node_id, input.index));
            }
            for index in 0..node.num_outputs() {
                args.push(self.op_arg(nid, index));
            }

            tracing::debug!("op {nid} '{}' -> {func} ({} args)", node.name, args.len());
            let op_start = Instant::now();
            self.module
                .call(func, &args, &env)
                .map_err(|source| RuntimeError::OpFailed {
                    node: node.name.clone(),
                    source,
                })?;
            if self.profiling {
                metrics.record_op(&node.name, func, op_start.elapsed());
            }
            ops += 1;
        }

        self.api.stream_sync(self.ctx);
        metrics.finalise(
            run_start.elapsed(),
            ops,
            self.storage.iter().map(|h| padded(h.size(), self.session.word_size())).sum(),
            self.session
                .section_stats(SectionKind::Workspace)
                .peak_allocated_bytes,
        );
        tracing::debug!("{}", metrics.summary());
        Ok(metrics)
    }

    /// Copies graph output `index` into `tensor`.
    pub fn get_output(&self, index: usize, tensor: &mut HostTensor) -> Result<(), RuntimeError> {
        let eid = self.output_entry(index)?;
        self.check_tensor(eid, tensor)?;
        let size = tensor.size_bytes();
        self.api.copy_data_from_to(
            CopySource::device(self.handle_of(eid), 0),
            CopyTarget::host(tensor.as_bytes_mut()),
            size,
            self.ctx,
            DeviceContext::cpu(),
        )?;
        Ok(())
    }

    /// Copies graph output `index` into a new tensor of the output's shape.
    pub fn output_tensor(&self, index: usize) -> Result<HostTensor, RuntimeError> {
        let eid = self.output_entry(index)?;
        let entry = self.entry_info(eid);
        let mut tensor = HostTensor::zeros(entry.shape.clone(), entry.dtype);
        self.get_output(index, &mut tensor)?;
        Ok(tensor)
    }

    // ── Private helpers ────────────────────────────────────────

    fn input_entry(&self, index: usize) -> Result<usize, RuntimeError> {
        let inputs = self.graph.input_nodes();
        inputs
            .get(index)
            .and_then(|&nid| self.graph.entry_id(nid, 0))
            .ok_or(RuntimeError::InputOutOfRange {
                index,
                count: inputs.len(),
            })
    }

    fn output_entry(&self, index: usize) -> Result<usize, RuntimeError> {
        let outputs = self.graph.outputs();
        outputs
            .get(index)
            .and_then(|&entry| self.graph.entry_of(entry))
            .ok_or(RuntimeError::OutputOutOfRange {
                index,
                count: outputs.len(),
            })
    }

    fn entry_info(&self, eid: usize) -> &EntryInfo {
        &self.graph.entries()[eid]
    }

    fn handle_of(&self, eid: usize) -> &DeviceHandle {
        &self.storage[self.entry_storage[eid]]
    }

    /// Argument for output `index` of node `nid`. Validation guarantees
    /// every node output has an entry.
    fn op_arg(&self, nid: usize, index: usize) -> OpArg<'_> {
        let eid = self
            .graph
            .entry_id(nid, index)
            .expect("validated graph resolves every node output");
        let entry = self.entry_info(eid);
        OpArg {
            handle: self.handle_of(eid),
            shape: &entry.shape,
            dtype: entry.dtype,
        }
    }

    fn check_tensor(&self, eid: usize, tensor: &HostTensor) -> Result<(), RuntimeError> {
        let entry = self.entry_info(eid);
        if tensor.shape() != &entry.shape || tensor.dtype() != entry.dtype {
            return Err(RuntimeError::TensorMismatch {
                entry: eid,
                expected_shape: entry.shape.clone(),
                expected_dtype: entry.dtype,
                actual_shape: tensor.shape().clone(),
                actual_dtype: tensor.dtype(),
            });
        }
        Ok(())
    }
}

fn padded(size: usize, word: usize) -> usize {
    size.div_ceil(word) * word
}

fn release(api: &dyn DeviceApi, ctx: DeviceContext, handles: Vec<DeviceHandle>) {
    for handle in handles {
        if let Err(e) = api.free_data_space(ctx, handle) {
            tracing::error!("storage buffer not released: {e}");
        }
    }
}

impl Drop for GraphRuntime {
    fn drop(&mut self) {
        let count = self.storage.len();
        release(self.api, self.ctx, std::mem::take(&mut self.storage));
        tracing::debug!("graph runtime released {count} storage buffers on {}", self.session.id());
    }
}

impl std::fmt::Debug for GraphRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphRuntime")
            .field("graph", &self.graph.name)
            .field("module", &self.module.name())
            .field("session", &self.session.id())
            .field("ctx", &self.ctx)
            .field("buffers", &self.storage.len())
            .field("profiling", &self.profiling)
            .finish()
    }
}
