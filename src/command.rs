//! Commands sent to the executor worker thread.
//!
//! Each capability of [`crate::ScriptExecutor`] has a command variant
//! carrying a `oneshot` reply sender. The memory-pressure variants carry no
//! reply: they are best-effort notifications that must never fail or block
//! the host.

use std::path::PathBuf;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{BridgeError, ExecutionError};
use crate::unbundle::Unbundle;

pub(crate) enum ExecutorCommand {
    /// Run application source text.
    ExecuteScript {
        script: String,
        source_url: String,
        reply: oneshot::Sender<Result<(), ExecutionError>>,
    },

    /// Load a module table plus startup code.
    LoadUnbundle {
        unbundle: Box<dyn Unbundle>,
        startup_code: String,
        source_url: String,
        reply: oneshot::Sender<Result<(), ExecutionError>>,
    },

    /// Return the accumulated batch.
    Flush {
        reply: oneshot::Sender<Result<String, BridgeError>>,
    },

    /// Invoke an exported function and return the resulting batch.
    CallFunction {
        module_id: u32,
        method_id: u32,
        arguments: Vec<Value>,
        reply: oneshot::Sender<Result<String, BridgeError>>,
    },

    /// Invoke a registered callback and return the resulting batch.
    InvokeCallback {
        callback_id: u64,
        arguments: Vec<Value>,
        reply: oneshot::Sender<Result<String, BridgeError>>,
    },

    /// Inject a primitive global variable.
    SetGlobalVariable {
        name: String,
        json_value: String,
        reply: oneshot::Sender<Result<(), BridgeError>>,
    },

    /// Query profiling support.
    SupportsProfiling { reply: oneshot::Sender<bool> },

    /// Start a named profile. Fire-and-forget.
    StartProfiler { title: String },

    /// Stop a named profile and write it out. Fire-and-forget.
    StopProfiler { title: String, path: PathBuf },

    /// Moderate memory pressure notification. Fire-and-forget.
    MemoryPressureModerate,

    /// Critical memory pressure notification. Fire-and-forget.
    MemoryPressureCritical,
}
