//! The capability set the bridge requires from a scripting engine.
//!
//! The bridge is polymorphic over [`ScriptExecutor`] only; it never names a
//! concrete engine type. An engine adapter is built at bridge construction
//! time by a factory that receives the bridge's [`RawBatchHandler`], the
//! only path by which raw engine output reaches the host.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{BridgeError, ExecutionError};
use crate::unbundle::Unbundle;

/// Handler for raw batched results: `(raw_batch, is_end_of_batch)`.
///
/// `Arc` so engine internals may retain it beyond a single call and invoke
/// it from an internal thread. Invocations must be serialized relative to
/// each other; the handler itself never blocks on engine state.
pub type RawBatchHandler = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// One running instance of a scripting environment.
///
/// All methods are synchronous and may block the calling thread for the
/// duration of script execution. The batch-producing methods (`flush`,
/// `call_function`, `invoke_callback`) return the engine's accumulated
/// queue in the raw batch encoding; the bridge decodes it.
pub trait ScriptExecutor: Send {
    /// Run application source text. Engine errors propagate as
    /// [`ExecutionError`] with best-effort location info.
    fn execute_application_script(
        &mut self,
        script: &str,
        source_url: &str,
    ) -> Result<(), ExecutionError>;

    /// Load a lazily-resolvable module table plus its startup code.
    /// Module resolution is the engine's responsibility.
    fn load_application_unbundle(
        &mut self,
        unbundle: Box<dyn Unbundle>,
        startup_code: &str,
        source_url: &str,
    ) -> Result<(), ExecutionError>;

    /// Return the currently accumulated batch.
    fn flush(&mut self) -> Result<String, BridgeError>;

    /// Invoke an exported function by module/method id and return the
    /// resulting batch.
    fn call_function(
        &mut self,
        module_id: u32,
        method_id: u32,
        arguments: &[Value],
    ) -> Result<String, BridgeError>;

    /// Invoke a previously registered callback by id and return the
    /// resulting batch.
    fn invoke_callback(&mut self, callback_id: u64, arguments: &[Value])
        -> Result<String, BridgeError>;

    /// Inject a primitive global variable. `json_value` is the
    /// already-encoded JSON text. Produces no batch.
    fn set_global_variable(&mut self, name: &str, json_value: &str) -> Result<(), BridgeError>;

    /// Whether this engine supports profiling. Best effort.
    fn supports_profiling(&self) -> bool {
        false
    }

    /// Start a named profile. No-op for engines without profiling.
    fn start_profiler(&mut self, _title: &str) {}

    /// Stop a named profile and write it to `path`. No-op for engines
    /// without profiling.
    fn stop_profiler(&mut self, _title: &str, _path: &Path) {}

    /// The host is under moderate memory pressure; free caches if
    /// possible. Must not fail; failures are logged by the engine and
    /// otherwise ignored.
    fn handle_memory_pressure_moderate(&mut self) {}

    /// The host is under critical memory pressure; release as much memory
    /// as possible. Must not fail.
    fn handle_memory_pressure_critical(&mut self) {}
}
