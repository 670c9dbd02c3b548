//! The bridge: single authoritative owner of one scripting-engine instance.
//!
//! The host interacts with the engine only through [`Bridge`]. Construction
//! wires the engine's raw output to the host callback through a forwarding
//! handler that shares a destruction flag with the bridge; once destruction
//! begins, every delivery and every forwarded operation becomes a silent
//! no-op. Setting the flag before releasing the executor is the core safety
//! invariant: a raw batch racing with teardown observes the flag and is
//! dropped instead of reaching a host that has stopped listening.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::call::{parse_method_calls, MethodCall};
use crate::error::BridgeError;
use crate::executor::{RawBatchHandler, ScriptExecutor};
use crate::unbundle::Unbundle;

/// Host-supplied sink for decoded batches: `(calls, is_end_of_batch)`.
///
/// Runs on whichever thread delivers the batch; it must not block
/// indefinitely and must not panic across the boundary.
pub type BatchCallback = Box<dyn Fn(Vec<MethodCall>, bool) + Send + Sync>;

/// State shared between the bridge and every forwarding closure it hands
/// out. The destruction flag is written exactly once (false→true) and read
/// with acquire ordering thereafter, so the closures need no further
/// locking.
struct BridgeShared {
    destroyed: AtomicBool,
    callback: BatchCallback,
}

impl BridgeShared {
    /// Decode a raw batch and hand it to the host callback, unless
    /// destruction has begun, in which case drop it silently. Batches produced
    /// after destruction are unobservable garbage from the host's
    /// perspective.
    fn deliver(&self, raw_batch: &str, is_end_of_batch: bool) -> Result<(), BridgeError> {
        if self.destroyed.load(Ordering::Acquire) {
            tracing::debug!("dropping batch delivered after destruction began");
            return Ok(());
        }
        let calls = parse_method_calls(raw_batch)?;
        (self.callback)(calls, is_end_of_batch);
        Ok(())
    }
}

/// Owns one [`ScriptExecutor`] and mediates every host↔script interaction.
///
/// A bridge is created once per embedding session and torn down exactly
/// once, on the thread that constructed it. All operations are synchronous
/// and may block for the duration of script execution.
pub struct Bridge {
    shared: Arc<BridgeShared>,
    /// `Some` from construction until `destroy()`; never dereferenced after
    /// the destruction flag is set.
    executor: Option<Box<dyn ScriptExecutor>>,
}

impl Bridge {
    /// Construct a bridge.
    ///
    /// `factory` is invoked exactly once, synchronously, with the bridge's
    /// forwarding handler and must produce a live executor. `callback`
    /// receives every decoded batch until destruction begins.
    pub fn new<F, C>(factory: F, callback: C) -> Result<Self, BridgeError>
    where
        F: FnOnce(RawBatchHandler) -> Result<Box<dyn ScriptExecutor>, BridgeError>,
        C: Fn(Vec<MethodCall>, bool) + Send + Sync + 'static,
    {
        let shared = Arc::new(BridgeShared {
            destroyed: AtomicBool::new(false),
            callback: Box::new(callback),
        });

        let handler_shared = Arc::clone(&shared);
        let handler: RawBatchHandler = Arc::new(move |raw_batch, is_end_of_batch| {
            // Decode failures cannot propagate out of an engine-internal
            // thread; surface them in the log instead.
            if let Err(e) = handler_shared.deliver(raw_batch, is_end_of_batch) {
                tracing::warn!("dropping undecodable batch from executor: {}", e);
            }
        });

        let executor = factory(handler)?;
        tracing::debug!("bridge constructed");

        Ok(Self {
            shared,
            executor: Some(executor),
        })
    }

    /// Tear the bridge down. Idempotent; must run on the thread that
    /// constructed the bridge.
    ///
    /// The destruction flag is set *before* the executor is released.
    /// Releasing the executor may synchronously drain pending work through
    /// the forwarding handler; those reentrant deliveries observe the flag
    /// already set and no-op.
    pub fn destroy(&mut self) {
        if self.shared.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("bridge destroying");
        self.executor = None;
    }

    /// Whether destruction has begun.
    pub fn is_destroyed(&self) -> bool {
        self.shared.destroyed.load(Ordering::Acquire)
    }

    /// The live executor, or `None` once destruction has begun. Forwarding
    /// operations use this so teardown races degrade to no-ops rather than
    /// errors.
    fn executor_mut(&mut self) -> Option<&mut Box<dyn ScriptExecutor>> {
        if self.shared.destroyed.load(Ordering::Acquire) {
            return None;
        }
        self.executor.as_mut()
    }

    /// Synchronously run application source text in the engine.
    ///
    /// `source_url` is a human-readable identifier used for diagnostics
    /// only; the bridge does not interpret it. Engine failures surface as
    /// [`BridgeError::Execution`] with the URL filled in when the engine
    /// did not report one.
    pub fn execute_application_script(
        &mut self,
        script: &str,
        source_url: &str,
    ) -> Result<(), BridgeError> {
        let Some(executor) = self.executor_mut() else {
            return Ok(());
        };
        executor
            .execute_application_script(script, source_url)
            .map_err(|mut e| {
                if e.source_url.is_none() {
                    e.source_url = Some(source_url.to_string());
                }
                BridgeError::Execution(e)
            })
    }

    /// Load a lazily-resolvable module table and run its startup code.
    pub fn load_application_unbundle(
        &mut self,
        unbundle: Box<dyn Unbundle>,
        startup_code: &str,
        source_url: &str,
    ) -> Result<(), BridgeError> {
        let Some(executor) = self.executor_mut() else {
            return Ok(());
        };
        executor
            .load_application_unbundle(unbundle, startup_code, source_url)
            .map_err(|mut e| {
                if e.source_url.is_none() {
                    e.source_url = Some(source_url.to_string());
                }
                BridgeError::Execution(e)
            })
    }

    /// Solicit the engine's accumulated batch and deliver it to the host
    /// callback with end-of-batch = true. No-op after destruction.
    pub fn flush(&mut self) -> Result<(), BridgeError> {
        let Some(executor) = self.executor_mut() else {
            return Ok(());
        };
        let raw = executor.flush()?;
        self.shared.deliver(&raw, true)
    }

    /// Invoke an exported function and deliver the resulting batch with
    /// end-of-batch = true. No-op after destruction.
    pub fn call_function(
        &mut self,
        module_id: u32,
        method_id: u32,
        arguments: &[Value],
    ) -> Result<(), BridgeError> {
        let Some(executor) = self.executor_mut() else {
            return Ok(());
        };
        tracing::trace!(module_id, method_id, "bridge call_function");
        let raw = executor.call_function(module_id, method_id, arguments)?;
        self.shared.deliver(&raw, true)
    }

    /// Invoke a previously registered callback and deliver the resulting
    /// batch with end-of-batch = true. No-op after destruction.
    pub fn invoke_callback(
        &mut self,
        callback_id: u64,
        arguments: &[Value],
    ) -> Result<(), BridgeError> {
        let Some(executor) = self.executor_mut() else {
            return Ok(());
        };
        tracing::trace!(callback_id, "bridge invoke_callback");
        let raw = executor.invoke_callback(callback_id, arguments)?;
        self.shared.deliver(&raw, true)
    }

    /// Inject a primitive global variable. Produces no batch.
    pub fn set_global_variable(&mut self, name: &str, json_value: &str) -> Result<(), BridgeError> {
        let Some(executor) = self.executor_mut() else {
            return Ok(());
        };
        executor.set_global_variable(name, json_value)
    }

    /// Whether the underlying engine supports profiling. `false` once
    /// destruction has begun.
    pub fn supports_profiling(&self) -> bool {
        if self.shared.destroyed.load(Ordering::Acquire) {
            return false;
        }
        self.executor
            .as_ref()
            .map(|e| e.supports_profiling())
            .unwrap_or(false)
    }

    /// Start a named profile. Best effort.
    pub fn start_profiler(&mut self, title: &str) {
        if let Some(executor) = self.executor_mut() {
            executor.start_profiler(title);
        }
    }

    /// Stop a named profile and write it to `path`. Best effort.
    pub fn stop_profiler(&mut self, title: &str, path: &Path) {
        if let Some(executor) = self.executor_mut() {
            executor.stop_profiler(title, path);
        }
    }

    /// Notify the engine of moderate memory pressure. Never fails.
    pub fn handle_memory_pressure_moderate(&mut self) {
        if let Some(executor) = self.executor_mut() {
            executor.handle_memory_pressure_moderate();
        }
    }

    /// Notify the engine of critical memory pressure. Never fails.
    pub fn handle_memory_pressure_critical(&mut self) {
        if let Some(executor) = self.executor_mut() {
            executor.handle_memory_pressure_critical();
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.destroy();
    }
}
