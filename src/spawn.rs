//! Spawning executors onto dedicated threads.
//!
//! Engines are typically not `Send`, so the engine-side executor is built
//! *on* the worker thread by the supplied factory. The host composes this
//! with [`crate::Bridge::new`]:
//!
//! ```ignore
//! let bridge = Bridge::new(
//!     |handler| {
//!         let executor = spawn_executor("js", move || make_engine(handler))?;
//!         Ok(Box::new(executor))
//!     },
//!     callback,
//! )?;
//! ```

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;

use tokio::sync::{mpsc, watch};

use crate::error::BridgeError;
use crate::executor::ScriptExecutor;
use crate::handle::ThreadedExecutor;
use crate::worker::run_worker;

/// Command channel depth. Callers block on replies, so the channel never
/// holds more than a handful of commands.
const COMMAND_BUFFER: usize = 32;

/// Spawn an executor in its own named thread.
///
/// `engine_factory` runs on the spawned thread; construction failures are
/// reported back synchronously, so once this returns `Ok` the executor is
/// live and accepting commands.
pub fn spawn_executor<F>(name: &str, engine_factory: F) -> Result<ThreadedExecutor, BridgeError>
where
    F: FnOnce() -> Result<Box<dyn ScriptExecutor>, BridgeError> + Send + 'static,
{
    tracing::debug!("[spawn_executor] starting {}", name);

    let terminated = Arc::new(AtomicBool::new(false));
    let terminated_clone = Arc::clone(&terminated);

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Channel to report engine construction success/failure.
    let (init_tx, init_rx) = std::sync::mpsc::sync_channel::<Result<(), BridgeError>>(1);

    let thread_name = name.to_string();
    let thread_handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            tracing::debug!("[spawn_executor:{}] thread started", thread_name);

            let engine = match engine_factory() {
                Ok(engine) => engine,
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                    return;
                }
            };

            // Single-threaded tokio runtime for this thread
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = init_tx.send(Err(BridgeError::SpawnFailed(e)));
                    return;
                }
            };

            let _ = init_tx.send(Ok(()));

            rt.block_on(run_worker(
                thread_name.clone(),
                engine,
                terminated_clone,
                cmd_rx,
                shutdown_rx,
            ));

            rt.shutdown_background();
            tracing::debug!("[spawn_executor:{}] thread exiting", thread_name);
        })?;

    init_rx.recv().map_err(|_| BridgeError::ChannelClosed)??;
    tracing::debug!("[spawn_executor] {} is ready", name);

    Ok(ThreadedExecutor {
        cmd_tx,
        shutdown_tx,
        terminated,
        thread_handle: Mutex::new(Some(thread_handle)),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::*;
    use crate::bridge::Bridge;
    use crate::call::{encode_method_calls, MethodCall};
    use crate::error::ExecutionError;
    use crate::unbundle::Unbundle;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .try_init();
    }

    /// Engine that echoes every call back as a one-element batch and flags
    /// its own drop.
    struct EchoEngine {
        dropped: Arc<AtomicBool>,
    }

    impl ScriptExecutor for EchoEngine {
        fn execute_application_script(
            &mut self,
            _script: &str,
            _source_url: &str,
        ) -> Result<(), ExecutionError> {
            Ok(())
        }

        fn load_application_unbundle(
            &mut self,
            _unbundle: Box<dyn Unbundle>,
            _startup_code: &str,
            _source_url: &str,
        ) -> Result<(), ExecutionError> {
            Ok(())
        }

        fn flush(&mut self) -> Result<String, BridgeError> {
            Ok("[]".to_string())
        }

        fn call_function(
            &mut self,
            module_id: u32,
            method_id: u32,
            arguments: &[serde_json::Value],
        ) -> Result<String, BridgeError> {
            Ok(encode_method_calls(&[MethodCall::new(
                module_id,
                method_id,
                arguments.to_vec(),
            )]))
        }

        fn invoke_callback(
            &mut self,
            callback_id: u64,
            arguments: &[serde_json::Value],
        ) -> Result<String, BridgeError> {
            Ok(encode_method_calls(&[MethodCall::new(
                0,
                0,
                arguments.to_vec(),
            )
            .with_call_id(callback_id)]))
        }

        fn set_global_variable(
            &mut self,
            _name: &str,
            _json_value: &str,
        ) -> Result<(), BridgeError> {
            Ok(())
        }
    }

    impl Drop for EchoEngine {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    fn echo_engine() -> (Arc<AtomicBool>, EchoEngine) {
        let dropped = Arc::new(AtomicBool::new(false));
        (
            Arc::clone(&dropped),
            EchoEngine {
                dropped,
            },
        )
    }

    #[test]
    fn test_call_through_bridge_round_trips() {
        init_tracing();
        let (_, engine) = echo_engine();

        let deliveries = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&deliveries);

        let mut bridge = Bridge::new(
            |_handler| {
                let executor = spawn_executor("echo", move || Ok(Box::new(engine)))?;
                Ok(Box::new(executor))
            },
            move |calls, eob| {
                sink.lock().unwrap().push((calls, eob));
            },
        )
        .unwrap();

        bridge.call_function(2, 3, &[json!(5)]).unwrap();
        bridge.invoke_callback(8, &[json!("done")]).unwrap();

        let deliveries = deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(
            deliveries[0].0,
            vec![MethodCall::new(2, 3, vec![json!(5)])]
        );
        assert!(deliveries[0].1);
        assert_eq!(deliveries[1].0[0].call_id, Some(8));
    }

    #[test]
    fn test_destroy_tears_engine_down_synchronously() {
        let (dropped, engine) = echo_engine();

        let mut bridge = Bridge::new(
            |_handler| {
                let executor = spawn_executor("echo-teardown", move || Ok(Box::new(engine)))?;
                Ok(Box::new(executor))
            },
            |_calls, _eob| {},
        )
        .unwrap();

        assert!(!dropped.load(Ordering::SeqCst));
        bridge.destroy();
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_terminated_executor_reports_terminated() {
        let (_, engine) = echo_engine();
        let mut executor = spawn_executor("echo-term", move || Ok(Box::new(engine))).unwrap();

        executor.terminate();
        assert!(executor.is_terminated());
        executor.terminate(); // idempotent

        let err = executor.flush().unwrap_err();
        assert!(matches!(err, BridgeError::Terminated));
        assert!(!executor.supports_profiling());
    }

    #[test]
    fn test_engine_factory_failure_propagates() {
        let result = spawn_executor("doomed", || {
            Err(BridgeError::Execution(ExecutionError::new(
                "engine refused to start",
            )))
        });

        match result {
            Err(BridgeError::Execution(e)) => {
                assert_eq!(e.message, "engine refused to start");
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_memory_pressure_is_quiet_after_terminate() {
        let (_, engine) = echo_engine();
        let mut executor = spawn_executor("echo-quiet", move || Ok(Box::new(engine))).unwrap();

        executor.terminate();
        // Must not panic or error.
        executor.handle_memory_pressure_moderate();
        executor.handle_memory_pressure_critical();
        executor.start_profiler("t");
    }
}
