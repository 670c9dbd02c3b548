//! Handle to an executor running on a dedicated thread.
//!
//! [`ThreadedExecutor`] implements [`ScriptExecutor`] by marshalling each
//! call over a command channel to the worker thread and blocking on the
//! reply, so the bridge sees the same synchronous capability set whether
//! the engine runs inline or on its own thread.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::command::ExecutorCommand;
use crate::error::{BridgeError, ExecutionError};
use crate::executor::ScriptExecutor;
use crate::unbundle::Unbundle;

pub struct ThreadedExecutor {
    /// Command sender
    pub(crate) cmd_tx: mpsc::Sender<ExecutorCommand>,
    /// Shutdown signal sender
    pub(crate) shutdown_tx: watch::Sender<bool>,
    /// Whether the executor has terminated
    pub(crate) terminated: Arc<AtomicBool>,
    /// Thread join handle
    pub(crate) thread_handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ThreadedExecutor {
    /// Send a command and block on the reply.
    fn send_command<T>(
        &self,
        cmd: ExecutorCommand,
        reply_rx: oneshot::Receiver<Result<T, BridgeError>>,
    ) -> Result<T, BridgeError> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(BridgeError::Terminated);
        }

        self.cmd_tx
            .blocking_send(cmd)
            .map_err(|_| BridgeError::ChannelClosed)?;

        reply_rx
            .blocking_recv()
            .map_err(|_| BridgeError::ChannelClosed)?
    }

    /// Send a fire-and-forget command. Failures are swallowed; these
    /// commands are best-effort by contract.
    fn send_quiet(&self, cmd: ExecutorCommand) {
        if self.terminated.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.cmd_tx.blocking_send(cmd);
    }

    /// Terminate the executor. Idempotent; signals the worker to shut
    /// down but does not wait for it.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
    }

    /// Whether the executor has terminated.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Wait for the worker thread to finish.
    pub fn join(self) -> Result<(), BridgeError> {
        if let Some(handle) = self.thread_handle.lock().unwrap().take() {
            handle.join().map_err(|_| BridgeError::ThreadPanic)?;
        }
        Ok(())
    }
}

impl ScriptExecutor for ThreadedExecutor {
    fn execute_application_script(
        &mut self,
        script: &str,
        source_url: &str,
    ) -> Result<(), ExecutionError> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(ExecutionError::new("executor has terminated"));
        }

        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .blocking_send(ExecutorCommand::ExecuteScript {
                script: script.to_string(),
                source_url: source_url.to_string(),
                reply,
            })
            .map_err(|_| ExecutionError::new("executor channel closed"))?;

        reply_rx
            .blocking_recv()
            .map_err(|_| ExecutionError::new("executor channel closed"))?
    }

    fn load_application_unbundle(
        &mut self,
        unbundle: Box<dyn Unbundle>,
        startup_code: &str,
        source_url: &str,
    ) -> Result<(), ExecutionError> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(ExecutionError::new("executor has terminated"));
        }

        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .blocking_send(ExecutorCommand::LoadUnbundle {
                unbundle,
                startup_code: startup_code.to_string(),
                source_url: source_url.to_string(),
                reply,
            })
            .map_err(|_| ExecutionError::new("executor channel closed"))?;

        reply_rx
            .blocking_recv()
            .map_err(|_| ExecutionError::new("executor channel closed"))?
    }

    fn flush(&mut self) -> Result<String, BridgeError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send_command(ExecutorCommand::Flush { reply }, reply_rx)
    }

    fn call_function(
        &mut self,
        module_id: u32,
        method_id: u32,
        arguments: &[Value],
    ) -> Result<String, BridgeError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send_command(
            ExecutorCommand::CallFunction {
                module_id,
                method_id,
                arguments: arguments.to_vec(),
                reply,
            },
            reply_rx,
        )
    }

    fn invoke_callback(
        &mut self,
        callback_id: u64,
        arguments: &[Value],
    ) -> Result<String, BridgeError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send_command(
            ExecutorCommand::InvokeCallback {
                callback_id,
                arguments: arguments.to_vec(),
                reply,
            },
            reply_rx,
        )
    }

    fn set_global_variable(&mut self, name: &str, json_value: &str) -> Result<(), BridgeError> {
        let (reply, reply_rx) = oneshot::channel();
        self.send_command(
            ExecutorCommand::SetGlobalVariable {
                name: name.to_string(),
                json_value: json_value.to_string(),
                reply,
            },
            reply_rx,
        )
    }

    fn supports_profiling(&self) -> bool {
        if self.terminated.load(Ordering::SeqCst) {
            return false;
        }

        let (reply, reply_rx) = oneshot::channel();
        if self
            .cmd_tx
            .blocking_send(ExecutorCommand::SupportsProfiling { reply })
            .is_err()
        {
            return false;
        }
        reply_rx.blocking_recv().unwrap_or(false)
    }

    fn start_profiler(&mut self, title: &str) {
        self.send_quiet(ExecutorCommand::StartProfiler {
            title: title.to_string(),
        });
    }

    fn stop_profiler(&mut self, title: &str, path: &Path) {
        self.send_quiet(ExecutorCommand::StopProfiler {
            title: title.to_string(),
            path: path.to_path_buf(),
        });
    }

    fn handle_memory_pressure_moderate(&mut self) {
        self.send_quiet(ExecutorCommand::MemoryPressureModerate);
    }

    fn handle_memory_pressure_critical(&mut self) {
        self.send_quiet(ExecutorCommand::MemoryPressureCritical);
    }
}

impl Drop for ThreadedExecutor {
    fn drop(&mut self) {
        self.terminate();
        // Wait for the thread so the engine is fully torn down before the
        // drop returns; the bridge relies on this drain being synchronous.
        if let Some(handle) = self.thread_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}
