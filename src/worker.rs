//! Worker loop for the threaded executor host.
//!
//! Runs inside the dedicated executor thread, dispatching commands to the
//! engine-side executor until shutdown is signalled or the command channel
//! closes. The engine is dropped on this thread when the loop exits; any
//! teardown work it drains through the forwarding handler at that point is
//! suppressed by the bridge's destruction flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::command::ExecutorCommand;
use crate::executor::ScriptExecutor;

pub(crate) async fn run_worker(
    name: String,
    mut engine: Box<dyn ScriptExecutor>,
    terminated: Arc<AtomicBool>,
    mut cmd_rx: mpsc::Receiver<ExecutorCommand>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() || terminated.load(Ordering::SeqCst) {
            tracing::debug!("[run_worker:{}] shutdown signal received", name);
            break;
        }

        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::debug!("[run_worker:{}] received shutdown signal", name);
                    break;
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => dispatch(engine.as_mut(), cmd),
                    None => {
                        tracing::debug!("[run_worker:{}] command channel closed", name);
                        break;
                    }
                }
            }
        }
    }

    // Engine dropped here, on its own thread.
    tracing::debug!("[run_worker:{}] worker finished", name);
}

fn dispatch(engine: &mut dyn ScriptExecutor, cmd: ExecutorCommand) {
    match cmd {
        ExecutorCommand::ExecuteScript {
            script,
            source_url,
            reply,
        } => {
            let result = engine.execute_application_script(&script, &source_url);
            let _ = reply.send(result);
        }

        ExecutorCommand::LoadUnbundle {
            unbundle,
            startup_code,
            source_url,
            reply,
        } => {
            let result = engine.load_application_unbundle(unbundle, &startup_code, &source_url);
            let _ = reply.send(result);
        }

        ExecutorCommand::Flush { reply } => {
            let _ = reply.send(engine.flush());
        }

        ExecutorCommand::CallFunction {
            module_id,
            method_id,
            arguments,
            reply,
        } => {
            let _ = reply.send(engine.call_function(module_id, method_id, &arguments));
        }

        ExecutorCommand::InvokeCallback {
            callback_id,
            arguments,
            reply,
        } => {
            let _ = reply.send(engine.invoke_callback(callback_id, &arguments));
        }

        ExecutorCommand::SetGlobalVariable {
            name,
            json_value,
            reply,
        } => {
            let _ = reply.send(engine.set_global_variable(&name, &json_value));
        }

        ExecutorCommand::SupportsProfiling { reply } => {
            let _ = reply.send(engine.supports_profiling());
        }

        ExecutorCommand::StartProfiler { title } => {
            engine.start_profiler(&title);
        }

        ExecutorCommand::StopProfiler { title, path } => {
            engine.stop_profiler(&title, &path);
        }

        ExecutorCommand::MemoryPressureModerate => {
            engine.handle_memory_pressure_moderate();
        }

        ExecutorCommand::MemoryPressureCritical => {
            engine.handle_memory_pressure_critical();
        }
    }
}
