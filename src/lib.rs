//! Script Bridge
//!
//! This crate marshals calls between a host application and an embedded
//! scripting runtime. The host talks to a [`Bridge`], which exclusively
//! owns one [`ScriptExecutor`] (the abstraction over a concrete engine
//! instance) and guarantees that no callback work reaches the host after
//! the bridge has begun destruction.
//!
//! # Architecture
//!
//! - The bridge is constructed with an executor factory and a host batch
//!   callback; the factory receives the bridge's forwarding handler, the
//!   only path by which raw engine output reaches the host
//! - Raw batches are an opaque JSON encoding, decoded into [`MethodCall`]s
//!   by a pure decoder before delivery
//! - A shared atomic destruction flag is set before the executor is
//!   released, so deliveries racing with teardown degrade to silent no-ops
//! - Engines that must live on their own thread are hosted by
//!   [`spawn_executor`] / [`ThreadedExecutor`], which marshal the same
//!   capability set over a command channel

mod bridge;
mod call;
mod command;
mod error;
mod executor;
mod handle;
mod spawn;
mod unbundle;
mod worker;

pub use bridge::{BatchCallback, Bridge};
pub use call::{encode_method_calls, parse_method_calls, MethodCall};
pub use error::{BridgeError, ExecutionError};
pub use executor::{RawBatchHandler, ScriptExecutor};
pub use handle::ThreadedExecutor;
pub use spawn::spawn_executor;
pub use unbundle::{MapUnbundle, Unbundle, UnbundleModule};
