//! taskbridge-core
//!
//! Client side of the task runtime's execution context: everything a running
//! task resolves through its supervisor instead of the metadata store.
//!
//! # Modules
//! - **domain**: value objects (assets, connections, variables, events, messages, errors)
//! - **ports**: seams (SupervisorComms, SupervisorTransport, Clock, IdGenerator, ContextVarsProvider)
//! - **impls**: port implementations (BlockingComms, ChannelTransport, InMemorySupervisor, ScriptedComms)
//! - **app**: resolver, accessors, context stack, context serialization, TaskRuntime
//! - **config**: SdkConfig

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

mod sync;
