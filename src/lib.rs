//! Tasklane: task lifecycle core for assistant-driven work.
//!
//! Tasks are created by a user, picked up by an execution loop, and may be
//! handed back and forth between the assistant and the user until they reach
//! a terminal status. Every committed change is published on an in-process
//! event channel and fanned out to live clients grouped by task.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for storage and collaborators
//! - **Adapters**: In-memory and `PostgreSQL` stores, input-capture hooks
//! - **Services**: Lifecycle controller and selection read paths
//!
//! # Modules
//!
//! - [`task`]: Task domain, ports, adapters, services and event channel
//! - [`live`]: Room-scoped delivery to connected clients
//! - [`config`]: TOML configuration
//! - [`telemetry`]: `tracing` subscriber setup
//! - [`runtime`]: Wiring of the pieces above

pub mod config;
pub mod live;
pub mod runtime;
pub mod task;
pub mod telemetry;
