//! Task lifecycle core.
//!
//! Tasks move through a small state machine while control passes between the
//! user and the assistant. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]
//! - The in-process event channel in [`events`]

pub mod adapters;
pub mod domain;
pub mod events;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
