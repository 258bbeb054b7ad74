//! Adapter implementations for task lifecycle ports.

pub mod input_capture;
pub mod memory;
pub mod postgres;
