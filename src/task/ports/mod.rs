//! Port contracts for the task lifecycle.
//!
//! Ports define infrastructure-agnostic interfaces used by task services.

pub mod input_capture;
pub mod repository;

pub use input_capture::{
    InputCaptureAction, InputCaptureError, InputCaptureHook, InputCaptureResult,
};
pub use repository::{
    TaskListQuery, TaskPage, TaskRepository, TaskRepositoryError, TaskRepositoryResult,
    TaskWriteGuard,
};
