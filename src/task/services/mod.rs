//! Application services for task lifecycle orchestration.

mod lifecycle;
mod selection;

pub use lifecycle::{
    CreateTaskRequest, DEFAULT_INPUT_CAPTURE_TIMEOUT, DEFAULT_MODEL, LifecycleSettings,
    TaskLifecycleError, TaskLifecycleResult, TaskLifecycleService,
};
pub use selection::TaskSelectionService;
