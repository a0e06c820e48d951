//! Lock wrappers used to share state between request tasks, event handlers
//! and process-manager tasks.

pub mod tokio;
