pub mod engine;
pub mod transitions;

pub use engine::WorkflowEngine;
pub use transitions::{check_transition, is_allowed, is_terminal};
