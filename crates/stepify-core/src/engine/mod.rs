//! Motor del pipeline: builder, scheduler, contextos y fan-out paralelo.

mod builder;
mod core;
mod flow_ctx;
pub mod parallel;

pub use self::core::Pipeline;
pub use builder::PipelineBuilder;
pub use flow_ctx::{ErrorContext, StepContext};
pub use parallel::{Completion, JoinCallback, Operation};
