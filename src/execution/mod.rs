//! Release execution: orchestration, waiting, retrying and progress events

pub mod cancel;
pub mod engine;
pub mod events;
pub mod executor;
pub mod poller;
pub mod retry;

pub use cancel::CancelSignal;
pub use engine::ReleaseOrchestrator;
pub use events::{ChannelSink, EventSink, NoopSink, ReleaseEvent, StepReporter};
pub use executor::{Collaborators, ExecutionResult, StepExecutor};
pub use poller::{wait_until_ready, PollSummary, ReadinessCheck, WaitOptions};
pub use retry::RetryPolicy;
