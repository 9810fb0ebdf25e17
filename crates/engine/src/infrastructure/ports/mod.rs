//! Port traits and their error types.

mod error;
mod external;
mod repos;

pub use error::{LlmError, RepoError};
pub use external::{
    ClockPort, LlmPort, LlmRequest, LlmResponse, ProgressNotifierPort, ProgressUpdate, RandomPort,
};
pub use repos::{EntityPoolRepo, ExecutionRepo, MappingRepo};

#[cfg(test)]
pub use external::{MockClockPort, MockLlmPort, MockProgressNotifierPort, MockRandomPort};
#[cfg(test)]
pub use repos::{MockEntityPoolRepo, MockExecutionRepo, MockMappingRepo};
