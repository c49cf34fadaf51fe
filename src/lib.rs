//! Plan execution engine: runs ordered, declarative data-analysis steps
//! against a per-job scratch workspace and assembles a single answer.

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod job;
pub mod llm;
pub mod output;
pub mod plan;
pub mod planner;
pub mod printer;
pub mod process;
pub mod store;
pub mod utils;
pub mod workspace;

pub use error::{ErrorKind, JobFailure, StepError};
pub use executor::Engine;
pub use plan::{Plan, Step, StepKind};
pub use store::{ResultStore, StepResult};
