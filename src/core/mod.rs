//! Core plumbing shared by the planning engine: tool configuration,
//! external command execution, and planning-directory paths.

mod config;
mod executor;
pub mod paths;

pub use config::{Config, GeneralConfig, GitConfig, MilestoneConfig, LOCAL_CONFIG_FILE};
pub use executor::{CommandError, CommandRunner, ExecutionResult, Executor};
