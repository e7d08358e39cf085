//! Side-effecting adapters. Each external capability sits behind a trait so
//! the stages can be driven against fakes.

pub mod config;
pub mod git;
pub mod host;
pub mod launcher;
pub mod layout;
pub mod package_manager;
pub mod process;
pub mod publisher;
pub mod runtime_env;
pub mod supervisor;
