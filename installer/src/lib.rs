//! Host bootstrap installer for the IronClaw agent.
//!
//! Takes a bare or previously-installed machine to a globally invocable
//! application with an optional background service, in seven forward-only
//! stages. Every stage is idempotent, so recovery from any failure is simply
//! running the installer again.
//!
//! - **[`core`]**: Pure, deterministic logic (host types, remediation plans,
//!   version checks, the stage machine, artifact rendering). No I/O.
//! - **[`io`]**: Side-effecting adapters (git, package manager, venv, symlink,
//!   systemd, process execution), each behind a narrow trait.
//!
//! Stage modules ([`probe`], [`remediate`], [`sync`], [`provision`],
//! [`command`], [`service`], [`bootstrap`]) combine the two, and [`pipeline`]
//! runs them in order.

pub mod bootstrap;
pub mod command;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod probe;
pub mod provision;
pub mod remediate;
pub mod report;
pub mod service;
pub mod sync;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
