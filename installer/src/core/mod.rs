//! Deterministic, pure logic shared by the installer stages.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (host facts, os-release text, version strings, templates) and return
//! deterministic outputs suitable for tests.

pub mod cmdline;
pub mod fatal;
pub mod machine;
pub mod os_release;
pub mod remediation;
pub mod render;
pub mod types;
pub mod version;
