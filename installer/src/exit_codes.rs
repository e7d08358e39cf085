//! Stable exit codes for the installer CLI.

/// Every stage finished; degradations (no link, no service) still exit here.
pub const OK: i32 = 0;
/// Invalid CLI arguments or configuration, or an unclassified failure.
pub const INVALID: i32 = 1;
/// Host identity unknown or required elevation unavailable.
pub const ENVIRONMENT: i32 = 2;
/// A required dependency is still unhealthy after remediation.
pub const DEPENDENCY: i32 = 3;
/// The working copy cannot be fast-forwarded without losing local state.
pub const DATA_INTEGRITY: i32 = 4;
/// The runtime environment or wrapper script could not be produced.
pub const PROVISIONING: i32 = 5;
/// The upstream repository could not be cloned or fetched.
pub const ACQUISITION: i32 = 6;
/// The application's setup wizard exited unsuccessfully.
pub const SETUP: i32 = 7;
