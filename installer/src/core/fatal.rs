//! Fatal-condition taxonomy.
//!
//! A [`Fatal`] aborts the whole procedure at the point of detection. It names
//! the capability that failed and, where one exists, a manual remedy. Stages
//! return it inside `anyhow::Error`; `main` finds it in the error chain to pick
//! the exit code.

use thiserror::Error;

use crate::exit_codes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalKind {
    /// Unknown host, or elevation needed but unavailable.
    Environment,
    /// Required tool still unhealthy after the single remediation pass.
    Dependency,
    /// Working copy cannot be fast-forwarded without discarding local state.
    DataIntegrity,
    /// Runtime environment or installed artifact could not be produced.
    Provisioning,
    /// Upstream repository could not be cloned or fetched.
    Acquisition,
    /// The application's setup wizard did not finish successfully.
    Setup,
}

impl FatalKind {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Environment => exit_codes::ENVIRONMENT,
            Self::Dependency => exit_codes::DEPENDENCY,
            Self::DataIntegrity => exit_codes::DATA_INTEGRITY,
            Self::Provisioning => exit_codes::PROVISIONING,
            Self::Acquisition => exit_codes::ACQUISITION,
            Self::Setup => exit_codes::SETUP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{capability}: {detail}")]
pub struct Fatal {
    pub kind: FatalKind,
    pub capability: String,
    pub detail: String,
    pub remedy: Option<String>,
}

impl Fatal {
    pub fn new(kind: FatalKind, capability: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            capability: capability.into(),
            detail: detail.into(),
            remedy: None,
        }
    }

    pub fn with_remedy(mut self, remedy: impl Into<String>) -> Self {
        self.remedy = Some(remedy.into());
        self
    }
}

/// Find the first [`Fatal`] in an error chain, skipping any added context.
pub fn find_fatal(err: &anyhow::Error) -> Option<&Fatal> {
    err.chain().find_map(|cause| cause.downcast_ref::<Fatal>())
}

/// Classify an adapter error as `kind` unless it already carries a [`Fatal`].
pub fn classify(
    err: anyhow::Error,
    kind: FatalKind,
    capability: &str,
    remedy: Option<&str>,
) -> anyhow::Error {
    if find_fatal(&err).is_some() {
        return err;
    }
    let mut fatal = Fatal::new(kind, capability, format!("{err:#}"));
    if let Some(remedy) = remedy {
        fatal = fatal.with_remedy(remedy);
    }
    anyhow::Error::new(fatal)
}

#[cfg(test)]
mod tests {
    use anyhow::{Context, anyhow};

    use super::*;

    #[test]
    fn find_fatal_sees_through_context() {
        let err = anyhow::Error::new(Fatal::new(
            FatalKind::DataIntegrity,
            "working copy",
            "local changes",
        ))
        .context("syncing stage aborted");
        let fatal = find_fatal(&err).expect("fatal in chain");
        assert_eq!(fatal.kind, FatalKind::DataIntegrity);
    }

    #[test]
    fn classify_keeps_existing_kind() {
        let err = anyhow::Error::new(Fatal::new(FatalKind::DataIntegrity, "git", "diverged"));
        let classified = classify(err, FatalKind::Acquisition, "git", None);
        assert_eq!(
            find_fatal(&classified).map(|f| f.kind),
            Some(FatalKind::DataIntegrity)
        );
    }

    #[test]
    fn classify_wraps_plain_errors() {
        let err = Err::<(), _>(anyhow!("network unreachable"))
            .context("git clone")
            .expect_err("error");
        let classified = classify(err, FatalKind::Acquisition, "git", Some("check network"));
        let fatal = find_fatal(&classified).expect("fatal");
        assert_eq!(fatal.kind, FatalKind::Acquisition);
        assert!(fatal.detail.contains("network unreachable"));
        assert_eq!(fatal.remedy.as_deref(), Some("check network"));
        assert_eq!(fatal.kind.exit_code(), exit_codes::ACQUISITION);
    }
}
