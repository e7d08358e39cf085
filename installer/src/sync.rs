//! Repository Synchronizer stage.

use anyhow::Result;
use tracing::instrument;

use crate::core::fatal::{FatalKind, classify};
use crate::core::machine::StageOutcome;
use crate::io::git::{RepoSource, SourceControl};
use crate::io::layout::InstallLayout;

#[instrument(skip_all, fields(url = %source.url))]
pub fn sync_repository(
    scm: &dyn SourceControl,
    source: &RepoSource,
    layout: &InstallLayout,
) -> Result<StageOutcome> {
    let outcome = scm.sync(source, &layout.root).map_err(|err| {
        classify(
            err,
            FatalKind::Acquisition,
            "application repository",
            Some("check network access and the repository URL, then re-run"),
        )
    })?;
    Ok(StageOutcome::Completed(format!(
        "{} ({})",
        outcome.describe(),
        layout.root.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fatal::find_fatal;
    use crate::io::config::InstallerConfig;
    use crate::test_support::FakeSourceControl;

    fn source() -> RepoSource {
        RepoSource {
            url: "https://example.test/app.git".to_string(),
            branch: None,
        }
    }

    #[test]
    fn network_failures_become_acquisition_fatals() {
        let layout = InstallLayout::new("/opt/claw", &InstallerConfig::default());
        let scm = FakeSourceControl::failing("could not resolve host");
        let err = sync_repository(&scm, &source(), &layout).expect_err("offline");
        assert_eq!(
            find_fatal(&err).map(|f| f.kind),
            Some(FatalKind::Acquisition)
        );
    }

    #[test]
    fn data_integrity_fatals_pass_through() {
        let layout = InstallLayout::new("/opt/claw", &InstallerConfig::default());
        let scm = FakeSourceControl::dirty();
        let err = sync_repository(&scm, &source(), &layout).expect_err("dirty");
        assert_eq!(
            find_fatal(&err).map(|f| f.kind),
            Some(FatalKind::DataIntegrity)
        );
    }
}
