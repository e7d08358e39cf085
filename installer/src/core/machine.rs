//! The install procedure as a forward-only state machine.
//!
//! ```text
//! Probing -> Remediating -> Syncing -> Provisioning -> InstallingCommand
//!         -> ConfiguringService -> Bootstrapping -> Done
//! ```
//!
//! Any stage may move to `Aborted`. Nothing loops back; a later invocation
//! starts again from `Probing`.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Probing,
    Remediating,
    Syncing,
    Provisioning,
    InstallingCommand,
    ConfiguringService,
    Bootstrapping,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Probing,
        Stage::Remediating,
        Stage::Syncing,
        Stage::Provisioning,
        Stage::InstallingCommand,
        Stage::ConfiguringService,
        Stage::Bootstrapping,
    ];

    pub fn first() -> Self {
        Stage::Probing
    }

    pub fn next(self) -> Option<Stage> {
        let idx = Self::ALL.iter().position(|stage| *stage == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Probing => "Probing host",
            Self::Remediating => "Remediating dependencies",
            Self::Syncing => "Synchronizing repository",
            Self::Provisioning => "Provisioning runtime environment",
            Self::InstallingCommand => "Installing command",
            Self::ConfiguringService => "Configuring background service",
            Self::Bootstrapping => "Bootstrapping configuration",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Probing => "probing",
            Self::Remediating => "remediating",
            Self::Syncing => "syncing",
            Self::Provisioning => "provisioning",
            Self::InstallingCommand => "installing-command",
            Self::ConfiguringService => "configuring-service",
            Self::Bootstrapping => "bootstrapping",
        };
        f.write_str(label)
    }
}

/// Where the procedure currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Running(Stage),
    Done,
    Aborted(Stage),
}

impl Phase {
    pub fn start() -> Self {
        Phase::Running(Stage::first())
    }

    /// Advance past a completed stage. Terminal phases stay put.
    pub fn advance(self) -> Self {
        match self {
            Phase::Running(stage) => stage.next().map_or(Phase::Done, Phase::Running),
            terminal => terminal,
        }
    }

    pub fn abort(self) -> Self {
        match self {
            Phase::Running(stage) => Phase::Aborted(stage),
            terminal => terminal,
        }
    }
}

/// Non-fatal result of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "message", rename_all = "kebab-case")]
pub enum StageOutcome {
    /// The stage did its work.
    Completed(String),
    /// Nothing to do, or the capability is absent on this host (expected).
    Skipped(String),
    /// The stage could not deliver a convenience feature; the install is still valid.
    Degraded(String),
}

impl StageOutcome {
    pub fn message(&self) -> &str {
        match self {
            Self::Completed(msg) | Self::Skipped(msg) | Self::Degraded(msg) => msg,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
}

/// Result of a procedure that reached `Done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallOutcome {
    pub phase: Phase,
    pub stages: Vec<StageReport>,
}

impl InstallOutcome {
    pub fn outcome_of(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|report| report.stage == stage)
            .map(|report| &report.outcome)
    }

    pub fn degradations(&self) -> Vec<&StageReport> {
        self.stages
            .iter()
            .filter(|report| report.outcome.is_degraded())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_walk_every_stage_then_done() {
        let mut phase = Phase::start();
        let mut visited = Vec::new();
        while let Phase::Running(stage) = phase {
            visited.push(stage);
            phase = phase.advance();
        }
        assert_eq!(visited, Stage::ALL.to_vec());
        assert_eq!(phase, Phase::Done);
    }

    #[test]
    fn abort_records_failing_stage_and_stays_put() {
        let phase = Phase::Running(Stage::Syncing).abort();
        assert_eq!(phase, Phase::Aborted(Stage::Syncing));
        assert_eq!(phase.advance(), phase);
    }

    #[test]
    fn done_cannot_abort() {
        assert_eq!(Phase::Done.abort(), Phase::Done);
    }

    #[test]
    fn outcome_lists_degradations() {
        let outcome = InstallOutcome {
            phase: Phase::Done,
            stages: vec![
                StageReport {
                    stage: Stage::InstallingCommand,
                    outcome: StageOutcome::Degraded("link failed".to_string()),
                },
                StageReport {
                    stage: Stage::ConfiguringService,
                    outcome: StageOutcome::Skipped("no supervisor".to_string()),
                },
            ],
        };
        let degraded = outcome.degradations();
        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0].stage, Stage::InstallingCommand);
        assert_eq!(
            outcome.outcome_of(Stage::ConfiguringService).map(StageOutcome::message),
            Some("no supervisor")
        );
    }
}
