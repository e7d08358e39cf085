//! Git adapter for the repository synchronizer.
//!
//! The synchronizer must never discard local state, so we keep a small,
//! explicit wrapper around `git` subprocess calls and only ever fast-forward.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::fatal::{Fatal, FatalKind};

const CAPABILITY: &str = "working copy";

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Upstream location of the application source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSource {
    pub url: String,
    pub branch: Option<String>,
}

/// What a sync did to the working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Cloned { head: String },
    Updated { from: String, to: String },
    UpToDate { head: String },
}

impl SyncOutcome {
    pub fn describe(&self) -> String {
        match self {
            Self::Cloned { head } => format!("cloned at {head}"),
            Self::Updated { from, to } => format!("fast-forwarded {from}..{to}"),
            Self::UpToDate { head } => format!("already up to date at {head}"),
        }
    }
}

/// Brings a working copy at a fixed root in line with upstream.
pub trait SourceControl {
    fn sync(&self, source: &RepoSource, root: &Path) -> Result<SyncOutcome>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// True if the workdir is the top of a git working copy.
    pub fn is_working_copy(&self) -> bool {
        self.workdir.join(".git").exists()
    }

    /// Clone `source` into `dest` and return an adapter for the new working copy.
    #[instrument(skip_all, fields(url = %source.url, dest = %dest.display()))]
    pub fn clone_into(source: &RepoSource, dest: &Path) -> Result<Self> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let mut args = vec!["clone".to_string()];
        if let Some(branch) = &source.branch {
            args.push("--branch".to_string());
            args.push(branch.clone());
        }
        args.push("--".to_string());
        args.push(source.url.clone());
        args.push(dest.display().to_string());

        debug!("cloning repository");
        let output = Command::new("git")
            .args(&args)
            .output()
            .context("spawn git clone")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git clone failed: {}", stderr.trim()));
        }
        Ok(Self::new(dest))
    }

    /// Return the current HEAD short SHA.
    pub fn head_short_sha(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--short=12", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    /// Status entries for tracked files only; untracked files never block a sync.
    pub fn tracked_changes(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-uno"])?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_status_line(line)?);
        }
        Ok(entries)
    }

    #[instrument(skip_all)]
    pub fn fetch(&self) -> Result<()> {
        debug!("fetching upstream");
        self.run_checked(&["fetch", "--quiet"])?;
        Ok(())
    }

    /// Fast-forward the current branch to its upstream. Fails rather than merge.
    #[instrument(skip_all)]
    pub fn fast_forward(&self) -> Result<()> {
        debug!("fast-forwarding to upstream");
        self.run_checked(&["merge", "--ff-only", "@{u}"])?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// [`SourceControl`] backed by the `git` CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitSourceControl;

impl SourceControl for GitSourceControl {
    #[instrument(skip_all, fields(root = %root.display()))]
    fn sync(&self, source: &RepoSource, root: &Path) -> Result<SyncOutcome> {
        let git = Git::new(root);
        if git.is_working_copy() {
            return update(&git);
        }
        if directory_has_entries(root)? {
            warn!("install root exists but is not a working copy");
            return Err(Fatal::new(
                FatalKind::DataIntegrity,
                CAPABILITY,
                format!(
                    "{} exists, is not empty, and is not a git working copy",
                    root.display()
                ),
            )
            .with_remedy("move the directory aside or choose another install root")
            .into());
        }
        let git = Git::clone_into(source, root)?;
        let head = git.head_short_sha()?;
        info!(%head, "cloned repository");
        Ok(SyncOutcome::Cloned { head })
    }
}

fn update(git: &Git) -> Result<SyncOutcome> {
    let changes = git.tracked_changes()?;
    if !changes.is_empty() {
        warn!(modified = changes.len(), "working copy has local modifications");
        let mut detail = String::from("tracked files have local modifications:");
        for entry in &changes {
            detail.push_str(&format!("\n  {} {}", entry.code, entry.path));
        }
        return Err(Fatal::new(FatalKind::DataIntegrity, CAPABILITY, detail)
            .with_remedy(format!(
                "commit, stash or revert the changes in {} and rerun",
                git.workdir().display()
            ))
            .into());
    }

    let from = git.head_short_sha()?;
    git.fetch()?;
    if let Err(err) = git.fast_forward() {
        warn!(err = %err, "fast-forward refused");
        return Err(Fatal::new(
            FatalKind::DataIntegrity,
            CAPABILITY,
            format!("cannot fast-forward to upstream: {err:#}"),
        )
        .with_remedy(format!(
            "reconcile {} with its upstream branch by hand",
            git.workdir().display()
        ))
        .into());
    }
    let to = git.head_short_sha()?;
    if from == to {
        debug!(head = %to, "already up to date");
        return Ok(SyncOutcome::UpToDate { head: to });
    }
    info!(%from, %to, "updated working copy");
    Ok(SyncOutcome::Updated { from, to })
}

fn directory_has_entries(path: &Path) -> Result<bool> {
    match fs::read_dir(path) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("read {}", path.display())),
    }
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fatal::find_fatal;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args([
                "-c",
                "user.name=Installer Test",
                "-c",
                "user.email=installer@example.test",
            ])
            .args(args)
            .current_dir(dir)
            .output()
            .expect("spawn git");
        assert!(status.status.success(), "git {args:?}: {status:?}");
    }

    fn upstream_with_commit(dir: &Path) -> RepoSource {
        fs::create_dir_all(dir).expect("mkdir");
        git(dir, &["init", "--quiet"]);
        fs::write(dir.join("requirements.txt"), "requests\n").expect("write");
        git(dir, &["add", "-A"]);
        git(dir, &["commit", "--quiet", "-m", "initial"]);
        RepoSource {
            url: dir.display().to_string(),
            branch: None,
        }
    }

    #[test]
    fn parses_modified_line() {
        let e = parse_status_line(" M main.py").expect("parse");
        assert_eq!(
            e,
            StatusEntry {
                code: " M".to_string(),
                path: "main.py".to_string()
            }
        );
    }

    #[test]
    fn parses_rename_line_uses_new_path() {
        let e = parse_status_line("R  old.py -> new.py").expect("parse");
        assert_eq!(e.path, "new.py");
    }

    #[test]
    fn clones_then_fast_forwards() {
        let temp = tempfile::tempdir().expect("tempdir");
        let upstream = temp.path().join("upstream");
        let root = temp.path().join("install");
        let source = upstream_with_commit(&upstream);

        let first = GitSourceControl.sync(&source, &root).expect("clone");
        assert!(matches!(first, SyncOutcome::Cloned { .. }));
        assert!(root.join("requirements.txt").is_file());

        let second = GitSourceControl.sync(&source, &root).expect("noop");
        assert!(matches!(second, SyncOutcome::UpToDate { .. }));

        fs::write(upstream.join("main.py"), "print('hi')\n").expect("write");
        git(&upstream, &["add", "-A"]);
        git(&upstream, &["commit", "--quiet", "-m", "entry point"]);

        let third = GitSourceControl.sync(&source, &root).expect("update");
        assert!(matches!(third, SyncOutcome::Updated { .. }));
        assert!(root.join("main.py").is_file());
    }

    #[test]
    fn untracked_files_do_not_block_sync() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = upstream_with_commit(&temp.path().join("upstream"));
        let root = temp.path().join("install");
        GitSourceControl.sync(&source, &root).expect("clone");

        fs::create_dir_all(root.join("data")).expect("mkdir");
        fs::write(root.join("data/config.json"), "{}").expect("write");
        let outcome = GitSourceControl.sync(&source, &root).expect("sync");
        assert!(matches!(outcome, SyncOutcome::UpToDate { .. }));
    }

    #[test]
    fn local_modifications_are_refused() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = upstream_with_commit(&temp.path().join("upstream"));
        let root = temp.path().join("install");
        GitSourceControl.sync(&source, &root).expect("clone");

        fs::write(root.join("requirements.txt"), "requests\nlocal-hack\n").expect("write");
        let err = GitSourceControl.sync(&source, &root).expect_err("dirty");
        let fatal = find_fatal(&err).expect("fatal");
        assert_eq!(fatal.kind, FatalKind::DataIntegrity);
        assert!(fatal.detail.contains("requirements.txt"), "{}", fatal.detail);
        // The local edit survives.
        let contents = fs::read_to_string(root.join("requirements.txt")).expect("read");
        assert!(contents.contains("local-hack"));
    }

    #[test]
    fn refuses_non_empty_foreign_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = upstream_with_commit(&temp.path().join("upstream"));
        let root = temp.path().join("install");
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join("notes.txt"), "mine").expect("write");

        let err = GitSourceControl.sync(&source, &root).expect_err("foreign");
        assert_eq!(
            find_fatal(&err).map(|f| f.kind),
            Some(FatalKind::DataIntegrity)
        );
    }

    #[test]
    fn unreachable_upstream_is_a_plain_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = RepoSource {
            url: temp.path().join("missing").display().to_string(),
            branch: None,
        };
        let err = GitSourceControl
            .sync(&source, &temp.path().join("install"))
            .expect_err("no upstream");
        assert!(find_fatal(&err).is_none());
        assert!(err.to_string().contains("git clone failed"));
    }
}
