//! The update pipeline: discover, classify, deliver safe updates, flag major ones.
//!
//! One run is a single awaited sequence. The safe path (commit, push, changelog, review
//! request) and the major path (manual review notification) are independent, and every
//! failure becomes a [`Notification`] in the returned [`RunReport`] instead of an error.

use crate::changelog::{self, ChangelogSource, ConventionalChangelog};
use crate::changeset::ChangeSet;
use crate::config::{Config, PolicyConfig};
use crate::error::{Result, UpdaterError};
use crate::git::{GitRepo, VersionControl};
use crate::manifest::{MANIFEST_FILE, ManifestSnapshot, PackageManager};
use crate::notifier::{Notification, Notifier};
use crate::platform::PlatformTarget;
use crate::review::{ReviewRequest, ReviewRequester, http_client, requester_for};
use crate::scanner::{NpmCheckUpdates, UpdateScanner};
use crate::services::ChangeCommitter;
use crate::updates::{ClassifiedUpdates, VersionDelta, classify, format_deltas, parse_updates};
use crate::{log_debug, log_error, log_info, log_warn};
use std::path::{Path, PathBuf};

/// A validated platform target with its requester
pub struct Delivery {
    pub target: PlatformTarget,
    pub requester: Box<dyn ReviewRequester>,
}

impl Delivery {
    pub fn new(target: PlatformTarget, requester: Box<dyn ReviewRequester>) -> Self {
        Self { target, requester }
    }
}

/// Collaborators used by a run
pub struct PipelineDeps {
    pub scanner: Box<dyn UpdateScanner>,
    pub vcs: Box<dyn VersionControl>,
    pub changelog: Box<dyn ChangelogSource>,
    /// The review target, or the configuration error that disables the safe path
    pub delivery: std::result::Result<Delivery, UpdaterError>,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No updates were found
    Idle,
    /// Updates were found and every enabled path finished
    Completed,
    /// A stage failed or the platform is not configured
    Failed,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub updates: ClassifiedUpdates,
    /// Branch pushed by the safe path
    pub branch: Option<String>,
    pub review_url: Option<String>,
    /// Events to dispatch, in the order they were raised
    pub notifications: Vec<Notification>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            outcome: RunOutcome::Idle,
            updates: ClassifiedUpdates::default(),
            branch: None,
            review_url: None,
            notifications: Vec::new(),
        }
    }

    /// A run that could not start, carrying one failure notification
    pub fn setup_failure(error: &UpdaterError) -> Self {
        let mut report = Self::new();
        report.fail(error);
        report
    }

    fn fail(&mut self, error: &UpdaterError) {
        log_error!("{}", error);
        self.outcome = RunOutcome::Failed;
        self.notifications.push(Notification::failure(error));
    }

    fn config_error(&mut self, error: &UpdaterError) {
        log_error!("{}", error);
        self.outcome = RunOutcome::Failed;
        self.notifications.push(Notification::config_error(error));
    }

    fn mark_completed(&mut self) {
        if self.outcome != RunOutcome::Failed {
            self.outcome = RunOutcome::Completed;
        }
    }
}

/// Runs the update pipeline against one working tree
pub struct Pipeline {
    workdir: PathBuf,
    remote: String,
    policy: PolicyConfig,
    deps: PipelineDeps,
}

impl Pipeline {
    pub fn new(workdir: &Path, config: &Config, deps: PipelineDeps) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            remote: config.remote.as_ref().to_string(),
            policy: config.policy.clone(),
            deps,
        }
    }

    /// Wire the real collaborators for the repository containing `workdir`
    ///
    /// The platform selector is validated here; an invalid one is kept as the
    /// delivery error so the run can report it.
    pub fn from_config(config: &Config, selector: &str, workdir: &Path) -> Result<Self> {
        let repo = GitRepo::new(workdir).map_err(|e| UpdaterError::Git(format!("{e:#}")))?;
        let root = repo.repo_path().clone();

        let delivery = PlatformTarget::resolve(selector, config).and_then(|target| {
            let requester = requester_for(&target, http_client()?);
            Ok(Delivery::new(target, requester))
        });

        let deps = PipelineDeps {
            scanner: Box::new(NpmCheckUpdates::new(&root, config.scanner.clone())),
            vcs: Box::new(repo),
            changelog: Box::new(ConventionalChangelog::new(&root, config.changelog.clone())),
            delivery,
        };
        Ok(Self::new(&root, config, deps))
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run once and return the report without sending anything
    #[tracing::instrument(name = "update_run", skip_all, fields(workdir = %self.workdir.display()))]
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::new();
        log_info!("Starting dependency update in {}", self.workdir.display());

        if let Err(e) = &self.deps.delivery {
            report.config_error(e);
        }

        let package_manager = PackageManager::detect(&self.workdir);

        // Read before discovery, the scanner rewrites the manifest
        let snapshot = match ManifestSnapshot::capture(&self.workdir) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                report.fail(&e);
                return report;
            }
        };

        let output = match self.deps.scanner.discover(package_manager).await {
            Ok(Some(output)) => output,
            Ok(None) => {
                log_info!("Dependencies are up to date");
                return report;
            }
            Err(e) => {
                report.fail(&e);
                restore_manifest(&snapshot);
                return report;
            }
        };

        let deltas = self.drop_noops(parse_updates(&output, snapshot.manifest()));
        if deltas.is_empty() {
            log_info!("No applicable updates");
            restore_manifest(&snapshot);
            return report;
        }

        report.updates = classify(deltas, self.policy.classify_policy());
        log_info!(
            "Found {} safe and {} major update(s)",
            report.updates.safe.len(),
            report.updates.major.len()
        );
        report.mark_completed();

        let delivery = self
            .deps
            .delivery
            .as_ref()
            .ok()
            .filter(|_| !report.updates.safe.is_empty());
        if let Some(delivery) = delivery {
            let safe = report.updates.safe.clone();
            self.deliver_safe(delivery, &snapshot, safe, package_manager, &mut report)
                .await;
        } else {
            if !report.updates.safe.is_empty() {
                log_warn!("Skipping safe updates: no review target");
            }
            restore_manifest(&snapshot);
        }

        if !report.updates.major.is_empty() {
            let summary = format_deltas(&report.updates.major);
            report
                .notifications
                .push(Notification::manual_review(&summary));
        }

        report
    }

    /// Run once and dispatch the resulting notifications
    pub async fn run_and_notify(&self, notifier: &Notifier) -> RunReport {
        let report = self.run().await;
        let delivered = notifier.dispatch(&report.notifications).await;
        log_debug!(
            "Delivered {} of {} notification(s)",
            delivered,
            report.notifications.len()
        );
        report
    }

    fn drop_noops(&self, deltas: Vec<VersionDelta>) -> Vec<VersionDelta> {
        if !self.policy.drop_noop {
            return deltas;
        }
        deltas
            .into_iter()
            .filter(|delta| {
                if delta.is_noop() {
                    log_warn!("Ignoring {}: already at target version", delta);
                }
                !delta.is_noop()
            })
            .collect()
    }

    async fn deliver_safe(
        &self,
        delivery: &Delivery,
        snapshot: &ManifestSnapshot,
        deltas: Vec<VersionDelta>,
        package_manager: PackageManager,
        report: &mut RunReport,
    ) {
        let mut change_set = ChangeSet::new(deltas);

        // Major bumps written by the scanner must not reach the commit
        if let Err(e) = snapshot.apply(&change_set.deltas) {
            report.fail(&e);
            restore_manifest(snapshot);
            return;
        }

        let pushed = ChangeCommitter::new(self.deps.vcs.as_ref(), &self.remote)
            .deliver(&change_set, package_manager);
        match pushed {
            Ok(branch) => report.branch = Some(branch),
            Err(e) => {
                report.fail(&e);
                return;
            }
        }

        change_set.changelog =
            changelog::resolve_all(self.deps.changelog.as_ref(), &change_set.deltas).await;

        let request = ReviewRequest::for_change_set(&change_set, &delivery.target);
        log_info!(
            "Opening review request on {}",
            delivery.requester.platform().display_name()
        );
        match delivery.requester.create_review_request(&request).await {
            Ok(result) => {
                log_info!("Review request created: {}", result.url);
                report.notifications.push(Notification::success(&result.url));
                report.review_url = Some(result.url);
            }
            Err(e) => report.fail(&e),
        }
    }
}

fn restore_manifest(snapshot: &ManifestSnapshot) {
    if let Err(e) = snapshot.restore() {
        log_warn!("Could not restore {}: {}", MANIFEST_FILE, e);
    }
}
