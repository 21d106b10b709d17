use async_trait::async_trait;
use dep_updater::changelog::ChangelogSource;
use dep_updater::config::Config;
use dep_updater::git::{CommitResult, VersionControl};
use dep_updater::manifest::PackageManager;
use dep_updater::notifier::{NotificationKind, NotificationTransport, Notifier};
use dep_updater::pipeline::{Delivery, Pipeline, PipelineDeps, RunOutcome};
use dep_updater::platform::PlatformTarget;
use dep_updater::review::{ReviewRequest, ReviewRequestResult, ReviewRequester};
use dep_updater::scanner::UpdateScanner;
use dep_updater::{Platform, Result, UpdaterError, VersionDelta};
use git2::Repository;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use test_utils::{PACKAGE_JSON, add_bare_remote, setup_git_repo};

const MANIFEST: &str = r#"{
  "dependencies": { "left-pad": "^1.1.3", "express": "4.18.2" },
  "devDependencies": { "typescript": "~5.3.0" }
}"#;

type Calls = Arc<Mutex<Vec<String>>>;

struct FixedScanner(Option<&'static str>);

#[async_trait]
impl UpdateScanner for FixedScanner {
    async fn discover(&self, _package_manager: PackageManager) -> Result<Option<String>> {
        Ok(self.0.map(str::to_string))
    }
}

/// Rewrites the manifest the way `ncu -u` does, bumping every outdated entry
struct RewritingScanner {
    manifest: PathBuf,
    rewritten: String,
    output: &'static str,
}

impl RewritingScanner {
    fn new(dir: &Path, rewritten: String, output: &'static str) -> Self {
        Self {
            manifest: dir.join("package.json"),
            rewritten,
            output,
        }
    }
}

#[async_trait]
impl UpdateScanner for RewritingScanner {
    async fn discover(&self, _package_manager: PackageManager) -> Result<Option<String>> {
        fs::write(&self.manifest, &self.rewritten)
            .map_err(|e| UpdaterError::Discovery(e.to_string()))?;
        Ok(Some(self.output.to_string()))
    }
}

struct BrokenScanner;

#[async_trait]
impl UpdateScanner for BrokenScanner {
    async fn discover(&self, _package_manager: PackageManager) -> Result<Option<String>> {
        Err(UpdaterError::Discovery("npx: command not found".to_string()))
    }
}

struct FakeVcs {
    calls: Calls,
    fail_commit: bool,
}

impl VersionControl for FakeVcs {
    fn create_branch(&self, branch: &str) -> anyhow::Result<()> {
        self.calls.lock().push(format!("branch {branch}"));
        Ok(())
    }

    fn stage(&self, paths: &[&str]) -> anyhow::Result<()> {
        self.calls.lock().push(format!("stage {}", paths.join(" ")));
        Ok(())
    }

    fn commit(&self, _message: &str) -> anyhow::Result<CommitResult> {
        self.calls.lock().push("commit".to_string());
        if self.fail_commit {
            anyhow::bail!("index.lock exists");
        }
        Ok(CommitResult {
            branch: "update".to_string(),
            commit_hash: "1234567".to_string(),
            files_changed: 2,
        })
    }

    fn push(&self, remote: &str, branch: &str) -> anyhow::Result<()> {
        self.calls.lock().push(format!("push {remote} {branch}"));
        Ok(())
    }
}

struct EchoChangelog;

#[async_trait]
impl ChangelogSource for EchoChangelog {
    async fn changelog(&self, delta: &VersionDelta) -> Result<String> {
        Ok(format!("* {} release notes", delta.package_name()))
    }
}

struct FakeRequester {
    requests: Arc<Mutex<Vec<ReviewRequest>>>,
    fail: bool,
}

#[async_trait]
impl ReviewRequester for FakeRequester {
    async fn create_review_request(&self, request: &ReviewRequest) -> Result<ReviewRequestResult> {
        self.requests.lock().push(request.clone());
        if self.fail {
            return Err(UpdaterError::Review(
                "GitHub API returned 401 Unauthorized: Bad credentials".to_string(),
            ));
        }
        let number = self.requests.lock().len();
        Ok(ReviewRequestResult {
            url: format!("https://github.com/octo/widgets/pull/{number}"),
        })
    }

    fn platform(&self) -> Platform {
        Platform::GitHub
    }
}

fn github_config() -> Config {
    let mut config = Config::default();
    config.github.owner = Some("octo".to_string());
    config.github.repo = Some("widgets".to_string());
    config
}

fn project_dir() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temporary directory");
    fs::write(dir.path().join("package.json"), MANIFEST).expect("Failed to write package.json");
    dir
}

struct Harness {
    dir: TempDir,
    config: Config,
    vcs_calls: Calls,
    requests: Arc<Mutex<Vec<ReviewRequest>>>,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: project_dir(),
            config: github_config(),
            vcs_calls: Arc::default(),
            requests: Arc::default(),
        }
    }

    fn deps(
        &self,
        scanner: Box<dyn UpdateScanner>,
        fail_commit: bool,
        fail_review: bool,
    ) -> PipelineDeps {
        let delivery = PlatformTarget::from_config(Platform::GitHub, &self.config).map(|target| {
            Delivery::new(
                target,
                Box::new(FakeRequester {
                    requests: Arc::clone(&self.requests),
                    fail: fail_review,
                }),
            )
        });
        PipelineDeps {
            scanner,
            vcs: Box::new(FakeVcs {
                calls: Arc::clone(&self.vcs_calls),
                fail_commit,
            }),
            changelog: Box::new(EchoChangelog),
            delivery,
        }
    }

    fn pipeline(&self, output: Option<&'static str>) -> Pipeline {
        let deps = self.deps(Box::new(FixedScanner(output)), false, false);
        Pipeline::new(self.dir.path(), &self.config, deps)
    }
}

#[tokio::test]
async fn test_no_updates_is_idle() {
    let harness = Harness::new();
    let report = harness.pipeline(None).run().await;

    assert_eq!(report.outcome, RunOutcome::Idle);
    assert!(report.notifications.is_empty());
    assert!(harness.vcs_calls.lock().is_empty());
}

#[tokio::test]
async fn test_safe_updates_are_delivered() {
    let harness = Harness::new();
    let report = harness
        .pipeline(Some("express: 4.19.2\ntypescript: 5.4.5\n"))
        .run()
        .await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.updates.safe.len(), 2);
    let branch = report.branch.clone().expect("a branch was pushed");
    assert_eq!(
        *harness.vcs_calls.lock(),
        vec![
            format!("branch {branch}"),
            "stage package.json package-lock.json".to_string(),
            "commit".to_string(),
            format!("push origin {branch}"),
        ]
    );

    let requests = harness.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].source_branch, branch);
    assert_eq!(requests[0].destination_branch, "main");
    assert!(requests[0].body.contains("express: 4.18.2 → 4.19.2"));
    assert!(
        requests[0]
            .body
            .contains("\n### typescript\n* typescript release notes\n")
    );

    assert_eq!(report.notifications.len(), 1);
    assert_eq!(report.notifications[0].kind, NotificationKind::Success);
    assert_eq!(
        report.review_url.as_deref(),
        Some("https://github.com/octo/widgets/pull/1")
    );
}

#[tokio::test]
async fn test_left_pad_example_drops_garbage_and_noop() {
    let harness = Harness::new();
    let report = harness
        .pipeline(Some("left-pad: 1.1.3\nleft-pad: garbage\nleft-pad: 2.0.0"))
        .run()
        .await;

    assert!(report.updates.safe.is_empty());
    assert_eq!(report.updates.major.len(), 1);
    assert!(harness.vcs_calls.lock().is_empty());
    assert_eq!(report.notifications.len(), 1);
    assert_eq!(report.notifications[0].kind, NotificationKind::ManualReview);
    assert_eq!(
        report.notifications[0].body,
        "Manual review needed for the following major updates:\nleft-pad: 1.1.3 → 2.0.0"
    );
}

#[tokio::test]
async fn test_left_pad_example_keeping_noops() {
    let mut harness = Harness::new();
    harness.config.policy.drop_noop = false;
    let report = harness
        .pipeline(Some("left-pad: 1.1.3\nleft-pad: garbage\nleft-pad: 2.0.0"))
        .run()
        .await;

    assert_eq!(report.updates.len(), 2);
    assert_eq!(report.updates.safe.len(), 1);
    assert!(report.updates.safe[0].is_noop());

    let kinds: Vec<_> = report.notifications.iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![NotificationKind::Success, NotificationKind::ManualReview]
    );
}

#[tokio::test]
async fn test_commit_failure_notifies_once_and_skips_review() {
    let harness = Harness::new();
    let deps = harness.deps(
        Box::new(FixedScanner(Some("express: 4.19.2\ntypescript: 6.0.0"))),
        true,
        false,
    );
    let report = Pipeline::new(harness.dir.path(), &harness.config, deps)
        .run()
        .await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert!(harness.requests.lock().is_empty());
    assert!(report.branch.is_none());

    let failures: Vec<_> = report
        .notifications
        .iter()
        .filter(|n| n.kind == NotificationKind::Failure)
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].body.contains("index.lock exists"));

    // The major path is independent of the safe path
    assert!(
        report
            .notifications
            .iter()
            .any(|n| n.kind == NotificationKind::ManualReview)
    );
}

#[tokio::test]
async fn test_review_failure_leaves_branch_pushed() {
    let harness = Harness::new();
    let deps = harness.deps(Box::new(FixedScanner(Some("express: 4.19.2"))), false, true);
    let report = Pipeline::new(harness.dir.path(), &harness.config, deps)
        .run()
        .await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert!(report.branch.is_some());
    assert!(report.review_url.is_none());
    assert_eq!(report.notifications.len(), 1);
    assert_eq!(report.notifications[0].subject, "Dependency Updater Failed");
    assert!(report.notifications[0].body.contains("401 Unauthorized"));
}

#[tokio::test]
async fn test_two_runs_use_distinct_branches() {
    let harness = Harness::new();
    let first = harness.pipeline(Some("express: 4.19.2")).run().await;
    let second = harness.pipeline(Some("express: 4.19.2")).run().await;

    let first_branch = first.branch.expect("first run pushed");
    let second_branch = second.branch.expect("second run pushed");
    assert_ne!(first_branch, second_branch);

    let requests = harness.requests.lock();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].source_branch, first_branch);
    assert_eq!(requests[1].source_branch, second_branch);
}

#[tokio::test]
async fn test_unsupported_platform_reports_one_config_error() {
    let harness = Harness::new();
    let mut deps = harness.deps(
        Box::new(FixedScanner(Some("express: 4.19.2\nleft-pad: 2.0.0"))),
        false,
        false,
    );
    deps.delivery = PlatformTarget::resolve("gitea", &harness.config).map(|target| {
        Delivery::new(
            target,
            Box::new(FakeRequester {
                requests: Arc::clone(&harness.requests),
                fail: false,
            }),
        )
    });
    let report = Pipeline::new(harness.dir.path(), &harness.config, deps)
        .run()
        .await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert!(harness.vcs_calls.lock().is_empty());
    assert!(harness.requests.lock().is_empty());

    let config_errors: Vec<_> = report
        .notifications
        .iter()
        .filter(|n| n.kind == NotificationKind::ConfigError)
        .collect();
    assert_eq!(config_errors.len(), 1);
    assert_eq!(config_errors[0].body, "Unsupported platform: gitea");
    assert_eq!(
        report.notifications.last().map(|n| n.kind),
        Some(NotificationKind::ManualReview)
    );
}

#[tokio::test]
async fn test_missing_platform_configuration() {
    let mut harness = Harness::new();
    harness.config.github.repo = None;
    let report = harness.pipeline(Some("express: 4.19.2")).run().await;

    assert!(harness.vcs_calls.lock().is_empty());
    assert_eq!(report.notifications.len(), 1);
    assert_eq!(
        report.notifications[0].body,
        "GITHUB_OWNER and GITHUB_REPO must be set for GitHub platform."
    );
}

#[tokio::test]
async fn test_discovery_failure_is_reported() {
    let harness = Harness::new();
    let deps = harness.deps(Box::new(BrokenScanner), false, false);
    let report = Pipeline::new(harness.dir.path(), &harness.config, deps)
        .run()
        .await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.notifications.len(), 1);
    assert!(
        report.notifications[0]
            .body
            .contains("npx: command not found")
    );
    assert!(harness.vcs_calls.lock().is_empty());
}

#[tokio::test]
async fn test_missing_manifest_is_reported() {
    let harness = Harness::new();
    fs::remove_file(harness.dir.path().join("package.json")).expect("Failed to remove manifest");
    let report = harness.pipeline(Some("express: 4.19.2")).run().await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert_eq!(report.notifications.len(), 1);
    assert!(report.notifications[0].body.starts_with("Manifest error"));
}

struct RecordingTransport(Calls);

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send(&self, subject: &str, _body: &str) -> Result<()> {
        self.0.lock().push(subject.to_string());
        Ok(())
    }
}

#[tokio::test]
async fn test_run_and_notify_dispatches_in_order() {
    let harness = Harness::new();
    let sent: Calls = Arc::default();
    let notifier = Notifier::new(Box::new(RecordingTransport(Arc::clone(&sent))));

    let report = harness
        .pipeline(Some("express: 4.19.2\nleft-pad: 2.0.0"))
        .run_and_notify(&notifier)
        .await;

    assert_eq!(report.notifications.len(), 2);
    assert_eq!(
        *sent.lock(),
        vec![
            "Dependencies Updated".to_string(),
            "Major Dependency Updates Available".to_string()
        ]
    );
}

#[test]
fn test_from_config_requires_git_repository() {
    let dir = project_dir();
    let err = Pipeline::from_config(&github_config(), "github", dir.path())
        .err()
        .expect("a plain directory is not a repository");
    assert!(matches!(err, UpdaterError::Git(_)));
}

fn read_manifest(dir: &Path) -> String {
    fs::read_to_string(dir.join("package.json")).expect("Failed to read package.json")
}

#[tokio::test]
async fn test_only_safe_updates_stay_in_manifest() {
    let harness = Harness::new();
    let rewritten = MANIFEST
        .replace("4.18.2", "4.19.2")
        .replace("^1.1.3", "^2.0.0");
    let scanner = RewritingScanner::new(
        harness.dir.path(),
        rewritten,
        "express: 4.19.2\nleft-pad: 2.0.0",
    );
    let deps = harness.deps(Box::new(scanner), false, false);
    let report = Pipeline::new(harness.dir.path(), &harness.config, deps)
        .run()
        .await;

    assert_eq!(report.updates.safe.len(), 1);
    assert_eq!(report.updates.major.len(), 1);
    assert!(report.branch.is_some());
    assert_eq!(
        read_manifest(harness.dir.path()),
        MANIFEST.replace("4.18.2", "4.19.2")
    );
}

#[tokio::test]
async fn test_manifest_restored_when_only_major_updates() {
    let harness = Harness::new();
    let scanner = RewritingScanner::new(
        harness.dir.path(),
        MANIFEST.replace("^1.1.3", "^2.0.0"),
        "left-pad: 2.0.0",
    );
    let deps = harness.deps(Box::new(scanner), false, false);
    let report = Pipeline::new(harness.dir.path(), &harness.config, deps)
        .run()
        .await;

    assert!(report.updates.safe.is_empty());
    assert!(harness.vcs_calls.lock().is_empty());
    assert_eq!(read_manifest(harness.dir.path()), MANIFEST);
}

#[tokio::test]
async fn test_manifest_restored_when_delivery_is_disabled() {
    let mut harness = Harness::new();
    harness.config.github.repo = None;
    let scanner = RewritingScanner::new(
        harness.dir.path(),
        MANIFEST.replace("4.18.2", "4.19.2"),
        "express: 4.19.2",
    );
    let deps = harness.deps(Box::new(scanner), false, false);
    let report = Pipeline::new(harness.dir.path(), &harness.config, deps)
        .run()
        .await;

    assert_eq!(report.outcome, RunOutcome::Failed);
    assert!(harness.vcs_calls.lock().is_empty());
    assert_eq!(read_manifest(harness.dir.path()), MANIFEST);
}

#[tokio::test]
async fn test_pushed_branch_excludes_major_bumps() {
    let (temp_dir, git_repo) = setup_git_repo();
    let remote_dir = add_bare_remote(temp_dir.path());
    let harness = Harness::new();

    let rewritten = PACKAGE_JSON
        .replace("^1.1.3", "^1.3.0")
        .replace("~4.18.2", "^5.0.0");
    let mut deps = harness.deps(
        Box::new(RewritingScanner::new(
            temp_dir.path(),
            rewritten,
            "left-pad: 1.3.0\nexpress: 5.0.0\n",
        )),
        false,
        false,
    );
    deps.vcs = Box::new(git_repo);
    let report = Pipeline::new(temp_dir.path(), &harness.config, deps)
        .run()
        .await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.updates.major.len(), 1);
    let branch = report.branch.expect("safe update was pushed");

    let remote = Repository::open_bare(remote_dir.path()).expect("Failed to open remote");
    let tree = remote
        .find_reference(&format!("refs/heads/{branch}"))
        .and_then(|reference| reference.peel_to_tree())
        .expect("branch exists on remote");
    let entry = tree
        .get_path(Path::new("package.json"))
        .expect("package.json is committed");
    let blob = remote.find_blob(entry.id()).expect("Failed to read blob");
    let committed = std::str::from_utf8(blob.content()).expect("manifest is UTF-8");

    assert_eq!(committed, PACKAGE_JSON.replace("^1.1.3", "^1.3.0"));
    assert!(!committed.contains("^5.0.0"));
    assert_eq!(read_manifest(temp_dir.path()), committed);
}
