//! Preview lifecycle engine for PR-based preview apps.
//!
//! Drives a preview app on the hosting platform through the lifecycle of the
//! pull request that owns it: opening a PR provisions an app from the spec
//! on its head branch, pushing new commits redeploys it, and closing or
//! merging deletes it. Deployment progress is mirrored onto the PR through
//! deployment records and their statuses.

use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::github::{
    DeploymentRecord, DeploymentState, PullRequestEvent, SourceControl, SourceControlFactory,
};
use crate::platform::{AppPlatform, DeploymentPhase};
use crate::spec;

use super::poll::await_state;

/// Maximum length the platform accepts for an app name.
const MAX_APP_NAME_LEN: usize = 32;

const ACTION_OPENED: &str = "opened";
const ACTION_REOPENED: &str = "reopened";
const ACTION_CLOSED: &str = "closed";
const ACTION_SYNCHRONIZE: &str = "synchronize";

/// Payload embedded in every deployment record so later events can recover
/// the platform app without a separate index.
#[derive(Debug, Deserialize)]
struct DeploymentPayload {
    app_id: String,
}

/// Identifiers derived once per event and threaded through the lifecycle
/// steps.
struct PrContext {
    owner: String,
    repo: String,
    head_branch: String,
    env_name: String,
}

impl PrContext {
    fn from_event(event: &PullRequestEvent) -> Self {
        let owner = event.repository.owner.login.clone();
        let repo = event.repository.name.clone();
        Self {
            env_name: environment_name(&owner, &repo, event.number),
            head_branch: event.pull_request.head.branch.clone(),
            owner,
            repo,
        }
    }

    fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// The PR lifecycle orchestrator.
///
/// Stateless between events: everything it needs is reconstructed from the
/// event payload, the deployment records on the PR, and the platform's own
/// resource state.
pub struct PreviewEngine {
    github: Arc<dyn SourceControlFactory>,
    platform: Arc<dyn AppPlatform>,
    spec_path: String,
    env_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PreviewEngine {
    pub fn new(
        github: Arc<dyn SourceControlFactory>,
        platform: Arc<dyn AppPlatform>,
        spec_path: String,
    ) -> Self {
        Self {
            github,
            platform,
            spec_path,
            env_locks: DashMap::new(),
        }
    }

    /// Handle one pull request event.
    ///
    /// Unknown actions and fork-origin PRs are skipped without touching
    /// either platform. Every external failure aborts the handler and is
    /// returned wrapped; webhook redelivery is the only retry mechanism.
    pub async fn handle(
        &self,
        event: &PullRequestEvent,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !matches!(
            event.action.as_str(),
            ACTION_OPENED | ACTION_REOPENED | ACTION_CLOSED | ACTION_SYNCHRONIZE
        ) {
            debug!(action = %event.action, "ignoring pull request action");
            return Ok(());
        }

        let head_repo_id = event.pull_request.head.repo.as_ref().map(|r| r.id);
        if head_repo_id != Some(event.repository.id) {
            warn!(
                pr = event.number,
                repo = %event.repository.name,
                "pull requests of forked repositories are not allowed"
            );
            return Ok(());
        }

        let pr = PrContext::from_event(event);
        let installation_id = event
            .installation
            .as_ref()
            .map(|i| i.id)
            .context("pull request event carries no installation")?;
        let github = self
            .github
            .installation_client(installation_id)
            .await
            .context("failed to create installation client")?;

        // One event at a time per environment: a synchronize racing the
        // close of the same PR must not interleave platform calls.
        let lock = self.lock_for(&pr.env_name);
        let _guard = lock.lock().await;

        match event.action.as_str() {
            ACTION_OPENED | ACTION_REOPENED => self.provision(github.as_ref(), &pr, cancel).await,
            _ => {
                let records = github
                    .list_deployments(&pr.owner, &pr.repo, &pr.env_name)
                    .await
                    .context("failed to list deployments")?;
                let Some(record) = latest_record(records) else {
                    // No record means the opened event never provisioned
                    // anything for this PR. Nothing to do.
                    debug!(app = %pr.env_name, "no deployment record for environment");
                    return Ok(());
                };
                let payload: DeploymentPayload = serde_json::from_value(record.payload.clone())
                    .context("failed to parse deployment payload")?;

                if event.action == ACTION_CLOSED {
                    self.teardown(github.as_ref(), &pr, record.id, &payload.app_id)
                        .await
                } else {
                    self.redeploy(github.as_ref(), &pr, &payload.app_id, cancel)
                        .await
                }
            }
        }
    }

    /// opened/reopened: create a fresh app from the spec on the PR's head
    /// branch and report its first deployment.
    async fn provision(
        &self,
        github: &dyn SourceControl,
        pr: &PrContext,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let raw = github
            .get_file_contents(&pr.owner, &pr.repo, &self.spec_path, &pr.head_branch)
            .await
            .context("failed to fetch app spec")?;
        let mut app_spec = spec::parse(&raw)?;
        spec::scope_to_pull_request(&mut app_spec, &pr.env_name, &pr.full_name(), &pr.head_branch);

        info!(app = %pr.env_name, "creating new app");
        let app = self
            .platform
            .create_app(&app_spec)
            .await
            .context("failed to create app")?;
        let deployment = self
            .platform
            .create_deployment(&app.id)
            .await
            .context("failed to create deployment")?;

        let record = github
            .create_deployment(
                &pr.owner,
                &pr.repo,
                &pr.head_branch,
                &pr.env_name,
                json!({ "app_id": app.id.clone() }),
            )
            .await
            .context("failed to create deployment record")?;

        self.wait_and_report(github, pr, &app.id, &deployment.id, record.id, cancel)
            .await
            .context("failed to propagate deployment status")
    }

    /// synchronize: kick a new deployment of the existing app. The spec is
    /// not diffed against the previous one; every push redeploys.
    async fn redeploy(
        &self,
        github: &dyn SourceControl,
        pr: &PrContext,
        app_id: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!(app = %pr.env_name, "redeploying app after change");
        let deployment = self
            .platform
            .create_deployment(app_id)
            .await
            .context("failed to create deployment")?;

        let record = github
            .create_deployment(
                &pr.owner,
                &pr.repo,
                &pr.head_branch,
                &pr.env_name,
                json!({ "app_id": app_id }),
            )
            .await
            .context("failed to create deployment record")?;

        self.wait_and_report(github, pr, app_id, &deployment.id, record.id, cancel)
            .await
            .context("failed to propagate deployment status")
    }

    /// closed: delete the app, then mark the record inactive. The two steps
    /// are not transactional; a failed status update leaves a stale record
    /// behind and surfaces as an error.
    async fn teardown(
        &self,
        github: &dyn SourceControl,
        pr: &PrContext,
        record_id: i64,
        app_id: &str,
    ) -> Result<()> {
        info!(app = %pr.env_name, "deleting app as the PR was closed");
        self.platform
            .delete_app(app_id)
            .await
            .context("failed to delete app")?;

        github
            .create_deployment_status(&pr.owner, &pr.repo, record_id, DeploymentState::Inactive, None)
            .await
            .context("failed to mark deployment record inactive")
    }

    /// Wait for a platform deployment to settle and report the outcome on
    /// the PR's deployment record.
    ///
    /// A terminal phase other than active is reported as `error` and is not
    /// a handler failure. An active deployment is reported as `success` once
    /// the app has a public URL to link.
    async fn wait_and_report(
        &self,
        github: &dyn SourceControl,
        pr: &PrContext,
        app_id: &str,
        deployment_id: &str,
        record_id: i64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let platform = self.platform.as_ref();

        let deployment = await_state(
            cancel,
            move || platform.get_deployment(app_id, deployment_id),
            |d| d.phase.is_terminal(),
        )
        .await
        .context("failed to wait for deployment to finish")?;

        if deployment.phase != DeploymentPhase::Active {
            warn!(
                app = %pr.env_name,
                phase = ?deployment.phase,
                "deployment finished in a non-active phase"
            );
            github
                .create_deployment_status(
                    &pr.owner,
                    &pr.repo,
                    record_id,
                    DeploymentState::Error,
                    None,
                )
                .await
                .context("failed to update deployment status with failure")?;
            return Ok(());
        }

        let app = await_state(cancel, move || platform.get_app(app_id), |a| {
            !a.live_url.is_empty()
        })
        .await
        .context("failed to wait for app to have a live URL")?;

        info!(app = %pr.env_name, url = %app.live_url, "preview app is live");
        github
            .create_deployment_status(
                &pr.owner,
                &pr.repo,
                record_id,
                DeploymentState::Success,
                Some(&app.live_url),
            )
            .await
            .context("failed to update deployment status")
    }

    fn lock_for(&self, env_name: &str) -> Arc<Mutex<()>> {
        self.env_locks
            .entry(env_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Pick the authoritative record for an environment: the highest numeric id
/// wins, regardless of the order the records were listed in.
fn latest_record(records: Vec<DeploymentRecord>) -> Option<DeploymentRecord> {
    records.into_iter().max_by_key(|r| r.id)
}

/// Derive the app/environment name for a PR.
///
/// The platform caps app names at 32 characters. Short owner/repo pairs map
/// to a readable `{owner}-{repo}-{pr}`; anything longer is truncated and
/// suffixed with a short hash of the full tuple so two PRs can never collide
/// after truncation.
pub fn environment_name(owner: &str, repo: &str, pr_number: i64) -> String {
    let plain = format!("{}-{}-{}", sanitize(owner), sanitize(repo), pr_number);
    if plain.len() <= MAX_APP_NAME_LEN {
        return plain;
    }

    let digest = Sha256::digest(format!("{}/{}#{}", owner, repo, pr_number).as_bytes());
    let suffix = hex::encode(&digest[..4]);
    let keep = MAX_APP_NAME_LEN - suffix.len() - 1;
    format!("{}-{}", &plain[..keep], suffix)
}

/// Lowercase and reduce to the characters platform names allow. Sanitized
/// names are pure ASCII, so byte slicing above stays on char boundaries.
fn sanitize(part: &str) -> String {
    part.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}
