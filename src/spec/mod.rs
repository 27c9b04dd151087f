//! Declarative app specification.
//!
//! An app spec is a YAML document kept in the repository that describes an
//! app's services, workers, jobs, domains, and alerts. Only the fields the
//! preview transform touches are modeled; everything else is carried through
//! untouched so the platform receives the author's full spec.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Component>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<Component>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<Component>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domains: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Value>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A deployable component (service, worker, or job).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GitHubSource>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// A component's GitHub source reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSource {
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub deploy_on_push: bool,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Parse an app spec from raw YAML.
pub fn parse(bytes: &[u8]) -> Result<AppSpec> {
    serde_yaml::from_slice(bytes).context("Failed to parse app spec")
}

/// Rewrite an app spec into its PR-scoped variant.
///
/// The name becomes the PR's environment name; domains and alerts are
/// dropped (they would collide with production or notify the wrong people);
/// every component sourced from the PR's own repository gets its branch
/// pinned to the PR head and push-triggered deploys disabled, since the
/// engine kicks deployments itself to watch their status end to end.
pub fn scope_to_pull_request(
    spec: &mut AppSpec,
    env_name: &str,
    repo_full_name: &str,
    head_branch: &str,
) {
    spec.name = env_name.to_string();
    spec.domains = None;
    spec.alerts = None;

    let components = spec
        .services
        .iter_mut()
        .chain(spec.workers.iter_mut())
        .chain(spec.jobs.iter_mut());

    for component in components {
        if let Some(github) = component.github.as_mut() {
            if github.repo != repo_full_name {
                // Sources pointing at other repos stay as they are.
                continue;
            }
            github.deploy_on_push = false;
            github.branch = Some(head_branch.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC_YAML: &str = r#"
name: widgets-api
region: nyc
services:
  - name: api
    github:
      repo: acme/widgets
      branch: main
      deploy_on_push: true
    http_port: 8080
  - name: docs
    github:
      repo: acme/docs
      branch: main
      deploy_on_push: true
workers:
  - name: mailer
    github:
      repo: acme/widgets
      branch: main
domains:
  - domain: widgets.example.com
alerts:
  - rule: DEPLOYMENT_FAILED
"#;

    #[test]
    fn scopes_spec_to_pull_request() {
        let mut spec = parse(SPEC_YAML.as_bytes()).unwrap();
        scope_to_pull_request(&mut spec, "acme-widgets-42", "acme/widgets", "feature-1");

        assert_eq!(spec.name, "acme-widgets-42");
        assert!(spec.domains.is_none());
        assert!(spec.alerts.is_none());

        let api = spec.services[0].github.as_ref().unwrap();
        assert_eq!(api.branch.as_deref(), Some("feature-1"));
        assert!(!api.deploy_on_push);

        // Source in another repo is left alone.
        let docs = spec.services[1].github.as_ref().unwrap();
        assert_eq!(docs.branch.as_deref(), Some("main"));
        assert!(docs.deploy_on_push);

        let mailer = spec.workers[0].github.as_ref().unwrap();
        assert_eq!(mailer.branch.as_deref(), Some("feature-1"));
        assert!(!mailer.deploy_on_push);
    }

    #[test]
    fn transform_is_idempotent() {
        let mut once = parse(SPEC_YAML.as_bytes()).unwrap();
        scope_to_pull_request(&mut once, "acme-widgets-42", "acme/widgets", "feature-1");

        let mut twice = once.clone();
        scope_to_pull_request(&mut twice, "acme-widgets-42", "acme/widgets", "feature-1");

        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }

    #[test]
    fn unmodeled_fields_survive_the_round_trip() {
        let mut spec = parse(SPEC_YAML.as_bytes()).unwrap();
        scope_to_pull_request(&mut spec, "acme-widgets-42", "acme/widgets", "feature-1");

        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["region"], "nyc");
        assert_eq!(value["services"][0]["name"], "api");
        assert_eq!(value["services"][0]["http_port"], 8080);
    }

    #[test]
    fn rejects_structurally_invalid_yaml() {
        assert!(parse(b"services: {not: [valid").is_err());
    }
}
