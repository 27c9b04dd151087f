//! Webhook event payload models, reduced to the fields the engine reads.

use serde::Deserialize;

/// A `pull_request` webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub number: i64,
    pub pull_request: PullRequest,
    pub repository: EventRepository,
    pub installation: Option<EventInstallation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub head: HeadRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadRef {
    /// Branch name of the PR head (`ref` in the payload)
    #[serde(rename = "ref")]
    pub branch: String,
    /// Repository the head branch lives in; differs from the event's
    /// repository when the PR comes from a fork
    pub repo: Option<HeadRepository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadRepository {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRepository {
    pub id: i64,
    pub name: String,
    pub owner: RepositoryOwner,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventInstallation {
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pull_request_payload() {
        let event: PullRequestEvent = serde_json::from_str(
            r#"{
                "action": "opened",
                "number": 42,
                "pull_request": {
                    "head": {
                        "ref": "feature-1",
                        "repo": { "id": 99 }
                    }
                },
                "repository": {
                    "id": 99,
                    "name": "widgets",
                    "owner": { "login": "acme" }
                },
                "installation": { "id": 555 }
            }"#,
        )
        .unwrap();

        assert_eq!(event.action, "opened");
        assert_eq!(event.number, 42);
        assert_eq!(event.pull_request.head.branch, "feature-1");
        assert_eq!(event.pull_request.head.repo.unwrap().id, 99);
        assert_eq!(event.repository.owner.login, "acme");
        assert_eq!(event.installation.unwrap().id, 555);
    }
}
