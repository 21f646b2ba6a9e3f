use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct Repo {
    pub default_branch: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct Release {
    pub created_at: DateTime<Utc>,
}

impl From<Release> for repo_metrics::api::Release {
    fn from(release: Release) -> Self {
        repo_metrics::api::Release::new(release.created_at)
    }
}

#[derive(Deserialize, Debug)]
pub struct Commit {
    pub commit: CommitDetail,
}

#[derive(Deserialize, Debug)]
pub struct CommitDetail {
    pub author: Option<Signature>,
    pub committer: Option<Signature>,
}

#[derive(Deserialize, Debug)]
pub struct Signature {
    pub date: DateTime<Utc>,
}

impl Commit {
    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.commit
            .committer
            .as_ref()
            .or(self.commit.author.as_ref())
            .map(|signature| signature.date)
    }
}

#[derive(Deserialize, Debug)]
pub struct Contributor {
    pub login: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct Branch {
    pub protected: bool,
}

#[derive(Deserialize, Debug)]
pub struct RateLimitBody {
    pub resources: RateLimitResources,
}

#[derive(Deserialize, Debug)]
pub struct RateLimitResources {
    pub core: RateLimitResource,
}

#[derive(Deserialize, Debug)]
pub struct RateLimitResource {
    pub remaining: u32,
    pub reset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_date_prefers_committer() {
        let commit: Commit = serde_json::from_str(
            r#"{
                "sha": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
                "commit": {
                    "author": { "name": "Monalisa Octocat", "date": "2011-04-14T16:00:49Z" },
                    "committer": { "name": "Monalisa Octocat", "date": "2011-04-15T16:00:49Z" },
                    "message": "Fix all the bugs"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(commit.committed_at().unwrap().to_rfc3339(), "2011-04-15T16:00:49+00:00");
    }

    #[test]
    fn commit_without_committer_uses_author() {
        let commit: Commit = serde_json::from_str(
            r#"{ "commit": { "author": { "date": "2011-04-14T16:00:49Z" }, "committer": null } }"#,
        )
        .unwrap();
        assert_eq!(commit.committed_at().unwrap().to_rfc3339(), "2011-04-14T16:00:49+00:00");
    }

    #[test]
    fn rate_limit_body() {
        let body: RateLimitBody = serde_json::from_str(
            r#"{
                "resources": {
                    "core": { "limit": 5000, "used": 1, "remaining": 4999, "reset": 1691591363 },
                    "search": { "limit": 30, "used": 12, "remaining": 18, "reset": 1691591091 }
                },
                "rate": { "limit": 5000, "used": 1, "remaining": 4999, "reset": 1372700873 }
            }"#,
        )
        .unwrap();
        assert_eq!(body.resources.core.remaining, 4999);
        assert_eq!(body.resources.core.reset, 1691591363);
    }
}
