use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct Project {
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
    pub committed_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Commit {
    pub fn committed_at(&self) -> Option<DateTime<Utc>> {
        self.committed_date.or(self.created_at)
    }
}

#[derive(Deserialize, Debug)]
pub struct Contributor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl Contributor {
    /// Lower-cased email, or the name for contributors without one.
    pub fn identifier(self) -> Option<String> {
        let email = self.email.trim();
        if !email.is_empty() {
            Some(email.to_lowercase())
        } else if !self.name.trim().is_empty() {
            Some(self.name.trim().to_string())
        } else {
            None
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct Branch {
    pub protected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_date() {
        let commit: Commit = serde_json::from_str(
            r#"{
                "id": "ed899a2f4b50b4370feeea94676502b42383c746",
                "short_id": "ed899a2f4b5",
                "title": "Replace sanitize with escape once",
                "created_at": "2021-09-20T11:50:22.001+03:00",
                "committed_date": "2021-09-20T11:50:22.001+03:00",
                "authored_date": "2021-09-20T11:50:22.001+03:00"
            }"#,
        )
        .unwrap();
        assert_eq!(
            commit.committed_at().unwrap().to_rfc3339(),
            "2021-09-20T08:50:22.001+00:00"
        );
    }

    #[test]
    fn contributor_identifier() {
        let by_email: Contributor =
            serde_json::from_str(r#"{ "name": "Example User", "email": "Example@Example.com", "commits": 117 }"#)
                .unwrap();
        assert_eq!(by_email.identifier().as_deref(), Some("example@example.com"));

        let by_name: Contributor = serde_json::from_str(r#"{ "name": "Example User", "email": "" }"#).unwrap();
        assert_eq!(by_name.identifier().as_deref(), Some("Example User"));

        let anonymous: Contributor = serde_json::from_str(r#"{ "commits": 1 }"#).unwrap();
        assert_eq!(anonymous.identifier(), None);
    }
}
