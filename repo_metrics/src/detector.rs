use std::collections::HashSet;

use url::Url;

use crate::api::{Error, Platform, RepositoryReference, Result};

const GITHUB_HOSTS: [&str; 2] = ["github.com", "www.github.com"];
const GITLAB_HOSTS: [&str; 3] = ["gitlab.com", "salsa.debian.org", "gitlab.freedesktop.org"];

/// Classifies repository URLs by hosting platform.
#[derive(Debug, Clone)]
pub struct PlatformDetector {
    gitlab_hosts: HashSet<String>,
}

impl Default for PlatformDetector {
    fn default() -> Self {
        PlatformDetector {
            gitlab_hosts: GITLAB_HOSTS.iter().map(|host| host.to_string()).collect(),
        }
    }
}

impl PlatformDetector {
    /// Treat `host` as a self-managed GitLab instance.
    pub fn with_gitlab_host<STR: AsRef<str>>(mut self, host: STR) -> Self {
        self.gitlab_hosts.insert(host.as_ref().trim().to_lowercase());
        self
    }

    pub fn detect(&self, raw: &str) -> Result<RepositoryReference> {
        let raw = raw.trim();
        let url = Url::parse(raw).map_err(|_| Error::MalformedUrl(raw.to_string(), "not a valid URL"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::MalformedUrl(raw.to_string(), "scheme must be http or https"));
        }
        let host = url
            .host_str()
            .map(str::to_lowercase)
            .ok_or_else(|| Error::MalformedUrl(raw.to_string(), "missing host"))?;
        let platform = self.platform(&host).ok_or_else(|| Error::UnsupportedPlatform(host.clone()))?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let (owner, name) = match platform {
            Platform::GitHub => github_path(&segments),
            Platform::GitLab => gitlab_path(&segments),
        }
        .ok_or_else(|| Error::MalformedUrl(raw.to_string(), "expected <owner>/<repository> path"))?;

        let host = match platform {
            Platform::GitHub => GITHUB_HOSTS[0].to_string(),
            Platform::GitLab => host,
        };
        Ok(RepositoryReference {
            url: format!("https://{}/{}/{}", host, owner, name),
            platform,
            host,
            owner,
            name,
        })
    }

    fn platform(&self, host: &str) -> Option<Platform> {
        if GITHUB_HOSTS.contains(&host) {
            Some(Platform::GitHub)
        } else if self.gitlab_hosts.contains(host) || host.starts_with("gitlab.") {
            Some(Platform::GitLab)
        } else {
            None
        }
    }
}

fn github_path(segments: &[&str]) -> Option<(String, String)> {
    match segments {
        [owner, name, ..] => Some((owner.to_string(), strip_git(name)?)),
        _ => None,
    }
}

/// Namespaces may be nested; everything after the `/-/` marker is a UI route.
fn gitlab_path(segments: &[&str]) -> Option<(String, String)> {
    let end = segments.iter().position(|s| *s == "-").unwrap_or(segments.len());
    match &segments[..end] {
        [namespace @ .., name] if !namespace.is_empty() => Some((namespace.join("/"), strip_git(name)?)),
        _ => None,
    }
}

fn strip_git(name: &str) -> Option<String> {
    let name = name.strip_suffix(".git").unwrap_or(name);
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ErrorKind;

    fn detect(url: &str) -> Result<RepositoryReference> {
        PlatformDetector::default().detect(url)
    }

    #[test]
    fn github_url() {
        let repo = detect("https://github.com/tokio-rs/tokio").unwrap();
        assert_eq!(repo.platform, Platform::GitHub);
        assert_eq!(repo.owner, "tokio-rs");
        assert_eq!(repo.name, "tokio");
        assert_eq!(repo.url, "https://github.com/tokio-rs/tokio");
    }

    #[test]
    fn github_url_with_extra_path_and_git_suffix() {
        let repo = detect(" https://www.github.com/serde-rs/serde.git/tree/master ").unwrap();
        assert_eq!(repo.platform, Platform::GitHub);
        assert_eq!(repo.host, "github.com");
        assert_eq!(repo.owner, "serde-rs");
        assert_eq!(repo.name, "serde");
        assert_eq!(repo.url, "https://github.com/serde-rs/serde");
    }

    #[test]
    fn gitlab_url_with_nested_namespace() {
        let repo = detect("https://gitlab.com/gitlab-org/charts/gitlab-runner/-/tree/main").unwrap();
        assert_eq!(repo.platform, Platform::GitLab);
        assert_eq!(repo.host, "gitlab.com");
        assert_eq!(repo.owner, "gitlab-org/charts");
        assert_eq!(repo.name, "gitlab-runner");
        assert_eq!(repo.full_name(), "gitlab-org/charts/gitlab-runner");
    }

    #[test]
    fn gitlab_family_hosts() {
        assert_eq!(detect("https://salsa.debian.org/debian/apt").unwrap().platform, Platform::GitLab);
        assert_eq!(
            detect("https://gitlab.freedesktop.org/mesa/mesa").unwrap().platform,
            Platform::GitLab
        );
        assert_eq!(detect("https://gitlab.gnome.org/GNOME/gtk").unwrap().platform, Platform::GitLab);

        let detector = PlatformDetector::default().with_gitlab_host("code.example.org");
        let repo = detector.detect("https://code.example.org/team/service").unwrap();
        assert_eq!(repo.platform, Platform::GitLab);
        assert_eq!(repo.url, "https://code.example.org/team/service");
    }

    #[test]
    fn unsupported_platform() {
        let err = detect("https://bitbucket.org/atlassian/python-bitbucket").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
    }

    #[test]
    fn malformed_urls() {
        for url in [
            "not a url",
            "github.com/tokio-rs/tokio",
            "ftp://github.com/tokio-rs/tokio",
            "https://github.com/",
            "https://github.com/tokio-rs",
            "https://github.com//tokio",
            "https://github.com/tokio-rs/.git",
            "https://gitlab.com/project-without-namespace",
            "https://gitlab.com/-/explore",
        ] {
            let err = detect(url).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedUrl, "{}", url);
        }
    }
}
