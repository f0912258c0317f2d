//! Remote endpoint configuration.
//!
//! Local, plaintext, and never pushed. Every field has a default so a partial
//! JSON file (or none at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use gitvault_common::{Error, Result, Username};

/// Where and how the vault repository is reached.
///
/// Templates understand the placeholders `{user}`, `{repo}`, `{branch}` and,
/// for the raw URL only, `{path}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Push URL for the SSH transport.
    pub ssh_url_template: String,
    /// Anonymous raw-content URL used by the read path.
    pub raw_url_template: String,
    /// Repository name under the user's account.
    pub repository: String,
    /// Branch holding the vault.
    pub branch: String,
    /// Shallow clone depth for incremental writes; `None` clones full history.
    pub clone_depth: Option<u32>,
    /// Timeout for a single raw fetch, in seconds.
    pub fetch_timeout_secs: u64,
    /// Timeout for a whole clone-commit-push, in seconds.
    pub git_timeout_secs: u64,
    /// User-Agent header sent with raw fetches.
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            ssh_url_template: "git@github.com:{user}/{repo}.git".to_string(),
            raw_url_template:
                "https://raw.githubusercontent.com/{user}/{repo}/refs/heads/{branch}/{path}"
                    .to_string(),
            repository: ".gitvault".to_string(),
            branch: "master".to_string(),
            clone_depth: Some(1),
            fetch_timeout_secs: 10,
            git_timeout_secs: 120,
            user_agent: concat!("gitvault/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl RemoteConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Malformed(format!("remote config {}: {}", path.display(), e)))
    }

    /// Push URL for `user`.
    pub fn ssh_url(&self, user: &Username) -> String {
        self.render(&self.ssh_url_template, user)
    }

    /// Raw-content URL for one object, without the cache-busting query.
    pub fn raw_url(&self, user: &Username, path: &str) -> String {
        self.render(&self.raw_url_template, user)
            .replace("{path}", path.trim_start_matches('/'))
    }

    /// Fully qualified branch ref, e.g. `refs/heads/master`.
    pub fn branch_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    fn render(&self, template: &str, user: &Username) -> String {
        template
            .replace("{user}", user.as_str())
            .replace("{repo}", &self.repository)
            .replace("{branch}", &self.branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_urls() {
        let config = RemoteConfig::default();
        let user = Username::new("alice").unwrap();

        assert_eq!(config.ssh_url(&user), "git@github.com:alice/.gitvault.git");
        assert_eq!(
            config.raw_url(&user, "shared/.config/index"),
            "https://raw.githubusercontent.com/alice/.gitvault/refs/heads/master/shared/.config/index"
        );
        assert_eq!(config.branch_ref(), "refs/heads/master");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"repository": ".vault", "clone_depth": null}}"#).unwrap();

        let config = RemoteConfig::load(file.path()).unwrap();
        assert_eq!(config.repository, ".vault");
        assert_eq!(config.clone_depth, None);
        assert_eq!(config.branch, "master");
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = RemoteConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }
}
