//! Store that mirrors league documents into a GitHub repository
//!
//! Each save is a commit through the contents API. Git history doubles as the
//! backup trail: a corrupt document is recovered from earlier commits of the
//! same path.

use super::ResultStore;
use crate::config::{Config, GitHubApi};
use crate::error::{LeagueError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Contents API response for a single file
#[derive(Debug, Deserialize)]
struct GitHubFile {
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct GitHubCommit {
    sha: String,
}

pub struct GitHubStore {
    client: Client,
    owner: String,
    repo: String,
    branch: Option<String>,
    path_prefix: Option<String>,
    token: String,
    generations: usize,
}

impl GitHubStore {
    /// Build from the `storage.github` section and the `GITHUB_TOKEN` credential
    pub fn from_config(config: &Config) -> Result<Self> {
        let gh = config
            .storage
            .github
            .as_ref()
            .ok_or_else(|| LeagueError::Config("storage.github section is required".into()))?;

        let token = config
            .credentials
            .github_token
            .clone()
            .ok_or_else(|| LeagueError::Config("GITHUB_TOKEN must be set for the github backend".into()))?;

        let client = Client::builder()
            .user_agent(concat!("ffb-ledger/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            owner: gh.owner.clone(),
            repo: gh.repo.clone(),
            branch: gh.branch.clone(),
            path_prefix: gh.path_prefix.clone(),
            token,
            generations: config.storage.backup_generations.max(1),
        })
    }

    fn repo_path(&self, name: &str) -> String {
        match self.path_prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{}/{}", prefix, name),
            _ => name.to_string(),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Fetch a file at the branch head, or at a specific commit
    async fn get_file(&self, path: &str, git_ref: Option<&str>) -> Result<Option<GitHubFile>> {
        let url = GitHubApi::contents_url(&self.owner, &self.repo, path);
        let mut request = self.authorized(self.client.get(&url));
        if let Some(r) = git_ref.or(self.branch.as_deref()) {
            request = request.query(&[("ref", r)]);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LeagueError::from_response(status, &body));
        }

        Ok(Some(response.json().await?))
    }

    /// Commits touching a path, newest first
    async fn commits_for(&self, path: &str) -> Result<Vec<GitHubCommit>> {
        let url = GitHubApi::commits_url(&self.owner, &self.repo);
        let per_page = (self.generations + 1).to_string();
        let mut query = vec![("path", path), ("per_page", per_page.as_str())];
        if let Some(branch) = self.branch.as_deref() {
            query.push(("sha", branch));
        }

        let response = self
            .authorized(self.client.get(&url))
            .query(&query)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LeagueError::from_response(status, &body));
        }

        Ok(response.json().await?)
    }

    async fn restore_from_history(&self, name: &str, path: &str) -> Result<Option<Value>> {
        let commits = self.commits_for(path).await?;

        // The newest commit holds the corrupt version
        for commit in commits.iter().skip(1) {
            let file = match self.get_file(path, Some(&commit.sha)).await {
                Ok(Some(file)) => file,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Failed to fetch {} at {}: {}", name, commit.sha, e);
                    continue;
                }
            };

            match decode_content(&file.content) {
                Ok(value) => {
                    info!("Recovered {} from commit {}", name, commit.sha);
                    return Ok(Some(value));
                }
                Err(e) => warn!("{} at {} is also unreadable: {}", name, commit.sha, e),
            }
        }

        let err = LeagueError::CorruptStore {
            name: name.to_string(),
            reason: "no readable version in recent history".into(),
        };
        error!("{}; treating document as absent", err);
        Ok(None)
    }
}

#[async_trait]
impl ResultStore for GitHubStore {
    async fn load(&self, name: &str) -> Result<Option<Value>> {
        let path = self.repo_path(name);
        let file = match self.get_file(&path, None).await? {
            Some(file) => file,
            None => {
                debug!("{} not found in {}/{}", path, self.owner, self.repo);
                return Ok(None);
            }
        };

        match decode_content(&file.content) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Error reading {}: {}", name, e);
                self.restore_from_history(name, &path).await
            }
        }
    }

    async fn save(&self, name: &str, data: &Value) -> Result<()> {
        let path = self.repo_path(name);

        // Updating an existing file requires its current blob SHA
        let existing_sha = self.get_file(&path, None).await?.map(|f| f.sha);

        let encoded = STANDARD.encode(serde_json::to_string_pretty(data)?);
        let mut body = json!({
            "message": format!("Update {}.", name),
            "content": encoded,
        });
        if let Some(sha) = existing_sha {
            body["sha"] = json!(sha);
        }
        if let Some(branch) = &self.branch {
            body["branch"] = json!(branch);
        }

        let url = GitHubApi::contents_url(&self.owner, &self.repo, &path);
        let response = self
            .authorized(self.client.put(&url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(LeagueError::from_response(status, &text));
        }

        info!("Committed {} to {}/{}", path, self.owner, self.repo);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("github ({}/{})", self.owner, self.repo)
    }
}

/// Decode the base64 payload GitHub returns (wrapped at 60 columns)
fn decode_content(content: &str) -> std::result::Result<Value, String> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|e| format!("invalid base64: {}", e))?;
    let text = String::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {}", e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::SAMPLE_YAML;

    fn store_with_prefix(prefix: Option<&str>) -> GitHubStore {
        let mut yaml = format!(
            "{}storage:\n  backend: github\n  github:\n    owner: league\n    repo: ffb\n",
            SAMPLE_YAML
        );
        if let Some(prefix) = prefix {
            yaml.push_str(&format!("    path_prefix: \"{}\"\n", prefix));
        }
        let mut config = Config::from_yaml_str(&yaml).unwrap();
        config.credentials.github_token = Some("test-token".into());
        GitHubStore::from_config(&config).unwrap()
    }

    #[test]
    fn test_decode_wrapped_content() {
        let encoded = STANDARD.encode(r#"{"winner": "Alpha"}"#);
        let wrapped = format!("{}\n{}\n", &encoded[..10], &encoded[10..]);
        let value = decode_content(&wrapped).unwrap();
        assert_eq!(value["winner"], "Alpha");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_content("!!!").is_err());
        assert!(decode_content(&STANDARD.encode("not json")).is_err());
    }

    #[test]
    fn test_repo_path_prefix() {
        assert_eq!(store_with_prefix(None).repo_path("payments.json"), "payments.json");
        assert_eq!(
            store_with_prefix(Some("/seasons/2024/")).repo_path("payments.json"),
            "seasons/2024/payments.json"
        );
    }

    #[test]
    fn test_requires_token() {
        let yaml = format!(
            "{}storage:\n  backend: github\n  github:\n    owner: league\n    repo: ffb\n",
            SAMPLE_YAML
        );
        let config = Config::from_yaml_str(&yaml).unwrap();
        assert!(matches!(
            GitHubStore::from_config(&config),
            Err(LeagueError::Config(_))
        ));
    }
}
