//! 安装脚本 URL 解析
//!
//! installer 为完整 http(s) URL 时原样返回；否则仅支持 github 来源，
//! 拼接为 raw.githubusercontent.com 地址。分支为 RELEASE 时查询最新 release tag

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_RAW_BASE: &str = "https://raw.githubusercontent.com";
const DEFAULT_REF: &str = "main";
const RELEASE_REF: &str = "RELEASE";
const USER_AGENT: &str = "fleet-exec-agent";

/// 应用安装来源
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AppSource {
    /// 完整 URL 或仓库内路径
    #[serde(default)]
    pub installer: Option<String>,
    /// 来源类型（目前仅 "github"）
    #[serde(default)]
    pub source: Option<String>,
    /// `owner/repo`
    #[serde(default)]
    pub repo: Option<String>,
    /// 分支 / tag / commit，`RELEASE` 表示最新 release
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Deserialize)]
struct LatestRelease {
    tag_name: Option<String>,
}

#[derive(Deserialize)]
struct RepoInfo {
    default_branch: Option<String>,
}

/// 安装脚本 URL 解析器
#[derive(Clone)]
pub struct InstallerResolver {
    client: Client,
    api_base: String,
    raw_base: String,
    token: Option<String>,
}

impl InstallerResolver {
    pub fn new(token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build HTTP client, using defaults");
                Client::new()
            });

        Self {
            client,
            api_base: GITHUB_API_BASE.to_string(),
            raw_base: GITHUB_RAW_BASE.to_string(),
            token,
        }
    }

    /// 替换 GitHub API 地址
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// 解析安装脚本 URL，无法解析时返回 None
    pub async fn resolve(&self, app: &AppSource) -> Option<String> {
        let installer = app.installer.as_deref().unwrap_or("");
        if is_http_url(installer) {
            return Some(installer.to_string());
        }

        let is_github = app
            .source
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("github"));
        let repo = app.repo.as_deref().filter(|r| !r.is_empty());
        let (true, Some(repo)) = (is_github, repo) else {
            return None;
        };

        let path = installer.trim_start_matches('/');
        if path.is_empty() {
            return None;
        }

        let branch = app
            .branch
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_REF);
        let git_ref = if branch.eq_ignore_ascii_case(RELEASE_REF) {
            self.latest_release_ref(repo).await
        } else {
            branch.to_string()
        };

        let encoded_path = path
            .split('/')
            .map(|part| urlencoding::encode(part).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        Some(format!(
            "{}/{}/{}/{}",
            self.raw_base,
            repo,
            urlencoding::encode(&git_ref),
            encoded_path
        ))
    }

    /// 最新 release tag -> 仓库默认分支 -> main
    async fn latest_release_ref(&self, repo: &str) -> String {
        let release_url = format!("{}/repos/{}/releases/latest", self.api_base, repo);
        if let Some(release) = self.get_json::<LatestRelease>(&release_url).await {
            if let Some(tag) = release.tag_name.filter(|t| !t.is_empty()) {
                debug!(repo = %repo, tag = %tag, "Resolved latest release");
                return tag;
            }
        }

        let repo_url = format!("{}/repos/{}", self.api_base, repo);
        self.get_json::<RepoInfo>(&repo_url)
            .await
            .and_then(|info| info.default_branch)
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_REF.to_string())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Option<T> {
        match self.fetch_json(url).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(url = %url, error = %e, "GitHub API request failed");
                None
            }
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> anyhow::Result<T> {
        let mut request = self.client.get(url);
        if let Some(ref token) = self.token {
            request = request.header("Authorization", format!("token {}", token));
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {} returned {}", url, status);
        }
        Ok(resp.json::<T>().await?)
    }
}

fn is_http_url(s: &str) -> bool {
    let lower = s.get(..8).unwrap_or(s).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
