use crate::HistoryProvider;
use repohist_core::config::ProviderConfig;
use repohist_core::error::ProviderError;
use repohist_core::types::{
    Branch, EntryKind, FileAction, FileChange, Revision, RootEntry, Watermark,
};
use serde::Deserialize;
use tracing::debug;

/// GitHub REST v3 implementation of [`HistoryProvider`], blocking.
pub struct GithubProvider {
    client: reqwest::blocking::Client,
    api_base: String,
    /// `owner/name`, derived from the repository URL.
    repos: String,
    token: String,
}

impl GithubProvider {
    pub fn new(config: &ProviderConfig, root_url: &str) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("repohist")
            .build()
            .map_err(|e| ProviderError::remote("client_init", e))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            repos: repos_path(root_url),
            token: config.token.clone(),
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        identifier: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        debug!(operation, url, "github request");
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .query(query);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        let response = request
            .send()
            .map_err(|e| ProviderError::remote(operation, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::not_found(operation, identifier));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = serde_json::from_str::<GithubErrorBody>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(ProviderError::UnexpectedResponse {
                operation: operation.to_string(),
                detail: format!("status {status}: {message}"),
            });
        }
        response
            .json()
            .map_err(|e| ProviderError::remote(operation, e))
    }

    fn commits_url(&self) -> String {
        format!("{}/repos/{}/commits", self.api_base, self.repos)
    }
}

impl HistoryProvider for GithubProvider {
    fn branches(&self) -> Result<Vec<Branch>, ProviderError> {
        let default = self.default_branch_from_repo()?;
        let url = format!("{}/repos/{}/branches", self.api_base, self.repos);
        let mut branches = Vec::new();
        // The branch listing is paged like everything else; walk to the end.
        for page in 1u32.. {
            let batch: Vec<GithubBranch> = self.get_json(
                "branches",
                &self.repos,
                &url,
                &[
                    ("per_page", "100".to_string()),
                    ("page", page.to_string()),
                ],
            )?;
            if batch.is_empty() {
                break;
            }
            for b in batch {
                branches.push(Branch {
                    is_default: default.as_deref() == Some(b.name.as_str()),
                    name: b.name,
                    commit_id: b.commit.sha,
                });
            }
        }
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(branches)
    }

    fn commits(
        &self,
        path: &str,
        watermark: Option<&Watermark>,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Revision>, ProviderError> {
        let mut query = vec![
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        if !path.is_empty() {
            query.push(("path", path.to_string()));
        }
        if let Some(wm) = watermark {
            query.push(("since", wm.last_committed_date.clone()));
        }
        let commits: Vec<GithubCommit> =
            self.get_json("commits", &self.repos, &self.commits_url(), &query)?;
        Ok(commits.into_iter().map(GithubCommit::into_revision).collect())
    }

    fn file_changes(&self, commit_id: &str) -> Result<Vec<FileChange>, ProviderError> {
        let url = format!("{}/{}", self.commits_url(), commit_id);
        let detail: GithubCommitDetail = self.get_json("file_changes", commit_id, &url, &[])?;
        Ok(detail
            .files
            .unwrap_or_default()
            .into_iter()
            .map(GithubFile::into_file_change)
            .collect())
    }

    fn resolve_ref(&self, r#ref: &str) -> Result<String, ProviderError> {
        let commits: Vec<GithubCommit> = self.get_json(
            "resolve_ref",
            r#ref,
            &self.commits_url(),
            &[("sha", r#ref.to_string()), ("per_page", "1".to_string())],
        )?;
        commits
            .into_iter()
            .next()
            .map(|c| c.sha)
            .ok_or_else(|| ProviderError::not_found("resolve_ref", r#ref))
    }

    fn root_entries(&self, r#ref: &str) -> Result<Vec<RootEntry>, ProviderError> {
        let url = format!("{}/repos/{}/contents/", self.api_base, self.repos);
        let contents: Vec<GithubContent> =
            self.get_json("root_entries", r#ref, &url, &[("ref", r#ref.to_string())])?;

        let mut entries = Vec::with_capacity(contents.len());
        for item in contents {
            // One listing call per entry; this is the cost the fileset
            // cache shields browsing from.
            let last_commit_id = self.last_commit_for_path(&item.path, r#ref)?;
            let kind = EntryKind::parse_kind(&item.kind).unwrap_or(EntryKind::File);
            entries.push(RootEntry {
                name: item.name,
                path: item.path,
                kind,
                size: (kind == EntryKind::File).then_some(item.size),
                last_commit_id,
                last_committer: None,
                last_committed_on: None,
            });
        }
        RootEntry::sort_listing(&mut entries);
        Ok(entries)
    }
}

impl GithubProvider {
    fn default_branch_from_repo(&self) -> Result<Option<String>, ProviderError> {
        let url = format!("{}/repos/{}", self.api_base, self.repos);
        let info: GithubRepoInfo = self.get_json("repo_info", &self.repos, &url, &[])?;
        Ok(info.default_branch)
    }

    fn last_commit_for_path(
        &self,
        path: &str,
        r#ref: &str,
    ) -> Result<Option<String>, ProviderError> {
        let commits: Vec<GithubCommit> = self.get_json(
            "last_commit_for_path",
            path,
            &self.commits_url(),
            &[
                ("sha", r#ref.to_string()),
                ("path", path.to_string()),
                ("per_page", "1".to_string()),
            ],
        )?;
        Ok(commits.into_iter().next().map(|c| c.sha))
    }
}

/// Reduce a repository URL to the `owner/name` path GitHub's API expects.
fn repos_path(root_url: &str) -> String {
    let stripped = root_url
        .trim_start_matches("https://github.com/")
        .trim_end_matches('/');
    stripped.strip_suffix(".git").unwrap_or(stripped).to_string()
}

#[derive(Debug, Deserialize)]
struct GithubErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GithubRepoInfo {
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubBranch {
    name: String,
    commit: GithubRef,
}

#[derive(Debug, Deserialize)]
struct GithubRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GithubCommit {
    sha: String,
    #[serde(default)]
    parents: Vec<GithubRef>,
    commit: GithubCommitInner,
}

#[derive(Debug, Deserialize)]
struct GithubCommitInner {
    #[serde(default)]
    message: String,
    author: Option<GithubSignature>,
    committer: Option<GithubSignature>,
}

#[derive(Debug, Deserialize)]
struct GithubSignature {
    name: Option<String>,
    date: Option<String>,
}

impl GithubCommit {
    fn into_revision(self) -> Revision {
        let author = self
            .commit
            .author
            .as_ref()
            .and_then(|a| a.name.clone())
            .unwrap_or_default();
        let committed_on = self
            .commit
            .committer
            .as_ref()
            .and_then(|c| c.date.clone())
            .unwrap_or_default();
        Revision {
            scmid: self.sha,
            parents: self.parents.into_iter().map(|p| p.sha).collect(),
            author,
            committed_on,
            message: self.commit.message,
            file_changes: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GithubCommitDetail {
    files: Option<Vec<GithubFile>>,
}

#[derive(Debug, Deserialize)]
struct GithubFile {
    filename: String,
    status: String,
    previous_filename: Option<String>,
}

impl GithubFile {
    fn into_file_change(self) -> FileChange {
        let action = match self.status.as_str() {
            "added" => FileAction::Add,
            "removed" => FileAction::Delete,
            // renamed, changed, copied and anything new all land as Modify.
            _ => FileAction::Modify,
        };
        FileChange {
            action,
            path: self.filename,
            from_path: self.previous_filename,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GithubContent {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repos_path_strips_host_and_suffixes() {
        assert_eq!(repos_path("https://github.com/acme/widget"), "acme/widget");
        assert_eq!(repos_path("https://github.com/acme/widget/"), "acme/widget");
        assert_eq!(
            repos_path("https://github.com/acme/widget.git"),
            "acme/widget"
        );
    }

    #[test]
    fn commit_listing_deserializes_into_revisions() {
        let body = r#"[{
            "sha": "aaaa1111",
            "parents": [{"sha": "bbbb2222"}],
            "commit": {
                "message": "fix the widget",
                "author": {"name": "Alice", "date": "2024-05-01T09:00:00Z"},
                "committer": {"name": "Alice", "date": "2024-05-01T10:00:00Z"}
            }
        }]"#;
        let commits: Vec<GithubCommit> = serde_json::from_str(body).unwrap();
        let rev = commits.into_iter().next().unwrap().into_revision();
        assert_eq!(rev.scmid, "aaaa1111");
        assert_eq!(rev.parents, vec!["bbbb2222".to_string()]);
        assert_eq!(rev.author, "Alice");
        // Committer date, not author date, drives the watermark.
        assert_eq!(rev.committed_on, "2024-05-01T10:00:00Z");
        assert!(rev.file_changes.is_none());
    }

    #[test]
    fn commit_with_missing_signature_still_parses() {
        let body = r#"[{"sha": "cccc3333", "commit": {"message": "import"}}]"#;
        let commits: Vec<GithubCommit> = serde_json::from_str(body).unwrap();
        let rev = commits.into_iter().next().unwrap().into_revision();
        assert_eq!(rev.author, "");
        assert_eq!(rev.committed_on, "");
        assert!(rev.parents.is_empty());
    }

    #[test]
    fn file_statuses_map_to_actions() {
        let body = r#"{"files": [
            {"filename": "a.rs", "status": "added"},
            {"filename": "b.rs", "status": "removed"},
            {"filename": "c.rs", "status": "modified"},
            {"filename": "d.rs", "status": "renamed", "previous_filename": "old.rs"}
        ]}"#;
        let detail: GithubCommitDetail = serde_json::from_str(body).unwrap();
        let changes: Vec<FileChange> = detail
            .files
            .unwrap()
            .into_iter()
            .map(GithubFile::into_file_change)
            .collect();
        assert_eq!(changes[0].action, FileAction::Add);
        assert_eq!(changes[1].action, FileAction::Delete);
        assert_eq!(changes[2].action, FileAction::Modify);
        assert_eq!(changes[3].action, FileAction::Modify);
        assert_eq!(changes[3].from_path.as_deref(), Some("old.rs"));
    }

    #[test]
    fn contents_listing_distinguishes_files_and_dirs() {
        let body = r#"[
            {"name": "src", "path": "src", "type": "dir"},
            {"name": "Cargo.toml", "path": "Cargo.toml", "type": "file", "size": 431}
        ]"#;
        let contents: Vec<GithubContent> = serde_json::from_str(body).unwrap();
        assert_eq!(EntryKind::parse_kind(&contents[0].kind), Some(EntryKind::Dir));
        assert_eq!(
            EntryKind::parse_kind(&contents[1].kind),
            Some(EntryKind::File)
        );
        assert_eq!(contents[1].size, 431);
    }
}
