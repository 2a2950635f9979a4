use serde::{Deserialize, Serialize};

/// What a commit did to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Add,
    Modify,
    Delete,
}

impl FileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "A",
            Self::Modify => "M",
            Self::Delete => "D",
        }
    }

    pub fn parse_action(s: &str) -> Option<Self> {
        match s {
            "A" => Some(Self::Add),
            "M" => Some(Self::Modify),
            "D" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub action: FileAction,
    pub path: String,
    /// Previous path, set when the change is a rename.
    pub from_path: Option<String>,
}

/// An in-memory commit as reported by the remote provider. Exists only for
/// the duration of a sync pass; `file_changes` stays `None` until the
/// per-commit enrichment call fills it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    pub scmid: String,
    pub parents: Vec<String>,
    pub author: String,
    /// ISO-8601 UTC committer timestamp.
    pub committed_on: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_changes: Option<Vec<FileChange>>,
}

impl Revision {
    /// Progress cursor this revision would advance the watermark to.
    pub fn cursor(&self) -> Watermark {
        Watermark {
            last_committed_date: self.committed_on.clone(),
            last_committed_id: self.scmid.clone(),
        }
    }
}

/// Per-repository fetch progress cursor. An opaque bound on future fetches,
/// not a globally consistent timestamp; ordering compares
/// (last_committed_date, last_committed_id) lexically, which is total for
/// ISO-8601 UTC text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Watermark {
    pub last_committed_date: String,
    pub last_committed_id: String,
}

/// A tracked remote repository row.
#[derive(Debug, Clone)]
pub struct RepositoryRecord {
    pub id: i64,
    pub root_url: String,
    pub default_branch: Option<String>,
    pub watermark: Option<Watermark>,
    pub created_at: String,
    pub updated_at: String,
}

/// The persisted form of a Revision. Parent links live in a separate table
/// and are the only thing mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangesetRecord {
    pub id: i64,
    pub repository_id: i64,
    pub revision: String,
    pub scmid: String,
    pub committer: String,
    pub committed_on: String,
    pub comments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit_id: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dir => "dir",
        }
    }

    pub fn parse_kind(s: &str) -> Option<Self> {
        match s {
            "file" | "blob" => Some(Self::File),
            "dir" | "tree" => Some(Self::Dir),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One root-directory listing entry, either live from the provider or
/// rebuilt from the fileset cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    /// Absent for directories.
    pub size: Option<u64>,
    /// Newest commit touching this entry, when the provider reports one.
    pub last_commit_id: Option<String>,
    /// Committer of `last_commit_id`, filled on the cache read path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_committer: Option<String>,
    /// Commit time of `last_commit_id`, filled on the cache read path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_committed_on: Option<String>,
}

impl RootEntry {
    /// Listing order: directories first, then name ascending.
    pub fn sort_listing(entries: &mut [RootEntry]) {
        entries.sort_by(|a, b| {
            let a_dir = a.kind == EntryKind::Dir;
            let b_dir = b.kind == EntryKind::Dir;
            b_dir.cmp(&a_dir).then_with(|| a.name.cmp(&b.name))
        });
    }
}
