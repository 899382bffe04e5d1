//! libgit2-backed [`CommitSource`].

use crate::git::{CommitSource, GitError, ReadCommitsOptions};
use crate::types::CommitRecord;
use chrono::{DateTime, FixedOffset, TimeZone};
use git2::{Commit, DiffFormat, ErrorCode, Oid, Repository, Sort};
use std::path::{Path, PathBuf};

pub struct GitRepository {
    repo: Repository,
    root: PathBuf,
}

impl GitRepository {
    /// Open the repository containing `path`.
    pub fn discover(path: &Path) -> Result<Self, GitError> {
        let repo = Repository::discover(path).map_err(|source| GitError::NotARepository {
            path: path.to_path_buf(),
            source,
        })?;
        let root = repo
            .workdir()
            .ok_or_else(|| GitError::BareRepository {
                path: repo.path().to_path_buf(),
            })?
            .to_path_buf();
        Ok(Self { repo, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn head_oid(&self) -> Option<Oid> {
        self.repo.head().ok()?.target()
    }

    fn find_commit(&self, hash: &str) -> Result<Commit<'_>, GitError> {
        self.repo
            .revparse_single(hash)
            .and_then(|object| object.peel_to_commit())
            .map_err(|_| GitError::UnknownCommit {
                hash: hash.to_string(),
            })
    }

    /// Changed paths against the first parent. Merges report none.
    fn changed_files(&self, commit: &Commit<'_>) -> Result<Vec<String>, GitError> {
        if commit.parent_count() > 1 {
            return Ok(Vec::new());
        }
        let diff = self.first_parent_diff(commit)?;
        Ok(diff
            .deltas()
            .filter_map(|delta| {
                delta
                    .new_file()
                    .path()
                    .or_else(|| delta.old_file().path())
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect())
    }

    fn first_parent_diff(&self, commit: &Commit<'_>) -> Result<git2::Diff<'_>, GitError> {
        let tree = commit
            .tree()
            .map_err(GitError::operation(format!("read tree of {}", commit.id())))?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(
                parent
                    .tree()
                    .map_err(GitError::operation(format!("read parent tree of {}", commit.id())))?,
            ),
            Err(_) => None,
        };
        self.repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
            .map_err(GitError::operation(format!("diff {}", commit.id())))
    }

    /// Unified diff text against the first parent.
    fn patch_text(&self, commit: &Commit<'_>) -> Result<String, GitError> {
        if commit.parent_count() > 1 {
            return Ok(String::new());
        }
        let diff = self.first_parent_diff(commit)?;
        let mut text = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            let origin = line.origin();
            if matches!(origin, '+' | '-' | ' ') {
                text.push(origin);
            }
            text.push_str(&String::from_utf8_lossy(line.content()));
            true
        })
        .map_err(GitError::operation(format!("render patch for {}", commit.id())))?;
        Ok(text)
    }

    fn to_record(&self, commit: &Commit<'_>, include_patch: bool) -> Result<CommitRecord, GitError> {
        let author = commit.author();
        let patch = if include_patch {
            Some(self.patch_text(commit)?)
        } else {
            None
        };
        Ok(CommitRecord {
            hash: commit.id().to_string(),
            author: author.name().unwrap_or("unknown").to_string(),
            date: format_git_time(author.when()),
            message: commit.summary().unwrap_or_default().to_string(),
            files: self.changed_files(commit)?,
            patch,
        })
    }
}

/// ISO-8601 with the author's own offset.
fn format_git_time(time: git2::Time) -> String {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
        .or_else(|| FixedOffset::east_opt(0));
    offset
        .and_then(|offset| offset.timestamp_opt(time.seconds(), 0).single())
        .map(|date: DateTime<FixedOffset>| date.to_rfc3339())
        .unwrap_or_default()
}

impl CommitSource for GitRepository {
    fn read_commits(&self, options: &ReadCommitsOptions) -> Result<Vec<CommitRecord>, GitError> {
        match self.repo.head() {
            Ok(_) => {}
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(GitError::Operation {
                    operation: "resolve HEAD".to_string(),
                    source,
                });
            }
        }

        let mut walk = self
            .repo
            .revwalk()
            .map_err(GitError::operation("start revision walk"))?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(GitError::operation("sort revision walk"))?;
        walk.push_head().map_err(GitError::operation("walk from HEAD"))?;

        if let Some(hash) = &options.since_hash {
            let since = self.find_commit(hash)?;
            walk.hide(since.id())
                .map_err(GitError::operation(format!("hide {hash}")))?;
        }

        let since_seconds = options.since_date.map(|d| d.timestamp());
        let mut commits = Vec::new();
        for oid in walk {
            let oid = oid.map_err(GitError::operation("walk history"))?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(GitError::operation(format!("read commit {oid}")))?;
            if since_seconds.is_some_and(|since| commit.time().seconds() < since) {
                continue;
            }
            commits.push(self.to_record(&commit, options.include_patch)?);
        }

        tracing::debug!(
            commits = commits.len(),
            since_hash = options.since_hash.as_deref().unwrap_or(""),
            "read commits"
        );
        Ok(commits)
    }

    fn commit_exists(&self, hash: &str) -> bool {
        self.find_commit(hash).is_ok()
    }

    fn is_ancestor(&self, hash: &str) -> bool {
        let (Some(head), Ok(commit)) = (self.head_oid(), self.find_commit(hash)) else {
            return false;
        };
        let target = commit.id();
        head == target
            || self
                .repo
                .graph_descendant_of(head, target)
                .unwrap_or(false)
    }

    fn diff_snippet(&self, hash: &str, max_lines: usize) -> Result<String, GitError> {
        let commit = self.find_commit(hash)?;
        Ok(snippet_from_patch(&self.patch_text(&commit)?, max_lines))
    }
}

/// File and hunk headers plus up to `max(1, max_lines)` body lines, trimmed.
pub fn snippet_from_patch(patch: &str, max_lines: usize) -> String {
    let max_body = max_lines.max(1);
    let mut kept = Vec::new();
    let mut body = 0;

    for line in patch.lines() {
        let header = line.starts_with("diff --git")
            || line.starts_with("--- ")
            || line.starts_with("+++ ")
            || line.starts_with("@@");
        if header {
            kept.push(line);
            continue;
        }
        if !(line.starts_with('+') || line.starts_with('-') || line.starts_with(' ')) {
            continue;
        }
        kept.push(line);
        body += 1;
        if body >= max_body {
            break;
        }
    }

    kept.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use tempfile::TempDir;

    fn commit_file(repo: &Repository, name: &str, content: &str, message: &str, when: i64) -> Oid {
        let root = repo.workdir().unwrap();
        std::fs::write(root.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::new("Ada", "ada@example.com", &git2::Time::new(when, 60)).unwrap();
        let parents: Vec<Commit<'_>> = repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .map(|oid| vec![repo.find_commit(oid).unwrap()])
            .unwrap_or_default();
        let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    #[test]
    fn test_reads_history_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        let first = commit_file(&repo, "a.txt", "one\n", "add a", 1_700_000_000);
        commit_file(&repo, "b.txt", "two\n", "add b\n\nbody text", 1_700_000_100);

        let source = GitRepository::discover(temp_dir.path()).unwrap();
        let commits = source.read_commits(&ReadCommitsOptions::default()).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].message, "add b");
        assert_eq!(commits[0].files, vec!["b.txt"]);
        assert_eq!(commits[0].author, "Ada");
        assert!(commits[0].date.ends_with("+01:00"));
        assert!(commits[0].patch.is_none());
        assert_eq!(commits[1].hash, first.to_string());

        let since = source
            .read_commits(&ReadCommitsOptions {
                since_hash: Some(first.to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].message, "add b");
    }

    #[test]
    fn test_patch_and_snippet() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        let oid = commit_file(&repo, "a.txt", "one\ntwo\n", "add a", 1_700_000_000);
        let source = GitRepository::discover(temp_dir.path()).unwrap();

        let commits = source
            .read_commits(&ReadCommitsOptions {
                include_patch: true,
                ..Default::default()
            })
            .unwrap();
        let patch = commits[0].patch.as_deref().unwrap();
        assert!(patch.contains("+one"));

        let snippet = source.diff_snippet(&oid.to_string(), 1).unwrap();
        assert!(snippet.contains("+one"));
        assert!(!snippet.contains("+two"));
    }

    #[test]
    fn test_exists_and_ancestry() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Repository::init(temp_dir.path()).unwrap();
        let first = commit_file(&repo, "a.txt", "1", "first", 1_700_000_000);
        let second = commit_file(&repo, "a.txt", "2", "second", 1_700_000_100);
        let source = GitRepository::discover(temp_dir.path()).unwrap();

        assert!(source.commit_exists(&first.to_string()));
        assert!(!source.commit_exists("0123456789abcdef0123456789abcdef01234567"));
        assert!(source.is_ancestor(&first.to_string()));
        assert!(source.is_ancestor(&second.to_string()));

        // Rewind HEAD: the second commit is no longer an ancestor.
        let target = repo.find_object(first, None).unwrap();
        repo.reset(&target, git2::ResetType::Hard, None).unwrap();
        assert!(!source.is_ancestor(&second.to_string()));
        assert!(source.commit_exists(&second.to_string()));
    }

    #[test]
    fn test_empty_repository_has_no_commits() {
        let temp_dir = TempDir::new().unwrap();
        Repository::init(temp_dir.path()).unwrap();
        let source = GitRepository::discover(temp_dir.path()).unwrap();
        assert!(source.read_commits(&ReadCommitsOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_snippet_from_patch() {
        let patch = "diff --git a/x b/x\nindex 1..2\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n-old\n+new\n+more\n";
        assert_eq!(
            snippet_from_patch(patch, 2),
            "diff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n-old\n+new"
        );
        assert_eq!(snippet_from_patch("", 5), "");
    }
}
