//! Identify the commit being released.

use std::path::Path;

use git2::{Repository, StatusOptions};

/// HEAD commit of the repository containing `project_root`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReleaseInfo {
    pub commit: String,
    /// Whether tracked files differ from HEAD.
    pub dirty: bool,
}

/// Describe the project's HEAD. Returns `Ok(None)` outside a git repository
/// or before the first commit.
pub fn describe_head(project_root: &Path) -> anyhow::Result<Option<ReleaseInfo>> {
    let repo = match Repository::discover(project_root) {
        Ok(repo) => repo,
        Err(err) if err.code() == git2::ErrorCode::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let head = match repo.head() {
        Ok(head) => head,
        Err(err)
            if err.code() == git2::ErrorCode::UnbornBranch
                || err.code() == git2::ErrorCode::NotFound =>
        {
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    let commit = head.peel_to_commit()?;

    let mut options = StatusOptions::new();
    options.include_untracked(false).include_ignored(false);
    let dirty = !repo.statuses(Some(&mut options))?.is_empty();

    Ok(Some(ReleaseInfo {
        commit: commit.id().to_string(),
        dirty,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn commit_all(repo: &Repository, message: &str) {
        let mut index = repo.index().expect("index");
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .expect("add_all");
        index.write().expect("write index");
        let tree_id = index.write_tree().expect("write tree");
        let tree = repo.find_tree(tree_id).expect("find tree");
        let sig = git2::Signature::now("Test", "test@example.com").expect("signature");
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("commit");
    }

    #[test]
    fn outside_repository_is_none() {
        let temp = TempDir::new().expect("tempdir should succeed");
        // A temp dir may still sit inside some repository on the host.
        if Repository::discover(temp.path()).is_ok() {
            return;
        }
        assert_eq!(describe_head(temp.path()).expect("describe"), None);
    }

    #[test]
    fn unborn_head_is_none() {
        let temp = TempDir::new().expect("tempdir should succeed");
        Repository::init(temp.path()).expect("init");
        assert_eq!(describe_head(temp.path()).expect("describe"), None);
    }

    #[test]
    fn reports_head_commit_and_dirty_state() {
        let temp = TempDir::new().expect("tempdir should succeed");
        let repo = Repository::init(temp.path()).expect("init");
        std::fs::write(temp.path().join("index.php"), "<?php").expect("write");
        commit_all(&repo, "initial");

        let info = describe_head(temp.path()).expect("describe").expect("head");
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(info.commit, head.id().to_string());
        assert!(!info.dirty);

        std::fs::write(temp.path().join("index.php"), "<?php echo 1;").expect("write");
        let info = describe_head(temp.path()).expect("describe").expect("head");
        assert!(info.dirty);
    }
}
