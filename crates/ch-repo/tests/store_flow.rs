// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Store-level flows against an in-memory git transport.
//!
//! These tests exercise the repository and staged-transaction layers
//! end to end: on-demand branch creation, scoped paths, no-op writes,
//! deferred commits, and diffing.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ch_repo::{
    Blob, ClientError, Commit, CommitFile, CommitSignature, FileAction, FileStatus, FlatTree,
    FlatTreeEntry, GitClient, ObjectHash, ObjectKind, RemoteRef, RepositoryConfig, RepositoryError,
    RetryPolicy, GitRepository, StageMode, StageOptions, StagedWriter, Tree,
};

type Files = BTreeMap<String, Vec<u8>>;

#[derive(Default)]
struct GitState {
    /// branch name -> tip commit hash (hex)
    branches: HashMap<String, String>,
    /// commit hash (hex) -> tree snapshot
    snapshots: HashMap<String, Files>,
    commits: u64,
}

impl GitState {
    fn next_hash(&mut self) -> String {
        self.commits += 1;
        format!("{:040x}", self.commits)
    }

    fn seed_branch(&mut self, name: &str, files: Files) {
        let hash = self.next_hash();
        self.snapshots.insert(hash.clone(), files);
        self.branches.insert(name.to_string(), hash);
    }

    fn tip_files(&self, branch: &str) -> Option<&Files> {
        self.branches
            .get(branch)
            .and_then(|tip| self.snapshots.get(tip))
    }
}

fn blob_hash(content: &[u8]) -> ObjectHash {
    let mut acc: u128 = 1469598103934665603;
    for b in content {
        acc = acc.wrapping_mul(1099511628211).wrapping_add(*b as u128);
    }
    ObjectHash::from_hex(&format!("{acc:040x}")[..40]).unwrap()
}

fn strip_branch(ref_name: &str) -> Option<&str> {
    ref_name.strip_prefix("refs/heads/")
}

struct InMemoryGit {
    state: Arc<Mutex<GitState>>,
}

#[async_trait]
impl GitClient for InMemoryGit {
    async fn is_authorized(&self) -> Result<bool, ClientError> {
        Ok(true)
    }

    async fn repo_exists(&self) -> Result<bool, ClientError> {
        Ok(true)
    }

    async fn get_ref(&self, ref_name: &str) -> Result<RemoteRef, ClientError> {
        let state = self.state.lock().unwrap();
        let branch = strip_branch(ref_name).ok_or(ClientError::ObjectNotFound)?;
        let tip = state
            .branches
            .get(branch)
            .ok_or(ClientError::ObjectNotFound)?;
        Ok(RemoteRef {
            name: ref_name.to_string(),
            hash: ObjectHash::from_hex(tip).unwrap(),
        })
    }

    async fn list_refs(&self) -> Result<Vec<RemoteRef>, ClientError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .branches
            .iter()
            .map(|(name, tip)| RemoteRef {
                name: format!("refs/heads/{name}"),
                hash: ObjectHash::from_hex(tip).unwrap(),
            })
            .collect())
    }

    async fn create_ref(&self, ref_name: &str, hash: &ObjectHash) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        let branch = strip_branch(ref_name).ok_or(ClientError::ObjectNotFound)?;
        if state.branches.contains_key(branch) {
            return Err(ClientError::ObjectAlreadyExists);
        }
        if !state.snapshots.contains_key(hash.as_hex()) {
            return Err(ClientError::ObjectNotFound);
        }
        state.branches.insert(branch.to_string(), hash.as_hex().to_string());
        Ok(())
    }

    async fn get_commit(&self, hash: &ObjectHash) -> Result<Commit, ClientError> {
        let state = self.state.lock().unwrap();
        if !state.snapshots.contains_key(hash.as_hex()) {
            return Err(ClientError::ObjectNotFound);
        }
        Ok(Commit {
            hash: hash.clone(),
            tree: hash.clone(),
            message: String::new(),
        })
    }

    async fn get_blob_by_path(&self, tree: &ObjectHash, path: &str) -> Result<Blob, ClientError> {
        let state = self.state.lock().unwrap();
        let files = state
            .snapshots
            .get(tree.as_hex())
            .ok_or(ClientError::ObjectNotFound)?;
        let content = files.get(path).ok_or(ClientError::ObjectNotFound)?;
        Ok(Blob {
            hash: blob_hash(content),
            content: content.clone(),
        })
    }

    async fn get_tree_by_path(&self, tree: &ObjectHash, path: &str) -> Result<Tree, ClientError> {
        let state = self.state.lock().unwrap();
        let files = state
            .snapshots
            .get(tree.as_hex())
            .ok_or(ClientError::ObjectNotFound)?;
        let prefix = format!("{path}/");
        if files.keys().any(|k| k.starts_with(&prefix)) {
            Ok(Tree { hash: tree.clone() })
        } else {
            Err(ClientError::ObjectNotFound)
        }
    }

    async fn get_flat_tree(&self, commit: &ObjectHash) -> Result<FlatTree, ClientError> {
        let state = self.state.lock().unwrap();
        let files = state
            .snapshots
            .get(commit.as_hex())
            .ok_or(ClientError::ObjectNotFound)?;
        Ok(FlatTree {
            entries: files
                .iter()
                .map(|(path, content)| FlatTreeEntry {
                    path: path.clone(),
                    hash: blob_hash(content),
                    kind: ObjectKind::Blob,
                })
                .collect(),
        })
    }

    async fn compare_commits(
        &self,
        base: &ObjectHash,
        head: &ObjectHash,
    ) -> Result<Vec<CommitFile>, ClientError> {
        let state = self.state.lock().unwrap();
        let empty = Files::new();
        let base_files = if base.is_zero() {
            &empty
        } else {
            state
                .snapshots
                .get(base.as_hex())
                .ok_or(ClientError::ObjectNotFound)?
        };
        let head_files = state
            .snapshots
            .get(head.as_hex())
            .ok_or(ClientError::ObjectNotFound)?;

        let mut changes = Vec::new();
        for (path, content) in head_files {
            match base_files.get(path) {
                None => changes.push(CommitFile {
                    path: path.clone(),
                    status: FileStatus::Added,
                }),
                Some(old) if old != content => changes.push(CommitFile {
                    path: path.clone(),
                    status: FileStatus::Modified,
                }),
                Some(_) => {}
            }
        }
        for path in base_files.keys() {
            if !head_files.contains_key(path) {
                changes.push(CommitFile {
                    path: path.clone(),
                    status: FileStatus::Deleted,
                });
            }
        }
        Ok(changes)
    }

    async fn new_staged_writer(
        &self,
        branch_ref: &RemoteRef,
    ) -> Result<Box<dyn StagedWriter>, ClientError> {
        let state = self.state.lock().unwrap();
        let branch = strip_branch(&branch_ref.name)
            .ok_or(ClientError::ObjectNotFound)?
            .to_string();
        let pending = state.tip_files(&branch).cloned().unwrap_or_default();
        Ok(Box::new(InMemoryWriter {
            state: self.state.clone(),
            branch,
            pending,
            dirty: false,
            committed: None,
        }))
    }
}

struct InMemoryWriter {
    state: Arc<Mutex<GitState>>,
    branch: String,
    pending: Files,
    dirty: bool,
    committed: Option<Files>,
}

#[async_trait]
impl StagedWriter for InMemoryWriter {
    async fn blob_exists(&mut self, path: &str) -> Result<bool, ClientError> {
        Ok(self.pending.contains_key(path))
    }

    async fn create_blob(&mut self, path: &str, data: &[u8]) -> Result<ObjectHash, ClientError> {
        if self.pending.contains_key(path) {
            return Err(ClientError::ObjectAlreadyExists);
        }
        self.pending.insert(path.to_string(), data.to_vec());
        self.dirty = true;
        Ok(blob_hash(data))
    }

    async fn update_blob(&mut self, path: &str, data: &[u8]) -> Result<ObjectHash, ClientError> {
        if !self.pending.contains_key(path) {
            return Err(ClientError::ObjectNotFound);
        }
        self.pending.insert(path.to_string(), data.to_vec());
        self.dirty = true;
        Ok(blob_hash(data))
    }

    async fn delete_blob(&mut self, path: &str) -> Result<ObjectHash, ClientError> {
        match self.pending.remove(path) {
            Some(content) => {
                self.dirty = true;
                Ok(blob_hash(&content))
            }
            None => Err(ClientError::ObjectNotFound),
        }
    }

    async fn delete_tree(&mut self, path: &str) -> Result<ObjectHash, ClientError> {
        let prefix = format!("{path}/");
        let doomed: Vec<String> = self
            .pending
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        if doomed.is_empty() {
            return Err(ClientError::ObjectNotFound);
        }
        for key in doomed {
            self.pending.remove(&key);
        }
        self.dirty = true;
        Ok(ObjectHash::zero())
    }

    async fn move_blob(
        &mut self,
        old_path: &str,
        new_path: &str,
    ) -> Result<ObjectHash, ClientError> {
        if self.pending.contains_key(new_path) {
            return Err(ClientError::ObjectAlreadyExists);
        }
        let content = self
            .pending
            .remove(old_path)
            .ok_or(ClientError::ObjectNotFound)?;
        let hash = blob_hash(&content);
        self.pending.insert(new_path.to_string(), content);
        self.dirty = true;
        Ok(hash)
    }

    async fn move_tree(
        &mut self,
        old_path: &str,
        new_path: &str,
    ) -> Result<ObjectHash, ClientError> {
        let old_prefix = format!("{old_path}/");
        let moved: Vec<String> = self
            .pending
            .keys()
            .filter(|k| k.starts_with(&old_prefix))
            .cloned()
            .collect();
        if moved.is_empty() {
            return Err(ClientError::ObjectNotFound);
        }
        for key in moved {
            let content = self.pending.remove(&key).unwrap();
            let renamed = format!("{new_path}/{}", &key[old_prefix.len()..]);
            if self.pending.contains_key(&renamed) {
                return Err(ClientError::ObjectAlreadyExists);
            }
            self.pending.insert(renamed, content);
        }
        self.dirty = true;
        Ok(ObjectHash::zero())
    }

    async fn commit(
        &mut self,
        message: &str,
        _author: &CommitSignature,
        _committer: &CommitSignature,
    ) -> Result<Commit, ClientError> {
        if !self.dirty {
            return Err(ClientError::NothingToCommit);
        }
        self.dirty = false;
        self.committed = Some(self.pending.clone());
        Ok(Commit {
            hash: ObjectHash::zero(),
            tree: ObjectHash::zero(),
            message: message.to_string(),
        })
    }

    async fn push(&mut self) -> Result<(), ClientError> {
        let Some(files) = self.committed.take() else {
            return Err(ClientError::NothingToPush);
        };
        let mut state = self.state.lock().unwrap();
        let hash = state.next_hash();
        state.snapshots.insert(hash.clone(), files);
        state.branches.insert(self.branch.clone(), hash);
        Ok(())
    }

    async fn cleanup(&mut self) -> Result<(), ClientError> {
        self.pending.clear();
        self.committed = None;
        self.dirty = false;
        Ok(())
    }
}

fn new_repo(state: Arc<Mutex<GitState>>) -> GitRepository {
    let config = RepositoryConfig {
        url: "https://git.example.com/owner/repo.git".to_string(),
        branch: "main".to_string(),
        token_user: None,
        token: String::new(),
        path: "configs".to_string(),
        author_name: None,
        author_email: None,
    };
    GitRepository::new(config, Arc::new(InMemoryGit { state }))
        .unwrap()
        .with_retry_policy(RetryPolicy::none())
}

fn seeded_state() -> Arc<Mutex<GitState>> {
    let mut state = GitState::default();
    state.seed_branch("main", Files::new());
    Arc::new(Mutex::new(state))
}

fn commit_count(state: &Arc<Mutex<GitState>>) -> u64 {
    state.lock().unwrap().commits
}

#[tokio::test]
async fn create_read_and_noop_write() {
    let state = seeded_state();
    let repo = new_repo(state.clone());

    repo.create("dash.json", "", b"{\"title\":1}", "add dashboard")
        .await
        .unwrap();

    let info = repo.read("dash.json", "").await.unwrap();
    assert_eq!(info.data.as_deref(), Some(b"{\"title\":1}".as_slice()));

    let commits_before = commit_count(&state);
    repo.write("dash.json", "", b"{\"title\":1}", "rewrite same")
        .await
        .unwrap();
    assert_eq!(
        commit_count(&state),
        commits_before,
        "identical write must not produce a commit"
    );

    repo.write("dash.json", "", b"{\"title\":2}", "rewrite different")
        .await
        .unwrap();
    assert_eq!(commit_count(&state), commits_before + 1);
    let info = repo.read("dash.json", "").await.unwrap();
    assert_eq!(info.data.as_deref(), Some(b"{\"title\":2}".as_slice()));
}

#[tokio::test]
async fn writing_to_a_new_branch_creates_it_from_the_default_tip() {
    let state = seeded_state();
    let repo = new_repo(state.clone());

    repo.create("base.json", "", b"base", "seed main").await.unwrap();
    repo.create("extra.json", "feature", b"extra", "add on feature")
        .await
        .unwrap();

    {
        let state = state.lock().unwrap();
        assert!(state.branches.contains_key("feature"));
    }

    // The feature branch carries main's content plus the new file.
    let base = repo.read("base.json", "feature").await.unwrap();
    assert_eq!(base.data.as_deref(), Some(b"base".as_slice()));
    let extra = repo.read("extra.json", "feature").await.unwrap();
    assert_eq!(extra.data.as_deref(), Some(b"extra".as_slice()));

    // Main never saw the feature-branch write.
    let err = repo.read("extra.json", "").await.unwrap_err();
    assert_eq!(err, RepositoryError::FileNotFound);
}

#[tokio::test]
async fn compare_reports_scoped_changes_between_branches() {
    let state = seeded_state();
    let repo = new_repo(state.clone());

    repo.create("kept.json", "", b"same", "seed").await.unwrap();
    repo.create("added.json", "feature", b"new", "add").await.unwrap();

    let changes = repo.compare_files("main", "feature").await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].path, "added.json");
    assert_eq!(changes[0].action, FileAction::Created);
    assert_eq!(changes[0].ref_name, "feature");
}

#[tokio::test]
async fn staged_commit_only_once_batches_into_a_single_commit() {
    let state = seeded_state();
    let repo = new_repo(state.clone());
    let commits_before = commit_count(&state);

    let mut staged = repo
        .stage(StageOptions {
            mode: StageMode::CommitOnlyOnce,
            commit_only_once_message: Some("Sync batch".to_string()),
            ..StageOptions::default()
        })
        .await
        .unwrap();

    staged.write("a.json", "", b"a", "one").await.unwrap();
    staged.write("b.json", "", b"b", "two").await.unwrap();
    staged.write("c.json", "", b"c", "three").await.unwrap();
    assert_eq!(
        commit_count(&state),
        commits_before,
        "nothing lands before push"
    );

    staged.push().await.unwrap();
    staged.remove().await.unwrap();

    assert_eq!(commit_count(&state), commits_before + 1);
    let entries = repo.read_tree("").await.unwrap();
    let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["a.json", "b.json", "c.json"]);
}

#[tokio::test]
async fn staged_push_with_nothing_staged_reports_the_sentinel() {
    let state = seeded_state();
    let repo = new_repo(state.clone());

    let mut staged = repo
        .stage(StageOptions {
            mode: StageMode::CommitOnlyOnce,
            ..StageOptions::default()
        })
        .await
        .unwrap();

    let err = staged.push().await.unwrap_err();
    assert_eq!(err, RepositoryError::NothingToCommit);
    staged.remove().await.unwrap();
}

#[tokio::test]
async fn directories_round_trip_through_the_sentinel() {
    let state = seeded_state();
    let repo = new_repo(state.clone());

    repo.create("nested/dir/", "", &[], "make dir").await.unwrap();
    let info = repo.read("nested/dir/", "").await.unwrap();
    assert!(info.data.is_none());

    let entries = repo.read_tree("").await.unwrap();
    assert!(entries.iter().any(|e| e.path == "nested/dir/.keep"));

    repo.delete("nested/dir/", "", "drop dir").await.unwrap();
    let err = repo.read("nested/dir/", "").await.unwrap_err();
    assert_eq!(err, RepositoryError::FileNotFound);
}

#[tokio::test]
async fn move_renames_within_the_scope() {
    let state = seeded_state();
    let repo = new_repo(state.clone());

    repo.create("old.json", "", b"content", "add").await.unwrap();
    repo.move_file("old.json", "renamed.json", "", "rename")
        .await
        .unwrap();

    let err = repo.read("old.json", "").await.unwrap_err();
    assert_eq!(err, RepositoryError::FileNotFound);
    let moved = repo.read("renamed.json", "").await.unwrap();
    assert_eq!(moved.data.as_deref(), Some(b"content".as_slice()));
}

#[tokio::test]
async fn default_branch_detection_without_main_or_master() {
    let mut raw = GitState::default();
    raw.seed_branch("zzz", Files::new());
    raw.seed_branch("develop", Files::new());
    let state = Arc::new(Mutex::new(raw));

    let config = RepositoryConfig {
        url: "https://git.example.com/owner/repo.git".to_string(),
        branch: "develop".to_string(),
        token_user: None,
        token: String::new(),
        path: String::new(),
        author_name: None,
        author_email: None,
    };
    let repo = GitRepository::new(config, Arc::new(InMemoryGit { state }))
        .unwrap()
        .with_retry_policy(RetryPolicy::none());

    assert_eq!(repo.get_default_branch().await.unwrap(), "develop");
}
