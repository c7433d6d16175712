//! The in-memory ref/repo database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use refhub_types::{RefIdentifier, RefState, RepoConfiguration};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{StoreError, StoreResult};
use crate::handles::{OwnedRef, OwnedRepo};

/// One repo record: configuration plus the ref slots it owns.
///
/// The outer maps are plain mutexes held only for bookkeeping; the entity
/// locks themselves are async so handles can live across await points.
struct RepoEntry {
    config: Arc<AsyncMutex<RepoConfiguration>>,
    refs: Mutex<HashMap<String, Arc<AsyncMutex<Option<RefState>>>>>,
}

impl RepoEntry {
    fn new() -> Self {
        Self {
            config: Arc::new(AsyncMutex::new(RepoConfiguration::default())),
            refs: Mutex::new(HashMap::new()),
        }
    }
}

/// In-memory store of repos and refs with per-entity exclusive locking.
pub struct MemoryStore {
    repos: Mutex<HashMap<String, Arc<RepoEntry>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            repos: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, repo: &str) -> Arc<RepoEntry> {
        let mut repos = self.repos.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            repos
                .entry(repo.to_string())
                .or_insert_with(|| Arc::new(RepoEntry::new())),
        )
    }

    fn existing_entry(&self, repo: &str) -> Option<Arc<RepoEntry>> {
        let repos = self.repos.lock().unwrap_or_else(PoisonError::into_inner);
        repos.get(repo).map(Arc::clone)
    }

    /// Explicitly create a repo record, failing if one already exists.
    pub fn create_repo(&self, repo: &str) -> StoreResult<()> {
        let mut repos = self.repos.lock().unwrap_or_else(PoisonError::into_inner);
        if repos.contains_key(repo) {
            return Err(StoreError::RepoExists {
                repo: repo.to_string(),
            });
        }
        repos.insert(repo.to_string(), Arc::new(RepoEntry::new()));
        Ok(())
    }

    /// Returns `true` if a record exists for the repo.
    pub fn contains_repo(&self, repo: &str) -> bool {
        self.repos.lock().unwrap_or_else(PoisonError::into_inner).contains_key(repo)
    }

    /// All known repo paths, sorted.
    pub fn list_repos(&self) -> Vec<String> {
        let repos = self.repos.lock().unwrap_or_else(PoisonError::into_inner);
        let mut paths: Vec<String> = repos.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Acquire the repo's exclusive configuration lock, creating the record
    /// if it is absent.
    pub async fn acquire_repo(&self, repo: &str) -> OwnedRepo {
        let entry = self.entry(repo);
        let guard = Arc::clone(&entry.config).lock_owned().await;
        OwnedRepo {
            path: repo.to_string(),
            guard,
        }
    }

    /// Acquire the exclusive lock for one ref's state slot, creating an
    /// empty slot (and the repo record) if absent.
    ///
    /// This is the entry point for updates: a slot that is still `None`
    /// after the caller releases the handle simply reads as a ref that does
    /// not exist.
    pub async fn acquire_ref(&self, ident: &RefIdentifier) -> OwnedRef {
        let entry = self.entry(&ident.repo);
        let slot = {
            let mut refs = entry.refs.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                refs.entry(ident.ref_name.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(None))),
            )
        };
        OwnedRef {
            ident: ident.clone(),
            guard: slot.lock_owned().await,
        }
    }

    /// Acquire the lock for a ref that must already exist.
    pub async fn acquire_existing_ref(&self, ident: &RefIdentifier) -> StoreResult<OwnedRef> {
        let not_exists = || StoreError::RefNotExists {
            repo: ident.repo.clone(),
            ref_name: ident.ref_name.clone(),
        };
        let entry = self.existing_entry(&ident.repo).ok_or_else(not_exists)?;
        let slot = {
            let refs = entry.refs.lock().unwrap_or_else(PoisonError::into_inner);
            refs.get(&ident.ref_name).map(Arc::clone)
        }
        .ok_or_else(not_exists)?;
        let guard = slot.lock_owned().await;
        if guard.is_none() {
            return Err(not_exists());
        }
        Ok(OwnedRef {
            ident: ident.clone(),
            guard,
        })
    }

    /// Deep-copied states of every existing ref in the repo, sorted by ref
    /// name. Each ref is locked briefly in turn, so the result is a
    /// per-ref-consistent snapshot, not a cross-ref-atomic one.
    pub async fn list_ref_states(&self, repo: &str) -> Vec<(String, RefState)> {
        let Some(entry) = self.existing_entry(repo) else {
            return Vec::new();
        };
        let slots: Vec<(String, Arc<AsyncMutex<Option<RefState>>>)> = {
            let refs = entry.refs.lock().unwrap_or_else(PoisonError::into_inner);
            refs.iter()
                .map(|(name, slot)| (name.clone(), Arc::clone(slot)))
                .collect()
        };
        let mut out = Vec::with_capacity(slots.len());
        for (name, slot) in slots {
            let guard = slot.lock().await;
            if let Some(state) = guard.as_ref() {
                out.push((name, state.deep_copy()));
            }
        }
        out.sort_by(|(a, _), (b, _)| a.cmp(b));
        out
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refhub_types::{Op, RemoteConfiguration};
    use serde_json::json;

    fn ident(repo: &str, name: &str) -> RefIdentifier {
        RefIdentifier::new(repo, name)
    }

    #[tokio::test]
    async fn acquire_repo_creates_record() {
        let store = MemoryStore::new();
        assert!(!store.contains_repo("r"));
        let repo = store.acquire_repo("r").await;
        assert_eq!(repo.path(), "r");
        assert!(repo.config().remotes.is_empty());
        drop(repo);
        assert!(store.contains_repo("r"));
    }

    #[tokio::test]
    async fn create_repo_rejects_duplicate() {
        let store = MemoryStore::new();
        store.create_repo("r").unwrap();
        let err = store.create_repo("r").unwrap_err();
        assert!(matches!(err, StoreError::RepoExists { .. }));
    }

    #[tokio::test]
    async fn config_edits_persist_across_handles() {
        let store = MemoryStore::new();
        {
            let mut repo = store.acquire_repo("r").await;
            repo.config_mut().remotes.insert(
                "origin".into(),
                RemoteConfiguration {
                    endpoint: "hub:7788".into(),
                    repo: "r-up".into(),
                    refspecs: vec!["*".into()],
                },
            );
        }
        let repo = store.acquire_repo("r").await;
        assert!(repo.config().remotes.contains_key("origin"));
    }

    #[tokio::test]
    async fn ref_slot_starts_empty() {
        let store = MemoryStore::new();
        let slot = store.acquire_ref(&ident("r", "branch/x")).await;
        assert!(slot.state().is_none());
    }

    #[tokio::test]
    async fn write_then_read_ref() {
        let store = MemoryStore::new();
        let id = ident("r", "branch/x");
        {
            let mut slot = store.acquire_ref(&id).await;
            *slot.slot_mut() = Some(RefState::new("b0", "main"));
        }
        let slot = store.acquire_existing_ref(&id).await.unwrap();
        assert_eq!(slot.state().unwrap().base, "b0");
    }

    #[tokio::test]
    async fn existing_ref_rejects_missing() {
        let store = MemoryStore::new();
        let err = store
            .acquire_existing_ref(&ident("r", "branch/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RefNotExists { .. }));
    }

    #[tokio::test]
    async fn existing_ref_rejects_deleted_slot() {
        let store = MemoryStore::new();
        let id = ident("r", "branch/x");
        {
            let mut slot = store.acquire_ref(&id).await;
            *slot.slot_mut() = Some(RefState::new("b0", "main"));
            *slot.slot_mut() = None;
        }
        assert!(store.acquire_existing_ref(&id).await.is_err());
    }

    #[tokio::test]
    async fn list_ref_states_sorted_and_deep() {
        let store = MemoryStore::new();
        for name in ["branch/z", "head", "branch/a"] {
            let mut slot = store.acquire_ref(&ident("r", name)).await;
            let mut state = RefState::new("b0", "main");
            state.history.push(Op::new(json!({"create": [name]})));
            *slot.slot_mut() = Some(state);
        }
        let listed = store.list_ref_states("r").await;
        let names: Vec<&str> = listed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["branch/a", "branch/z", "head"]);
    }

    #[tokio::test]
    async fn list_repos_sorted() {
        let store = MemoryStore::new();
        store.acquire_repo("b").await;
        store.acquire_repo("a").await;
        assert_eq!(store.list_repos(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn per_ref_lock_serializes_writers() {
        let store = Arc::new(MemoryStore::new());
        let id = ident("r", "branch/x");
        // Seed the slot.
        {
            let mut slot = store.acquire_ref(&id).await;
            *slot.slot_mut() = Some(RefState::new("b0", "main"));
        }
        let mut tasks = Vec::new();
        for i in 0..8u8 {
            let store = Arc::clone(&store);
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                let mut slot = store.acquire_ref(&id).await;
                let state = slot.slot_mut().as_mut().unwrap();
                state.history.push(Op::new(json!({"step": i})));
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        let slot = store.acquire_existing_ref(&id).await.unwrap();
        assert_eq!(slot.state().unwrap().history_len(), 8);
    }
}
