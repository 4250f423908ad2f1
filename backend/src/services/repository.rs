//! In-process document repositories
//!
//! Documents (headers with their line items) live in `RwLock` maps keyed by
//! sequential ids. Each document also has a transition guard so that two
//! transitions on the same document never interleave; a second caller gets
//! `Busy` instead of waiting.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};

use crate::error::{AppError, AppResult};

/// Monotonic id source
#[derive(Debug, Default)]
pub struct IdSequence(AtomicI64);

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Held while a transition runs on one document
pub type TransitionGuard = OwnedMutexGuard<()>;

pub struct Repository<T> {
    name: &'static str,
    ids: IdSequence,
    docs: RwLock<BTreeMap<i64, T>>,
    guards: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl<T: Clone + Send + Sync> Repository<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ids: IdSequence::new(),
            docs: RwLock::new(BTreeMap::new()),
            guards: Mutex::new(HashMap::new()),
        }
    }

    pub fn next_id(&self) -> i64 {
        self.ids.next()
    }

    fn not_found(&self, id: i64) -> AppError {
        AppError::NotFound(format!("{} {}", self.name, id))
    }

    pub async fn insert(&self, id: i64, doc: T) {
        self.docs.write().await.insert(id, doc);
    }

    pub async fn find(&self, id: i64) -> Option<T> {
        self.docs.read().await.get(&id).cloned()
    }

    pub async fn get(&self, id: i64) -> AppResult<T> {
        self.find(id).await.ok_or_else(|| self.not_found(id))
    }

    /// Replace an existing document
    pub async fn save(&self, id: i64, doc: T) -> AppResult<()> {
        let mut docs = self.docs.write().await;
        match docs.get_mut(&id) {
            Some(slot) => {
                *slot = doc;
                Ok(())
            }
            None => Err(self.not_found(id)),
        }
    }

    pub async fn remove(&self, id: i64) -> AppResult<T> {
        let removed = self.docs.write().await.remove(&id);
        self.guard_map().remove(&id);
        removed.ok_or_else(|| self.not_found(id))
    }

    /// Documents matching `pred`, newest first
    pub async fn list(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.docs
            .read()
            .await
            .values()
            .rev()
            .filter(|d| pred(d))
            .cloned()
            .collect()
    }

    fn guard_lock(&self, id: i64) -> Arc<AsyncMutex<()>> {
        self.guard_map()
            .entry(id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Take the transition guard for document `id`, or fail with `Busy`
    pub fn guard(&self, id: i64) -> AppResult<TransitionGuard> {
        self.guard_lock(id).try_lock_owned().map_err(|_| {
            AppError::Busy(format!(
                "a transition is already running on {} {}",
                self.name, id
            ))
        })
    }

    /// Wait for the transition guard of document `id`.
    ///
    /// For parent bookkeeping after a child transition. A caller already
    /// holding this guard must not reach here, and whoever holds a parent
    /// guard only try-locks its children, so waiting cannot deadlock.
    pub async fn wait_guard(&self, id: i64) -> TransitionGuard {
        self.guard_lock(id).lock_owned().await
    }

    fn guard_map(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Arc<AsyncMutex<()>>>> {
        // The map only holds Arcs; a panic while holding it cannot leave it inconsistent
        self.guards.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Per-prefix, per-day document number sequences
#[derive(Debug, Default)]
pub struct DocumentNumbers {
    counters: Mutex<HashMap<(String, NaiveDate), u32>>,
}

impl DocumentNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self, prefix: &str, date: NaiveDate) -> u32 {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let counter = counters.entry((prefix.to_string(), date)).or_insert(0);
        *counter += 1;
        *counter
    }

    /// `IN202401150001` style: prefix + yyyyMMdd + 4-digit sequence
    pub fn next(&self, prefix: &str) -> String {
        let today = Utc::now().date_naive();
        let seq = self.bump(prefix, today);
        format!("{}{}{:04}", prefix, today.format("%Y%m%d"), seq)
    }

    /// `WAVE-20240115-0001` style
    pub fn next_dashed(&self, prefix: &str) -> String {
        let today = Utc::now().date_naive();
        let seq = self.bump(prefix, today);
        format!("{}-{}-{:04}", prefix, today.format("%Y%m%d"), seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_repository_crud_and_order() {
        let repo: Repository<String> = Repository::new("doc");
        let a = repo.next_id();
        let b = repo.next_id();
        repo.insert(a, "a".into()).await;
        repo.insert(b, "b".into()).await;

        assert_eq!(repo.list(|_| true).await, vec!["b".to_string(), "a".to_string()]);
        repo.save(a, "a2".into()).await.unwrap();
        assert_eq!(repo.get(a).await.unwrap(), "a2");
        assert!(repo.save(99, "x".into()).await.is_err());
        repo.remove(b).await.unwrap();
        assert!(matches!(repo.get(b).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_guard_is_exclusive() {
        let repo: Repository<()> = Repository::new("doc");
        let held = repo.guard(1).unwrap();
        assert!(matches!(repo.guard(1), Err(AppError::Busy(_))));
        assert!(repo.guard(2).is_ok());
        drop(held);
        assert!(repo.guard(1).is_ok());
    }

    #[test]
    fn test_document_numbers() {
        let numbers = DocumentNumbers::new();
        let first = numbers.next("IN");
        let second = numbers.next("IN");
        assert!(first.starts_with("IN"));
        assert_eq!(first.len(), 2 + 8 + 4);
        assert!(first.ends_with("0001"));
        assert!(second.ends_with("0002"));
        assert!(numbers.next("OUT").ends_with("0001"));

        let wave = numbers.next_dashed("WAVE");
        assert!(wave.starts_with("WAVE-"));
        assert!(wave.ends_with("-0001"));
    }
}
