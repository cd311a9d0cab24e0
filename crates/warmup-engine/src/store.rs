//! Account storage.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::account::{AccountPatch, ActionRecord, WarmupAccount, WarmupStatus};

/// Errors from an account store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or written.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded.
    #[error("store data error: {0}")]
    Json(#[from] serde_json::Error),

    /// Account not found.
    #[error("account not found: {0}")]
    NotFound(String),

    /// Account already exists.
    #[error("account already exists: {0}")]
    AlreadyExists(String),

    /// A remote store reported a failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read/write access to warm-up accounts.
///
/// Status transitions go through `compare_and_apply`, which only writes when
/// the stored status is one of `expected`. The orchestrator and the workers
/// both move accounts, so an unconditional write could lose an update.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<WarmupAccount>, StoreError>;

    /// Every account, in id order.
    async fn list(&self) -> Result<Vec<WarmupAccount>, StoreError>;

    /// Register a new account.
    async fn insert(&self, account: WarmupAccount) -> Result<(), StoreError>;

    /// Apply `patch` if the current status is in `expected`.
    ///
    /// Returns the updated account, or `None` if the status did not match.
    async fn compare_and_apply(
        &self,
        id: &str,
        expected: &[WarmupStatus],
        patch: AccountPatch,
    ) -> Result<Option<WarmupAccount>, StoreError>;

    /// Apply `patch` unconditionally.
    async fn apply(&self, id: &str, patch: AccountPatch) -> Result<WarmupAccount, StoreError>;

    /// Append one record to the account's log for `date`.
    async fn append_progress(
        &self,
        id: &str,
        date: NaiveDate,
        record: ActionRecord,
    ) -> Result<(), StoreError>;

    /// Record a newly observed karma value.
    async fn set_karma(&self, id: &str, karma: i64) -> Result<(), StoreError>;

    /// Accounts the orchestrator's scan should visit.
    async fn list_scannable(&self) -> Result<Vec<WarmupAccount>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|a| a.is_warmup_account && a.status.is_scannable())
            .collect())
    }
}

/// Account store held in memory, optionally mirrored to a JSON file.
pub struct LocalAccountStore {
    accounts: RwLock<BTreeMap<String, WarmupAccount>>,
    path: Option<PathBuf>,
}

impl LocalAccountStore {
    pub fn in_memory() -> Self {
        Self {
            accounts: RwLock::new(BTreeMap::new()),
            path: None,
        }
    }

    /// Open a file-backed store, loading existing accounts if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let accounts: Vec<WarmupAccount> = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(count = accounts.len(), path = %path.display(), "loaded accounts");

        Ok(Self {
            accounts: RwLock::new(accounts.into_iter().map(|a| (a.id.clone(), a)).collect()),
            path: Some(path),
        })
    }

    async fn persist(&self, accounts: &BTreeMap<String, WarmupAccount>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let list: Vec<&WarmupAccount> = accounts.values().collect();
        let bytes = serde_json::to_vec_pretty(&list)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Put `account` in the map and persist. A failed write rolls the map
    /// back, so memory never runs ahead of the file.
    async fn commit(
        &self,
        accounts: &mut BTreeMap<String, WarmupAccount>,
        account: WarmupAccount,
    ) -> Result<(), StoreError> {
        let id = account.id.clone();
        let previous = accounts.insert(id.clone(), account);
        if let Err(e) = self.persist(accounts).await {
            match previous {
                Some(previous) => accounts.insert(id, previous),
                None => accounts.remove(&id),
            };
            return Err(e);
        }
        Ok(())
    }

    fn existing(
        accounts: &BTreeMap<String, WarmupAccount>,
        id: &str,
    ) -> Result<WarmupAccount, StoreError> {
        accounts
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl AccountStore for LocalAccountStore {
    async fn get(&self, id: &str) -> Result<Option<WarmupAccount>, StoreError> {
        Ok(self.accounts.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<WarmupAccount>, StoreError> {
        Ok(self.accounts.read().await.values().cloned().collect())
    }

    async fn insert(&self, account: WarmupAccount) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.id) {
            return Err(StoreError::AlreadyExists(account.id));
        }
        let id = account.id.clone();
        self.commit(&mut accounts, account).await?;
        debug!(account_id = %id, "inserted account");
        Ok(())
    }

    async fn compare_and_apply(
        &self,
        id: &str,
        expected: &[WarmupStatus],
        patch: AccountPatch,
    ) -> Result<Option<WarmupAccount>, StoreError> {
        let mut accounts = self.accounts.write().await;
        let mut account = Self::existing(&accounts, id)?;

        if !expected.contains(&account.status) {
            debug!(
                account_id = id,
                status = %account.status,
                ?expected,
                "status changed underneath, skipping update"
            );
            return Ok(None);
        }

        patch.apply_to(&mut account);
        self.commit(&mut accounts, account.clone()).await?;
        Ok(Some(account))
    }

    async fn apply(&self, id: &str, patch: AccountPatch) -> Result<WarmupAccount, StoreError> {
        let mut accounts = self.accounts.write().await;
        let mut account = Self::existing(&accounts, id)?;
        patch.apply_to(&mut account);
        self.commit(&mut accounts, account.clone()).await?;
        Ok(account)
    }

    async fn append_progress(
        &self,
        id: &str,
        date: NaiveDate,
        record: ActionRecord,
    ) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let mut account = Self::existing(&accounts, id)?;
        account.progress.append(date, record);
        self.commit(&mut accounts, account).await
    }

    async fn set_karma(&self, id: &str, karma: i64) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        let mut account = Self::existing(&accounts, id)?;
        account.karma = karma;
        self.commit(&mut accounts, account).await
    }
}
