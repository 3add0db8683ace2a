use std::sync::Arc;

use chrono::Duration;
use storage::repository::Storage;

use crate::Clock;
use crate::access_service::AccessService;
use crate::account_service::AccountService;
use crate::catalog_service::CatalogService;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;

/// Assembles the services the web layer needs over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    access: Arc<AccessService>,
    progress: Arc<ProgressService>,
    catalog: Arc<CatalogService>,
    accounts: Arc<AccountService>,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: &Storage, clock: Clock, session_ttl: Duration) -> Self {
        let access = Arc::new(AccessService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.grants),
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&access),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.progress),
        ));
        let catalog = Arc::new(CatalogService::new(
            clock,
            Arc::clone(&storage.categories),
            Arc::clone(&storage.lessons),
        ));
        let accounts = Arc::new(AccountService::new(
            clock,
            session_ttl,
            Arc::clone(&storage.users),
            Arc::clone(&storage.sessions),
        ));

        Self {
            access,
            progress,
            catalog,
            accounts,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        session_ttl: Duration,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, clock, session_ttl))
    }

    #[must_use]
    pub fn access(&self) -> Arc<AccessService> {
        Arc::clone(&self.access)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn accounts(&self) -> Arc<AccountService> {
        Arc::clone(&self.accounts)
    }
}
