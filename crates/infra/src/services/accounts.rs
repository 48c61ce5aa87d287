//! Linked account service

use std::sync::Arc;

use finsync_core::CacheRepository;
use finsync_domain::{
    Account, AccountResponse, CacheEvent, CacheRecord, ReconcileReport, ReconciliationScope,
    RecordId, Result,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use super::context::ServiceContext;
use crate::runtime::Completion;

#[derive(Serialize)]
struct VisibilityUpdate {
    hidden: bool,
}

#[derive(Clone)]
pub struct AccountService {
    context: ServiceContext,
    repository: Arc<dyn CacheRepository<Account>>,
}

impl AccountService {
    pub(crate) fn new(context: ServiceContext, repository: Arc<dyn CacheRepository<Account>>) -> Self {
        Self { context, repository }
    }

    pub async fn fetch_accounts(&self) -> Result<Vec<Account>> {
        self.repository.select_where(&ReconciliationScope::of::<Account>()).await
    }

    #[instrument(skip(self))]
    pub async fn refresh_accounts(&self) -> Result<ReconcileReport> {
        let page: Vec<AccountResponse> =
            self.context.get_json(&self.context.config.server.endpoints.accounts).await?;
        self.context
            .reconciler
            .reconcile(
                self.repository.as_ref(),
                &ReconciliationScope::of::<Account>(),
                page,
                |account| Ok(Account::from(account)),
            )
            .await
    }

    pub fn refresh_accounts_with(&self, completion: Completion<ReconcileReport>) -> JoinHandle<Option<()>> {
        let service = self.clone();
        self.context.workers.spawn_with_completion(
            async move { service.refresh_accounts().await },
            &self.context.callbacks,
            completion,
        )
    }

    /// Hide or show an account.
    #[instrument(skip(self))]
    pub async fn set_hidden(&self, id: RecordId, hidden: bool) -> Result<Account> {
        let path = format!("{}/{id}", self.context.config.server.endpoints.accounts);
        let response: AccountResponse =
            self.context.put_json(&path, &VisibilityUpdate { hidden }).await?;
        let account = Account::from(response);

        self.repository.upsert(&account).await?;
        info!(id, hidden, "account visibility updated");
        self.context
            .reconciler
            .publish(CacheEvent::Updated { entity: Account::ENTITY.to_string(), id: account.id });
        Ok(account)
    }
}
