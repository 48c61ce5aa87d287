//! Savings goal service, scoped per account

use std::sync::Arc;

use finsync_core::CacheRepository;
use finsync_domain::{
    CacheEvent, CacheRecord, Goal, GoalResponse, GoalUpdate, ReconcileReport,
    ReconciliationScope, RecordId, Result,
};
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use super::context::ServiceContext;
use crate::runtime::Completion;

fn scope(account_id: Option<i64>) -> ReconciliationScope {
    let scope = ReconciliationScope::of::<Goal>();
    match account_id {
        Some(account_id) => scope.for_account(account_id),
        None => scope,
    }
}

#[derive(Clone)]
pub struct GoalService {
    context: ServiceContext,
    repository: Arc<dyn CacheRepository<Goal>>,
}

impl GoalService {
    pub(crate) fn new(context: ServiceContext, repository: Arc<dyn CacheRepository<Goal>>) -> Self {
        Self { context, repository }
    }

    /// Cached goals, of one account or of all accounts.
    pub async fn fetch_goals(&self, account_id: Option<i64>) -> Result<Vec<Goal>> {
        self.repository.select_where(&scope(account_id)).await
    }

    /// Download goals and reconcile them into the cache. Refreshing one
    /// account leaves the goals of other accounts untouched.
    #[instrument(skip(self))]
    pub async fn refresh_goals(&self, account_id: Option<i64>) -> Result<ReconcileReport> {
        let base = &self.context.config.server.endpoints.goals;
        let path = match account_id {
            Some(account_id) => format!("{base}?account_id={account_id}"),
            None => base.clone(),
        };
        let page: Vec<GoalResponse> = self.context.get_json(&path).await?;
        self.context
            .reconciler
            .reconcile(self.repository.as_ref(), &scope(account_id), page, |goal| Ok(Goal::from(goal)))
            .await
    }

    /// [`GoalService::refresh_goals`] on the worker pool, with the outcome
    /// delivered through the callback queue.
    pub fn refresh_goals_with(
        &self,
        account_id: Option<i64>,
        completion: Completion<ReconcileReport>,
    ) -> JoinHandle<Option<()>> {
        let service = self.clone();
        self.context.workers.spawn_with_completion(
            async move { service.refresh_goals(account_id).await },
            &self.context.callbacks,
            completion,
        )
    }

    /// Apply `update` on the server and cache the returned goal.
    #[instrument(skip(self, update))]
    pub async fn update_goal(&self, id: RecordId, update: &GoalUpdate) -> Result<Goal> {
        let path = format!("{}/{id}", self.context.config.server.endpoints.goals);
        let response: GoalResponse = self.context.put_json(&path, update).await?;
        let goal = Goal::from(response);

        self.repository.upsert(&goal).await?;
        info!(id, "goal updated");
        self.context
            .reconciler
            .publish(CacheEvent::Updated { entity: Goal::ENTITY.to_string(), id: goal.id });
        Ok(goal)
    }
}
