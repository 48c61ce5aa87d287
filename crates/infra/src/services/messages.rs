//! Message inbox service
//!
//! Two scopes are kept in sync: every message, and the unread subset. A
//! refresh of the unread scope never deletes read messages.

use std::sync::Arc;

use finsync_core::CacheRepository;
use finsync_domain::constants::CATEGORY_UNREAD;
use finsync_domain::{
    CacheEvent, CacheRecord, Message, MessageResponse, ReconcileReport, ReconciliationScope,
    RecordId, Result,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use super::context::ServiceContext;
use crate::runtime::Completion;

/// Which messages an operation covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFilter {
    #[default]
    All,
    Unread,
}

impl MessageFilter {
    #[must_use]
    pub fn scope(self) -> ReconciliationScope {
        match self {
            Self::All => ReconciliationScope::of::<Message>(),
            Self::Unread => ReconciliationScope::of::<Message>().in_category(CATEGORY_UNREAD),
        }
    }
}

#[derive(Serialize)]
struct ReadStateUpdate {
    read: bool,
}

#[derive(Clone)]
pub struct MessageService {
    context: ServiceContext,
    repository: Arc<dyn CacheRepository<Message>>,
}

impl MessageService {
    pub(crate) fn new(context: ServiceContext, repository: Arc<dyn CacheRepository<Message>>) -> Self {
        Self { context, repository }
    }

    /// Cached messages matching `filter`, ordered by id. No network call.
    pub async fn fetch_messages(&self, filter: MessageFilter) -> Result<Vec<Message>> {
        self.repository.select_where(&filter.scope()).await
    }

    /// Number of cached unread messages.
    pub async fn unread_count(&self) -> Result<usize> {
        Ok(self.repository.select_ids_where(&MessageFilter::Unread.scope()).await?.len())
    }

    /// Download the messages matching `filter` and reconcile them into the
    /// cache.
    ///
    /// Messages with a content type this SDK cannot decode are skipped.
    #[instrument(skip(self))]
    pub async fn refresh_messages(&self, filter: MessageFilter) -> Result<ReconcileReport> {
        let base = &self.context.config.server.endpoints.messages;
        let path = match filter {
            MessageFilter::All => base.clone(),
            MessageFilter::Unread => format!("{base}?status={CATEGORY_UNREAD}"),
        };
        let page: Vec<MessageResponse> = self.context.get_json(&path).await?;
        self.context
            .reconciler
            .reconcile(self.repository.as_ref(), &filter.scope(), page, MessageResponse::into_message)
            .await
    }

    /// [`MessageService::refresh_messages`] on the worker pool, with the
    /// outcome delivered through the callback queue.
    pub fn refresh_messages_with(
        &self,
        filter: MessageFilter,
        completion: Completion<ReconcileReport>,
    ) -> JoinHandle<Option<()>> {
        let service = self.clone();
        self.context.workers.spawn_with_completion(
            async move { service.refresh_messages(filter).await },
            &self.context.callbacks,
            completion,
        )
    }

    /// Set the read state of one message on the server and in the cache.
    #[instrument(skip(self))]
    pub async fn mark_read(&self, id: RecordId, read: bool) -> Result<Message> {
        let path = format!("{}/{id}", self.context.config.server.endpoints.messages);
        let response: MessageResponse =
            self.context.put_json(&path, &ReadStateUpdate { read }).await?;
        let message = response.into_message()?;

        self.repository.upsert(&message).await?;
        info!(id, read, "message read state updated");
        self.context
            .reconciler
            .publish(CacheEvent::Updated { entity: Message::ENTITY.to_string(), id: message.id });
        Ok(message)
    }
}
