//! Plumbing shared by the domain services

use std::sync::Arc;

use finsync_core::{AuthInterceptor, CacheReconciler, HttpRequest};
use finsync_domain::{Result, SdkConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::runtime::{CallbackQueue, WorkerPool};

/// Everything a service needs besides its own repository.
#[derive(Clone)]
pub struct ServiceContext {
    pub(crate) config: Arc<SdkConfig>,
    pub(crate) interceptor: Arc<AuthInterceptor>,
    pub(crate) reconciler: Arc<CacheReconciler>,
    pub(crate) workers: WorkerPool,
    pub(crate) callbacks: CallbackQueue,
}

impl ServiceContext {
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = HttpRequest::get(self.config.url(path));
        self.interceptor.execute(request).await?.json()
    }

    pub(crate) async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let request = HttpRequest::put(self.config.url(path)).with_json_body(body)?;
        self.interceptor.execute(request).await?.json()
    }
}
