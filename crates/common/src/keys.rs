use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::OnceCell;

use crate::error::Result;
use crate::services::KeyManager;

type Connect = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn KeyManager>>> + Send + Sync>;

/// Key manager that connects to the real service on first use.
///
/// Concurrent first calls share one connection attempt; a failed attempt
///  leaves the cell empty so the next call tries again.
pub struct LazyKeyManager {
    cell: OnceCell<Arc<dyn KeyManager>>,
    connect: Connect,
}

impl LazyKeyManager {
    pub fn new<F, Fut>(connect: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn KeyManager>>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            connect: Box::new(move || Box::pin(connect())),
        }
    }

    async fn client(&self) -> Result<&Arc<dyn KeyManager>> {
        self.cell
            .get_or_try_init(|| {
                tracing::debug!("connecting to key manager");
                (self.connect)()
            })
            .await
    }

    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }
}

impl fmt::Debug for LazyKeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyKeyManager")
            .field("connected", &self.cell.initialized())
            .finish()
    }
}

#[async_trait]
impl KeyManager for LazyKeyManager {
    async fn plain_size(&self, node_uuid: &str, owner: &str) -> Result<i64> {
        self.client().await?.plain_size(node_uuid, owner).await
    }
}
