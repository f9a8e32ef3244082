use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::services::KeyManager;

#[derive(Debug, Default)]
struct Inner {
    sizes: HashMap<(String, String), i64>,
    failing: bool,
    calls: usize,
}

/// Key manager answering from a fixed table of plain sizes.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyManager {
    inner: Arc<Mutex<Inner>>,
}

impl StaticKeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, node_uuid: &str, owner: &str, plain_size: i64) {
        self.inner
            .lock()
            .sizes
            .insert((node_uuid.to_string(), owner.to_string()), plain_size);
    }

    /// Make every later call fail as an unreachable service would
    pub fn fail(&self) {
        self.inner.lock().failing = true;
    }

    pub fn calls(&self) -> usize {
        self.inner.lock().calls
    }
}

#[async_trait]
impl KeyManager for StaticKeyManager {
    async fn plain_size(&self, node_uuid: &str, owner: &str) -> Result<i64> {
        let mut inner = self.inner.lock();
        inner.calls += 1;
        if inner.failing {
            return Err(Error::key_manager(anyhow::anyhow!(
                "key manager unavailable"
            )));
        }
        inner
            .sizes
            .get(&(node_uuid.to_string(), owner.to_string()))
            .copied()
            .ok_or_else(|| {
                Error::NotFound(format!("plain size of {} for {}", node_uuid, owner))
            })
    }
}
