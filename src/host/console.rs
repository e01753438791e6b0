//! Console host - logs every action, for running without a DAW

use crate::host::{Host, SurfaceAction};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// ConsoleHost logs resolved actions instead of applying them
pub struct ConsoleHost {
    name: String,
    initialized: Arc<RwLock<bool>>,
    execution_count: Arc<RwLock<u64>>,
}

impl ConsoleHost {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initialized: Arc::new(RwLock::new(false)),
            execution_count: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn execution_count(&self) -> u64 {
        *self.execution_count.read().await
    }
}

#[async_trait]
impl Host for ConsoleHost {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<()> {
        *self.initialized.write().await = true;
        *self.execution_count.write().await = 0;
        info!("ConsoleHost '{}' initialized", self.name);
        Ok(())
    }

    async fn execute(&self, action: &SurfaceAction) -> Result<()> {
        if !*self.initialized.read().await {
            warn!("ConsoleHost '{}' not initialized, skipping {}", self.name, action.name());
            return Ok(());
        }

        let mut count = self.execution_count.write().await;
        *count += 1;
        let exec_num = *count;
        drop(count);

        let payload = serde_json::to_string(action)?;
        info!(
            "[{}] {} → {} [exec #{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            self.name,
            payload,
            exec_num
        );
        debug!(host = self.name, action = action.name(), exec_count = exec_num, "ConsoleHost execution");

        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if *self.initialized.read().await {
            info!(
                "ConsoleHost '{}' shutting down (executed {} actions)",
                self.name,
                self.execution_count().await
            );
        }
        *self.initialized.write().await = false;
        Ok(())
    }
}
