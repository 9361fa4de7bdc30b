//! Primary transport with a fallback
//!
//! The websocket upgrade is attempted first. If it fails or does not finish
//! within the upgrade timeout, the fallback transport is opened instead.

use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::connector::{Connector, TransportHandle};
use crate::error::TransportError;
use crate::streaming::XhrStreamingConnector;
use crate::websocket::WebSocketConnector;

pub struct FallbackConnector {
    primary: Arc<dyn Connector>,
    fallback: Arc<dyn Connector>,
    upgrade_timeout: Duration,
}

impl FallbackConnector {
    pub fn new(
        primary: Arc<dyn Connector>,
        fallback: Arc<dyn Connector>,
        upgrade_timeout: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            upgrade_timeout,
        }
    }

    /// WebSocket first, then xhr-streaming
    pub fn sockjs(upgrade_timeout: Duration) -> Self {
        Self::new(
            Arc::new(WebSocketConnector::new(upgrade_timeout)),
            Arc::new(XhrStreamingConnector::new(upgrade_timeout)),
            upgrade_timeout,
        )
    }
}

#[async_trait]
impl Connector for FallbackConnector {
    async fn open(&self, endpoint: &Url) -> Result<TransportHandle, TransportError> {
        let primary = match timeout(self.upgrade_timeout, self.primary.open(endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.upgrade_timeout)),
        };

        match primary {
            Ok(handle) => Ok(handle),
            Err(e) => {
                warn!(
                    "{} unavailable ({}), falling back to {}",
                    self.primary.name(),
                    e,
                    self.fallback.name()
                );
                let handle = self.fallback.open(endpoint).await?;
                info!("Connected over {}", handle.kind());
                Ok(handle)
            }
        }
    }

    fn name(&self) -> &str {
        "sockjs"
    }
}
