//! Public handle to a STOMP session

use geotrackr_ports::{Clock, Diagnostics};
use geotrackr_transport::Connector;
use log::warn;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::SessionConfig;
use crate::driver::{SessionCommand, SessionDriver};
use crate::error::{Result, SessionError};
use crate::state::{Connection, ConnectionState};
use crate::subscription::{AckMode, MessageHandler};

/// Handle to one session task; cheap to clone
///
/// The task stops once every handle is dropped.
#[derive(Clone)]
pub struct StompClient {
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<Connection>,
}

impl StompClient {
    /// Spawn the session task; starts `DISCONNECTED`
    pub fn spawn(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        clock: Arc<dyn Clock>,
        diagnostics: Diagnostics,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (state_tx, state_rx) = watch::channel(Connection::new(config.endpoint.clone()));

        let driver = SessionDriver::new(config, connector, clock, diagnostics, cmd_rx, state_tx);
        tokio::spawn(driver.run());

        Self {
            commands: cmd_tx,
            state: state_rx,
        }
    }

    async fn send(&self, cmd: SessionCommand) -> Result<()> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| SessionError::Stopped)
    }

    /// Start connecting; progress is visible through [`watch_state`](Self::watch_state)
    pub async fn connect(&self) -> Result<()> {
        self.send(SessionCommand::Connect).await
    }

    /// Close the connection and cancel every timer
    ///
    /// Resolves once `DISCONNECTED`. Calling it when already disconnected is
    /// a no-op.
    pub async fn disconnect(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(SessionCommand::Disconnect { done: done_tx }).await?;
        done_rx.await.map_err(|_| SessionError::Stopped)
    }

    /// Register a handler for `topic`, replacing any previous one
    ///
    /// Subscriptions survive reconnects and are re-sent after each handshake.
    pub async fn subscribe(
        &self,
        topic: impl Into<String>,
        handler: impl MessageHandler,
    ) -> Result<()> {
        self.subscribe_with_ack(topic, AckMode::Auto, handler).await
    }

    pub async fn subscribe_with_ack(
        &self,
        topic: impl Into<String>,
        ack: AckMode,
        handler: impl MessageHandler,
    ) -> Result<()> {
        self.send(SessionCommand::Subscribe {
            topic: topic.into(),
            ack,
            handler: Box::new(handler),
        })
        .await
    }

    pub async fn unsubscribe(&self, topic: impl Into<String>) -> Result<()> {
        self.send(SessionCommand::Unsubscribe {
            topic: topic.into(),
        })
        .await
    }

    /// Send a JSON body to `destination`
    ///
    /// Only delivered while `CONNECTED`; otherwise nothing is sent, a warning
    /// is logged and `false` returned.
    pub async fn publish(&self, destination: impl Into<String>, body: impl Into<String>) -> bool {
        self.publish_with_type(destination, "application/json", body)
            .await
    }

    pub async fn publish_with_type(
        &self,
        destination: impl Into<String>,
        content_type: impl Into<String>,
        body: impl Into<String>,
    ) -> bool {
        let destination = destination.into();
        let (sent_tx, sent_rx) = oneshot::channel();
        let cmd = SessionCommand::Publish {
            destination: destination.clone(),
            content_type: content_type.into(),
            body: body.into(),
            sent: sent_tx,
        };
        if self.send(cmd).await.is_err() {
            warn!("Session stopped, dropping publish to {}", destination);
            return false;
        }
        sent_rx.await.unwrap_or(false)
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().state
    }

    pub fn connection(&self) -> Connection {
        self.state.borrow().clone()
    }

    /// Follow connection changes (connectivity indicator)
    pub fn watch_state(&self) -> watch::Receiver<Connection> {
        self.state.clone()
    }

    /// Wait until the connection reaches `state`
    pub async fn wait_for(&self, state: ConnectionState) -> Result<Connection> {
        let mut rx = self.state.clone();
        let connection = rx
            .wait_for(|c| c.state == state)
            .await
            .map_err(|_| SessionError::Stopped)?;
        Ok(connection.clone())
    }
}
