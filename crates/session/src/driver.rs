//! Session task
//!
//! One task owns the connection, the subscription registry and every timer.
//! It is driven by `select!` over client commands, the in-flight transport
//! open, transport events and the timers, so all state changes happen in
//! one place and in arrival order.

use futures_util::future::BoxFuture;
use geotrackr_ports::{Clock, DiagnosticKind, Diagnostics};
use geotrackr_transport::{Connector, TransportError, TransportEvent, TransportHandle};
use log::{debug, info, trace, warn};
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Sleep, sleep};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::frame::{Command, Frame, FrameParser, Incoming};
use crate::heartbeat::{HeartbeatSpec, Negotiated, negotiate};
use crate::state::{Connection, ConnectionState};
use crate::subscription::{AckMode, Delivery, MessageHandler, Registered, Registry};

type Timer = Option<Pin<Box<Sleep>>>;
type PendingOpen = Option<BoxFuture<'static, Result<TransportHandle, TransportError>>>;

pub(crate) enum SessionCommand {
    Connect,
    Disconnect {
        done: oneshot::Sender<()>,
    },
    Subscribe {
        topic: String,
        ack: AckMode,
        handler: Box<dyn MessageHandler>,
    },
    Unsubscribe {
        topic: String,
    },
    Publish {
        destination: String,
        content_type: String,
        body: String,
        sent: oneshot::Sender<bool>,
    },
}

fn timer(after: Duration) -> Timer {
    Some(Box::pin(sleep(after)))
}

async fn wait_timer(timer: &mut Timer) {
    match timer.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn wait_open(open: &mut PendingOpen) -> Result<TransportHandle, TransportError> {
    match open.as_mut() {
        Some(future) => future.await,
        None => pending().await,
    }
}

async fn next_event(transport: &mut Option<TransportHandle>) -> TransportEvent {
    match transport.as_mut() {
        Some(handle) => handle.recv().await,
        None => pending().await,
    }
}

struct Disconnecting {
    receipt: String,
    waiters: Vec<oneshot::Sender<()>>,
}

pub(crate) struct SessionDriver {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
    diagnostics: Diagnostics,
    commands: mpsc::Receiver<SessionCommand>,
    state: watch::Sender<Connection>,

    registry: Registry,
    transport: Option<TransportHandle>,
    parser: FrameParser,
    negotiated: Negotiated,
    disconnecting: Option<Disconnecting>,
    next_receipt: u64,

    opening: PendingOpen,
    handshake_deadline: Timer,
    reconnect_at: Timer,
    heartbeat_due: Timer,
    watchdog: Timer,
    disconnect_deadline: Timer,
}

impl SessionDriver {
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        clock: Arc<dyn Clock>,
        diagnostics: Diagnostics,
        commands: mpsc::Receiver<SessionCommand>,
        state: watch::Sender<Connection>,
    ) -> Self {
        Self {
            config,
            connector,
            clock,
            diagnostics,
            commands,
            state,
            registry: Registry::default(),
            transport: None,
            parser: FrameParser::new(),
            negotiated: Negotiated::default(),
            disconnecting: None,
            next_receipt: 0,
            opening: None,
            handshake_deadline: None,
            reconnect_at: None,
            heartbeat_due: None,
            watchdog: None,
            disconnect_deadline: None,
        }
    }

    /// Run until every client handle is dropped
    pub async fn run(mut self) {
        debug!("Session task started for {}", self.config.endpoint);
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd).await,
                    None => break,
                },
                opened = wait_open(&mut self.opening) => {
                    self.opening = None;
                    self.on_opened(opened).await;
                }
                event = next_event(&mut self.transport) => self.on_transport_event(event).await,
                _ = wait_timer(&mut self.handshake_deadline) => {
                    self.handshake_deadline = None;
                    self.fail(SessionError::HandshakeTimeout(self.config.handshake_timeout));
                }
                _ = wait_timer(&mut self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.begin_connect();
                }
                _ = wait_timer(&mut self.heartbeat_due) => self.send_heartbeat().await,
                _ = wait_timer(&mut self.watchdog) => {
                    self.watchdog = None;
                    let timeout = self.negotiated.incoming_timeout().unwrap_or_default();
                    self.fail(SessionError::HeartbeatTimeout(timeout));
                }
                _ = wait_timer(&mut self.disconnect_deadline) => {
                    debug!("No DISCONNECT receipt in time, closing anyway");
                    self.finish_disconnect();
                }
            }
        }
        self.cancel_all();
        debug!("Session task stopped");
    }

    fn current(&self) -> ConnectionState {
        self.state.borrow().state
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.current();
        if previous != next {
            info!("Session {} -> {}", previous, next);
        }
        self.state.send_modify(|c| c.state = next);
    }

    async fn on_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Connect => match self.current() {
                ConnectionState::Disconnected => self.begin_connect(),
                ConnectionState::Error => {
                    // Explicit reconnect skips the remaining backoff
                    self.reconnect_at = None;
                    self.begin_connect();
                }
                other => debug!("connect() ignored while {}", other),
            },
            SessionCommand::Disconnect { done } => self.disconnect(done).await,
            SessionCommand::Subscribe {
                topic,
                ack,
                handler,
            } => {
                let change = self.registry.insert(topic.clone(), ack, handler);
                debug!("Subscription {} ({:?})", topic, change);
                if !self.current().is_connected() {
                    return;
                }
                let Some(sub) = self.registry.get(&topic) else {
                    return;
                };
                let frames = match change {
                    Registered::New => vec![sub.subscribe_frame()],
                    Registered::HandlerReplaced => Vec::new(),
                    Registered::AckChanged => vec![sub.unsubscribe_frame(), sub.subscribe_frame()],
                };
                for frame in frames {
                    if !self.send_frame(frame).await {
                        break;
                    }
                }
            }
            SessionCommand::Unsubscribe { topic } => {
                if let Some(sub) = self.registry.remove(&topic) {
                    debug!("Unsubscribed {}", topic);
                    if self.current().is_connected() {
                        self.send_frame(sub.unsubscribe_frame()).await;
                    }
                }
            }
            SessionCommand::Publish {
                destination,
                content_type,
                body,
                sent,
            } => {
                let state = self.current();
                let ok = if state.is_connected() {
                    let frame = Frame::new(Command::Send)
                        .with_header("destination", destination)
                        .with_header("content-type", content_type)
                        .with_body(body);
                    self.send_frame(frame).await
                } else {
                    self.diagnostics.emit(
                        DiagnosticKind::PublishRejected,
                        destination,
                        format!("not connected ({})", state),
                    );
                    false
                };
                let _ = sent.send(ok);
            }
        }
    }

    fn begin_connect(&mut self) {
        self.set_state(ConnectionState::Connecting);
        self.parser.reset();

        let connector = self.connector.clone();
        let endpoint = self.config.endpoint.clone();
        debug!("Opening {} transport to {}", connector.name(), endpoint);
        self.opening = Some(Box::pin(async move { connector.open(&endpoint).await }));
        self.handshake_deadline = timer(self.config.handshake_timeout);
    }

    async fn on_opened(&mut self, opened: Result<TransportHandle, TransportError>) {
        let handle = match opened {
            Ok(handle) => handle,
            Err(e) => {
                self.fail(e.into());
                return;
            }
        };

        let kind = handle.kind();
        self.transport = Some(handle);
        self.state.send_modify(|c| c.transport = Some(kind));
        debug!("Transport open over {}, sending CONNECT", kind);

        let connect = self.config.connect_frame();
        self.send_frame(connect).await;
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => {
                if let Some(timeout) = self.negotiated.incoming_timeout()
                    && self.watchdog.is_some()
                {
                    self.watchdog = timer(timeout);
                }
                let items = match self.parser.push(&text) {
                    Ok(items) => items,
                    Err(e) => {
                        self.fail(e.into());
                        return;
                    }
                };
                for item in items {
                    match item {
                        Incoming::Heartbeat => trace!("<<< heart-beat"),
                        Incoming::Frame(frame) => self.on_frame(frame).await,
                    }
                    if self.transport.is_none() {
                        break;
                    }
                }
            }
            TransportEvent::Error(reason) => {
                if self.disconnecting.is_some() {
                    self.finish_disconnect();
                } else {
                    self.fail(TransportError::Connection(reason).into());
                }
            }
            TransportEvent::Closed { code, reason } => {
                if self.disconnecting.is_some() {
                    self.finish_disconnect();
                } else {
                    let code = code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string());
                    self.fail(SessionError::Closed(format!("{} {}", code, reason)));
                }
            }
        }
    }

    async fn on_frame(&mut self, frame: Frame) {
        debug!("<<< {}", frame.command);
        match frame.command {
            Command::Connected if self.current() == ConnectionState::Connecting => {
                self.on_connected(&frame).await;
            }
            Command::Message => self.on_message(frame).await,
            Command::Receipt => {
                let receipt = frame.header("receipt-id");
                let matches = self
                    .disconnecting
                    .as_ref()
                    .is_some_and(|d| Some(d.receipt.as_str()) == receipt);
                if matches {
                    self.finish_disconnect();
                } else {
                    debug!("Ignoring receipt {:?}", receipt);
                }
            }
            Command::Error => {
                let message = frame.header("message").unwrap_or("no message").to_string();
                let detail = if frame.body.is_empty() {
                    message
                } else {
                    format!("{}: {}", message, frame.body.trim())
                };
                if self.disconnecting.is_some() {
                    self.finish_disconnect();
                } else {
                    self.fail(SessionError::Server(detail));
                }
            }
            other => {
                if self.disconnecting.is_none() {
                    self.fail(SessionError::Unexpected(format!("{} while {}", other, self.current())));
                }
            }
        }
    }

    async fn on_connected(&mut self, frame: &Frame) {
        let server = match frame.header("heart-beat").map(HeartbeatSpec::parse) {
            Some(Ok(spec)) => spec,
            Some(Err(e)) => {
                warn!("{}, heart-beats disabled", e);
                HeartbeatSpec::default()
            }
            None => HeartbeatSpec::default(),
        };
        self.negotiated = negotiate(self.config.heartbeat_spec(), server);
        self.handshake_deadline = None;
        self.heartbeat_due = self.negotiated.outgoing.and_then(timer);
        self.watchdog = self.negotiated.incoming_timeout().and_then(timer);

        let now = self.clock.now();
        self.state.send_modify(|c| {
            c.retry_count = 0;
            c.last_error = None;
            c.connected_at = Some(now);
        });
        self.set_state(ConnectionState::Connected);
        info!(
            "Connected to {} (version {}, heart-beat out {:?} in {:?})",
            self.config.endpoint,
            frame.header("version").unwrap_or("1.0"),
            self.negotiated.outgoing,
            self.negotiated.incoming
        );

        let frames: Vec<Frame> = self.registry.iter().map(|s| s.subscribe_frame()).collect();
        let count = frames.len();
        for frame in frames {
            if !self.send_frame(frame).await {
                return;
            }
        }
        if count > 0 {
            info!("Subscribed to {} topic(s)", count);
        }
    }

    async fn on_message(&mut self, frame: Frame) {
        let Some(sub) = self
            .registry
            .route(frame.header("subscription"), frame.header("destination"))
        else {
            debug!(
                "No subscription for message on {:?}",
                frame.header("destination")
            );
            return;
        };

        let ack = sub.ack;
        let delivery = Delivery::from_frame(frame, sub.topic.clone(), sub.id.clone());
        let result = sub.handler.handle(&delivery);
        if let Err(e) = &result {
            debug!("Handler for {} rejected message: {}", delivery.topic, e);
        }

        if ack == AckMode::Auto {
            return;
        }
        let Some(ack_id) = delivery.ack_id else {
            warn!("Message on {} has no ack header", delivery.topic);
            return;
        };
        let command = if result.is_ok() {
            Command::Ack
        } else {
            Command::Nack
        };
        self.send_frame(Frame::new(command).with_header("id", ack_id))
            .await;
    }

    async fn send_heartbeat(&mut self) {
        self.heartbeat_due = self.negotiated.outgoing.and_then(timer);
        let Some(transport) = &self.transport else {
            return;
        };
        trace!(">>> heart-beat");
        let result = transport.send("\n".to_string()).await;
        if let Err(e) = result {
            self.fail(e.into());
        }
    }

    /// Send one frame; on failure the connection is failed and false returned
    async fn send_frame(&mut self, frame: Frame) -> bool {
        let Some(transport) = &self.transport else {
            return false;
        };
        debug!(">>> {}", frame.command);
        let result = transport.send(frame.encode()).await;
        match result {
            Ok(()) => true,
            Err(e) => {
                self.fail(e.into());
                false
            }
        }
    }

    async fn disconnect(&mut self, done: oneshot::Sender<()>) {
        if let Some(disconnecting) = &mut self.disconnecting {
            disconnecting.waiters.push(done);
            return;
        }

        match self.current() {
            ConnectionState::Disconnected => {
                let _ = done.send(());
            }
            ConnectionState::Connected => {
                self.cancel_timers();
                self.set_state(ConnectionState::Disconnecting);

                let receipt = format!("disconnect-{}", self.next_receipt);
                self.next_receipt += 1;
                self.disconnecting = Some(Disconnecting {
                    receipt: receipt.clone(),
                    waiters: vec![done],
                });
                let frame = Frame::new(Command::Disconnect).with_header("receipt", receipt);
                if self.send_frame(frame).await {
                    self.disconnect_deadline = timer(self.config.disconnect_timeout);
                } else {
                    self.finish_disconnect();
                }
            }
            _ => {
                self.set_state(ConnectionState::Disconnecting);
                self.disconnecting = Some(Disconnecting {
                    receipt: String::new(),
                    waiters: vec![done],
                });
                self.finish_disconnect();
            }
        }
    }

    fn finish_disconnect(&mut self) {
        self.cancel_all();
        self.state.send_modify(|c| {
            c.connected_at = None;
            c.transport = None;
        });
        self.set_state(ConnectionState::Disconnected);
        if let Some(disconnecting) = self.disconnecting.take() {
            for waiter in disconnecting.waiters {
                let _ = waiter.send(());
            }
        }
    }

    /// Tear the connection down, record why and schedule a reconnect
    fn fail(&mut self, error: SessionError) {
        if self.disconnecting.is_some() {
            self.finish_disconnect();
            return;
        }
        if matches!(
            self.current(),
            ConnectionState::Disconnected | ConnectionState::Error
        ) {
            return;
        }

        let kind = match &error {
            SessionError::Transport(_) | SessionError::Closed(_) => DiagnosticKind::Transport,
            _ => DiagnosticKind::Protocol,
        };
        self.diagnostics.emit(kind, "session", &error);
        self.cancel_all();

        let retry_count = self.state.borrow().retry_count + 1;
        let delay = self.config.reconnect.delay(retry_count);
        self.state.send_modify(|c| {
            c.last_error = Some(error.to_string());
            c.retry_count = retry_count;
            c.connected_at = None;
            c.transport = None;
        });
        self.set_state(ConnectionState::Error);

        warn!("Reconnecting in {:?} (attempt {})", delay, retry_count);
        self.reconnect_at = timer(delay);
    }

    fn cancel_timers(&mut self) {
        self.handshake_deadline = None;
        self.reconnect_at = None;
        self.heartbeat_due = None;
        self.watchdog = None;
        self.disconnect_deadline = None;
    }

    /// Drop the transport, any in-flight open and every timer
    fn cancel_all(&mut self) {
        self.cancel_timers();
        self.opening = None;
        self.transport = None;
        self.parser.reset();
        self.negotiated = Negotiated::default();
    }
}
