//! Sync client
//!
//! Wires the stream session to the decode → store → dispatch pipeline and
//! exposes the read side to the application. One client per process,
//! constructed explicitly and handed to whoever needs it.

use geotrackr_clock::SystemClock;
use geotrackr_core::{LocationUpdate, ValidationError};
use geotrackr_ports::{Clock, DiagnosticKind, Diagnostics, Haptics, Notifier, SnapshotSource};
use geotrackr_session::{
    AckMode, Connection, ConnectionState, Delivery, HandlerError, MessageHandler, SessionConfig,
    SessionError, StompClient,
};
use geotrackr_transport::Connector;
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::buffer::DEFAULT_CAPACITY;
use crate::decoder::{DecodeError, DecoderSet, StreamEvent};
use crate::dispatcher::{NotificationDispatcher, RefreshCoordinator};
use crate::store::{Appended, ReconciliationStore, StoreHandle};
use crate::topics::Topics;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Invalid location update: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Failed to encode payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub session: SessionConfig,
    /// Capacity of each event buffer
    pub buffer_capacity: usize,
    /// Topics subscribed on start
    pub topics: Vec<String>,
    pub ack: AckMode,
    /// Refresh the polled asset list on this period, in addition to the
    /// refreshes triggered by positions
    pub poll_interval: Option<Duration>,
}

impl SyncConfig {
    pub fn new(session: SessionConfig) -> Self {
        Self {
            session,
            buffer_capacity: DEFAULT_CAPACITY,
            topics: Topics::defaults(),
            ack: AckMode::Auto,
            poll_interval: None,
        }
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = topics;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_ack(mut self, ack: AckMode) -> Self {
        self.ack = ack;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }
}

/// Decode, store and dispatch one inbound payload
pub struct Pipeline {
    decoders: DecoderSet,
    store: Arc<ReconciliationStore>,
    dispatcher: NotificationDispatcher,
    diagnostics: Diagnostics,
}

impl Pipeline {
    pub fn new(
        decoders: DecoderSet,
        store: Arc<ReconciliationStore>,
        dispatcher: NotificationDispatcher,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            decoders,
            store,
            dispatcher,
            diagnostics,
        }
    }

    /// Frames that fail decoding are reported and dropped; nothing else
    /// is touched.
    pub fn ingest(&self, topic: &str, body: &str) -> Result<(), DecodeError> {
        let event = match self.decoders.decode(topic, body) {
            Ok(event) => event,
            Err(e) => {
                self.diagnostics.emit(DiagnosticKind::Decode, topic, &e);
                return Err(e);
            }
        };

        match event {
            StreamEvent::Position(position) => {
                let received = self.store.append_position(position);
                self.dispatcher.on_position(&received);
            }
            StreamEvent::Crossing(crossing) => {
                if let Appended::New(received) = self.store.append_crossing(crossing) {
                    self.dispatcher.on_crossing(&received);
                }
            }
            StreamEvent::Status(status) => {
                debug!("Device status on {}: {:?}", topic, status);
            }
            StreamEvent::Notice(notice) => {
                self.dispatcher.on_notice(&notice);
            }
        }
        Ok(())
    }

    pub fn store(&self) -> &Arc<ReconciliationStore> {
        &self.store
    }
}

/// Feeds session deliveries into a shared [`Pipeline`]
struct PipelineHandler {
    pipeline: Arc<Pipeline>,
}

impl MessageHandler for PipelineHandler {
    fn handle(&mut self, delivery: &Delivery) -> Result<(), HandlerError> {
        self.pipeline
            .ingest(&delivery.topic, &delivery.body)
            .map_err(HandlerError::new)
    }
}

pub struct SyncClientBuilder {
    config: SyncConfig,
    connector: Arc<dyn Connector>,
    clock: Option<Arc<dyn Clock>>,
    notifier: Option<Arc<dyn Notifier>>,
    haptics: Option<Arc<dyn Haptics>>,
    snapshot_source: Option<Arc<dyn SnapshotSource>>,
    diagnostics: Option<Diagnostics>,
    decoders: Option<DecoderSet>,
}

impl SyncClientBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn haptics(mut self, haptics: Arc<dyn Haptics>) -> Self {
        self.haptics = Some(haptics);
        self
    }

    pub fn snapshot_source(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.snapshot_source = Some(source);
        self
    }

    pub fn diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn decoders(mut self, decoders: DecoderSet) -> Self {
        self.decoders = Some(decoders);
        self
    }

    /// Spawn the session task; must be called from within a tokio runtime
    pub fn build(self) -> SyncClient {
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        debug!("Stamping arrivals with {}", clock.name());
        let diagnostics = self.diagnostics.unwrap_or_default();
        let store = Arc::new(ReconciliationStore::with_capacity(
            self.config.buffer_capacity,
            clock.clone(),
        ));

        let refresh = self.snapshot_source.map(|source| {
            RefreshCoordinator::new(source, store.clone(), clock.clone(), diagnostics.clone())
        });

        let mut dispatcher = NotificationDispatcher::new(diagnostics.clone());
        if let Some(notifier) = self.notifier {
            dispatcher = dispatcher.with_notifier(notifier);
        }
        if let Some(haptics) = self.haptics {
            dispatcher = dispatcher.with_haptics(haptics);
        }
        if let Some(refresh) = &refresh {
            dispatcher = dispatcher.with_refresh(refresh.clone());
        }

        let pipeline = Arc::new(Pipeline::new(
            self.decoders.unwrap_or_default(),
            store.clone(),
            dispatcher,
            diagnostics.clone(),
        ));

        let session = StompClient::spawn(
            self.config.session.clone(),
            self.connector,
            clock,
            diagnostics.clone(),
        );

        SyncClient {
            config: self.config,
            session,
            pipeline,
            store: StoreHandle::new(store),
            refresh,
            diagnostics,
            poller: Mutex::new(None),
        }
    }
}

/// Live sync client
pub struct SyncClient {
    config: SyncConfig,
    session: StompClient,
    pipeline: Arc<Pipeline>,
    store: StoreHandle,
    refresh: Option<RefreshCoordinator>,
    diagnostics: Diagnostics,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl SyncClient {
    pub fn builder(config: SyncConfig, connector: Arc<dyn Connector>) -> SyncClientBuilder {
        SyncClientBuilder {
            config,
            connector,
            clock: None,
            notifier: None,
            haptics: None,
            snapshot_source: None,
            diagnostics: None,
            decoders: None,
        }
    }

    /// Subscribe every configured topic, connect and start polling
    ///
    /// Returns once the session task accepted the commands; connection
    /// progress is visible through [`connectivity`](Self::connectivity).
    pub async fn start(&self) -> Result<(), SyncError> {
        for topic in &self.config.topics {
            let handler = PipelineHandler {
                pipeline: self.pipeline.clone(),
            };
            self.session
                .subscribe_with_ack(topic.clone(), self.config.ack, handler)
                .await?;
        }
        self.session.connect().await?;
        self.start_poller();
        info!(
            "Sync client started with {} topics on {}",
            self.config.topics.len(),
            self.config.session.endpoint
        );
        Ok(())
    }

    fn start_poller(&self) {
        let (Some(period), Some(refresh)) = (self.config.poll_interval, self.refresh.clone())
        else {
            return;
        };

        let mut poller = self.poller.lock();
        if poller.is_some() {
            return;
        }
        *poller = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                refresh.request();
            }
        }));
    }

    /// Disconnect and stop polling; safe to call repeatedly
    pub async fn stop(&self) -> Result<(), SyncError> {
        if let Some(poller) = self.poller.lock().take() {
            poller.abort();
        }
        self.session.disconnect().await?;
        info!("Sync client stopped");
        Ok(())
    }

    /// Publish this client's own position
    ///
    /// Returns `false` when not connected; the update is not queued.
    pub async fn send_location(&self, update: &LocationUpdate) -> Result<bool, SyncError> {
        update.validate()?;
        let body = serde_json::to_string(update)?;
        Ok(self.session.publish(Topics::LOCATION_UPDATE, body).await)
    }

    /// Ask for a snapshot refresh; `false` if coalesced or no source is set
    pub fn request_refresh(&self) -> bool {
        self.refresh.as_ref().is_some_and(|r| r.request())
    }

    pub fn store(&self) -> StoreHandle {
        self.store.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn connection(&self) -> Connection {
        self.session.connection()
    }

    /// Connectivity indicator feed
    pub fn connectivity(&self) -> watch::Receiver<Connection> {
        self.session.watch_state()
    }

    pub async fn wait_for(&self, state: ConnectionState) -> Result<Connection, SyncError> {
        Ok(self.session.wait_for(state).await?)
    }

    pub fn diagnostics(&self) -> broadcast::Receiver<geotrackr_ports::Diagnostic> {
        self.diagnostics.subscribe()
    }

    pub fn session(&self) -> &StompClient {
        &self.session
    }
}

impl Drop for SyncClient {
    /// Stops the snapshot poller; the session task ends with its command channel
    fn drop(&mut self) {
        if let Some(poller) = self.poller.get_mut().take() {
            poller.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrackr_clock::ManualClock;
    use geotrackr_core::{CrossingType, wire_time};
    use geotrackr_ports::{DispatchError, Notification};

    #[derive(Default)]
    struct Recorder {
        notifications: Mutex<Vec<Notification>>,
    }

    impl Notifier for Recorder {
        fn notify(&self, notification: &Notification) -> Result<(), DispatchError> {
            self.notifications.lock().push(notification.clone());
            Ok(())
        }
    }

    fn pipeline(notifier: Arc<Recorder>, diagnostics: Diagnostics) -> Pipeline {
        let clock = Arc::new(ManualClock::starting_at(
            wire_time::parse("2024-05-01T10:00:00").unwrap(),
        ));
        let store = Arc::new(ReconciliationStore::new(clock));
        let dispatcher = NotificationDispatcher::new(diagnostics.clone()).with_notifier(notifier);
        Pipeline::new(DecoderSet::new(), store, dispatcher, diagnostics)
    }

    fn position_json(asset_id: u64, lat: f64) -> String {
        format!(
            r#"{{"assetId":{},"assetName":"Asset {}","assetType":"VEHICLE","latitude":{},"longitude":0.0,"timestamp":"2024-05-01T10:00:00"}}"#,
            asset_id, asset_id, lat
        )
    }

    fn crossing_json(event_id: u64, kind: &str) -> String {
        format!(
            r#"{{"eventId":{},"assetId":7,"assetName":"Truck 7","geofenceId":3,"geofenceName":"Depot","eventType":"{}","latitude":0.0,"longitude":0.0,"timestamp":"2024-05-01T10:00:00"}}"#,
            event_id, kind
        )
    }

    #[test]
    fn test_duplicate_crossing_notified_once() {
        let recorder = Arc::new(Recorder::default());
        let pipeline = pipeline(recorder.clone(), Diagnostics::default());

        pipeline.ingest(Topics::GEOFENCE_EVENTS, &crossing_json(31, "ENTER")).unwrap();
        pipeline.ingest(Topics::GEOFENCE_EVENTS, &crossing_json(31, "ENTER")).unwrap();
        pipeline.ingest(Topics::GEOFENCE_EVENTS, &crossing_json(32, "EXIT")).unwrap();

        let notifications = recorder.notifications.lock();
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[1].event_id, Some(32));
        assert_eq!(pipeline.store().stats().duplicates_dropped, 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_leaves_other_buffer_untouched() {
        let diagnostics = Diagnostics::default();
        let mut rx = diagnostics.subscribe();
        let pipeline = pipeline(Arc::new(Recorder::default()), diagnostics);

        pipeline.ingest(Topics::LOCATION_ALL, &position_json(7, 1.0)).unwrap();
        pipeline.ingest(Topics::GEOFENCE_EVENTS, &crossing_json(1, "ENTER")).unwrap();

        assert!(pipeline.ingest(Topics::GEOFENCE_EVENTS, "{\"eventId\":").is_err());
        assert!(pipeline.ingest(Topics::LOCATION_ALL, &position_json(7, 95.0)).is_err());

        let diagnostic = rx.recv().await.unwrap();
        assert_eq!(diagnostic.kind, DiagnosticKind::Decode);
        assert_eq!(diagnostic.context, Topics::GEOFENCE_EVENTS);

        let store = pipeline.store();
        assert_eq!(store.recent_positions(10).len(), 1);
        assert_eq!(store.recent_crossings(10).len(), 1);
        assert_eq!(store.latest_position(7).unwrap().event.latitude, 1.0);
    }

    #[test]
    fn test_notice_and_status_are_not_buffered() {
        let recorder = Arc::new(Recorder::default());
        let pipeline = pipeline(recorder.clone(), Diagnostics::default());

        pipeline
            .ingest(Topics::GPS_STATUS, r#"{"assetId":7,"status":"CONNECTED"}"#)
            .unwrap();
        pipeline
            .ingest(Topics::NOTIFICATIONS, r#"{"type":"INFO","title":"Hi","message":"there"}"#)
            .unwrap();

        assert_eq!(recorder.notifications.lock().len(), 1);
        let stats = pipeline.store().stats();
        assert_eq!(stats.positions_appended + stats.crossings_appended, 0);
    }

    #[test]
    fn test_crossing_kind_reaches_notifier() {
        let recorder = Arc::new(Recorder::default());
        let pipeline = pipeline(recorder.clone(), Diagnostics::default());
        pipeline
            .ingest(&Topics::asset_events(7), &crossing_json(5, "EXIT"))
            .unwrap();
        let recent = pipeline.store().recent_crossings(1);
        assert_eq!(recent[0].event.crossing_type, CrossingType::Exit);
        assert_eq!(recorder.notifications.lock()[0].title, "Zone exited");
    }
}
