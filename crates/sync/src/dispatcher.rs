//! Notification Dispatcher
//!
//! Reacts to newly appended events. Crossings become one notification each
//! (plus a vibration where the host has haptics); positions ask the polled
//! asset list to refresh. Failures are reported as diagnostics and never
//! reach the stream.

use geotrackr_core::{CrossingType, PositionEvent, Received, SystemNotice, ZoneCrossingEvent};
use geotrackr_ports::{
    Clock, DiagnosticKind, Diagnostics, HapticPattern, Haptics, Notification, NotificationKind,
    Notifier, SnapshotSource,
};
use log::{debug, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::store::ReconciliationStore;

/// Counters of a [`RefreshCoordinator`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub started: u64,
    /// Requests folded into a refresh already in flight
    pub coalesced: u64,
    pub failed: u64,
}

#[derive(Default)]
struct RefreshCounters {
    started: AtomicU64,
    coalesced: AtomicU64,
    failed: AtomicU64,
}

struct RefreshInner {
    source: Arc<dyn SnapshotSource>,
    store: Arc<ReconciliationStore>,
    clock: Arc<dyn Clock>,
    diagnostics: Diagnostics,
    in_flight: AtomicBool,
    counters: RefreshCounters,
}

/// Keeps at most one snapshot fetch in flight
///
/// Requests made while a fetch runs are coalesced into it, not queued.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<RefreshInner>,
}

impl RefreshCoordinator {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        store: Arc<ReconciliationStore>,
        clock: Arc<dyn Clock>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            inner: Arc::new(RefreshInner {
                source,
                store,
                clock,
                diagnostics,
                in_flight: AtomicBool::new(false),
                counters: RefreshCounters::default(),
            }),
        }
    }

    /// Start a fetch unless one is running
    ///
    /// Returns `true` when a new fetch was started. Must be called from
    /// within a tokio runtime.
    pub fn request(&self) -> bool {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!("Refresh already in flight, coalescing");
            return false;
        }

        self.inner.counters.started.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.clone();
        tokio::spawn(async move {
            match inner.source.fetch_assets().await {
                Ok(rows) => {
                    let arrived_at = inner.clock.now();
                    inner.store.merge_snapshot(&rows, arrived_at);
                }
                Err(e) => {
                    inner.counters.failed.fetch_add(1, Ordering::Relaxed);
                    inner
                        .diagnostics
                        .emit(DiagnosticKind::Refresh, "snapshot", e);
                }
            }
            inner.in_flight.store(false, Ordering::Release);
        });
        true
    }

    pub fn in_flight(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> RefreshStats {
        let c = &self.inner.counters;
        RefreshStats {
            started: c.started.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
        }
    }
}

pub struct NotificationDispatcher {
    notifier: Option<Arc<dyn Notifier>>,
    haptics: Option<Arc<dyn Haptics>>,
    refresh: Option<RefreshCoordinator>,
    diagnostics: Diagnostics,
}

impl NotificationDispatcher {
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self {
            notifier: None,
            haptics: None,
            refresh: None,
            diagnostics,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_haptics(mut self, haptics: Arc<dyn Haptics>) -> Self {
        self.haptics = Some(haptics);
        self
    }

    pub fn with_refresh(mut self, refresh: RefreshCoordinator) -> Self {
        self.refresh = Some(refresh);
        self
    }

    pub fn refresh(&self) -> Option<&RefreshCoordinator> {
        self.refresh.as_ref()
    }

    /// One notification and one vibration per new crossing
    pub fn on_crossing(&self, received: &Received<ZoneCrossingEvent>) {
        let event = &received.event;
        let (kind, title, pattern) = match event.crossing_type {
            CrossingType::Enter => (NotificationKind::ZoneEnter, "Zone entered", HapticPattern::Pulse),
            CrossingType::Exit => (NotificationKind::ZoneExit, "Zone exited", HapticPattern::DoublePulse),
        };

        let notification = Notification {
            kind,
            title: title.to_string(),
            body: event.describe(),
            asset_id: Some(event.asset_id),
            zone_id: Some(event.zone_id),
            event_id: Some(event.event_id),
            occurred_at: Some(event.timestamp),
        };
        info!("{}: {}", notification.title, notification.body);
        self.notify(&notification);

        if let Some(haptics) = &self.haptics
            && let Err(e) = haptics.vibrate(pattern)
        {
            self.diagnostics.emit(DiagnosticKind::Dispatch, "haptics", e);
        }
    }

    /// Positions only trigger a refresh of the polled asset list
    pub fn on_position(&self, _received: &Received<PositionEvent>) {
        if let Some(refresh) = &self.refresh {
            refresh.request();
        }
    }

    pub fn on_notice(&self, notice: &SystemNotice) {
        let notification = Notification {
            kind: NotificationKind::System,
            title: notice.title.clone(),
            body: notice.message.clone(),
            asset_id: None,
            zone_id: None,
            event_id: None,
            occurred_at: notice.timestamp,
        };
        self.notify(&notification);
    }

    fn notify(&self, notification: &Notification) {
        if let Some(notifier) = &self.notifier
            && let Err(e) = notifier.notify(notification)
        {
            self.diagnostics.emit(DiagnosticKind::Dispatch, "notifier", e);
        }
    }
}
