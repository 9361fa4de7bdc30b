//! Reconciliation Store
//!
//! Holds what the stream has delivered and merges it with the polled asset
//! list:
//! - a bounded buffer of position events and one of zone crossings
//! - the latest position per asset (last arrival wins)
//! - the reconciled view per asset, recomputed on every write
//!
//! Ordering is by local arrival only. Event timestamps and crossing ids are
//! carried along but never used to decide which value is newer.
//!
//! Writers take the lock briefly and never across an `.await`; readers get
//! clones of a fully applied state.

use geotrackr_core::{
    AssetId, AssetKind, AssetSnapshot, EventId, PositionEvent, Received, Timestamp,
    ZoneCrossingEvent,
};
use geotrackr_ports::Clock;
use log::debug;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::buffer::{DEFAULT_CAPACITY, EventBuffer};

/// Result of appending an event that may be a replay
#[derive(Debug, Clone, PartialEq)]
pub enum Appended<T> {
    New(T),
    /// Already buffered; nothing changed
    Duplicate,
}

impl<T> Appended<T> {
    pub fn is_new(&self) -> bool {
        matches!(self, Appended::New(_))
    }
}

/// Where the current position of a reconciled asset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Stream,
    Snapshot,
}

/// Current view of one asset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledAssetState {
    pub asset_id: AssetId,
    pub name: String,
    pub kind: AssetKind,
    /// `None` until the asset reported a position
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Timestamp carried by the winning record
    pub reported_at: Option<Timestamp>,
    /// Local arrival of the winning record
    pub arrived_at: Timestamp,
    pub source: Source,
    pub active: bool,
}

impl ReconciledAssetState {
    fn from_stream(received: &Received<PositionEvent>, active: bool) -> Self {
        let event = &received.event;
        Self {
            asset_id: event.asset_id,
            name: event.asset_name.clone(),
            kind: event.asset_type,
            latitude: Some(event.latitude),
            longitude: Some(event.longitude),
            reported_at: Some(event.timestamp),
            arrived_at: received.arrived_at,
            source: Source::Stream,
            active,
        }
    }

    fn from_snapshot(row: &AssetSnapshot, arrived_at: Timestamp) -> Self {
        Self {
            asset_id: row.id,
            name: row.name.clone(),
            kind: row.kind,
            latitude: row.current_latitude,
            longitude: row.current_longitude,
            reported_at: row.last_update,
            arrived_at,
            source: Source::Snapshot,
            active: row.active,
        }
    }
}

/// Counters since the store was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub positions_appended: u64,
    pub crossings_appended: u64,
    pub duplicates_dropped: u64,
    /// Entries pushed out of either buffer
    pub evictions: u64,
    pub snapshots_merged: u64,
}

struct StoreState {
    positions: EventBuffer<Received<PositionEvent>>,
    crossings: EventBuffer<Received<ZoneCrossingEvent>>,
    /// Ids currently in `crossings`
    crossing_ids: HashSet<EventId>,
    latest: HashMap<AssetId, Received<PositionEvent>>,
    reconciled: HashMap<AssetId, ReconciledAssetState>,
    next_sequence: u64,
    stats: StoreStats,
}

impl StoreState {
    fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }
}

pub struct ReconciliationStore {
    state: RwLock<StoreState>,
    clock: Arc<dyn Clock>,
}

impl ReconciliationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, clock)
    }

    pub fn with_capacity(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(StoreState {
                positions: EventBuffer::new(capacity),
                crossings: EventBuffer::new(capacity),
                crossing_ids: HashSet::new(),
                latest: HashMap::new(),
                reconciled: HashMap::new(),
                next_sequence: 0,
                stats: StoreStats::default(),
            }),
            clock,
        }
    }

    /// Stamp and append a position, replacing the asset's latest
    pub fn append_position(&self, event: PositionEvent) -> Received<PositionEvent> {
        let mut state = self.state.write();
        let sequence = state.next_sequence();
        let received = Received::new(event, self.clock.now(), sequence);
        let asset_id = received.event.asset_id;

        if state.positions.push(received.clone()).is_some() {
            state.stats.evictions += 1;
        }
        state.latest.insert(asset_id, received.clone());
        state.stats.positions_appended += 1;

        // A newer stream position always supersedes an older stream one. It
        // only supersedes a snapshot that arrived strictly earlier.
        let active = state.reconciled.get(&asset_id).map(|r| r.active);
        let supersedes = match state.reconciled.get(&asset_id) {
            None => true,
            Some(current) => match current.source {
                Source::Stream => true,
                Source::Snapshot => received.arrived_at > current.arrived_at,
            },
        };
        if supersedes {
            let view = ReconciledAssetState::from_stream(&received, active.unwrap_or(true));
            state.reconciled.insert(asset_id, view);
        }

        received
    }

    /// Stamp and append a crossing unless its id is already buffered
    pub fn append_crossing(&self, event: ZoneCrossingEvent) -> Appended<Received<ZoneCrossingEvent>> {
        let mut state = self.state.write();
        if state.crossing_ids.contains(&event.event_id) {
            state.stats.duplicates_dropped += 1;
            debug!("Dropping replayed crossing {}", event.event_id);
            return Appended::Duplicate;
        }

        let sequence = state.next_sequence();
        let received = Received::new(event, self.clock.now(), sequence);

        state.crossing_ids.insert(received.event.event_id);
        if let Some(evicted) = state.crossings.push(received.clone()) {
            state.crossing_ids.remove(&evicted.event.event_id);
            state.stats.evictions += 1;
        }
        state.stats.crossings_appended += 1;

        Appended::New(received)
    }

    /// Merge a polled asset list that arrived at `arrived_at`
    ///
    /// A row replaces the current position unless a stream position arrived
    /// strictly later; on equal arrival the snapshot wins. The `active` flag
    /// always follows the snapshot.
    pub fn merge_snapshot(&self, rows: &[AssetSnapshot], arrived_at: Timestamp) {
        let mut state = self.state.write();
        for row in rows {
            let stale = state
                .reconciled
                .get(&row.id)
                .is_some_and(|current| current.arrived_at > arrived_at);
            if stale {
                if let Some(current) = state.reconciled.get_mut(&row.id) {
                    current.active = row.active;
                }
            } else {
                state
                    .reconciled
                    .insert(row.id, ReconciledAssetState::from_snapshot(row, arrived_at));
            }
        }
        state.stats.snapshots_merged += 1;
        debug!("Merged snapshot of {} assets", rows.len());
    }

    pub fn latest_positions(&self) -> HashMap<AssetId, Received<PositionEvent>> {
        self.state.read().latest.clone()
    }

    pub fn latest_position(&self, asset_id: AssetId) -> Option<Received<PositionEvent>> {
        self.state.read().latest.get(&asset_id).cloned()
    }

    /// The last `limit` crossings, oldest first
    pub fn recent_crossings(&self, limit: usize) -> Vec<Received<ZoneCrossingEvent>> {
        self.state.read().crossings.recent(limit).cloned().collect()
    }

    /// The last `limit` positions, oldest first
    pub fn recent_positions(&self, limit: usize) -> Vec<Received<PositionEvent>> {
        self.state.read().positions.recent(limit).cloned().collect()
    }

    /// Every known asset, ordered by id
    pub fn reconciled(&self) -> Vec<ReconciledAssetState> {
        let mut assets: Vec<_> = self.state.read().reconciled.values().cloned().collect();
        assets.sort_by_key(|a| a.asset_id);
        assets
    }

    pub fn reconciled_asset(&self, asset_id: AssetId) -> Option<ReconciledAssetState> {
        self.state.read().reconciled.get(&asset_id).cloned()
    }

    pub fn stats(&self) -> StoreStats {
        self.state.read().stats
    }
}

/// Read-only view of a shared store, cheap to clone
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<ReconciliationStore>,
}

impl StoreHandle {
    pub fn new(store: Arc<ReconciliationStore>) -> Self {
        Self { store }
    }

    pub fn latest_positions(&self) -> HashMap<AssetId, Received<PositionEvent>> {
        self.store.latest_positions()
    }

    pub fn latest_position(&self, asset_id: AssetId) -> Option<Received<PositionEvent>> {
        self.store.latest_position(asset_id)
    }

    pub fn recent_crossings(&self, limit: usize) -> Vec<Received<ZoneCrossingEvent>> {
        self.store.recent_crossings(limit)
    }

    pub fn recent_positions(&self, limit: usize) -> Vec<Received<PositionEvent>> {
        self.store.recent_positions(limit)
    }

    pub fn reconciled(&self) -> Vec<ReconciledAssetState> {
        self.store.reconciled()
    }

    pub fn reconciled_asset(&self, asset_id: AssetId) -> Option<ReconciledAssetState> {
        self.store.reconciled_asset(asset_id)
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }
}
