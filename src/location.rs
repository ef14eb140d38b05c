//! Position sources feeding the trigger engine.
//!
//! A source pushes [`PositionUpdate`]s into a `crossbeam_channel::Sender` handed
//! over at subscription time. `None` means the fix was lost. The engine owns the
//! receiving end and drains it on the host's thread, so updates are always
//! processed one at a time and in order.

use crate::error::{GeoSonicError, Result};
use crate::geo::Coordinate;
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// A position fix, or `None` when the signal was lost.
pub type PositionUpdate = Option<Coordinate>;

/// Handle returned by [`PositionSource::subscribe`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

/// Push-based stream of position fixes.
///
/// Implementations wrap the platform location service. Permission and
/// service-availability problems are reported from `subscribe` as
/// [`GeoSonicError::PermissionDenied`] / [`GeoSonicError::ServicesDisabled`].
pub trait PositionSource {
    /// Starts delivering updates into `sender`.
    fn subscribe(&mut self, sender: Sender<PositionUpdate>) -> Result<SubscriptionId>;

    /// Stops delivering updates for `id`. Unknown ids are ignored.
    fn unsubscribe(&mut self, id: SubscriptionId) -> Result<()>;

    /// Most recent fix, if any was ever received.
    fn last_known(&self) -> Option<Coordinate>;

    /// Whether the source is currently tracking.
    fn is_active(&self) -> bool;

    /// Releases platform resources. Called once from engine cleanup.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

struct ManualSourceState {
    subscribers: HashMap<SubscriptionId, Sender<PositionUpdate>>,
    last_known: Option<Coordinate>,
    permission_granted: bool,
    services_enabled: bool,
    subscribe_calls: usize,
}

/// In-process position source driven by [`ManualPositionSource::push`].
///
/// Clones share state, so a host can hand one clone to the engine and keep
/// another to forward fixes from its platform callback (or a simulated walk).
#[derive(Clone)]
pub struct ManualPositionSource {
    state: Arc<Mutex<ManualSourceState>>,
}

impl Default for ManualPositionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualPositionSource {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualSourceState {
                subscribers: HashMap::new(),
                last_known: None,
                permission_granted: true,
                services_enabled: true,
                subscribe_calls: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, ManualSourceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers an update to every subscriber. A `Some` fix also becomes the
    /// last known position; signal loss keeps the previous one.
    pub fn push(&self, update: PositionUpdate) {
        let mut state = self.state();
        if let Some(position) = update {
            state.last_known = Some(position);
        }
        state.subscribers.retain(|id, sender| {
            let delivered = sender.send(update).is_ok();
            if !delivered {
                log::debug!("Dropping disconnected subscriber {}", id);
            }
            delivered
        });
    }

    pub fn set_last_known(&self, position: Option<Coordinate>) {
        self.state().last_known = position;
    }

    pub fn set_permission_granted(&self, granted: bool) {
        self.state().permission_granted = granted;
    }

    pub fn set_services_enabled(&self, enabled: bool) {
        self.state().services_enabled = enabled;
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    /// Total successful `subscribe` calls over the lifetime of the source.
    pub fn subscribe_calls(&self) -> usize {
        self.state().subscribe_calls
    }
}

impl PositionSource for ManualPositionSource {
    fn subscribe(&mut self, sender: Sender<PositionUpdate>) -> Result<SubscriptionId> {
        let mut state = self.state();
        if !state.permission_granted {
            return Err(GeoSonicError::PermissionDenied(
                "Location permission not granted".into(),
            ));
        }
        if !state.services_enabled {
            return Err(GeoSonicError::ServicesDisabled(
                "Location services are turned off".into(),
            ));
        }

        let id = SubscriptionId::new();
        state.subscribers.insert(id, sender);
        state.subscribe_calls += 1;
        log::debug!("Position subscriber {} added", id);
        Ok(id)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> Result<()> {
        if self.state().subscribers.remove(&id).is_some() {
            log::debug!("Position subscriber {} removed", id);
        }
        Ok(())
    }

    fn last_known(&self) -> Option<Coordinate> {
        self.state().last_known
    }

    fn is_active(&self) -> bool {
        !self.state().subscribers.is_empty()
    }

    fn release(&mut self) -> Result<()> {
        self.state().subscribers.clear();
        Ok(())
    }
}
