//! Session lifecycle: `Idle -> Collecting -> Harvested`.
//!
//! # OWNERSHIP INVARIANT
//! The observation log belongs to exactly one `Session` and is only appended
//! to while that session is `Collecting`. After harvest it is frozen and may
//! be shared read-only; `reset` drops it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::EngineConfig;
use super::correlator::{Correlation, Correlator, LongFrameMutations, Matcher, ShiftMutations, VisibilityShifts};
use super::event::{RawEvent, RawNode};
use super::ingest::AdapterRegistry;
use super::metrics::contrast::ColorSample;
use super::metrics::{compute_snapshot, HarvestInput, MetricSnapshot};
use super::observation::{Capabilities, Observation};
use super::resolver::SubtreeResolver;
use super::time::Timestamp;

pub type SessionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Collecting,
    Harvested,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleRequest {
    Start,
    Harvest,
    Reset,
}

pub struct Lifecycle;

impl Lifecycle {
    /// Pure function: (Current State, Request) -> New State.
    /// `None` means the request is not a transition and the state is kept.
    pub fn transition(current: SessionState, request: LifecycleRequest) -> Option<SessionState> {
        use LifecycleRequest::*;
        use SessionState::*;

        match (current, request) {
            (_, Start) => Some(Collecting),
            (Collecting, Harvest) => Some(Harvested),
            (Harvested, Harvest) => Some(Harvested),
            (_, Reset) => Some(Idle),
            (Idle, Harvest) => None,
        }
    }
}

/// One page's worth of collected observations.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    adapters: AdapterRegistry,
    log: Vec<Observation>,
    resolver: SubtreeResolver,
    tracked: BTreeSet<String>,
    color_samples: Vec<ColorSample>,
    next_seq: u64,
    harvested_at: Option<Timestamp>,
}

impl Session {
    fn new(capabilities: Capabilities, config: &EngineConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            adapters: AdapterRegistry::register(capabilities),
            log: Vec::new(),
            resolver: SubtreeResolver::new(&config.test_attribute, config.resolver_max_depth),
            tracked: BTreeSet::new(),
            color_samples: Vec::new(),
            next_seq: 0,
            harvested_at: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.adapters.capabilities()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.log
    }

    pub fn tracked(&self) -> &BTreeSet<String> {
        &self.tracked
    }

    pub fn color_samples(&self) -> &[ColorSample] {
        &self.color_samples
    }

    pub fn resolver(&self) -> &SubtreeResolver {
        &self.resolver
    }

    pub fn harvested_at(&self) -> Option<Timestamp> {
        self.harvested_at
    }

    fn append(&mut self, mut observation: Observation) {
        observation.seq = self.next_seq;
        self.next_seq += 1;
        self.log.push(observation);
    }
}

/// Owns the current session and enforces its lifecycle for the driver.
#[derive(Debug, Default)]
pub struct SessionController {
    state: SessionState,
    session: Option<Session>,
    config: EngineConfig,
}

impl SessionController {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            state: SessionState::Idle,
            session: None,
            config,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Begins a fresh session, discarding any previous one.
    pub fn start(&mut self, capabilities: Capabilities) -> SessionId {
        if self.state == SessionState::Collecting {
            warn!("start() while collecting; previous session discarded");
        }
        let session = Session::new(capabilities, &self.config);
        let id = session.id;
        info!(session = %id, "Session collecting");
        self.session = Some(session);
        self.state = Lifecycle::transition(self.state, LifecycleRequest::Start).unwrap_or(SessionState::Collecting);
        id
    }

    fn collecting(&mut self) -> Option<&mut Session> {
        if self.state != SessionState::Collecting {
            debug!("ignoring input while {:?}", self.state);
            return None;
        }
        self.session.as_mut()
    }

    /// Runs a raw platform callback through its adapter.
    /// Returns how many observations were appended.
    pub fn ingest(&mut self, raw: RawEvent) -> usize {
        let Some(session) = self.collecting() else {
            return 0;
        };
        let kind = raw.kind();
        match session.adapters.dispatch(raw, &mut session.resolver) {
            Some(observations) => {
                let count = observations.len();
                for observation in observations {
                    session.append(observation);
                }
                count
            }
            None => {
                debug!("{:?} stream not registered, callback dropped", kind);
                0
            }
        }
    }

    /// Appends an already-normalized observation.
    pub fn record(&mut self, observation: Observation) -> bool {
        match self.collecting() {
            Some(session) => {
                session.append(observation);
                true
            }
            None => false,
        }
    }

    /// Registers an element for dwell tracking by its resolved label.
    pub fn track_element(&mut self, element_id: &str) {
        if let Some(session) = self.collecting() {
            session.tracked.insert(element_id.to_string());
        }
    }

    /// Resolves `node` and registers it for dwell tracking.
    pub fn track_node(&mut self, node: &RawNode) -> Option<String> {
        let session = self.collecting()?;
        let element_id = session.resolver.resolve(node);
        session.tracked.insert(element_id.clone());
        Some(element_id)
    }

    pub fn sample_colors(&mut self, sample: ColorSample) {
        if let Some(session) = self.collecting() {
            session.color_samples.push(sample);
        }
    }

    /// Freezes the session and computes its snapshot.
    ///
    /// The first harvest fixes the harvest time; later calls recompute from
    /// the same frozen log and time, so repeated harvests are identical.
    /// Harvesting with no session yields `MetricSnapshot::empty()`.
    pub fn harvest(&mut self, now: Timestamp) -> MetricSnapshot {
        let Some(next) = Lifecycle::transition(self.state, LifecycleRequest::Harvest) else {
            warn!("harvest() before start(); returning empty snapshot");
            return MetricSnapshot::empty();
        };
        let Some(session) = self.session.as_mut() else {
            return MetricSnapshot::empty();
        };

        let harvest_time = *session.harvested_at.get_or_insert(now);
        self.state = next;

        let snapshot = compute_snapshot(&HarvestInput {
            log: &session.log,
            capabilities: session.adapters.capabilities(),
            tracked: &session.tracked,
            color_samples: &session.color_samples,
            harvest_time,
            config: &self.config,
        });
        info!(
            session = %session.id,
            observations = snapshot.observation_count,
            "Session harvested at {}",
            harvest_time
        );
        snapshot
    }

    pub fn reset(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(session = %session.id, "Session discarded");
        }
        self.state = Lifecycle::transition(self.state, LifecycleRequest::Reset).unwrap_or(SessionState::Idle);
    }

    /// Long frames paired with the mutations inside them.
    pub fn frame_correlations(&self) -> Vec<Correlation> {
        self.correlate_with(&LongFrameMutations)
    }

    /// Attributed layout shifts paired with mutations of their source subtrees.
    pub fn shift_correlations(&self) -> Vec<Correlation> {
        self.correlate_with(&ShiftMutations)
    }

    /// Visibility transitions paired with layout shifts at the same instant.
    pub fn visibility_correlations(&self) -> Vec<Correlation> {
        self.correlate_with(&VisibilityShifts)
    }

    fn correlate_with<M: Matcher>(&self, matcher: &M) -> Vec<Correlation> {
        match &self.session {
            Some(session) => Correlator::new(self.config.epsilon_ms).correlate_log(&session.log, matcher),
            None => Vec::new(),
        }
    }
}
