//! Event Ingestion Adapters.
//!
//! Each adapter owns exactly one platform stream and translates its raw
//! callback into `Observation`s. Adapters never touch timestamps: the
//! platform value is passed through unmodified.

use tracing::{debug, warn};

use super::event::{
    MutationType, RawConsoleMessage, RawEvent, RawEventTiming, RawIntersection, RawLayoutShift, RawLongFrame,
    RawMutationRecord, RawPaintCandidate,
};
use super::observation::{
    Capabilities, ConsoleEntry, InteractionTiming, LayoutShift, LongFrame, Mutation, Observation,
    ObservationKind, PaintCandidate, Payload, ScriptAttribution, ShiftSource, VisibilityChange,
};
use super::resolver::SubtreeResolver;

pub trait Adapter {
    type Raw;
    const KIND: ObservationKind;

    fn translate(&self, raw: Self::Raw, resolver: &mut SubtreeResolver) -> Vec<Observation>;
}

pub struct LayoutShiftAdapter;
pub struct PaintCandidateAdapter;
pub struct EventTimingAdapter;
pub struct MutationAdapter;
pub struct LongFrameAdapter;
pub struct IntersectionAdapter;
pub struct ConsoleAdapter;

impl Adapter for LayoutShiftAdapter {
    type Raw = RawLayoutShift;
    const KIND: ObservationKind = ObservationKind::LayoutShift;

    fn translate(&self, raw: RawLayoutShift, resolver: &mut SubtreeResolver) -> Vec<Observation> {
        let sources = raw.sources.map(|sources| {
            sources
                .into_iter()
                .map(|s| ShiftSource {
                    subtree_id: s.node.as_ref().map(|n| resolver.resolve(n)),
                    previous: s.previous_rect,
                    current: s.current_rect,
                })
                .collect::<Vec<_>>()
        });

        if sources.is_none() {
            debug!("layout shift at {} carries no sources, attribution skipped", raw.start_time);
        }

        // The first attributed source stands for the whole shift.
        let subtree_id = sources
            .as_ref()
            .and_then(|s| s.iter().find_map(|src| src.subtree_id.clone()));

        vec![Observation::new(
            raw.start_time,
            subtree_id,
            Payload::LayoutShift(LayoutShift {
                value: raw.value,
                had_recent_input: raw.had_recent_input,
                sources,
            }),
        )]
    }
}

impl Adapter for PaintCandidateAdapter {
    type Raw = RawPaintCandidate;
    const KIND: ObservationKind = ObservationKind::PaintCandidate;

    fn translate(&self, raw: RawPaintCandidate, resolver: &mut SubtreeResolver) -> Vec<Observation> {
        // Cross-origin images report a zero render time; the load time is the fallback.
        let render_time = if raw.render_time > 0.0 {
            raw.render_time
        } else if raw.load_time > 0.0 {
            raw.load_time
        } else {
            raw.start_time
        };

        vec![Observation::new(
            raw.start_time,
            None,
            Payload::PaintCandidate(PaintCandidate {
                render_time,
                size: raw.size,
                element: raw.element.as_ref().map(|n| resolver.resolve(n)),
                url: raw.url,
            }),
        )]
    }
}

impl Adapter for EventTimingAdapter {
    type Raw = RawEventTiming;
    const KIND: ObservationKind = ObservationKind::InteractionTiming;

    fn translate(&self, raw: RawEventTiming, resolver: &mut SubtreeResolver) -> Vec<Observation> {
        vec![Observation::new(
            raw.start_time,
            raw.target.as_ref().map(|n| resolver.resolve(n)),
            Payload::InteractionTiming(InteractionTiming {
                name: raw.name,
                start_time: raw.start_time,
                processing_start: raw.processing_start,
                processing_end: raw.processing_end,
                duration: raw.duration,
                interaction_id: raw.interaction_id,
            }),
        )]
    }
}

impl Adapter for MutationAdapter {
    type Raw = RawMutationRecord;
    const KIND: ObservationKind = ObservationKind::Mutation;

    fn translate(&self, raw: RawMutationRecord, resolver: &mut SubtreeResolver) -> Vec<Observation> {
        let subtree_id = resolver.resolve(&raw.target);
        for node in &raw.removed_nodes {
            resolver.forget(node);
        }

        let attribute_changed = match raw.mutation_type {
            MutationType::Attributes => 1,
            _ => 0,
        };

        vec![Observation::new(
            raw.time,
            Some(subtree_id),
            Payload::Mutation(Mutation {
                added: raw.added_nodes.len() as u32,
                removed: raw.removed_nodes.len() as u32,
                attribute_changed,
            }),
        )]
    }
}

impl Adapter for LongFrameAdapter {
    type Raw = RawLongFrame;
    const KIND: ObservationKind = ObservationKind::LongFrame;

    fn translate(&self, raw: RawLongFrame, _resolver: &mut SubtreeResolver) -> Vec<Observation> {
        let scripts = raw
            .scripts
            .into_iter()
            .map(|s| ScriptAttribution {
                source_url: s.source_url,
                invoker: s.invoker,
                duration: s.duration,
            })
            .collect();

        vec![Observation::new(
            raw.start_time,
            None,
            Payload::LongFrame(LongFrame {
                duration: raw.duration,
                blocking_duration: raw.blocking_duration,
                scripts,
            }),
        )]
    }
}

impl Adapter for IntersectionAdapter {
    type Raw = RawIntersection;
    const KIND: ObservationKind = ObservationKind::VisibilityChange;

    fn translate(&self, raw: RawIntersection, resolver: &mut SubtreeResolver) -> Vec<Observation> {
        let element_id = resolver.resolve(&raw.target);
        // Edge-adjacent targets report isIntersecting with a zero ratio and vice versa;
        // only a positive ratio on an intersecting entry counts as visible.
        let ratio = if raw.is_intersecting && raw.intersection_ratio.is_finite() {
            raw.intersection_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };

        vec![Observation::new(
            raw.time,
            Some(element_id.clone()),
            Payload::VisibilityChange(VisibilityChange {
                element_id,
                node: Some(raw.target.handle),
                ratio,
            }),
        )]
    }
}

impl Adapter for ConsoleAdapter {
    type Raw = RawConsoleMessage;
    const KIND: ObservationKind = ObservationKind::ConsoleEntry;

    fn translate(&self, raw: RawConsoleMessage, _resolver: &mut SubtreeResolver) -> Vec<Observation> {
        vec![Observation::new(
            raw.time,
            None,
            Payload::ConsoleEntry(ConsoleEntry {
                level: raw.level,
                text: raw.text,
            }),
        )]
    }
}

/// The adapters registered for one session, keyed by the platform's capabilities.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    capabilities: Capabilities,
}

impl AdapterRegistry {
    pub fn register(capabilities: Capabilities) -> Self {
        for kind in ObservationKind::ALL {
            if !capabilities.contains(kind) {
                debug!("no adapter registered for {:?}", kind);
            }
        }
        Self { capabilities }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Routes a raw callback to its adapter.
    /// Returns `None` when the stream has no registered adapter.
    pub fn dispatch(&self, raw: RawEvent, resolver: &mut SubtreeResolver) -> Option<Vec<Observation>> {
        match raw {
            RawEvent::LayoutShift(r) => self.run(&LayoutShiftAdapter, r, resolver),
            RawEvent::PaintCandidate(r) => self.run(&PaintCandidateAdapter, r, resolver),
            RawEvent::EventTiming(r) => self.run(&EventTimingAdapter, r, resolver),
            RawEvent::Mutation(r) => self.run(&MutationAdapter, r, resolver),
            RawEvent::LongFrame(r) => self.run(&LongFrameAdapter, r, resolver),
            RawEvent::Intersection(r) => self.run(&IntersectionAdapter, r, resolver),
            RawEvent::Console(r) => self.run(&ConsoleAdapter, r, resolver),
        }
    }

    fn run<A: Adapter>(&self, adapter: &A, raw: A::Raw, resolver: &mut SubtreeResolver) -> Option<Vec<Observation>> {
        if !self.capabilities.contains(A::KIND) {
            return None;
        }
        let observations = adapter.translate(raw, resolver);
        if observations.iter().any(|o| !o.timestamp.is_finite()) {
            warn!("{:?} adapter produced a non-finite timestamp", A::KIND);
        }
        Some(observations)
    }
}
