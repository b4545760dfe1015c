use pagescope::kernel::config::EngineConfig;
use pagescope::kernel::event::{RawEvent, RawLongFrame, RawMutationRecord, MutationType, RawNode};
use pagescope::kernel::metrics::MetricSnapshot;
use pagescope::kernel::observation::{Capabilities, Observation, ObservationKind};
use pagescope::kernel::session::{Lifecycle, LifecycleRequest, SessionController, SessionState};

#[test]
fn test_lifecycle_transitions() {
    use LifecycleRequest::*;
    use SessionState::*;

    assert_eq!(Lifecycle::transition(Idle, Start), Some(Collecting));
    assert_eq!(Lifecycle::transition(Collecting, Harvest), Some(Harvested));
    assert_eq!(Lifecycle::transition(Harvested, Harvest), Some(Harvested));
    assert_eq!(Lifecycle::transition(Harvested, Start), Some(Collecting));
    assert_eq!(Lifecycle::transition(Collecting, Reset), Some(Idle));
    assert_eq!(Lifecycle::transition(Idle, Harvest), None);
}

#[test]
fn test_harvest_before_start_is_empty() {
    let mut controller = SessionController::default();
    assert_eq!(controller.state(), SessionState::Idle);

    let snapshot = controller.harvest(1000.0);
    assert_eq!(snapshot, MetricSnapshot::empty());
    assert_eq!(controller.state(), SessionState::Idle, "Harvest without a session changes nothing");
}

#[test]
fn test_repeated_harvest_is_identical() {
    // 1. Collect a mixed log
    let mut controller = SessionController::default();
    controller.start(Capabilities::all());
    controller.record(Observation::layout_shift(50.0, 0.03, false));
    controller.record(Observation::long_frame(100.0, 90.0));
    controller.record(Observation::mutation(120.0, "#feed", 2, 0, 0));
    controller.record(Observation::visibility(10.0, "#hero", 1.0));
    controller.record(Observation::interaction(300.0, 310.0, 350.0, 80.0, 4));

    // 2. Harvest twice, the second time later
    let first = controller.harvest(5000.0);
    let second = controller.harvest(9000.0);

    // 3. The second harvest reuses the frozen time and log
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap(),
        "Harvest must be idempotent"
    );
    assert_eq!(second.duration_ms, 5000.0);
    assert_eq!(controller.session().unwrap().harvested_at(), Some(5000.0));
}

#[test]
fn test_log_frozen_after_harvest() {
    let mut controller = SessionController::default();
    controller.start(Capabilities::all());
    controller.record(Observation::mutation(10.0, "#a", 1, 0, 0));
    controller.harvest(100.0);

    assert_eq!(controller.state(), SessionState::Harvested);
    assert!(!controller.record(Observation::mutation(20.0, "#a", 1, 0, 0)));
    let ingested = controller.ingest(RawEvent::LongFrame(RawLongFrame {
        start_time: 30.0,
        duration: 100.0,
        blocking_duration: None,
        scripts: vec![],
    }));
    assert_eq!(ingested, 0);
    controller.track_element("#late");

    let session = controller.session().unwrap();
    assert_eq!(session.observations().len(), 1);
    assert!(session.tracked().is_empty());
}

#[test]
fn test_reset_discards_session() {
    let mut controller = SessionController::default();
    controller.start(Capabilities::all());
    controller.record(Observation::mutation(10.0, "#a", 1, 0, 0));
    controller.reset();

    assert_eq!(controller.state(), SessionState::Idle);
    assert!(controller.session().is_none());
    assert_eq!(controller.harvest(100.0), MetricSnapshot::empty());
}

#[test]
fn test_restart_begins_fresh_session() {
    let mut controller = SessionController::default();
    let first = controller.start(Capabilities::all());
    controller.record(Observation::mutation(10.0, "#a", 1, 0, 0));
    controller.harvest(100.0);

    let second = controller.start(Capabilities::all());
    assert_ne!(first, second);
    assert_eq!(controller.state(), SessionState::Collecting);
    let session = controller.session().unwrap();
    assert!(session.observations().is_empty());
    assert_eq!(session.harvested_at(), None);
}

#[test]
fn test_sequence_follows_arrival() {
    let mut controller = SessionController::default();
    controller.start(Capabilities::all());
    controller.record(Observation::mutation(300.0, "#a", 1, 0, 0));
    controller.record(Observation::mutation(100.0, "#b", 1, 0, 0));
    controller.record(Observation::mutation(200.0, "#c", 1, 0, 0));

    let seqs: Vec<u64> = controller.session().unwrap().observations().iter().map(|o| o.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
}

#[test]
fn test_resolver_cache_scoped_to_session() {
    let mut controller = SessionController::default();
    controller.start(Capabilities::all());
    controller.ingest(RawEvent::Mutation(RawMutationRecord {
        time: 5.0,
        mutation_type: MutationType::ChildList,
        target: RawNode::new(9, "ul").with_id("feed"),
        added_nodes: vec![],
        removed_nodes: vec![],
        attribute_name: None,
    }));
    assert_eq!(controller.session().unwrap().resolver().cached_len(), 1);

    controller.start(Capabilities::all());
    assert_eq!(controller.session().unwrap().resolver().cached_len(), 0);
}

#[test]
fn test_configured_test_attribute() {
    let config = EngineConfig::from_json_str(r#"{"testAttribute": "data-qa", "resolverMaxDepth": 2}"#)
        .expect("Partial config should parse");
    assert_eq!(config.dwell_floor_ms, 1000.0, "Unspecified fields keep defaults");

    let mut controller = SessionController::new(config);
    controller.start(Capabilities::all());
    let node = RawNode::new(1, "button").with_attribute("data-qa", "buy");
    assert_eq!(controller.track_node(&node).as_deref(), Some("[data-qa=\"buy\"]"));
}

#[test]
fn test_correlation_accessors() {
    let mut controller = SessionController::default();
    assert!(controller.frame_correlations().is_empty());

    controller.start(Capabilities::all());
    controller.record(Observation::long_frame(0.0, 100.0));
    controller.record(Observation::mutation(50.0, "#feed", 1, 0, 0));
    controller.record(Observation::visibility(70.0, "#cta", 1.0));

    let frames = controller.frame_correlations();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].dominant_subtree_id.as_deref(), Some("#feed"));
    assert!(controller.shift_correlations().is_empty());
    assert_eq!(controller.visibility_correlations().len(), 1);
    assert!(controller.visibility_correlations()[0].contributors.is_empty());
}

#[test]
fn test_capabilities_recorded_on_session() {
    let mut controller = SessionController::default();
    controller.start(Capabilities::none().with(ObservationKind::Mutation));

    let caps = controller.session().unwrap().capabilities();
    assert!(caps.contains(ObservationKind::Mutation));
    assert_eq!(caps.iter().count(), 1);
}
