use pagescope::kernel::metrics::frames::blocking_time;
use pagescope::kernel::metrics::interaction::{breakdown, p98_index, percentile_98};
use pagescope::kernel::metrics::layout::cumulative_layout_shift;
use pagescope::kernel::metrics::{Measured, MetricSnapshot};
use pagescope::kernel::observation::{
    Capabilities, LayoutShift, LongFrame, Observation, ObservationKind, PaintCandidate, Payload,
};
use pagescope::kernel::session::SessionController;

fn harvest(capabilities: Capabilities, log: Vec<Observation>, now: f64) -> MetricSnapshot {
    let mut controller = SessionController::default();
    controller.start(capabilities);
    for obs in log {
        assert!(controller.record(obs), "Recording while collecting must succeed");
    }
    controller.harvest(now)
}

fn shift(value: f64, had_recent_input: bool) -> LayoutShift {
    LayoutShift {
        value,
        had_recent_input,
        sources: None,
    }
}

fn paint(ts: f64, render_time: f64, size: f64) -> Observation {
    Observation::new(
        ts,
        None,
        Payload::PaintCandidate(PaintCandidate {
            render_time,
            size,
            element: None,
            url: None,
        }),
    )
}

#[test]
fn test_cls_scenario() {
    // 1. Three shifts without input, one right after a click
    let log = vec![
        Observation::layout_shift(100.0, 0.02, false),
        Observation::layout_shift(300.0, 0.05, false),
        Observation::layout_shift(650.0, 0.4, true),
        Observation::layout_shift(800.0, 0.03, false),
    ];

    // 2. Harvest
    let snapshot = harvest(Capabilities::all(), log, 1000.0);

    // 3. Verify
    let layout = snapshot.layout.value().expect("Layout measured");
    assert_eq!(layout.cls, 0.1, "CLS should be exactly 0.1");
    assert_eq!(layout.shift_count, 3);
    assert_eq!(layout.excluded_shift_count, 1, "Shift after input must not count");
    assert_eq!(snapshot.cls(), Some(0.1));
}

#[test]
fn test_cls_independent_of_order() {
    let values = [0.013, 0.2, 0.07, 0.0001, 0.05];
    let baseline = cumulative_layout_shift(values.iter().map(|v| shift(*v, false)).collect::<Vec<_>>().iter());

    let orders: [[usize; 5]; 4] = [[4, 3, 2, 1, 0], [2, 0, 4, 1, 3], [1, 4, 0, 3, 2], [3, 1, 2, 4, 0]];
    for order in orders {
        let shifts: Vec<LayoutShift> = order.iter().map(|&i| shift(values[i], false)).collect();
        assert_eq!(
            cumulative_layout_shift(shifts.iter()),
            baseline,
            "Order {:?} changed the total",
            order
        );
    }
    assert_eq!(baseline, 0.3331);
}

#[test]
fn test_cls_is_zero_not_unavailable_without_shifts() {
    let snapshot = harvest(Capabilities::all(), vec![], 500.0);
    assert_eq!(snapshot.cls(), Some(0.0));

    let snapshot = harvest(Capabilities::all().without(ObservationKind::LayoutShift), vec![], 500.0);
    assert_eq!(snapshot.cls(), None);
    assert_eq!(snapshot.layout, Measured::Unavailable);
}

#[test]
fn test_p98_index() {
    assert_eq!(p98_index(0), 0);
    assert_eq!(p98_index(1), 0);
    assert_eq!(p98_index(10), 9);
    assert_eq!(p98_index(50), 48);
    assert_eq!(p98_index(60), 58);
}

#[test]
fn test_p98_single_and_empty() {
    assert_eq!(percentile_98(&[]), None);
    assert_eq!(percentile_98(&[72.0]), Some(72.0));
}

#[test]
fn test_p98_monotonic_in_added_durations() {
    let mut durations: Vec<f64> = (1..=40).map(|i| (i * 16) as f64).collect();
    let before = percentile_98(&durations).unwrap();

    // Adding something at least as slow as every entry can't lower the percentile
    durations.push(2000.0);
    let after = percentile_98(&durations).unwrap();
    assert!(after >= before, "p98 dropped from {} to {}", before, after);
}

#[test]
fn test_interaction_breakdown_phases() {
    let obs = Observation::interaction(100.0, 130.0, 180.0, 120.0, 7);
    let Payload::InteractionTiming(timing) = &obs.payload else {
        panic!("Wrong payload");
    };

    let b = breakdown(&obs, timing);
    assert_eq!(b.input_delay, 30.0);
    assert_eq!(b.processing_time, 50.0);
    assert_eq!(b.presentation_delay, 40.0);
    assert_eq!(b.input_delay + b.processing_time + b.presentation_delay, b.duration);
}

#[test]
fn test_rounded_duration_never_negative() {
    // Duration rounded below processing end
    let obs = Observation::interaction(0.0, 10.0, 60.0, 56.0, 1);
    let Payload::InteractionTiming(timing) = &obs.payload else {
        panic!("Wrong payload");
    };
    assert_eq!(breakdown(&obs, timing).presentation_delay, 0.0);
}

#[test]
fn test_interactions_deduplicated_by_id() {
    let log = vec![
        // pointerdown/pointerup/click of one tap
        Observation::interaction(100.0, 105.0, 110.0, 40.0, 1),
        Observation::interaction(100.0, 120.0, 190.0, 120.0, 1),
        Observation::interaction(102.0, 110.0, 120.0, 48.0, 1),
        Observation::interaction(900.0, 905.0, 930.0, 64.0, 2),
        // hover, no interaction id
        Observation::interaction(950.0, 951.0, 952.0, 400.0, 0),
    ];

    let snapshot = harvest(Capabilities::all(), log, 1000.0);
    let interactions = snapshot.interactions.value().expect("Interactions measured");

    assert_eq!(interactions.interaction_count, 2);
    assert_eq!(interactions.sample_count, 4, "Hover entry is not a sample");
    assert_eq!(interactions.p98_ms, 120.0);
    assert_eq!(interactions.slowest[0].interaction_id, 1);
    assert_eq!(interactions.slowest[0].processing_time, 70.0);
    assert_eq!(snapshot.inp(), Some(120.0));
}

#[test]
fn test_inp_unavailable_without_interactions() {
    let snapshot = harvest(Capabilities::all(), vec![Observation::interaction(0.0, 1.0, 2.0, 300.0, 0)], 100.0);
    assert!(!snapshot.interactions.is_available());
    assert_eq!(snapshot.inp(), None);
}

#[test]
fn test_largest_paint_stops_at_first_input() {
    let log = vec![
        paint(100.0, 120.0, 5000.0),
        paint(500.0, 520.0, 20000.0),
        Observation::interaction(600.0, 610.0, 640.0, 56.0, 3),
        paint(700.0, 750.0, 90000.0),
    ];

    let snapshot = harvest(Capabilities::all(), log, 1000.0);
    let lcp = snapshot.paint.value().expect("Paint measured");
    assert_eq!(lcp.render_time_ms, 520.0);
    assert_eq!(lcp.size, 20000.0);
}

#[test]
fn test_churn_rate_per_second() {
    let log = vec![
        Observation::mutation(100.0, "#feed", 1, 0, 0),
        Observation::mutation(200.0, "#feed", 1, 0, 0),
        Observation::mutation(300.0, "#feed", 0, 1, 0),
        Observation::mutation(400.0, "#feed", 1, 0, 0),
        Observation::mutation(500.0, "#nav", 0, 0, 1),
        Observation::mutation(600.0, "#nav", 0, 0, 1),
    ];

    let snapshot = harvest(Capabilities::all(), log, 2000.0);
    assert_eq!(snapshot.duration_ms, 2000.0);

    let churn = snapshot.churn.value().expect("Churn measured");
    assert_eq!(churn.total_mutations, 6);
    assert_eq!(churn.rate_per_second, 3.0);
    assert_eq!(churn.subtree_count, 2);
    assert_eq!(churn.top_subtrees[0].subtree_id, "#feed");
    assert_eq!(churn.top_subtrees[0].count, 4);
    assert_eq!(churn.top_subtrees[0].rate_per_second, 2.0);
    assert_eq!(churn.top_subtrees[1].attribute_changes, 2);
}

#[test]
fn test_unavailable_differs_from_zero() {
    let measured = harvest(Capabilities::all(), vec![], 1000.0);
    let churn = measured.churn.value().expect("Registered stream is measured");
    assert_eq!(churn.total_mutations, 0);
    assert_eq!(churn.rate_per_second, 0.0);

    let unmeasured = harvest(Capabilities::none().with(ObservationKind::LayoutShift), vec![], 1000.0);
    assert_eq!(unmeasured.churn, Measured::Unavailable);
    assert_eq!(unmeasured.frames, Measured::Unavailable);
    assert_eq!(unmeasured.console, Measured::Unavailable);
    assert_eq!(unmeasured.contrast, Measured::Unavailable, "No color samples means no contrast data");
}

#[test]
fn test_total_blocking_time() {
    let log = vec![Observation::long_frame(0.0, 120.0), Observation::long_frame(500.0, 80.0)];

    let snapshot = harvest(Capabilities::all(), log, 1000.0);
    let frames = snapshot.frames.value().expect("Frames measured");
    assert_eq!(frames.long_frame_count, 2);
    assert_eq!(frames.total_blocking_time_ms, 100.0);
    assert_eq!(frames.longest_frame_ms, 120.0);
    assert_eq!(frames.worst_frames[0].start_time, 0.0);
}

#[test]
fn test_reported_blocking_duration_preferred() {
    let frame = LongFrame {
        duration: 200.0,
        blocking_duration: Some(90.0),
        scripts: vec![],
    };
    assert_eq!(blocking_time(&frame, 50.0), 90.0);

    let short = LongFrame {
        duration: 30.0,
        blocking_duration: None,
        scripts: vec![],
    };
    assert_eq!(blocking_time(&short, 50.0), 0.0);
}

#[test]
fn test_jank_offenders_ranked() {
    let log = vec![
        Observation::long_frame(0.0, 100.0),
        Observation::mutation(10.0, "#feed", 1, 0, 0),
        Observation::mutation(20.0, "#feed", 1, 0, 0),
        Observation::mutation(30.0, "#ads", 1, 0, 0),
        Observation::long_frame(400.0, 100.0),
        Observation::mutation(410.0, "#feed", 1, 0, 0),
        Observation::long_frame(800.0, 100.0),
        Observation::mutation(850.0, "#ads", 1, 0, 0),
    ];

    let snapshot = harvest(Capabilities::all(), log, 1000.0);
    let frames = snapshot.frames.value().unwrap();

    assert_eq!(frames.offenders[0].subtree_id, "#feed");
    assert_eq!(frames.offenders[0].frames_dominated, 2);
    assert_eq!(frames.offenders[0].mutations_during_frames, 3);
    assert_eq!(frames.offenders[1].subtree_id, "#ads");
    assert_eq!(frames.offenders[1].frames_dominated, 1);
}

#[test]
fn test_duration_extends_to_latest_observation() {
    let snapshot = harvest(Capabilities::all(), vec![Observation::long_frame(900.0, 300.0)], 1000.0);
    assert_eq!(snapshot.duration_ms, 1200.0);
    assert_eq!(snapshot.observation_count, 1);
}

#[test]
fn test_console_counts_by_level() {
    use pagescope::kernel::event::ConsoleLevel;

    let log = vec![
        Observation::console(1.0, ConsoleLevel::Error, "a"),
        Observation::console(2.0, ConsoleLevel::Error, "b"),
        Observation::console(3.0, ConsoleLevel::Info, "c"),
        Observation::console(4.0, ConsoleLevel::Debug, "d"),
    ];
    let snapshot = harvest(Capabilities::all(), log, 10.0);
    let console = snapshot.console.value().unwrap();
    assert_eq!((console.errors, console.warnings, console.other), (2, 0, 2));
}

#[test]
fn test_p98_counts_every_entry_of_an_interaction() {
    // 49 quick taps, then one slow tap reported as three 400ms entries
    let mut log: Vec<Observation> = (1..=49)
        .map(|id| Observation::interaction(id as f64 * 100.0, id as f64 * 100.0 + 10.0, id as f64 * 100.0 + 60.0, 100.0, id))
        .collect();
    for _ in 0..3 {
        log.push(Observation::interaction(6000.0, 6020.0, 6300.0, 400.0, 50));
    }

    let snapshot = harvest(Capabilities::all(), log, 7000.0);
    let interactions = snapshot.interactions.value().unwrap();

    // n = 52, index ceil(0.98 * 52) - 1 = 50
    assert_eq!(interactions.sample_count, 52);
    assert_eq!(interactions.p98_ms, 400.0);
    assert_eq!(interactions.interaction_count, 50, "Detail list still groups by id");
    assert_eq!(interactions.slowest[0].interaction_id, 50);
}

#[test]
fn test_reported_blocking_duration_flows_into_snapshot() {
    let reported = Observation::new(
        0.0,
        None,
        Payload::LongFrame(LongFrame {
            duration: 200.0,
            blocking_duration: Some(40.0),
            scripts: vec![],
        }),
    );
    let log = vec![reported, Observation::long_frame(500.0, 80.0)];

    let snapshot = harvest(Capabilities::all(), log, 1000.0);
    assert_eq!(snapshot.frames.value().unwrap().total_blocking_time_ms, 70.0);
}
