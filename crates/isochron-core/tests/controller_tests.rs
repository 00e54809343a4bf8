// Host-side tests for the playback lifecycle, using a hand-driven clock and
// recording graphs so nothing waits on real time.

use isochron_core::*;
use std::cell::RefCell;
use std::rc::Rc;

type Controller = PlaybackController<ManualClock, RecordingGraph>;

/// Controller whose factory hands out a fresh recording graph per start.
fn make_controller(clock: &ManualClock) -> (Controller, Rc<RefCell<Vec<RecordingGraph>>>) {
    let graphs: Rc<RefCell<Vec<RecordingGraph>>> = Rc::default();
    let handle = graphs.clone();
    let controller = PlaybackController::new(clock.clone(), move |_program: &Program| {
        let graph = RecordingGraph::new();
        handle.borrow_mut().push(graph.clone());
        Ok(graph)
    });
    (controller, graphs)
}

fn pump(controller: &mut Controller, clock: &ManualClock, seconds: f64, step: f64) {
    let steps = (seconds / step).round() as usize;
    for _ in 0..steps {
        clock.advance(step);
        controller.tick();
    }
}

fn glide() -> Program {
    Program::new(14.0, vec![Stage::new(10.0, 10.0), Stage::new(4.0, 10.0)])
}

#[test]
fn new_controller_is_idle() {
    let clock = ManualClock::new(0.0);
    let (controller, graphs) = make_controller(&clock);
    assert_eq!(controller.state(), PlayState::Stopped);
    assert_eq!(controller.status(), &PlaybackStatus::Idle);
    assert_eq!(controller.elapsed(), 0.0);
    assert_eq!(controller.current_beat(), None);
    assert_eq!(controller.next_deadline(), None);
    assert!(graphs.borrow().is_empty());
}

#[test]
fn start_wires_the_graph_and_queues_pulses_immediately() {
    let clock = ManualClock::new(5.0);
    let (mut controller, graphs) = make_controller(&clock);
    controller.start(glide().with_carrier(180.0)).unwrap();

    assert_eq!(controller.state(), PlayState::Playing);
    assert_eq!(controller.status().to_string(), "playing");
    let graph = graphs.borrow()[0].clone();
    assert_eq!(graph.carrier_hz(), Some(180.0));
    assert!(graph.is_connected());
    assert!(graph.calls().contains(&GraphCall::MasterGain {
        target: DEFAULT_MASTER_GAIN,
        at: 5.0,
        time_constant: FADE_TIME_CONSTANT_SEC,
    }));
    assert_eq!(graph.pulse_starts()[0], 5.0);
    assert_eq!(controller.next_deadline(), Some(5.0 + SCHEDULE_INTERVAL_SEC));
    assert_eq!(controller.session().unwrap().t0, 5.0);
}

#[test]
fn start_while_playing_is_a_no_op() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    controller.start(glide()).unwrap();
    clock.advance(1.0);
    controller.start(Program::new(3.0, vec![])).unwrap();
    assert_eq!(graphs.borrow().len(), 1);
    assert_eq!(controller.session().unwrap().t0, 0.0);
    assert!((controller.elapsed() - 1.0).abs() < 1e-12);
}

#[test]
fn ticks_keep_the_pulse_train_contiguous() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    let program = glide();
    controller.start(program.clone()).unwrap();

    // ticking early does nothing
    let before = graphs.borrow()[0].pulse_starts().len();
    clock.advance(0.05);
    controller.tick();
    assert_eq!(graphs.borrow()[0].pulse_starts().len(), before);

    pump(&mut controller, &clock, 12.0, 0.05);
    let starts = graphs.borrow()[0].pulse_starts();
    for pair in starts.windows(2) {
        let period = 1.0 / beat_at(&program, pair[0]);
        assert!((pair[1] - pair[0] - period).abs() < 1e-12);
    }
    let session = controller.session().unwrap();
    assert!(session.next_pulse_time >= clock.now());
}

#[test]
fn readout_tracks_elapsed_beat_and_stage() {
    let clock = ManualClock::new(100.0);
    let (mut controller, _graphs) = make_controller(&clock);
    controller.start(glide()).unwrap();
    pump(&mut controller, &clock, 15.0, 0.1);

    let readout = controller.readout();
    assert_eq!(readout.state, PlayState::Playing);
    assert!((readout.elapsed - 15.0).abs() < 1e-6);
    assert!((readout.beat_hz.unwrap() - 7.0).abs() < 1e-5);
    assert_eq!(readout.stage, Some(1));
    assert_eq!(readout.total, 20.0);
}

#[test]
fn stop_cancels_pending_pulses_fades_and_releases_later() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    controller.start(glide()).unwrap();
    pump(&mut controller, &clock, 2.0, 0.1);
    let graph = graphs.borrow()[0].clone();

    controller.stop();
    let stopped_at = clock.now();
    assert_eq!(controller.state(), PlayState::Stopping);
    assert_eq!(controller.status(), &PlaybackStatus::Stopped);
    assert!(!controller.session().unwrap().running);
    assert_eq!(controller.elapsed(), 0.0);
    assert!(graph
        .pending_points()
        .iter()
        .all(|p| p.time < stopped_at));
    assert!(graph.calls().contains(&GraphCall::MasterGain {
        target: SILENT_GAIN,
        at: stopped_at,
        time_constant: FADE_TIME_CONSTANT_SEC,
    }));
    assert_eq!(controller.next_deadline(), Some(stopped_at + RELEASE_DELAY_SEC));

    // no further scheduling while the fade runs
    let pulses = graph.pulse_starts().len();
    clock.advance(0.1);
    controller.tick();
    assert_eq!(graph.pulse_starts().len(), pulses);
    assert!(!graph.is_released());

    pump(&mut controller, &clock, RELEASE_DELAY_SEC, 0.05);
    assert_eq!(controller.state(), PlayState::Stopped);
    assert!(graph.is_released());
    assert_eq!(graph.pulse_starts().len(), pulses);
    assert!(controller.session().is_none());
}

#[test]
fn stop_is_idempotent() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    controller.stop();
    assert_eq!(controller.state(), PlayState::Stopped);
    assert_eq!(controller.status(), &PlaybackStatus::Idle);

    controller.start(glide()).unwrap();
    controller.stop();
    controller.stop();
    pump(&mut controller, &clock, 1.0, 0.1);
    controller.stop();
    assert_eq!(graphs.borrow()[0].release_count(), 1);
}

#[test]
fn restart_right_after_stop_begins_a_fresh_session() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    controller.start(glide()).unwrap();
    pump(&mut controller, &clock, 3.0, 0.1);

    controller.stop();
    controller.start(glide()).unwrap();
    let now = clock.now();

    assert_eq!(controller.state(), PlayState::Playing);
    assert_eq!(controller.elapsed(), 0.0);
    let session = controller.session().unwrap();
    assert_eq!(session.id, 2);
    assert_eq!(session.t0, now);
    assert!(session.next_pulse_time >= now + LOOKAHEAD_SEC);

    let graphs = graphs.borrow();
    assert_eq!(graphs.len(), 2);
    assert!(graphs[0].is_released());
    assert!(graphs[0].pending_points().is_empty());
    assert_eq!(graphs[1].pulse_starts()[0], now);
}

#[test]
fn mute_only_moves_the_master_gain() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    controller.start(glide()).unwrap();
    pump(&mut controller, &clock, 1.0, 0.1);
    let graph = graphs.borrow()[0].clone();

    controller.set_muted(true);
    let muted_at = clock.now();
    assert!(controller.is_muted());
    assert!(controller.session().unwrap().muted);
    assert!(graph.calls().contains(&GraphCall::MasterGain {
        target: SILENT_GAIN,
        at: muted_at,
        time_constant: FADE_TIME_CONSTANT_SEC,
    }));

    let pulses = graph.pulse_starts().len();
    pump(&mut controller, &clock, 1.0, 0.1);
    assert!(graph.pulse_starts().len() > pulses, "scheduling continues while muted");

    controller.set_muted(false);
    match graph.calls().last() {
        Some(GraphCall::MasterGain { target, .. }) => assert_eq!(*target, DEFAULT_MASTER_GAIN),
        other => panic!("expected master gain, got {other:?}"),
    }
}

#[test]
fn mute_before_start_carries_into_the_session() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    controller.set_muted(true);
    controller.start(glide()).unwrap();
    assert!(controller.session().unwrap().muted);
    assert!(graphs.borrow()[0].calls().contains(&GraphCall::MasterGain {
        target: SILENT_GAIN,
        at: 0.0,
        time_constant: FADE_TIME_CONSTANT_SEC,
    }));
}

#[test]
fn volume_is_clamped_and_applied_live() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    let mut controller_loud = {
        let (c, _) = make_controller(&clock);
        c.with_volume(3.0)
    };
    assert_eq!(controller_loud.volume(), 1.0);
    controller_loud.set_volume(-1.0);
    assert_eq!(controller_loud.volume(), 0.0);

    controller.start(glide()).unwrap();
    controller.set_volume(0.8);
    match graphs.borrow()[0].calls().last() {
        Some(GraphCall::MasterGain { target, .. }) => assert_eq!(*target, 0.8),
        other => panic!("expected master gain, got {other:?}"),
    };
}

#[test]
fn stop_program_finishes_on_its_own() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    let program = Program::new(8.0, vec![Stage::new(8.0, 2.0)]).with_end_action(EndAction::Stop);
    controller.start(program).unwrap();

    pump(&mut controller, &clock, 2.2, 0.1);
    assert_eq!(controller.state(), PlayState::Stopping);
    assert_eq!(controller.status(), &PlaybackStatus::Finished);
    assert_eq!(controller.status().to_string(), "finished");

    pump(&mut controller, &clock, 1.0, 0.1);
    assert_eq!(controller.state(), PlayState::Stopped);
    assert_eq!(controller.status(), &PlaybackStatus::Finished);
    assert!(graphs.borrow()[0].is_released());

    // a user stop after a natural finish changes nothing
    controller.stop();
    assert_eq!(controller.status(), &PlaybackStatus::Finished);
}

#[test]
fn glide_to_zero_with_stop_terminates_after_sixty_seconds() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    let program = Program::new(4.0, vec![Stage::new(0.0, 60.0)]).with_end_action(EndAction::Stop);
    controller.start(program).unwrap();

    pump(&mut controller, &clock, 59.9, 0.1);
    assert_eq!(controller.state(), PlayState::Playing);
    pump(&mut controller, &clock, 0.3, 0.1);
    assert_eq!(controller.status(), &PlaybackStatus::Finished);
    assert!(graphs.borrow()[0].pulse_starts().iter().all(|&s| s < 60.0));
}

#[test]
fn zero_beat_with_hold_rests_silently_without_finishing() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    let program = Program::new(4.0, vec![Stage::new(0.0, 2.0)]);
    controller.start(program).unwrap();

    pump(&mut controller, &clock, 30.0, 0.1);
    assert_eq!(controller.state(), PlayState::Playing);
    assert_eq!(controller.status(), &PlaybackStatus::Playing);
    assert_eq!(controller.current_beat(), Some(0.0));
    let starts = graphs.borrow()[0].pulse_starts();
    assert!(starts.iter().all(|&s| s < 2.0));
}

#[test]
fn failed_graph_reports_could_not_start() {
    let clock = ManualClock::new(0.0);
    let attempts = Rc::new(RefCell::new(0));
    let counter = attempts.clone();
    let mut controller: Controller = PlaybackController::new(clock.clone(), move |_p: &Program| {
        *counter.borrow_mut() += 1;
        let graph = RecordingGraph::new();
        if *counter.borrow() == 1 {
            graph.fail_connect("no device");
        }
        Ok(graph)
    });

    let err = controller.start(glide()).unwrap_err();
    assert_eq!(
        err,
        StartError::Graph(GraphError::Unavailable("no device".into()))
    );
    assert_eq!(controller.state(), PlayState::Stopped);
    assert_eq!(
        controller.status().to_string(),
        "could not start: output device unavailable: no device"
    );

    // the controller stays usable
    controller.start(glide()).unwrap();
    assert_eq!(controller.state(), PlayState::Playing);
    assert_eq!(*attempts.borrow(), 2);
}

#[test]
fn factory_error_is_reported() {
    let clock = ManualClock::new(0.0);
    let mut controller: Controller = PlaybackController::new(clock.clone(), |_p: &Program| {
        Err(GraphError::Unavailable("audio context blocked".into()))
    });
    assert!(controller.start(glide()).is_err());
    assert!(matches!(controller.status(), PlaybackStatus::Failed(_)));
    assert_eq!(controller.next_deadline(), None);
}

#[test]
fn invalid_program_is_rejected_before_any_graph_exists() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    let err = controller.start(Program::new(0.0, vec![])).unwrap_err();
    assert_eq!(err, StartError::InvalidProgram(ProgramError::StartBeat(0.0)));
    assert!(graphs.borrow().is_empty());
    assert!(matches!(controller.status(), PlaybackStatus::Failed(_)));
}

#[test]
fn transient_graph_errors_do_not_end_the_session() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    controller.start(glide()).unwrap();
    graphs.borrow()[0].fail_next_schedules(3);

    pump(&mut controller, &clock, 2.0, 0.1);
    assert_eq!(controller.state(), PlayState::Playing);
    let session = controller.session().unwrap();
    assert_eq!(session.graph_errors, 3);
    assert!(session.pulses_emitted > 10);
}

#[test]
fn dropping_a_playing_controller_releases_its_graph() {
    let clock = ManualClock::new(0.0);
    let (mut controller, graphs) = make_controller(&clock);
    controller.start(glide()).unwrap();
    let graph = graphs.borrow()[0].clone();
    drop(controller);
    assert!(graph.is_released());
}
