use embassy_time::{Duration, Instant};

use heli_stick::control::commands::Command;
use heli_stick::control::status::{csv_record, StatusSnapshot, STATUS_JSON_CAPACITY};
use heli_stick::control::tick::{ControlLoop, TickInput, TickOutcome};
use heli_stick::drivers::alarm::{Alarm, BeepPattern};
use heli_stick::drivers::cyclic_link::{encode_frame, CyclicSample};
use heli_stick::drivers::stepper::{CyclicAxis, MotorGroup, StepDirection, Stepper};
use heli_stick::error::{DisengageReason, EngageError};
use heli_stick::state::{new_shared_state, publish, snapshot, AppState, HorizontalMode, SharedState, VerticalMode};

#[derive(Default)]
struct FakeStepper {
    steps: Vec<(CyclicAxis, StepDirection)>,
    holds: Vec<(MotorGroup, bool)>,
}

impl Stepper for FakeStepper {
    fn step(&mut self, axis: CyclicAxis, direction: StepDirection) {
        self.steps.push((axis, direction));
    }

    fn hold(&mut self, group: MotorGroup, engaged: bool) {
        self.holds.push((group, engaged));
    }
}

#[derive(Default)]
struct FakeAlarm {
    beeps: Vec<BeepPattern>,
}

impl Alarm for FakeAlarm {
    fn sound(&mut self, pattern: BeepPattern) {
        self.beeps.push(pattern);
    }
}

/// Raw counts that calibrate to X 6000 and Y 5000.
const X_6000: u16 = 2_236;
const X_5000: u16 = 2_050;
const Y_5000: u16 = 2_030;
const COLLECTIVE_RAW: u16 = 200;

const LEVEL_FLIGHT: &[u8] = b"{\"spd\":85,\"alt\":2000,\"pitch\":2.5,\"roll\":-1,\"hdg\":270,\"vs\":0}\n";

struct Rig {
    ctl: ControlLoop<FakeStepper, FakeAlarm>,
    state: AppState,
}

impl Rig {
    fn new() -> Self {
        Self { ctl: ControlLoop::new(FakeStepper::default(), FakeAlarm::default()), state: AppState::default() }
    }

    fn tick(&mut self, ms: u64, x: Option<u16>, sim: &[u8], commands: &[Command]) -> TickOutcome {
        let frame = x.map(|x| encode_frame(CyclicSample { sensor_a: x, sensor_b: Y_5000 }));
        let cyclic: &[u8] = match &frame {
            Some(f) => f,
            None => &[],
        };
        self.ctl.tick(
            &mut self.state,
            TickInput {
                now: Instant::from_millis(ms),
                cyclic_bytes: cyclic,
                sim_bytes: sim,
                collective_raw: COLLECTIVE_RAW,
                commands,
            },
        )
    }

    fn engaged(mut self) -> Self {
        self.tick(0, Some(X_6000), LEVEL_FLIGHT, &[]);
        let outcome = self.tick(10, Some(X_6000), LEVEL_FLIGHT, &[Command::SetEnabled(true)]);
        assert_eq!(outcome.engage_denied, None);
        assert!(self.state.autopilot.enabled);
        self
    }
}

fn cmd(line: &str) -> Command {
    line.parse().unwrap()
}

#[test]
fn ingest_calibrates_and_passes_through() {
    let mut rig = Rig::new();
    let outcome = rig.tick(0, Some(X_6000), LEVEL_FLIGHT, &[]);
    assert!(outcome.cyclic_sample);
    assert_eq!(outcome.telemetry_lines, 1);

    let s = &rig.state;
    assert_eq!(s.sensors.cyclic_x_raw, X_6000);
    assert_eq!(s.sensors.cyclic_x_calibrated, 6_000);
    assert_eq!(s.sensors.cyclic_y_calibrated, 5_000);
    assert!(s.sensors.cyclic_valid);
    assert!((6_920..=6_925).contains(&s.sensors.collective_calibrated));
    assert_eq!(s.joystick.cyclic_x, 6_000);
    assert_eq!(s.joystick.cyclic_y, 5_000);
    assert_eq!(s.joystick.collective, s.sensors.collective_calibrated);
    assert!(s.simulator.valid);
    assert!(!s.simulator.data_updated);
    assert_eq!(s.diagnostics.cyclic_link.frames_ok, 1);
    assert_eq!(s.diagnostics.sim_link.lines_ok, 1);
}

#[test]
fn cyclic_goes_invalid_without_frames() {
    let mut rig = Rig::new();
    rig.tick(0, Some(X_6000), b"", &[]);
    rig.tick(499, None, b"", &[]);
    assert!(rig.state.sensors.cyclic_valid);
    rig.tick(500, None, b"", &[]);
    assert!(!rig.state.sensors.cyclic_valid);
    // Last calibrated reading is kept.
    assert_eq!(rig.state.sensors.cyclic_x_calibrated, 6_000);
}

#[test]
fn engage_denied_on_stale_telemetry() {
    let mut rig = Rig::new();
    rig.tick(0, Some(X_6000), LEVEL_FLIGHT, &[]);
    let before = rig.state.autopilot;

    let outcome = rig.tick(6_000, Some(X_6000), b"", &[cmd("ap on")]);
    assert_eq!(outcome.engage_denied, Some(EngageError::NoTelemetry));
    assert_eq!(rig.state.autopilot, before);
    assert!(rig.ctl.alarm().beeps.is_empty());
}

#[test]
fn engage_is_bumpless_through_the_loop() {
    let mut rig = Rig::new();
    rig.tick(0, Some(X_6000), LEVEL_FLIGHT, &[]);
    let manual = rig.state.joystick;

    rig.tick(10, Some(X_6000), LEVEL_FLIGHT, &[cmd("ap on")]);
    assert!(rig.state.autopilot.enabled);
    assert!((rig.state.joystick.cyclic_x - manual.cyclic_x).abs() <= 1);
    assert!((rig.state.joystick.cyclic_y - manual.cyclic_y).abs() <= 1);
}

#[test]
fn telemetry_loss_disengages_exactly_once() {
    let mut rig = Rig::new().engaged();

    assert_eq!(rig.tick(5_009, Some(X_6000), b"", &[]).disengaged, None);
    assert!(rig.state.autopilot.enabled);

    let outcome = rig.tick(5_010, Some(X_6000), b"", &[]);
    assert_eq!(outcome.disengaged, Some(DisengageReason::TelemetryLost));
    assert!(!rig.state.autopilot.enabled);
    assert_eq!(rig.state.autopilot.horizontal_mode, HorizontalMode::Off);
    assert_eq!(rig.state.autopilot.vertical_mode, VerticalMode::Off);

    for ms in [5_020, 5_030, 9_000] {
        assert_eq!(rig.tick(ms, Some(X_6000), b"", &[]).disengaged, None);
    }
    assert_eq!(rig.ctl.alarm().beeps, vec![BeepPattern::Triple]);
}

#[test]
fn servo_chases_output_only_when_held() {
    let mut rig = Rig::new().engaged();

    // Stick pushed back to centre while the autopilot still holds 6000.
    rig.tick(20, Some(X_5000), LEVEL_FLIGHT, &[]);
    assert_eq!(rig.state.joystick.cyclic_x, 6_000);
    assert!(rig.ctl.stepper().steps.is_empty());

    let outcome = rig.tick(30, Some(X_5000), LEVEL_FLIGHT, &[cmd("hold on")]);
    assert_eq!(outcome.steps.x, Some(StepDirection::High));
    assert_eq!(outcome.steps.y, None);
    assert_eq!(rig.ctl.stepper().holds, vec![(MotorGroup::Cyclic, true)]);
    assert_eq!(rig.ctl.alarm().beeps, vec![BeepPattern::Double]);

    rig.tick(40, Some(X_5000), LEVEL_FLIGHT, &[cmd("feedback off")]);
    assert_eq!(rig.ctl.stepper().steps, vec![(CyclicAxis::X, StepDirection::High)]);

    rig.tick(50, Some(X_5000), LEVEL_FLIGHT, &[Command::ToggleCyclicHold]);
    assert!(!rig.state.cyclic_held);
    assert_eq!(rig.ctl.stepper().holds, vec![(MotorGroup::Cyclic, true), (MotorGroup::Cyclic, false)]);
    assert_eq!(rig.ctl.alarm().beeps, vec![BeepPattern::Double, BeepPattern::Single]);
}

#[test]
fn collective_hold_toggles_independently() {
    let mut rig = Rig::new();
    rig.tick(0, Some(X_5000), LEVEL_FLIGHT, &[Command::ToggleCollectiveHold]);
    assert!(rig.state.collective_held);
    assert!(!rig.state.cyclic_held);
    assert_eq!(rig.ctl.stepper().holds, vec![(MotorGroup::Collective, true)]);
    assert_eq!(rig.ctl.alarm().beeps, vec![BeepPattern::Double]);

    // Repeating the current state is silent.
    rig.tick(10, Some(X_5000), LEVEL_FLIGHT, &[cmd("colhold on")]);
    assert_eq!(rig.ctl.stepper().holds.len(), 1);
    assert_eq!(rig.ctl.alarm().beeps.len(), 1);

    rig.tick(20, Some(X_5000), LEVEL_FLIGHT, &[Command::ToggleCollectiveHold]);
    assert!(!rig.state.collective_held);
    assert_eq!(
        rig.ctl.stepper().holds,
        vec![(MotorGroup::Collective, true), (MotorGroup::Collective, false)]
    );
    assert_eq!(rig.ctl.alarm().beeps, vec![BeepPattern::Double, BeepPattern::Single]);
    // The collective motor is never stepped.
    assert!(rig.ctl.stepper().steps.is_empty());
}

#[test]
fn armed_climb_captures_altitude_once() {
    let mut rig = Rig::new().engaged();
    let setup = [cmd("sel alt 2500"), cmd("sel vs 500"), cmd("vmode vs"), cmd("arm alts on")];
    rig.tick(20, Some(X_6000), b"", &setup);
    assert_eq!(rig.state.autopilot.vertical_mode, VerticalMode::VerticalSpeedHold);
    assert!(rig.state.autopilot.alt_capture_armed);

    let mut transitions = Vec::new();
    let mut ms = 20;
    for alt in [2_100, 2_300, 2_440, 2_455, 2_490, 2_510, 2_530] {
        ms += 10;
        let line = format!("{{\"alt\":{},\"vs\":480}}\n", alt);
        let before = rig.state.autopilot.vertical_mode;
        rig.tick(ms, Some(X_6000), line.as_bytes(), &[]);
        if rig.state.autopilot.vertical_mode != before {
            transitions.push((alt, rig.state.autopilot.vertical_mode));
        }
    }
    assert_eq!(transitions, vec![(2_455, VerticalMode::AltitudeHold)]);
    assert!(!rig.state.autopilot.alt_capture_armed);
}

#[test]
fn heading_mode_wraps_through_north() {
    let mut rig = Rig::new().engaged();
    rig.tick(20, Some(X_6000), b"{\"hdg\":350}\n", &[cmd("sel hdg 10"), cmd("hmode hdg")]);
    assert_eq!(rig.state.autopilot.horizontal_mode, HorizontalMode::HeadingHold);
    assert_eq!(rig.state.autopilot.selected_roll, 20.0);
}

#[test]
fn gains_apply_without_resetting_state() {
    let mut rig = Rig::new().engaged();
    rig.tick(20, Some(X_6000), b"{\"pitch\":4}\n", &[]);
    let integral = rig.ctl.autopilot().pitch_pid().integral();

    rig.tick(30, Some(X_6000), b"", &[cmd("gain pitch 60 2 20"), cmd("gain hdg -0.5")]);
    assert_eq!(rig.ctl.autopilot().pitch_pid().integral(), integral);
    assert_eq!(rig.ctl.autopilot().pitch_pid().gains().kp, 60.0);
    assert_eq!(rig.state.autopilot.gains.pitch.kp, 60.0);
    assert_eq!(rig.state.autopilot.gains.heading_kp, -0.5);
}

#[test]
fn status_surface_reads_shared_state() {
    static SHARED: SharedState = new_shared_state();
    let mut ctl = ControlLoop::new(FakeStepper::default(), FakeAlarm::default());
    let frame = encode_frame(CyclicSample { sensor_a: X_6000, sensor_b: Y_5000 });

    let mut local = snapshot(&SHARED);
    ctl.tick(
        &mut local,
        TickInput {
            now: Instant::from_millis(100),
            cyclic_bytes: &frame,
            sim_bytes: LEVEL_FLIGHT,
            collective_raw: COLLECTIVE_RAW,
            commands: &[Command::SetRecording(true)],
        },
    );
    ctl.record_tick_duration(&mut local, Duration::from_micros(800));
    // Readers see nothing until the tick publishes.
    assert!(!snapshot(&SHARED).recording_enabled);
    publish(&SHARED, &local);

    let copy = snapshot(&SHARED);
    assert!(copy.recording_enabled);
    assert_eq!(copy.diagnostics.tick_last_us, 800);

    let mut buf = [0u8; STATUS_JSON_CAPACITY];
    let n = StatusSnapshot::new(&copy, Instant::from_millis(150)).to_json(&mut buf).unwrap();
    let json = core::str::from_utf8(&buf[..n]).unwrap();
    assert!(json.contains("\"cyclicX\":6000"));
    assert!(json.contains("\"horizontalMode\":\"off\""));
    assert!(json.contains("\"ageMs\":50"));

    let line = csv_record(&copy, Instant::from_millis(150)).unwrap();
    assert!(line.starts_with("150,0,off,off,2.50,-1.00,270.0,0,85.0,"));
    assert!(line.ends_with(",5000,6000"));
}
