//! Autopilot mode logic and the cascaded control laws.
//!
//! Vertical: altitude -> vertical speed -> pitch -> cyclic Y.
//! Horizontal: heading -> roll -> cyclic X.
//!
//! Laws are recomputed only on ticks that carry new telemetry. Between
//! updates the last PID outputs are reapplied unchanged.

#[allow(unused_imports)]
use micromath::F32Ext;

use embassy_time::Instant;

use crate::config::*;
use crate::drivers::alarm::{Alarm, BeepPattern};
use crate::drivers::sim_link::is_telemetry_fresh;
use crate::error::{DisengageReason, EngageError};
use crate::state::{AppState, Gains, HorizontalMode, SimulatorState, VerticalMode};

use super::pid::{Direction, PidLoop};

/// Telemetry is fresh and the aircraft is flying fast enough.
pub fn engage_precondition(sim: &SimulatorState, now: Instant) -> Result<(), EngageError> {
    if !is_telemetry_fresh(sim, now) {
        return Err(EngageError::NoTelemetry);
    }
    if sim.speed < AP_MIN_SPEED {
        return Err(EngageError::TooSlow { speed: sim.speed });
    }
    Ok(())
}

/// Heading error folded into (-180, 180], the shortest turn.
pub fn wrap_heading_error(error: f32) -> f32 {
    if !error.is_finite() {
        return 0.0;
    }
    // `%` keeps the sign of `error`, so one correction lands in (-180, 180].
    let folded = error % 360.0;
    if folded > 180.0 {
        folded - 360.0
    } else if folded <= -180.0 {
        folded + 360.0
    } else {
        folded
    }
}

fn axis_value(offset: f32) -> i16 {
    (AXIS_CENTER as f32 + offset)
        .round()
        .clamp(AXIS_MIN as f32, AXIS_MAX as f32) as i16
}

fn offset_from_center(value: i16) -> f32 {
    (value - AXIS_CENTER) as f32
}

pub struct AutopilotController {
    pitch_pid: PidLoop,
    roll_pid: PidLoop,
    /// Running sum of vertical-speed error, in ft/min per update.
    vs_integral: f32,
}

impl Default for AutopilotController {
    fn default() -> Self {
        Self::new()
    }
}

impl AutopilotController {
    pub const fn new() -> Self {
        let gains = Gains::new();
        Self {
            pitch_pid: PidLoop::new(gains.pitch, Direction::Reverse, -PID_AUTHORITY, PID_AUTHORITY),
            roll_pid: PidLoop::new(gains.roll, Direction::Reverse, -PID_AUTHORITY, PID_AUTHORITY),
            vs_integral: 0.0,
        }
    }

    pub fn pitch_pid(&self) -> &PidLoop {
        &self.pitch_pid
    }

    pub fn roll_pid(&self) -> &PidLoop {
        &self.roll_pid
    }

    pub fn vs_integral(&self) -> f32 {
        self.vs_integral
    }

    /// Pushes the inner-loop tunings from `gains` into the PIDs. Outer gains
    /// are read from state on every update.
    pub fn apply_gains(&mut self, gains: &Gains) {
        self.pitch_pid.set_gains(gains.pitch);
        self.roll_pid.set_gains(gains.roll);
    }

    pub fn enable(&mut self, state: &mut AppState, now: Instant) -> Result<(), EngageError> {
        if state.autopilot.enabled {
            return Ok(());
        }
        if let Err(err) = engage_precondition(&state.simulator, now) {
            warn!("autopilot engage denied: {}", err);
            return Err(err);
        }

        let sim = state.simulator;
        let ap = &mut state.autopilot;
        ap.enabled = true;
        ap.horizontal_mode = HorizontalMode::RollHold;
        ap.vertical_mode = VerticalMode::PitchHold;
        ap.selected_roll = sim.roll;
        ap.selected_pitch = sim.pitch;

        self.apply_gains(&ap.gains);
        // Start from where the stick is reported now.
        self.pitch_pid.reseed(offset_from_center(state.joystick.cyclic_y));
        self.pitch_pid.set_enabled(true);
        self.roll_pid.reseed(offset_from_center(state.joystick.cyclic_x));
        self.roll_pid.set_enabled(true);

        info!("autopilot engaged: roll {} pitch {}", sim.roll, sim.pitch);
        Ok(())
    }

    pub fn disable(&mut self, state: &mut AppState) {
        let ap = &mut state.autopilot;
        let was_enabled = ap.enabled;
        ap.enabled = false;
        ap.horizontal_mode = HorizontalMode::Off;
        ap.vertical_mode = VerticalMode::Off;
        self.pitch_pid.set_enabled(false);
        self.roll_pid.set_enabled(false);
        if was_enabled {
            info!("autopilot disengaged");
        }
    }

    pub fn set_horizontal_mode(&mut self, state: &mut AppState, mode: HorizontalMode, now: Instant) {
        if state.autopilot.horizontal_mode == mode {
            return;
        }
        if mode == HorizontalMode::RollHold && is_telemetry_fresh(&state.simulator, now) {
            state.autopilot.selected_roll = state.simulator.roll;
        }
        state.autopilot.horizontal_mode = mode;

        if state.autopilot.enabled {
            if mode == HorizontalMode::Off {
                self.roll_pid.set_enabled(false);
            } else {
                self.roll_pid.reseed(offset_from_center(state.joystick.cyclic_x));
                self.roll_pid.set_enabled(true);
            }
        }
        info!("horizontal mode {}", mode.mnemonic());
    }

    pub fn set_vertical_mode(&mut self, state: &mut AppState, mode: VerticalMode, now: Instant) {
        if state.autopilot.vertical_mode == mode {
            return;
        }
        let fresh = is_telemetry_fresh(&state.simulator, now);
        match mode {
            VerticalMode::PitchHold if fresh => {
                state.autopilot.selected_pitch = state.simulator.pitch;
            }
            VerticalMode::VerticalSpeedHold => {
                if fresh {
                    state.autopilot.selected_pitch = state.simulator.pitch;
                }
                // Starts empty; the captured pitch carries the entry attitude.
                self.vs_integral = 0.0;
            }
            VerticalMode::AltitudeHold => {
                if fresh {
                    state.autopilot.selected_pitch = state.simulator.pitch;
                }
                self.seed_vs_integral(state.simulator.pitch, state.autopilot.gains.vs_ki);
            }
            _ => {}
        }
        state.autopilot.vertical_mode = mode;

        if state.autopilot.enabled {
            if mode == VerticalMode::Off {
                self.pitch_pid.set_enabled(false);
            } else {
                self.pitch_pid.reseed(offset_from_center(state.joystick.cyclic_y));
                self.pitch_pid.set_enabled(true);
            }
        }
        info!("vertical mode {}", mode.mnemonic());
    }

    /// Chooses the integral so its contribution alone reproduces `pitch`.
    /// This assumes zero vertical-speed error at the moment of entry, which
    /// is only approximately true.
    fn seed_vs_integral(&mut self, pitch: f32, vs_ki: f32) {
        self.vs_integral = if vs_ki != 0.0 { pitch / vs_ki } else { 0.0 };
    }

    /// One control tick. Writes the cyclic and collective outputs into
    /// `state.joystick` and consumes the new-telemetry edge.
    ///
    /// Returns the cause when the safety check forced a disengage.
    pub fn update<A: Alarm>(&mut self, state: &mut AppState, now: Instant, alarm: &mut A) -> Option<DisengageReason> {
        let mut disengaged = None;

        if state.autopilot.enabled {
            if let Err(err) = engage_precondition(&state.simulator, now) {
                let reason = DisengageReason::from(err);
                self.disable(state);
                alarm.sound(BeepPattern::Triple);
                warn!("autopilot safety disengage: {}", reason);
                disengaged = Some(reason);
            }
        }

        if state.autopilot.enabled && state.simulator.data_updated {
            self.run_laws(state);
            self.check_altitude_capture(state);
        }
        state.simulator.data_updated = false;

        self.write_outputs(state);
        disengaged
    }

    fn run_laws(&mut self, state: &mut AppState) {
        let sim = state.simulator;
        let ap = &mut state.autopilot;
        let gains = ap.gains;

        match ap.vertical_mode {
            VerticalMode::Off => {}
            VerticalMode::PitchHold => {
                self.pitch_pid.compute(ap.selected_pitch, sim.pitch);
            }
            VerticalMode::VerticalSpeedHold => {
                let target_vs = ap.selected_vertical_speed;
                ap.selected_pitch = self.vertical_speed_law(ap.selected_pitch, &sim, target_vs, &gains);
                self.pitch_pid.compute(ap.selected_pitch, sim.pitch);
            }
            VerticalMode::AltitudeHold => {
                let target_vs = ((ap.selected_altitude - sim.altitude) * gains.alt_kp)
                    .clamp(-MAX_VERTICAL_SPEED, MAX_VERTICAL_SPEED);
                ap.selected_pitch = self.vertical_speed_law(ap.selected_pitch, &sim, target_vs, &gains);
                self.pitch_pid.compute(ap.selected_pitch, sim.pitch);
            }
        }

        match ap.horizontal_mode {
            HorizontalMode::Off => {}
            HorizontalMode::RollHold => {
                self.roll_pid.compute(ap.selected_roll, sim.roll);
            }
            HorizontalMode::HeadingHold => {
                let error = wrap_heading_error(sim.heading - ap.selected_heading);
                ap.selected_roll = (error * gains.heading_kp).clamp(-MAX_BANK_DEG, MAX_BANK_DEG);
                self.roll_pid.compute(ap.selected_roll, sim.roll);
            }
        }
    }

    /// Returns the new selected pitch.
    fn vertical_speed_law(&mut self, selected_pitch: f32, sim: &SimulatorState, target_vs: f32, gains: &Gains) -> f32 {
        let vs_error = sim.vertical_speed - target_vs;
        let mut requested = vs_error * gains.vs_kp;

        self.vs_integral += vs_error;
        if gains.vs_ki != 0.0 {
            let limit = VS_INTEGRAL_SHARE * MAX_PITCH_DEG / gains.vs_ki.abs();
            self.vs_integral = self.vs_integral.clamp(-limit, limit);
        }
        requested += self.vs_integral * gains.vs_ki;
        let requested = requested.clamp(-MAX_PITCH_DEG, MAX_PITCH_DEG);

        PITCH_SMOOTHING * selected_pitch + (1.0 - PITCH_SMOOTHING) * requested
    }

    fn check_altitude_capture(&mut self, state: &mut AppState) {
        let ap = &mut state.autopilot;
        if !ap.alt_capture_armed {
            return;
        }
        if !matches!(ap.vertical_mode, VerticalMode::VerticalSpeedHold | VerticalMode::PitchHold) {
            return;
        }
        if (state.simulator.altitude - ap.selected_altitude).abs() < ALT_CAPTURE_WINDOW {
            // No integral reseed: the VS loop carries on from where it is.
            ap.vertical_mode = VerticalMode::AltitudeHold;
            ap.alt_capture_armed = false;
            info!("altitude captured at {}", state.simulator.altitude);
        }
    }

    fn write_outputs(&self, state: &mut AppState) {
        let ap = &state.autopilot;
        let sensors = &state.sensors;
        let joystick = &mut state.joystick;

        joystick.collective = sensors.collective_calibrated;
        joystick.cyclic_x = if ap.enabled && ap.horizontal_mode != HorizontalMode::Off {
            axis_value(self.roll_pid.output())
        } else {
            sensors.cyclic_x_calibrated
        };
        joystick.cyclic_y = if ap.enabled && ap.vertical_mode != VerticalMode::Off {
            axis_value(self.pitch_pid.output())
        } else {
            sensors.cyclic_y_calibrated
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim_link::TelemetryMessage;

    #[derive(Default)]
    struct Beeps(heapless::Vec<BeepPattern, 8>);

    impl Alarm for Beeps {
        fn sound(&mut self, pattern: BeepPattern) {
            let _ = self.0.push(pattern);
        }
    }

    fn t(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn flying(now: Instant) -> AppState {
        let mut state = AppState::default();
        TelemetryMessage {
            spd: Some(80.0),
            alt: Some(2_000.0),
            pitch: Some(2.0),
            roll: Some(-1.0),
            hdg: Some(90.0),
            vs: Some(0.0),
        }
        .apply(&mut state.simulator, now);
        state.sensors.cyclic_x_calibrated = 5_400;
        state.sensors.cyclic_y_calibrated = 4_700;
        state.sensors.collective_calibrated = 6_000;
        state
    }

    fn telemetry(state: &mut AppState, msg: TelemetryMessage, now: Instant) {
        msg.apply(&mut state.simulator, now);
    }

    #[test]
    fn heading_error_takes_the_short_way() {
        assert_eq!(wrap_heading_error(350.0 - 10.0), -20.0);
        assert_eq!(wrap_heading_error(10.0 - 350.0), 20.0);
        assert_eq!(wrap_heading_error(180.0), 180.0);
        assert_eq!(wrap_heading_error(-180.0), 180.0);
        assert_eq!(wrap_heading_error(725.0), 5.0);
        assert_eq!(wrap_heading_error(f32::NAN), 0.0);
    }

    #[test]
    fn heading_error_folds_huge_values_in_one_step() {
        for error in [1e10_f32, -1e10, 1e30, -1e30, f32::MAX, f32::MIN] {
            let wrapped = wrap_heading_error(error);
            assert!(wrapped.is_finite());
            assert!(wrapped > -180.0 && wrapped <= 180.0, "{} -> {}", error, wrapped);
        }
        assert_eq!(wrap_heading_error(-725.0), -5.0);
        assert_eq!(wrap_heading_error(540.0), 180.0);
    }

    #[test]
    fn heading_hold_banks_towards_target() {
        let mut ap = AutopilotController::new();
        let mut beeps = Beeps::default();
        let mut state = flying(t(0));
        ap.enable(&mut state, t(0)).unwrap();
        state.autopilot.selected_heading = 10.0;
        ap.set_horizontal_mode(&mut state, HorizontalMode::HeadingHold, t(0));

        telemetry(&mut state, TelemetryMessage { hdg: Some(350.0), ..Default::default() }, t(10));
        ap.update(&mut state, t(10), &mut beeps);
        // -20 deg error, heading gain -1: 20 deg right bank.
        assert_eq!(state.autopilot.selected_roll, 20.0);

        state.autopilot.selected_heading = 270.0;
        telemetry(&mut state, TelemetryMessage { hdg: Some(90.0), ..Default::default() }, t(20));
        ap.update(&mut state, t(20), &mut beeps);
        assert_eq!(state.autopilot.selected_roll.abs(), MAX_BANK_DEG);
    }

    #[test]
    fn heading_hold_survives_absurd_heading() {
        let mut ap = AutopilotController::new();
        let mut beeps = Beeps::default();
        let mut state = flying(t(0));
        ap.enable(&mut state, t(0)).unwrap();
        state.autopilot.selected_heading = 0.0;
        ap.set_horizontal_mode(&mut state, HorizontalMode::HeadingHold, t(0));

        for (i, hdg) in [1e10_f32, 1e30].into_iter().enumerate() {
            let now = t(10 * (i as u64 + 1));
            telemetry(&mut state, TelemetryMessage { hdg: Some(hdg), ..Default::default() }, now);
            ap.update(&mut state, now, &mut beeps);
            assert!(state.autopilot.selected_roll.abs() <= MAX_BANK_DEG);
        }
    }

    #[test]
    fn stale_telemetry_denies_engage() {
        let mut ap = AutopilotController::new();
        let mut state = flying(t(0));
        let before = state;
        assert_eq!(ap.enable(&mut state, t(6_000)), Err(EngageError::NoTelemetry));
        assert_eq!(state, before);
        assert!(!ap.pitch_pid().is_enabled());
    }

    #[test]
    fn slow_aircraft_denies_engage() {
        let mut ap = AutopilotController::new();
        let mut state = flying(t(0));
        state.simulator.speed = 12.0;
        assert_eq!(ap.enable(&mut state, t(10)), Err(EngageError::TooSlow { speed: 12.0 }));
        assert!(!state.autopilot.enabled);
    }

    #[test]
    fn engage_captures_attitude_and_defaults_modes() {
        let mut ap = AutopilotController::new();
        let mut state = flying(t(0));
        ap.enable(&mut state, t(10)).unwrap();
        assert!(state.autopilot.enabled);
        assert_eq!(state.autopilot.horizontal_mode, HorizontalMode::RollHold);
        assert_eq!(state.autopilot.vertical_mode, VerticalMode::PitchHold);
        assert_eq!(state.autopilot.selected_pitch, 2.0);
        assert_eq!(state.autopilot.selected_roll, -1.0);
    }

    #[test]
    fn engage_is_bumpless() {
        let mut ap = AutopilotController::new();
        let mut beeps = Beeps::default();
        let mut state = flying(t(0));

        ap.update(&mut state, t(0), &mut beeps);
        let manual = state.joystick;
        assert_eq!((manual.cyclic_x, manual.cyclic_y), (5_400, 4_700));

        ap.enable(&mut state, t(10)).unwrap();
        telemetry(&mut state, TelemetryMessage { spd: Some(80.0), ..Default::default() }, t(10));
        ap.update(&mut state, t(10), &mut beeps);
        assert!((state.joystick.cyclic_x - manual.cyclic_x).abs() <= 1);
        assert!((state.joystick.cyclic_y - manual.cyclic_y).abs() <= 1);
        assert_eq!(state.joystick.collective, 6_000);
    }

    #[test]
    fn engage_near_the_stops_is_bumpless() {
        let mut ap = AutopilotController::new();
        let mut beeps = Beeps::default();
        let mut state = flying(t(0));
        state.sensors.cyclic_x_calibrated = 9_000;
        state.sensors.cyclic_y_calibrated = 1_000;

        ap.update(&mut state, t(0), &mut beeps);
        assert_eq!((state.joystick.cyclic_x, state.joystick.cyclic_y), (9_000, 1_000));

        ap.enable(&mut state, t(10)).unwrap();
        telemetry(&mut state, TelemetryMessage { spd: Some(80.0), ..Default::default() }, t(10));
        ap.update(&mut state, t(10), &mut beeps);
        assert!((state.joystick.cyclic_x - 9_000).abs() <= 1);
        assert!((state.joystick.cyclic_y - 1_000).abs() <= 1);
    }

    #[test]
    fn output_is_held_between_telemetry_updates() {
        let mut ap = AutopilotController::new();
        let mut beeps = Beeps::default();
        let mut state = flying(t(0));
        ap.enable(&mut state, t(0)).unwrap();

        telemetry(&mut state, TelemetryMessage { pitch: Some(5.0), ..Default::default() }, t(10));
        ap.update(&mut state, t(10), &mut beeps);
        let held = state.joystick.cyclic_y;
        assert!(!state.simulator.data_updated);
        // Nose above target: reverse acting loop pushes the stick forward.
        assert!(held > 4_700);

        state.simulator.pitch = -10.0;
        ap.update(&mut state, t(20), &mut beeps);
        assert_eq!(state.joystick.cyclic_y, held);
    }

    #[test]
    fn off_axis_passes_sensor_through() {
        let mut ap = AutopilotController::new();
        let mut beeps = Beeps::default();
        let mut state = flying(t(0));
        ap.enable(&mut state, t(0)).unwrap();
        ap.set_horizontal_mode(&mut state, HorizontalMode::Off, t(0));
        state.sensors.cyclic_x_calibrated = 7_777;
        ap.update(&mut state, t(10), &mut beeps);
        assert_eq!(state.joystick.cyclic_x, 7_777);
        assert!(!ap.roll_pid().is_enabled());
        assert!(ap.pitch_pid().is_enabled());
    }

    #[test]
    fn vertical_speed_hold_pitches_down_when_climbing() {
        let mut ap = AutopilotController::new();
        let mut beeps = Beeps::default();
        let mut state = flying(t(0));
        ap.enable(&mut state, t(0)).unwrap();
        state.autopilot.selected_vertical_speed = 0.0;
        ap.set_vertical_mode(&mut state, VerticalMode::VerticalSpeedHold, t(0));

        telemetry(&mut state, TelemetryMessage { vs: Some(500.0), ..Default::default() }, t(10));
        ap.update(&mut state, t(10), &mut beeps);
        assert!(state.autopilot.selected_pitch < 2.0);
    }

    #[test]
    fn vs_integral_is_bounded() {
        let mut ap = AutopilotController::new();
        let mut beeps = Beeps::default();
        let mut state = flying(t(0));
        ap.enable(&mut state, t(0)).unwrap();
        ap.set_vertical_mode(&mut state, VerticalMode::VerticalSpeedHold, t(0));

        for i in 1..=500u64 {
            telemetry(&mut state, TelemetryMessage { vs: Some(-2_000.0), ..Default::default() }, t(i * 10));
            ap.update(&mut state, t(i * 10), &mut beeps);
        }
        let limit = VS_INTEGRAL_SHARE * MAX_PITCH_DEG / VS_KI.abs();
        assert!((ap.vs_integral().abs() - limit).abs() < 1e-2);
        assert!(state.autopilot.selected_pitch <= MAX_PITCH_DEG);
    }

    #[test]
    fn altitude_hold_entry_seeds_integral_from_pitch() {
        let mut ap = AutopilotController::new();
        let mut state = flying(t(0));
        ap.enable(&mut state, t(0)).unwrap();
        ap.set_vertical_mode(&mut state, VerticalMode::AltitudeHold, t(0));
        assert_eq!(ap.vs_integral(), 2.0 / VS_KI);
    }

    #[test]
    fn vertical_speed_hold_entry_clears_integral() {
        let mut ap = AutopilotController::new();
        let mut state = flying(t(0));
        ap.enable(&mut state, t(0)).unwrap();
        ap.set_vertical_mode(&mut state, VerticalMode::AltitudeHold, t(0));
        assert_ne!(ap.vs_integral(), 0.0);

        ap.set_vertical_mode(&mut state, VerticalMode::VerticalSpeedHold, t(0));
        assert_eq!(ap.vs_integral(), 0.0);
        assert_eq!(state.autopilot.selected_pitch, 2.0);
    }

    #[test]
    fn altitude_capture_fires_once_and_keeps_integral() {
        let mut ap = AutopilotController::new();
        let mut beeps = Beeps::default();
        let mut state = flying(t(0));
        ap.enable(&mut state, t(0)).unwrap();
        state.autopilot.selected_altitude = 2_500.0;
        state.autopilot.selected_vertical_speed = 500.0;
        ap.set_vertical_mode(&mut state, VerticalMode::VerticalSpeedHold, t(0));
        state.autopilot.alt_capture_armed = true;

        let mut transitions = 0;
        let mut ms = 0;
        for alt in [2_300.0, 2_400.0, 2_440.0, 2_460.0, 2_480.0, 2_520.0] {
            ms += 10;
            telemetry(&mut state, TelemetryMessage { alt: Some(alt), vs: Some(450.0), ..Default::default() }, t(ms));

            let before = state.autopilot.vertical_mode;
            // Law first, capture second, as in `update`.
            ap.run_laws(&mut state);
            let integral = ap.vs_integral();
            ap.check_altitude_capture(&mut state);
            assert_eq!(ap.vs_integral(), integral);
            state.simulator.data_updated = false;

            if before != state.autopilot.vertical_mode {
                transitions += 1;
                assert_eq!(alt, 2_460.0);
            }
        }
        assert_eq!(transitions, 1);
        assert_eq!(state.autopilot.vertical_mode, VerticalMode::AltitudeHold);
        assert!(!state.autopilot.alt_capture_armed);
        assert!(beeps.0.is_empty());
    }

    #[test]
    fn telemetry_loss_disengages_once() {
        let mut ap = AutopilotController::new();
        let mut beeps = Beeps::default();
        let mut state = flying(t(0));
        ap.enable(&mut state, t(0)).unwrap();

        assert_eq!(ap.update(&mut state, t(4_999), &mut beeps), None);
        assert!(state.autopilot.enabled);

        assert_eq!(ap.update(&mut state, t(5_000), &mut beeps), Some(DisengageReason::TelemetryLost));
        assert!(!state.autopilot.enabled);
        assert_eq!(state.autopilot.horizontal_mode, HorizontalMode::Off);
        assert_eq!(state.autopilot.vertical_mode, VerticalMode::Off);
        assert!(!ap.pitch_pid().is_enabled());
        assert!(!ap.roll_pid().is_enabled());

        assert_eq!(ap.update(&mut state, t(5_010), &mut beeps), None);
        assert_eq!(beeps.0.as_slice(), &[BeepPattern::Triple]);
        assert_eq!(state.joystick.cyclic_x, state.sensors.cyclic_x_calibrated);
    }

    #[test]
    fn low_speed_disengages() {
        let mut ap = AutopilotController::new();
        let mut beeps = Beeps::default();
        let mut state = flying(t(0));
        ap.enable(&mut state, t(0)).unwrap();
        telemetry(&mut state, TelemetryMessage { spd: Some(20.0), ..Default::default() }, t(10));
        assert_eq!(
            ap.update(&mut state, t(10), &mut beeps),
            Some(DisengageReason::TooSlow { speed: 20.0 })
        );
        assert!(!state.autopilot.enabled);
    }

    #[test]
    fn mode_change_while_engaged_is_bumpless() {
        let mut ap = AutopilotController::new();
        let mut beeps = Beeps::default();
        let mut state = flying(t(0));
        ap.enable(&mut state, t(0)).unwrap();
        ap.set_horizontal_mode(&mut state, HorizontalMode::Off, t(0));
        state.sensors.cyclic_x_calibrated = 6_100;
        ap.update(&mut state, t(10), &mut beeps);
        assert_eq!(state.joystick.cyclic_x, 6_100);

        // Roll hold recaptures the current roll, so the error is zero.
        ap.set_horizontal_mode(&mut state, HorizontalMode::RollHold, t(10));
        telemetry(&mut state, TelemetryMessage { spd: Some(80.0), ..Default::default() }, t(20));
        ap.update(&mut state, t(20), &mut beeps);
        assert_eq!(state.joystick.cyclic_x, 6_100);
    }
}
