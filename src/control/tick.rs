//! One control tick, in a fixed order:
//! commands, cyclic ingest, telemetry ingest, calibration, autopilot,
//! servo, diagnostics. Nothing in here waits.

use embassy_time::{Duration, Instant};

use crate::config::*;
use crate::drivers::alarm::{Alarm, BeepPattern};
use crate::drivers::cyclic_link::CyclicLink;
use crate::drivers::sim_link::{refresh_validity, SimLink};
use crate::drivers::stepper::{MotorGroup, Stepper};
use crate::error::{DisengageReason, EngageError};
use crate::state::AppState;

use super::autopilot::AutopilotController;
use super::commands::{Command, InnerLoop, OuterGain, Target};
use super::servo::{PositionServo, ServoSteps};

/// Everything the tick consumes from the outside world this period.
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    pub now: Instant,
    /// Bytes drained from the cyclic sensor UART since the last tick.
    pub cyclic_bytes: &'a [u8],
    /// Bytes drained from the simulator UART since the last tick.
    pub sim_bytes: &'a [u8],
    pub collective_raw: u16,
    pub commands: &'a [Command],
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub cyclic_sample: bool,
    pub telemetry_lines: usize,
    pub engage_denied: Option<EngageError>,
    pub disengaged: Option<DisengageReason>,
    pub steps: ServoSteps,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickProfile {
    pub last: Duration,
    pub max: Duration,
    pub slow: u32,
}

impl TickProfile {
    /// Returns true when the tick overran the slow threshold.
    pub fn record(&mut self, elapsed: Duration) -> bool {
        self.last = elapsed;
        if elapsed > self.max {
            self.max = elapsed;
        }
        if elapsed > SLOW_TICK {
            self.slow = self.slow.wrapping_add(1);
            return true;
        }
        false
    }
}

fn micros(d: Duration) -> u32 {
    u32::try_from(d.as_micros()).unwrap_or(u32::MAX)
}

/// Owns every piece of per-tick machinery plus the two output capabilities.
pub struct ControlLoop<S, A> {
    cyclic: CyclicLink,
    sim: SimLink,
    autopilot: AutopilotController,
    servo: PositionServo,
    profile: TickProfile,
    stepper: S,
    alarm: A,
}

impl<S: Stepper, A: Alarm> ControlLoop<S, A> {
    pub fn new(stepper: S, alarm: A) -> Self {
        Self {
            cyclic: CyclicLink::new(),
            sim: SimLink::new(),
            autopilot: AutopilotController::new(),
            servo: PositionServo::new(),
            profile: TickProfile::default(),
            stepper,
            alarm,
        }
    }

    pub fn autopilot(&self) -> &AutopilotController {
        &self.autopilot
    }

    pub fn stepper(&self) -> &S {
        &self.stepper
    }

    pub fn alarm(&self) -> &A {
        &self.alarm
    }

    pub fn profile(&self) -> TickProfile {
        self.profile
    }

    pub fn tick(&mut self, state: &mut AppState, input: TickInput<'_>) -> TickOutcome {
        let now = input.now;
        let mut outcome = TickOutcome::default();

        for &command in input.commands {
            if let Err(err) = self.apply_command(state, command, now) {
                outcome.engage_denied = Some(err);
            }
        }

        // Cyclic sensors. Calibrated values only move when a frame lands.
        if let Some(sample) = self.cyclic.push_bytes(input.cyclic_bytes, now) {
            let sensors = &mut state.sensors;
            sensors.cyclic_x_raw = sample.sensor_a;
            sensors.cyclic_y_raw = sample.sensor_b;
            sensors.cyclic_x_calibrated = CYCLIC_X_CALIBRATION.map(sample.sensor_a);
            sensors.cyclic_y_calibrated = CYCLIC_Y_CALIBRATION.map(sample.sensor_b);
            outcome.cyclic_sample = true;
        }
        state.sensors.cyclic_valid = self.cyclic.is_valid(now);

        outcome.telemetry_lines = self.sim.push_data(input.sim_bytes, &mut state.simulator, now);
        refresh_validity(&mut state.simulator, now);

        state.sensors.collective_raw = input.collective_raw;
        state.sensors.collective_calibrated = COLLECTIVE_CALIBRATION.map(input.collective_raw);

        outcome.disengaged = self.autopilot.update(state, now, &mut self.alarm);
        outcome.steps = self.servo.update(state, now, &mut self.stepper);

        state.diagnostics.cyclic_link = self.cyclic.counters;
        state.diagnostics.sim_link = self.sim.counters;
        outcome
    }

    /// Call after `tick` with its wall-clock duration.
    pub fn record_tick_duration(&mut self, state: &mut AppState, elapsed: Duration) {
        if self.profile.record(elapsed) {
            warn!("slow control tick: {} us", micros(elapsed));
        }
        state.diagnostics.tick_last_us = micros(self.profile.last);
        state.diagnostics.tick_max_us = micros(self.profile.max);
        state.diagnostics.slow_ticks = self.profile.slow;
    }

    pub fn apply_command(&mut self, state: &mut AppState, command: Command, now: Instant) -> Result<(), EngageError> {
        match command {
            Command::SetEnabled(true) => return self.autopilot.enable(state, now),
            Command::SetEnabled(false) => self.autopilot.disable(state),
            Command::SetHorizontalMode(mode) => self.autopilot.set_horizontal_mode(state, mode, now),
            Command::SetVerticalMode(mode) => self.autopilot.set_vertical_mode(state, mode, now),
            Command::SetSelected(target, value) => {
                let ap = &mut state.autopilot;
                match target {
                    Target::Heading => ap.selected_heading = normalize_heading(value),
                    Target::Pitch => ap.selected_pitch = value,
                    Target::Roll => ap.selected_roll = value,
                    Target::Altitude => ap.selected_altitude = value,
                    Target::VerticalSpeed => ap.selected_vertical_speed = value,
                }
            }
            Command::ArmAltitudeCapture(armed) => {
                state.autopilot.alt_capture_armed = armed;
                info!("altitude capture armed: {}", armed);
            }
            Command::SetPidGains(inner, gains) => {
                match inner {
                    InnerLoop::Pitch => state.autopilot.gains.pitch = gains,
                    InnerLoop::Roll => state.autopilot.gains.roll = gains,
                }
                self.autopilot.apply_gains(&state.autopilot.gains);
            }
            Command::SetOuterGain(gain, value) => {
                let gains = &mut state.autopilot.gains;
                match gain {
                    OuterGain::Heading => gains.heading_kp = value,
                    OuterGain::VerticalSpeed => gains.vs_kp = value,
                    OuterGain::VerticalSpeedIntegral => gains.vs_ki = value,
                    OuterGain::Altitude => gains.alt_kp = value,
                }
            }
            Command::SetFeedbackEnabled(enabled) => state.cyclic_feedback_enabled = enabled,
            Command::SetCyclicHold(held) => self.set_hold(state, MotorGroup::Cyclic, held),
            Command::ToggleCyclicHold => {
                let held = !state.cyclic_held;
                self.set_hold(state, MotorGroup::Cyclic, held);
            }
            Command::SetCollectiveHold(held) => self.set_hold(state, MotorGroup::Collective, held),
            Command::ToggleCollectiveHold => {
                let held = !state.collective_held;
                self.set_hold(state, MotorGroup::Collective, held);
            }
            Command::SetRecording(enabled) => state.recording_enabled = enabled,
        }
        Ok(())
    }

    /// Double beep on engage, single beep on release. No-op when unchanged.
    fn set_hold(&mut self, state: &mut AppState, group: MotorGroup, held: bool) {
        let flag = match group {
            MotorGroup::Cyclic => &mut state.cyclic_held,
            MotorGroup::Collective => &mut state.collective_held,
        };
        if *flag == held {
            return;
        }
        *flag = held;
        self.stepper.hold(group, held);
        self.alarm.sound(if held { BeepPattern::Double } else { BeepPattern::Single });
        info!("{} hold: {}", group, held);
    }
}

/// Folds any heading into [0, 360).
fn normalize_heading(heading: f32) -> f32 {
    let h = heading % 360.0;
    if h < 0.0 {
        h + 360.0
    } else {
        h
    }
}
