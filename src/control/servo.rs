use embassy_time::{Duration, Instant};

use crate::config::{
    FEEDBACK_DEADBAND, FEEDBACK_STEP_INTERVAL, FEEDBACK_X_DIR_POSITIVE, FEEDBACK_Y_DIR_POSITIVE,
};
use crate::drivers::stepper::{CyclicAxis, StepDirection, Stepper};
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
struct AxisDrive {
    axis: CyclicAxis,
    /// DIR level that increases the sensor reading.
    positive: StepDirection,
    last_step: Option<Instant>,
}

impl AxisDrive {
    const fn new(axis: CyclicAxis, positive_level: bool) -> Self {
        Self { axis, positive: StepDirection::from_level(positive_level), last_step: None }
    }

    fn ready(&self, now: Instant, interval: Duration) -> bool {
        match self.last_step {
            Some(t) => now.saturating_duration_since(t) >= interval,
            None => true,
        }
    }
}

/// Drags the physical cyclic towards the autopilot's output, one step per
/// axis per tick at most.
pub struct PositionServo {
    x: AxisDrive,
    y: AxisDrive,
    deadband: i32,
    interval: Duration,
}

/// Steps issued in one update.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServoSteps {
    pub x: Option<StepDirection>,
    pub y: Option<StepDirection>,
}

impl Default for PositionServo {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionServo {
    pub const fn new() -> Self {
        Self::with_limits(FEEDBACK_DEADBAND, FEEDBACK_STEP_INTERVAL)
    }

    pub const fn with_limits(deadband: i32, interval: Duration) -> Self {
        Self {
            x: AxisDrive::new(CyclicAxis::X, FEEDBACK_X_DIR_POSITIVE),
            y: AxisDrive::new(CyclicAxis::Y, FEEDBACK_Y_DIR_POSITIVE),
            deadband,
            interval,
        }
    }

    /// Feedback on, autopilot flying, motors held and the position reading
    /// trustworthy.
    pub fn is_active(state: &AppState) -> bool {
        state.cyclic_feedback_enabled
            && state.autopilot.enabled
            && state.cyclic_held
            && state.sensors.cyclic_valid
    }

    pub fn update<S: Stepper>(&mut self, state: &AppState, now: Instant, stepper: &mut S) -> ServoSteps {
        if !Self::is_active(state) {
            return ServoSteps::default();
        }
        let (deadband, interval) = (self.deadband, self.interval);
        ServoSteps {
            x: Self::drive(
                &mut self.x,
                state.joystick.cyclic_x,
                state.sensors.cyclic_x_calibrated,
                deadband,
                interval,
                now,
                stepper,
            ),
            y: Self::drive(
                &mut self.y,
                state.joystick.cyclic_y,
                state.sensors.cyclic_y_calibrated,
                deadband,
                interval,
                now,
                stepper,
            ),
        }
    }

    fn drive<S: Stepper>(
        drive: &mut AxisDrive,
        commanded: i16,
        measured: i16,
        deadband: i32,
        interval: Duration,
        now: Instant,
        stepper: &mut S,
    ) -> Option<StepDirection> {
        let error = commanded as i32 - measured as i32;
        if error.abs() <= deadband || !drive.ready(now, interval) {
            return None;
        }
        let direction = if error > 0 { drive.positive } else { drive.positive.reversed() };
        stepper.step(drive.axis, direction);
        drive.last_step = Some(now);
        Some(direction)
    }
}
