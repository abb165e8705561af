//! Compiled-in tunables. Nothing is persisted; runtime-adjustable values are
//! seeded from here at every start.

use embassy_time::Duration;

use crate::drivers::calibration::AxisCalibration;

// ── Timing ────────────────────────────────────────────────────────────────────

/// Control tick period (100 Hz).
pub const TICK_PERIOD: Duration = Duration::from_millis(10);
/// A tick slower than this is logged.
pub const SLOW_TICK: Duration = Duration::from_millis(50);
/// Cyclic sensor link is considered live for this long after a good frame.
pub const CYCLIC_VALID_TIMEOUT: Duration = Duration::from_millis(500);
/// Telemetry older than this can neither engage nor keep the autopilot on.
pub const SIMULATOR_VALID_TIMEOUT: Duration = Duration::from_millis(5000);
/// Status publication period on the USB link (20 Hz).
pub const STATUS_PERIOD: Duration = Duration::from_millis(50);
/// Button must be stable this long before an edge is reported.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(50);

// ── Serial links ──────────────────────────────────────────────────────────────

pub const CYCLIC_SERIAL_BAUD: u32 = 115_200;
pub const SIM_SERIAL_BAUD: u32 = 115_200;
/// Longest telemetry line kept, terminator excluded.
pub const SIM_LINE_CAPACITY: usize = 256;

// ── Axis range ────────────────────────────────────────────────────────────────

/// Native full scale of the 12-bit angle sensors and the collective ADC.
pub const SENSOR_FULL_SCALE: u16 = 4096;
pub const AXIS_MIN: i16 = 0;
pub const AXIS_MAX: i16 = 10_000;
pub const AXIS_CENTER: i16 = 5_000;

pub const CYCLIC_X_CALIBRATION: AxisCalibration = AxisCalibration::new(1_120, 2_980, false);
pub const CYCLIC_Y_CALIBRATION: AxisCalibration = AxisCalibration::new(1_050, 3_010, true);
/// Travel is 1370 -> 4095 -> 0 -> 1500, across the ADC wrap.
pub const COLLECTIVE_CALIBRATION: AxisCalibration = AxisCalibration::new(1_370, 1_500, false);

// ── Autopilot ─────────────────────────────────────────────────────────────────

pub const PITCH_KP: f32 = 120.0;
pub const PITCH_KI: f32 = 4.0;
pub const PITCH_KD: f32 = 40.0;
pub const ROLL_KP: f32 = 100.0;
pub const ROLL_KI: f32 = 3.0;
pub const ROLL_KD: f32 = 30.0;

/// Degrees of bank per degree of heading error. Error is measured minus
/// target, hence the sign.
pub const HEADING_KP: f32 = -1.0;
/// Degrees of pitch per ft/min of vertical-speed error (measured minus target).
pub const VS_KP: f32 = -0.01;
/// Integral gain of the vertical-speed loop, per telemetry update.
pub const VS_KI: f32 = -0.000_5;
/// ft/min per ft of altitude error (target minus measured).
pub const ALT_KP: f32 = 5.0;

/// Symmetric limit of each inner PID output, in axis units around centre.
/// Spans the whole half axis so a manual deflection is reseeded unclipped.
pub const PID_AUTHORITY: f32 = (AXIS_MAX - AXIS_CENTER) as f32;
pub const MAX_PITCH_DEG: f32 = 15.0;
pub const MAX_BANK_DEG: f32 = 25.0;
pub const MAX_VERTICAL_SPEED: f32 = 1_000.0;
/// Share of `MAX_PITCH_DEG` the vertical-speed integral may contribute.
pub const VS_INTEGRAL_SHARE: f32 = 0.8;
/// Weight of the previous selected pitch when smoothing the outer loop.
pub const PITCH_SMOOTHING: f32 = 0.9;

/// Below this airspeed the autopilot refuses to engage and drops out.
pub const AP_MIN_SPEED: f32 = 30.0;
/// Altitude error at which an armed capture switches to altitude hold.
pub const ALT_CAPTURE_WINDOW: f32 = 50.0;

// ── Position servo ────────────────────────────────────────────────────────────

/// Errors at or below this many axis units produce no step.
pub const FEEDBACK_DEADBAND: i32 = 150;
/// Minimum time between two steps on the same axis.
pub const FEEDBACK_STEP_INTERVAL: Duration = Duration::from_millis(4);
/// Direction pin level that moves each axis towards larger readings.
pub const FEEDBACK_X_DIR_POSITIVE: bool = true;
pub const FEEDBACK_Y_DIR_POSITIVE: bool = false;
