//! Application state shared between the control tick and the status task.
//!
//! The control tick is the only writer. The status task reads a copy taken
//! under the same critical section, and sends changes back as commands.
//! All types are `Copy` so that copy is a plain memcpy.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;

use crate::config::*;
use crate::drivers::cyclic_link::LinkCounters;
use crate::drivers::sim_link::SimLinkCounters;

// ── Autopilot ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HorizontalMode {
    #[default]
    Off,
    RollHold,
    HeadingHold,
}

impl HorizontalMode {
    pub const fn mnemonic(self) -> &'static str {
        match self {
            HorizontalMode::Off => "off",
            HorizontalMode::RollHold => "roll",
            HorizontalMode::HeadingHold => "hdg",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VerticalMode {
    #[default]
    Off,
    PitchHold,
    VerticalSpeedHold,
    AltitudeHold,
}

impl VerticalMode {
    pub const fn mnemonic(self) -> &'static str {
        match self {
            VerticalMode::Off => "off",
            VerticalMode::PitchHold => "pitch",
            VerticalMode::VerticalSpeedHold => "vs",
            VerticalMode::AltitudeHold => "alts",
        }
    }

    /// Modes whose pitch target comes from the vertical-speed loop.
    pub const fn uses_vs_loop(self) -> bool {
        matches!(self, VerticalMode::VerticalSpeedHold | VerticalMode::AltitudeHold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Gains {
    pub pitch: PidGains,
    pub roll: PidGains,
    pub heading_kp: f32,
    pub vs_kp: f32,
    pub vs_ki: f32,
    pub alt_kp: f32,
}

impl Gains {
    pub const fn new() -> Self {
        Self {
            pitch: PidGains { kp: PITCH_KP, ki: PITCH_KI, kd: PITCH_KD },
            roll: PidGains { kp: ROLL_KP, ki: ROLL_KI, kd: ROLL_KD },
            heading_kp: HEADING_KP,
            vs_kp: VS_KP,
            vs_ki: VS_KI,
            alt_kp: ALT_KP,
        }
    }
}

impl Default for Gains {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutopilotState {
    pub enabled: bool,
    pub horizontal_mode: HorizontalMode,
    pub vertical_mode: VerticalMode,

    pub selected_heading: f32,
    pub selected_altitude: f32,
    pub selected_vertical_speed: f32,
    /// Inner pitch-loop target; smoothed output of the VS loop in VS/ALT.
    pub selected_pitch: f32,
    /// Inner roll-loop target; follows the heading loop in HDG.
    pub selected_roll: f32,

    /// Armed to switch to altitude hold on reaching `selected_altitude`.
    pub alt_capture_armed: bool,

    pub gains: Gains,
}

impl AutopilotState {
    pub const fn new() -> Self {
        Self {
            enabled: false,
            horizontal_mode: HorizontalMode::Off,
            vertical_mode: VerticalMode::Off,
            selected_heading: 0.0,
            selected_altitude: 0.0,
            selected_vertical_speed: 0.0,
            selected_pitch: 0.0,
            selected_roll: 0.0,
            alt_capture_armed: false,
            gains: Gains::new(),
        }
    }
}

impl Default for AutopilotState {
    fn default() -> Self {
        Self::new()
    }
}

// ── Simulator telemetry ───────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SimulatorState {
    /// At least one line received and none older than the staleness window.
    pub valid: bool,
    /// Raised by the line parser, cleared by the autopilot once consumed.
    pub data_updated: bool,
    pub last_update: Option<Instant>,

    pub speed: f32,
    pub altitude: f32,
    pub pitch: f32,
    pub roll: f32,
    /// Degrees, 0-360.
    pub heading: f32,
    pub vertical_speed: f32,
}

impl SimulatorState {
    pub const fn new() -> Self {
        Self {
            valid: false,
            data_updated: false,
            last_update: None,
            speed: 0.0,
            altitude: 0.0,
            pitch: 0.0,
            roll: 0.0,
            heading: 0.0,
            vertical_speed: 0.0,
        }
    }
}

// ── Sensors ───────────────────────────────────────────────────────────────────

/// Raw counts 0-4095 and calibrated axis values 0-10000, centre 5000.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorState {
    pub cyclic_x_raw: u16,
    pub cyclic_x_calibrated: i16,
    pub cyclic_y_raw: u16,
    pub cyclic_y_calibrated: i16,
    pub collective_raw: u16,
    pub collective_calibrated: i16,
    /// A good frame arrived within the cyclic validity window.
    pub cyclic_valid: bool,
}

impl SensorState {
    pub const fn new() -> Self {
        Self {
            cyclic_x_raw: 0,
            cyclic_x_calibrated: AXIS_CENTER,
            cyclic_y_raw: 0,
            cyclic_y_calibrated: AXIS_CENTER,
            collective_raw: 0,
            collective_calibrated: AXIS_CENTER,
            cyclic_valid: false,
        }
    }
}

impl Default for SensorState {
    fn default() -> Self {
        Self::new()
    }
}

// ── Joystick output ───────────────────────────────────────────────────────────

/// What the host sees. Cyclic X/Y follow the sensors unless the autopilot
/// drives them; the collective always follows its sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JoystickState {
    pub cyclic_x: i16,
    pub cyclic_y: i16,
    pub collective: i16,
    /// One bit per HID button. Filled in by the external button scanner
    /// and report translator; the core only carries it through.
    pub buttons: u32,
}

impl JoystickState {
    pub const fn new() -> Self {
        Self {
            cyclic_x: AXIS_CENTER,
            cyclic_y: AXIS_CENTER,
            collective: AXIS_CENTER,
            buttons: 0,
        }
    }
}

impl Default for JoystickState {
    fn default() -> Self {
        Self::new()
    }
}

// ── Diagnostics ───────────────────────────────────────────────────────────────

/// Link counters and tick timing, copied in by the control tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
    pub cyclic_link: LinkCounters,
    pub sim_link: SimLinkCounters,
    pub tick_last_us: u32,
    pub tick_max_us: u32,
    pub slow_ticks: u32,
}

impl Diagnostics {
    pub const fn new() -> Self {
        Self {
            cyclic_link: LinkCounters {
                frames_ok: 0,
                end_marker_errors: 0,
                checksum_errors: 0,
                resyncs: 0,
            },
            sim_link: SimLinkCounters { lines_ok: 0, malformed: 0, overflows: 0 },
            tick_last_us: 0,
            tick_max_us: 0,
            slow_ticks: 0,
        }
    }
}

// ── Whole application ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppState {
    pub autopilot: AutopilotState,
    pub simulator: SimulatorState,
    pub sensors: SensorState,
    pub joystick: JoystickState,
    pub diagnostics: Diagnostics,
    /// Emit a CSV record with every status publication.
    pub recording_enabled: bool,
    /// Steppers chase the joystick output while the autopilot flies.
    pub cyclic_feedback_enabled: bool,
    /// Cyclic motors energised.
    pub cyclic_held: bool,
    /// Collective friction motor energised.
    pub collective_held: bool,
}

impl AppState {
    pub const fn new() -> Self {
        Self {
            autopilot: AutopilotState::new(),
            simulator: SimulatorState::new(),
            sensors: SensorState::new(),
            joystick: JoystickState::new(),
            diagnostics: Diagnostics::new(),
            recording_enabled: false,
            cyclic_feedback_enabled: true,
            cyclic_held: false,
            collective_held: false,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedState = Mutex<CriticalSectionRawMutex, RefCell<AppState>>;

pub const fn new_shared_state() -> SharedState {
    Mutex::new(RefCell::new(AppState::new()))
}

/// Consistent copy for readers outside the control tick.
pub fn snapshot(shared: &SharedState) -> AppState {
    shared.lock(|state| *state.borrow())
}

/// Replaces the shared state with `state`. Only the control tick calls this.
pub fn publish(shared: &SharedState, state: &AppState) {
    shared.lock(|cell| *cell.borrow_mut() = *state);
}
