//! Status surface for the secondary context: a JSON snapshot of the whole
//! state, and the CSV flight record emitted while recording.

use core::fmt::Write;

use embassy_time::Instant;
use serde::Serialize;

use crate::drivers::sim_link::telemetry_age;
use crate::state::AppState;

/// Enough for the largest record with every float at full width.
pub const CSV_RECORD_CAPACITY: usize = 192;
pub const STATUS_JSON_CAPACITY: usize = 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorStatus {
    pub cyclic_x: i16,
    pub cyclic_y: i16,
    pub collective: i16,
    pub cyclic_valid: bool,
    pub raw_x: u16,
    pub raw_y: u16,
    pub raw_z: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoystickStatus {
    pub cyclic_x: i16,
    pub cyclic_y: i16,
    pub collective: i16,
    pub buttons: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutopilotStatus {
    pub enabled: bool,
    pub horizontal_mode: &'static str,
    pub vertical_mode: &'static str,
    pub alt_capture_armed: bool,
    pub selected_heading: f32,
    pub selected_altitude: f32,
    pub selected_vertical_speed: f32,
    pub selected_pitch: f32,
    pub selected_roll: f32,
    pub pitch_kp: f32,
    pub pitch_ki: f32,
    pub pitch_kd: f32,
    pub roll_kp: f32,
    pub roll_ki: f32,
    pub roll_kd: f32,
    pub heading_kp: f32,
    pub vs_kp: f32,
    pub vs_ki: f32,
    pub alt_kp: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorStatus {
    pub valid: bool,
    /// `u32::MAX` until the first line arrives.
    pub age_ms: u32,
    pub spd: f32,
    pub alt: f32,
    pub pitch: f32,
    pub roll: f32,
    pub hdg: f32,
    pub vs: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticStatus {
    pub frames_ok: u32,
    pub frame_errors: u32,
    pub resyncs: u32,
    pub lines_ok: u32,
    pub lines_dropped: u32,
    pub tick_us: u32,
    pub tick_max_us: u32,
    pub slow_ticks: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub ms: u64,
    pub sensors: SensorStatus,
    pub joystick: JoystickStatus,
    pub autopilot: AutopilotStatus,
    pub simulator: SimulatorStatus,
    pub feedback_enabled: bool,
    pub cyclic_held: bool,
    pub collective_held: bool,
    pub recording: bool,
    pub diagnostics: DiagnosticStatus,
}

impl StatusSnapshot {
    pub fn new(state: &AppState, now: Instant) -> Self {
        let ap = &state.autopilot;
        let sim = &state.simulator;
        let diag = &state.diagnostics;
        let age_ms = match sim.last_update {
            Some(_) => u32::try_from(telemetry_age(sim, now).as_millis()).unwrap_or(u32::MAX),
            None => u32::MAX,
        };

        Self {
            ms: now.as_millis(),
            sensors: SensorStatus {
                cyclic_x: state.sensors.cyclic_x_calibrated,
                cyclic_y: state.sensors.cyclic_y_calibrated,
                collective: state.sensors.collective_calibrated,
                cyclic_valid: state.sensors.cyclic_valid,
                raw_x: state.sensors.cyclic_x_raw,
                raw_y: state.sensors.cyclic_y_raw,
                raw_z: state.sensors.collective_raw,
            },
            joystick: JoystickStatus {
                cyclic_x: state.joystick.cyclic_x,
                cyclic_y: state.joystick.cyclic_y,
                collective: state.joystick.collective,
                buttons: state.joystick.buttons,
            },
            autopilot: AutopilotStatus {
                enabled: ap.enabled,
                horizontal_mode: ap.horizontal_mode.mnemonic(),
                vertical_mode: ap.vertical_mode.mnemonic(),
                alt_capture_armed: ap.alt_capture_armed,
                selected_heading: ap.selected_heading,
                selected_altitude: ap.selected_altitude,
                selected_vertical_speed: ap.selected_vertical_speed,
                selected_pitch: ap.selected_pitch,
                selected_roll: ap.selected_roll,
                pitch_kp: ap.gains.pitch.kp,
                pitch_ki: ap.gains.pitch.ki,
                pitch_kd: ap.gains.pitch.kd,
                roll_kp: ap.gains.roll.kp,
                roll_ki: ap.gains.roll.ki,
                roll_kd: ap.gains.roll.kd,
                heading_kp: ap.gains.heading_kp,
                vs_kp: ap.gains.vs_kp,
                vs_ki: ap.gains.vs_ki,
                alt_kp: ap.gains.alt_kp,
            },
            simulator: SimulatorStatus {
                valid: sim.valid,
                age_ms,
                spd: sim.speed,
                alt: sim.altitude,
                pitch: sim.pitch,
                roll: sim.roll,
                hdg: sim.heading,
                vs: sim.vertical_speed,
            },
            feedback_enabled: state.cyclic_feedback_enabled,
            cyclic_held: state.cyclic_held,
            collective_held: state.collective_held,
            recording: state.recording_enabled,
            diagnostics: DiagnosticStatus {
                frames_ok: diag.cyclic_link.frames_ok,
                frame_errors: diag
                    .cyclic_link
                    .end_marker_errors
                    .wrapping_add(diag.cyclic_link.checksum_errors),
                resyncs: diag.cyclic_link.resyncs,
                lines_ok: diag.sim_link.lines_ok,
                lines_dropped: diag.sim_link.malformed.wrapping_add(diag.sim_link.overflows),
                tick_us: diag.tick_last_us,
                tick_max_us: diag.tick_max_us,
                slow_ticks: diag.slow_ticks,
            },
        }
    }

    /// Serialises into `buf`, returning the length written.
    pub fn to_json(&self, buf: &mut [u8]) -> Result<usize, serde_json_core::ser::Error> {
        serde_json_core::to_slice(self, buf)
    }
}

/// `ms,apEnabled,hMode,vMode,pitch,roll,heading,vs,speed,selPitch,selRoll,selHeading,selVS,outY,outX`
pub const CSV_HEADER: &str =
    "ms,apEnabled,hMode,vMode,pitch,roll,heading,vs,speed,selPitch,selRoll,selHeading,selVS,outY,outX";

pub fn csv_record(
    state: &AppState,
    now: Instant,
) -> Result<heapless::String<CSV_RECORD_CAPACITY>, core::fmt::Error> {
    let ap = &state.autopilot;
    let sim = &state.simulator;
    let mut line = heapless::String::new();
    write!(
        line,
        "{},{},{},{},{:.2},{:.2},{:.1},{:.0},{:.1},{:.2},{:.2},{:.1},{:.0},{},{}",
        now.as_millis(),
        ap.enabled as u8,
        ap.horizontal_mode.mnemonic(),
        ap.vertical_mode.mnemonic(),
        sim.pitch,
        sim.roll,
        sim.heading,
        sim.vertical_speed,
        sim.speed,
        ap.selected_pitch,
        ap.selected_roll,
        ap.selected_heading,
        ap.selected_vertical_speed,
        state.joystick.cyclic_y,
        state.joystick.cyclic_x,
    )?;
    Ok(line)
}
