use embassy_time::{Duration, Instant};
use serde::Deserialize;

use crate::config::{SIMULATOR_VALID_TIMEOUT, SIM_LINE_CAPACITY};
use crate::error::TelemetryError;
use crate::state::SimulatorState;

/// One telemetry line. Every field is optional; absent fields leave the
/// previous value untouched.
///
/// `{"spd":85,"alt":2500,"pitch":2.5,"roll":-1,"hdg":270,"vs":0}`
#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize)]
pub struct TelemetryMessage {
    pub spd: Option<f32>,
    pub alt: Option<f32>,
    pub pitch: Option<f32>,
    pub roll: Option<f32>,
    pub hdg: Option<f32>,
    pub vs: Option<f32>,
}

impl TelemetryMessage {
    pub fn parse(line: &[u8]) -> Result<Self, TelemetryError> {
        match serde_json_core::from_slice::<TelemetryMessage>(line) {
            Ok((msg, _)) => Ok(msg),
            Err(_) => Err(TelemetryError::Malformed),
        }
    }

    /// Partial update of `sim`. Also stamps it, which marks it valid and
    /// raises the new-data edge for this tick.
    pub fn apply(&self, sim: &mut SimulatorState, now: Instant) {
        if let Some(v) = self.spd {
            sim.speed = v;
        }
        if let Some(v) = self.alt {
            sim.altitude = v;
        }
        if let Some(v) = self.pitch {
            sim.pitch = v;
        }
        if let Some(v) = self.roll {
            sim.roll = v;
        }
        if let Some(v) = self.hdg {
            sim.heading = v;
        }
        if let Some(v) = self.vs {
            sim.vertical_speed = v;
        }
        sim.last_update = Some(now);
        sim.valid = true;
        sim.data_updated = true;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SimLinkCounters {
    pub lines_ok: u32,
    pub malformed: u32,
    pub overflows: u32,
}

/// Line splitter and decoder for the simulator link. Accepts `\n`, `\r`
/// and `\r\n` terminators.
pub struct SimLink {
    buffer: heapless::Vec<u8, SIM_LINE_CAPACITY>,
    /// Set after an overflow until the next terminator.
    discarding: bool,
    pub counters: SimLinkCounters,
}

impl Default for SimLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SimLink {
    pub const fn new() -> Self {
        Self {
            buffer: heapless::Vec::new(),
            discarding: false,
            counters: SimLinkCounters { lines_ok: 0, malformed: 0, overflows: 0 },
        }
    }

    /// Feeds received bytes, applying every complete line to `sim`.
    /// Returns how many lines updated it.
    pub fn push_data(&mut self, data: &[u8], sim: &mut SimulatorState, now: Instant) -> usize {
        let mut applied = 0;
        for &b in data {
            if b == b'\n' || b == b'\r' {
                // A lone terminator after CR (the LF of CRLF) sees an empty
                // buffer and is ignored.
                if self.discarding {
                    self.discarding = false;
                } else if !self.buffer.is_empty() {
                    if self.process_line(sim, now).is_ok() {
                        applied += 1;
                    }
                }
                self.buffer.clear();
                continue;
            }

            if self.discarding {
                continue;
            }

            if self.buffer.push(b).is_err() {
                self.counters.overflows = self.counters.overflows.wrapping_add(1);
                debug!("telemetry line dropped: {}", TelemetryError::LineTooLong);
                self.buffer.clear();
                self.discarding = true;
            }
        }
        applied
    }

    fn process_line(&mut self, sim: &mut SimulatorState, now: Instant) -> Result<(), TelemetryError> {
        match TelemetryMessage::parse(&self.buffer) {
            Ok(msg) => {
                msg.apply(sim, now);
                self.counters.lines_ok = self.counters.lines_ok.wrapping_add(1);
                Ok(())
            }
            Err(err) => {
                self.counters.malformed = self.counters.malformed.wrapping_add(1);
                debug!("telemetry line dropped: {}", err);
                Err(err)
            }
        }
    }
}

/// Time since the last accepted line, `Duration::MAX` if none yet.
pub fn telemetry_age(sim: &SimulatorState, now: Instant) -> Duration {
    match sim.last_update {
        Some(t) => now.saturating_duration_since(t),
        None => Duration::MAX,
    }
}

pub fn is_telemetry_fresh(sim: &SimulatorState, now: Instant) -> bool {
    telemetry_age(sim, now) < SIMULATOR_VALID_TIMEOUT
}

/// Recomputes the validity flag from the timestamp. Run once per tick.
pub fn refresh_validity(sim: &mut SimulatorState, now: Instant) {
    sim.valid = is_telemetry_fresh(sim, now);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn full_line_updates_every_field() {
        let mut link = SimLink::new();
        let mut sim = SimulatorState::default();
        let n = link.push_data(
            b"{\"spd\":85,\"alt\":2500,\"pitch\":2.5,\"roll\":-1,\"hdg\":270,\"vs\":0}\n",
            &mut sim,
            t(10),
        );
        assert_eq!(n, 1);
        assert_eq!(sim.speed, 85.0);
        assert_eq!(sim.altitude, 2500.0);
        assert_eq!(sim.pitch, 2.5);
        assert_eq!(sim.roll, -1.0);
        assert_eq!(sim.heading, 270.0);
        assert_eq!(sim.vertical_speed, 0.0);
        assert!(sim.valid);
        assert!(sim.data_updated);
        assert_eq!(sim.last_update, Some(t(10)));
    }

    #[test]
    fn partial_update_keeps_absent_fields() {
        let mut link = SimLink::new();
        let mut sim = SimulatorState::default();
        link.push_data(b"{\"spd\":90,\"alt\":1000}\r\n", &mut sim, t(0));
        link.push_data(b"{\"alt\":1200}\r", &mut sim, t(5));
        assert_eq!(sim.speed, 90.0);
        assert_eq!(sim.altitude, 1200.0);
        assert_eq!(link.counters.lines_ok, 2);
    }

    #[test]
    fn line_split_across_reads() {
        let mut link = SimLink::new();
        let mut sim = SimulatorState::default();
        assert_eq!(link.push_data(b"{\"hdg\":1", &mut sim, t(0)), 0);
        assert_eq!(link.push_data(b"80.5}\n", &mut sim, t(1)), 1);
        assert_eq!(sim.heading, 180.5);
    }

    #[test]
    fn malformed_line_is_dropped() {
        let mut link = SimLink::new();
        let mut sim = SimulatorState::default();
        link.push_data(b"{\"spd\":80}\n", &mut sim, t(0));
        sim.data_updated = false;

        assert_eq!(link.push_data(b"{\"spd\":12\n", &mut sim, t(100)), 0);
        assert_eq!(link.push_data(b"not json\n", &mut sim, t(100)), 0);
        assert_eq!(sim.speed, 80.0);
        assert!(!sim.data_updated);
        assert_eq!(sim.last_update, Some(t(0)));
        assert_eq!(link.counters.malformed, 2);
    }

    #[test]
    fn overlong_line_is_discarded_up_to_terminator() {
        let mut link = SimLink::new();
        let mut sim = SimulatorState::default();

        let mut long = [b' '; SIM_LINE_CAPACITY + 40];
        long[0] = b'{';
        let tail = b"\"spd\":99}";
        let n = long.len();
        long[n - tail.len()..].copy_from_slice(tail);

        assert_eq!(link.push_data(&long, &mut sim, t(0)), 0);
        assert_eq!(link.push_data(b"\n{\"spd\":42}\n", &mut sim, t(1)), 1);
        assert_eq!(sim.speed, 42.0);
        assert_eq!(link.counters.overflows, 1);
    }

    #[test]
    fn staleness() {
        let mut sim = SimulatorState::default();
        assert!(!is_telemetry_fresh(&sim, t(0)));

        TelemetryMessage { spd: Some(80.0), ..Default::default() }.apply(&mut sim, t(1_000));
        refresh_validity(&mut sim, t(5_999));
        assert!(sim.valid);
        refresh_validity(&mut sim, t(6_000));
        assert!(!sim.valid);
        assert_eq!(telemetry_age(&sim, t(7_000)), Duration::from_millis(6_000));
    }
}
