use embassy_time::{Duration, Instant};

use crate::config::CYCLIC_VALID_TIMEOUT;
use crate::error::FrameError;

pub const FRAME_START: u8 = 0xAA;
pub const FRAME_END: u8 = 0x55;
pub const FRAME_SIZE: usize = 7;

/// One decoded frame: both angle sensors, raw 12-bit counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CyclicSample {
    pub sensor_a: u16,
    pub sensor_b: u16,
}

/// Link diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkCounters {
    pub frames_ok: u32,
    pub end_marker_errors: u32,
    pub checksum_errors: u32,
    /// Rejected buffers that still held a start byte and were realigned.
    pub resyncs: u32,
}

/// Incremental parser for the cyclic sensor link.
///
/// Frame: `[0xAA] [a_lo] [a_hi] [b_lo] [b_hi] [a_lo^a_hi^b_lo^b_hi] [0x55]`.
pub struct CyclicLink {
    buffer: [u8; FRAME_SIZE],
    len: usize,
    last_sample: CyclicSample,
    last_valid: Option<Instant>,
    pub counters: LinkCounters,
}

impl Default for CyclicLink {
    fn default() -> Self {
        Self::new()
    }
}

impl CyclicLink {
    pub const fn new() -> Self {
        Self {
            buffer: [0; FRAME_SIZE],
            len: 0,
            last_sample: CyclicSample { sensor_a: 0, sensor_b: 0 },
            last_valid: None,
            counters: LinkCounters {
                frames_ok: 0,
                end_marker_errors: 0,
                checksum_errors: 0,
                resyncs: 0,
            },
        }
    }

    pub fn push_byte(&mut self, b: u8, now: Instant) -> Option<CyclicSample> {
        if self.len == 0 {
            // Out of sync: only a start marker opens a frame.
            if b == FRAME_START {
                self.buffer[0] = b;
                self.len = 1;
            }
            return None;
        }

        self.buffer[self.len] = b;
        self.len += 1;
        if self.len < FRAME_SIZE {
            return None;
        }

        match decode_frame(&self.buffer) {
            Ok(sample) => {
                self.len = 0;
                self.last_sample = sample;
                self.last_valid = Some(now);
                self.counters.frames_ok = self.counters.frames_ok.wrapping_add(1);
                Some(sample)
            }
            Err(err) => {
                match err {
                    FrameError::BadEndMarker => {
                        self.counters.end_marker_errors =
                            self.counters.end_marker_errors.wrapping_add(1)
                    }
                    FrameError::ChecksumMismatch => {
                        self.counters.checksum_errors =
                            self.counters.checksum_errors.wrapping_add(1)
                    }
                }
                debug!("cyclic frame rejected: {}", err);
                self.resync();
                None
            }
        }
    }

    /// Feeds a chunk, returns the last sample decoded from it.
    pub fn push_bytes(&mut self, data: &[u8], now: Instant) -> Option<CyclicSample> {
        let mut last_res = None;
        for &b in data {
            if let Some(res) = self.push_byte(b, now) {
                last_res = Some(res);
            }
        }
        last_res
    }

    /// Keeps the tail of a rejected buffer from its first start byte after
    /// offset 0, so those bytes need not be received again.
    fn resync(&mut self) {
        match self.buffer[1..FRAME_SIZE].iter().position(|&b| b == FRAME_START) {
            Some(pos) => {
                let start = pos + 1;
                self.buffer.copy_within(start..FRAME_SIZE, 0);
                self.len = FRAME_SIZE - start;
                self.counters.resyncs = self.counters.resyncs.wrapping_add(1);
            }
            None => self.len = 0,
        }
    }

    pub fn last_sample(&self) -> CyclicSample {
        self.last_sample
    }

    /// Bytes currently held as the start of a candidate frame.
    pub fn pending(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    pub fn is_valid(&self, now: Instant) -> bool {
        self.age(now) < CYCLIC_VALID_TIMEOUT
    }

    /// Time since the last good frame, `Duration::MAX` if there never was one.
    pub fn age(&self, now: Instant) -> Duration {
        match self.last_valid {
            Some(t) => now.saturating_duration_since(t),
            None => Duration::MAX,
        }
    }
}

pub fn decode_frame(frame: &[u8; FRAME_SIZE]) -> Result<CyclicSample, FrameError> {
    if frame[6] != FRAME_END {
        return Err(FrameError::BadEndMarker);
    }
    if checksum(&frame[1..5]) != frame[5] {
        return Err(FrameError::ChecksumMismatch);
    }
    Ok(CyclicSample {
        sensor_a: u16::from_le_bytes([frame[1], frame[2]]),
        sensor_b: u16::from_le_bytes([frame[3], frame[4]]),
    })
}

pub fn encode_frame(sample: CyclicSample) -> [u8; FRAME_SIZE] {
    let a = sample.sensor_a.to_le_bytes();
    let b = sample.sensor_b.to_le_bytes();
    [FRAME_START, a[0], a[1], b[0], b[1], checksum(&[a[0], a[1], b[0], b[1]]), FRAME_END]
}

fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}
