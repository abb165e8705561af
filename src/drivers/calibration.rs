use crate::config::{AXIS_MAX, AXIS_MIN, SENSOR_FULL_SCALE};

/// Maps raw sensor counts onto the joystick axis range `0..=10000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisCalibration {
    pub sensor_min: u16,
    pub sensor_max: u16,
    pub invert: bool,
}

impl AxisCalibration {
    pub const fn new(sensor_min: u16, sensor_max: u16, invert: bool) -> Self {
        Self { sensor_min, sensor_max, invert }
    }

    pub const fn inverted(self) -> Self {
        Self { invert: !self.invert, ..self }
    }

    /// True when the travel crosses the sensor's 0/full-scale boundary.
    ///
    /// A reversed range always wraps. A span under 200 counts ending below
    /// 2000 is taken as the short way round a range that actually wraps.
    pub fn wraps(&self) -> bool {
        let min = self.sensor_min as i32;
        let max = self.sensor_max as i32;
        max < min || (max - min < 200 && max < 2000)
    }

    pub fn map(&self, raw: u16) -> i16 {
        let raw = raw as i32;
        let min = self.sensor_min as i32;
        let max = self.sensor_max as i32;

        let (value, lo, hi) = if self.wraps() {
            let full_scale = SENSOR_FULL_SCALE as i32;
            // Readings in 0..=max are past the boundary.
            let unwrapped = if raw <= max { raw + full_scale } else { raw };
            (unwrapped, min, max + full_scale)
        } else {
            (raw, min, max)
        };

        let mapped = scale(value.clamp(lo, hi.max(lo)), lo, hi);
        if self.invert {
            AXIS_MAX - (mapped - AXIS_MIN)
        } else {
            mapped
        }
    }
}

fn scale(value: i32, lo: i32, hi: i32) -> i16 {
    let span = hi - lo;
    if span <= 0 {
        return AXIS_MIN;
    }
    let out_span = (AXIS_MAX - AXIS_MIN) as i64;
    let mapped = (value - lo) as i64 * out_span / span as i64 + AXIS_MIN as i64;
    mapped.clamp(AXIS_MIN as i64, AXIS_MAX as i64) as i16
}

const COVERAGE_WORDS: usize = SENSOR_FULL_SCALE as usize / 32;

/// Records which raw counts an axis visited during a full sweep and turns
/// that into calibration bounds. The unvisited arc is the largest gap on
/// the sensor circle, so a sweep across the 0/full-scale boundary yields a
/// reversed (wrapping) range.
pub struct RangeRecorder {
    coverage: [u32; COVERAGE_WORDS],
    samples: u32,
}

impl Default for RangeRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeRecorder {
    pub const fn new() -> Self {
        Self { coverage: [0; COVERAGE_WORDS], samples: 0 }
    }

    pub fn record(&mut self, raw: u16) {
        let i = (raw % SENSOR_FULL_SCALE) as usize;
        self.coverage[i / 32] |= 1 << (i % 32);
        self.samples = self.samples.saturating_add(1);
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    fn covered(&self, i: usize) -> bool {
        self.coverage[i / 32] & (1 << (i % 32)) != 0
    }

    pub fn suggest(&self, invert: bool) -> Option<AxisCalibration> {
        let full_scale = SENSOR_FULL_SCALE as usize;
        let first = (0..full_scale).find(|&i| self.covered(i))?;

        let mut best_start = 0;
        let mut best_len = 0;
        let mut run_start = 0;
        let mut run_len = 0;
        // Walk once round the circle, ending on `first` to close the last gap.
        for k in 1..=full_scale {
            let i = (first + k) % full_scale;
            if self.covered(i) {
                if run_len > best_len {
                    best_start = run_start;
                    best_len = run_len;
                }
                run_len = 0;
            } else {
                if run_len == 0 {
                    run_start = i;
                }
                run_len += 1;
            }
        }

        if best_len == 0 {
            return Some(AxisCalibration::new(0, SENSOR_FULL_SCALE - 1, invert));
        }
        let min = (best_start + best_len) % full_scale;
        let max = (best_start + full_scale - 1) % full_scale;
        Some(AxisCalibration::new(min as u16, max as u16, invert))
    }
}
