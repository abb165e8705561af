use crate::state::PidGains;

/// Which way the output moves for a positive error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Direct,
    /// Setpoint above measurement drives the output down.
    Reverse,
}

/// Discrete PID with derivative on measurement and a clamped integral.
///
/// Runs once per call without a time step, so gains are per update. While
/// disabled, `compute` returns the last output and touches no state.
#[derive(Debug, Clone, Copy)]
pub struct PidLoop {
    gains: PidGains,
    direction: Direction,
    out_min: f32,
    out_max: f32,
    /// Integral term, already multiplied by `ki`. Shares the output clamp.
    output_sum: f32,
    last_input: Option<f32>,
    output: f32,
    enabled: bool,
}

impl PidLoop {
    pub const fn new(gains: PidGains, direction: Direction, out_min: f32, out_max: f32) -> Self {
        Self {
            gains,
            direction,
            out_min,
            out_max,
            output_sum: 0.0,
            last_input: None,
            output: 0.0,
            enabled: false,
        }
    }

    pub fn compute(&mut self, setpoint: f32, measurement: f32) -> f32 {
        if !self.enabled {
            return self.output;
        }

        let (kp, ki, kd) = self.signed_gains();
        let error = setpoint - measurement;
        let d_input = match self.last_input {
            Some(last) => measurement - last,
            None => 0.0,
        };

        self.output_sum = (self.output_sum + ki * error).clamp(self.out_min, self.out_max);
        self.output = (kp * error + self.output_sum - kd * d_input).clamp(self.out_min, self.out_max);
        self.last_input = Some(measurement);
        self.output
    }

    /// Takes effect on the next `compute`. Integral state is kept.
    pub fn set_tunings(&mut self, kp: f32, ki: f32, kd: f32) {
        if kp < 0.0 || ki < 0.0 || kd < 0.0 {
            return;
        }
        self.gains = PidGains { kp, ki, kd };
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.set_tunings(gains.kp, gains.ki, gains.kd);
    }

    pub fn set_output_limits(&mut self, out_min: f32, out_max: f32) {
        if out_min >= out_max {
            return;
        }
        self.out_min = out_min;
        self.out_max = out_max;
        self.output = self.output.clamp(out_min, out_max);
        self.output_sum = self.output_sum.clamp(out_min, out_max);
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Restarts the loop from `output`: the next compute with zero error
    /// returns exactly this value, and the first derivative sample is zero.
    pub fn reseed(&mut self, output: f32) {
        let output = output.clamp(self.out_min, self.out_max);
        self.output_sum = output;
        self.output = output;
        self.last_input = None;
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn integral(&self) -> f32 {
        self.output_sum
    }

    fn signed_gains(&self) -> (f32, f32, f32) {
        let PidGains { kp, ki, kd } = self.gains;
        match self.direction {
            Direction::Direct => (kp, ki, kd),
            Direction::Reverse => (-kp, -ki, -kd),
        }
    }
}
