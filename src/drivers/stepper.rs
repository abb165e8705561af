//! Capability interface for the stick's stepper motors.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CyclicAxis {
    /// Left/right.
    X,
    /// Forward/back.
    Y,
}

/// Motors that are energised and released together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorGroup {
    /// Both cyclic drivers, on their shared enable line.
    Cyclic,
    /// The collective friction motor. Never stepped, only held.
    Collective,
}

/// Level driven on a driver's DIR pin for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepDirection {
    Low,
    High,
}

impl StepDirection {
    pub const fn from_level(high: bool) -> Self {
        if high {
            StepDirection::High
        } else {
            StepDirection::Low
        }
    }

    pub const fn reversed(self) -> Self {
        match self {
            StepDirection::Low => StepDirection::High,
            StepDirection::High => StepDirection::Low,
        }
    }
}

pub trait Stepper {
    /// Issues exactly one step pulse. Must not block beyond the pulse width.
    fn step(&mut self, axis: CyclicAxis, direction: StepDirection);

    /// Energises (holds) or releases one motor group.
    fn hold(&mut self, group: MotorGroup, engaged: bool);
}
