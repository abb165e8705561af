//! Capability interface for the audible alert.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeepPattern {
    /// Motor hold released.
    Single,
    /// Motor hold engaged.
    Double,
    /// Autopilot forced off.
    Triple,
}

impl BeepPattern {
    pub const fn count(self) -> u8 {
        match self {
            BeepPattern::Single => 1,
            BeepPattern::Double => 2,
            BeepPattern::Triple => 3,
        }
    }
}

pub trait Alarm {
    /// Starts the pattern and returns immediately.
    fn sound(&mut self, pattern: BeepPattern);
}
