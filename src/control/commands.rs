//! Commands from the status/tuning link to the control tick.
//!
//! The secondary context never writes `AppState` directly; it parses a line
//! into a [`Command`] and queues it. The tick applies queued commands before
//! anything else runs.

use core::str::FromStr;

use crate::error::CommandError;
use crate::state::{HorizontalMode, PidGains, VerticalMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Target {
    Heading,
    Pitch,
    Roll,
    Altitude,
    VerticalSpeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InnerLoop {
    Pitch,
    Roll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OuterGain {
    Heading,
    VerticalSpeed,
    VerticalSpeedIntegral,
    Altitude,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    SetEnabled(bool),
    SetHorizontalMode(HorizontalMode),
    SetVerticalMode(VerticalMode),
    SetSelected(Target, f32),
    ArmAltitudeCapture(bool),
    SetPidGains(InnerLoop, PidGains),
    SetOuterGain(OuterGain, f32),
    SetFeedbackEnabled(bool),
    SetCyclicHold(bool),
    /// From the cyclic hold button.
    ToggleCyclicHold,
    SetCollectiveHold(bool),
    /// From the collective force trim release button.
    ToggleCollectiveHold,
    SetRecording(bool),
}

/// Queue depth between the link task and the control tick.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

fn on_off(word: Option<&str>) -> Result<bool, CommandError> {
    match word {
        Some("on") | Some("1") => Ok(true),
        Some("off") | Some("0") => Ok(false),
        Some(_) => Err(CommandError::InvalidValue),
        None => Err(CommandError::MissingArgument),
    }
}

fn number(word: Option<&str>) -> Result<f32, CommandError> {
    let word = word.ok_or(CommandError::MissingArgument)?;
    let value = f32::from_str(word).map_err(|_| CommandError::InvalidValue)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CommandError::InvalidValue)
    }
}

impl FromStr for Command {
    type Err = CommandError;

    /// `ap on`, `hmode hdg`, `vmode vs`, `sel alt 2500`, `arm alts on`,
    /// `gain pitch 120 4 40`, `gain vs -0.01`, `feedback off`, `hold on`,
    /// `colhold off`, `rec on`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?;

        let command = match verb {
            "ap" => Command::SetEnabled(on_off(words.next())?),
            "hmode" => Command::SetHorizontalMode(match words.next() {
                Some("off") => HorizontalMode::Off,
                Some("roll") => HorizontalMode::RollHold,
                Some("hdg") => HorizontalMode::HeadingHold,
                Some(_) => return Err(CommandError::InvalidValue),
                None => return Err(CommandError::MissingArgument),
            }),
            "vmode" => Command::SetVerticalMode(match words.next() {
                Some("off") => VerticalMode::Off,
                Some("pitch") => VerticalMode::PitchHold,
                Some("vs") => VerticalMode::VerticalSpeedHold,
                Some("alts") => VerticalMode::AltitudeHold,
                Some(_) => return Err(CommandError::InvalidValue),
                None => return Err(CommandError::MissingArgument),
            }),
            "sel" => {
                let target = match words.next() {
                    Some("hdg") => Target::Heading,
                    Some("pitch") => Target::Pitch,
                    Some("roll") => Target::Roll,
                    Some("alt") => Target::Altitude,
                    Some("vs") => Target::VerticalSpeed,
                    Some(_) => return Err(CommandError::InvalidValue),
                    None => return Err(CommandError::MissingArgument),
                };
                Command::SetSelected(target, number(words.next())?)
            }
            "arm" => match words.next() {
                Some("alts") => Command::ArmAltitudeCapture(on_off(words.next())?),
                Some(_) => return Err(CommandError::InvalidValue),
                None => return Err(CommandError::MissingArgument),
            },
            "gain" => match words.next() {
                Some(name @ ("pitch" | "roll")) => {
                    let gains = PidGains {
                        kp: number(words.next())?,
                        ki: number(words.next())?,
                        kd: number(words.next())?,
                    };
                    if gains.kp < 0.0 || gains.ki < 0.0 || gains.kd < 0.0 {
                        return Err(CommandError::InvalidValue);
                    }
                    let inner = if name == "pitch" { InnerLoop::Pitch } else { InnerLoop::Roll };
                    Command::SetPidGains(inner, gains)
                }
                Some("hdg") => Command::SetOuterGain(OuterGain::Heading, number(words.next())?),
                Some("vs") => Command::SetOuterGain(OuterGain::VerticalSpeed, number(words.next())?),
                Some("vsi") => {
                    Command::SetOuterGain(OuterGain::VerticalSpeedIntegral, number(words.next())?)
                }
                Some("alt") => Command::SetOuterGain(OuterGain::Altitude, number(words.next())?),
                Some(_) => return Err(CommandError::InvalidValue),
                None => return Err(CommandError::MissingArgument),
            },
            "feedback" => Command::SetFeedbackEnabled(on_off(words.next())?),
            "hold" => Command::SetCyclicHold(on_off(words.next())?),
            "colhold" => Command::SetCollectiveHold(on_off(words.next())?),
            "rec" => Command::SetRecording(on_off(words.next())?),
            _ => return Err(CommandError::UnknownCommand),
        };
        Ok(command)
    }
}
