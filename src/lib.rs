//! Control core for a motorised helicopter stick: cyclic and collective
//! sensor ingest, axis calibration, the autopilot and the stepper position
//! servo that drags the physical stick to the autopilot's output.
//!
//! Everything here is hardware independent. The board binaries wire it to
//! UARTs, GPIO and USB.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every module below.
#[macro_use]
mod fmt;

pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod state;
