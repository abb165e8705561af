pub mod autopilot;
pub mod commands;
pub mod debounce;
pub mod pid;
pub mod servo;
pub mod status;
pub mod tick;
