pub mod alarm;
pub mod calibration;
pub mod cyclic_link;
pub mod sim_link;
pub mod stepper;
