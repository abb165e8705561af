pub mod button_task;
pub mod buzzer_task;
pub mod control_task;
pub mod serial_task;
pub mod status_task;
