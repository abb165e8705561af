use embassy_executor::task;
use embassy_stm32::gpio::{AnyPin, Input};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Instant, Ticker};

use heli_stick::control::commands::{Command, COMMAND_QUEUE_DEPTH};
use heli_stick::control::debounce::{Debouncer, Edge};

const POLL_PERIOD: Duration = Duration::from_millis(5);

/// Motor hold button. Each debounced press queues `on_press`. One instance
/// for the cyclic hold, one for the collective force trim release.
#[task(pool_size = 2)]
pub async fn hold_button_task(
    button: Input<'static, AnyPin>,
    on_press: Command,
    commands: Sender<'static, CriticalSectionRawMutex, Command, COMMAND_QUEUE_DEPTH>,
) {
    let mut debouncer = Debouncer::default();
    let mut ticker = Ticker::every(POLL_PERIOD);

    loop {
        ticker.next().await;
        // Pulled up; pressing shorts to ground.
        if debouncer.update(button.is_low(), Instant::now()) == Some(Edge::Pressed)
            && commands.try_send(on_press).is_err()
        {
            defmt::warn!("command queue full, {} dropped", on_press);
        }
    }
}
