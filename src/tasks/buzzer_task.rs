use embassy_executor::task;
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::{Duration, Timer};

use heli_stick::drivers::alarm::BeepPattern;

use crate::board::BEEP_QUEUE_DEPTH;

const BEEP_ON: Duration = Duration::from_millis(100);
const BEEP_GAP: Duration = Duration::from_millis(100);
/// Silence between two queued patterns so they stay distinguishable.
const PATTERN_GAP: Duration = Duration::from_millis(300);

/// Active buzzer, driven high to sound.
#[task]
pub async fn buzzer_task(
    mut buzzer: Output<'static, AnyPin>,
    patterns: Receiver<'static, CriticalSectionRawMutex, BeepPattern, BEEP_QUEUE_DEPTH>,
) {
    loop {
        let pattern = patterns.receive().await;
        for i in 0..pattern.count() {
            if i > 0 {
                Timer::after(BEEP_GAP).await;
            }
            buzzer.set_high();
            Timer::after(BEEP_ON).await;
            buzzer.set_low();
        }
        Timer::after(PATTERN_GAP).await;
    }
}
