use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_sync::pipe::Pipe;
use embassy_time::{Instant, Ticker};
use heapless::Vec;

use heli_stick::config::TICK_PERIOD;
use heli_stick::control::commands::{Command, COMMAND_QUEUE_DEPTH};
use heli_stick::control::tick::{ControlLoop, TickInput};
use heli_stick::state::{publish, snapshot, SharedState};

use crate::board::{BuzzerAlarm, CollectiveSensor, GpioSteppers};
use crate::tasks::serial_task::{CyclicPipe, SimPipe, CYCLIC_PIPE_SIZE, SIM_PIPE_SIZE};

pub type FirmwareLoop = ControlLoop<GpioSteppers, BuzzerAlarm>;

pub struct ControlInputs {
    pub collective: CollectiveSensor,
    pub cyclic: &'static CyclicPipe,
    pub sim: &'static SimPipe,
    pub commands: Receiver<'static, CriticalSectionRawMutex, Command, COMMAND_QUEUE_DEPTH>,
}

/// Control task, 100 Hz. The only writer of the shared state.
#[task]
pub async fn control_task(mut ctl: FirmwareLoop, mut inputs: ControlInputs, state: &'static SharedState) {
    let mut cyclic_buf = [0u8; CYCLIC_PIPE_SIZE];
    let mut sim_buf = [0u8; SIM_PIPE_SIZE];
    let mut ticker = Ticker::every(TICK_PERIOD);

    defmt::info!("control loop started, period {} ms", TICK_PERIOD.as_millis());

    loop {
        ticker.next().await;
        let start = Instant::now();

        let cyclic_len = drain(inputs.cyclic, &mut cyclic_buf);
        let sim_len = drain(inputs.sim, &mut sim_buf);

        let mut pending: Vec<Command, COMMAND_QUEUE_DEPTH> = Vec::new();
        while !pending.is_full() {
            match inputs.commands.try_receive() {
                Ok(command) => {
                    let _ = pending.push(command);
                }
                Err(_) => break,
            }
        }

        let collective_raw = inputs.collective.read();

        // Tick on a private copy so the critical section only covers the copies.
        let mut app = snapshot(state);
        ctl.tick(
            &mut app,
            TickInput {
                now: start,
                cyclic_bytes: &cyclic_buf[..cyclic_len],
                sim_bytes: &sim_buf[..sim_len],
                collective_raw,
                commands: &pending,
            },
        );
        ctl.record_tick_duration(&mut app, start.elapsed());
        publish(state, &app);
    }
}

/// Empties `pipe` into `buf` without waiting. Returns the byte count.
fn drain<const N: usize>(pipe: &Pipe<CriticalSectionRawMutex, N>, buf: &mut [u8]) -> usize {
    let mut len = 0;
    while len < buf.len() {
        match pipe.try_read(&mut buf[len..]) {
            Ok(n) => len += n,
            Err(_) => break,
        }
    }
    len
}
