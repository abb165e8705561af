#![no_std]
#![no_main]

mod board;
mod tasks;
mod usb;

use embassy_executor::Spawner;
use embassy_stm32::adc::Adc;
use embassy_stm32::gpio::{Input, Level, Output, Pin, Pull, Speed};
use embassy_stm32::usart::{Config as UsartConfig, Uart};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::pipe::Pipe;
use embassy_time::{Delay, Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

use heli_stick::config::{CYCLIC_SERIAL_BAUD, SIM_SERIAL_BAUD};
use heli_stick::control::commands::{Command, COMMAND_QUEUE_DEPTH};
use heli_stick::control::tick::ControlLoop;
use heli_stick::drivers::alarm::BeepPattern;
use heli_stick::state::{new_shared_state, SharedState};

use crate::board::{Board, BuzzerAlarm, CollectiveSensor, GpioSteppers, StepDirPins, BEEP_QUEUE_DEPTH};
use crate::tasks::button_task::hold_button_task;
use crate::tasks::buzzer_task::buzzer_task;
use crate::tasks::control_task::{control_task, ControlInputs};
use crate::tasks::serial_task::{cyclic_rx_task, sim_rx_task, CyclicPipe, SimPipe};
use crate::tasks::status_task::{command_task, status_task};

// ── Shared state ──────────────────────────────────────────────────────────────
//  Written by control_task only. Everyone else reads a snapshot.
static APP_STATE: SharedState = new_shared_state();

// ── Inter-task queues ─────────────────────────────────────────────────────────
static COMMANDS: Channel<CriticalSectionRawMutex, Command, COMMAND_QUEUE_DEPTH> = Channel::new();
static BEEPS: Channel<CriticalSectionRawMutex, BeepPattern, BEEP_QUEUE_DEPTH> = Channel::new();
static CYCLIC_PIPE: CyclicPipe = Pipe::new();
static SIM_PIPE: SimPipe = Pipe::new();

// ── Interrupt bindings ────────────────────────────────────────────────────────
bind_interrupts!(struct Irqs {
    USART3 => embassy_stm32::usart::InterruptHandler<peripherals::USART3>;
    UART4  => embassy_stm32::usart::InterruptHandler<peripherals::UART4>;
});

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL)
    let board = Board::init();
    let p = board.p;
    defmt::info!("heli-stick starting");

    // 2. USB CDC-ACM: status out, commands in
    let (usb_dev, usb_serial) = usb::init(p.USB_OTG_FS, p.PA12, p.PA11);
    spawner.spawn(usb::usb_task(usb_dev)).unwrap();
    let (usb_tx, usb_rx) = usb_serial.split();

    // 3. Cyclic sensor board, USART3 @ 115200 (TX=PB10, RX=PB11)
    let mut cyclic_config = UsartConfig::default();
    cyclic_config.baudrate = CYCLIC_SERIAL_BAUD;
    let cyclic_uart = Uart::new(
        p.USART3, p.PB11, p.PB10,
        Irqs,
        p.DMA1_CH3, p.DMA1_CH1,
        cyclic_config,
    ).unwrap();
    let (_, cyclic_rx) = cyclic_uart.split();

    // 4. Simulator telemetry, UART4 @ 115200 (TX=PA0, RX=PA1)
    let mut sim_config = UsartConfig::default();
    sim_config.baudrate = SIM_SERIAL_BAUD;
    let sim_uart = Uart::new(
        p.UART4, p.PA1, p.PA0,
        Irqs,
        p.DMA1_CH4, p.DMA1_CH2,
        sim_config,
    ).unwrap();
    let (_, sim_rx) = sim_uart.split();

    // 5. Collective potentiometer on PA4 (ADC1_IN4)
    let collective = CollectiveSensor::new(Adc::new(p.ADC1, &mut Delay), p.PA4);

    // 6. Steppers: X on PC6/PC7, Y on PC8/PC9, cyclic enable PB5,
    //    collective friction enable PB6 (both active low)
    let steppers = GpioSteppers::new(
        StepDirPins {
            step: Output::new(p.PC6.degrade(), Level::Low, Speed::VeryHigh),
            dir: Output::new(p.PC7.degrade(), Level::Low, Speed::VeryHigh),
        },
        StepDirPins {
            step: Output::new(p.PC8.degrade(), Level::Low, Speed::VeryHigh),
            dir: Output::new(p.PC9.degrade(), Level::Low, Speed::VeryHigh),
        },
        Output::new(p.PB5.degrade(), Level::High, Speed::Low),
        Output::new(p.PB6.degrade(), Level::High, Speed::Low),
    );

    // 7. Cyclic hold button PC0, collective trim release PC1 (both to ground),
    //    buzzer PB14, heartbeat LED PC13
    let hold_button = Input::new(p.PC0.degrade(), Pull::Up);
    let trim_button = Input::new(p.PC1.degrade(), Pull::Up);
    let buzzer = Output::new(p.PB14.degrade(), Level::Low, Speed::Low);
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);

    // 8. Spawn all tasks
    let ctl = ControlLoop::new(steppers, BuzzerAlarm::new(BEEPS.sender()));

    spawner.spawn(cyclic_rx_task(cyclic_rx, &CYCLIC_PIPE)).unwrap();
    spawner.spawn(sim_rx_task(sim_rx, &SIM_PIPE)).unwrap();

    spawner.spawn(control_task(
        ctl,
        ControlInputs {
            collective,
            cyclic: &CYCLIC_PIPE,
            sim: &SIM_PIPE,
            commands: COMMANDS.receiver(),
        },
        &APP_STATE,
    )).unwrap();

    spawner.spawn(status_task(usb_tx, &APP_STATE)).unwrap();
    spawner.spawn(command_task(usb_rx, COMMANDS.sender())).unwrap();
    spawner.spawn(hold_button_task(hold_button, Command::ToggleCyclicHold, COMMANDS.sender())).unwrap();
    spawner.spawn(hold_button_task(trim_button, Command::ToggleCollectiveHold, COMMANDS.sender())).unwrap();
    spawner.spawn(buzzer_task(buzzer, BEEPS.receiver())).unwrap();

    // 9. Heartbeat: 1 Hz idle, 5 Hz while the autopilot flies
    loop {
        led.toggle();
        let engaged = APP_STATE.lock(|cell| cell.borrow().autopilot.enabled);
        let half_period = if engaged { 100 } else { 500 };
        Timer::after(Duration::from_millis(half_period)).await;
    }
}
