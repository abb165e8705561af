#![no_std]
#![no_main]

//! # heli-stick: axis range capture
//!
//! Streams raw cyclic and collective counts over USB CDC-ACM as CSV while
//! each axis is swept end to end, and periodically reports the calibration
//! bounds those sweeps suggest. Paste the reported values into
//! `config.rs`.
//!
//! ## Usage
//! ```sh
//! cargo flash --release --features board --bin calibrate --chip STM32F405RG
//! cat /dev/ttyACM0 > sweep.csv
//! ```
//!
//! ## Format
//! `ms,raw_x,raw_y,raw_z`, with `#` lines carrying suggestions:
//! `# x min=1120 max=2980 invert=false wraps=false samples=...`

#[path = "../board.rs"]
mod board;
#[path = "../usb.rs"]
mod usb;
#[path = "../tasks/serial_task.rs"]
mod serial_task;

use core::fmt::Write;

use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_stm32::adc::Adc;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::usart::{Config as UsartConfig, Uart};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_sync::pipe::Pipe;
use embassy_time::{Delay, Duration, Instant, Ticker, Timer};
use {defmt_rtt as _, panic_probe as _};

use heli_stick::config::{
    COLLECTIVE_CALIBRATION, CYCLIC_SERIAL_BAUD, CYCLIC_X_CALIBRATION, CYCLIC_Y_CALIBRATION,
};
use heli_stick::drivers::calibration::{AxisCalibration, RangeRecorder};
use heli_stick::drivers::cyclic_link::CyclicLink;

use crate::board::{Board, CollectiveSensor};
use crate::serial_task::{cyclic_rx_task, CyclicPipe, CYCLIC_PIPE_SIZE};
use crate::usb::{write_chunked, UsbSender};

/// CSV sample rate.
const SAMPLE_PERIOD: Duration = Duration::from_millis(20);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Samples between two suggestion reports (5 s).
const REPORT_EVERY: u32 = 250;

static CYCLIC_PIPE: CyclicPipe = Pipe::new();

bind_interrupts!(struct Irqs {
    USART3 => embassy_stm32::usart::InterruptHandler<peripherals::USART3>;
});

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let board = Board::init();
    let p = board.p;

    // USB CDC
    let (usb_dev, usb_serial) = usb::init(p.USB_OTG_FS, p.PA12, p.PA11);
    spawner.spawn(usb::usb_task(usb_dev)).unwrap();
    let (mut usb_tx, _usb_rx) = usb_serial.split();

    // LED (PC13)
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);

    // Cyclic sensor board, USART3 (TX=PB10, RX=PB11)
    let mut uart_config = UsartConfig::default();
    uart_config.baudrate = CYCLIC_SERIAL_BAUD;
    let uart = Uart::new(
        p.USART3, p.PB11, p.PB10,
        Irqs,
        p.DMA1_CH3, p.DMA1_CH1,
        uart_config,
    ).unwrap();
    let (_, cyclic_rx) = uart.split();
    spawner.spawn(cyclic_rx_task(cyclic_rx, &CYCLIC_PIPE)).unwrap();

    // Collective on PA4
    let mut collective = CollectiveSensor::new(Adc::new(p.ADC1, &mut Delay), p.PA4);

    // ── Wait for a host, then for a terminal to open the port ─────────────────
    match select(usb_tx.wait_connection(), Timer::after(CONNECT_TIMEOUT)).await {
        Either::First(()) => defmt::info!("usb configured"),
        Either::Second(()) => defmt::warn!("no usb host, capturing anyway"),
    }
    for _ in 0..30u32 {
        led.toggle();
        Timer::after(Duration::from_millis(100)).await;
        if usb_tx.dtr() {
            break;
        }
    }
    led.set_high();

    let hdr = b"# heli-stick axis range capture: sweep each axis end to end\r\n\
                # ms,raw_x,raw_y,raw_z\r\n";
    let _ = write_chunked(&mut usb_tx, hdr).await;

    let mut link = CyclicLink::new();
    let mut ranges = [RangeRecorder::new(), RangeRecorder::new(), RangeRecorder::new()];
    let mut rx_buf = [0u8; CYCLIC_PIPE_SIZE];

    let start = Instant::now();
    let mut ticker = Ticker::every(SAMPLE_PERIOD);
    let mut n: u32 = 0;

    loop {
        ticker.next().await;
        let now = Instant::now();

        let mut frame = None;
        while let Ok(len) = CYCLIC_PIPE.try_read(&mut rx_buf) {
            if let Some(sample) = link.push_bytes(&rx_buf[..len], now) {
                frame = Some(sample);
            }
        }
        if let Some(sample) = frame {
            ranges[0].record(sample.sensor_a);
            ranges[1].record(sample.sensor_b);
        }
        let raw_z = collective.read();
        ranges[2].record(raw_z);

        let cyclic = link.last_sample();
        let mut line = heapless::String::<48>::new();
        let _ = write!(
            line,
            "{},{},{},{}\r\n",
            start.elapsed().as_millis(),
            cyclic.sensor_a,
            cyclic.sensor_b,
            raw_z,
        );
        if usb_tx.dtr() {
            let _ = write_chunked(&mut usb_tx, line.as_bytes()).await;
        }

        n = n.wrapping_add(1);
        if n % 50 == 0 {
            led.toggle();
        }

        if n % REPORT_EVERY == 0 && usb_tx.dtr() {
            let axes = [
                ("x", CYCLIC_X_CALIBRATION),
                ("y", CYCLIC_Y_CALIBRATION),
                ("z", COLLECTIVE_CALIBRATION),
            ];
            for ((name, current), range) in axes.into_iter().zip(ranges.iter()) {
                report(&mut usb_tx, name, current, range).await;
            }
            if !link.is_valid(now) {
                let _ = write_chunked(&mut usb_tx, b"# cyclic link silent\r\n").await;
            }
        }
    }
}

async fn report(usb_tx: &mut UsbSender, name: &str, current: AxisCalibration, range: &RangeRecorder) {
    let mut msg = heapless::String::<96>::new();
    let _ = match range.suggest(current.invert) {
        Some(cal) => write!(
            msg,
            "# {} min={} max={} invert={} wraps={} samples={}\r\n",
            name,
            cal.sensor_min,
            cal.sensor_max,
            cal.invert,
            cal.wraps(),
            range.samples(),
        ),
        None => write!(msg, "# {} no samples\r\n", name),
    };
    let _ = write_chunked(usb_tx, msg.as_bytes()).await;
}
