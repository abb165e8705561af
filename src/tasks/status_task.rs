use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Instant, Ticker};

use heli_stick::config::STATUS_PERIOD;
use heli_stick::control::commands::{Command, COMMAND_QUEUE_DEPTH};
use heli_stick::control::status::{csv_record, StatusSnapshot, CSV_HEADER, STATUS_JSON_CAPACITY};
use heli_stick::state::{snapshot, SharedState};

use crate::usb::{write_chunked, UsbReceiver, UsbSender, PACKET_SIZE};

/// Longest command line accepted from the host.
const COMMAND_LINE_CAPACITY: usize = 96;

/// Status task, 20 Hz. One JSON snapshot per period, plus a CSV record
/// while recording. Reads the shared state through a copy only.
#[task]
pub async fn status_task(mut usb_tx: UsbSender, state: &'static SharedState) {
    let mut json = [0u8; STATUS_JSON_CAPACITY + 2];
    let mut was_recording = false;
    let mut ticker = Ticker::every(STATUS_PERIOD);

    loop {
        ticker.next().await;
        if !usb_tx.dtr() {
            was_recording = false;
            continue;
        }

        let app = snapshot(state);
        let now = Instant::now();

        match StatusSnapshot::new(&app, now).to_json(&mut json[..STATUS_JSON_CAPACITY]) {
            Ok(n) => {
                json[n..n + 2].copy_from_slice(b"\r\n");
                if write_chunked(&mut usb_tx, &json[..n + 2]).await.is_err() {
                    continue;
                }
            }
            Err(_) => defmt::warn!("status snapshot does not fit {} bytes", STATUS_JSON_CAPACITY),
        }

        if !app.recording_enabled {
            was_recording = false;
            continue;
        }
        if !was_recording {
            let _ = write_chunked(&mut usb_tx, CSV_HEADER.as_bytes()).await;
            let _ = write_chunked(&mut usb_tx, b"\r\n").await;
            was_recording = true;
        }
        match csv_record(&app, now) {
            Ok(line) => {
                let _ = write_chunked(&mut usb_tx, line.as_bytes()).await;
                let _ = write_chunked(&mut usb_tx, b"\r\n").await;
            }
            Err(_) => defmt::warn!("csv record overflow"),
        }
    }
}

/// Reads text commands from the host, one per line, and queues them for
/// the control task.
#[task]
pub async fn command_task(
    mut usb_rx: UsbReceiver,
    commands: Sender<'static, CriticalSectionRawMutex, Command, COMMAND_QUEUE_DEPTH>,
) {
    let mut packet = [0u8; PACKET_SIZE];
    let mut line: heapless::Vec<u8, COMMAND_LINE_CAPACITY> = heapless::Vec::new();
    let mut overflowed = false;

    loop {
        usb_rx.wait_connection().await;
        defmt::info!("usb host connected");
        line.clear();

        loop {
            let n = match usb_rx.read_packet(&mut packet).await {
                Ok(n) => n,
                Err(_) => break, // disconnected
            };
            for &b in &packet[..n] {
                if b == b'\n' || b == b'\r' {
                    if !overflowed && !line.is_empty() {
                        submit(&line, &commands);
                    }
                    line.clear();
                    overflowed = false;
                } else if line.push(b).is_err() {
                    if !overflowed {
                        defmt::warn!("command line longer than {} bytes dropped", COMMAND_LINE_CAPACITY);
                    }
                    overflowed = true;
                }
            }
        }
    }
}

fn submit(line: &[u8], commands: &Sender<'static, CriticalSectionRawMutex, Command, COMMAND_QUEUE_DEPTH>) {
    let Ok(text) = core::str::from_utf8(line) else {
        defmt::debug!("command line is not utf-8");
        return;
    };
    match text.parse::<Command>() {
        Ok(command) => {
            if commands.try_send(command).is_err() {
                defmt::warn!("command queue full, dropped {}", command);
            }
        }
        Err(err) => defmt::warn!("rejected command {=str}: {}", text, err),
    }
}
