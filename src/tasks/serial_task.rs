use embassy_executor::task;
use embassy_stm32::peripherals::{DMA1_CH1, DMA1_CH2, UART4, USART3};
use embassy_stm32::usart::UartRx;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;

/// Roughly two ticks of cyclic frames at 115200 baud.
pub const CYCLIC_PIPE_SIZE: usize = 256;
/// Several full telemetry lines.
pub const SIM_PIPE_SIZE: usize = 1024;

pub type CyclicPipe = Pipe<CriticalSectionRawMutex, CYCLIC_PIPE_SIZE>;
pub type SimPipe = Pipe<CriticalSectionRawMutex, SIM_PIPE_SIZE>;

/// Cyclic sensor board, USART3 RX. Raw bytes go to the control task, which
/// does the framing.
#[task]
pub async fn cyclic_rx_task(mut rx: UartRx<'static, USART3, DMA1_CH1>, pipe: &'static CyclicPipe) {
    let mut buf = [0u8; 64];
    loop {
        match rx.read_until_idle(&mut buf).await {
            Ok(n) => forward(pipe, &buf[..n]),
            Err(_) => defmt::debug!("cyclic uart error"),
        }
    }
}

/// Simulator telemetry, UART4 RX.
#[task]
pub async fn sim_rx_task(mut rx: UartRx<'static, UART4, DMA1_CH2>, pipe: &'static SimPipe) {
    let mut buf = [0u8; 128];
    loop {
        match rx.read_until_idle(&mut buf).await {
            Ok(n) => forward(pipe, &buf[..n]),
            Err(_) => defmt::debug!("sim uart error"),
        }
    }
}

/// Never waits on the pipe. Bytes that do not fit are dropped and the
/// parsers resync on what follows.
fn forward<const N: usize>(pipe: &Pipe<CriticalSectionRawMutex, N>, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        match pipe.try_write(bytes) {
            Ok(n) => bytes = &bytes[n..],
            Err(_) => {
                defmt::debug!("rx pipe full, {} bytes dropped", bytes.len());
                return;
            }
        }
    }
}
