use embassy_stm32::usb_otg::{self, Driver};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_usb::class::cdc_acm::{self, CdcAcmClass, State};
use embassy_usb::driver::EndpointError;
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::StaticCell;

bind_interrupts!(pub struct Irqs {
    OTG_FS => usb_otg::InterruptHandler<peripherals::USB_OTG_FS>;
});

pub type UsbDriver = Driver<'static, peripherals::USB_OTG_FS>;
pub type UsbSerial = CdcAcmClass<'static, UsbDriver>;
pub type UsbSender = cdc_acm::Sender<'static, UsbDriver>;
pub type UsbReceiver = cdc_acm::Receiver<'static, UsbDriver>;

/// Full-speed bulk packet size.
pub const PACKET_SIZE: usize = 64;

struct UsbResources {
    config_desc: [u8; 256],
    bos_desc: [u8; 256],
    control_buf: [u8; 64],
    ep_out_buffer: [u8; 256],
    state: State<'static>,
}

static USB_RES: StaticCell<UsbResources> = StaticCell::new();

#[embassy_executor::task]
pub async fn usb_task(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    device.run().await
}

/// Brings up the CDC-ACM status link. Call once.
pub fn init(
    usb_periph: peripherals::USB_OTG_FS,
    dp: peripherals::PA12,
    dm: peripherals::PA11,
) -> (UsbDevice<'static, UsbDriver>, UsbSerial) {
    let res = USB_RES.init(UsbResources {
        config_desc: [0; 256],
        bos_desc: [0; 256],
        control_buf: [0; 64],
        ep_out_buffer: [0; 256],
        state: State::new(),
    });

    let mut usb_config = usb_otg::Config::default();
    usb_config.vbus_detection = false;
    let driver = Driver::new_fs(usb_periph, Irqs, dp, dm, &mut res.ep_out_buffer, usb_config);

    let mut config = Config::new(0xc0de, 0xcafe);
    config.manufacturer = Some("heli-stick");
    config.product = Some("Force-feedback cyclic");
    config.serial_number = Some("HS-0001");

    let mut builder = Builder::new(
        driver,
        config,
        &mut res.config_desc,
        &mut res.bos_desc,
        &mut [], // msos_descs
        &mut res.control_buf,
    );
    let class = CdcAcmClass::new(&mut builder, &mut res.state, PACKET_SIZE as u16);
    let usb = builder.build();

    (usb, class)
}

/// Writes `bytes` in packet-sized chunks.
pub async fn write_chunked(tx: &mut UsbSender, bytes: &[u8]) -> Result<(), EndpointError> {
    for chunk in bytes.chunks(PACKET_SIZE) {
        tx.write_packet(chunk).await?;
    }
    Ok(())
}
