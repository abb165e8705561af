use embassy_stm32::adc::{Adc, SampleTime};
use embassy_stm32::gpio::{AnyPin, Level, Output};
use embassy_stm32::peripherals::{ADC1, PA4};
use embassy_stm32::rcc::*;
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::Config;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;

use heli_stick::drivers::alarm::{Alarm, BeepPattern};
use heli_stick::drivers::stepper::{CyclicAxis, MotorGroup, StepDirection, Stepper};

/// Beep requests waiting for the buzzer task.
pub const BEEP_QUEUE_DEPTH: usize = 4;

/// About 2 us at 168 MHz. Covers the driver's DIR setup and STEP high time.
const STEP_PULSE_CYCLES: u32 = 336;

pub struct Board {
    pub p: embassy_stm32::Peripherals,
}

impl Board {
    pub fn init() -> Self {
        let mut config = Config::default();
        config.rcc.hse = Some(Hse {
            freq: TimeHertz(8_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL168,
            divp: Some(PllPDiv::DIV2), // 168 MHz core
            divq: Some(PllQDiv::DIV7), // 48 MHz USB
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;

        let p = embassy_stm32::init(config);

        Self { p }
    }
}

pub struct StepDirPins {
    pub step: Output<'static, AnyPin>,
    pub dir: Output<'static, AnyPin>,
}

/// The two cyclic stepper drivers on one shared enable line, plus the
/// collective friction motor's enable line. Both enables are active low.
pub struct GpioSteppers {
    x: StepDirPins,
    y: StepDirPins,
    cyclic_enable: Output<'static, AnyPin>,
    collective_enable: Output<'static, AnyPin>,
}

impl GpioSteppers {
    /// Both enables should start high so the motors come up released.
    pub fn new(
        x: StepDirPins,
        y: StepDirPins,
        cyclic_enable: Output<'static, AnyPin>,
        collective_enable: Output<'static, AnyPin>,
    ) -> Self {
        Self { x, y, cyclic_enable, collective_enable }
    }
}

impl Stepper for GpioSteppers {
    fn step(&mut self, axis: CyclicAxis, direction: StepDirection) {
        let pins = match axis {
            CyclicAxis::X => &mut self.x,
            CyclicAxis::Y => &mut self.y,
        };
        pins.dir.set_level(match direction {
            StepDirection::High => Level::High,
            StepDirection::Low => Level::Low,
        });
        pins.step.set_high();
        cortex_m::asm::delay(STEP_PULSE_CYCLES);
        pins.step.set_low();
    }

    fn hold(&mut self, group: MotorGroup, engaged: bool) {
        let enable = match group {
            MotorGroup::Cyclic => &mut self.cyclic_enable,
            MotorGroup::Collective => &mut self.collective_enable,
        };
        enable.set_level(if engaged { Level::Low } else { Level::High });
    }
}

/// Hands patterns to `buzzer_task`. A full queue drops the request.
pub struct BuzzerAlarm {
    patterns: Sender<'static, CriticalSectionRawMutex, BeepPattern, BEEP_QUEUE_DEPTH>,
}

impl BuzzerAlarm {
    pub fn new(patterns: Sender<'static, CriticalSectionRawMutex, BeepPattern, BEEP_QUEUE_DEPTH>) -> Self {
        Self { patterns }
    }
}

impl Alarm for BuzzerAlarm {
    fn sound(&mut self, pattern: BeepPattern) {
        if self.patterns.try_send(pattern).is_err() {
            defmt::debug!("beep dropped: {}", pattern);
        }
    }
}

/// Collective lever potentiometer on an ADC1 input.
pub struct CollectiveSensor {
    adc: Adc<'static, ADC1>,
    pin: PA4,
}

impl CollectiveSensor {
    pub fn new(mut adc: Adc<'static, ADC1>, pin: PA4) -> Self {
        adc.set_sample_time(SampleTime::Cycles480);
        Self { adc, pin }
    }

    /// One blocking conversion, 12-bit.
    pub fn read(&mut self) -> u16 {
        self.adc.read(&mut self.pin)
    }
}
