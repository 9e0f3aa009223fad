// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Peripheral initialization for the bootloader.
//!
//! Board wiring:
//! - GP25: progress LED, GP15: step LED
//! - GP0/GP1: UART0 TX/RX, 115200 8N1
//! - GP16..GP19: SPI0 MISO/CS/SCK/MOSI to the SD card socket

use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::SdCard;
use rp2040_hal as hal;
use rp2040_hal::fugit::{HertzU32, RateExtU32};
use rp2040_hal::gpio::bank0::{Gpio0, Gpio1, Gpio15, Gpio16, Gpio17, Gpio18, Gpio19, Gpio25};
use rp2040_hal::gpio::{FunctionSioOutput, FunctionSpi, FunctionUart, Pin, PullDown};
use rp2040_hal::Clock;

use crate::console::Console;

const XTAL_FREQ_HZ: u32 = 12_000_000;
const UART_BAUD: u32 = 115_200;
/// SD cards must be initialized at 400 kHz or less.
const SD_INIT_BAUD_HZ: u32 = 400_000;
const SD_BAUD_HZ: u32 = 16_000_000;

pub type StepLed = Pin<Gpio15, FunctionSioOutput, PullDown>;
pub type ProgressLed = Pin<Gpio25, FunctionSioOutput, PullDown>;

type UartPins = (
    Pin<Gpio0, FunctionUart, PullDown>,
    Pin<Gpio1, FunctionUart, PullDown>,
);
pub type Uart = hal::uart::UartPeripheral<hal::uart::Enabled, hal::pac::UART0, UartPins>;

type SpiPins = (
    Pin<Gpio19, FunctionSpi, PullDown>,
    Pin<Gpio16, FunctionSpi, PullDown>,
    Pin<Gpio18, FunctionSpi, PullDown>,
);
type SdSpiBus = hal::spi::Spi<hal::spi::Enabled, hal::pac::SPI0, SpiPins, 8>;
type SdCsPin = Pin<Gpio17, FunctionSioOutput, PullDown>;
pub type SdCardDevice = SdCard<ExclusiveDevice<SdSpiBus, SdCsPin, hal::Timer>, hal::Timer>;

pub struct Peripherals {
    pub console: Console<Uart>,
    pub step_led: StepLed,
    pub progress_led: ProgressLed,
    pub sd_card: SdCardDevice,
    pub timer: hal::Timer,
    pub peripheral_freq: HertzU32,
}

pub fn init() -> Peripherals {
    let mut pac = unsafe { hal::pac::Peripherals::steal() };

    let mut watchdog = hal::Watchdog::new(pac.WATCHDOG);
    let clocks = hal::clocks::init_clocks_and_plls(
        XTAL_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .unwrap();

    let timer = hal::Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let sio = hal::Sio::new(pac.SIO);
    let pins = hal::gpio::Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );
    let peripheral_freq = clocks.peripheral_clock.freq();

    let uart_pins = (
        pins.gpio0.into_function::<FunctionUart>(),
        pins.gpio1.into_function::<FunctionUart>(),
    );
    let uart = hal::uart::UartPeripheral::new(pac.UART0, uart_pins, &mut pac.RESETS)
        .enable(
            hal::uart::UartConfig::new(
                UART_BAUD.Hz(),
                hal::uart::DataBits::Eight,
                None,
                hal::uart::StopBits::One,
            ),
            peripheral_freq,
        )
        .unwrap();

    let spi_pins = (
        pins.gpio19.into_function::<FunctionSpi>(),
        pins.gpio16.into_function::<FunctionSpi>(),
        pins.gpio18.into_function::<FunctionSpi>(),
    );
    let spi = hal::spi::Spi::<_, _, _, 8>::new(pac.SPI0, spi_pins).init(
        &mut pac.RESETS,
        peripheral_freq,
        SD_INIT_BAUD_HZ.Hz(),
        embedded_hal::spi::MODE_0,
    );
    let sd_spi = ExclusiveDevice::new(spi, pins.gpio17.into_push_pull_output(), timer).unwrap();

    Peripherals {
        console: Console::new(uart),
        step_led: pins.gpio15.into_push_pull_output(),
        progress_led: pins.gpio25.into_push_pull_output(),
        sd_card: SdCard::new(sd_spi, timer),
        timer,
        peripheral_freq,
    }
}

/// Initialize the card at the slow clock, then raise the SPI clock.
///
/// A card that does not answer stays at the slow clock; the mount that
/// follows reports the failure.
pub fn prepare_sd_card(card: &SdCardDevice, peripheral_freq: HertzU32) {
    match card.num_bytes() {
        Ok(bytes) => {
            defmt::println!("SD card: {} MiB", bytes / (1024 * 1024));
            let actual = card.spi(|dev| {
                dev.bus_mut()
                    .set_baudrate(peripheral_freq, SD_BAUD_HZ.Hz())
            });
            defmt::println!("SD SPI clock: {} Hz", actual.to_Hz());
        }
        Err(e) => defmt::println!("SD card not ready: {}", defmt::Debug2Format(&e)),
    }
}
