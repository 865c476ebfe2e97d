mod bench;

pub use bench::{BenchModem, BenchSensor, BenchStatusLine, FileCrashStore, bench_sensor_array};

use async_trait::async_trait;
use fixed::types::I32F32;
use std::time::Duration;
use strum_macros::Display;

/// Crash byte value marking an unclean previous run.
pub const CRASH_SET: u8 = 0xFF;
/// Crash byte value marking a clean shutdown.
pub const CRASH_CLEAR: u8 = 0x00;

#[derive(Debug, Display)]
pub enum ModemError {
    /// No response within the acknowledgement timeout.
    Timeout,
    /// The modem answered, but not with the expected acknowledgement.
    NoAck,
    /// The sleep line is down, the modem cannot answer at all.
    LinkDown,
}

impl std::error::Error for ModemError {}

#[derive(Debug, Display)]
pub enum StoreError {
    Io(std::io::Error),
}

impl std::error::Error for StoreError {}
impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self { StoreError::Io(value) }
}

/// Physical quantity a sensor channel reports. Redundant channels share a
/// quantity and are cross-checked against each other by the sensor gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, serde::Serialize, serde::Deserialize)]
pub enum SensorQuantity {
    Temperature,
    Pressure,
    Humidity,
    Altitude,
}

/// Command/response seam to the satellite modem.
///
/// `send` issues one command and waits at most `timeout` for the reply line.
/// `set_awake` toggles the sleep/wake control line; it never fails, the line
/// is a bare GPIO.
#[async_trait]
pub trait ModemTransport {
    async fn send(&self, command: &str, timeout: Duration) -> Result<String, ModemError>;
    async fn set_awake(&self, awake: bool);
}

/// One sensor channel. Reads have no error channel: a failed read surfaces
/// as an out-of-range value and is caught by the cross-check, not here.
#[async_trait]
pub trait SensorDriver {
    fn quantity(&self) -> SensorQuantity;
    async fn read(&self) -> I32F32;
}

/// A discrete output line (status indicator LED and friends).
pub trait StatusLine {
    fn set_high(&self);
    fn set_low(&self);
}

/// One persisted byte at a fixed address, surviving power loss.
pub trait CrashStore {
    fn read_flag(&mut self) -> Result<u8, StoreError>;
    fn write_flag(&mut self, value: u8) -> Result<(), StoreError>;
}
