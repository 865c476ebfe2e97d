use super::{
    CRASH_CLEAR, CrashStore, ModemError, ModemTransport, SensorDriver, SensorQuantity, StatusLine,
    StoreError,
};
use crate::event;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use fixed::types::I32F32;
use rand::Rng;
use std::{fs, io, path::PathBuf, time::Duration};
use tokio::sync::Mutex;

/// Bench stand-in for the satellite modem.
///
/// Mimics the one property the lifecycle cares about: after the wake line
/// rises, the modem needs `wake_latency` before it acknowledges a liveness
/// command. Construction leaves it warm, matching a modem that powered up
/// with the sleep line released.
pub struct BenchModem {
    wake_latency: TimeDelta,
    awake_since: Mutex<Option<DateTime<Utc>>>,
}

impl BenchModem {
    pub fn new(wake_latency: TimeDelta) -> Self {
        Self {
            wake_latency,
            awake_since: Mutex::new(Some(Utc::now() - wake_latency)),
        }
    }
}

#[async_trait]
impl ModemTransport for BenchModem {
    async fn send(&self, command: &str, _timeout: Duration) -> Result<String, ModemError> {
        let awake_since = *self.awake_since.lock().await;
        match awake_since {
            None => Err(ModemError::LinkDown),
            Some(t) if Utc::now() - t < self.wake_latency => Err(ModemError::Timeout),
            Some(_) => {
                if command.starts_with("AT") {
                    Ok(String::from("OK\r\n"))
                } else {
                    Err(ModemError::NoAck)
                }
            }
        }
    }

    async fn set_awake(&self, awake: bool) {
        let mut since = self.awake_since.lock().await;
        if awake {
            // A wake pulse on an already-warm modem does not restart warmup.
            since.get_or_insert_with(Utc::now);
            event!("Modem wake line raised.");
        } else {
            *since = None;
            event!("Modem sleep line asserted.");
        }
    }
}

/// Bench sensor: a steady base value with uniform jitter.
pub struct BenchSensor {
    quantity: SensorQuantity,
    base: I32F32,
    jitter: f64,
}

impl BenchSensor {
    pub fn new(quantity: SensorQuantity, base: I32F32, jitter: f64) -> Self {
        Self { quantity, base, jitter }
    }
}

#[async_trait]
impl SensorDriver for BenchSensor {
    fn quantity(&self) -> SensorQuantity { self.quantity }

    async fn read(&self) -> I32F32 {
        let noise = rand::rng().random_range(-self.jitter..=self.jitter);
        self.base + I32F32::from_num(noise)
    }
}

/// The flight sensor complement: a redundant temperature pair plus the
/// barometric stack (pressure, humidity, pressure-derived altitude).
pub fn bench_sensor_array() -> Vec<Box<dyn SensorDriver + Send + Sync>> {
    vec![
        Box::new(BenchSensor::new(SensorQuantity::Temperature, I32F32::lit("21.3"), 0.2)),
        Box::new(BenchSensor::new(SensorQuantity::Temperature, I32F32::lit("21.5"), 0.2)),
        Box::new(BenchSensor::new(SensorQuantity::Pressure, I32F32::lit("1013.25"), 0.3)),
        Box::new(BenchSensor::new(SensorQuantity::Humidity, I32F32::lit("38.0"), 0.3)),
        Box::new(BenchSensor::new(SensorQuantity::Altitude, I32F32::lit("142.0"), 0.4)),
    ]
}

pub struct BenchStatusLine {
    name: &'static str,
}

impl BenchStatusLine {
    pub fn new(name: &'static str) -> Self { Self { name } }
}

impl StatusLine for BenchStatusLine {
    fn set_high(&self) { event!("[{}] line high", self.name); }

    fn set_low(&self) { event!("[{}] line low", self.name); }
}

/// File-backed EEPROM stand-in: one byte at offset zero. A missing file
/// reads as a clean shutdown.
pub struct FileCrashStore {
    path: PathBuf,
}

impl FileCrashStore {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

impl CrashStore for FileCrashStore {
    fn read_flag(&mut self) -> Result<u8, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes.first().copied().unwrap_or(CRASH_CLEAR)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CRASH_CLEAR),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    fn write_flag(&mut self, value: u8) -> Result<(), StoreError> {
        fs::write(&self.path, [value]).map_err(StoreError::from)
    }
}
