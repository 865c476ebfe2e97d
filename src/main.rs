#![allow(dead_code, clippy::similar_names)]
#![warn(clippy::shadow_reuse, clippy::shadow_same, clippy::builtin_type_shadow)]
mod flight_control;
mod flight_data;
#[cfg(not(feature = "flight"))]
mod ground_link;
mod hardware;
mod logger;

use crate::flight_control::{FlightComputer, LifecycleOpts};
use crate::flight_data::FlightData;
#[cfg(not(feature = "flight"))]
use crate::ground_link::GroundLink;
use crate::hardware::{BenchModem, BenchStatusLine, StatusLine, bench_sensor_array};
use chrono::{TimeDelta, Utc};
use std::{sync::Arc, time::Duration};

const TICK_INTERVAL: Duration = Duration::from_millis(100);
const BLINK_INTERVAL: Duration = Duration::from_millis(150);
const MODEM_WAKE_LATENCY: TimeDelta = TimeDelta::seconds(8);

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let modem = Arc::new(BenchModem::new(MODEM_WAKE_LATENCY));
    let led = BenchStatusLine::new("status-indicator");

    greet(&led).await;

    #[cfg(not(feature = "flight"))]
    let link = GroundLink::start();
    #[cfg(not(feature = "flight"))]
    link.send_token(GroundLink::STARTUP_COMPLETE);

    #[cfg(feature = "flight")]
    arm_crash_flag();

    let mut flight_data = FlightData::default();
    flight_data.clear_inbound();

    let mut f_cont = FlightComputer::new(modem, bench_sensor_array(), LifecycleOpts::default());

    #[cfg(not(feature = "flight"))]
    {
        let status_byte = f_cont.health_check().await;
        link.send_status(status_byte);
    }
    #[cfg(feature = "flight")]
    f_cont.health_check().await;

    #[cfg(not(feature = "flight"))]
    let mut last_phase = f_cont.phase();
    loop {
        f_cont.step(Utc::now()).await;
        #[cfg(not(feature = "flight"))]
        if f_cont.phase() != last_phase {
            link.send_phase(f_cont.phase());
            link.send_status(f_cont.status_byte());
            last_phase = f_cont.phase();
        }
        tokio::time::sleep(TICK_INTERVAL).await;
    }
}

/// Five wake blinks on the status indicator, the visual sign of life before
/// any other subsystem is touched.
async fn greet(led: &impl StatusLine) {
    for _ in 0..5 {
        led.set_high();
        tokio::time::sleep(BLINK_INTERVAL).await;
        led.set_low();
        tokio::time::sleep(BLINK_INTERVAL).await;
    }
}

/// Crash check: an armed flag means the previous run never cleared it, so
/// it ended in power loss or a reset. Either way, re-arm for this run.
#[cfg(feature = "flight")]
fn arm_crash_flag() {
    use crate::hardware::{CRASH_SET, CrashStore, FileCrashStore};
    let path_var = std::env::var("JAGSAT_EEPROM_PATH");
    let path = path_var.as_ref().map_or("./jagsat-eeprom.bin", |v| v.as_str());
    let mut store = FileCrashStore::new(path);
    match store.read_flag() {
        Ok(CRASH_SET) => crash_recovery(),
        Ok(_) => {
            if let Err(e) = store.write_flag(CRASH_SET) {
                error!("Could not arm the crash flag: {e}");
            }
        }
        Err(e) => error!("Could not read the crash flag: {e}"),
    }
}

/// Hook for acting on an unclean previous run. There is no decided recovery
/// policy yet; the hook only records the event.
#[cfg(feature = "flight")]
fn crash_recovery() {
    warn!("Crash flag was set: previous run did not complete cleanly.");
    // TODO: crash recovery policy.
}
