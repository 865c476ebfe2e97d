use super::{
    flight_phase::FlightPhase, modem_gate::ModemGate, sensor_gate::SensorGate,
    status::StatusBitfield,
};
use crate::hardware::{ModemTransport, SensorDriver};
use crate::{event, info, log, warn};
use chrono::{DateTime, TimeDelta, Utc};
use fixed::types::I32F32;
use std::sync::Arc;

/// Tuning knobs for the flight lifecycle. A retry cap of zero means
/// unbounded, matching the keep-trying-until-ready behavior of the first
/// flight build.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleOpts {
    /// Samples per channel the cross-check needs before it can pass.
    pub sample_window: usize,
    /// Agreement tolerance for the cross-check, in channel units.
    pub agreement_tolerance: I32F32,
    /// Failed sampling rounds before proceeding degraded. Zero = unbounded.
    pub sensor_retry_cap: u32,
    /// Pause after a sampling round, so the transducers are not saturated.
    pub settling_delay: TimeDelta,
    /// Failed liveness queries before skipping transmission. Zero = unbounded.
    pub modem_retry_cap: u32,
    /// Pause between liveness queries once sensor work is done.
    pub modem_poll_backoff: TimeDelta,
    /// Window granted to a transmission session.
    pub transmit_duration: TimeDelta,
    /// Low-power interval between cycles.
    pub sleep_duration: TimeDelta,
}

impl LifecycleOpts {
    pub const DEF_SAMPLE_WINDOW: usize = 3;
    pub const DEF_AGREEMENT_TOL: I32F32 = I32F32::lit("1.0");
    pub const DEF_SENSOR_RETRY_CAP: u32 = 5;
    pub const DEF_SETTLING_DELAY: TimeDelta = TimeDelta::seconds(2);
    pub const DEF_MODEM_RETRY_CAP: u32 = 20;
    pub const DEF_MODEM_POLL_BACKOFF: TimeDelta = TimeDelta::seconds(5);
    pub const DEF_TRANSMIT_DURATION: TimeDelta = TimeDelta::seconds(15);
    pub const DEF_SLEEP_DURATION: TimeDelta = TimeDelta::seconds(30);
}

impl Default for LifecycleOpts {
    fn default() -> Self {
        Self {
            sample_window: Self::DEF_SAMPLE_WINDOW,
            agreement_tolerance: Self::DEF_AGREEMENT_TOL,
            sensor_retry_cap: Self::DEF_SENSOR_RETRY_CAP,
            settling_delay: Self::DEF_SETTLING_DELAY,
            modem_retry_cap: Self::DEF_MODEM_RETRY_CAP,
            modem_poll_backoff: Self::DEF_MODEM_POLL_BACKOFF,
            transmit_duration: Self::DEF_TRANSMIT_DURATION,
            sleep_duration: Self::DEF_SLEEP_DURATION,
        }
    }
}

/// The flight lifecycle state machine.
///
/// Owns the current [`FlightPhase`], the per-cycle readiness flags, the two
/// readiness gates and the status bitfield. [`FlightComputer::step`] is the
/// single entry point: one call performs at most one transition or one
/// phase-internal action and returns. All waiting is a deadline comparison
/// against the `now` handed in, never a blocking delay, so the machine can
/// be ticked at any rate.
pub struct FlightComputer {
    phase: FlightPhase,
    sensors_ready: bool,
    modem_ready: bool,
    woke_modem_at: Option<DateTime<Utc>>,
    settle_until: Option<DateTime<Utc>>,
    modem_hold_until: Option<DateTime<Utc>>,
    phase_until: Option<DateTime<Utc>>,
    sensor_rounds: u32,
    modem_attempts: u32,
    status: StatusBitfield,
    sensor_gate: SensorGate,
    modem_gate: ModemGate,
    opts: LifecycleOpts,
}

impl FlightComputer {
    pub fn new(
        transport: Arc<dyn ModemTransport + Send + Sync>,
        sensors: Vec<Box<dyn SensorDriver + Send + Sync>>,
        opts: LifecycleOpts,
    ) -> Self {
        Self {
            phase: FlightPhase::Startup,
            sensors_ready: false,
            modem_ready: false,
            woke_modem_at: None,
            settle_until: None,
            modem_hold_until: None,
            phase_until: None,
            sensor_rounds: 0,
            modem_attempts: 0,
            status: StatusBitfield::default(),
            sensor_gate: SensorGate::new(sensors, opts.sample_window),
            modem_gate: ModemGate::new(transport),
            opts,
        }
    }

    pub fn phase(&self) -> FlightPhase { self.phase }

    pub fn sensors_ready(&self) -> bool { self.sensors_ready }

    pub fn modem_ready(&self) -> bool { self.modem_ready }

    pub fn status(&self) -> &StatusBitfield { &self.status }

    pub fn status_byte(&self) -> u8 { self.status.read() }

    /// Startup system test: one modem liveness query, recorded in the
    /// bitfield. Returns the bitfield byte for the ground-link echo.
    pub async fn health_check(&mut self) -> u8 {
        if self.modem_gate.query_ready(&mut self.status).await {
            info!("Modem liveness check passed.");
        } else {
            warn!("Modem liveness check failed.");
        }
        self.status.read()
    }

    /// Advances the lifecycle by one tick.
    pub async fn step(&mut self, now: DateTime<Utc>) {
        match self.phase {
            FlightPhase::Startup => self.run_startup(now).await,
            FlightPhase::PollAndWait => self.run_poll_and_wait(now).await,
            FlightPhase::TransmitReceive => {
                if self.phase_until.is_none_or(|due| now >= due) {
                    info!("Transmission window closed.");
                    self.enter_sleep(now).await;
                }
            }
            FlightPhase::LowPowerSleep => {
                if self.phase_until.is_none_or(|due| now >= due) {
                    self.phase = FlightPhase::Startup;
                    self.phase_until = None;
                }
            }
        }
    }

    /// Entry actions of `Startup`, then the unconditional hop to
    /// `PollAndWait` within the same tick.
    async fn run_startup(&mut self, now: DateTime<Utc>) {
        self.sensors_ready = false;
        self.modem_ready = false;
        self.sensor_rounds = 0;
        self.modem_attempts = 0;
        self.settle_until = None;
        self.modem_hold_until = None;
        self.sensor_gate.reset();
        self.woke_modem_at = Some(now);
        self.modem_gate.wake().await;
        info!("Modem wakeup issued. Entering {}.", FlightPhase::PollAndWait);
        self.phase = FlightPhase::PollAndWait;
    }

    /// One `PollAndWait` tick. The exit check runs first, on the flag state
    /// the tick started with, so a flag set during a tick takes effect on
    /// the next one.
    async fn run_poll_and_wait(&mut self, now: DateTime<Utc>) {
        if self.sensors_ready && self.modem_ready {
            self.enter_transmit(now);
            return;
        }

        if !self.sensors_ready && self.settle_until.is_none_or(|due| now >= due) {
            let set = self.sensor_gate.sample_all(now).await;
            event!("Sampling round {}: {:?}", self.sensor_rounds + 1, set.readings());
            if self.sensor_gate.is_ready(self.opts.agreement_tolerance) {
                self.sensors_ready = true;
                self.status.set_bit(StatusBitfield::SENSORS_AGREE, true);
                log!("Sensor array ready after {} rounds.", self.sensor_rounds + 1);
            } else {
                self.sensor_rounds += 1;
                if self.opts.sensor_retry_cap > 0 && self.sensor_rounds >= self.opts.sensor_retry_cap
                {
                    warn!(
                        "Sensor cross-check still failing after {} rounds. Proceeding degraded.",
                        self.sensor_rounds
                    );
                    self.status.set_bit(StatusBitfield::SENSORS_AGREE, false);
                    self.sensors_ready = true;
                } else {
                    self.settle_until = Some(now + self.opts.settling_delay);
                }
            }
        }

        if !self.modem_ready && self.modem_hold_until.is_none_or(|due| now >= due) {
            if self.modem_gate.query_ready(&mut self.status).await {
                self.modem_ready = true;
                let waited = self.woke_modem_at.map_or(0, |woke| (now - woke).num_seconds());
                log!("Modem ready {waited}s after wakeup.");
            } else {
                self.modem_attempts += 1;
                if self.opts.modem_retry_cap > 0 && self.modem_attempts >= self.opts.modem_retry_cap
                {
                    warn!(
                        "Modem not ready after {} queries. Skipping transmission this cycle.",
                        self.modem_attempts
                    );
                    self.enter_sleep(now).await;
                    return;
                }
                if self.sensors_ready {
                    // Sensor work is done, no reason to hammer the modem at
                    // full tick rate.
                    self.modem_hold_until = Some(now + self.opts.modem_poll_backoff);
                }
            }
        }
    }

    fn enter_transmit(&mut self, now: DateTime<Utc>) {
        let waited = self.woke_modem_at.map_or(0, |woke| (now - woke).num_seconds());
        info!("Beginning transmission {waited}s after modem wakeup.");
        self.phase = FlightPhase::TransmitReceive;
        self.phase_until = Some(now + self.opts.transmit_duration);
    }

    async fn enter_sleep(&mut self, now: DateTime<Utc>) {
        self.sensors_ready = false;
        self.modem_ready = false;
        self.modem_gate.sleep().await;
        self.phase = FlightPhase::LowPowerSleep;
        self.phase_until = Some(now + self.opts.sleep_duration);
        info!(
            "Entering {} for {}s.",
            FlightPhase::LowPowerSleep,
            self.opts.sleep_duration.num_seconds()
        );
    }
}
