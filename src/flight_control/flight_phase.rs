use strum_macros::Display;

/// The four discrete operating modes of the flight lifecycle.
///
/// Transitions run strictly in cycle order; the only way back to `Startup`
/// is through `LowPowerSleep`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Display)]
pub enum FlightPhase {
    Startup,
    PollAndWait,
    TransmitReceive,
    LowPowerSleep,
}

impl FlightPhase {
    /// The successor phase in the fixed cycle.
    pub fn next(self) -> Self {
        match self {
            FlightPhase::Startup => FlightPhase::PollAndWait,
            FlightPhase::PollAndWait => FlightPhase::TransmitReceive,
            FlightPhase::TransmitReceive => FlightPhase::LowPowerSleep,
            FlightPhase::LowPowerSleep => FlightPhase::Startup,
        }
    }
}
