mod flight_computer;
mod flight_phase;
mod modem_gate;
mod sensor_gate;
mod status;
#[cfg(test)]
mod tests;

pub use flight_computer::{FlightComputer, LifecycleOpts};
pub use flight_phase::FlightPhase;
pub use modem_gate::ModemGate;
pub use sensor_gate::{SampleSet, SensorGate};
pub use status::StatusBitfield;
