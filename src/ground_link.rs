use crate::event;
use crate::flight_control::FlightPhase;
use tokio::sync::mpsc;

/// Diagnostic frames echoed to the ground-side serial console. One-way and
/// best-effort: a dropped frame is never an error.
pub enum GroundMessage {
    Token(&'static str),
    Phase(FlightPhase),
    Status(u8),
}

/// Handle to the ground-link echo task. Cheap to clone; senders never block
/// and never fail the caller.
#[derive(Clone)]
pub struct GroundLink {
    tx: mpsc::UnboundedSender<GroundMessage>,
}

impl GroundLink {
    /// Token announcing that startup setup completed.
    pub const STARTUP_COMPLETE: &'static str = "1";

    /// Spawns the echo task and returns the sender handle.
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match msg {
                    GroundMessage::Token(token) => println!("{token}"),
                    GroundMessage::Phase(phase) => println!("{phase}"),
                    GroundMessage::Status(byte) => println!("{}", Self::status_frame(byte)),
                }
            }
        });
        Self { tx }
    }

    /// Frames the status bitfield the way the ground station expects it.
    pub fn status_frame(byte: u8) -> String { format!("<${byte}>") }

    pub fn send_token(&self, token: &'static str) { self.send(GroundMessage::Token(token)); }

    pub fn send_phase(&self, phase: FlightPhase) { self.send(GroundMessage::Phase(phase)); }

    pub fn send_status(&self, byte: u8) { self.send(GroundMessage::Status(byte)); }

    fn send(&self, msg: GroundMessage) {
        if self.tx.send(msg).is_err() {
            event!("Ground link echo task gone. Dropping frame.");
        }
    }
}
