use super::status::StatusBitfield;
use crate::event;
use crate::hardware::ModemTransport;
use std::{sync::Arc, time::Duration};

/// Decides, by polling the transport, whether the satellite modem is ready
/// to transmit, and records the outcome in the status bitfield.
pub struct ModemGate {
    transport: Arc<dyn ModemTransport + Send + Sync>,
    ack_timeout: Duration,
}

impl ModemGate {
    /// Liveness command expected to be acknowledged by a ready modem.
    pub const LIVENESS_CMD: &'static str = "AT\r";
    /// Expected acknowledgement line.
    pub const LIVENESS_ACK: &'static str = "OK";
    /// Bound on waiting for the acknowledgement.
    pub const DEF_ACK_TIMEOUT: Duration = Duration::from_millis(50);

    pub fn new(transport: Arc<dyn ModemTransport + Send + Sync>) -> Self {
        Self { transport, ack_timeout: Self::DEF_ACK_TIMEOUT }
    }

    /// Sends one liveness query and writes the outcome into bit
    /// [`StatusBitfield::MODEM_LIVE`] via the single-bit accessor.
    pub async fn query_ready(&self, status: &mut StatusBitfield) -> bool {
        let ok = match self.transport.send(Self::LIVENESS_CMD, self.ack_timeout).await {
            Ok(reply) => reply.trim() == Self::LIVENESS_ACK,
            Err(e) => {
                event!("Modem liveness query failed: {e}");
                false
            }
        };
        status.set_bit(StatusBitfield::MODEM_LIVE, ok);
        ok
    }

    /// Raises the wake control line.
    pub async fn wake(&self) { self.transport.set_awake(true).await; }

    /// Asserts the sleep control line.
    pub async fn sleep(&self) { self.transport.set_awake(false).await; }
}
