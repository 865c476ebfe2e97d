/// Uplink/downlink scratch buffers. Their layout belongs to the payload
/// packer on the ground side; the flight software only owns the memory.
pub struct FlightData {
    pub outbound: [u8; 52],
    pub inbound: [u8; 50],
}

impl Default for FlightData {
    fn default() -> Self {
        Self { outbound: [0; 52], inbound: [0; 50] }
    }
}

impl FlightData {
    /// Zero-fills the inbound buffer before the first downlink.
    pub fn clear_inbound(&mut self) { self.inbound.fill(0); }
}
