use bitvec::{array::BitArray, order::Lsb0};

/// Compact hardware-health record, one bit per monitored subsystem.
///
/// Written only through [`StatusBitfield::set_bit`], so a health update can
/// never clobber an unrelated bit. There is a single thread of control, but
/// the accessor is one masked store, so an interrupt-driven writer could be
/// added without changing callers.
#[derive(Debug, Default, Clone)]
pub struct StatusBitfield {
    bits: BitArray<[u8; 1], Lsb0>,
}

impl StatusBitfield {
    /// Modem answered the last liveness check.
    pub const MODEM_LIVE: usize = 0;
    /// Sensor array passed the last cross-check (cleared when degraded).
    pub const SENSORS_AGREE: usize = 1;

    const WIDTH: usize = 8;

    /// Sets or clears exactly one bit, leaving all others untouched.
    /// Out-of-range indices are a programming error and are ignored.
    pub fn set_bit(&mut self, index: usize, value: bool) {
        debug_assert!(index < Self::WIDTH, "status bit index {index} out of range");
        if index < Self::WIDTH {
            self.bits.set(index, value);
        }
    }

    pub fn get(&self, index: usize) -> bool {
        self.bits.get(index).is_some_and(|bit| *bit)
    }

    /// The raw byte, for the ground-link echo.
    pub fn read(&self) -> u8 { self.bits.data[0] }
}
