//! CRC-16/MODBUS.
//!
//! Polynomial 0x8005 (reflected), initial value 0xFFFF, reflected input and
//! output, no final XOR. The sender and the reassembler share [`MODBUS`];
//! any divergence shows up on the wire as checksum mismatches.

use crc::{Crc, Digest, CRC_16_MODBUS};

/// The algorithm instance used on both sides of the link.
pub static MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Checksum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u16 {
    MODBUS.checksum(bytes)
}

/// Incremental digest, for payloads that are written out in pieces.
pub struct Crc16Modbus {
    digest: Digest<'static, u16>,
}

impl Crc16Modbus {
    pub fn new() -> Self {
        Self {
            digest: MODBUS.digest(),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    pub fn finish(self) -> u16 {
        self.digest.finalize()
    }
}

impl Default for Crc16Modbus {
    fn default() -> Self {
        Self::new()
    }
}
