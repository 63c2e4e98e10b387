//! Hardware RNG tap as a `rand_core` generator.
//!
//! Lets code written against `RngCore` draw bytes straight from the pad's
//! `#` command.

use rand_core::{impls, CryptoRng, Error, RngCore};

use super::client::PadClient;
use super::transport::Transport;

/// Borrows a session and serves random bytes from its hardware RNG.
pub struct HardwareRng<'a, T: Transport> {
    client: &'a mut PadClient<T>,
}

impl<'a, T: Transport> HardwareRng<'a, T> {
    pub fn new(client: &'a mut PadClient<T>) -> Self {
        Self { client }
    }
}

impl<'a, T: Transport> RngCore for HardwareRng<'a, T> {
    fn next_u32(&mut self) -> u32 {
        impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_fill(self)
    }

    /// Panics if the device fails; use `try_fill_bytes` to handle errors.
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(err) = self.try_fill_bytes(dest) {
            panic!("Snap-Pad RNG failed: {}", err);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        let bytes = self.client.read_rng(dest.len()).map_err(Error::new)?;
        dest.copy_from_slice(&bytes);
        Ok(())
    }
}

impl<'a, T: Transport> CryptoRng for HardwareRng<'a, T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PadConfig;
    use crate::device::mock::MockPad;

    #[test]
    fn test_hardware_rng_fills() {
        let mut client = PadClient::open(MockPad::new(3), "MOCK", PadConfig::default()).unwrap();
        let mut rng = HardwareRng::new(&mut client);
        let mut buf = [0u8; 100];
        rng.try_fill_bytes(&mut buf).unwrap();
        assert_ne!(buf, [0u8; 100]);
        let a = rng.next_u64();
        let b = rng.next_u64();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hardware_rng_reports_errors() {
        // The mock answers 64 bytes per tap; expecting 128 leaves the read short.
        let mut config = PadConfig::default();
        config.rng_chunk_len = 128;
        let mut client = PadClient::open(MockPad::new(3), "MOCK", config).unwrap();
        let mut rng = HardwareRng::new(&mut client);
        let mut buf = [0u8; 8];
        assert!(rng.try_fill_bytes(&mut buf).is_err());
    }
}
