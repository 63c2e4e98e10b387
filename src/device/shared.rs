//! Session sharing across threads.
//!
//! The wire protocol has no request tags: two commands whose bytes
//! interleave desynchronize the session. `SharedPad` serializes whole
//! logical commands (request plus complete response) behind one lock.

use std::sync::{Arc, Mutex};

use super::client::PadClient;
use super::transport::Transport;
use super::DeviceError;

/// Cloneable handle to one session.
pub struct SharedPad<T: Transport> {
    inner: Arc<Mutex<PadClient<T>>>,
}

impl<T: Transport> Clone for SharedPad<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: Transport> SharedPad<T> {
    pub fn new(client: PadClient<T>) -> Self {
        Self { inner: Arc::new(Mutex::new(client)) }
    }

    /// Runs `f` with exclusive access to the session.
    ///
    /// A panic inside a previous holder poisons the lock; the session may be
    /// mid-response, so this reports a protocol error instead of continuing.
    pub fn with_session<R, E>(
        &self,
        f: impl FnOnce(&mut PadClient<T>) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<DeviceError>,
    {
        let mut guard = self.inner.lock().map_err(|_| {
            DeviceError::Protocol(String::from("session lock poisoned; reopen the device"))
        })?;
        f(&mut *guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PadConfig;
    use crate::device::mock::MockPad;
    use std::thread;

    #[test]
    fn test_concurrent_commands_stay_in_step() {
        let client = PadClient::open(MockPad::new(4), "MOCK", PadConfig::default()).unwrap();
        let shared = SharedPad::new(client);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pad = shared.clone();
                thread::spawn(move || {
                    for _ in 0..8 {
                        let bytes = pad.with_session(|c| c.hwrng()).unwrap();
                        assert_eq!(bytes.len(), 64);
                        let diag = pad.with_session(|c| c.get_diagnostics()).unwrap();
                        assert!(diag.contains_key("Mode"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let pages = shared.with_session(|c| c.provision_pages(2)).unwrap();
        assert_eq!(pages.len(), 2);
    }
}
