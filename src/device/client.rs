//! Page protocol client.
//!
//! `PadClient` owns the transport for one device session and pairs every
//! command with its complete response. It caches the firmware version and
//! diagnostics read when the session opens.
//!
//! # Latency
//! Provisioning and retrieval wait for a button press on the pad, so the
//! first line of every page frame is read with `page_wait_timeout`. All other
//! lines use `command_timeout`.

use std::collections::BTreeMap;

use base64::Engine;

use super::frame::{
    decode_line, parse_diagnostic, parse_preamble, FirmwareVersion, Preamble, Variant,
    BEGIN_DIAGNOSTICS, END_DIAGNOSTICS, END_PAGE,
};
use super::transport::Transport;
use super::DeviceError;
use crate::config::PadConfig;
use crate::pad::Page;

/// Diagnostic `Mode` value reported by a pad separated from its twin.
const SINGLE_BOARD_MODE: &str = "Single board";

/// One open session with a pad.
pub struct PadClient<T: Transport> {
    transport: T,
    config: PadConfig,
    serial_number: String,
    version: FirmwareVersion,
    diagnostics: BTreeMap<String, String>,
}

impl<T: Transport> PadClient<T> {
    /// Opens a session: reads the firmware version and diagnostics once.
    ///
    /// # Errors
    /// * `DeviceError::Firmware` for factory test or unknown firmware.
    /// * `DeviceError::Protocol` / `DeviceError::Timeout` if the pad does not
    ///   answer as expected.
    pub fn open(
        mut transport: T,
        serial_number: impl Into<String>,
        config: PadConfig,
    ) -> Result<Self, DeviceError> {
        let serial_number = serial_number.into();
        transport.set_read_timeout(config.command_timeout)?;

        let version = query_version(&mut transport)?;
        match version.variant {
            Variant::Release => {}
            Variant::Debug => log::warn!(
                "Snap-Pad {} is running debug firmware {}; this is not safe!",
                serial_number,
                version
            ),
            Variant::Mock => log::error!(
                "Snap-Pad {} is a test mockup ({}) and is not suitable for use for any purpose!",
                serial_number,
                version
            ),
        }

        let diagnostics = query_diagnostics(&mut transport)?;
        log::info!("Opened Snap-Pad {} (firmware {})", serial_number, version);

        Ok(Self { transport, config, serial_number, version, diagnostics })
    }

    pub fn config(&self) -> &PadConfig {
        &self.config
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    /// Firmware version read at session open.
    pub fn version(&self) -> FirmwareVersion {
        self.version
    }

    /// Diagnostics read at session open.
    pub fn diagnostics(&self) -> &BTreeMap<String, String> {
        &self.diagnostics
    }

    /// True if the pad reports it has been snapped apart from its twin.
    pub fn is_single(&self) -> bool {
        self.diagnostics.get("Mode").map(String::as_str) == Some(SINGLE_BOARD_MODE)
    }

    /// Sends `V` and parses the reply.
    pub fn get_version(&mut self) -> Result<FirmwareVersion, DeviceError> {
        query_version(&mut self.transport)
    }

    /// Sends `D` and parses the diagnostics block.
    pub fn get_diagnostics(&mut self) -> Result<BTreeMap<String, String>, DeviceError> {
        query_diagnostics(&mut self.transport)
    }

    /// Asks the pad for `count` fresh pages (`P<count>`).
    ///
    /// Blocks until the user confirms on the device or the wait times out.
    pub fn provision_pages(&mut self, count: usize) -> Result<Vec<Page>, DeviceError> {
        self.check_count(count)?;
        send_command(&mut self.transport, &format!("P{}", count))?;
        let pages = (0..count)
            .map(|_| self.read_page())
            .collect::<Result<Vec<_>, _>>()?;
        log::info!(
            "Provisioned pages {:?}",
            pages.iter().map(Page::index).collect::<Vec<_>>()
        );
        Ok(pages)
    }

    /// Re-reads previously provisioned pages by index (`R<i>,<j>,...`).
    /// Pages come back in request order.
    pub fn retrieve_pages(&mut self, indices: &[u16]) -> Result<Vec<Page>, DeviceError> {
        self.check_count(indices.len())?;
        if let Some(&bad) = indices.iter().find(|&&i| i == 0) {
            return Err(DeviceError::InvalidPageIndex(bad));
        }
        let list = indices.iter().map(u16::to_string).collect::<Vec<_>>().join(",");
        send_command(&mut self.transport, &format!("R{}", list))?;

        let mut pages = Vec::with_capacity(indices.len());
        for &expected in indices {
            let page = self.read_page()?;
            if page.index() != expected {
                return Err(DeviceError::Protocol(format!(
                    "requested page {} but the pad sent page {}",
                    expected,
                    page.index()
                )));
            }
            pages.push(page);
        }
        log::info!("Retrieved pages {:?}", indices);
        Ok(pages)
    }

    /// Reads `n` bytes from the hardware RNG. Each `#` command yields
    /// `rng_chunk_len` bytes; whole responses are always consumed.
    pub fn read_rng(&mut self, n: usize) -> Result<Vec<u8>, DeviceError> {
        let mut out = Vec::with_capacity(n + self.config.rng_chunk_len);
        while out.len() < n {
            send_command(&mut self.transport, "#")?;
            let chunk = self.transport.read_bytes(self.config.rng_chunk_len)?;
            if chunk.len() != self.config.rng_chunk_len {
                return Err(DeviceError::Timeout);
            }
            out.extend_from_slice(&chunk);
        }
        out.truncate(n);
        Ok(out)
    }

    /// One RNG tap (`rng_chunk_len` bytes).
    pub fn hwrng(&mut self) -> Result<Vec<u8>, DeviceError> {
        let n = self.config.rng_chunk_len;
        self.read_rng(n)
    }

    /// Ends the session and returns the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn check_count(&self, count: usize) -> Result<(), DeviceError> {
        if count == 0 || count > self.config.max_pages {
            return Err(DeviceError::BadCount { count, max: self.config.max_pages });
        }
        Ok(())
    }

    fn read_preamble(&mut self) -> Result<Preamble, DeviceError> {
        self.transport.set_read_timeout(self.config.page_wait_timeout)?;
        let line = self.transport.read_line();
        self.transport.set_read_timeout(self.config.command_timeout)?;
        parse_preamble(&decode_line(line?)?)
    }

    fn read_page(&mut self) -> Result<Page, DeviceError> {
        let index = match self.read_preamble()? {
            Preamble::Timeout => {
                log::warn!("Timed out waiting for the Snap-Pad button press");
                return Err(DeviceError::Timeout);
            }
            Preamble::Used(index) => {
                log::warn!("Page {} has already been used", index);
                return Ok(Page::used(index));
            }
            Preamble::Begin(index) => index,
        };

        let frame_len = self.config.frame_len();
        let max_encoded = frame_len.div_ceil(3) * 4;
        let mut body = String::with_capacity(max_encoded);
        loop {
            let line = decode_line(self.transport.read_line()?)?;
            let line = line.trim();
            if line == END_PAGE {
                break;
            }
            body.push_str(line);
            if body.len() > max_encoded {
                return Err(DeviceError::Protocol(format!("page {} body is too long", index)));
            }
        }

        let material = base64::engine::general_purpose::STANDARD
            .decode(body.as_bytes())
            .map_err(|e| {
                DeviceError::Protocol(format!("page {} body is not base64: {}", index, e))
            })?;
        Page::fresh(index, material, &self.config)
            .map_err(|e| DeviceError::Protocol(format!("page {}: {}", index, e)))
    }
}

fn send_command<T: Transport + ?Sized>(
    transport: &mut T,
    command: &str,
) -> Result<(), DeviceError> {
    log::debug!("-> {}", command);
    let mut line = Vec::with_capacity(command.len() + 1);
    line.extend_from_slice(command.as_bytes());
    line.push(b'\n');
    transport.write_all(&line)?;
    Ok(())
}

fn query_version<T: Transport + ?Sized>(transport: &mut T) -> Result<FirmwareVersion, DeviceError> {
    send_command(transport, "V")?;
    let line = decode_line(transport.read_line()?)?;
    FirmwareVersion::parse(line.trim())
}

fn query_diagnostics<T: Transport + ?Sized>(
    transport: &mut T,
) -> Result<BTreeMap<String, String>, DeviceError> {
    send_command(transport, "D")?;
    let first = decode_line(transport.read_line()?)?;
    if first.trim() != BEGIN_DIAGNOSTICS {
        return Err(DeviceError::Protocol(format!(
            "expected diagnostics block, got {:?}",
            first
        )));
    }

    let mut diagnostics = BTreeMap::new();
    loop {
        let line = decode_line(transport.read_line()?)?;
        let line = line.trim();
        if line == END_DIAGNOSTICS {
            break;
        }
        match parse_diagnostic(line) {
            Some(("ERROR", value)) => log::warn!("Diagnostic error: {}", value),
            Some((key, value)) => {
                diagnostics.insert(key.to_string(), value.to_string());
            }
            None => log::warn!("Unrecognized diagnostic: {}", line),
        }
    }
    Ok(diagnostics)
}
