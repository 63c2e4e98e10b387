//! Software mockup of a Snap-Pad.
//!
//! Emulates the firmware command set over an in-memory `Transport` so the
//! protocol client and message engine can be exercised without hardware.
//! Page material is derived from a seed with BLAKE3, so a page provisioned
//! here can be retrieved later with identical bytes, the way twinned pads
//! share their pages. A retrieved page answers `USED` the next time.
//!
//! # Security Warning
//! The mock reports firmware variant `M`. Its randomness is deterministic
//! and it must never be used to protect real messages.

use std::collections::{HashSet, VecDeque};
use std::io;
use std::time::Duration;

use base64::Engine;

use super::transport::Transport;
use crate::config::PadConfig;

pub const MOCK_MAJOR: u32 = 1;
pub const MOCK_MINOR: u32 = 1;

/// First index handed out by `P` commands.
const FIRST_PAGE_INDEX: u16 = 64;

/// Base64 characters per emitted body line.
const BODY_LINE_WIDTH: usize = 80;

const PAGE_CONTEXT: &str = "snap-pad mock 2024-01-20 page material";
const RNG_CONTEXT: &str = "snap-pad mock 2024-01-20 rng tap";

/// In-memory Snap-Pad emulator.
pub struct MockPad {
    seed: u64,
    config: PadConfig,
    major: u32,
    minor: u32,
    variant: Option<char>,
    diagnostics: Vec<(String, String)>,
    raw_diagnostic_lines: Vec<String>,
    next_index: u16,
    retrieved: HashSet<u16>,
    rng_counter: u64,
    timeout_next: bool,
    truncate_next_body: Option<usize>,
    commands: Vec<String>,
    timeouts: Vec<Duration>,
    timeout_delivered: bool,
    reads_after_timeout: usize,
    inbuf: Vec<u8>,
    outbuf: VecDeque<u8>,
}

impl MockPad {
    /// Creates a mock with default geometry and a deterministic seed.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, PadConfig::default())
    }

    pub fn with_config(seed: u64, config: PadConfig) -> Self {
        log::warn!("Snap-Pad mockup in use. This is not for production use!");
        Self {
            seed,
            config,
            major: MOCK_MAJOR,
            minor: MOCK_MINOR,
            variant: Some('M'),
            diagnostics: vec![
                (String::from("Debug"), String::from("true")),
                (String::from("Mode"), String::from("Single board")),
                (String::from("Random"), String::from("Done")),
                (String::from("Blocks"), String::from("2047")),
            ],
            raw_diagnostic_lines: Vec::new(),
            next_index: FIRST_PAGE_INDEX,
            retrieved: HashSet::new(),
            rng_counter: 0,
            timeout_next: false,
            truncate_next_body: None,
            commands: Vec::new(),
            timeouts: Vec::new(),
            timeout_delivered: false,
            reads_after_timeout: 0,
            inbuf: Vec::new(),
            outbuf: VecDeque::new(),
        }
    }

    /// Overrides the reported firmware version.
    pub fn with_version(mut self, major: u32, minor: u32, variant: Option<char>) -> Self {
        self.major = major;
        self.minor = minor;
        self.variant = variant;
        self
    }

    /// Adds or replaces a diagnostics entry.
    pub fn set_diagnostic(&mut self, key: &str, value: &str) {
        match self.diagnostics.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.diagnostics.push((key.to_string(), value.to_string())),
        }
    }

    /// Appends a verbatim line to the diagnostics block.
    pub fn push_raw_diagnostic_line(&mut self, line: &str) {
        self.raw_diagnostic_lines.push(line.to_string());
    }

    /// The next `P` or `R` command answers `---TIMEOUT---`, as if the button
    /// was never pressed.
    pub fn fail_next_with_timeout(&mut self) {
        self.timeout_next = true;
    }

    /// The next `BEGIN PAGE` body carries only `len` bytes of material.
    pub fn truncate_next_page_body(&mut self, len: usize) {
        self.truncate_next_body = Some(len);
    }

    /// Marks a page as already consumed.
    pub fn mark_used(&mut self, index: u16) {
        self.retrieved.insert(index);
    }

    /// Command lines received so far, without terminators.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Every read timeout the client has set, in order.
    pub fn timeout_history(&self) -> Vec<Duration> {
        self.timeouts.clone()
    }

    /// Reads attempted after a `---TIMEOUT---` line was handed out and
    /// before the next command.
    pub fn reads_after_timeout(&self) -> usize {
        self.reads_after_timeout
    }

    /// Response bytes not yet read by the client.
    pub fn pending_output(&self) -> usize {
        self.outbuf.len()
    }

    /// Material (keystream, salt, mask) the mock holds for `index`.
    pub fn page_material(&self, index: u16) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new_derive_key(PAGE_CONTEXT);
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(&index.to_le_bytes());
        let mut out = vec![0u8; self.config.frame_len()];
        hasher.finalize_xof().fill(&mut out);
        out
    }

    fn emit(&mut self, text: &str) {
        self.outbuf.extend(text.as_bytes());
    }

    fn emit_line(&mut self, text: &str) {
        self.emit(text);
        self.emit("\n");
    }

    fn dispatch(&mut self, command: &str) {
        self.commands.push(command.to_string());
        match command.chars().next() {
            Some('V') => self.do_version(),
            Some('D') => self.do_diagnostics(),
            Some('P') => self.do_provision(&command[1..]),
            Some('R') => self.do_retrieve(&command[1..]),
            Some('#') => self.do_rng(),
            _ => self.emit_line(&format!("ERROR: {}", command)),
        }
    }

    fn do_version(&mut self) {
        let variant = self.variant.map(String::from).unwrap_or_default();
        let line = format!("{}.{}{}", self.major, self.minor, variant);
        self.emit_line(&line);
    }

    fn do_diagnostics(&mut self) {
        let mut lines = vec![String::from("---BEGIN DIAGNOSTICS---")];
        lines.extend(self.diagnostics.iter().map(|(k, v)| format!("{}:{}", k, v)));
        lines.extend(self.raw_diagnostic_lines.iter().cloned());
        lines.push(String::from("---END DIAGNOSTICS---"));
        for line in lines {
            self.emit_line(&line);
        }
    }

    fn take_timeout(&mut self) -> bool {
        if self.timeout_next {
            self.timeout_next = false;
            self.emit_line("---TIMEOUT---");
            return true;
        }
        false
    }

    fn do_provision(&mut self, arg: &str) {
        let count = match arg.trim().parse::<usize>() {
            Ok(c) if (1..=self.config.max_pages).contains(&c) => c,
            _ => return self.emit_line("ERROR: bad count"),
        };
        if self.take_timeout() {
            return;
        }
        for _ in 0..count {
            let index = self.next_index;
            self.next_index = self.next_index.wrapping_add(1).max(1);
            self.release_page(index);
        }
    }

    fn do_retrieve(&mut self, arg: &str) {
        let indices: Result<Vec<u16>, _> =
            arg.split(',').map(|s| s.trim().parse::<u16>()).collect();
        let indices = match indices {
            Ok(v) if (1..=self.config.max_pages).contains(&v.len()) && !v.contains(&0) => v,
            _ => return self.emit_line("ERROR: bad page list"),
        };
        if self.take_timeout() {
            return;
        }
        for index in indices {
            if self.retrieved.insert(index) {
                self.release_page(index);
            } else {
                self.emit_line(&format!("---USED PAGE {}---", index));
            }
        }
    }

    fn release_page(&mut self, index: u16) {
        let mut material = self.page_material(index);
        if let Some(len) = self.truncate_next_body.take() {
            material.truncate(len);
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(&material);
        self.emit_line(&format!("---BEGIN PAGE {}---", index));
        for chunk in encoded.as_bytes().chunks(BODY_LINE_WIDTH) {
            self.outbuf.extend(chunk);
            self.outbuf.push_back(b'\n');
        }
        self.emit_line("---END PAGE---");
    }

    fn do_rng(&mut self) {
        let mut hasher = blake3::Hasher::new_derive_key(RNG_CONTEXT);
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(&self.rng_counter.to_le_bytes());
        self.rng_counter += 1;
        let mut out = vec![0u8; self.config.rng_chunk_len];
        hasher.finalize_xof().fill(&mut out);
        self.outbuf.extend(out);
    }
}

impl Transport for MockPad {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.timeout_delivered = false;
        self.inbuf.extend_from_slice(data);
        while let Some(pos) = self.inbuf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.inbuf.drain(..=pos).collect();
            let command = String::from_utf8_lossy(&line[..pos]).trim().to_string();
            if !command.is_empty() {
                self.dispatch(&command);
            }
        }
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        if self.timeout_delivered {
            self.reads_after_timeout += 1;
        }
        if self.outbuf.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "mock pad has nothing to say"));
        }
        let end = self
            .outbuf
            .iter()
            .position(|&b| b == b'\n')
            .map_or(self.outbuf.len(), |p| p + 1);
        let line: Vec<u8> = self.outbuf.drain(..end).collect();
        if String::from_utf8_lossy(&line).trim_end() == "---TIMEOUT---" {
            self.timeout_delivered = true;
        }
        Ok(line)
    }

    fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        if self.timeout_delivered {
            self.reads_after_timeout += 1;
        }
        if self.outbuf.len() < n {
            self.outbuf.clear();
            return Err(io::Error::new(io::ErrorKind::TimedOut, "short read from mock pad"));
        }
        Ok(self.outbuf.drain(..n).collect())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeouts.push(timeout);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(mock: &mut MockPad) -> String {
        String::from_utf8(mock.read_line().unwrap()).unwrap().trim_end().to_string()
    }

    #[test]
    fn test_version() {
        let mut mock = MockPad::new(1);
        mock.write_all(b"V\n").unwrap();
        assert_eq!(line(&mut mock), "1.1M");
        assert!(mock.read_line().is_err());
    }

    #[test]
    fn test_diagnostics_block() {
        let mut mock = MockPad::new(1);
        mock.write_all(b"D\n").unwrap();
        assert_eq!(line(&mut mock), "---BEGIN DIAGNOSTICS---");
        loop {
            let l = line(&mut mock);
            assert!(!l.is_empty());
            if l == "---END DIAGNOSTICS---" {
                break;
            }
        }
        assert_eq!(mock.pending_output(), 0);
    }

    #[test]
    fn test_rng_tap() {
        let mut mock = MockPad::new(1);
        mock.write_all(b"#\n").unwrap();
        assert_eq!(mock.read_bytes(64).unwrap().len(), 64);
        assert!(mock.read_bytes(1).is_err());
    }

    #[test]
    fn test_bad_provision_counts() {
        let mut mock = MockPad::new(1);
        for count in [0, 5] {
            mock.write_all(format!("P{}\n", count).as_bytes()).unwrap();
            assert_eq!(line(&mut mock), "ERROR: bad count");
        }
    }

    #[test]
    fn test_page_frames() {
        let mut mock = MockPad::new(1);
        mock.write_all(b"P2\n").unwrap();
        for expected in [64, 65] {
            assert_eq!(line(&mut mock), format!("---BEGIN PAGE {}---", expected));
            let mut body = String::new();
            loop {
                let l = line(&mut mock);
                if l == "---END PAGE---" {
                    break;
                }
                assert!(l.len() <= BODY_LINE_WIDTH);
                body.push_str(&l);
            }
            let decoded = base64::engine::general_purpose::STANDARD.decode(body).unwrap();
            assert_eq!(decoded, mock.page_material(expected));
        }
    }

    #[test]
    fn test_retrieve_then_used() {
        let mut mock = MockPad::new(1);
        mock.write_all(b"R64,65\n").unwrap();
        assert_eq!(line(&mut mock), "---BEGIN PAGE 64---");
        while line(&mut mock) != "---END PAGE---" {}
        assert_eq!(line(&mut mock), "---BEGIN PAGE 65---");
        while line(&mut mock) != "---END PAGE---" {}

        mock.write_all(b"R65\n").unwrap();
        assert_eq!(line(&mut mock), "---USED PAGE 65---");
        assert_eq!(mock.commands(), ["R64,65", "R65"]);
    }

    #[test]
    fn test_reads_after_timeout_are_counted() {
        let mut mock = MockPad::new(1);
        mock.fail_next_with_timeout();
        mock.write_all(b"P1\n").unwrap();
        assert_eq!(line(&mut mock), "---TIMEOUT---");
        assert_eq!(mock.reads_after_timeout(), 0);
        assert!(mock.read_line().is_err());
        assert!(mock.read_bytes(1).is_err());
        assert_eq!(mock.reads_after_timeout(), 2);

        // A new command ends the timed-out exchange.
        mock.write_all(b"V\n").unwrap();
        assert_eq!(line(&mut mock), "1.1M");
        assert_eq!(mock.reads_after_timeout(), 2);
    }

    #[test]
    fn test_unknown_command() {
        let mut mock = MockPad::new(1);
        mock.write_all(b"Z\n").unwrap();
        assert_eq!(line(&mut mock), "ERROR: Z");
    }

    #[test]
    fn test_material_depends_on_seed_and_index() {
        let a = MockPad::new(1);
        let b = MockPad::new(2);
        assert_eq!(a.page_material(64), MockPad::new(1).page_material(64));
        assert_ne!(a.page_material(64), a.page_material(65));
        assert_ne!(a.page_material(64), b.page_material(64));
        assert_eq!(a.page_material(64).len(), 2096);
    }
}
