//! Response line parsers.
//!
//! Responses are ASCII lines. These functions take one line with its
//! terminator already stripped and never touch the transport.

use core::fmt;

use super::DeviceError;

pub const BEGIN_DIAGNOSTICS: &str = "---BEGIN DIAGNOSTICS---";
pub const END_DIAGNOSTICS: &str = "---END DIAGNOSTICS---";
pub const END_PAGE: &str = "---END PAGE---";
pub const TIMEOUT: &str = "---TIMEOUT---";

const BEGIN_PAGE_PREFIX: &str = "---BEGIN PAGE ";
const USED_PAGE_PREFIX: &str = "---USED PAGE ";
const FRAME_SUFFIX: &str = "---";
const ERROR_PREFIX: &str = "ERROR:";

/// Firmware build variant, from the optional letter after the version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// No letter: production firmware.
    Release,
    /// `D`: debug firmware. Usable but not secure.
    Debug,
    /// `M`: software mockup. Not suitable for any real use.
    Mock,
}

impl Variant {
    /// Maps the variant letter. `F` (factory test firmware) and unknown
    /// letters are rejected.
    pub fn from_code(code: Option<char>) -> Result<Self, DeviceError> {
        match code {
            None => Ok(Variant::Release),
            Some('D') => Ok(Variant::Debug),
            Some('M') => Ok(Variant::Mock),
            Some('F') => Err(DeviceError::Firmware(String::from(
                "the pad is loaded with the factory test firmware",
            ))),
            Some(other) => Err(DeviceError::Firmware(format!(
                "the pad is running an unknown firmware variant '{}'",
                other
            ))),
        }
    }

    pub fn code(&self) -> Option<char> {
        match self {
            Variant::Release => None,
            Variant::Debug => Some('D'),
            Variant::Mock => Some('M'),
        }
    }

    /// True only for production firmware.
    pub fn is_production(&self) -> bool {
        *self == Variant::Release
    }
}

/// Parsed `V` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub variant: Variant,
}

impl FirmwareVersion {
    /// Parses `<major>.<minor>[A-Z]`.
    pub fn parse(line: &str) -> Result<Self, DeviceError> {
        let bad = || DeviceError::Firmware(format!("could not parse firmware version {:?}", line));

        let (major, rest) = line.split_once('.').ok_or_else(bad)?;
        let (minor, code) = match rest.chars().last() {
            Some(c) if c.is_ascii_uppercase() => (&rest[..rest.len() - 1], Some(c)),
            _ => (rest, None),
        };
        if !is_decimal(major) || !is_decimal(minor) {
            return Err(bad());
        }
        let major = major.parse().map_err(|_| bad())?;
        let minor = minor.parse().map_err(|_| bad())?;
        let variant = Variant::from_code(code)?;
        Ok(Self { major, minor, variant })
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(c) = self.variant.code() {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// First line of a page frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preamble {
    /// `---BEGIN PAGE n---`, followed by base64 body lines.
    Begin(u16),
    /// `---USED PAGE n---`: the page was already consumed.
    Used(u16),
    /// `---TIMEOUT---`: the confirmation button was never pressed.
    Timeout,
}

/// Classifies a page preamble line.
pub fn parse_preamble(line: &str) -> Result<Preamble, DeviceError> {
    if line == TIMEOUT {
        return Ok(Preamble::Timeout);
    }
    if let Some(msg) = line.strip_prefix(ERROR_PREFIX) {
        return Err(DeviceError::Device(msg.trim().to_string()));
    }
    if let Some(idx) = framed_index(line, BEGIN_PAGE_PREFIX) {
        return Ok(Preamble::Begin(parse_page_index(idx)?));
    }
    if let Some(idx) = framed_index(line, USED_PAGE_PREFIX) {
        return Ok(Preamble::Used(parse_page_index(idx)?));
    }
    Err(DeviceError::Protocol(format!("unexpected page preamble {:?}", line)))
}

/// Splits a `key:value` diagnostics line at the first colon.
pub fn parse_diagnostic(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Converts a raw response line to text, stripping the line terminator.
/// An empty read means the stream ended mid-response.
pub fn decode_line(raw: Vec<u8>) -> Result<String, DeviceError> {
    if raw.is_empty() {
        return Err(DeviceError::Protocol(String::from("unexpected end of stream")));
    }
    let text = String::from_utf8(raw)
        .map_err(|_| DeviceError::Protocol(String::from("response line is not valid ASCII")))?;
    Ok(text.trim_end_matches(['\r', '\n']).to_string())
}

fn framed_index<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix)?.strip_suffix(FRAME_SUFFIX)
}

fn parse_page_index(text: &str) -> Result<u16, DeviceError> {
    if !is_decimal(text) {
        return Err(DeviceError::Protocol(format!("bad page index {:?}", text)));
    }
    match text.parse::<u16>() {
        Ok(0) => Err(DeviceError::InvalidPageIndex(0)),
        Ok(idx) => Ok(idx),
        Err(_) => Err(DeviceError::Protocol(format!("page index {} out of range", text))),
    }
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
