//! ASCII armor: the binary container base64-encoded between text markers.
//!
//! ```text
//! -----BEGIN SNAP-PAD MESSAGE-----
//! Version: 1.0
//!
//! U1AtQkxPQ0sB...
//! -----END SNAP-PAD MESSAGE-----
//! ```
//!
//! The version header and the blank line after it are optional on decode.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{binary, ContainerError, EncryptedMessage};
use crate::config::PadConfig;

const VERSION_HEADER: &str = "Version";

pub(crate) fn encode(config: &PadConfig, msg: &EncryptedMessage) -> Result<String, ContainerError> {
    let body = STANDARD.encode(binary::encode(config, msg)?);
    let width = config.armor_line_width.max(4);

    let mut out = String::with_capacity(body.len() + body.len() / width + 128);
    out.push_str(&config.armor_begin);
    out.push('\n');
    out.push_str(VERSION_HEADER);
    out.push_str(": ");
    out.push_str(&config.version);
    out.push_str("\n\n");
    // Base64 output is ASCII, so byte chunks are valid str boundaries.
    for line in body.as_bytes().chunks(width) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str(&config.armor_end);
    out.push('\n');
    Ok(out)
}

pub(crate) fn decode(config: &PadConfig, data: &[u8]) -> Result<EncryptedMessage, ContainerError> {
    let text = std::str::from_utf8(data).map_err(|_| ContainerError::NotUtf8)?;
    let mut lines = text.lines().map(str::trim).skip_while(|l| l.is_empty());

    if lines.next() != Some(config.armor_begin.as_str()) {
        return Err(ContainerError::MissingBeginMarker);
    }

    let mut body = String::new();
    let mut in_headers = true;
    loop {
        let line = lines.next().ok_or(ContainerError::UnterminatedArmor)?;
        if line == config.armor_end {
            break;
        }
        if in_headers {
            if let Some((key, value)) = line.split_once(':') {
                if key.trim() == VERSION_HEADER && value.trim() != config.version {
                    return Err(ContainerError::BadVersion {
                        expected: config.version.clone(),
                        found: Some(value.trim().to_owned()),
                    });
                }
                continue;
            }
            in_headers = false;
        }
        body.push_str(line);
    }

    let bytes = STANDARD.decode(body.as_bytes())?;
    binary::decode(config, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PadConfig {
        PadConfig::default()
    }

    fn message(len: usize) -> EncryptedMessage {
        let mut msg = EncryptedMessage::new();
        msg.add_block(42, vec![0x5A; len], [0xC3; 32]);
        msg
    }

    #[test]
    fn test_layout() {
        let text = encode(&config(), &message(200)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "-----BEGIN SNAP-PAD MESSAGE-----");
        assert_eq!(lines[1], "Version: 1.0");
        assert_eq!(lines[2], "");
        assert_eq!(*lines.last().unwrap(), "-----END SNAP-PAD MESSAGE-----");
        let body = &lines[3..lines.len() - 1];
        assert!(body[..body.len() - 1].iter().all(|l| l.len() == 64));
        assert!(body.last().unwrap().len() <= 64);
    }

    #[test]
    fn test_decode_without_headers() {
        let msg = message(10);
        let raw = binary::encode(&config(), &msg).unwrap();
        let text = format!(
            "\n-----BEGIN SNAP-PAD MESSAGE-----\r\n{}\r\n-----END SNAP-PAD MESSAGE-----\r\n",
            STANDARD.encode(raw)
        );
        assert_eq!(decode(&config(), text.as_bytes()).unwrap(), msg);
    }

    #[test]
    fn test_missing_markers() {
        let text = encode(&config(), &message(10)).unwrap();
        let no_begin: String = text.lines().skip(1).map(|l| format!("{}\n", l)).collect();
        let err = decode(&config(), no_begin.as_bytes()).unwrap_err();
        assert!(matches!(err, ContainerError::MissingBeginMarker));

        let mut lines: Vec<&str> = text.lines().collect();
        lines.pop();
        let no_end = lines.join("\n");
        let err = decode(&config(), no_end.as_bytes()).unwrap_err();
        assert!(matches!(err, ContainerError::UnterminatedArmor));
    }

    #[test]
    fn test_bad_version_header() {
        let text = encode(&config(), &message(10)).unwrap().replace("Version: 1.0", "Version: 0.9");
        assert!(matches!(
            decode(&config(), text.as_bytes()),
            Err(ContainerError::BadVersion { found: Some(v), .. }) if v == "0.9"
        ));
    }

    #[test]
    fn test_corrupt_body() {
        let text = encode(&config(), &message(10)).unwrap().replace("\n\n", "\n\n!!!!");
        assert!(matches!(decode(&config(), text.as_bytes()), Err(ContainerError::Base64(_))));
    }

    #[test]
    fn test_binary_input_rejected() {
        let raw = binary::encode(&config(), &message(10)).unwrap();
        assert!(decode(&config(), &raw).is_err());
    }
}
