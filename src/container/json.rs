//! JSON container:
//! `{"Magic": ..., "Version": ..., "Blocks": [{"Page": n, "Signature": b64, "Data": b64}]}`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ContainerError, EncryptedMessage};
use crate::config::{PadConfig, SIGNATURE_LEN};

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct JsonMessage<'a> {
    magic: &'a str,
    version: &'a str,
    blocks: Vec<JsonBlock>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JsonBlock {
    page: u16,
    signature: String,
    data: String,
}

pub(crate) fn encode(config: &PadConfig, msg: &EncryptedMessage) -> Result<String, ContainerError> {
    let blocks = msg
        .blocks()
        .iter()
        .map(|b| JsonBlock {
            page: b.page_index,
            signature: STANDARD.encode(b.signature),
            data: STANDARD.encode(&b.ciphertext),
        })
        .collect();
    let doc = JsonMessage {
        magic: &config.json_magic,
        version: &config.version,
        blocks,
    };
    Ok(serde_json::to_string(&doc)?)
}

pub(crate) fn decode(config: &PadConfig, data: &[u8]) -> Result<EncryptedMessage, ContainerError> {
    let mut doc: Value = serde_json::from_slice(data)?;

    if doc.get("Magic").and_then(Value::as_str) != Some(config.json_magic.as_str()) {
        return Err(ContainerError::BadMagic);
    }
    let version = doc.get("Version").and_then(Value::as_str);
    if version != Some(config.version.as_str()) {
        return Err(ContainerError::BadVersion {
            expected: config.version.clone(),
            found: version.map(str::to_owned),
        });
    }

    let blocks = doc.get_mut("Blocks").map(Value::take).unwrap_or(Value::Array(Vec::new()));
    let blocks: Vec<JsonBlock> = serde_json::from_value(blocks)?;

    let mut msg = EncryptedMessage::new();
    for block in blocks {
        let sig_bytes = STANDARD.decode(&block.signature)?;
        let signature: [u8; SIGNATURE_LEN] = sig_bytes
            .as_slice()
            .try_into()
            .map_err(|_| ContainerError::BadSignatureLength(sig_bytes.len()))?;
        let ciphertext = STANDARD.decode(&block.data)?;
        msg.add_block(block.page, ciphertext, signature);
    }
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PadConfig {
        PadConfig::default()
    }

    fn one_block() -> EncryptedMessage {
        let mut msg = EncryptedMessage::new();
        msg.add_block(12, b"hello".to_vec(), [9; 32]);
        msg
    }

    #[test]
    fn test_field_names() {
        let text = encode(&config(), &one_block()).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["Magic"], "Snap-Pad OTP Message");
        assert_eq!(v["Version"], "1.0");
        assert_eq!(v["Blocks"][0]["Page"], 12);
        assert_eq!(v["Blocks"][0]["Data"], "aGVsbG8=");
        let signature = v["Blocks"][0]["Signature"].as_str().unwrap();
        assert_eq!(STANDARD.decode(signature).unwrap(), vec![9u8; 32]);
    }

    #[test]
    fn test_bad_magic() {
        let text = r#"{"Magic":"Something Else","Version":"1.0","Blocks":[]}"#;
        assert!(matches!(decode(&config(), text.as_bytes()), Err(ContainerError::BadMagic)));
        let text = r#"{"Version":"1.0","Blocks":[]}"#;
        assert!(matches!(decode(&config(), text.as_bytes()), Err(ContainerError::BadMagic)));
        assert!(matches!(decode(&config(), b"[1,2,3]"), Err(ContainerError::BadMagic)));
    }

    #[test]
    fn test_bad_version() {
        let text = r#"{"Magic":"Snap-Pad OTP Message","Version":"2.0","Blocks":[]}"#;
        match decode(&config(), text.as_bytes()) {
            Err(ContainerError::BadVersion { expected, found }) => {
                assert_eq!(expected, "1.0");
                assert_eq!(found.as_deref(), Some("2.0"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        let text = r#"{"Magic":"Snap-Pad OTP Message","Blocks":[]}"#;
        assert!(matches!(
            decode(&config(), text.as_bytes()),
            Err(ContainerError::BadVersion { found: None, .. })
        ));
    }

    #[test]
    fn test_short_signature() {
        let text = concat!(
            r#"{"Magic":"Snap-Pad OTP Message","Version":"1.0","#,
            r#""Blocks":[{"Page":1,"Signature":"AAAA","Data":""}]}"#
        );
        assert!(matches!(
            decode(&config(), text.as_bytes()),
            Err(ContainerError::BadSignatureLength(3))
        ));
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(decode(&config(), b"SP-BLOCK\x01\x00"), Err(ContainerError::Json(_))));
    }
}
