//! Plaintext input for caller layers (CLI, GUI).

use std::io::Read;

use super::MessageError;
use crate::config::PadConfig;

/// Reads a whole plaintext from `reader`, refusing empty input and anything
/// longer than `config.max_message_len()`. At most one byte past the limit
/// is consumed.
pub fn read_plaintext<R: Read>(reader: R, config: &PadConfig) -> Result<Vec<u8>, MessageError> {
    let max = config.max_message_len();
    let mut data = Vec::with_capacity(max.min(8 * 1024) + 1);
    reader.take(max as u64 + 1).read_to_end(&mut data)?;

    if data.is_empty() {
        return Err(MessageError::NoData);
    }
    if data.len() > max {
        return Err(MessageError::MessageTooLarge { len: data.len(), max });
    }
    Ok(data)
}
