//! Length-prefixed MessagePack codec
//!
//! ```text
//! [len u32 BE][MessagePack payload: len bytes]
//! ```
//!
//! Used for both request and response messages. A stream ends cleanly when
//! EOF falls exactly on a message boundary.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{self, Read, Write};
use tsread_core::{Error, Result};

/// Largest payload accepted by [`read_message`] (64MB)
pub const MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

/// Serialize a message payload (no length prefix)
pub fn encode_message<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec(msg).map_err(|e| Error::Codec(format!("encode: {}", e)))
}

/// Deserialize a message payload (no length prefix)
pub fn decode_message<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes).map_err(|e| Error::Codec(format!("decode: {}", e)))
}

/// Write one framed message
pub fn write_message<W: Write, T: Serialize>(w: &mut W, msg: &T) -> Result<()> {
    let payload = encode_message(msg)?;
    if payload.len() > MAX_MESSAGE_LEN {
        return Err(Error::Codec(format!(
            "message of {} bytes exceeds limit of {}",
            payload.len(),
            MAX_MESSAGE_LEN
        )));
    }
    w.write_u32::<BigEndian>(payload.len() as u32)?;
    w.write_all(&payload)?;
    Ok(())
}

/// Read one framed message; `Ok(None)` on a clean end of stream
pub fn read_message<R: Read, T: DeserializeOwned>(r: &mut R) -> Result<Option<T>> {
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        match r.read(&mut prefix[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(Error::Codec(format!(
                    "stream ended after {} of 4 length prefix bytes",
                    filled
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    let len = BigEndian::read_u32(&prefix) as usize;
    if len > MAX_MESSAGE_LEN {
        return Err(Error::Codec(format!(
            "message length {} exceeds limit of {}",
            len, MAX_MESSAGE_LEN
        )));
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    decode_message(&payload).map(Some)
}
