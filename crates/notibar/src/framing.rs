//! Messages on the control socket are a big-endian u32 length header followed by that many bytes of bincode.
//! Requests and responses use the same framing.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const HEADER_LEN: usize = 4;

/// Control messages are tiny, anything above this is not coming from a notibar client.
const MAX_MESSAGE_LEN: u32 = 64 * 1024;

pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let body = bincode::serialize(message).context("Failed to serialize control message")?;
    let len = u32::try_from(body.len()).ok().filter(|len| *len <= MAX_MESSAGE_LEN);
    let len = len.with_context(|| format!("Control message of {} bytes is too large", body.len()))?;
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend(body);
    Ok(frame)
}

/// Decode a complete frame that has already been read into memory.
pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T> {
    anyhow::ensure!(frame.len() >= HEADER_LEN, "Control message is missing its size header");
    let (header, body) = frame.split_at(HEADER_LEN);
    let len = body_len(header.try_into()?)?;
    anyhow::ensure!(body.len() == len, "Control message announced {} bytes but carried {}", len, body.len());
    bincode::deserialize(body).context("Failed to parse control message")
}

pub async fn read_frame<T: DeserializeOwned, R: AsyncRead + Unpin>(reader: &mut R) -> Result<T> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await.context("Failed to read message size header in control message")?;
    let len = body_len(header)?;
    let mut body = Vec::with_capacity(len);
    while body.len() < len {
        let read = reader.read_buf(&mut body).await.context("Failed to read actual control message")?;
        if read == 0 {
            anyhow::bail!("Control connection closed after {} of {} bytes", body.len(), len);
        }
    }
    bincode::deserialize(&body).context("Failed to parse control message")
}

pub async fn write_frame<T: Serialize, W: AsyncWrite + Unpin>(writer: &mut W, message: &T) -> Result<()> {
    writer.write_all(&encode(message)?).await.context("Failed to write control message")
}

fn body_len(header: [u8; HEADER_LEN]) -> Result<usize> {
    let len = u32::from_be_bytes(header);
    anyhow::ensure!(len <= MAX_MESSAGE_LEN, "Control message of {} bytes exceeds the limit of {}", len, MAX_MESSAGE_LEN);
    Ok(len as usize)
}
