//! Length-prefixed framing: a 4-byte big-endian length followed by the
//! payload.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::RitualError;

/// Largest payload accepted in either direction.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Writes `payload` as one frame and flushes the stream.
///
/// # Errors
///
/// Returns [`RitualError::FrameTooLarge`] for oversized payloads and
/// [`RitualError::Io`] when the stream fails.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), RitualError>
where
    W: AsyncWrite + Unpin,
{
    let too_large = || RitualError::FrameTooLarge {
        size: payload.len(),
        limit: MAX_FRAME_BYTES,
    };
    if payload.len() > MAX_FRAME_BYTES {
        return Err(too_large());
    }
    let length = u32::try_from(payload.len()).map_err(|_| too_large())?;
    writer.write_u32(length).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame.
///
/// # Errors
///
/// Returns [`RitualError::Closed`] when the stream ends, and
/// [`RitualError::FrameTooLarge`] when the announced length is over the limit.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, RitualError>
where
    R: AsyncRead + Unpin,
{
    let announced = reader.read_u32().await?;
    let size = usize::try_from(announced).map_err(|_| RitualError::FrameTooLarge {
        size: usize::MAX,
        limit: MAX_FRAME_BYTES,
    })?;
    if size > MAX_FRAME_BYTES {
        return Err(RitualError::FrameTooLarge {
            size,
            limit: MAX_FRAME_BYTES,
        });
    }
    let mut payload = vec![0_u8; size];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}
