// shopwire/src/protocol.rs
//
// Wire framing: every logical message is `[4-digit zero-padded decimal
// length][payload]`, both directions. The fixed-width prefix caps one
// frame at 9999 bytes, which is why large binary payloads (images) are
// streamed as raw chunks bounded by a previously declared size instead
// of riding the frame format.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::{AppError, AppResult};

/// Width of the decimal length prefix.
pub const PREFIX_WIDTH: usize = 4;

/// Largest payload representable in `PREFIX_WIDTH` digits.
pub const MAX_PAYLOAD: usize = 9999;

/// Chunk size for raw (unframed) upload reads.
pub const UPLOAD_CHUNK: usize = 4096;

/// Write one framed message: zero-padded length prefix followed by the
/// payload, as a single logical write.
///
/// Fails with [`AppError::FrameTooLarge`] before writing anything if the
/// payload cannot be represented in the prefix; the length is never
/// silently truncated.
pub async fn send<W>(stream: &mut W, payload: &[u8]) -> AppResult<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_PAYLOAD {
        return Err(AppError::FrameTooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(PREFIX_WIDTH + payload.len());
    frame.extend_from_slice(format!("{:0width$}", payload.len(), width = PREFIX_WIDTH).as_bytes());
    frame.extend_from_slice(payload);

    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one framed message.
///
/// Returns `Ok(None)` if the peer closed the connection before a full
/// frame arrived (orderly closure, whether mid-prefix or mid-payload).
/// A non-numeric length prefix is a [`AppError::Framing`] error: the
/// stream can no longer be trusted.
pub async fn recv<R>(stream: &mut R) -> AppResult<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; PREFIX_WIDTH];
    if !read_full(stream, &mut prefix).await? {
        return Ok(None);
    }

    let text = std::str::from_utf8(&prefix)
        .map_err(|_| AppError::Framing("length prefix is not ASCII".into()))?;
    let size: usize = text
        .trim()
        .parse()
        .map_err(|_| AppError::Framing(format!("non-numeric length prefix {text:?}")))?;

    let mut payload = vec![0u8; size];
    if !read_full(stream, &mut payload).await? {
        return Ok(None);
    }
    Ok(Some(payload))
}

/// Read exactly `size` raw bytes, bypassing the length prefix, in chunks
/// of at most [`UPLOAD_CHUNK`]. Used for the image upload path, where the
/// total size was declared up front in its own frame.
///
/// If the peer closes before `size` bytes arrive, the partial buffer is
/// discarded and an [`AppError::UploadSize`] is returned.
pub async fn recv_raw<R>(stream: &mut R, size: usize) -> AppResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(size);
    let mut chunk = [0u8; UPLOAD_CHUNK];

    while buffer.len() < size {
        let want = (size - buffer.len()).min(UPLOAD_CHUNK);
        let n = stream.read(&mut chunk[..want]).await?;
        if n == 0 {
            return Err(AppError::UploadSize(format!(
                "incomplete transfer: got {} of {} declared bytes",
                buffer.len(),
                size
            )));
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
    Ok(buffer)
}

/// Fill `buf` completely, retrying short reads. Returns `false` if the
/// peer closed before the buffer was filled.
async fn read_full<R>(stream: &mut R, buf: &mut [u8]) -> AppResult<bool>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    #[tokio::test]
    async fn round_trips_payloads() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);
        for len in [0usize, 1, 42, 9999] {
            let payload = vec![0xabu8; len];
            send(&mut a, &payload).await.unwrap();
            let got = recv(&mut b).await.unwrap().unwrap();
            assert_eq!(got, payload);
        }
    }

    #[tokio::test]
    async fn prefix_is_zero_padded_decimal() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        send(&mut a, b"hello").await.unwrap();
        let mut raw = [0u8; 9];
        b.read_exact(&mut raw).await.unwrap();
        assert_eq!(&raw, b"0005hello");
    }

    #[tokio::test]
    async fn oversized_payload_fails_fast() {
        let (mut a, _b) = tokio::io::duplex(1024);
        let err = send(&mut a, &vec![0u8; MAX_PAYLOAD + 1]).await.unwrap_err();
        assert!(matches!(err, AppError::FrameTooLarge(10000)));
    }

    #[tokio::test]
    async fn peer_close_is_orderly_none() {
        let (a, mut b) = tokio::io::duplex(1024);
        drop(a);
        assert!(recv(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_mid_payload_is_orderly_none() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        // Prefix promises 10 bytes, only 3 arrive.
        a.write_all(b"0010abc").await.unwrap();
        drop(a);
        assert!(recv(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_numeric_prefix_is_framing_error() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        a.write_all(b"12x4whatever").await.unwrap();
        let err = recv(&mut b).await.unwrap_err();
        assert!(matches!(err, AppError::Framing(_)));
    }

    #[tokio::test]
    async fn raw_read_accumulates_exactly_declared_size() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);
        let image: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let writer = {
            let image = image.clone();
            tokio::spawn(async move {
                for chunk in image.chunks(UPLOAD_CHUNK) {
                    a.write_all(chunk).await.unwrap();
                }
                a
            })
        };
        let got = recv_raw(&mut b, image.len()).await.unwrap();
        assert_eq!(got, image);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn raw_read_short_transfer_is_upload_error() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        a.write_all(&[1, 2, 3]).await.unwrap();
        drop(a);
        let err = recv_raw(&mut b, 100).await.unwrap_err();
        assert!(matches!(err, AppError::UploadSize(_)));
    }
}
