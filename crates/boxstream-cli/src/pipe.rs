//! `boxstream seal` / `boxstream open`: byte pipes through the codec.

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use boxstream_crypto::{BoxStreamDecoder, BoxStreamWriter, CipherSuite, KeyMaterial};

/// Encrypt everything from `input` onto `output`, one chunk per read of up
/// to `read_buffer` bytes. Returns the plaintext byte count.
pub async fn seal<R, W>(
    mut input: R,
    output: W,
    material: &KeyMaterial,
    suite: CipherSuite,
    read_buffer: usize,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut writer = BoxStreamWriter::with_suite(output, material, suite);
    let mut buf = vec![0u8; read_buffer];
    let mut total = 0u64;

    loop {
        let n = input.read(&mut buf).await.context("reading input")?;
        if n == 0 {
            break;
        }
        writer.send(&buf[..n]).await.context("writing box-stream")?;
        total += n as u64;
    }

    let pieces = writer.encoder().pieces();
    writer.finish().await.context("finishing box-stream")?;
    info!(bytes = total, pieces, %suite, "sealed");
    Ok(total)
}

/// Decrypt a box-stream from `input` onto `output`. Returns the plaintext
/// byte count.
///
/// Every authenticated chunk is written before a failure is reported.
pub async fn open<R, W>(
    input: R,
    mut output: W,
    material: &KeyMaterial,
    suite: CipherSuite,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut decoder = BoxStreamDecoder::with_suite(input, material, suite);
    let mut total = 0u64;

    loop {
        match decoder.next_chunk().await {
            Ok(Some(chunk)) => {
                output.write_all(&chunk).await.context("writing output")?;
                total += chunk.len() as u64;
            }
            Ok(None) => break,
            Err(e) => {
                output.flush().await.context("flushing output")?;
                return Err(e).with_context(|| format!("box-stream rejected after {total} bytes"));
            }
        }
    }

    output.flush().await.context("flushing output")?;
    info!(bytes = total, chunks = decoder.chunks(), %suite, "opened");
    Ok(total)
}
