//! Async sink adapter: encoder records written straight to an `AsyncWrite`

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::cipher::{Cipher, CipherSuite, SecretBox};
use crate::encode::BoxStreamEncoder;
use crate::error::BoxStreamResult;
use crate::keys::KeyMaterial;

/// Writes box-stream records to an underlying transport.
pub struct BoxStreamWriter<W, C: SecretBox = Cipher> {
    inner: W,
    encoder: BoxStreamEncoder<C>,
}

impl<W: AsyncWrite + Unpin> BoxStreamWriter<W> {
    pub fn new(inner: W, material: &KeyMaterial) -> Self {
        Self::with_suite(inner, material, CipherSuite::default())
    }

    pub fn with_suite(inner: W, material: &KeyMaterial, suite: CipherSuite) -> Self {
        Self {
            inner,
            encoder: BoxStreamEncoder::with_suite(material, suite),
        }
    }
}

impl<W: AsyncWrite + Unpin, C: SecretBox> BoxStreamWriter<W, C> {
    pub fn with_encoder(inner: W, encoder: BoxStreamEncoder<C>) -> Self {
        Self { inner, encoder }
    }

    /// Encode `chunk` and write its records.
    pub async fn send(&mut self, chunk: &[u8]) -> BoxStreamResult<()> {
        for record in self.encoder.encode(chunk)? {
            self.inner.write_all(&record).await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> BoxStreamResult<()> {
        self.inner.flush().await?;
        Ok(())
    }

    /// Write the terminal record, then flush and shut down the transport.
    pub async fn finish(mut self) -> BoxStreamResult<W> {
        let terminal = self.encoder.finish()?;
        self.inner.write_all(&terminal).await?;
        self.inner.flush().await?;
        self.inner.shutdown().await?;
        Ok(self.inner)
    }

    /// Stop without a terminal record. The peer will see a hangup.
    pub fn abort(mut self) -> W {
        self.encoder.abort();
        self.inner
    }

    pub fn encoder(&self) -> &BoxStreamEncoder<C> {
        &self.encoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::BoxStreamDecoder;
    use crate::error::BoxStreamError;

    #[tokio::test]
    async fn writer_output_decodes() {
        let material = KeyMaterial::from_label("writer");
        let mut writer = BoxStreamWriter::new(Vec::new(), &material);
        writer.send(b"first").await.unwrap();
        writer.send(b"").await.unwrap();
        writer.send(b"second").await.unwrap();
        assert_eq!(writer.encoder().pieces(), 2);
        let wire = writer.finish().await.unwrap();

        let mut decoder = BoxStreamDecoder::new(wire.as_slice(), &material);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"firstsecond");
    }

    #[tokio::test]
    async fn aborted_writer_leaves_no_terminal() {
        let material = KeyMaterial::from_label("writer");
        let mut writer = BoxStreamWriter::new(Vec::new(), &material);
        writer.send(b"partial").await.unwrap();
        let wire = writer.abort();

        let mut decoder = BoxStreamDecoder::new(wire.as_slice(), &material);
        assert_eq!(decoder.next_chunk().await.unwrap().unwrap(), "partial");
        assert!(matches!(
            decoder.next_chunk().await,
            Err(BoxStreamError::UnexpectedHangup)
        ));
    }

    #[tokio::test]
    async fn writer_around_existing_encoder() {
        let material = KeyMaterial::from_label("writer");
        let mut encoder = BoxStreamEncoder::with_suite(&material, CipherSuite::XChaCha20Poly1305);
        // records already emitted keep their place in the nonce sequence
        let mut wire: Vec<u8> = encoder.encode(b"head").unwrap().concat();

        let mut writer = BoxStreamWriter::with_encoder(Vec::new(), encoder);
        writer.send(b"tail").await.unwrap();
        assert_eq!(writer.encoder().pieces(), 2);
        wire.extend(writer.finish().await.unwrap());

        let mut decoder =
            BoxStreamDecoder::with_suite(wire.as_slice(), &material, CipherSuite::XChaCha20Poly1305);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"headtail");
    }

    #[tokio::test]
    async fn duplex_transport() {
        let material = KeyMaterial::from_label("duplex writer");
        let (client, server) = tokio::io::duplex(256);

        let sender_material = material.clone();
        let sender = tokio::spawn(async move {
            let mut writer = BoxStreamWriter::new(client, &sender_material);
            let big = vec![7u8; 10_000];
            writer.send(&big).await.unwrap();
            writer.finish().await.unwrap();
        });

        let mut decoder = BoxStreamDecoder::new(server, &material);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).await.unwrap();
        sender.await.unwrap();

        assert_eq!(out, vec![7u8; 10_000]);
        assert_eq!(decoder.chunks(), 3, "10000 bytes split into 4096-byte pieces");
    }
}
