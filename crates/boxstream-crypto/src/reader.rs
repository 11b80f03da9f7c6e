//! Exact-byte reading over an arbitrarily fragmented transport
//!
//! [`ExactReader::read_exact`] buffers whatever the transport delivers until
//! `n` bytes are available, and distinguishes three outcomes:
//!
//! - `Exact::Filled`: exactly `n` bytes
//! - `Exact::Closed`: clean close with no buffered bytes at all
//! - `BoxStreamError::Truncated`: close after some, but not all, of the bytes
//!
//! Transport errors pass through as `BoxStreamError::Io`. An [`AbortHandle`]
//! makes pending and future reads resolve with `BoxStreamError::Aborted`.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;

use crate::error::{BoxStreamError, BoxStreamResult};

/// Outcome of a successful exact read.
#[derive(Debug, PartialEq, Eq)]
pub enum Exact {
    Filled(BytesMut),
    Closed,
}

/// Cancels an [`ExactReader`] (and the decoder built on it) from anywhere.
///
/// The first reason wins; later calls are ignored.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl AbortHandle {
    pub fn abort(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    pub fn is_aborted(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

/// Buffered exact-count reader.
pub struct ExactReader<R> {
    inner: R,
    buf: BytesMut,
    abort_tx: Arc<watch::Sender<Option<String>>>,
    abort_rx: watch::Receiver<Option<String>>,
}

impl<R: AsyncRead + Unpin> ExactReader<R> {
    pub fn new(inner: R) -> Self {
        let (tx, rx) = watch::channel(None);
        Self {
            inner,
            buf: BytesMut::new(),
            abort_tx: Arc::new(tx),
            abort_rx: rx,
        }
    }

    /// Read exactly `n` bytes.
    pub async fn read_exact(&mut self, n: usize) -> BoxStreamResult<Exact> {
        if let Some(reason) = self.abort_reason() {
            return Err(BoxStreamError::Aborted(reason));
        }

        let Self {
            inner,
            buf,
            abort_rx,
            ..
        } = self;

        // read_buf is cancel-safe: bytes read before an abort stay in `buf`
        tokio::select! {
            biased;
            reason = wait_for_abort(abort_rx) => Err(BoxStreamError::Aborted(reason)),
            filled = fill(inner, buf, n) => filled,
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            tx: Arc::clone(&self.abort_tx),
        }
    }

    pub fn abort(&self, reason: impl Into<String>) {
        self.abort_handle().abort(reason);
    }

    pub fn abort_reason(&self) -> Option<String> {
        self.abort_rx.borrow().clone()
    }

    /// Bytes received from the transport but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

async fn fill<R: AsyncRead + Unpin>(
    inner: &mut R,
    buf: &mut BytesMut,
    n: usize,
) -> BoxStreamResult<Exact> {
    while buf.len() < n {
        buf.reserve(n - buf.len());
        if inner.read_buf(buf).await? == 0 {
            if buf.is_empty() {
                return Ok(Exact::Closed);
            }
            return Err(BoxStreamError::Truncated {
                expected: n,
                received: buf.len(),
            });
        }
    }
    Ok(Exact::Filled(buf.split_to(n)))
}

async fn wait_for_abort(rx: &mut watch::Receiver<Option<String>>) -> String {
    let reason = match rx.wait_for(Option::is_some).await {
        Ok(reason) => reason.clone(),
        Err(_) => None,
    };
    match reason {
        Some(reason) => reason,
        // the reader owns a sender, so the channel only closes during teardown
        None => std::future::pending().await,
    }
}
