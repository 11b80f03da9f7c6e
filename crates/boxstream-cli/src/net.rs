//! Duplex demo over TCP: each side sends JSON lines through its own
//! box-stream and collects what the peer sends back.
//!
//! Both directions are keyed from one shared secret via
//! [`KeyMaterial::directional`], so the two encoders never share a nonce space.

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

use boxstream_crypto::{BoxStreamDecoder, BoxStreamWriter, CipherSuite, Direction, KeyMaterial};

use crate::lines::{serialize, LineParser};

/// Which end of the TCP connection this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    fn directions(self) -> (Direction, Direction) {
        match self {
            Self::Initiator => (
                Direction::InitiatorToResponder,
                Direction::ResponderToInitiator,
            ),
            Self::Responder => (
                Direction::ResponderToInitiator,
                Direction::InitiatorToResponder,
            ),
        }
    }
}

/// Send `outgoing` and collect the peer's values until its terminal record.
pub async fn exchange(
    stream: TcpStream,
    role: Role,
    shared: &KeyMaterial,
    suite: CipherSuite,
    outgoing: &[Value],
) -> Result<Vec<Value>> {
    let (send_dir, recv_dir) = role.directions();
    let send_material = shared.directional(send_dir)?;
    let recv_material = shared.directional(recv_dir)?;

    let (read_half, write_half) = stream.into_split();

    let send = async move {
        let mut writer = BoxStreamWriter::with_suite(write_half, &send_material, suite);
        for value in outgoing {
            writer.send(&serialize(value)?).await?;
        }
        writer.finish().await.context("closing outgoing box-stream")?;
        Ok::<_, anyhow::Error>(())
    };

    let recv = async move {
        let mut decoder = BoxStreamDecoder::with_suite(read_half, &recv_material, suite);
        let mut parser = LineParser::new();
        let mut values = Vec::new();
        while let Some(chunk) = decoder
            .next_chunk()
            .await
            .context("reading incoming box-stream")?
        {
            values.extend(parser.push(&chunk)?);
        }
        if parser.pending() > 0 {
            debug!(bytes = parser.pending(), "peer ended without a final newline");
        }
        values.extend(parser.finish()?);
        Ok::<_, anyhow::Error>(values)
    };

    let ((), received) = tokio::try_join!(send, recv)?;
    Ok(received)
}

/// Accept connections and run an exchange with each; stop after the first if `once`.
pub async fn serve(
    listener: TcpListener,
    shared: KeyMaterial,
    suite: CipherSuite,
    outgoing: Vec<Value>,
    once: bool,
) -> Result<()> {
    info!(addr = %listener.local_addr()?, "listening");
    loop {
        let (stream, peer) = listener.accept().await.context("accepting connection")?;
        info!(%peer, "connection accepted");

        if once {
            let received = exchange(stream, Role::Responder, &shared, suite, &outgoing).await?;
            report("server", &received)?;
            return Ok(());
        }

        let shared = shared.clone();
        let outgoing = outgoing.clone();
        tokio::spawn(async move {
            match exchange(stream, Role::Responder, &shared, suite, &outgoing).await {
                Ok(received) => {
                    if let Err(e) = report("server", &received) {
                        warn!(%peer, error = %e, "failed to print received values");
                    }
                }
                Err(e) => warn!(%peer, error = ?e, "session failed"),
            }
        });
    }
}

/// Dial `addr` and run one exchange as the initiator.
pub async fn connect(
    addr: impl ToSocketAddrs,
    shared: &KeyMaterial,
    suite: CipherSuite,
    outgoing: &[Value],
) -> Result<Vec<Value>> {
    let stream = TcpStream::connect(addr).await.context("connecting")?;
    info!(peer = %stream.peer_addr()?, "connected");
    exchange(stream, Role::Initiator, shared, suite, outgoing).await
}

pub fn report(side: &str, values: &[Value]) -> Result<()> {
    println!(
        "{side} received {}",
        serde_json::to_string(values).context("rendering received values")?
    );
    Ok(())
}
