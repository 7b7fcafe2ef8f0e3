//! VISCA-over-IP UDP client.
//!
//! The socket is bound lazily on first use and kept for the life of the
//! client. Each frame is stamped with the next sequence number; replies
//! from other peers, with stale sequence numbers, or that fail to decode
//! are skipped while waiting.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::UdpSocket;
use tokio_util::udp::UdpFramed;
use tracing::{debug, trace};

use crate::codec::visca::{
    PayloadType, ReplyKind, ViscaCodec, ViscaIpCodec, ViscaLimits, ViscaMessage, classify_reply,
};
use crate::error::PtzError;
use crate::transport::{CodecClient, Link, TransportConfig};
use crate::types::validate_host;

/// VISCA camera over UDP.
pub type ViscaClient = CodecClient<ViscaCodec, ViscaLink>;

impl ViscaClient {
    /// Validate the target; no I/O happens until the first command.
    pub fn connect(
        host: &str,
        port: u16,
        limits: ViscaLimits,
        config: TransportConfig,
    ) -> Result<Self, PtzError> {
        validate_host(host)?;
        if port == 0 {
            return Err(PtzError::InvalidConfig("port must be non-zero".into()));
        }
        let target = format!("{host}:{port}");
        Ok(CodecClient::new(
            format!("VISCA {target}"),
            ViscaCodec::new(limits),
            ViscaLink::new(target),
            config,
        ))
    }
}

struct Connected {
    framed: UdpFramed<ViscaIpCodec>,
    remote: SocketAddr,
}

/// UDP link speaking VISCA-over-IP.
pub struct ViscaLink {
    target: String,
    conn: Option<Connected>,
    sequence: u32,
}

impl ViscaLink {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            conn: None,
            sequence: 1,
        }
    }

    async fn ensure_connected(&mut self) -> Result<&mut Connected, PtzError> {
        if self.conn.is_none() {
            let remote = tokio::net::lookup_host(&self.target)
                .await
                .map_err(|e| PtzError::Unreachable(format!("{}: {e}", self.target)))?
                .next()
                .ok_or_else(|| {
                    PtzError::Unreachable(format!("{}: no address found", self.target))
                })?;
            let local: SocketAddr = if remote.is_ipv4() {
                ([0, 0, 0, 0], 0).into()
            } else {
                (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
            };
            let socket = UdpSocket::bind(local).await?;
            debug!("VISCA socket {} -> {remote}", socket.local_addr()?);
            self.conn = Some(Connected {
                framed: UdpFramed::new(socket, ViscaIpCodec),
                remote,
            });
        }
        self.conn
            .as_mut()
            .ok_or_else(|| PtzError::Unreachable(format!("{}: not connected", self.target)))
    }

    fn next_sequence(&mut self) -> u32 {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        seq
    }

    /// Wait for the reply that completes `sequence`.
    async fn await_reply(
        conn: &mut Connected,
        sequence: u32,
        inquiry: bool,
    ) -> Result<Option<Bytes>, PtzError> {
        loop {
            let (msg, from) = match conn.framed.next().await {
                Some(Ok(received)) => received,
                Some(Err(e)) => {
                    debug!("skipping bad VISCA datagram: {e}");
                    continue;
                }
                None => return Err(PtzError::Unreachable("VISCA socket closed".into())),
            };
            if from != conn.remote || msg.payload_type != PayloadType::Reply {
                trace!("ignoring datagram from {from} ({:?})", msg.payload_type);
                continue;
            }
            if msg.sequence != sequence {
                trace!("ignoring stale reply seq={} (want {sequence})", msg.sequence);
                continue;
            }
            match classify_reply(&msg.payload) {
                Some(ReplyKind::Error(code)) => return Err(PtzError::Rejected(code)),
                Some(ReplyKind::InquiryData) if inquiry => return Ok(Some(msg.payload)),
                Some(ReplyKind::Ack | ReplyKind::Completion) if !inquiry => return Ok(None),
                Some(kind) => trace!("waiting past {kind:?}"),
                None => debug!("unrecognised VISCA reply {:02X?}", &msg.payload[..]),
            }
        }
    }
}

#[async_trait]
impl Link for ViscaLink {
    type Frame = Bytes;
    type Reply = Bytes;

    async fn exchange(
        &mut self,
        frame: &Bytes,
        timeout: Duration,
    ) -> Result<Option<Bytes>, PtzError> {
        let sequence = self.next_sequence();
        let msg = ViscaMessage::new(sequence, frame.clone());
        let inquiry = msg.payload_type == PayloadType::Inquiry;
        let conn = self.ensure_connected().await?;

        let remote = conn.remote;
        let sent = conn.framed.send((msg, remote)).await;
        if let Err(e) = sent {
            self.conn = None;
            return Err(PtzError::Unreachable(format!("{remote}: {e}")));
        }

        match tokio::time::timeout(timeout, Self::await_reply(conn, sequence, inquiry)).await {
            Ok(result) => result,
            Err(_) => Err(PtzError::Timeout(timeout)),
        }
    }

    async fn close(&mut self) {
        // Datagrams are flushed per send; dropping the socket is enough.
        self.conn = None;
    }
}
