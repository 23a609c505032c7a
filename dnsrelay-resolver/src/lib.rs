pub mod prelude;

#[cfg(feature = "mock")]
pub mod mock;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;

use dnsrelay_proto::buffer::BytePacketBuffer;
use dnsrelay_proto::packet::DnsPacket;
use prelude::{ForwardError, Forwarder};

struct PendingEntry {
    client: SocketAddr,
    client_id: u16,
    query: DnsPacket,
}

/// Forwards queries to a single upstream resolver and correlates replies by
/// transaction id.
///
/// Deliberately does not coalesce duplicate in-flight queries for the same
/// name: two clients asking the same question concurrently each get their
/// own pending entry and their own upstream query, matching how the
/// original `Server.peers`/`Server.requests` tables worked (keyed by id,
/// not by question).
pub struct ForwardResolver {
    upstream: SocketAddr,
    socket: UdpSocket,
    pending: Mutex<HashMap<u16, PendingEntry>>,
    next_id: AtomicU16,
}

impl std::fmt::Debug for ForwardResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardResolver")
            .field("upstream", &self.upstream)
            .finish()
    }
}

impl ForwardResolver {
    pub async fn bind(upstream: SocketAddr) -> std::io::Result<Self> {
        let local: SocketAddr = if upstream.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(local).await?;
        Ok(Self {
            upstream,
            socket,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU16::new(0),
        })
    }

    fn allocate_id(&self, pending: &HashMap<u16, PendingEntry>) -> Result<u16, ForwardError> {
        let start = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut id = start;
        loop {
            if !pending.contains_key(&id) {
                return Ok(id);
            }
            id = id.wrapping_add(1);
            if id == start {
                return Err(ForwardError::Exhausted);
            }
        }
    }

    /// Reads upstream responses forever, correlating each by transaction id
    /// and writing the finished reply directly to `listen`. Responses whose
    /// id has no matching pending entry (already answered, or never asked)
    /// are logged and dropped.
    pub async fn run_response_loop(self: Arc<Self>, listen: Arc<UdpSocket>) {
        let mut buf = [0u8; 512];
        loop {
            let (size, from) = match self.socket.recv_from(&mut buf).await {
                Ok(pair) => pair,
                Err(error) => {
                    tracing::error!("upstream socket read failed: {error}");
                    continue;
                }
            };
            if from != self.upstream {
                tracing::debug!("dropping datagram from unexpected peer {from}");
                continue;
            }

            let mut buffer = BytePacketBuffer::default();
            buffer.buf[..size].copy_from_slice(&buf[..size]);
            let response = match DnsPacket::try_from(buffer) {
                Ok(packet) => packet,
                Err(error) => {
                    tracing::warn!("couldn't decode upstream response: {error}");
                    continue;
                }
            };

            let id = response.header.id;
            let entry = self.pending.lock().await.remove(&id);
            let Some(entry) = entry else {
                tracing::info!("unknown response for transaction id {id}");
                continue;
            };

            let mut reply = build_reply(entry.query, entry.client_id, response);

            let mut out = match reply.create_buffer() {
                Ok(buffer) => buffer,
                Err(error) => {
                    tracing::error!("couldn't encode reply for {}: {error:?}", entry.client);
                    continue;
                }
            };
            if let Err(error) = listen
                .send_to(&out.buf[..out.pos()], entry.client)
                .await
            {
                tracing::error!("couldn't reply to {}: {error}", entry.client);
            }
        }
    }
}

/// Rewrites the upstream `response` into a reply for the original client:
/// the client's own transaction id, not the id allocated for the upstream
/// query, and the client's original `query` for everything else that
/// matters to the wire (questions, recursion-desired).
fn build_reply(query: DnsPacket, client_id: u16, response: DnsPacket) -> DnsPacket {
    let mut reply = query;
    reply.header.id = client_id;
    reply.header.response = true;
    reply.header.recursion_available = true;
    reply.header.response_code = response.header.response_code;
    reply.answers = response.answers;
    reply.authorities = response.authorities;
    reply.resources = response.resources;
    reply
}

#[async_trait::async_trait]
impl Forwarder for ForwardResolver {
    async fn forward(&self, client: SocketAddr, mut query: DnsPacket) -> Result<(), ForwardError> {
        let mut pending = self.pending.lock().await;
        let id = self.allocate_id(&pending)?;

        let client_id = query.header.id;
        query.header.id = id;
        query.header.response = false;
        query.answers.clear();
        query.authorities.clear();
        query.resources.clear();

        let mut buffer = query.clone().create_buffer()?;
        pending.insert(
            id,
            PendingEntry {
                client,
                client_id,
                query,
            },
        );
        drop(pending);

        self.socket
            .send_to(&buffer.buf[..buffer.pos()], self.upstream)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_report_unknown_response_without_panicking() {
        let resolver = ForwardResolver::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let pending = resolver.pending.lock().await;
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn should_allocate_increasing_ids() {
        let resolver = ForwardResolver::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let pending = resolver.pending.lock().await;
        let first = resolver.allocate_id(&pending).unwrap();
        let second = resolver.allocate_id(&pending).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn should_reply_with_the_clients_original_id_not_the_upstream_id() {
        let mut query = DnsPacket::default();
        query.header.id = 0xBEEF;

        let mut response = DnsPacket::default();
        response.header.id = 0x1234;
        response.header.response = true;

        let reply = build_reply(query, 0xBEEF, response);

        assert_eq!(reply.header.id, 0xBEEF);
    }
}
