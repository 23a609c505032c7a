use std::net::SocketAddr;

use dnsrelay_proto::packet::DnsPacket;

#[derive(Debug)]
pub enum ForwardError {
    /// every transaction id in the 16-bit space is currently pending
    Exhausted,
    Io(std::io::Error),
    Encode(dnsrelay_proto::buffer::WriterError),
}

impl std::fmt::Display for ForwardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted => write!(f, "no free upstream transaction id"),
            Self::Io(err) => write!(f, "upstream io error: {err}"),
            Self::Encode(err) => write!(f, "couldn't encode query: {err:?}"),
        }
    }
}

impl std::error::Error for ForwardError {}

impl From<std::io::Error> for ForwardError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<dnsrelay_proto::buffer::WriterError> for ForwardError {
    fn from(value: dnsrelay_proto::buffer::WriterError) -> Self {
        Self::Encode(value)
    }
}

/// Forwards a query upstream without waiting for the answer.
///
/// The reply, when it arrives, is delivered independently (written straight
/// to the original client by whoever owns the upstream correlation) — this
/// call only has to get the query out the door and remember who asked.
#[async_trait::async_trait]
pub trait Forwarder: std::fmt::Debug + Send + Sync {
    async fn forward(&self, client: SocketAddr, query: DnsPacket) -> Result<(), ForwardError>;
}
