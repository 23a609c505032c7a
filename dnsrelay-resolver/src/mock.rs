use std::net::SocketAddr;
use std::sync::Mutex;

use dnsrelay_proto::packet::DnsPacket;

use crate::prelude::{ForwardError, Forwarder};

/// Records every forwarded query instead of sending it anywhere. Tests drive
/// the "response arrives later" half of the pipeline themselves by
/// inspecting `forwarded()` and feeding a synthetic answer back in.
#[derive(Debug, Default)]
pub struct MockForwarder {
    forwarded: Mutex<Vec<(SocketAddr, DnsPacket)>>,
}

impl MockForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarded(&self) -> Vec<(SocketAddr, DnsPacket)> {
        self.forwarded.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Forwarder for MockForwarder {
    async fn forward(&self, client: SocketAddr, query: DnsPacket) -> Result<(), ForwardError> {
        self.forwarded.lock().unwrap().push((client, query));
        Ok(())
    }
}
