use futures::stream::StreamExt;
use prelude::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

pub mod prelude;
pub mod receiver;
pub mod sender;

/// Handles one inbound client datagram.
///
/// `None` means the handler has no immediate reply to send — the query was
/// forwarded upstream and the reply will arrive later, written directly to
/// the shared listen socket by whoever owns the upstream correlation.
#[async_trait::async_trait]
pub trait Handler {
    async fn handle(&self, message: Message) -> Option<Message>;
}

pub struct UdpServer<H> {
    socket: Arc<UdpSocket>,
    handler: H,
}

impl<H: Handler> UdpServer<H> {
    /// Binds the listen socket. Kept separate from `run` so the same
    /// `Arc<UdpSocket>` can be shared with a resolver's upstream-response
    /// task before the server loop starts.
    pub async fn bind(address: SocketAddr) -> std::io::Result<Arc<UdpSocket>> {
        let socket = UdpSocket::bind(address).await?;
        Ok(Arc::new(socket))
    }

    pub fn new(socket: Arc<UdpSocket>, handler: H) -> Self {
        Self { socket, handler }
    }

    pub async fn run(&self) -> std::io::Result<()> {
        let receiver = receiver::Receiver::new(self.socket.clone());
        let sender = sender::Sender::new(self.socket.clone());

        let stream = receiver
            .into_stream()
            .map(|item| async { self.handler.handle(item).await })
            .buffer_unordered(64);

        tokio::pin!(stream);

        while let Some(item) = stream.next().await {
            let Some(item) = item else { continue };
            if let Err(error) = sender.send(&item).await {
                tracing::error!("couldn't send message to {:?}: {error:?}", item.address);
            }
        }

        Ok(())
    }
}
