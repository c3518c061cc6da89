use crate::error::NetconfClientResult;
use crate::message::Hello;
use async_trait::async_trait;

pub mod framed;
#[cfg(feature = "async-ssh2-lite")]
pub mod ssh;

/// Trait for NETCONF transport
///
/// A transport exchanges the two `<hello>` messages first, then runs its own
/// reader loop so that [`send_receive`](Transport::send_receive) can wait for
/// the reply carrying a given `message-id`.
#[async_trait]
pub trait Transport: Send {
    async fn receive_hello(&mut self) -> NetconfClientResult<Hello>;
    async fn send_hello(&mut self, hello: &Hello) -> NetconfClientResult<()>;
    fn start_reader(&mut self) -> NetconfClientResult<()>;
    async fn send_receive(&mut self, message_id: &str, request: &[u8])
        -> NetconfClientResult<String>;
    async fn close(&mut self) -> NetconfClientResult<()>;
}
