use crate::error::{NetconfClientError, NetconfClientResult};
use crate::framer::async_framer::{split, FrameReader, FrameWriter};
use crate::message::{reply_message_id, Hello};
use crate::transport::Transport;
use crate::NETCONF_BASE_11_CAP;
use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type ReplySender = oneshot::Sender<NetconfClientResult<String>>;

#[derive(Default)]
struct PendingReplies {
    waiting: HashMap<String, ReplySender>,
    stopped: Option<String>,
}

impl PendingReplies {
    fn stop(&mut self, reason: String) {
        for (_, sender) in self.waiting.drain() {
            let _ = sender.send(Err(NetconfClientError::ReaderClosed(reason.clone())));
        }
        self.stopped.get_or_insert(reason);
    }
}

// Drops the pending entry when a request ends without its reply, e.g. on cancellation.
struct PendingGuard<'a> {
    pending: &'a Mutex<PendingReplies>,
    message_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().waiting.remove(self.message_id);
    }
}

/// Transport over any byte stream that already speaks to a NETCONF server,
/// for example an SSH `netconf` subsystem channel.
pub struct FramedTransport<S> {
    reader: Option<FrameReader<ReadHalf<S>>>,
    writer: FrameWriter<WriteHalf<S>>,
    pending: Arc<Mutex<PendingReplies>>,
    reader_task: Option<JoinHandle<()>>,
    peer_supports_base_11: bool,
}

impl<S> FramedTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: S) -> Self {
        let (reader, writer) = split(stream);
        FramedTransport {
            reader: Some(reader),
            writer,
            pending: Arc::new(Mutex::new(PendingReplies::default())),
            reader_task: None,
            peer_supports_base_11: false,
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.writer.is_upgraded()
    }
}

#[async_trait]
impl<S> Transport for FramedTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn receive_hello(&mut self) -> NetconfClientResult<Hello> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| NetconfClientError::new("reader loop already started".to_string()))?;
        let frame = match reader.read_frame().await {
            Ok(frame) => frame,
            Err(NetconfClientError::Io(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(NetconfClientError::HelloNotReceived)
            }
            Err(err) => return Err(err),
        };
        debug!("Hello:\n{}", frame);

        let hello = Hello::from_xml(&frame)
            .map_err(|err| NetconfClientError::MalformedHello(err.to_string()))?;
        self.peer_supports_base_11 = hello.has_capability(NETCONF_BASE_11_CAP);
        Ok(hello)
    }

    async fn send_hello(&mut self, hello: &Hello) -> NetconfClientResult<()> {
        let xml = hello.to_xml().map_err(NetconfClientError::Encoding)?;
        self.writer.write_frame(xml.as_bytes()).await?;
        if self.peer_supports_base_11 && hello.has_capability(NETCONF_BASE_11_CAP) {
            debug!("Both peers support base:1.1, switching to chunked framing");
            self.writer.upgrade();
        }
        Ok(())
    }

    fn start_reader(&mut self) -> NetconfClientResult<()> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| NetconfClientError::new("reader loop already started".to_string()))?;
        self.reader_task = Some(tokio::spawn(read_loop(reader, self.pending.clone())));
        Ok(())
    }

    async fn send_receive(
        &mut self,
        message_id: &str,
        request: &[u8],
    ) -> NetconfClientResult<String> {
        if self.reader_task.is_none() {
            return Err(NetconfClientError::new(
                "reader loop not started".to_string(),
            ));
        }

        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if let Some(reason) = &pending.stopped {
                return Err(NetconfClientError::ReaderClosed(reason.clone()));
            }
            if pending.waiting.contains_key(message_id) {
                return Err(NetconfClientError::DuplicateMessageId(
                    message_id.to_string(),
                ));
            }
            pending.waiting.insert(message_id.to_string(), sender);
        }
        let _registered = PendingGuard {
            pending: &self.pending,
            message_id,
        };

        self.writer.write_frame(request).await?;
        receiver
            .await
            .map_err(|_| NetconfClientError::ReaderClosed("reply channel dropped".to_string()))?
    }

    async fn close(&mut self) -> NetconfClientResult<()> {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.pending.lock().stop("transport closed".to_string());
        self.writer.shutdown().await
    }
}

impl<S> Drop for FramedTransport<S> {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}

async fn read_loop<R>(mut reader: FrameReader<R>, pending: Arc<Mutex<PendingReplies>>)
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = match reader.read_frame().await {
            Ok(frame) => frame,
            Err(err) => {
                debug!("Reply reader stopped: {}", err);
                pending.lock().stop(err.to_string());
                break;
            }
        };

        let Some(message_id) = reply_message_id(&frame) else {
            warn!("Dropping frame without rpc-reply message-id:\n{}", frame);
            continue;
        };
        let sender = pending.lock().waiting.remove(&message_id);
        match sender {
            Some(sender) => {
                if sender.send(Ok(frame)).is_err() {
                    warn!(
                        "Request with message-id '{}' stopped waiting for its reply",
                        message_id
                    );
                }
            }
            None => warn!(
                "No request waiting for reply with message-id '{}'",
                message_id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_CAPABILITIES;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::time::timeout;

    const SERVER_HELLO_11: &str = r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><capabilities><capability>urn:ietf:params:netconf:base:1.1</capability></capabilities><session-id>7</session-id></hello>]]>]]>"#;
    const SERVER_HELLO_10: &str = r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><capabilities><capability>urn:ietf:params:netconf:base:1.0</capability></capabilities><session-id>8</session-id></hello>]]>]]>"#;

    async fn read_until(server: &mut DuplexStream, marker: &str) -> String {
        let mut received = Vec::new();
        let mut buffer = [0u8; 512];
        while !String::from_utf8_lossy(&received).contains(marker) {
            let bytes = server.read(&mut buffer).await.unwrap();
            assert!(bytes > 0, "client closed the stream");
            received.extend(&buffer[..bytes]);
        }
        String::from_utf8(received).unwrap()
    }

    async fn handshake(server_hello: &str) -> (FramedTransport<DuplexStream>, DuplexStream) {
        let (client, mut server) = duplex(4096);
        server.write_all(server_hello.as_bytes()).await.unwrap();

        let mut transport = FramedTransport::new(client);
        let hello = transport.receive_hello().await.unwrap();
        assert!(hello.session_id().is_some());
        transport
            .send_hello(&Hello::new(DEFAULT_CAPABILITIES.iter().copied()))
            .await
            .unwrap();
        let client_hello = read_until(&mut server, "]]>]]>").await;
        assert!(client_hello.starts_with("<hello"));
        transport.start_reader().unwrap();
        (transport, server)
    }

    #[tokio::test]
    async fn test_chunked_round_trip() {
        let (mut transport, mut server) = handshake(SERVER_HELLO_11).await;
        assert!(transport.is_chunked());

        let server_task = tokio::spawn(async move {
            let request = read_until(&mut server, "\n##\n").await;
            let reply = r#"<rpc-reply message-id="101"><ok/></rpc-reply>"#;
            server
                .write_all(format!("\n#{}\n{}\n##\n", reply.len(), reply).as_bytes())
                .await
                .unwrap();
            (request, server)
        });

        let reply = transport
            .send_receive("101", b"<rpc message-id=\"101\"><get/></rpc>")
            .await
            .unwrap();
        assert_eq!(reply, r#"<rpc-reply message-id="101"><ok/></rpc-reply>"#);

        let (request, _server) = server_task.await.unwrap();
        assert_eq!(
            request,
            "\n#34\n<rpc message-id=\"101\"><get/></rpc>\n##\n"
        );
    }

    #[tokio::test]
    async fn test_reply_correlation_skips_unknown_ids() {
        let (mut transport, mut server) = handshake(SERVER_HELLO_10).await;
        assert!(!transport.is_chunked());

        let server_task = tokio::spawn(async move {
            read_until(&mut server, "]]>]]>").await;
            server
                .write_all(
                    br#"<rpc-reply message-id="stale"><ok/></rpc-reply>]]>]]><rpc-reply message-id="a1"><data/></rpc-reply>]]>]]>"#,
                )
                .await
                .unwrap();
            server
        });

        let reply = transport.send_receive("a1", b"<rpc/>").await.unwrap();
        assert_eq!(reply, r#"<rpc-reply message-id="a1"><data/></rpc-reply>"#);
        let _server = server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_pending_message_id() {
        let (mut transport, mut server) = handshake(SERVER_HELLO_10).await;
        let (sender, first) = oneshot::channel();
        transport
            .pending
            .lock()
            .waiting
            .insert("d1".to_string(), sender);

        assert!(matches!(
            transport.send_receive("d1", b"<rpc/>").await,
            Err(NetconfClientError::DuplicateMessageId(id)) if id == "d1"
        ));
        assert!(transport.pending.lock().waiting.contains_key("d1"));

        server
            .write_all(br#"<rpc-reply message-id="d1"><ok/></rpc-reply>]]>]]>"#)
            .await
            .unwrap();
        assert_eq!(
            first.await.unwrap().unwrap(),
            r#"<rpc-reply message-id="d1"><ok/></rpc-reply>"#
        );
    }

    #[tokio::test]
    async fn test_cancelled_request_releases_message_id() {
        let (mut transport, mut server) = handshake(SERVER_HELLO_10).await;

        let cancelled = timeout(
            Duration::from_millis(50),
            transport.send_receive("7", br#"<rpc n="1"/>"#),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(transport.pending.lock().waiting.is_empty());

        let server_task = tokio::spawn(async move {
            read_until(&mut server, r#"<rpc n="2"/>]]>]]>"#).await;
            server
                .write_all(br#"<rpc-reply message-id="7"><ok/></rpc-reply>]]>]]>"#)
                .await
                .unwrap();
            server
        });

        let reply = transport
            .send_receive("7", br#"<rpc n="2"/>"#)
            .await
            .unwrap();
        assert_eq!(reply, r#"<rpc-reply message-id="7"><ok/></rpc-reply>"#);
        let _server = server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_reader_failure_is_reported() {
        let (mut transport, server) = handshake(SERVER_HELLO_10).await;
        drop(server);

        match transport.send_receive("1", b"<rpc/>").await {
            Err(NetconfClientError::ReaderClosed(_)) | Err(NetconfClientError::Io(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            transport.send_receive("2", b"<rpc/>").await,
            Err(NetconfClientError::ReaderClosed(_)) | Err(NetconfClientError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_hello() {
        let (client, server) = duplex(64);
        drop(server);
        let mut transport = FramedTransport::new(client);
        assert!(matches!(
            transport.receive_hello().await,
            Err(NetconfClientError::HelloNotReceived)
        ));
    }

    #[tokio::test]
    async fn test_malformed_hello() {
        let (client, mut server) = duplex(64);
        server.write_all(b"<hello><session-id>x</session-id></hello>]]>]]>").await.unwrap();
        let mut transport = FramedTransport::new(client);
        assert!(matches!(
            transport.receive_hello().await,
            Err(NetconfClientError::MalformedHello(_))
        ));
    }

    #[tokio::test]
    async fn test_send_before_reader_started() {
        let (client, _server) = duplex(64);
        let mut transport = FramedTransport::new(client);
        assert!(transport.send_receive("1", b"<rpc/>").await.is_err());
    }
}
