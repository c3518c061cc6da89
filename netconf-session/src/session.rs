use crate::error::{NetconfClientError, NetconfClientResult};
use crate::message::{encode_rpc, Hello, RpcReply};
use crate::method::RpcMethod;
use crate::transport::Transport;
use crate::DEFAULT_CAPABILITIES;
use log::debug;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Settings applied when a [`Session`] is established.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capabilities advertised in the client `<hello>`.
    pub capabilities: Vec<String>,
    /// Treat `warning` severity `<rpc-error>`s as failures.
    pub err_on_warning: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            capabilities: DEFAULT_CAPABILITIES
                .iter()
                .map(|capability| capability.to_string())
                .collect(),
            err_on_warning: false,
        }
    }
}

/// An established NETCONF session.
///
/// Requests are serialized: concurrent [`exec`](Session::exec) calls wait for
/// each other, so at most one request is outstanding at a time.
pub struct Session {
    // `None` once closed.
    transport: Mutex<Option<Box<dyn Transport + 'static>>>,

    session_id: u64,
    server_capabilities: Vec<String>,
    err_on_warning: bool,
}

impl Session {
    pub async fn new<T>(transport: T) -> NetconfClientResult<Session>
    where
        T: Transport + 'static,
    {
        Session::with_config(transport, SessionConfig::default()).await
    }

    /// Exchanges `<hello>` messages and starts the transport reader.
    ///
    /// Fails without starting the reader if the server hello is missing,
    /// malformed or carries no `<session-id>`.
    pub async fn with_config<T>(
        mut transport: T,
        config: SessionConfig,
    ) -> NetconfClientResult<Session>
    where
        T: Transport + 'static,
    {
        let server_hello = transport.receive_hello().await?;
        let session_id = server_hello.session_id().ok_or_else(|| {
            NetconfClientError::MalformedHello("missing <session-id>".to_string())
        })?;

        transport
            .send_hello(&Hello::new(config.capabilities))
            .await?;
        transport.start_reader()?;
        debug!("Started netconf session with session-id: {}", session_id);

        Ok(Session {
            transport: Mutex::new(Some(Box::new(transport))),
            session_id,
            server_capabilities: server_hello.capabilities().to_vec(),
            err_on_warning: config.err_on_warning,
        })
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn server_capabilities(&self) -> &[String] {
        &self.server_capabilities
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.server_capabilities
            .iter()
            .any(|cap| cap.trim() == capability)
    }

    pub fn err_on_warning(&self) -> bool {
        self.err_on_warning
    }

    pub fn set_err_on_warning(&mut self, err_on_warning: bool) {
        self.err_on_warning = err_on_warning
    }

    /// Sends `methods` in one `<rpc>` tagged with `message_id` and waits for the reply.
    ///
    /// A reply whose first fatal `<rpc-error>` is `error`, or `warning` with
    /// [`err_on_warning`](Session::err_on_warning) set, is returned as
    /// [`NetconfClientError::Rpc`] together with the decoded reply. Non-fatal
    /// errors stay in [`RpcReply::errors`] of a successful result.
    pub async fn exec(
        &self,
        message_id: &str,
        methods: &[&dyn RpcMethod],
    ) -> NetconfClientResult<RpcReply> {
        if message_id.is_empty() {
            return Err(NetconfClientError::InvalidMessageId);
        }
        if methods.is_empty() {
            return Err(NetconfClientError::EmptyRequest);
        }

        let mut transport = self.transport.lock().await;
        let transport = transport
            .as_mut()
            .ok_or(NetconfClientError::SessionClosed)?;

        let request = encode_rpc(message_id, methods).map_err(NetconfClientError::Encoding)?;
        debug!("Exec: request:\n{}", String::from_utf8_lossy(&request));

        let raw = transport.send_receive(message_id, &request).await?;
        debug!("Exec: reply:\n{}", raw);

        let reply = match RpcReply::decode(&raw) {
            Ok(reply) => reply,
            Err(source) => return Err(NetconfClientError::Decoding { source, raw }),
        };

        let fatal = reply
            .errors()
            .iter()
            .find(|error| error.is_fatal(self.err_on_warning))
            .cloned();
        match fatal {
            Some(error) => Err(NetconfClientError::Rpc {
                error,
                reply: Box::new(reply),
            }),
            None => Ok(reply),
        }
    }

    /// [`exec`](Session::exec) with a freshly generated UUID message-id.
    pub async fn rpc(&self, methods: &[&dyn RpcMethod]) -> NetconfClientResult<RpcReply> {
        let message_id = Uuid::new_v4().to_string();
        self.exec(&message_id, methods).await
    }

    /// Closes the transport. Calling it again is a no-op; every later
    /// [`exec`](Session::exec) fails with [`NetconfClientError::SessionClosed`].
    pub async fn close(&self) -> NetconfClientResult<()> {
        let transport = self.transport.lock().await.take();
        match transport {
            Some(mut transport) => {
                debug!("Closing netconf session {}", self.session_id);
                transport.close().await
            }
            None => Ok(()),
        }
    }
}
