use crate::error::{NetconfClientError, NetconfClientResult};
use crate::message::Hello;
use crate::transport::framed::FramedTransport;
use crate::transport::Transport;
use async_ssh2_lite::{ssh2, AsyncChannel, AsyncSession, SessionConfiguration};
use async_trait::async_trait;
use log::debug;
use tokio::net::TcpStream;

/// NETCONF over SSH, [RFC6242](https://www.rfc-editor.org/rfc/rfc6242).
pub struct SSHTransport {
    session: AsyncSession<TcpStream>,
    inner: FramedTransport<AsyncChannel<TcpStream>>,
}

impl SSHTransport {
    /// Opens the `netconf` subsystem on an already authenticated session.
    pub async fn new_with_session(
        session: AsyncSession<TcpStream>,
    ) -> NetconfClientResult<SSHTransport> {
        connect_internal(session).await
    }

    pub async fn new_with_user_auth(
        addr: &str,
        user_name: &str,
        password: &str,
    ) -> NetconfClientResult<SSHTransport> {
        let stream = TcpStream::connect(addr).await?;
        let mut configuration = SessionConfiguration::new();
        configuration.set_timeout(10000);
        let mut sess = AsyncSession::new(stream, configuration)?;
        sess.handshake().await?;

        sess.userauth_password(user_name, password).await?;
        connect_internal(sess).await
    }
}

#[async_trait]
impl Transport for SSHTransport {
    async fn receive_hello(&mut self) -> NetconfClientResult<Hello> {
        self.inner.receive_hello().await
    }

    async fn send_hello(&mut self, hello: &Hello) -> NetconfClientResult<()> {
        self.inner.send_hello(hello).await
    }

    fn start_reader(&mut self) -> NetconfClientResult<()> {
        self.inner.start_reader()
    }

    async fn send_receive(
        &mut self,
        message_id: &str,
        request: &[u8],
    ) -> NetconfClientResult<String> {
        self.inner.send_receive(message_id, request).await
    }

    async fn close(&mut self) -> NetconfClientResult<()> {
        if let Err(err) = self.inner.close().await {
            debug!("Closing netconf channel failed: {}", err);
        }
        self.session
            .disconnect(Some(ssh2::ByApplication), "Shutdown", None)
            .await?;
        Ok(())
    }
}

async fn connect_internal(session: AsyncSession<TcpStream>) -> NetconfClientResult<SSHTransport> {
    if !session.authenticated() {
        return Err(NetconfClientError::new(
            "ssh session is not authenticated".to_string(),
        ));
    }
    let mut channel = session.channel_session().await?;
    channel.subsystem("netconf").await?;
    Ok(SSHTransport {
        session,
        inner: FramedTransport::new(channel),
    })
}
