//! # netconf-session
//!
//! ```toml
//! netconf-session = "0.1.0"
//! ```
//!
//! NETCONF client session layer. A [`Session`](session::Session) performs the
//! `<hello>` exchange over a [`Transport`](transport::Transport) once, then
//! executes `<rpc>` requests and arbitrates `<rpc-error>` severities.
//!
//! ## Example
//!
//! ```rust,no_run
//! use netconf_session::method::{Datastore, GetConfig};
//! use netconf_session::session::Session;
//! use netconf_session::transport::ssh::SSHTransport;
//!
//! # async fn run() -> netconf_session::error::NetconfClientResult<()> {
//! let transport = SSHTransport::new_with_user_auth("192.0.2.1:830", "admin", "admin").await?;
//! let session = Session::new(transport).await?;
//! let reply = session
//!     .exec("101", &[&GetConfig::new(Datastore::Running, None, None)])
//!     .await?;
//! println!("{}", reply.raw());
//! session.close().await?;
//! # Ok(())
//! # }
//! ```
//!
pub mod error;
pub mod framer;
pub mod message;
pub mod method;
pub mod session;
pub mod transport;

pub const NETCONF_URN: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";
pub const NETCONF_BASE_10_CAP: &str = "urn:ietf:params:netconf:base:1.0";
pub const NETCONF_BASE_11_CAP: &str = "urn:ietf:params:netconf:base:1.1";

/// Capabilities advertised in the client `<hello>` unless a
/// [`SessionConfig`](session::SessionConfig) overrides them.
pub const DEFAULT_CAPABILITIES: &[&str] = &[NETCONF_BASE_10_CAP, NETCONF_BASE_11_CAP];
