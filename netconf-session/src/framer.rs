//! Message framing, see [RFC6242](https://tools.ietf.org/html/rfc6242#section-4).
pub mod async_framer;

/// End-of-message marker used for `<hello>` and with base:1.0 peers.
pub const NETCONF_1_0_TERMINATOR: &str = "]]>]]>";
/// End-of-chunks marker of base:1.1 chunked framing.
pub const NETCONF_1_1_END_OF_CHUNKS: &str = "\n##\n";
