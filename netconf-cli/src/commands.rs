pub mod builtin;
pub mod capabilities;
pub mod get;
pub mod get_config;
pub mod rpc;
