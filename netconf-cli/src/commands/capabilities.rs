use crate::config::Config;
use clap::Command;
use log::info;
use netconf_session::error::NetconfClientResult;
use netconf_session::session::Session;

pub fn cli() -> Command {
    Command::new("capabilities").about("Print server capabilities from the hello exchange")
}

pub fn exec(_cfg: &Config, session: &Session) -> NetconfClientResult<()> {
    info!(
        "Session-id {} capabilities:\n{}",
        session.session_id(),
        session.server_capabilities().join("\n")
    );
    Ok(())
}
