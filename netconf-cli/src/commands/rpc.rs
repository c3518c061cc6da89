use crate::commands::builtin::{arg, log_reply, value_of, value_of_if_exists};
use crate::config::Config;
use clap::{Command, ValueHint};
use netconf_session::error::NetconfClientResult;
use netconf_session::method::{RawMethod, RpcMethod};
use netconf_session::session::Session;
use std::fs;

pub fn cli() -> Command {
    Command::new("rpc")
        .about("Execute raw rpc")
        .help_template(color_print::cstr!(
            "\
{about-with-newline}
<green,bold>Usage:</> {usage}

<green,bold>Options:</>
{options}\n",
        ))
        .args([
            arg(
                "file",
                "File containing operation elements, sent inside one <rpc>",
                true,
                Some('f'),
                None,
                Some(ValueHint::FilePath),
                None,
            ),
            arg(
                "message-id",
                "Message-id of the request (defaults to a random uuid)",
                false,
                Some('m'),
                None,
                None,
                None,
            ),
        ])
}

pub async fn exec(cfg: &Config, session: &Session) -> NetconfClientResult<()> {
    let path = value_of::<String>("file", &cfg.args);
    let method = RawMethod::new(fs::read_to_string(path)?);
    let methods: [&dyn RpcMethod; 1] = [&method];
    let result = match value_of_if_exists::<String>("message-id", &cfg.args) {
        Some(message_id) => session.exec(message_id, &methods).await,
        None => session.rpc(&methods).await,
    };
    log_reply(result)
}
