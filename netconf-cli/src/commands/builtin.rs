use crate::commands::*;
use crate::config::Config;
use clap::builder::{IntoResettable, ValueParser};
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::{info, warn};
use netconf_session::error::NetconfClientResult;
use netconf_session::message::RpcReply;
use netconf_session::method::Filter;
use netconf_session::session::Session;
use std::fs;

pub fn builtin() -> Vec<Command> {
    vec![
        get::cli(),
        get_config::cli(),
        rpc::cli(),
        capabilities::cli(),
    ]
}

pub async fn builtin_exec(
    cmd: &str,
    session: &Session,
    args: &Config,
) -> Option<NetconfClientResult<()>> {
    let f = match cmd {
        "get" => get::exec(args, session).await,
        "get-config" => get_config::exec(args, session).await,
        "rpc" => rpc::exec(args, session).await,
        "capabilities" => capabilities::exec(args, session),
        _ => return None,
    };
    Some(f)
}

/// Logs the reply, or the reply carried by a protocol error, and passes the error on.
pub(crate) fn log_reply(result: NetconfClientResult<RpcReply>) -> NetconfClientResult<()> {
    let reply = match &result {
        Ok(reply) => Some(reply),
        Err(err) => err.reply(),
    };
    if let Some(reply) = reply {
        for rpc_error in reply.errors() {
            warn!("rpc-error: {}", rpc_error);
        }
        info!("Response:\n{}", reply);
    }
    result.map(|_| ())
}

pub(crate) fn read_filter(args: &ArgMatches) -> NetconfClientResult<Option<Filter>> {
    match value_of_if_exists::<String>("filter", args) {
        Some(path) => {
            let filter = fs::read_to_string(path)?;
            Ok(Some(Filter::subtree(&filter)))
        }
        None => Ok(None),
    }
}

pub(crate) fn value_of<'a, T: Clone + Send + Sync + 'static>(
    name: &str,
    args: &'a ArgMatches,
) -> &'a T {
    args.get_one::<T>(name).unwrap()
}

pub(crate) fn value_of_if_exists<'a, T: Clone + Send + Sync + 'static>(
    name: &str,
    args: &'a ArgMatches,
) -> Option<&'a T> {
    if args.contains_id(name) {
        args.get_one::<T>(name)
    } else {
        None
    }
}

pub(crate) fn values_of<'a, T: Clone + Send + Sync + 'static>(
    name: &str,
    args: &'a ArgMatches,
) -> Vec<&'a T> {
    args.get_many::<T>(name).unwrap_or_default().collect()
}

pub(super) fn arg(
    name: &'static str,
    help: &'static str,
    required: bool,
    short: Option<char>,
    default: Option<&'static str>,
    hint: Option<ValueHint>,
    parser: impl IntoResettable<ValueParser>,
) -> Arg {
    Arg::new(name)
        .short(short)
        .long(name)
        .help(help)
        .required(required)
        .default_value(default)
        .value_hint(hint)
        .value_parser(parser)
}
