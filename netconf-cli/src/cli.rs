use crate::commands::builtin::{builtin, builtin_exec};
use crate::config::{CliConfig, Host};
use clap::{
    arg, crate_authors, crate_description, crate_name, crate_version, Arg, ArgAction, Command,
};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use log::{debug, error, info, warn};
use netconf_session::error::{NetconfClientError, NetconfClientResult};
use netconf_session::session::{Session, SessionConfig};
use netconf_session::transport::ssh::SSHTransport;
use ssh2_config::HostParams;
use std::time::Instant;
use tokio::task::JoinHandle;

pub async fn exec(cmd: String, cfg: CliConfig) -> NetconfClientResult<()> {
    let addresses = &cfg.inner.addresses;
    if addresses.is_empty() {
        return Err(NetconfClientError::new("No hosts given".to_string()));
    }

    let mut tasks = FuturesUnordered::new();
    for addr in addresses {
        let params = match &cfg.inner.ssh_config {
            Some(ssh_config) => ssh_config.query(addr),
            None => HostParams::default(),
        };
        let host = Host::new(addr, &cfg.inner.username, &cfg.inner.password, params)?;
        let handle: JoinHandle<NetconfClientResult<()>> =
            tokio::spawn(run_on_host(host, cmd.clone(), cfg.clone()));
        tasks.push(handle);
    }

    while let Some(joined) = tasks.next().await {
        match joined {
            Ok(Ok(())) => debug!("Task completed successfully"),
            Ok(Err(err)) => error!("Task failed with error: {}", err),
            Err(err) => error!("Task failed: {}", err),
        }
    }
    Ok(())
}

/// One session per host: connect, run `cmd`, close.
async fn run_on_host(host: Host, cmd: String, cfg: CliConfig) -> NetconfClientResult<()> {
    let start_time = Instant::now();
    let transport = SSHTransport::new_with_session(host.connect_ssh().await?).await?;
    let session_config = SessionConfig {
        err_on_warning: cfg.inner.err_on_warning,
        ..SessionConfig::default()
    };
    let session = Session::with_config(transport, session_config).await?;
    info!(
        target: &host.address,
        "Connected to host, session-id: {}",
        session.session_id()
    );

    let result = builtin_exec(&cmd, &session, &cfg.inner)
        .await
        .unwrap_or_else(|| Err(NetconfClientError::new(format!("Unknown command: {}", cmd))));
    debug!(target: &host.address, "Operation took: {:.3}s", start_time.elapsed().as_secs_f32());

    if let Err(err) = session.close().await {
        warn!(target: &host.address, "Closing session failed: {}", err);
    }
    result
}

pub fn cli() -> Command {
    Command::new(crate_name!())
        .author(crate_authors!("\n"))
        .about(crate_description!())
        .version(crate_version!())
        .long_version(crate_version!())
        .arg_required_else_help(true)
        .allow_external_subcommands(false)
        .bin_name("netconf")
        .display_name("netconf")
        .help_template(color_print::cstr!(
            "\
{about-with-newline}
<green,bold>Author:</> {author}

<green,bold>Usage:</> {usage}

<green,bold>Options:</>
{options}

<green,bold>Commands:</>
    <cyan,bold>get</>               Execute get rpc
    <cyan,bold>get-config</>        Execute get-config rpc
    <cyan,bold>rpc</>               Execute raw rpc read from a file
    <cyan,bold>capabilities</>      Print server capabilities from the hello exchange

See '<cyan,bold>netconf help</> <cyan><<command>></>' for more information on a specific command.\n",
        ))
        .args([
            arg!(-v --verbose ... "Use verbose output (-vv to also log hellos, rpc requests and replies, -vvv to trace every frame)")
                .global(true),
            arg!(-q --quiet "Disable logging completely")
                .global(true),
            global_opt("host", "Hosts to connect, host[:port]")
                .env("NETCONF_HOST")
                .action(ArgAction::Append)
                .value_delimiter(','),
            global_opt("username", "Username for netconf connection")
                .env("NETCONF_USERNAME"),
            global_opt("password", "Password for netconf connection")
                .env("NETCONF_PASSWORD")
                .hide_env(true),
            Arg::new("err-on-warning")
                .help("Treat rpc-error warnings as failures")
                .long("err-on-warning")
                .action(ArgAction::SetTrue)
                .env("NETCONF_ERR_ON_WARNING")
                .global(true),
        ])
        .subcommands(builtin())
}

fn global_opt(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).help(help).long(name).global(true)
}

#[test]
fn verify_cli() {
    cli().debug_assert();
}
