use crate::commands::builtin::value_of;
use config::CliConfig;
use env_logger::{Builder, Target};
use log::LevelFilter;
use netconf_session::error::NetconfClientResult;

mod cli;
mod commands;
mod config;

const SESSION_MODULE: &str = "netconf_session";

/// Levels for the cli and for the session library by `-v` count. Library
/// warnings always show; `-vv` adds hellos, rpc requests and replies,
/// `-vvv` traces every frame.
fn log_levels(verbosity: u8) -> (LevelFilter, LevelFilter) {
    match verbosity {
        0 => (LevelFilter::Info, LevelFilter::Warn),
        1 => (LevelFilter::Debug, LevelFilter::Warn),
        2 => (LevelFilter::Debug, LevelFilter::Debug),
        _ => (LevelFilter::Trace, LevelFilter::Trace),
    }
}

fn init_logging(verbosity: u8) {
    let (cli_level, session_level) = log_levels(verbosity);
    Builder::new()
        .filter_level(cli_level)
        .filter_module(SESSION_MODULE, session_level)
        .target(Target::Stdout)
        .init();
}

#[tokio::main]
async fn main() -> NetconfClientResult<()> {
    let mut args = cli::cli().get_matches();
    let verbosity = value_of::<u8>("verbose", &args);
    let disable_logging = value_of::<bool>("quiet", &args);
    if !disable_logging {
        init_logging(*verbosity);
    }

    match args.remove_subcommand() {
        Some((cmd, args)) => {
            let cli_config = CliConfig::new(args)?;
            cli::exec(cmd.to_owned(), cli_config).await?;
        }
        _ => {
            cli::cli().print_help()?;
        }
    }
    Ok(())
}

#[test]
fn test_log_levels() {
    assert_eq!(log_levels(0), (LevelFilter::Info, LevelFilter::Warn));
    assert_eq!(log_levels(1).1, LevelFilter::Warn);
    assert_eq!(log_levels(2), (LevelFilter::Debug, LevelFilter::Debug));
    assert_eq!(log_levels(3), log_levels(7));
    assert_eq!(log_levels(3).1, LevelFilter::Trace);
}
