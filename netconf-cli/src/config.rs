use crate::commands::builtin::{value_of, value_of_if_exists, values_of};
use async_ssh2_lite::{AsyncSession, SessionConfiguration};
use clap::ArgMatches;
use dirs::home_dir;
use log::{debug, error, warn};
use netconf_session::error::{NetconfClientError, NetconfClientResult};
use ssh2::MethodType;
use ssh2_config::{HostParams, ParseRule, SshConfig};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

const NETCONF_SSH_PORT: u16 = 830;

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub inner: Arc<Config>,
}

#[derive(Debug)]
pub struct Config {
    pub args: ArgMatches,
    pub ssh_config: Option<SshConfig>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub addresses: Vec<String>,
    pub err_on_warning: bool,
}

impl CliConfig {
    pub fn new(args: ArgMatches) -> NetconfClientResult<Self> {
        let mut ssh_dir = home_dir().unwrap_or(PathBuf::from("/"));
        ssh_dir.extend(Path::new(".ssh/config"));
        let ssh_config = read_ssh_config(&ssh_dir);
        let addresses = values_of::<String>("host", &args)
            .iter()
            .map(|h| h.to_string())
            .collect();
        let username = value_of_if_exists::<String>("username", &args).cloned();
        let password = value_of_if_exists::<String>("password", &args).cloned();
        let err_on_warning = *value_of::<bool>("err-on-warning", &args);
        Ok(Self {
            inner: Arc::new(Config {
                username,
                password,
                addresses,
                err_on_warning,
                args,
                ssh_config,
            }),
        })
    }
}

fn read_ssh_config(path: &Path) -> Option<SshConfig> {
    debug!("Trying to parse ssh configuration '{}'", path.display());

    let mut reader = match File::open(path) {
        Ok(f) => BufReader::new(f),
        Err(err) => {
            warn!(
                "Could not open ssh config file '{}', error: {}",
                path.display(),
                err
            );
            return None;
        }
    };
    match SshConfig::default().parse(&mut reader, ParseRule::ALLOW_UNKNOWN_FIELDS) {
        Ok(config) => {
            debug!("Successfully parsed configuration");
            Some(config)
        }
        Err(err) => {
            error!("Failed to parse ssh configuration, error '{}'", err);
            None
        }
    }
}

#[derive(Debug)]
pub struct Host {
    pub(crate) address: String,
    port: u16,
    auth_user: String,
    auth_password: Option<String>,
    params: HostParams,
}

impl Host {
    pub(crate) fn new(
        addr: &str,
        username: &Option<String>,
        password: &Option<String>,
        params: HostParams,
    ) -> NetconfClientResult<Host> {
        let (address, port) = parse_address(addr)?;

        let auth_user = match (username, params.user.as_deref()) {
            (Some(user), _) => user.clone(),
            (None, Some(user)) => user.to_string(),
            (None, None) => {
                return Err(NetconfClientError::new("No username provided".to_string()))
            }
        };

        if password.is_none() && params.identity_file.is_none() {
            return Err(NetconfClientError::new(
                "No password or identity file provided".to_string(),
            ));
        }

        Ok(Host {
            address,
            port: port.or(params.port).unwrap_or(NETCONF_SSH_PORT),
            params,
            auth_user,
            auth_password: password.clone(),
        })
    }

    pub(crate) async fn connect_ssh(&self) -> NetconfClientResult<AsyncSession<TcpStream>> {
        let stream: TcpStream = self.tcp_connect_timeout().await?;
        let mut configuration = SessionConfiguration::new();
        configuration.set_timeout(10_000);
        if let Some(compress) = &self.params.compression {
            debug!(target: &self.address, "Setting compression: {}", compress);
            configuration.set_compress(*compress);
        }
        if let (true, Some(interval)) = (
            self.params.tcp_keep_alive.unwrap_or(false),
            self.params.server_alive_interval,
        ) {
            let interval = interval.as_secs() as u32;
            debug!(target: &self.address, "Setting keepalive interval: {} seconds", interval);
            configuration.set_keepalive(true, interval);
        }
        let mut session = AsyncSession::new(stream, configuration)?;
        configure_session(&mut session, &self.params).await?;
        session.handshake().await?;

        if let Some(password) = &self.auth_password {
            session.userauth_password(&self.auth_user, password).await?;
            return Ok(session);
        }

        let mut agent = session.agent()?;
        agent.connect().await?;
        agent.list_identities().await?;
        let identities = agent
            .identities()
            .map_err(|err| NetconfClientError::new(err.to_string()))?;
        for identity in identities {
            debug!(
                target: &self.address,
                "Trying authentication with public key '{}'",
                identity.comment()
            );
            match agent.userauth(&self.auth_user, &identity).await {
                Ok(_) => break,
                Err(err) => {
                    warn!(
                        target: &self.address,
                        "Public key '{}' authentication failed: {}",
                        identity.comment(),
                        err
                    );
                }
            }
        }
        Ok(session)
    }

    async fn tcp_connect_timeout(&self) -> NetconfClientResult<TcpStream> {
        let stream = timeout(
            Duration::from_secs(10),
            TcpStream::connect(&(self.address.as_str(), self.port)),
        )
        .await
        .map_err(|e| NetconfClientError::new(e.to_string()))?;
        Ok(stream?)
    }
}

/// Splits `host[:port]`. IPv6 literals take a port only in the `[addr]:port` form.
fn parse_address(addr: &str) -> NetconfClientResult<(String, Option<u16>)> {
    if let Some(bracketed) = addr.strip_prefix('[') {
        let (address, rest) = bracketed
            .split_once(']')
            .ok_or_else(|| NetconfClientError::new(format!("Missing ']' in '{}'", addr)))?;
        return match rest {
            "" => Ok((address.to_string(), None)),
            _ => match rest.strip_prefix(':') {
                Some(port) => Ok((address.to_string(), Some(parse_port(port, addr)?))),
                None => Err(NetconfClientError::new(format!(
                    "Unexpected '{}' after ']' in '{}'",
                    rest, addr
                ))),
            },
        };
    }
    match addr.split_once(':') {
        Some((address, port)) if !port.contains(':') => {
            Ok((address.to_string(), Some(parse_port(port, addr)?)))
        }
        _ => Ok((addr.to_string(), None)),
    }
}

fn parse_port(port: &str, addr: &str) -> NetconfClientResult<u16> {
    port.parse()
        .map_err(|_| NetconfClientError::new(format!("Invalid port in '{}'", addr)))
}

async fn configure_session(
    session: &mut AsyncSession<TcpStream>,
    params: &HostParams,
) -> NetconfClientResult<()> {
    let preferences = [
        (MethodType::Kex, params.kex_algorithms.as_deref()),
        (MethodType::HostKey, params.host_key_algorithms.as_deref()),
        (MethodType::CryptCs, params.ciphers.as_deref()),
        (MethodType::MacCs, params.mac.as_deref()),
        (MethodType::MacSc, params.mac.as_deref()),
    ];
    for (method, algos) in preferences {
        if let Some(algos) = algos {
            session.method_pref(method, algos.join(",").as_str()).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("192.0.2.1").unwrap(),
            ("192.0.2.1".to_string(), None)
        );
        assert_eq!(
            parse_address("router:2022").unwrap(),
            ("router".to_string(), Some(2022))
        );
        assert!(parse_address("router:ssh").is_err());
        assert_eq!(
            parse_address("2001:db8::1").unwrap(),
            ("2001:db8::1".to_string(), None)
        );
        assert_eq!(parse_address("::1").unwrap(), ("::1".to_string(), None));
        assert_eq!(
            parse_address("[::1]:830").unwrap(),
            ("::1".to_string(), Some(830))
        );
        assert_eq!(
            parse_address("[2001:db8::1]").unwrap(),
            ("2001:db8::1".to_string(), None)
        );
        assert!(parse_address("[::1").is_err());
        assert!(parse_address("[::1]830").is_err());
        assert!(parse_address("[::1]:ssh").is_err());
    }

    #[test]
    fn test_host_requires_credentials() {
        let no_user = Host::new("router", &None, &Some("pw".to_string()), HostParams::default());
        assert!(no_user.is_err());

        let no_secret = Host::new("router", &Some("admin".to_string()), &None, HostParams::default());
        assert!(no_secret.is_err());

        let host = Host::new(
            "router:2022",
            &Some("admin".to_string()),
            &Some("pw".to_string()),
            HostParams::default(),
        )
        .unwrap();
        assert_eq!(host.address, "router");
        assert_eq!(host.port, 2022);
    }
}
