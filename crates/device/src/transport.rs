//! Transports that produce a [`Channel`] carrying NETCONF.
//!
//! - `ssh`: the `netconf` subsystem over a [`SshConnection`]
//! - `telnet` / `serial`: a console login followed by
//!   `xml-mode netconf need-trailer`

use std::sync::LazyLock;

use junos_core::{Error, Result, ResultExt};
use regex::bytes::Regex;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::channel::Channel;
use crate::config::ToolingConfig;
use crate::ssh::SshConnection;
use crate::types::{ConnectionTarget, TransportMode};

/// Most prompts a console login walks through before NETCONF starts.
const MAX_LOGIN_STEPS: usize = 8;

/// An open transport: the NETCONF channel and, over SSH, the connection
/// it runs on.
#[derive(Debug)]
pub struct Link {
    pub channel: Channel,
    pub ssh: Option<SshConnection>,
}

/// Open a link to `target` using its transport mode.
///
/// # Errors
///
/// Returns [`Error::ConnectionFailed`] when the transport cannot be
/// established or the console login is refused.
pub async fn open(config: &ToolingConfig, target: &ConnectionTarget) -> Result<Link> {
    info!(host = %target.host, mode = %target.mode, "Opening transport");
    match target.mode {
        TransportMode::Ssh => open_ssh(config, target).await,
        TransportMode::Telnet => {
            let mut channel = open_telnet(config, target).await?;
            console_login(&mut channel, config, target).await?;
            Ok(Link { channel, ssh: None })
        }
        TransportMode::Serial => {
            let mut channel = open_serial(target).await?;
            console_login(&mut channel, config, target).await?;
            Ok(Link { channel, ssh: None })
        }
    }
}

async fn open_ssh(config: &ToolingConfig, target: &ConnectionTarget) -> Result<Link> {
    let ssh = SshConnection::connect(config, target).await?;
    match ssh.open_netconf().await {
        Ok(channel) => Ok(Link {
            channel,
            ssh: Some(ssh),
        }),
        Err(e) => {
            ssh.disconnect()
                .await
                .warn_and_discard("Failed to disconnect after the netconf subsystem was refused");
            Err(e)
        }
    }
}

async fn open_telnet(config: &ToolingConfig, target: &ConnectionTarget) -> Result<Channel> {
    let port = target.effective_port().unwrap_or(crate::types::TELNET_PORT);
    let stream = tokio::time::timeout(
        config.connect_timeout,
        TcpStream::connect((target.host.as_str(), port)),
    )
    .await
    .map_err(|_| Error::connection_failed(&target.host, "telnet connect timed out"))?
    .map_err(|e| Error::connection_failed(&target.host, format!("telnet connect failed: {e}")))?;

    let (reader, writer) = stream.into_split();
    Ok(Channel::new(reader, writer).with_telnet())
}

async fn open_serial(target: &ConnectionTarget) -> Result<Channel> {
    let port = tokio::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(&target.host)
        .await
        .map_err(|e| Error::connection_failed(&target.host, format!("cannot open serial line: {e}")))?;
    let writer = port
        .try_clone()
        .await
        .map_err(|e| Error::connection_failed(&target.host, format!("cannot open serial line: {e}")))?;

    Ok(Channel::new(port, writer))
}

fn prompt(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

static LOGIN: LazyLock<Option<Regex>> = LazyLock::new(|| prompt(r"(?i)(login|username):\s*$"));
static PASSWORD: LazyLock<Option<Regex>> = LazyLock::new(|| prompt(r"(?i)password:\s*$"));
static SHELL: LazyLock<Option<Regex>> = LazyLock::new(|| prompt(r"%\s*$"));
static CLI: LazyLock<Option<Regex>> = LazyLock::new(|| prompt(r">\s*$"));
static REFUSED: LazyLock<Option<Regex>> = LazyLock::new(|| prompt(r"(?i)login incorrect"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prompt {
    Login,
    Password,
    Shell,
    Cli,
    Refused,
}

const PROMPTS: [Prompt; 5] = [
    Prompt::Refused,
    Prompt::Login,
    Prompt::Password,
    Prompt::Shell,
    Prompt::Cli,
];

/// Walk a console from wherever it is to a NETCONF session.
async fn console_login(
    channel: &mut Channel,
    config: &ToolingConfig,
    target: &ConnectionTarget,
) -> Result<()> {
    let patterns = [&*REFUSED, &*LOGIN, &*PASSWORD, &*SHELL, &*CLI]
        .into_iter()
        .map(Option::as_ref)
        .collect::<Option<Vec<&Regex>>>()
        .ok_or_else(|| Error::transport("console prompt patterns failed to compile"))?;

    channel.send(b"\r\n").await?;

    for _ in 0..MAX_LOGIN_STEPS {
        let index = channel
            .expect(&patterns, config.connect_timeout, "console prompt")
            .await
            .map_err(|e| Error::connection_failed(&target.host, e.to_string()))?;
        let seen = PROMPTS.get(index).copied().unwrap_or(Prompt::Refused);
        debug!(host = %target.host, prompt = ?seen, "Console prompt");

        match seen {
            Prompt::Refused => {
                return Err(Error::connection_failed(&target.host, "console login refused"));
            }
            Prompt::Login => {
                channel.send(format!("{}\n", target.user).as_bytes()).await?;
            }
            Prompt::Password => {
                let passwd = target.passwd.as_deref().unwrap_or_default();
                channel.send(format!("{passwd}\n").as_bytes()).await?;
            }
            Prompt::Shell => channel.send(b"cli\n").await?,
            Prompt::Cli => {
                channel.send(b"xml-mode netconf need-trailer\n").await?;
                info!(host = %target.host, "Console switched to NETCONF");
                return Ok(());
            }
        }
    }

    Err(Error::connection_failed(
        &target.host,
        "console login did not reach a CLI prompt",
    ))
}
