use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use dirs::config_dir;
use log::LevelFilter;
use reqwest::Url;
use serde::Deserialize;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:9091";
pub const DEFAULT_PORT: u16 = 9091;
const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerCredentials,
    pub client: ClientOptions,
    pub notifications: Vec<NotificationStyle>,
    pub inline_button: bool,
    pub log_level: LevelFilter,
}

/// Where the daemon lives and how to authenticate. Passed to every client
/// operation; the client never keeps a copy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerCredentials {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl ServerCredentials {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub verify_ssl: bool,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            verify_ssl: true,
            user_agent: concat!("transmission-send/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStyle {
    /// Short `OK` / `!` marker.
    Badge,
    /// Full message.
    Notification,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Send magnet links, info-hashes and .torrent links to a Transmission daemon",
    long_about = None
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub url: Option<String>,
    #[arg(long, global = true)]
    pub username: Option<String>,
    #[arg(long, global = true)]
    pub password: Option<String>,
    /// Overall RPC timeout in seconds.
    #[arg(long, global = true)]
    pub timeout: Option<f64>,
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub insecure: bool,
    #[arg(long = "notify", global = true, value_enum)]
    pub notify: Vec<NotificationStyle>,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a link (magnet, info-hash or .torrent URL).
    Add {
        text: String,
        /// Treat the input as selected text: only magnet links and
        /// info-hashes are accepted.
        #[arg(long, action = ArgAction::SetTrue)]
        selection: bool,
    },
    /// Check that the daemon is reachable and report its version.
    Test,
    /// Classify a single string without contacting the daemon.
    Parse { text: String },
    /// List torrent references found in a file, or stdin when omitted.
    Scan {
        file: Option<PathBuf>,
        /// Add every reference found.
        #[arg(long, action = ArgAction::SetTrue)]
        add: bool,
        /// Echo the input with each match wrapped in brackets.
        #[arg(long, action = ArgAction::SetTrue, conflicts_with = "add")]
        annotate: bool,
    },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    server: Option<FileServerConfig>,
    notifications: Option<Vec<NotificationStyle>>,
    inline_button: Option<bool>,
    log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileServerConfig {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<f64>,
    verify_ssl: Option<bool>,
    user_agent: Option<String>,
}

pub fn build_config(cli: &Cli) -> Result<AppConfig> {
    build_config_with(cli, |name| env::var(name).ok())
}

/// Resolves settings with precedence flag > environment > file > default.
/// `lookup` reads environment variables.
pub fn build_config_with<F>(cli: &Cli, lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let file_path = cli
        .config
        .clone()
        .or_else(|| lookup("TRANSMISSION_SEND_CONFIG").map(PathBuf::from));
    let file_config = load_file_config(file_path.as_deref())?;
    let server_file = file_config.as_ref().and_then(|cfg| cfg.server.as_ref());

    let raw_url = cli
        .url
        .clone()
        .or_else(|| lookup("TRANSMISSION_URL"))
        .or_else(|| server_file.and_then(|cfg| cfg.url.clone()))
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    let url = normalize_server_url(&raw_url);
    if url.is_empty() {
        anyhow::bail!("server url must not be empty");
    }

    let username = cli
        .username
        .clone()
        .or_else(|| lookup("TRANSMISSION_USERNAME"))
        .or_else(|| server_file.and_then(|cfg| cfg.username.clone()))
        .unwrap_or_default()
        .trim()
        .to_string();

    let password = cli
        .password
        .clone()
        .or_else(|| lookup("TRANSMISSION_PASSWORD"))
        .or_else(|| server_file.and_then(|cfg| cfg.password.clone()))
        .unwrap_or_default();

    let timeout_secs = cli
        .timeout
        .or_else(|| lookup("TRANSMISSION_TIMEOUT").and_then(|value| value.parse().ok()))
        .or_else(|| server_file.and_then(|cfg| cfg.timeout))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    if !(timeout_secs > 0.0 && timeout_secs.is_finite()) {
        anyhow::bail!("timeout must be positive");
    }

    let mut verify_ssl = server_file.and_then(|cfg| cfg.verify_ssl).unwrap_or(true);
    if let Some(value) = lookup("TRANSMISSION_VERIFY_SSL").and_then(|v| parse_bool(&v)) {
        verify_ssl = value;
    }
    if cli.insecure {
        verify_ssl = false;
    }

    let user_agent = lookup("TRANSMISSION_USER_AGENT")
        .or_else(|| server_file.and_then(|cfg| cfg.user_agent.clone()))
        .unwrap_or_else(|| ClientOptions::default().user_agent);

    let notifications = if !cli.notify.is_empty() {
        cli.notify.clone()
    } else if let Some(value) = lookup("TRANSMISSION_NOTIFY") {
        value
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                <NotificationStyle as ValueEnum>::from_str(part.trim(), true)
                    .map_err(|_| anyhow::anyhow!("unknown notification style {:?}", part.trim()))
            })
            .collect::<Result<Vec<_>>>()
            .context("invalid TRANSMISSION_NOTIFY")?
    } else {
        file_config
            .as_ref()
            .and_then(|cfg| cfg.notifications.clone())
            .unwrap_or_else(|| vec![NotificationStyle::Badge, NotificationStyle::Notification])
    };

    let inline_button = lookup("TRANSMISSION_INLINE_BUTTON")
        .and_then(|value| parse_bool(&value))
        .or_else(|| file_config.as_ref().and_then(|cfg| cfg.inline_button))
        .unwrap_or(true);

    let log_level_str = cli
        .log_level
        .clone()
        .or_else(|| lookup("TRANSMISSION_LOG_LEVEL"))
        .or_else(|| file_config.as_ref().and_then(|cfg| cfg.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let log_level = LevelFilter::from_str(&log_level_str).unwrap_or(LevelFilter::Info);

    Ok(AppConfig {
        server: ServerCredentials {
            url,
            username,
            password,
        },
        client: ClientOptions {
            timeout: Duration::from_secs_f64(timeout_secs),
            verify_ssl,
            user_agent,
        },
        notifications,
        inline_button,
        log_level,
    })
}

/// Cleans up a user-entered server address: adds `http://` when no scheme
/// is given, the default RPC port when none is given, and drops a trailing
/// slash. Input that still does not parse is returned trimmed.
pub fn normalize_server_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    match Url::parse(&with_scheme) {
        Ok(mut url) => {
            if url.port().is_none() && url.set_port(Some(DEFAULT_PORT)).is_err() {
                return with_scheme;
            }
            let rendered = url.to_string();
            rendered
                .strip_suffix('/')
                .map(str::to_string)
                .unwrap_or(rendered)
        }
        Err(_) => with_scheme,
    }
}

fn load_file_config(path: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = path {
        return read_file_config(path);
    }

    if let Some(dir) = config_dir() {
        let path = dir.join("transmission-send").join("config.toml");
        return read_file_config(&path);
    }

    Ok(None)
}

fn read_file_config(path: &Path) -> Result<Option<FileConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let parsed: FileConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(Some(parsed))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, io::Write};

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["transmission-send"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn normalizes_server_urls() {
        assert_eq!(normalize_server_url("nas.local"), "http://nas.local:9091");
        assert_eq!(
            normalize_server_url(" https://nas.local/transmission/ "),
            "https://nas.local:9091/transmission"
        );
        assert_eq!(
            normalize_server_url("http://10.0.0.2:8080/"),
            "http://10.0.0.2:8080"
        );
        assert_eq!(
            normalize_server_url("192.168.0.201:9091"),
            "http://192.168.0.201:9091"
        );
        assert_eq!(normalize_server_url("   "), "");
    }

    #[test]
    fn defaults_without_file_or_env() {
        let missing = tempfile::tempdir().unwrap().path().join("absent.toml");
        let args = cli(&["--config", missing.to_str().unwrap(), "test"]);
        let config = build_config_with(&args, no_env).unwrap();
        assert_eq!(config.server.url, DEFAULT_SERVER_URL);
        assert!(!config.server.has_credentials());
        assert_eq!(config.client.timeout, Duration::from_secs(10));
        assert!(config.client.verify_ssl);
        assert_eq!(
            config.notifications,
            vec![NotificationStyle::Badge, NotificationStyle::Notification]
        );
        assert_eq!(config.log_level, LevelFilter::Info);
        assert!(config.inline_button);
    }

    #[test]
    fn file_values_are_overridden_by_env_and_flags() {
        let file = write_config(
            r#"
log_level = "debug"
notifications = ["badge"]

[server]
url = "nas.local"
username = "alice"
password = "secret"
timeout = 5.0
verify_ssl = false
"#,
        );
        let path = file.path().to_str().unwrap().to_string();

        let args = cli(&["--config", &path, "test"]);
        let config = build_config_with(&args, no_env).unwrap();
        assert_eq!(config.server.url, "http://nas.local:9091");
        assert_eq!(config.server.username, "alice");
        assert_eq!(config.server.password, "secret");
        assert_eq!(config.client.timeout, Duration::from_secs(5));
        assert!(!config.client.verify_ssl);
        assert_eq!(config.notifications, vec![NotificationStyle::Badge]);
        assert_eq!(config.log_level, LevelFilter::Debug);

        let env: HashMap<&str, &str> = HashMap::from([
            ("TRANSMISSION_URL", "https://seedbox.example:8443/"),
            ("TRANSMISSION_USERNAME", "bob"),
            ("TRANSMISSION_NOTIFY", "notification"),
        ]);
        let lookup = |name: &str| env.get(name).map(|v| v.to_string());
        let config = build_config_with(&args, lookup).unwrap();
        assert_eq!(config.server.url, "https://seedbox.example:8443");
        assert_eq!(config.server.username, "bob");
        assert_eq!(config.notifications, vec![NotificationStyle::Notification]);

        let args = cli(&[
            "--config",
            &path,
            "--url",
            "http://other:1234",
            "--timeout",
            "2.5",
            "--notify",
            "badge",
            "test",
        ]);
        let config = build_config_with(&args, lookup).unwrap();
        assert_eq!(config.server.url, "http://other:1234");
        assert_eq!(config.client.timeout, Duration::from_millis(2500));
        assert_eq!(config.notifications, vec![NotificationStyle::Badge]);
    }

    #[test]
    fn rejects_non_positive_timeout() {
        let missing = tempfile::tempdir().unwrap().path().join("absent.toml");
        let args = cli(&["--config", missing.to_str().unwrap(), "--timeout", "0", "test"]);
        assert!(build_config_with(&args, no_env).is_err());
    }

    #[test]
    fn reports_malformed_file() {
        let file = write_config("[server\nurl = ");
        let args = cli(&["--config", file.path().to_str().unwrap(), "test"]);
        let err = build_config_with(&args, no_env).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config file"));
    }

    #[test]
    fn rejects_unknown_notification_style() {
        let missing = tempfile::tempdir().unwrap().path().join("absent.toml");
        let args = cli(&["--config", missing.to_str().unwrap(), "test"]);
        let lookup = |name: &str| (name == "TRANSMISSION_NOTIFY").then(|| "toast".to_string());
        assert!(build_config_with(&args, lookup).is_err());
    }

    #[test]
    fn notification_styles_from_env_ignore_case_and_spacing() {
        let missing = tempfile::tempdir().unwrap().path().join("absent.toml");
        let args = cli(&["--config", missing.to_str().unwrap(), "test"]);
        let lookup = |name: &str| {
            (name == "TRANSMISSION_NOTIFY").then(|| " Badge , NOTIFICATION,".to_string())
        };
        let config = build_config_with(&args, lookup).unwrap();
        assert_eq!(
            config.notifications,
            vec![NotificationStyle::Badge, NotificationStyle::Notification]
        );
    }

    #[test]
    fn inline_button_can_be_switched_off() {
        let file = write_config("inline_button = false\n");
        let args = cli(&["--config", file.path().to_str().unwrap(), "test"]);
        assert!(!build_config_with(&args, no_env).unwrap().inline_button);

        let lookup = |name: &str| (name == "TRANSMISSION_INLINE_BUTTON").then(|| "on".to_string());
        assert!(build_config_with(&args, lookup).unwrap().inline_button);
    }
}
