use crate::error::ConfigError;
use crate::notify::DEFAULT_NOTIFY_TIMEOUT;
use beacon_core::DEFAULT_ALERT_COOLDOWN;
use clap::ValueEnum;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const PORT_ENV: &str = "PORT";
pub const NOTIFIER_ENV: &str = "BEACON_NOTIFIER";
pub const SMTP_SERVER_ENV: &str = "BEACON_SMTP_SERVER";
pub const SMTP_USERNAME_ENV: &str = "BEACON_SMTP_USERNAME";
pub const SMTP_PASSWORD_ENV: &str = "BEACON_SMTP_PASSWORD";
pub const ALERT_FROM_ENV: &str = "BEACON_ALERT_FROM";
pub const ALERT_TO_ENV: &str = "BEACON_ALERT_TO";
pub const ALERT_COOLDOWN_ENV: &str = "BEACON_ALERT_COOLDOWN_SECS";
pub const NOTIFY_TIMEOUT_ENV: &str = "BEACON_NOTIFY_TIMEOUT_MS";

pub const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com:25";
const DEFAULT_SMTP_USERNAME: &str = "email@domain.com";
const DEFAULT_SMTP_PASSWORD: &str = "password";
const DEFAULT_ALERT_FROM: &str = "recipient@destination.com";
const DEFAULT_ALERT_TO: &str = "sender@source.com";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum NotifierKind {
    /// Deliver alerts through an SMTP relay
    Smtp,
    /// Only write alerts to the log
    Log,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpSettings {
    /// Relay address as `host:port`.
    pub server: String,
    pub username: Option<String>,
    pub password: String,
    pub from: String,
    pub to: Vec<String>,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            server: DEFAULT_SMTP_SERVER.to_string(),
            username: Some(DEFAULT_SMTP_USERNAME.to_string()),
            password: DEFAULT_SMTP_PASSWORD.to_string(),
            from: DEFAULT_ALERT_FROM.to_string(),
            to: vec![DEFAULT_ALERT_TO.to_string()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_ip: IpAddr,
    pub port: u16,
    pub notifier: NotifierKind,
    pub smtp: SmtpSettings,
    pub alert_cooldown: Duration,
    pub notify_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            notifier: NotifierKind::Smtp,
            smtp: SmtpSettings::default(),
            alert_cooldown: DEFAULT_ALERT_COOLDOWN,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from `lookup`; unset and blank variables fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(raw) = get(PORT_ENV) {
            config.port = parse_port(PORT_ENV, &raw)?;
        }
        if let Some(raw) = get(NOTIFIER_ENV) {
            config.notifier = NotifierKind::from_str(&raw, true).map_err(|_| {
                ConfigError::InvalidNotifier {
                    var: NOTIFIER_ENV,
                    value: raw.clone(),
                }
            })?;
        }
        if let Some(server) = get(SMTP_SERVER_ENV) {
            config.smtp.server = server;
        }
        if let Some(username) = lookup(SMTP_USERNAME_ENV) {
            let username = username.trim().to_string();
            config.smtp.username = (!username.is_empty()).then_some(username);
        }
        if let Some(password) = lookup(SMTP_PASSWORD_ENV) {
            config.smtp.password = password;
        }
        if let Some(from) = get(ALERT_FROM_ENV) {
            config.smtp.from = from;
        }
        if let Some(raw) = get(ALERT_TO_ENV) {
            let to: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|addr| !addr.is_empty())
                .map(str::to_string)
                .collect();
            if to.is_empty() {
                return Err(ConfigError::EmptyRecipients { var: ALERT_TO_ENV });
            }
            config.smtp.to = to;
        }
        if let Some(raw) = get(ALERT_COOLDOWN_ENV) {
            config.alert_cooldown = Duration::from_secs(parse_positive(ALERT_COOLDOWN_ENV, &raw)?);
        }
        if let Some(raw) = get(NOTIFY_TIMEOUT_ENV) {
            config.notify_timeout = Duration::from_millis(parse_positive(NOTIFY_TIMEOUT_ENV, &raw)?);
        }

        Ok(config)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }
}

fn parse_port(var: &'static str, raw: &str) -> Result<u16, ConfigError> {
    raw.parse::<u16>()
        .ok()
        .filter(|port| *port > 0)
        .ok_or_else(|| ConfigError::InvalidPort {
            var,
            value: raw.to_string(),
        })
}

fn parse_positive(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ConfigError::InvalidNumber {
            var,
            value: raw.to_string(),
        })
}
