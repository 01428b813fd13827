use crate::config::SmtpSettings;
use crate::error::NotifyError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::rustls::{self, pki_types::ServerName, ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

const MAX_REPLY_LINE_BYTES: u64 = 4096;
const MAX_REPLY_LINES: usize = 64;
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);
pub const ALERT_SUBJECT: &str = "Beacon alert: required parameters missing";

/// Outbound channel for alert reports.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, report: &str) -> Result<(), NotifyError>;
}

/// Runs `notifier` with an upper bound on how long delivery may take.
pub async fn dispatch(
    notifier: &dyn Notifier,
    report: &str,
    timeout: Duration,
) -> Result<(), NotifyError> {
    tokio::time::timeout(timeout, notifier.notify(report))
        .await
        .map_err(|_| NotifyError::Timeout(timeout))?
}

/// Writes alerts to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, report: &str) -> Result<(), NotifyError> {
        log::warn!("{ALERT_SUBJECT}:{report}");
        Ok(())
    }
}

/// SMTP delivery to a fixed relay.
///
/// The session is upgraded with `STARTTLS` whenever the relay offers it. Credentials are only
/// sent when the relay advertises `AUTH`, and only over TLS or to a loopback relay.
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    settings: SmtpSettings,
    hello_name: String,
}

impl SmtpNotifier {
    pub fn new(settings: SmtpSettings) -> Self {
        Self {
            settings,
            hello_name: "localhost".to_string(),
        }
    }

    pub fn settings(&self) -> &SmtpSettings {
        &self.settings
    }

    async fn deliver(&self, report: &str) -> Result<(), NotifyError> {
        let host = relay_host(&self.settings.server);
        let stream = TcpStream::connect(&self.settings.server).await?;
        let mut session = SmtpSession::new(stream);

        session.expect("greeting").await?;
        let ehlo = session.command(&self.ehlo(), "EHLO").await?;

        if ehlo.has_extension("STARTTLS") {
            session.command("STARTTLS", "STARTTLS").await?;
            let stream = session.into_inner()?;
            let stream = tls_connector()?
                .connect(server_name(host)?, stream)
                .await?;
            let mut session = SmtpSession::new(stream);
            let ehlo = session.command(&self.ehlo(), "EHLO").await?;
            return self.transfer(&mut session, &ehlo, true, report).await;
        }

        self.transfer(&mut session, &ehlo, is_loopback(host), report)
            .await
    }

    fn ehlo(&self) -> String {
        format!("EHLO {}", self.hello_name)
    }

    /// Everything after `EHLO`: optional `AUTH`, envelope, message, `QUIT`.
    async fn transfer<S>(
        &self,
        session: &mut SmtpSession<S>,
        ehlo: &Reply,
        may_authenticate: bool,
        report: &str,
    ) -> Result<(), NotifyError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if let Some(username) = &self.settings.username {
            if ehlo.has_extension("AUTH") {
                if !may_authenticate {
                    return Err(NotifyError::InsecureAuth(self.settings.server.clone()));
                }
                let token = BASE64.encode(format!("\0{username}\0{}", self.settings.password));
                session
                    .command(&format!("AUTH PLAIN {token}"), "AUTH")
                    .await?;
            }
        }

        session
            .command(&format!("MAIL FROM:<{}>", self.settings.from), "MAIL FROM")
            .await?;
        for rcpt in &self.settings.to {
            session
                .command(&format!("RCPT TO:<{rcpt}>"), "RCPT TO")
                .await?;
        }
        session.command("DATA", "DATA").await?;
        session.send_raw(&self.message(report)).await?;
        session.expect("message body").await?;

        // The message is accepted at this point; a failed QUIT changes nothing.
        if let Err(err) = session.command("QUIT", "QUIT").await {
            log::debug!("SMTP QUIT failed: {err}");
        }
        Ok(())
    }

    fn message(&self, report: &str) -> String {
        let mut msg = String::new();
        msg.push_str(&format!("From: <{}>\r\n", self.settings.from));
        msg.push_str(&format!(
            "To: {}\r\n",
            self.settings
                .to
                .iter()
                .map(|a| format!("<{a}>"))
                .collect::<Vec<_>>()
                .join(", ")
        ));
        msg.push_str(&format!("Subject: {ALERT_SUBJECT}\r\n"));
        msg.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
        msg.push_str(&dot_stuff(report));
        msg.push_str(".\r\n");
        msg
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn notify(&self, report: &str) -> Result<(), NotifyError> {
        self.deliver(report).await
    }
}

struct SmtpSession<S> {
    stream: BufReader<S>,
}

struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    /// Matches the first word of any reply line, so `"AUTH PLAIN LOGIN"` has `AUTH`.
    fn has_extension(&self, name: &str) -> bool {
        self.lines.iter().any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|word| word.eq_ignore_ascii_case(name))
        })
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> SmtpSession<S> {
    fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Hands the raw stream back for the TLS handshake.
    fn into_inner(self) -> Result<S, NotifyError> {
        if !self.stream.buffer().is_empty() {
            return Err(NotifyError::Protocol(
                "relay sent data before the TLS handshake".to_string(),
            ));
        }
        Ok(self.stream.into_inner())
    }

    async fn command(&mut self, line: &str, stage: &'static str) -> Result<Reply, NotifyError> {
        self.send_raw(&format!("{line}\r\n")).await?;
        self.expect(stage).await
    }

    async fn send_raw(&mut self, data: &str) -> Result<(), NotifyError> {
        self.stream.write_all(data.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn expect(&mut self, stage: &'static str) -> Result<Reply, NotifyError> {
        let reply = self.read_reply().await?;
        if reply.code >= 400 {
            return Err(NotifyError::Rejected {
                stage,
                code: reply.code,
                message: reply.lines.join(" "),
            });
        }
        Ok(reply)
    }

    async fn read_reply(&mut self) -> Result<Reply, NotifyError> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let n = (&mut self.stream)
                .take(MAX_REPLY_LINE_BYTES)
                .read_line(&mut line)
                .await?;
            if n == 0 {
                return Err(NotifyError::Protocol(
                    "connection closed while waiting for reply".to_string(),
                ));
            }
            if !line.ends_with('\n') {
                return Err(NotifyError::Protocol(format!(
                    "reply line exceeds {MAX_REPLY_LINE_BYTES} bytes"
                )));
            }
            let line = line.trim_end_matches(['\r', '\n']);
            let code = line
                .get(..3)
                .and_then(|c| c.parse::<u16>().ok())
                .ok_or_else(|| NotifyError::Protocol(format!("malformed reply: {line:?}")))?;
            let more = line.as_bytes().get(3) == Some(&b'-');
            lines.push(line.get(4..).unwrap_or_default().to_string());

            if !more {
                return Ok(Reply { code, lines });
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(NotifyError::Protocol(format!(
                    "reply exceeds {MAX_REPLY_LINES} lines"
                )));
            }
        }
    }
}

fn tls_connector() -> Result<TlsConnector, NotifyError> {
    let roots = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|err| NotifyError::Tls(err.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

fn server_name(host: &str) -> Result<ServerName<'static>, NotifyError> {
    ServerName::try_from(host.to_string())
        .map_err(|_| NotifyError::Tls(format!("invalid relay host name {host:?}")))
}

/// `"smtp.example.com:587"` -> `"smtp.example.com"`, `"[::1]:25"` -> `"::1"`.
fn relay_host(server: &str) -> &str {
    let host = server.rsplit_once(':').map_or(server, |(host, _)| host);
    host.trim_start_matches('[').trim_end_matches(']')
}

fn is_loopback(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

/// CRLF line endings, with a leading `.` doubled on every line.
fn dot_stuff(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 16);
    for line in body.lines() {
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
        out.push_str("\r\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_stuffing_doubles_leading_dots_and_uses_crlf() {
        assert_eq!(dot_stuff("a\n.b\n..c"), "a\r\n..b\r\n...c\r\n");
        assert_eq!(dot_stuff(""), "");
    }

    #[test]
    fn message_carries_headers_and_terminator() {
        let notifier = SmtpNotifier::new(SmtpSettings {
            to: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            ..SmtpSettings::default()
        });
        let msg = notifier.message("\nline\n.");

        assert!(msg.starts_with("From: <recipient@destination.com>\r\n"));
        assert!(msg.contains("To: <a@example.com>, <b@example.com>\r\n"));
        assert!(msg.contains(&format!("Subject: {ALERT_SUBJECT}\r\n")));
        assert!(msg.ends_with("\r\n\r\nline\r\n..\r\n.\r\n"));
    }

    #[test]
    fn extensions_are_detected_in_ehlo_reply() {
        let reply = Reply {
            code: 250,
            lines: vec![
                "relay.local".to_string(),
                "auth PLAIN LOGIN".to_string(),
                "STARTTLS".to_string(),
            ],
        };
        assert!(reply.has_extension("AUTH"));
        assert!(reply.has_extension("STARTTLS"));
        let reply = Reply {
            code: 250,
            lines: vec!["relay.local".to_string(), "SIZE 1000".to_string()],
        };
        assert!(!reply.has_extension("AUTH"));
        assert!(!reply.has_extension("STARTTLS"));
    }

    #[test]
    fn relay_host_drops_port_and_brackets() {
        assert_eq!(relay_host("smtp.gmail.com:25"), "smtp.gmail.com");
        assert_eq!(relay_host("[::1]:2525"), "::1");
        assert_eq!(relay_host("relay.local"), "relay.local");
    }

    #[test]
    fn only_loopback_relays_are_trusted_without_tls() {
        assert!(is_loopback("localhost"));
        assert!(is_loopback("127.0.0.1"));
        assert!(is_loopback("::1"));
        assert!(!is_loopback("smtp.gmail.com"));
        assert!(!is_loopback("192.0.2.1"));
    }

    #[tokio::test]
    async fn credentials_are_never_sent_in_clear_to_remote_relays() {
        let notifier = SmtpNotifier::new(SmtpSettings {
            server: "smtp.example.com:25".to_string(),
            username: Some("user".to_string()),
            ..SmtpSettings::default()
        });
        let (client, mut relay) = tokio::io::duplex(1024);
        let mut session = SmtpSession::new(client);
        let ehlo = Reply {
            code: 250,
            lines: vec!["relay.example.com".to_string(), "AUTH PLAIN".to_string()],
        };

        let err = notifier
            .transfer(&mut session, &ehlo, false, "report\n")
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::InsecureAuth(_)), "{err}");

        drop(session);
        let mut written = Vec::new();
        relay.read_to_end(&mut written).await.unwrap();
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        LogNotifier.notify("report").await.unwrap();
        assert_eq!(LogNotifier.name(), "log");
    }
}
