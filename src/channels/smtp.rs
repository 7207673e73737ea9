//! Minimal SMTP client session with implicit TLS and STARTTLS

use super::error::SendError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

type Result<T> = std::result::Result<T, SendError>;

const BUFFER_SIZE: usize = 8192;
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Parsed SMTP reply, possibly multi-line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    pub fn message(&self) -> String {
        self.lines.join(" ")
    }

    /// Whether an EHLO reply advertises `keyword` (e.g. "STARTTLS")
    pub fn advertises(&self, keyword: &str) -> bool {
        self.lines.iter().any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|k| k.eq_ignore_ascii_case(keyword))
        })
    }

    /// Parse one complete reply from the front of `buffer`
    ///
    /// Returns the reply and the bytes consumed, or `None` if more data is needed.
    pub fn parse(buffer: &[u8]) -> Result<Option<(Self, usize)>> {
        let mut consumed = 0;
        let mut lines = Vec::new();
        let mut first_code = None;

        while let Some(end) = buffer[consumed..].iter().position(|&b| b == b'\n') {
            let raw = std::str::from_utf8(&buffer[consumed..consumed + end])?;
            consumed += end + 1;
            let line = raw.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let code: u16 = line
                .get(..3)
                .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|digits| digits.parse().ok())
                .ok_or_else(|| SendError::Protocol(format!("invalid reply code in '{line}'")))?;
            if let Some(expected) = first_code
                && expected != code
            {
                return Err(SendError::Protocol(format!(
                    "reply code changed mid-reply: {expected} then {code}"
                )));
            }
            first_code = Some(code);

            let is_last = match line.as_bytes().get(3) {
                None | Some(b' ') => true,
                Some(b'-') => false,
                Some(other) => {
                    return Err(SendError::Protocol(format!(
                        "invalid separator '{}' in reply",
                        *other as char
                    )));
                }
            };
            lines.push(line.get(4..).unwrap_or_default().to_string());

            if is_last {
                return Ok(Some((Self { code, lines }, consumed)));
            }
        }
        Ok(None)
    }
}

enum Connection {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl Connection {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Plain(stream) => stream.write_all(data).await?,
            Self::Tls(stream) => stream.write_all(data).await?,
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = match self {
            Self::Plain(stream) => stream.read(buf).await?,
            Self::Tls(stream) => stream.read(buf).await?,
        };
        if n == 0 {
            return Err(SendError::ConnectionClosed);
        }
        Ok(n)
    }

    async fn upgrade_to_tls(self, domain: &str, accept_invalid_certs: bool) -> Result<Self> {
        let Self::Plain(stream) = self else {
            return Err(SendError::Tls("connection is already TLS".to_string()));
        };

        let mut root_store = RootCertStore::empty();
        let certs = rustls_native_certs::load_native_certs();
        for cert in certs.certs {
            root_store
                .add(cert)
                .map_err(|e| SendError::Tls(format!("failed to add certificate: {e}")))?;
        }
        if !certs.errors.is_empty() {
            tracing::warn!(errors = ?certs.errors, "some native certificates could not be loaded");
        }

        let mut config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        if accept_invalid_certs {
            config
                .dangerous()
                .set_certificate_verifier(Arc::new(NoVerifier));
        }

        let connector = TlsConnector::from(Arc::new(config));
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|e| SendError::Tls(format!("invalid server name: {e}")))?;
        let stream = connector
            .connect(server_name, stream)
            .await
            .map_err(|e| SendError::Tls(e.to_string()))?;

        Ok(Self::Tls(Box::new(stream)))
    }
}

/// Accepts every certificate; only reachable through `accept_invalid_certs`
#[derive(Debug)]
struct NoVerifier;

impl tokio_rustls::rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &tokio_rustls::rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[tokio_rustls::rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: tokio_rustls::rustls::pki_types::UnixTime,
    ) -> std::result::Result<
        tokio_rustls::rustls::client::danger::ServerCertVerified,
        tokio_rustls::rustls::Error,
    > {
        Ok(tokio_rustls::rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &tokio_rustls::rustls::pki_types::CertificateDer<'_>,
        _dss: &tokio_rustls::rustls::DigitallySignedStruct,
    ) -> std::result::Result<
        tokio_rustls::rustls::client::danger::HandshakeSignatureValid,
        tokio_rustls::rustls::Error,
    > {
        Ok(tokio_rustls::rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &tokio_rustls::rustls::pki_types::CertificateDer<'_>,
        _dss: &tokio_rustls::rustls::DigitallySignedStruct,
    ) -> std::result::Result<
        tokio_rustls::rustls::client::danger::HandshakeSignatureValid,
        tokio_rustls::rustls::Error,
    > {
        Ok(tokio_rustls::rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<tokio_rustls::rustls::SignatureScheme> {
        vec![
            tokio_rustls::rustls::SignatureScheme::RSA_PKCS1_SHA256,
            tokio_rustls::rustls::SignatureScheme::RSA_PSS_SHA256,
            tokio_rustls::rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            tokio_rustls::rustls::SignatureScheme::ED25519,
        ]
    }
}

/// Connection parameters for one session
pub(crate) struct SessionParams<'a> {
    pub host: &'a str,
    pub port: u16,
    pub implicit_tls: bool,
    pub accept_invalid_certs: bool,
    pub helo_domain: &'a str,
    pub timeout: Duration,
}

/// One SMTP session: greeting, EHLO, optional TLS upgrade, then commands
pub(crate) struct SmtpSession {
    connection: Option<Connection>,
    buffer: Vec<u8>,
    buffer_pos: usize,
    timeout: Duration,
    capabilities: Reply,
}

impl SmtpSession {
    /// Connect, read the greeting and negotiate EHLO (upgrading via STARTTLS when offered)
    pub async fn open(params: SessionParams<'_>) -> Result<Self> {
        let addr = format!("{}:{}", params.host, params.port);
        let stream = tokio::time::timeout(params.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| SendError::Timeout("connect"))??;

        let mut connection = Connection::Plain(stream);
        if params.implicit_tls {
            connection = connection
                .upgrade_to_tls(params.host, params.accept_invalid_certs)
                .await?;
        }
        let is_tls = params.implicit_tls;

        let mut session = Self {
            connection: Some(connection),
            buffer: vec![0u8; BUFFER_SIZE],
            buffer_pos: 0,
            timeout: params.timeout,
            capabilities: Reply {
                code: 0,
                lines: Vec::new(),
            },
        };

        session.exchange("greeting", None, &[220]).await?;
        let ehlo = format!("EHLO {}", params.helo_domain);
        session.capabilities = session.exchange("EHLO", Some(&ehlo), &[250]).await?;

        if !is_tls && session.capabilities.advertises("STARTTLS") {
            session.exchange("STARTTLS", Some("STARTTLS"), &[220]).await?;
            let plain = session.connection.take().ok_or(SendError::ConnectionClosed)?;
            session.connection = Some(
                plain
                    .upgrade_to_tls(params.host, params.accept_invalid_certs)
                    .await?,
            );
            // replies buffered before the handshake are not trusted
            session.buffer_pos = 0;
            session.capabilities = session.exchange("EHLO", Some(&ehlo), &[250]).await?;
        }

        Ok(session)
    }

    /// AUTH PLAIN with the given credentials
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        let token = BASE64.encode(format!("\0{username}\0{password}"));
        self.exchange("AUTH", Some(&format!("AUTH PLAIN {token}")), &[235])
            .await?;
        Ok(())
    }

    /// MAIL FROM / RCPT TO / DATA for one recipient
    pub async fn send_mail(&mut self, from: &str, to: &str, message: &str) -> Result<()> {
        self.exchange("MAIL FROM", Some(&format!("MAIL FROM:<{from}>")), &[250])
            .await?;
        self.exchange("RCPT TO", Some(&format!("RCPT TO:<{to}>")), &[250, 251])
            .await?;
        self.exchange("DATA", Some("DATA"), &[354]).await?;

        let mut payload = dot_stuff(message);
        if !payload.ends_with("\r\n") {
            payload.push_str("\r\n");
        }
        payload.push_str(".\r\n");
        self.write(payload.as_bytes()).await?;
        self.exchange("message body", None, &[250]).await?;
        Ok(())
    }

    /// Send QUIT; the reply is not required
    pub async fn quit(mut self) {
        if let Err(e) = self.exchange("QUIT", Some("QUIT"), &[221]).await {
            tracing::debug!(error = %e, "QUIT not acknowledged");
        }
    }

    async fn exchange(&mut self, stage: &'static str, command: Option<&str>, codes: &[u16]) -> Result<Reply> {
        if let Some(command) = command {
            self.write(format!("{command}\r\n").as_bytes()).await?;
        }
        let reply = tokio::time::timeout(self.timeout, self.read_reply())
            .await
            .map_err(|_| SendError::Timeout(stage))??;
        if codes.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(SendError::Smtp {
                code: reply.code,
                message: reply.message(),
            })
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let connection = self.connection.as_mut().ok_or(SendError::ConnectionClosed)?;
        tokio::time::timeout(self.timeout, connection.send(data))
            .await
            .map_err(|_| SendError::Timeout("write"))?
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        loop {
            if let Some((reply, consumed)) = Reply::parse(&self.buffer[..self.buffer_pos])? {
                self.buffer.copy_within(consumed..self.buffer_pos, 0);
                self.buffer_pos -= consumed;
                return Ok(reply);
            }

            if self.buffer_pos >= self.buffer.len() {
                let new_size = self.buffer.len() * 2;
                if new_size > MAX_BUFFER_SIZE {
                    return Err(SendError::Protocol(format!(
                        "reply exceeds {MAX_BUFFER_SIZE} bytes"
                    )));
                }
                self.buffer.resize(new_size, 0);
            }

            let connection = self.connection.as_mut().ok_or(SendError::ConnectionClosed)?;
            let n = connection.read(&mut self.buffer[self.buffer_pos..]).await?;
            self.buffer_pos += n;
        }
    }
}

/// Double any leading '.' on a line so the body cannot end DATA early
pub(crate) fn dot_stuff(message: &str) -> String {
    let mut out = String::with_capacity(message.len() + 16);
    for (i, line) in message.split("\r\n").enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
    }
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_line_ehlo_reply() {
        let data = b"250-mail.example.com\r\n250-SIZE 10000000\r\n250 STARTTLS\r\n";
        let (reply, consumed) = Reply::parse(data).unwrap().unwrap();
        assert_eq!(reply.code, 250);
        assert_eq!(consumed, data.len());
        assert!(reply.advertises("starttls"));
        assert!(!reply.advertises("AUTH"));
    }

    #[test]
    fn incomplete_reply_needs_more_data() {
        assert!(Reply::parse(b"250-mail.example.com\r\n250-SI").unwrap().is_none());
        assert!(Reply::parse(b"").unwrap().is_none());
    }

    #[test]
    fn mismatched_codes_are_rejected() {
        assert!(Reply::parse(b"250-first\r\n550 second\r\n").is_err());
        assert!(Reply::parse(b"2x0 bad\r\n").is_err());
    }

    #[test]
    fn non_ascii_or_short_reply_code_is_a_protocol_error() {
        for data in ["1\u{20ac}\r\n", "25\u{e9} ok\r\n", "+25 ok\r\n", "25\r\n"] {
            let err = Reply::parse(data.as_bytes()).unwrap_err();
            assert!(matches!(err, SendError::Protocol(_)), "{data:?}: {err:?}");
        }
    }

    #[test]
    fn leaves_following_reply_in_buffer() {
        let data = b"220 ready\r\n250 ok\r\n";
        let (reply, consumed) = Reply::parse(data).unwrap().unwrap();
        assert_eq!(reply.lines, vec!["ready"]);
        assert_eq!(&data[consumed..], b"250 ok\r\n");
    }

    #[test]
    fn dot_stuffing_escapes_leading_dots_only() {
        assert_eq!(dot_stuff("a\r\n.b\r\nc.d\r\n."), "a\r\n..b\r\nc.d\r\n..");
        assert_eq!(dot_stuff(".start"), "..start");
    }
}
