//! Raw WHOIS (port 43) source adapter.
//!
//! The query is a single `domain\r\n` line. The reply is read until the server
//! closes the connection or a cap is hit. Connect, send and read together are
//! bounded by the adapter's own timeout, so a silent host leaves the rest of the
//! cascade its share of the deadline.

use crate::cascade::{AdapterOutcome, SourceAdapter};
use crate::error::VerifyError;
use crate::extract::{extract_date, extract_registrar};
use crate::protocols::registry::whois_host;
use crate::types::ResolutionResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Most bytes kept from one reply.
pub const MAX_REPLY_BYTES: usize = 10 * 1024;

/// Most `read` calls made on one connection.
pub const MAX_READS: usize = 50;

/// Default bound on one WHOIS query.
pub const DEFAULT_WHOIS_TIMEOUT: Duration = Duration::from_secs(5);

/// WHOIS client speaking the plain-text protocol directly.
pub struct WhoisAdapter {
    port: u16,
    timeout: Duration,
    servers: HashMap<String, String>,
}

impl WhoisAdapter {
    /// Create an adapter using `servers` as TLD → host overrides.
    pub fn new(port: u16, servers: HashMap<String, String>) -> Self {
        Self {
            port,
            timeout: DEFAULT_WHOIS_TIMEOUT,
            servers,
        }
    }

    /// Set the bound on connect, send and read for one query.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a query and return the (possibly truncated) reply text.
    pub async fn query(&self, host: &str, domain: &str) -> Result<String, VerifyError> {
        match tokio::time::timeout(self.timeout, self.exchange(host, domain)).await {
            Ok(result) => result,
            Err(_) => Err(VerifyError::timeout(
                format!("WHOIS query to {}", host),
                self.timeout,
            )),
        }
    }

    async fn exchange(&self, host: &str, domain: &str) -> Result<String, VerifyError> {
        debug!(host, port = self.port, domain, "WHOIS query");

        let mut stream = TcpStream::connect((host, self.port))
            .await
            .map_err(|e| VerifyError::upstream("whois", format!("Connect to {} failed: {}", host, e)))?;

        stream
            .write_all(format!("{}\r\n", domain).as_bytes())
            .await
            .map_err(|e| VerifyError::upstream("whois", format!("Send to {} failed: {}", host, e)))?;

        let reply = read_bounded(&mut stream, MAX_REPLY_BYTES, MAX_READS).await?;
        debug!(host, bytes = reply.len(), "WHOIS reply received");

        Ok(decode_reply(&reply))
    }
}

#[async_trait]
impl SourceAdapter for WhoisAdapter {
    fn name(&self) -> &str {
        "whois"
    }

    async fn attempt(&self, domain: &str, tld: &str) -> AdapterOutcome {
        let host = whois_host(tld, &self.servers);
        let text = match self.query(&host, domain).await {
            Ok(text) => text,
            Err(e) => return e.into(),
        };

        match extract_date(&text) {
            Some(date) => AdapterOutcome::Found(ResolutionResult::from_text_fields(
                "whois",
                date,
                extract_registrar(&text),
            )),
            None => VerifyError::parse(format!("whois: no creation date in reply from {}", host)).into(),
        }
    }
}

/// Read until EOF, `max_bytes` bytes, or `max_reads` reads, whichever comes first.
pub async fn read_bounded<R>(
    reader: &mut R,
    max_bytes: usize,
    max_reads: usize,
) -> Result<Vec<u8>, VerifyError>
where
    R: AsyncRead + Unpin,
{
    let mut reply = Vec::with_capacity(max_bytes.min(4096));
    let mut chunk = [0u8; 2048];

    for _ in 0..max_reads {
        let room = max_bytes - reply.len();
        if room == 0 {
            break;
        }
        let limit = room.min(chunk.len());
        let n = reader
            .read(&mut chunk[..limit])
            .await
            .map_err(|e| VerifyError::upstream("whois", format!("Read failed: {}", e)))?;
        if n == 0 {
            break;
        }
        reply.extend_from_slice(&chunk[..n]);
    }

    Ok(reply)
}

/// UTF-8 when valid, Latin-1 otherwise.
fn decode_reply(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(e) if e.error_len().is_none() => {
            // Cap cut a multi-byte character in half
            String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned()
        }
        Err(_) => bytes.iter().map(|&c| c as char).collect(),
    }
}
