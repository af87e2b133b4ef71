//! Server configuration.
//!
//! Every option can be given on the command line or through a `RESPKV_*`
//! environment variable; the command line wins.

use crate::protocol::limits::{
    DEFAULT_MAX_BUFFER_SIZE, DEFAULT_MAX_BULK_LEN, DEFAULT_MAX_MULTIBULK_LEN,
};
use crate::protocol::ProtocolLimits;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use tokio::sync::Semaphore;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "respkv",
    version,
    about = "An in-memory key-value server speaking the Redis protocol"
)]
pub struct Config {
    /// Host to bind to
    #[arg(long, env = "RESPKV_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "RESPKV_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum number of elements in one request
    #[arg(
        long,
        env = "RESPKV_MAX_MULTIBULK_LEN",
        default_value_t = DEFAULT_MAX_MULTIBULK_LEN,
        value_parser = parse_limit
    )]
    pub max_multibulk_len: usize,

    /// Maximum length in bytes of one request argument
    #[arg(
        long,
        env = "RESPKV_MAX_BULK_LEN",
        default_value_t = DEFAULT_MAX_BULK_LEN,
        value_parser = parse_limit
    )]
    pub max_bulk_len: usize,

    /// Maximum number of unread bytes buffered per connection
    #[arg(
        long,
        env = "RESPKV_MAX_BUFFER_SIZE",
        default_value_t = DEFAULT_MAX_BUFFER_SIZE,
        value_parser = parse_limit
    )]
    pub max_buffer_size: usize,

    /// Maximum number of simultaneous clients (unlimited if unset)
    #[arg(long, env = "RESPKV_MAX_CONNECTIONS", value_parser = parse_max_connections)]
    pub max_connections: Option<usize>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "RESPKV_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_multibulk_len: DEFAULT_MAX_MULTIBULK_LEN,
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            max_connections: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Returns the bind address as a string
    ///
    /// IPv6 literals are bracketed so the port stays separable.
    pub fn bind_address(&self) -> String {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => SocketAddr::from((ip, self.port)).to_string(),
            _ => format!("{}:{}", self.host, self.port),
        }
    }

    pub fn limits(&self) -> ProtocolLimits {
        ProtocolLimits {
            max_multibulk_len: self.max_multibulk_len,
            max_bulk_len: self.max_bulk_len,
            max_buffer_size: self.max_buffer_size,
        }
    }
}

fn parse_limit(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be greater than zero".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_max_connections(s: &str) -> Result<usize, String> {
    let max = parse_limit(s)?;
    if max > Semaphore::MAX_PERMITS {
        return Err(format!("must be at most {}", Semaphore::MAX_PERMITS));
    }
    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_default_impl() {
        let config = Config::try_parse_from(["respkv"]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_address(), "127.0.0.1:6379");
        assert_eq!(config.limits(), ProtocolLimits::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::try_parse_from([
            "respkv",
            "--host",
            "0.0.0.0",
            "-p",
            "7000",
            "--max-multibulk-len",
            "16",
            "--max-bulk-len",
            "512",
            "--max-buffer-size",
            "4096",
            "--max-connections",
            "10",
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:7000");
        assert_eq!(
            config.limits(),
            ProtocolLimits {
                max_multibulk_len: 16,
                max_bulk_len: 512,
                max_buffer_size: 4096,
            }
        );
        assert_eq!(config.max_connections, Some(10));
    }

    #[test]
    fn test_rejects_zero_limits() {
        assert!(Config::try_parse_from(["respkv", "--max-bulk-len", "0"]).is_err());
        assert!(Config::try_parse_from(["respkv", "--max-connections", "0"]).is_err());
        assert!(Config::try_parse_from(["respkv", "--port", "http"]).is_err());
    }

    #[test]
    fn test_rejects_connection_cap_above_permit_limit() {
        let too_many = (Semaphore::MAX_PERMITS + 1).to_string();
        assert!(Config::try_parse_from(["respkv", "--max-connections", too_many.as_str()]).is_err());

        let at_limit = Semaphore::MAX_PERMITS.to_string();
        let config =
            Config::try_parse_from(["respkv", "--max-connections", at_limit.as_str()]).unwrap();
        assert_eq!(config.max_connections, Some(Semaphore::MAX_PERMITS));
    }

    #[test]
    fn test_bind_address_brackets_ipv6() {
        let config = Config {
            host: "::1".to_string(),
            ..Config::default()
        };
        assert_eq!(config.bind_address(), "[::1]:6379");
        assert!(config.bind_address().parse::<SocketAddr>().is_ok());

        let config = Config {
            host: "localhost".to_string(),
            port: 7000,
            ..Config::default()
        };
        assert_eq!(config.bind_address(), "localhost:7000");
    }
}
