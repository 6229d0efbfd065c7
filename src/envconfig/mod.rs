use std::env;

use crate::server::DEFAULT_PORT;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_THREADS: i32 = 8;

pub struct Host {
    pub host: String,
    pub port: u16,
}

impl Host {
    pub fn from_env() -> Self {
        Self::parse(&env::var("LLM_HARNESS_HOST").unwrap_or_default())
    }

    fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            };
        }

        if let Some((host, port)) = raw.rsplit_once(':') {
            Self {
                host: host.to_string(),
                port: port.parse().unwrap_or(DEFAULT_PORT),
            }
        } else {
            Self {
                host: raw.to_string(),
                port: DEFAULT_PORT,
            }
        }
    }
}

pub fn n_threads() -> i32 {
    threads_from(env::var("LLM_HARNESS_THREADS").ok().as_deref())
}

fn threads_from(raw: Option<&str>) -> i32 {
    raw.and_then(|v| v.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_THREADS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        let host = Host::parse("");
        assert_eq!(host.host, "0.0.0.0");
        assert_eq!(host.port, 9001);
    }

    #[test]
    fn splits_host_and_port() {
        let host = Host::parse("127.0.0.1:8080");
        assert_eq!(host.host, "127.0.0.1");
        assert_eq!(host.port, 8080);
    }

    #[test]
    fn bare_host_keeps_default_port() {
        let host = Host::parse("localhost");
        assert_eq!(host.host, "localhost");
        assert_eq!(host.port, 9001);
    }

    #[test]
    fn malformed_port_falls_back() {
        let host = Host::parse("127.0.0.1:not-a-port");
        assert_eq!(host.port, 9001);
    }

    #[test]
    fn thread_count_parsing() {
        assert_eq!(threads_from(None), 8);
        assert_eq!(threads_from(Some("4")), 4);
        assert_eq!(threads_from(Some("0")), 8);
        assert_eq!(threads_from(Some("lots")), 8);
    }
}
