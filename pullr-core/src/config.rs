use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

pub const DEFAULT_CLIENTS: usize = 1;
pub const DEFAULT_RECV_LENGTH: u64 = 8 * 1024 * 1024;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Values read from a JSON config file. All keys are optional; unknown keys
/// make the whole file invalid (the caller prints a notice and passes `None`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub clients: Option<u64>,
    pub recvlen: Option<u64>,
    pub interval: Option<u64>,
    pub urls: Vec<String>,
    pub timeout: Option<u64>,
    pub detail: Option<bool>,
}

/// Values taken from command-line flags. Flags override file values; the URL
/// lists from both sources are combined.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub clients: Option<u64>,
    pub recvlen: Option<u64>,
    pub interval: Option<u64>,
    pub urls: Option<String>,
    pub timeout: Option<u64>,
    pub detail: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no target urls configured")]
    NoUrls,
}

/// One validated download target: the raw token (used as the result key and
/// CSV file name) plus its parsed form.
#[derive(Debug, Clone)]
pub struct Target {
    raw: Arc<str>,
    url: Url,
}

impl Target {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn raw(&self) -> Arc<str> {
        self.raw.clone()
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Read-only run configuration consumed by the arena.
#[derive(Debug, Clone)]
pub struct Config {
    clients: usize,
    recv_len: u64,
    interval: Duration,
    timeout: Duration,
    detail: bool,
    targets: Arc<[Target]>,
}

impl Config {
    pub fn resolve(file: Option<FileConfig>, cli: Overrides) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();

        let mut tokens: Vec<String> = file.urls;
        if let Some(list) = &cli.urls {
            tokens.extend(split_url_list(list));
        }

        let targets: Vec<Target> = tokens
            .iter()
            .filter_map(|token| match Url::parse(token) {
                Ok(url) if url.scheme() == "http" && url.host().is_some() => Some(Target {
                    raw: Arc::from(token.as_str()),
                    url,
                }),
                _ => {
                    eprintln!("ignoring non-http url: {token}");
                    None
                }
            })
            .collect();

        if targets.is_empty() {
            return Err(ConfigError::NoUrls);
        }

        let clients = cli.clients.or(file.clients).unwrap_or(DEFAULT_CLIENTS as u64);
        let recv_len = cli.recvlen.or(file.recvlen).unwrap_or(DEFAULT_RECV_LENGTH);
        let interval_us = cli.interval.or(file.interval).unwrap_or(0);
        let timeout_s = cli
            .timeout
            .or(file.timeout)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let detail = cli.detail || file.detail.unwrap_or(false);

        Ok(Self {
            clients: clients as usize,
            recv_len,
            interval: Duration::from_micros(interval_us),
            timeout: Duration::from_secs(timeout_s),
            detail,
            targets: targets.into(),
        })
    }

    #[must_use]
    pub fn clients(&self) -> usize {
        self.clients
    }

    #[must_use]
    pub fn max_recv_length(&self) -> u64 {
        self.recv_len
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn detailed(&self) -> bool {
        self.detail
    }

    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Cursor that cycles through the URL list indefinitely, yielding the
    /// list index alongside the target.
    #[must_use]
    pub fn cursor(&self) -> UrlCursor {
        UrlCursor {
            targets: self.targets.clone(),
            next: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UrlCursor {
    targets: Arc<[Target]>,
    next: usize,
}

impl UrlCursor {
    pub fn next_target(&mut self) -> (usize, Target) {
        let slot = self.next % self.targets.len();
        self.next = self.next.wrapping_add(1);
        (slot, self.targets[slot].clone())
    }
}

/// Split a `--urls` value on commas and whitespace, dropping empty tokens.
#[must_use]
pub fn split_url_list(list: &str) -> Vec<String> {
    list.split([',', ' ', '\n', '\t'])
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_drops_empty_tokens_across_separators() {
        let tokens = split_url_list("http://a/x,, http://b/y\nhttp://c/z\t");
        assert_eq!(tokens, ["http://a/x", "http://b/y", "http://c/z"]);
        assert!(split_url_list("").is_empty());
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = Config::resolve(
            None,
            Overrides {
                urls: Some("http://example.com/file".to_string()),
                ..Overrides::default()
            },
        )
        .unwrap();

        assert_eq!(cfg.clients(), DEFAULT_CLIENTS);
        assert_eq!(cfg.max_recv_length(), DEFAULT_RECV_LENGTH);
        assert_eq!(cfg.interval(), Duration::ZERO);
        assert_eq!(cfg.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(!cfg.detailed());
    }

    #[test]
    fn flags_override_file_values_and_url_lists_combine() {
        let file = FileConfig {
            clients: Some(8),
            recvlen: Some(1024),
            interval: Some(500),
            urls: vec!["http://file.example/a".to_string()],
            timeout: Some(3),
            detail: Some(true),
        };
        let cli = Overrides {
            clients: Some(2),
            urls: Some("http://cli.example/b".to_string()),
            ..Overrides::default()
        };

        let cfg = Config::resolve(Some(file), cli).unwrap();

        assert_eq!(cfg.clients(), 2);
        assert_eq!(cfg.max_recv_length(), 1024);
        assert_eq!(cfg.interval(), Duration::from_micros(500));
        assert_eq!(cfg.timeout(), Duration::from_secs(3));
        assert!(cfg.detailed());

        let raw: Vec<&str> = cfg.targets().iter().map(Target::as_str).collect();
        assert_eq!(raw, ["http://file.example/a", "http://cli.example/b"]);
    }

    #[test]
    fn non_http_tokens_are_dropped() {
        let cfg = Config::resolve(
            None,
            Overrides {
                urls: Some("https://secure.example/x rtmp://live/x not-a-url http://ok/x".into()),
                ..Overrides::default()
            },
        )
        .unwrap();

        assert_eq!(cfg.targets().len(), 1);
        assert_eq!(cfg.targets()[0].as_str(), "http://ok/x");
    }

    #[test]
    fn no_usable_urls_is_fatal() {
        assert!(matches!(
            Config::resolve(None, Overrides::default()),
            Err(ConfigError::NoUrls)
        ));
        assert!(matches!(
            Config::resolve(
                None,
                Overrides {
                    urls: Some("ftp://nope/a".to_string()),
                    ..Overrides::default()
                }
            ),
            Err(ConfigError::NoUrls)
        ));
    }

    #[test]
    fn cursor_cycles_the_url_list() {
        let cfg = Config::resolve(
            None,
            Overrides {
                urls: Some("http://a/1,http://b/2".to_string()),
                ..Overrides::default()
            },
        )
        .unwrap();

        let mut cursor = cfg.cursor();
        let picks: Vec<usize> = (0..5).map(|_| cursor.next_target().0).collect();
        assert_eq!(picks, [0, 1, 0, 1, 0]);
    }

    #[test]
    fn file_config_rejects_unknown_keys() {
        let err = serde_json::from_str::<FileConfig>(r#"{"clients": 2, "bogus": 1}"#);
        assert!(err.is_err());

        let ok: FileConfig =
            serde_json::from_str(r#"{"clients": 2, "urls": ["http://a/x"], "detail": true}"#)
                .unwrap();
        assert_eq!(ok.clients, Some(2));
        assert_eq!(ok.urls, ["http://a/x"]);
        assert_eq!(ok.detail, Some(true));
    }
}
