use std::env;
use std::path::PathBuf;

use eyre::{Result, eyre};
use url::Url;

pub const BASE_URL_ENV: &str = "ELENDUR_BASE_URL";
pub const DOWNLOAD_DIR_ENV: &str = "ELENDUR_DOWNLOAD_DIR";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";

/// Where the client talks to and where it saves downloaded documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: Url,
    pub download_dir: PathBuf,
}

impl Config {
    /// Resolves the configuration, preferring explicit flags over the environment.
    pub fn resolve(base_url: Option<String>, download_dir: Option<PathBuf>) -> Result<Self> {
        let raw_url = base_url
            .or_else(|| env::var(BASE_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let download_dir = download_dir
            .or_else(|| env::var(DOWNLOAD_DIR_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(default_download_dir);

        Ok(Self {
            base_url: parse_base_url(&raw_url)?,
            download_dir,
        })
    }
}

/// Parses a backend URL, adding a trailing slash so endpoints join beneath it.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };

    let url = Url::parse(&normalized).map_err(|e| eyre!("Invalid backend URL {}: {}", raw, e))?;
    if url.cannot_be_a_base() {
        return Err(eyre!("Backend URL {} cannot be used as a base", raw));
    }

    Ok(url)
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = parse_base_url("http://localhost:8000/elendur").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/elendur/");
    }

    #[test]
    fn base_url_rejects_garbage() {
        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("mailto:someone@example.com").is_err());
    }

    #[test]
    fn explicit_flags_win() {
        let config = Config::resolve(
            Some("http://example.test".to_string()),
            Some(PathBuf::from("/tmp/pdfs")),
        )
        .unwrap();

        assert_eq!(config.base_url.as_str(), "http://example.test/");
        assert_eq!(config.download_dir, PathBuf::from("/tmp/pdfs"));
    }
}
