use lazy_static::lazy_static;
use regex::Regex;

use crate::config::RemotePattern;
use crate::error::ConfigError;
use crate::glob::GlobCache;

lazy_static! {
    static ref ABSOLUTE_URL: Regex = Regex::new(
        r"^(?P<protocol>[A-Za-z][A-Za-z0-9+.\-]*):\/\/(?:[^@/?#]*@)?(?P<hostname>[^:/?#]+)(?::(?P<port>\d*))?(?P<pathname>[^?#]*)(?P<search>\?[^#]*)?"
    )
    .expect("absolute url regex is valid");
}

/// The parts of an absolute URL that remote patterns constrain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteUrl {
    /// Scheme without the trailing colon.
    pub protocol: String,
    pub hostname: String,
    /// Empty when the URL carries no port or the scheme's default port.
    pub port: String,
    pub pathname: String,
    /// Query string including the leading `?`, empty when absent.
    pub search: String,
}

impl RemoteUrl {
    /// Splits an absolute `scheme://host[:port]/path?query` URL. Relative
    /// URLs and anything without an authority return `None`.
    pub fn parse(url: &str) -> Option<Self> {
        let caps = ABSOLUTE_URL.captures(url)?;
        let protocol = caps["protocol"].to_ascii_lowercase();
        let hostname = caps["hostname"].to_ascii_lowercase();

        let port = caps
            .name("port")
            .map(|m| m.as_str())
            .filter(|port| Some(*port) != default_port(&protocol))
            .unwrap_or_default()
            .to_string();

        let pathname = match caps.name("pathname").map(|m| m.as_str()) {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => "/".to_string(),
        };

        let search = caps
            .name("search")
            .map(|m| m.as_str())
            .filter(|s| *s != "?")
            .unwrap_or_default()
            .to_string();

        Some(Self {
            protocol,
            hostname,
            port,
            pathname,
            search,
        })
    }
}

fn default_port(protocol: &str) -> Option<&'static str> {
    match protocol {
        "http" => Some("80"),
        "https" => Some("443"),
        _ => None,
    }
}

/// Checks one remote pattern against a URL. Fails closed: every field the
/// pattern constrains has to match.
///
/// A pattern without a hostname is a setup bug and returns an error rather
/// than `false`.
pub fn match_remote_pattern(pattern: &RemotePattern, url: &RemoteUrl) -> Result<bool, ConfigError> {
    let hostname = pattern
        .hostname
        .as_deref()
        .ok_or_else(|| ConfigError::MissingHostname {
            pattern: pattern.describe(),
        })?;

    if let Some(protocol) = pattern.protocol {
        if protocol.as_str() != url.protocol {
            return Ok(false);
        }
    }

    if let Some(port) = &pattern.port {
        if *port != url.port {
            return Ok(false);
        }
    }

    let globs = GlobCache::global();
    if !globs.hostname(hostname)?.test(&url.hostname) {
        return Ok(false);
    }

    let pathname = pattern.pathname.as_deref().unwrap_or("**");
    Ok(globs.pathname(pathname)?.test(&url.pathname))
}

/// True if the URL's hostname is one of `domains` or any remote pattern
/// matches it.
pub fn has_match(
    domains: &[String],
    remote_patterns: &[RemotePattern],
    url: &RemoteUrl,
) -> Result<bool, ConfigError> {
    if domains.iter().any(|domain| *domain == url.hostname) {
        return Ok(true);
    }
    for pattern in remote_patterns {
        if match_remote_pattern(pattern, url)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// String-level entry point for callers gating optimization of an absolute
/// URL. Unparseable URLs are never allowed.
pub fn is_allowed(
    domains: &[String],
    remote_patterns: &[RemotePattern],
    url: &str,
) -> Result<bool, ConfigError> {
    match RemoteUrl::parse(url) {
        Some(url) => has_match(domains, remote_patterns, &url),
        None => Ok(false),
    }
}
