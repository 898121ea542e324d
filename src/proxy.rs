//! Proxy representation, validation and per-proxy state.

use crate::error::InvalidProxy;

use std::fmt;
use url::Url;

/// Allocation state of a single proxy in a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// The proxy can be handed out.
    Available,
    /// The proxy is checked out by a worker.
    InUse,
}

/// Protocol spoken by a proxy endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyScheme {
    Http,
    Https,
    Socks4,
    Socks4a,
    Socks5,
    Socks5h,
}

impl ProxyScheme {
    /// Parse a scheme name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "socks4" => Some(Self::Socks4),
            "socks4a" => Some(Self::Socks4a),
            "socks5" => Some(Self::Socks5),
            "socks5h" => Some(Self::Socks5h),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Socks4 => "socks4",
            Self::Socks4a => "socks4a",
            Self::Socks5 => "socks5",
            Self::Socks5h => "socks5h",
        }
    }
}

/// Normalized identity of a relay, shared by every spelling of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    scheme: ProxyScheme,
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
}

/// A validated proxy endpoint of the form `scheme://[user:pass@]host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    /// The identifier exactly as supplied (trimmed), e.g. "socks5://127.0.0.1:1080".
    pub url: String,
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Proxy {
    /// Validate a candidate string against the proxy grammar.
    pub fn parse(candidate: &str) -> Result<Self, InvalidProxy> {
        let url = candidate.trim();

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| InvalidProxy::Malformed(url.to_string()))?;
        let scheme = ProxyScheme::from_name(scheme)
            .ok_or_else(|| InvalidProxy::UnsupportedScheme(scheme.to_string()))?;

        // Everything after the authority must be empty or a bare "/".
        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, trailing) = rest.split_at(authority_end);
        if !trailing.is_empty() && trailing != "/" {
            return Err(InvalidProxy::TrailingComponent(trailing.to_string()));
        }

        let host_port = match authority.rsplit_once('@') {
            Some((userinfo, host_port)) => {
                if userinfo.split(':').next().unwrap_or_default().is_empty() {
                    return Err(InvalidProxy::MissingUsername);
                }
                host_port
            }
            None => authority,
        };
        let (host, port) = match host_port.rsplit_once(':') {
            // "[::1]" alone splits inside the brackets
            Some((host, port)) if !port.ends_with(']') => (host, port),
            _ => return Err(InvalidProxy::MissingPort),
        };
        if host.is_empty() {
            return Err(InvalidProxy::MissingHost);
        }
        if port.is_empty() {
            return Err(InvalidProxy::MissingPort);
        }
        let port: u16 = port
            .parse()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| InvalidProxy::Malformed(url.to_string()))?;

        // Let the url crate vet host characters and userinfo escaping.
        let parsed = Url::parse(url).map_err(|e| InvalidProxy::Malformed(e.to_string()))?;
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(InvalidProxy::MissingHost)?
            .to_string();

        let username = Some(parsed.username())
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        let password = parsed.password().map(str::to_string);
        if username.is_none() && password.is_some() {
            return Err(InvalidProxy::MissingUsername);
        }

        Ok(Self {
            url: url.to_string(),
            scheme,
            host,
            port,
            username,
            password,
        })
    }

    /// Convert the proxy URL to a reqwest::Proxy.
    pub fn to_reqwest_proxy(&self) -> Result<reqwest::Proxy, reqwest::Error> {
        reqwest::Proxy::all(&self.url)
    }

    /// Key under which spellings such as `HTTP://a:01/` and `http://a:1` coincide.
    pub fn endpoint_key(&self) -> EndpointKey {
        EndpointKey {
            scheme: self.scheme,
            host: self.host.to_ascii_lowercase(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// Whether the endpoint carries credentials.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some()
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme.as_str())?;
        if let Some(user) = &self.username {
            match self.password {
                Some(_) => write!(f, "{}:***@", user)?,
                None => write!(f, "{}@", user)?,
            }
        }
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_http() {
        let proxy = Proxy::parse("http://a:1").unwrap();
        assert_eq!(proxy.scheme, ProxyScheme::Http);
        assert_eq!(proxy.host, "a");
        assert_eq!(proxy.port, 1);
        assert!(!proxy.has_credentials());
    }

    #[test]
    fn parses_socks5_with_credentials() {
        let proxy = Proxy::parse("socks5://u:p@b:2").unwrap();
        assert_eq!(proxy.scheme, ProxyScheme::Socks5);
        assert_eq!(proxy.host, "b");
        assert_eq!(proxy.port, 2);
        assert_eq!(proxy.username.as_deref(), Some("u"));
        assert_eq!(proxy.password.as_deref(), Some("p"));
        assert_eq!(proxy.to_string(), "socks5://u:***@b:2");
    }

    #[test]
    fn default_port_still_counts_as_explicit() {
        let proxy = Proxy::parse("http://10.0.0.1:80").unwrap();
        assert_eq!(proxy.port, 80);
        assert_eq!(proxy.url, "http://10.0.0.1:80");
    }

    #[test]
    fn accepts_uppercase_scheme_and_trailing_slash() {
        let proxy = Proxy::parse("  SOCKS4://host.example:1080/ ").unwrap();
        assert_eq!(proxy.scheme, ProxyScheme::Socks4);
        assert_eq!(proxy.url, "SOCKS4://host.example:1080/");
    }

    #[test]
    fn accepts_ipv6_host() {
        let proxy = Proxy::parse("http://[::1]:3128").unwrap();
        assert_eq!(proxy.port, 3128);
    }

    #[test]
    fn rejects_bad_candidates() {
        assert!(matches!(Proxy::parse("not-a-proxy"), Err(InvalidProxy::Malformed(_))));
        assert_eq!(
            Proxy::parse("ftp://a:21"),
            Err(InvalidProxy::UnsupportedScheme("ftp".to_string()))
        );
        assert_eq!(Proxy::parse("http://a"), Err(InvalidProxy::MissingPort));
        assert_eq!(Proxy::parse("http://a:"), Err(InvalidProxy::MissingPort));
        assert_eq!(Proxy::parse("http://[::1]"), Err(InvalidProxy::MissingPort));
        assert_eq!(Proxy::parse("http://:8080"), Err(InvalidProxy::MissingHost));
        assert!(matches!(Proxy::parse("http://a:port"), Err(InvalidProxy::Malformed(_))));
        assert!(matches!(Proxy::parse("http://a:0"), Err(InvalidProxy::Malformed(_))));
        assert!(matches!(Proxy::parse("http://a:70000"), Err(InvalidProxy::Malformed(_))));
        assert_eq!(
            Proxy::parse("http://a:1/path"),
            Err(InvalidProxy::TrailingComponent("/path".to_string()))
        );
        assert_eq!(Proxy::parse("http://:p@a:1"), Err(InvalidProxy::MissingUsername));
    }

    #[test]
    fn rejects_empty_userinfo() {
        assert_eq!(Proxy::parse("http://@a:1"), Err(InvalidProxy::MissingUsername));
        assert_eq!(Proxy::parse("socks5://:@b:2"), Err(InvalidProxy::MissingUsername));
        assert!(Proxy::parse("socks5://u@b:2").is_ok());
    }

    #[test]
    fn spellings_of_one_relay_share_a_key() {
        let key = Proxy::parse("http://a:1").unwrap().endpoint_key();
        for spelling in ["http://a:1/", "HTTP://a:1", "http://a:01", "http://A:1"] {
            assert_eq!(Proxy::parse(spelling).unwrap().endpoint_key(), key, "{}", spelling);
        }
        assert_ne!(Proxy::parse("https://a:1").unwrap().endpoint_key(), key);
        assert_ne!(Proxy::parse("http://u:p@a:1").unwrap().endpoint_key(), key);
    }
}
