//! Browser location and URL-fragment parameters.
//!
//! Pathname and fragment are the only routing inputs. The query string is
//! parsed away and ignored.

use std::collections::BTreeMap;
use std::fmt;

/// The routing-relevant part of a URL: pathname plus fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Always starts with `/`.
    pub pathname: String,
    /// Text after `#`, without the `#`. Empty when absent.
    pub fragment: String,
}

impl Location {
    /// Build a location from a pathname and a fragment (with or without `#`).
    #[must_use]
    pub fn new(pathname: &str, fragment: &str) -> Self {
        Self {
            pathname: normalize_path(pathname),
            fragment: fragment.strip_prefix('#').unwrap_or(fragment).to_owned(),
        }
    }

    /// Parse `"/path?query#fragment"`, or a full `scheme://host/path` URL.
    ///
    /// Anything before the path (scheme and authority) and the query string
    /// are dropped.
    #[must_use]
    pub fn parse(url: &str) -> Self {
        let (before_hash, fragment) = url.split_once('#').unwrap_or((url, ""));
        let without_query = before_hash.split_once('?').map_or(before_hash, |(p, _)| p);

        let path = match without_query.split_once("://") {
            Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
            None => without_query,
        };

        Self::new(path, fragment)
    }

    /// Parse the fragment into key-value parameters.
    #[must_use]
    pub fn params(&self) -> FragmentParams {
        FragmentParams::parse(&self.fragment)
    }

    /// Whether a fragment is present.
    #[must_use]
    pub fn has_fragment(&self) -> bool {
        !self.fragment.is_empty()
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new("/", "")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fragment.is_empty() {
            f.write_str(&self.pathname)
        } else {
            write!(f, "{}#{}", self.pathname, self.fragment)
        }
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_owned()
    } else if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}

/// Key-value pairs decoded from a URL fragment such as
/// `access_token=abc&type=signup`.
///
/// Rebuilt for every navigation and never persisted. When a key repeats, the
/// last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentParams(BTreeMap<String, String>);

impl FragmentParams {
    /// Decode a fragment (leading `#` optional).
    ///
    /// Pairs without `=` become keys with an empty value. Values are
    /// percent-decoded and `+` is read as a space; a value that is not valid
    /// percent-encoding is kept verbatim.
    #[must_use]
    pub fn parse(fragment: &str) -> Self {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        let params = fragment
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(k), decode(v))
            })
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self(params)
    }

    /// Look up a parameter. Empty values count as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Whether no parameters were decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
