//! Credential mapping.
//!
//! A [`CredentialSet`] is opaque name/value material supplied by the caller.
//! Process servers receive it as environment variables; remote servers
//! receive it as request headers, renamed by the rules in [`to_headers`].

/// Header produced for the exact credential name `AUTHORIZATION`.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Header produced for credential names ending in `_API_KEY`.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Ordered mapping from credential name to value.
///
/// Names are unique; inserting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    entries: Vec<(String, String)>,
}

impl CredentialSet {
    /// Create an empty credential set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a credential.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a credential by exact name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Credential names, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Iterate over name/value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of credentials.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CredentialSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for CredentialSet {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

/// Environment entries for a process server: every credential, unchanged.
pub fn to_env(credentials: &CredentialSet) -> Vec<(String, String)> {
    credentials
        .iter()
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .collect()
}

/// Request headers for a remote server.
///
/// Rules, first match wins:
/// 1. `AUTHORIZATION` (exact) becomes `Authorization`;
/// 2. a name ending in `_API_KEY` (any case) becomes `X-API-Key`;
/// 3. a name starting with `X-` (any case) is kept;
/// 4. any other name is kept.
///
/// Header names compare case-insensitively; on collision the later
/// credential's value wins, keeping the earlier header's position.
pub fn to_headers(credentials: &CredentialSet) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::with_capacity(credentials.len());
    for (name, value) in credentials.iter() {
        let header = header_name(name);
        match headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&header))
        {
            Some(slot) => {
                tracing::debug!(
                    credential = %name,
                    header = %slot.0,
                    "credential overrides an earlier header"
                );
                slot.1 = value.to_string();
            }
            None => headers.push((header, value.to_string())),
        }
    }
    headers
}

/// Header name for one credential name.
pub fn header_name(credential: &str) -> String {
    if credential == "AUTHORIZATION" {
        AUTHORIZATION_HEADER.to_string()
    } else if ends_with_ignore_case(credential, "_API_KEY") {
        API_KEY_HEADER.to_string()
    } else {
        // Rules 3 and 4 both pass the name through.
        credential.to_string()
    }
}

fn ends_with_ignore_case(s: &str, suffix: &str) -> bool {
    s.len() >= suffix.len()
        && s.as_bytes()[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix.as_bytes())
}
