//! Gateway address construction
//!
//! The gateway authenticates on the handshake URL: either `token=<credential>`
//! or `anonymous=true` is appended, never both.

use url::Url;

use crate::error::ClientError;

/// How to identify to the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectAs {
    /// Bearer credential, sent as `token`
    Authenticated(String),
    /// Guest mode, sent as `anonymous=true`
    Guest,
    /// No query parameters
    Anonymous,
}

impl ConnectAs {
    /// Pick the identity from an optional credential and a guest flag
    ///
    /// Guest mode wins over a credential. Empty credentials count as absent.
    pub fn from_parts(token: Option<String>, is_guest: bool) -> Self {
        if is_guest {
            return ConnectAs::Guest;
        }
        match token {
            Some(token) if !token.is_empty() => ConnectAs::Authenticated(token),
            _ => ConnectAs::Anonymous,
        }
    }
}

/// Build the handshake URL for `endpoint` and identity `who`
///
/// Any query string already on `endpoint` is replaced.
pub fn build_endpoint(endpoint: &str, who: &ConnectAs) -> Result<Url, ClientError> {
    let mut url = Url::parse(endpoint)?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => return Err(ClientError::UnsupportedScheme(other.to_string())),
    }

    url.set_query(None);
    match who {
        ConnectAs::Authenticated(token) => {
            url.query_pairs_mut().append_pair("token", token);
        }
        ConnectAs::Guest => {
            url.query_pairs_mut().append_pair("anonymous", "true");
        }
        ConnectAs::Anonymous => {}
    }

    Ok(url)
}

/// Endpoint with the credential masked, for log lines
pub fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();

    if pairs.is_empty() {
        return shown.to_string();
    }

    shown.set_query(None);
    shown.query_pairs_mut().extend_pairs(pairs);
    shown.to_string()
}
