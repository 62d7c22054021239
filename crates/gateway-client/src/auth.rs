//! Credential storage and per-path authentication header selection.
//!
//! Namespace-scoped paths (database, pub/sub, proxy, cache) must not have
//! their authorization context overridden by a user-identity token, so
//! they get the API key alone when one is set. Auth paths and everything
//! else get both credentials independently.

use std::sync::Arc;

use parking_lot::RwLock;

pub const HEADER_API_KEY: &str = "X-API-Key";
pub const HEADER_AUTHORIZATION: &str = "Authorization";

/// Path prefixes of namespace-scoped operations.
const NAMESPACE_PREFIXES: &[&str] = &["/v1/rqlite", "/v1/pubsub", "/v1/proxy", "/v1/dmap"];

/// The credentials held by the transport.
///
/// Both kinds may coexist; [`headers_for`] decides which is sent per
/// path. Setting one never clears the other.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
}

/// Shared credential cell. Cloned freely; all clones see updates.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Credentials>>,
}

impl CredentialStore {
    pub fn new(api_key: Option<String>, bearer_token: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Credentials {
                api_key,
                bearer_token,
            })),
        }
    }

    pub fn set_api_key(&self, key: impl Into<String>) {
        self.inner.write().api_key = Some(key.into());
    }

    pub fn set_bearer_token(&self, token: impl Into<String>) {
        self.inner.write().bearer_token = Some(token.into());
    }

    pub fn snapshot(&self) -> Credentials {
        self.inner.read().clone()
    }
}

/// Headers to attach for a request against `path`.
///
/// - Namespace paths: API key if present, else bearer token.
/// - All other paths (including `/v1/auth`): both, independently.
pub fn headers_for(path: &str, creds: &Credentials) -> Vec<(&'static str, String)> {
    let mut headers = Vec::with_capacity(2);

    if NAMESPACE_PREFIXES.iter().any(|p| path.starts_with(p)) {
        if let Some(ref key) = creds.api_key {
            headers.push((HEADER_API_KEY, key.clone()));
        } else if let Some(ref token) = creds.bearer_token {
            headers.push((HEADER_AUTHORIZATION, format!("Bearer {token}")));
        }
        return headers;
    }

    if let Some(ref key) = creds.api_key {
        headers.push((HEADER_API_KEY, key.clone()));
    }
    if let Some(ref token) = creds.bearer_token {
        headers.push((HEADER_AUTHORIZATION, format!("Bearer {token}")));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both() -> Credentials {
        Credentials {
            api_key: Some("mk_live_abc".into()),
            bearer_token: Some("jwt.ey.z".into()),
        }
    }

    #[test]
    fn namespace_path_prefers_api_key() {
        let headers = headers_for("/v1/rqlite/query", &both());
        assert_eq!(headers, vec![(HEADER_API_KEY, "mk_live_abc".to_string())]);
    }

    #[test]
    fn namespace_path_falls_back_to_bearer() {
        let creds = Credentials {
            api_key: None,
            bearer_token: Some("jwt.ey.z".into()),
        };
        let headers = headers_for("/v1/dmap/get", &creds);
        assert_eq!(
            headers,
            vec![(HEADER_AUTHORIZATION, "Bearer jwt.ey.z".to_string())]
        );
    }

    #[test]
    fn auth_path_sends_both() {
        let headers = headers_for("/v1/auth/whoami", &both());
        assert_eq!(headers.len(), 2);
        assert!(headers.iter().any(|(k, _)| *k == HEADER_API_KEY));
        assert!(headers.iter().any(|(k, _)| *k == HEADER_AUTHORIZATION));
    }

    #[test]
    fn other_path_sends_both() {
        let headers = headers_for("/v1/blob/sha256/ab", &both());
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn no_credentials_no_headers() {
        assert!(headers_for("/v1/rqlite/query", &Credentials::default()).is_empty());
        assert!(headers_for("/v1/auth/whoami", &Credentials::default()).is_empty());
    }

    #[test]
    fn setters_do_not_clear_the_other_credential() {
        let store = CredentialStore::default();
        store.set_api_key("k1");
        store.set_bearer_token("t1");
        let snap = store.snapshot();
        assert_eq!(snap.api_key.as_deref(), Some("k1"));
        assert_eq!(snap.bearer_token.as_deref(), Some("t1"));
    }
}
