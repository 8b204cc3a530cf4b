//! Connection cache keys.
//!
//! A key fingerprints every input that changes the effective auth context of
//! a connection: tenant, project, tool id, credential reference and any
//! forwarded per-session headers. Each component is length-prefixed before
//! hashing so that no two distinct tuples produce the same digest input.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Tenant and project an agent runs under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionScope {
    pub tenant_id: String,
    pub project_id: String,
}

impl ConnectionScope {
    pub fn new(tenant_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            project_id: project_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionCacheKey(String);

impl ConnectionCacheKey {
    pub fn new(
        scope: &ConnectionScope,
        tool_id: &str,
        credential_ref: Option<&str>,
        forwarded_headers: &BTreeMap<String, String>,
    ) -> Self {
        let mut hasher = Sha256::new();
        let mut feed = |part: &str| {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        };
        feed(&scope.tenant_id);
        feed(&scope.project_id);
        feed(tool_id);
        match credential_ref {
            Some(credential) => {
                feed("credential");
                feed(credential);
            }
            None => feed("no-credential"),
        }
        feed(&headers_fingerprint(forwarded_headers));
        Self(format!("{}:{:x}", tool_id, hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionCacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash of forwarded headers; names are case-insensitive.
fn headers_fingerprint(headers: &BTreeMap<String, String>) -> String {
    let normalized: BTreeMap<String, &str> = headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.as_str()))
        .collect();
    let mut hasher = Sha256::new();
    for (name, value) in &normalized {
        hasher.update((name.len() as u64).to_be_bytes());
        hasher.update(name.as_bytes());
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
