//! Per-request authentication and tenant context
//!
//! The client never stores credentials itself. Before each call it asks its
//! [`AuthProvider`] for the current token and client code, so a rotated token
//! is used on the very next request. Callers that juggle several tenants in
//! one process can skip the provider and pass a [`RequestContext`] directly.

use std::sync::{Arc, RwLock};

/// Source of the current access token and tenant client code
pub trait AuthProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn client_code(&self) -> Option<String>;
}

/// Provider for unauthenticated clients
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl AuthProvider for NoAuth {
    fn access_token(&self) -> Option<String> {
        None
    }

    fn client_code(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Default)]
struct Session {
    access_token: Option<String>,
    client_code: Option<String>,
}

/// Shared in-memory session that login/refresh flows update in place
#[derive(Debug, Clone, Default)]
pub struct SessionAuth {
    inner: Arc<RwLock<Session>>,
}

impl SessionAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(access_token: impl Into<String>, client_code: impl Into<String>) -> Self {
        let auth = Self::new();
        auth.set_access_token(access_token);
        auth.set_client_code(client_code);
        auth
    }

    pub fn set_access_token(&self, token: impl Into<String>) {
        if let Ok(mut session) = self.inner.write() {
            session.access_token = Some(token.into());
        }
    }

    pub fn set_client_code(&self, code: impl Into<String>) {
        if let Ok(mut session) = self.inner.write() {
            session.client_code = Some(code.into());
        }
    }

    /// Forget token and client code
    pub fn logout(&self) {
        if let Ok(mut session) = self.inner.write() {
            *session = Session::default();
        }
    }
}

impl AuthProvider for SessionAuth {
    fn access_token(&self) -> Option<String> {
        self.inner.read().ok().and_then(|s| s.access_token.clone())
    }

    fn client_code(&self) -> Option<String> {
        self.inner.read().ok().and_then(|s| s.client_code.clone())
    }
}

/// Admin access key slot, settable and clearable independently of login state
///
/// Attaching one to a client switches its tenant header from `X-CLIENT-CODE`
/// to `X-ADMIN-KEY` while a key is set.
#[derive(Debug, Clone, Default)]
pub struct AdminKey {
    inner: Arc<RwLock<Option<String>>>,
}

impl AdminKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = Some(key.into());
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = None;
        }
    }

    pub fn get(&self) -> Option<String> {
        self.inner.read().ok().and_then(|slot| slot.clone())
    }
}

/// Tenant identification sent with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tenant {
    ClientCode(String),
    AdminKey(String),
}

/// Credentials and tenant for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub access_token: Option<String>,
    pub tenant: Option<Tenant>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_client_code(mut self, code: impl Into<String>) -> Self {
        self.tenant = Some(Tenant::ClientCode(code.into()));
        self
    }

    pub fn with_admin_key(mut self, key: impl Into<String>) -> Self {
        self.tenant = Some(Tenant::AdminKey(key.into()));
        self
    }

    /// Resolve the live context: an admin key wins over the provider's client code
    pub fn resolve(auth: &dyn AuthProvider, admin_key: Option<&AdminKey>) -> Self {
        let tenant = admin_key
            .and_then(AdminKey::get)
            .map(Tenant::AdminKey)
            .or_else(|| auth.client_code().map(Tenant::ClientCode));

        Self {
            access_token: auth.access_token(),
            tenant,
        }
    }
}
