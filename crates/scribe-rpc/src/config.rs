//! Connection settings for the ledger node.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use zeroize::Zeroizing;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the node lives and how to log in.
///
/// The password is wiped from memory on drop and never printed.
#[derive(Clone)]
pub struct RpcConfig {
    pub url: String,
    pub user: String,
    pub password: Zeroizing<String>,
    pub timeout: Duration,
}

impl RpcConfig {
    pub fn new(url: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: user.into(),
            password: Zeroizing::new(password.into()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Value of the `Authorization` header.
    pub fn basic_auth(&self) -> Zeroizing<String> {
        let credentials = Zeroizing::new(format!("{}:{}", self.user, self.password.as_str()));
        Zeroizing::new(format!("Basic {}", STANDARD.encode(credentials.as_bytes())))
    }
}

impl fmt::Debug for RpcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}
