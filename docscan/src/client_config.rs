use crate::collection::IndexSpec;
use crate::common::{
    DEFAULT_BATCH_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_INIT_TIMEOUT,
    DEFAULT_MAX_POOL_SIZE, DEFAULT_PAGE_SIZE,
};
use secure_string::SecureString;
use std::fmt::Display;
use std::time::Duration;

/// SCRAM variant used to authenticate against the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    #[default]
    ScramSha1,
    ScramSha256,
}

impl Display for AuthMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMechanism::ScramSha1 => write!(f, "SCRAM-SHA-1"),
            AuthMechanism::ScramSha256 => write!(f, "SCRAM-SHA-256"),
        }
    }
}

/// Connection and scanning settings of a client.
///
/// Built and validated through
/// [`ClientConfigBuilder`](crate::client_builder::ClientConfigBuilder).
/// The password is held in a [`SecureString`], so it is zeroed on drop and
/// redacted from `Debug` output.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) url: String,
    pub(crate) db_name: String,
    pub(crate) user: Option<String>,
    pub(crate) password: Option<SecureString>,
    pub(crate) auth_mechanism: AuthMechanism,
    pub(crate) max_pool_size: u32,
    pub(crate) heartbeat_interval: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) init_timeout: Duration,
    pub(crate) batch_size: u64,
    pub(crate) page_size: u64,
    pub(crate) indexes: Vec<IndexSpec>,
}

impl ClientConfig {
    pub(crate) fn new(url: &str, db_name: &str) -> ClientConfig {
        ClientConfig {
            url: url.to_string(),
            db_name: db_name.to_string(),
            user: None,
            password: None,
            auth_mechanism: AuthMechanism::default(),
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            batch_size: DEFAULT_BATCH_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            indexes: Vec::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// The password in clear text, for handing to a driver.
    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|password| password.unsecure())
    }

    pub fn auth_mechanism(&self) -> AuthMechanism {
        self.auth_mechanism
    }

    pub fn max_pool_size(&self) -> u32 {
        self.max_pool_size
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn init_timeout(&self) -> Duration {
        self.init_timeout
    }

    /// Window size used by cursor queries.
    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Default page size for paged queries.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Indexes created when a connection is first established.
    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }
}
