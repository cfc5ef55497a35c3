use crate::client_config::{AuthMechanism, ClientConfig};
use crate::collection::IndexSpec;
use crate::errors::{DocScanError, DocScanResult, ErrorKind};
use secure_string::SecureString;
use std::time::Duration;

/// Builder for a validated [`ClientConfig`].
///
/// Setters never fail; the first invalid value is captured and reported by
/// [`build`](ClientConfigBuilder::build).
///
/// # Examples
///
/// ```rust
/// use docscan::client_builder::ClientConfigBuilder;
/// use docscan::collection::IndexSpec;
///
/// let config = ClientConfigBuilder::new("mongodb://localhost:27017", "test")
///     .credentials("root", "secret")
///     .batch_size(1000)
///     .index(IndexSpec::new("test", "user", &["username"]).unique(true))
///     .build()
///     .unwrap();
///
/// assert_eq!(config.batch_size(), 1000);
/// ```
pub struct ClientConfigBuilder {
    error: Option<DocScanError>,
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new(url: &str, db_name: &str) -> Self {
        let mut builder = ClientConfigBuilder {
            error: None,
            config: ClientConfig::new(url, db_name),
        };
        if url.trim().is_empty() {
            builder.fail("Connection url cannot be empty");
        } else if db_name.trim().is_empty() {
            builder.fail("Database name cannot be empty");
        }
        builder
    }

    fn fail(&mut self, message: &str) {
        if self.error.is_none() {
            log::error!("{}", message);
            self.error = Some(DocScanError::new(message, ErrorKind::InvalidArgument));
        }
    }

    /// Sets the user and password to authenticate with.
    pub fn credentials(mut self, user: &str, password: &str) -> Self {
        if user.is_empty() {
            self.fail("User name cannot be empty");
            return self;
        }
        self.config.user = Some(user.to_string());
        self.config.password = Some(SecureString::from(password));
        self
    }

    pub fn auth_mechanism(mut self, auth_mechanism: AuthMechanism) -> Self {
        self.config.auth_mechanism = auth_mechanism;
        self
    }

    pub fn max_pool_size(mut self, max_pool_size: u32) -> Self {
        if max_pool_size == 0 {
            self.fail("Max pool size must be greater than 0");
            return self;
        }
        self.config.max_pool_size = max_pool_size;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.config.init_timeout = timeout;
        self
    }

    /// Sets the window size of cursor queries. Must be positive.
    pub fn batch_size(mut self, batch_size: u64) -> Self {
        if batch_size == 0 {
            self.fail("Batch size must be greater than 0");
            return self;
        }
        self.config.batch_size = batch_size;
        self
    }

    /// Sets the default page size; zero falls back to the default of 5.
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Declares an index to create when the connection is established.
    pub fn index(mut self, index: IndexSpec) -> Self {
        if self.error.is_none() {
            if let Err(e) = index.validate() {
                self.error = Some(e);
                return self;
            }
        }
        self.config.indexes.push(index);
        self
    }

    pub fn build(self) -> DocScanResult<ClientConfig> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(self.config)
    }
}
