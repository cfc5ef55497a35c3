use std::time::Duration;

/// Number of documents fetched per window when the caller does not choose one.
pub const DEFAULT_BATCH_SIZE: u64 = 4096;

/// Page size used when a caller asks for a page of size zero.
pub const DEFAULT_PAGE_SIZE: u64 = 5;

pub const DEFAULT_MAX_POOL_SIZE: u32 = 10;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Name of the identifier field every stored document carries.
pub const DOC_ID: &str = "_id";

pub(crate) const FIELD_SEPARATOR: char = '.';
