//! Session configuration.

/// Default number of items requested per scan page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default bound on operations per atomic batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 25;

/// Sort field used when a query names neither an order field nor a filtered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderFallback {
    /// Order by the primary key.
    #[default]
    PrimaryKey,
    /// Order by the created-timestamp field, falling back to the primary key
    /// when the record type declares none.
    CreatedTimestamp,
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Items requested per scan page.
    pub page_size: usize,

    /// Maximum number of operations in one atomic batch.
    pub max_batch_size: usize,

    /// Implicit sort field.
    pub default_order_fallback: OrderFallback,

    /// Resolve sibling relations of one include level concurrently.
    pub concurrent_includes: bool,
}

impl SessionConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            default_order_fallback: OrderFallback::PrimaryKey,
            concurrent_includes: true,
        }
    }

    /// Set the scan page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the atomic batch bound.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Set the implicit sort field.
    pub fn with_order_fallback(mut self, fallback: OrderFallback) -> Self {
        self.default_order_fallback = fallback;
        self
    }

    /// Enable or disable concurrent include resolution.
    pub fn with_concurrent_includes(mut self, concurrent: bool) -> Self {
        self.concurrent_includes = concurrent;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}
