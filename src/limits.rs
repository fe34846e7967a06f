use serde::{Deserialize, Serialize};

/// Various limits on incoming request bodies.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Limits {
    /// Max size of one multipart part's header block.
    pub max_header_size: usize,
    /// Max size when buffering an entire body in memory.
    pub max_buffer_size: usize,
    /// Max total body size for streaming paths, `0` means unlimited.
    pub max_request_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_header_size: Self::DEFAULT_HEADER_SIZE,
            max_buffer_size: Self::DEFAULT_BUFFER_SIZE,
            max_request_size: Self::DEFAULT_REQUEST_SIZE,
        }
    }
}

impl Limits {
    /// Max size of one part header block, defaults to 1KB.
    pub const DEFAULT_HEADER_SIZE: usize = 1024;

    /// Max size of a fully buffered body, defaults to 4KB.
    pub const DEFAULT_BUFFER_SIZE: usize = 4096;

    /// Max total body size, defaults to 0 (unlimited).
    pub const DEFAULT_REQUEST_SIZE: u64 = 0;

    /// Max part header block size.
    #[must_use]
    pub fn max_header_size(mut self, max: usize) -> Self {
        self.max_header_size = max;
        self
    }

    /// Max fully buffered body size.
    #[must_use]
    pub fn max_buffer_size(mut self, max: usize) -> Self {
        self.max_buffer_size = max;
        self
    }

    /// Max total body size, `0` for unlimited.
    #[must_use]
    pub fn max_request_size(mut self, max: u64) -> Self {
        self.max_request_size = max;
        self
    }

    /// Check header block size.
    #[must_use]
    pub fn checked_header_size(&self, rhs: usize) -> Option<usize> {
        (rhs > self.max_header_size).then_some(self.max_header_size)
    }

    /// Check buffered body size.
    #[must_use]
    pub fn checked_buffer_size(&self, rhs: usize) -> Option<usize> {
        (rhs > self.max_buffer_size).then_some(self.max_buffer_size)
    }

    /// Check total body size.
    #[must_use]
    pub fn checked_request_size(&self, rhs: u64) -> Option<u64> {
        (self.max_request_size > 0 && rhs > self.max_request_size).then_some(self.max_request_size)
    }
}
