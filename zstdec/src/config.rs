//! Decoder configuration.

/// Window size accepted by [`DecoderConfig::DEFAULT`] (128 MiB).
pub const DEFAULT_MAX_WINDOW_SIZE: usize = 1 << 27;

/// Window size accepted by [`DecoderConfig::STRICT`] (8 MiB).
pub const STRICT_MAX_WINDOW_SIZE: usize = 8 * 1024 * 1024;

/// Limits and checks applied while decoding frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Largest window a frame may declare. Larger frames fail with
    /// `WindowTooLarge` before any block is decoded.
    pub max_window_size: usize,
    /// Whether a declared content size must match the decoded length.
    pub verify_content_size: bool,
}

impl DecoderConfig {
    /// Accepts windows up to 128 MiB and checks declared content sizes.
    pub const DEFAULT: Self = Self {
        max_window_size: DEFAULT_MAX_WINDOW_SIZE,
        verify_content_size: true,
    };

    /// Accepts windows up to 8 MiB, for memory-constrained callers.
    pub const STRICT: Self = Self {
        max_window_size: STRICT_MAX_WINDOW_SIZE,
        verify_content_size: true,
    };

    /// Create the default configuration.
    pub fn new() -> Self {
        Self::DEFAULT
    }

    /// Set the largest accepted window size.
    pub fn with_max_window_size(mut self, max_window_size: usize) -> Self {
        self.max_window_size = max_window_size;
        self
    }

    /// Enable or disable the content size check.
    pub fn with_verify_content_size(mut self, verify: bool) -> Self {
        self.verify_content_size = verify;
        self
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
