//! Per-connection protocol limits.
//!
//! Every connection gets its own copy of these limits; the decoder consults
//! them while framing and the connection handler uses `max_buffer_size` to
//! bound how much unread input it is willing to hold.

/// Default maximum number of elements in one multibulk request.
pub const DEFAULT_MAX_MULTIBULK_LEN: usize = 1024;

/// Default maximum length of a single bulk string argument (64 KB).
pub const DEFAULT_MAX_BULK_LEN: usize = 64 * 1024;

/// Default maximum number of buffered, not yet decoded bytes (1 MB).
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Limits applied to inbound request frames.
///
/// Exceeding any of them is a framing error and closes the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolLimits {
    /// Maximum array length declared by `*<N>`
    pub max_multibulk_len: usize,
    /// Maximum payload length declared by `$<len>`
    pub max_bulk_len: usize,
    /// Maximum number of unread bytes held in the connection buffer
    pub max_buffer_size: usize,
}

impl Default for ProtocolLimits {
    fn default() -> Self {
        Self {
            max_multibulk_len: DEFAULT_MAX_MULTIBULK_LEN,
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = ProtocolLimits::default();
        assert_eq!(limits.max_multibulk_len, 1024);
        assert_eq!(limits.max_bulk_len, 65536);
        assert_eq!(limits.max_buffer_size, 1_048_576);
    }
}
