//! Allocator configuration.
//!
//! Automatic invariant verification depth is set via the `FRAGMEM_CHECK`
//! environment variable:
//! - `off`: no verification after operations.
//! - `release` (default): verify the block layout after every `release`,
//!   the only operation that coalesces.
//! - `full`: verify the layout and the cached free total after every
//!   mutating call.
//!
//! The lifecycle record buffer size defaults to `FRAGMEM_LOG_CAPACITY`
//! (1024 when unset or unparsable). A capacity of 0 disables recording.

use std::sync::OnceLock;

use crate::error::AllocError;

/// Default number of lifecycle records kept per allocator.
pub const DEFAULT_LOG_CAPACITY: usize = 1024;

/// Depth of automatic post-operation invariant verification.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckLevel {
    Off,
    #[default]
    Release,
    Full,
}

impl CheckLevel {
    /// Parse from string (case-insensitive). Unknown values map to the default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "disabled" | "0" => Self::Off,
            "full" | "all" | "always" | "paranoid" | "2" => Self::Full,
            _ => Self::Release,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Release => "release",
            Self::Full => "full",
        }
    }

    /// Whether the layout should be verified after a mutating call.
    /// `releasing` is true for `release`, false for `allocate`.
    #[must_use]
    pub const fn verifies_after(self, releasing: bool) -> bool {
        match self {
            Self::Off => false,
            Self::Release => releasing,
            Self::Full => true,
        }
    }
}

static CACHED_LEVEL: OnceLock<CheckLevel> = OnceLock::new();

/// Process-wide check level (reads `FRAGMEM_CHECK` on first call).
#[must_use]
pub fn check_level() -> CheckLevel {
    *CACHED_LEVEL.get_or_init(|| {
        std::env::var("FRAGMEM_CHECK")
            .map(|v| CheckLevel::from_str_loose(&v))
            .unwrap_or_default()
    })
}

fn default_log_capacity() -> usize {
    parse_log_capacity(std::env::var("FRAGMEM_LOG_CAPACITY").ok().as_deref())
}

fn parse_log_capacity(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_LOG_CAPACITY)
}

/// Construction parameters for [`crate::Allocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Bytes under management.
    pub capacity: usize,
    /// Length of the caller-owned backing region. Must be `>= capacity`.
    pub region_len: usize,
    pub check: CheckLevel,
    pub log_capacity: usize,
}

impl AllocatorConfig {
    /// Config for `capacity` bytes with a backing region of the same length
    /// and environment-derived defaults.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            region_len: capacity,
            check: check_level(),
            log_capacity: default_log_capacity(),
        }
    }

    #[must_use]
    pub fn with_region_len(mut self, region_len: usize) -> Self {
        self.region_len = region_len;
        self
    }

    #[must_use]
    pub fn with_check(mut self, check: CheckLevel) -> Self {
        self.check = check;
        self
    }

    #[must_use]
    pub fn with_log_capacity(mut self, log_capacity: usize) -> Self {
        self.log_capacity = log_capacity;
        self
    }

    pub fn validate(&self) -> Result<(), AllocError> {
        if self.capacity == 0 {
            return Err(AllocError::InvalidArgument {
                reason: "capacity must be positive",
            });
        }
        if self.capacity > self.region_len {
            return Err(AllocError::InvalidArgument {
                reason: "capacity cannot exceed backing region length",
            });
        }
        Ok(())
    }
}
