//! Pass configuration.
//!
//! The only knob this pass has is a debug transform cap: a development aid for bisecting which
//! transformed loop introduced a miscompilation, not a correctness mechanism. Read through
//! [`std::sync::OnceLock`] so the cached value is thread-safe to share across concurrently
//! compiling methods.

use std::sync::OnceLock;

/// Runtime configuration for [`crate::run`].
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// Skip rewriting once this many loops have already been transformed in the current
    /// process. Not a correctness mechanism — purely a development aid for bisecting which
    /// transform introduced a miscompilation.
    max_transforms: u64,
}

impl Options {
    /// No cap: every transformable loop is transformed.
    pub fn unlimited() -> Self {
        Self {
            max_transforms: u64::MAX,
        }
    }

    pub fn with_max_transforms(max_transforms: u64) -> Self {
        Self { max_transforms }
    }

    /// Read the cap from the `BOTTOM_MAX` environment variable, cached process-wide after the
    /// first call. Missing or unparseable values fall back to [`Options::unlimited`].
    pub fn from_env() -> Self {
        static CAP: OnceLock<u64> = OnceLock::new();
        let max_transforms = *CAP.get_or_init(|| {
            std::env::var("BOTTOM_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(u64::MAX)
        });
        Self { max_transforms }
    }

    pub fn max_transforms(&self) -> u64 {
        self.max_transforms
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::unlimited()
    }
}
