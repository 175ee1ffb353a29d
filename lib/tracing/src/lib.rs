//! Logging setup shared by the replay binaries.

mod formatter;
pub use formatter::{LogFormat, UnknownLogFormat};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Configuration of the process-wide tracer.
///
/// `RUST_LOG` directives take precedence over the default level.
#[derive(Debug, Clone)]
pub struct Tracer {
    format: LogFormat,
    use_color: bool,
    default_level: LevelFilter,
}

impl Tracer {
    pub const fn new(format: LogFormat, use_color: bool) -> Self {
        Self {
            format,
            use_color,
            default_level: LevelFilter::INFO,
        }
    }

    /// Level applied to targets not mentioned in `RUST_LOG`.
    pub const fn with_default_level(mut self, level: LevelFilter) -> Self {
        self.default_level = level;
        self
    }

    pub fn init(self) {
        let filter = EnvFilter::builder()
            .with_default_directive(self.default_level.into())
            .from_env_lossy();
        let layer = self.format.layer(filter, self.use_color);

        // Fails only if a global subscriber is already installed, e.g. by a test harness.
        let _ = tracing_subscriber::registry().with(layer).try_init();
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(LogFormat::Terminal, true)
    }
}
