use serde::{Deserialize, Serialize};

const DEFAULT_ROOT_CLASS: &str = "wx-root";

/// Where bitmap compiles run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileMode {
    /// On a tokio blocking pool owned by the session.
    #[default]
    Worker,
    /// Queued until [`Session::run_deferred_compiles`](crate::Session::run_deferred_compiles).
    Deferred,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("device pixel ratio must be positive, got {0}")]
    InvalidPixelRatio(f64),

    #[error("worker thread count must be at least 1")]
    NoWorkerThreads,

    #[error("invalid session config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Session configuration. Also contains the host-environment facts the bridge cannot query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Raw device pixel ratio reported by the host display
    pub device_pixel_ratio: f64,
    /// Rendered height of the content header added to every window's vertical offset
    pub header_height: f64,
    /// Style class of the pre-existing root container
    pub root_class: String,
    /// Whether cursor names need the WebKit vendor prefix
    pub webkit: bool,
    pub compile_mode: CompileMode,
    /// Threads for the compile worker pool
    pub worker_threads: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            header_height: 0.0,
            root_class: DEFAULT_ROOT_CLASS.to_string(),
            webkit: false,
            compile_mode: CompileMode::Worker,
            worker_threads: 1,
        }
    }
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: SessionConfig::default(),
        }
    }

    /// Loads a config from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.device_pixel_ratio > 0.0) {
            return Err(ConfigError::InvalidPixelRatio(self.device_pixel_ratio));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::NoWorkerThreads);
        }
        Ok(())
    }

    /// Scale factor used for window surfaces: high-density displays snap to 2, all others to 1.
    pub fn display_scale_factor(&self) -> f64 {
        if self.device_pixel_ratio >= 1.5 {
            2.0
        } else {
            1.0
        }
    }
}

pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.config.device_pixel_ratio = ratio;
        self
    }

    pub fn header_height(mut self, height: f64) -> Self {
        self.config.header_height = height;
        self
    }

    pub fn root_class(mut self, class: impl Into<String>) -> Self {
        self.config.root_class = class.into();
        self
    }

    pub fn webkit(mut self, webkit: bool) -> Self {
        self.config.webkit = webkit;
        self
    }

    pub fn compile_mode(mut self, mode: CompileMode) -> Self {
        self.config.compile_mode = mode;
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads;
        self
    }

    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
