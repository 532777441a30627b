use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::core::{CanvasSize, DEFAULT_CANVAS_SIZE, RENDER_DELAY, WORKER_TIMEOUT};
use crate::foundation::error::{LabError, LabResult};

/// Tunables for a [`Lab`](crate::Lab) instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Canvas width in pixels.
    pub canvas_width: u32,
    /// Canvas height in pixels.
    pub canvas_height: u32,
    /// Debounce quiet period between the last edit and the render it triggers.
    pub render_delay_ms: u64,
    /// Hard deadline for one sandbox session.
    pub worker_timeout_ms: u64,
    /// Sleep granularity of [`Lab::run_until_idle`](crate::Lab::run_until_idle).
    pub poll_interval_ms: u64,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_SIZE,
            canvas_height: DEFAULT_CANVAS_SIZE,
            render_delay_ms: RENDER_DELAY.as_millis() as u64,
            worker_timeout_ms: WORKER_TIMEOUT.as_millis() as u64,
            poll_interval_ms: 5,
        }
    }
}

impl LabConfig {
    pub fn from_json_file(path: &Path) -> LabResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read lab config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .map_err(|e| LabError::serde(format!("lab config '{}': {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> LabResult<()> {
        let max = u32::from(u16::MAX);
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(LabError::validation("canvas width/height must be non-zero"));
        }
        if self.canvas_width > max || self.canvas_height > max {
            return Err(LabError::validation(format!(
                "canvas width/height must be at most {max}"
            )));
        }
        if self.worker_timeout_ms == 0 {
            return Err(LabError::validation("worker timeout must be non-zero"));
        }
        Ok(())
    }

    pub fn canvas_size(&self) -> CanvasSize {
        CanvasSize::new(self.canvas_width, self.canvas_height)
    }

    pub fn render_delay(&self) -> Duration {
        Duration::from_millis(self.render_delay_ms)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
