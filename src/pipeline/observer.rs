//! Progress reporting hooks

use std::path::Path;
use std::time::Duration;

use tracing::info;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Mosaic,
    Reproject,
    Clip,
    Normalize,
    AoiMask,
    WaterMask,
    Imagery,
    Align,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Mosaic => "mosaic",
            Stage::Reproject => "reproject",
            Stage::Clip => "clip",
            Stage::Normalize => "normalize",
            Stage::AoiMask => "aoi-mask",
            Stage::WaterMask => "water-mask",
            Stage::Imagery => "imagery",
            Stage::Align => "align",
        }
    }
}

/// Receives progress notifications from [`Pipeline`](super::Pipeline)
pub trait ProgressObserver {
    fn stage_started(&mut self, stage: Stage);

    fn stage_finished(&mut self, stage: Stage, elapsed: Duration);

    fn artifact_written(&mut self, stage: Stage, path: &Path);
}

/// Forwards progress to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn stage_started(&mut self, stage: Stage) {
        info!(stage = stage.name(), "stage started");
    }

    fn stage_finished(&mut self, stage: Stage, elapsed: Duration) {
        info!(stage = stage.name(), elapsed_ms = elapsed.as_millis() as u64, "stage finished");
    }

    fn artifact_written(&mut self, stage: Stage, path: &Path) {
        info!(stage = stage.name(), path = %path.display(), "wrote artifact");
    }
}
