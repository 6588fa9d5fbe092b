/// Frame timing statistics
///
/// Frames per second and milliseconds per frame are averaged over windows of
/// at least one second and only change when a window closes.

use std::time::Duration;

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    frame_count: u64,
    rebuild_count: u64,
    fps: f32,
    ms_per_frame: f32,
    window_frames: u32,
    window_elapsed: Duration,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one presented frame that took `delta`
    pub fn record_frame(&mut self, delta: Duration) {
        self.frame_count += 1;
        self.window_frames += 1;
        self.window_elapsed += delta;

        if self.window_elapsed >= WINDOW {
            let seconds = self.window_elapsed.as_secs_f32();
            self.fps = self.window_frames as f32 / seconds;
            self.ms_per_frame = seconds * 1000.0 / self.window_frames as f32;
            self.window_frames = 0;
            self.window_elapsed = Duration::ZERO;
        }
    }

    pub(crate) fn record_rebuild(&mut self) {
        self.rebuild_count += 1;
    }

    /// Frames presented since creation
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Presentable chain rebuilds since creation
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    /// Average over the last closed window; 0 before the first one closes
    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn ms_per_frame(&self) -> f32 {
        self.ms_per_frame
    }
}

#[cfg(test)]
#[path = "frame_stats_tests.rs"]
mod tests;
