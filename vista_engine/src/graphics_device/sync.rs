/// Frame-in-flight synchronization

use std::any::Any;
use crate::error::Result;

/// Synchronization objects of one frame-in-flight slot
///
/// Owns a fence (created signaled, so the first wait returns at once), an
/// "image acquired" semaphore and a "rendering finished" semaphore. The
/// semaphores are only touched by the backend's acquire, submit and present.
pub trait FrameSync: Send + Sync {
    /// Block until the slot's last submission finished
    fn wait(&self) -> Result<()>;

    /// Unsignal the fence before the next submission
    fn reset(&self) -> Result<()>;

    /// Non-blocking fence query
    fn is_signaled(&self) -> Result<bool>;

    fn as_any(&self) -> &dyn Any;
}
