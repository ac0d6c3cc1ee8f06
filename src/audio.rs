//! Speaker routing for the phone session
//!
//! The platform audio subsystem is external; this module only stores the
//! caller's speaker-on/off preference and pushes it through the
//! [`AudioOutput`] seam. The preference is applied when it changes and
//! re-applied on every `Connected` transition, because platforms commonly
//! reset the audio route while setting a call up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

/// Platform audio output consumed by the router
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Route call audio through the speaker (`true`) or earpiece (`false`)
    async fn set_speaker_enabled(&self, enabled: bool);
}

/// Audio output that discards routing requests
///
/// Default for hosts that manage audio elsewhere.
pub struct NullAudioOutput;

#[async_trait]
impl AudioOutput for NullAudioOutput {
    async fn set_speaker_enabled(&self, _enabled: bool) {}
}

/// Applies the speaker preference to the platform audio output
pub struct AudioRouter {
    output: Arc<dyn AudioOutput>,
    speaker_enabled: AtomicBool,
}

impl AudioRouter {
    /// Create a router over the given output; speaker starts disabled
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            speaker_enabled: AtomicBool::new(false),
        }
    }

    /// The stored speaker preference
    pub fn speaker_enabled(&self) -> bool {
        self.speaker_enabled.load(Ordering::SeqCst)
    }

    /// Store the preference and apply it immediately if it changed
    pub async fn set_speaker_enabled(&self, enabled: bool) {
        let previous = self.speaker_enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            self.apply().await;
        }
    }

    /// Re-apply the stored preference to the platform output
    ///
    /// Called on every `Connected` transition of the active connection.
    pub async fn apply(&self) {
        let enabled = self.speaker_enabled();
        debug!(enabled, "applying speaker route");
        self.output.set_speaker_enabled(enabled).await;
    }
}
