//! Permission coordination
//!
//! Tracks microphone and camera permission independently. A request probes
//! acquisition through the shared manager and releases the probe stream
//! the moment it succeeds; probing never holds a live device open. The
//! coordinator is the sole writer of permission state.

use std::sync::Arc;
use std::sync::Mutex;

use crate::device::{AcquisitionManager, MediaConstraints};
use crate::{Error, Result};

/// A hardware capability the session may need
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Audio input
    Microphone,
    /// Video input
    Camera,
}

/// Grant status for one capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    /// Never requested
    #[default]
    Unknown,
    /// A request is in flight
    Requesting,
    /// Access granted
    Granted,
    /// Access denied by the user or platform
    Denied,
}

/// Per-capability permission state machines
pub struct PermissionCoordinator {
    acquisition: Arc<AcquisitionManager>,
    microphone: Mutex<PermissionState>,
    camera: Mutex<PermissionState>,
}

impl PermissionCoordinator {
    /// Create a coordinator over the shared acquisition manager
    #[must_use]
    pub fn new(acquisition: Arc<AcquisitionManager>) -> Self {
        Self {
            acquisition,
            microphone: Mutex::new(PermissionState::Unknown),
            camera: Mutex::new(PermissionState::Unknown),
        }
    }

    /// Current state for a capability
    #[must_use]
    pub fn state(&self, capability: Capability) -> PermissionState {
        *self.slot(capability).lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Request access to a capability by probing acquisition
    ///
    /// On success the probe stream is released immediately and the state
    /// becomes `Granted`. A denial sets `Denied`; any other classified
    /// failure leaves the state `Unknown` so a retry stays meaningful.
    ///
    /// # Errors
    ///
    /// Returns the classified device error the probe surfaced
    pub async fn request(&self, capability: Capability) -> Result<PermissionState> {
        self.set(capability, PermissionState::Requesting);

        let constraints = match capability {
            Capability::Microphone => {
                MediaConstraints::audio_only(self.acquisition.audio_constraints())
            }
            Capability::Camera => {
                MediaConstraints::video_only(self.acquisition.video_constraints())
            }
        };

        match self.acquisition.probe(constraints).await {
            Ok(()) => {
                self.set(capability, PermissionState::Granted);
                tracing::info!(capability = ?capability, "permission granted");
                Ok(PermissionState::Granted)
            }
            Err(e) => {
                let next = if matches!(e, Error::PermissionDenied(_)) {
                    PermissionState::Denied
                } else {
                    PermissionState::Unknown
                };
                self.set(capability, next);
                tracing::warn!(capability = ?capability, error = %e, "permission request failed");
                Err(e)
            }
        }
    }

    /// Apply an external permission-change notification from the platform
    pub fn notify_changed(&self, capability: Capability, granted: bool) {
        let next = if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        self.set(capability, next);
        tracing::info!(capability = ?capability, granted, "permission changed externally");
    }

    fn slot(&self, capability: Capability) -> &Mutex<PermissionState> {
        match capability {
            Capability::Microphone => &self.microphone,
            Capability::Camera => &self.camera,
        }
    }

    fn set(&self, capability: Capability, state: PermissionState) {
        *self
            .slot(capability)
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = state;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::capture::ChunkFormat;
    use crate::config::{AudioConstraints, VideoConstraints};
    use crate::device::{DeviceHost, MediaStream, MediaTrack, SampleFeed};

    /// Host whose camera acquisitions are denied
    struct CameraDeniedHost {
        live_tracks: Mutex<Vec<MediaTrack>>,
    }

    impl CameraDeniedHost {
        fn new() -> Self {
            Self {
                live_tracks: Mutex::new(Vec::new()),
            }
        }

        fn live_count(&self) -> usize {
            self.live_tracks
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.is_live())
                .count()
        }
    }

    #[async_trait]
    impl DeviceHost for CameraDeniedHost {
        async fn acquire(&self, constraints: &MediaConstraints) -> Result<MediaStream> {
            if constraints.video.is_some() {
                return Err(Error::PermissionDenied(
                    "camera access was denied".to_string(),
                ));
            }
            let track = MediaTrack::audio("fake mic", SampleFeed::new(), None);
            self.live_tracks.lock().unwrap().push(track.clone());
            Ok(MediaStream::new(vec![track]))
        }

        fn supported_chunk_formats(&self) -> Vec<ChunkFormat> {
            vec![ChunkFormat::Wav]
        }

        fn encode_chunk(&self, samples: &[f32], rate: u32, _: ChunkFormat) -> Result<Vec<u8>> {
            crate::audio::samples_to_wav(samples, rate)
        }
    }

    fn coordinator(host: Arc<CameraDeniedHost>) -> PermissionCoordinator {
        let manager = Arc::new(AcquisitionManager::new(
            host,
            AudioConstraints::default(),
            VideoConstraints::default(),
        ));
        PermissionCoordinator::new(manager)
    }

    #[tokio::test]
    async fn granted_probe_releases_the_stream() {
        let host = Arc::new(CameraDeniedHost::new());
        let coordinator = coordinator(Arc::clone(&host));

        assert_eq!(
            coordinator.state(Capability::Microphone),
            PermissionState::Unknown
        );

        let state = coordinator.request(Capability::Microphone).await.unwrap();
        assert_eq!(state, PermissionState::Granted);
        assert_eq!(
            coordinator.state(Capability::Microphone),
            PermissionState::Granted
        );

        // The probe must not hold a live device open
        assert_eq!(host.live_count(), 0);
    }

    #[tokio::test]
    async fn denial_sets_denied_and_surfaces_guidance() {
        let host = Arc::new(CameraDeniedHost::new());
        let coordinator = coordinator(host);

        let err = coordinator.request(Capability::Camera).await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert!(err.guidance().is_some());
        assert_eq!(
            coordinator.state(Capability::Camera),
            PermissionState::Denied
        );

        // Independent tracking: microphone state is untouched
        assert_eq!(
            coordinator.state(Capability::Microphone),
            PermissionState::Unknown
        );
    }

    #[tokio::test]
    async fn external_notification_updates_state() {
        let host = Arc::new(CameraDeniedHost::new());
        let coordinator = coordinator(host);

        coordinator.notify_changed(Capability::Camera, true);
        assert_eq!(
            coordinator.state(Capability::Camera),
            PermissionState::Granted
        );

        coordinator.notify_changed(Capability::Camera, false);
        assert_eq!(
            coordinator.state(Capability::Camera),
            PermissionState::Denied
        );
    }
}
