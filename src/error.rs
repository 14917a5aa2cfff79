//! Error types for the live session controller

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the live session controller
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Device access was denied by the user or platform
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// No capture device is present for the requested capability
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The device exists but is held by another application
    #[error("device busy: {0}")]
    DeviceBusy(String),

    /// The device cannot satisfy the requested constraints
    #[error("constraint unsatisfiable: {0}")]
    Overconstrained(String),

    /// The chunk recorder failed to start on an acquired stream
    #[error("recorder start failed: {0}")]
    RecorderStart(String),

    /// Captured audio is too quiet to contain speech
    #[error("captured audio is silent")]
    SilentAudio,

    /// Audio processing error
    #[error("audio error: {0}")]
    Audio(String),

    /// Transcription service error
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Vision analysis service error
    #[error("vision error: {0}")]
    Vision(String),

    /// Speech synthesis service error
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Chat service error
    #[error("chat error: {0}")]
    Chat(String),

    /// Session is in a state that does not permit the operation
    #[error("session error: {0}")]
    Session(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// User-facing guidance for a classified failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guidance {
    /// What went wrong, in user terms
    pub message: &'static str,
    /// How the user can fix it
    pub fix: &'static str,
}

impl Error {
    /// Whether this error is fatal to a session start attempt
    ///
    /// Fatal device errors bubble to the session controller, which tears
    /// down every acquired resource before reporting.
    #[must_use]
    pub const fn is_fatal_device(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_)
                | Self::DeviceNotFound(_)
                | Self::DeviceBusy(_)
                | Self::Overconstrained(_)
                | Self::RecorderStart(_)
        )
    }

    /// User guidance for this error, if it has a user-facing remedy
    #[must_use]
    pub const fn guidance(&self) -> Option<Guidance> {
        match self {
            Self::PermissionDenied(_) => Some(Guidance {
                message: "Access to the device was denied.",
                fix: "Grant microphone/camera access in your browser or system settings and try again.",
            }),
            Self::DeviceNotFound(_) => Some(Guidance {
                message: "No suitable capture device was found.",
                fix: "Connect a microphone or camera and try again.",
            }),
            Self::DeviceBusy(_) => Some(Guidance {
                message: "The device is in use by another application.",
                fix: "Close other applications using the microphone or camera and try again.",
            }),
            Self::Overconstrained(_) => Some(Guidance {
                message: "The device does not meet the requested capabilities.",
                fix: "Try a different device or lower the requested quality.",
            }),
            Self::RecorderStart(_) => Some(Guidance {
                message: "Recording could not be started on the device.",
                fix: "Try again; if the problem persists, restart the application.",
            }),
            Self::SilentAudio => Some(Guidance {
                message: "No speech was detected in the recording.",
                fix: "Speak louder or move closer to the microphone.",
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_device_errors_are_classified() {
        assert!(Error::PermissionDenied("mic".into()).is_fatal_device());
        assert!(Error::DeviceNotFound("camera".into()).is_fatal_device());
        assert!(Error::DeviceBusy("mic".into()).is_fatal_device());
        assert!(Error::Overconstrained("1080p".into()).is_fatal_device());
        assert!(Error::RecorderStart("no format".into()).is_fatal_device());
    }

    #[test]
    fn non_fatal_errors_are_not_device_fatal() {
        assert!(!Error::SilentAudio.is_fatal_device());
        assert!(!Error::Transcription("timeout".into()).is_fatal_device());
        assert!(!Error::Vision("500".into()).is_fatal_device());
    }

    #[test]
    fn guidance_covers_the_device_taxonomy() {
        let errors = [
            Error::PermissionDenied("mic".into()),
            Error::DeviceNotFound("mic".into()),
            Error::DeviceBusy("mic".into()),
            Error::Overconstrained("mic".into()),
            Error::RecorderStart("mic".into()),
            Error::SilentAudio,
        ];
        for e in errors {
            assert!(e.guidance().is_some(), "missing guidance for {e}");
        }
        assert!(Error::Config("x".into()).guidance().is_none());
    }

    #[test]
    fn silent_audio_guidance_tells_user_to_speak_louder() {
        let g = Error::SilentAudio.guidance().unwrap();
        assert!(g.fix.contains("Speak louder"));
    }
}
