//! Build-time selection of the platform capture sources.

use std::sync::Arc;

use duocast_common::{DuocastError, DuocastResult, MediaTools};
use duocast_platform_core::{CaptureSources, Platform, ScreenTarget};

/// Capture sources for the platform this binary was built for.
pub fn get_sources(tools: &MediaTools) -> Arc<dyn CaptureSources> {
    #[cfg(target_os = "linux")]
    {
        let _ = tools;
        Arc::new(duocast_platform_linux::LinuxSources::new())
    }
    #[cfg(target_os = "windows")]
    {
        Arc::new(duocast_platform_windows::WindowsSources::new(tools.clone()))
    }
    #[cfg(target_os = "macos")]
    {
        Arc::new(duocast_platform_macos::MacSources::new(tools.clone()))
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        let _ = tools;
        Arc::new(UnsupportedSources)
    }
}

/// Stand-in for platforms without a capture backend. Every call fails with
/// [`DuocastError::Unsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedSources;

impl UnsupportedSources {
    fn error() -> DuocastError {
        DuocastError::unsupported(format!(
            "Capture is not supported on {}",
            std::env::consts::OS
        ))
    }
}

impl CaptureSources for UnsupportedSources {
    fn platform(&self) -> Platform {
        Platform::Unknown
    }

    fn list_video_devices(&self) -> DuocastResult<Vec<String>> {
        Err(Self::error())
    }

    fn list_audio_devices(&self) -> DuocastResult<Vec<String>> {
        Err(Self::error())
    }

    fn list_captureable_windows(&self) -> DuocastResult<Vec<String>> {
        Err(Self::error())
    }

    fn screen_input_args(&self, _target: &ScreenTarget, _fps: u32) -> DuocastResult<Vec<String>> {
        Err(Self::error())
    }

    fn webcam_input_args(&self, _video: &str, _audio: Option<&str>) -> DuocastResult<Vec<String>> {
        Err(Self::error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_backend_matches_build_target() {
        let sources = get_sources(&MediaTools::from_path());
        let expected = if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else {
            Platform::Unknown
        };
        assert_eq!(sources.platform(), expected);
    }

    #[test]
    fn unsupported_sources_fail_cleanly() {
        let err = UnsupportedSources.list_video_devices().unwrap_err();
        assert!(matches!(err, DuocastError::Unsupported { .. }));
    }
}
