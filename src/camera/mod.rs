//! Local camera probing for the live self-test.
//!
//! Frames shown to the operator come from the analysis service, not from this
//! probe. The adapter only proves a camera is present, permitted and free, then
//! releases it immediately.

pub mod devices;

pub use devices::SystemVideoDevices;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

/// Operator-facing acquisition failure categories.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase", tag = "category", content = "detail")]
pub enum AcquisitionError {
    #[error("Camera access requires a secure connection (wss/https) or a local server.")]
    InsecureContext,
    #[error("Camera permission denied. Grant access to the video device and retry.")]
    PermissionDenied,
    #[error("No camera was found on this device. Connect a camera.")]
    NotFound,
    #[error("The camera could not be started. Make sure no other application is using it.")]
    Busy,
    #[error("Error accessing the camera: {0}")]
    Other(String),
}

/// Why a single device refused to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOpenError {
    PermissionDenied,
    NotFound,
    Busy,
    Other(String),
}

impl From<DeviceOpenError> for AcquisitionError {
    fn from(err: DeviceOpenError) -> Self {
        match err {
            DeviceOpenError::PermissionDenied => AcquisitionError::PermissionDenied,
            DeviceOpenError::NotFound => AcquisitionError::NotFound,
            DeviceOpenError::Busy => AcquisitionError::Busy,
            DeviceOpenError::Other(message) => AcquisitionError::Other(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoDevice {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 320,
            ideal_height: 180,
        }
    }
}

/// Device that accepted the probe. The probe stream is already released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquiredCamera {
    pub device: VideoDevice,
    pub constraints: CaptureConstraints,
}

/// Blocking access to the platform's video inputs.
pub trait VideoDeviceBackend: Send + Sync {
    fn enumerate(&self) -> Result<Vec<VideoDevice>, DeviceOpenError>;
    /// Opens and immediately releases a capture stream on `device`.
    fn probe(
        &self,
        device: &VideoDevice,
        constraints: CaptureConstraints,
    ) -> Result<(), DeviceOpenError>;
}

pub struct CameraAdapter {
    backend: Arc<dyn VideoDeviceBackend>,
    secure_context: bool,
    constraints: CaptureConstraints,
}

impl CameraAdapter {
    pub fn new(backend: Arc<dyn VideoDeviceBackend>, secure_context: bool) -> Self {
        Self {
            backend,
            secure_context,
            constraints: CaptureConstraints::default(),
        }
    }

    pub async fn acquire(&self) -> Result<AcquiredCamera, AcquisitionError> {
        if !self.secure_context {
            return Err(AcquisitionError::InsecureContext);
        }

        let backend = Arc::clone(&self.backend);
        let constraints = self.constraints;
        tokio::task::spawn_blocking(move || acquire_blocking(backend.as_ref(), constraints))
            .await
            .map_err(|err| AcquisitionError::Other(format!("camera probe worker failed: {err}")))?
    }
}

fn acquire_blocking(
    backend: &dyn VideoDeviceBackend,
    constraints: CaptureConstraints,
) -> Result<AcquiredCamera, AcquisitionError> {
    let devices = backend.enumerate()?;
    if devices.is_empty() {
        return Err(AcquisitionError::NotFound);
    }

    let mut last_error = None;
    for device in devices {
        match backend.probe(&device, constraints) {
            Ok(()) => {
                log::info!("camera available: {} ({})", device.label, device.id);
                return Ok(AcquiredCamera {
                    device,
                    constraints,
                });
            }
            Err(err) => {
                log::warn!("camera {} unavailable: {err:?}", device.label);
                last_error = Some(err);
            }
        }
    }

    Err(last_error
        .map(AcquisitionError::from)
        .unwrap_or(AcquisitionError::NotFound))
}
