use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{CaptureConstraints, DeviceOpenError, VideoDevice, VideoDeviceBackend};

/// V4L2 device nodes under `/dev`. Platforms without them enumerate nothing.
pub struct SystemVideoDevices {
    dev_dir: PathBuf,
}

impl SystemVideoDevices {
    pub fn new() -> Self {
        Self::with_dev_dir(PathBuf::from("/dev"))
    }

    pub fn with_dev_dir(dev_dir: PathBuf) -> Self {
        Self { dev_dir }
    }
}

impl Default for SystemVideoDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoDeviceBackend for SystemVideoDevices {
    fn enumerate(&self) -> Result<Vec<VideoDevice>, DeviceOpenError> {
        let entries = match fs::read_dir(&self.dev_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(classify_io_error(&err)),
        };

        let mut indexed: Vec<(u32, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let index = name.strip_prefix("video")?.parse::<u32>().ok()?;
                Some((index, entry.path()))
            })
            .collect();
        indexed.sort_by_key(|(index, _)| *index);

        Ok(indexed
            .into_iter()
            .map(|(index, path)| VideoDevice {
                label: device_label(&path).unwrap_or_else(|| format!("video{index}")),
                id: path.display().to_string(),
            })
            .collect())
    }

    fn probe(
        &self,
        device: &VideoDevice,
        constraints: CaptureConstraints,
    ) -> Result<(), DeviceOpenError> {
        log::debug!(
            "probing {} at {}x{}",
            device.id,
            constraints.ideal_width,
            constraints.ideal_height
        );
        start_capture(&device.id, constraints).map_err(|err| classify_io_error(&err))
    }
}

/// Buffers requested for the probe stream.
#[cfg(target_os = "linux")]
const PROBE_BUFFERS: u32 = 2;

/// Negotiates the format and starts streaming. The stream and the device
/// handle drop on return, releasing the camera.
#[cfg(target_os = "linux")]
fn start_capture(path: &str, constraints: CaptureConstraints) -> io::Result<()> {
    use v4l::buffer::Type;
    use v4l::io::mmap::Stream;
    use v4l::io::traits::Stream as _;
    use v4l::video::Capture;
    use v4l::Device;

    let device = Device::with_path(path)?;
    let mut format = device.format()?;
    format.width = constraints.ideal_width;
    format.height = constraints.ideal_height;
    let format = device.set_format(&format)?;
    log::debug!("{path} negotiated {}x{} {}", format.width, format.height, format.fourcc);

    // A camera held by another process opens fine; EBUSY shows up here.
    let mut stream = Stream::with_buffers(&device, Type::VideoCapture, PROBE_BUFFERS)?;
    stream.start()
}

#[cfg(not(target_os = "linux"))]
fn start_capture(path: &str, _constraints: CaptureConstraints) -> io::Result<()> {
    fs::OpenOptions::new().read(true).write(true).open(path).map(drop)
}

/// Reads the driver-provided name from sysfs when available.
fn device_label(path: &Path) -> Option<String> {
    let node = path.file_name()?.to_str()?;
    let name = fs::read_to_string(format!("/sys/class/video4linux/{node}/name")).ok()?;
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// `EBUSY` on Linux and macOS.
const EBUSY: i32 = 16;

pub(crate) fn classify_io_error(err: &io::Error) -> DeviceOpenError {
    if err.raw_os_error() == Some(EBUSY) {
        return DeviceOpenError::Busy;
    }
    match err.kind() {
        io::ErrorKind::PermissionDenied => DeviceOpenError::PermissionDenied,
        io::ErrorKind::NotFound => DeviceOpenError::NotFound,
        _ => DeviceOpenError::Other(err.to_string()),
    }
}
