//! Scroll device discovery and the grabbed evdev input source.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use evdev::raw_stream::RawDevice;
use evdev::RelativeAxisType;
use serde::Serialize;
use smoothwheel_common::error::{SmoothError, SmoothResult};
use smoothwheel_event_loop::InputSource;
use smoothwheel_scroll_core::RawEvent;

use crate::uinput::VIRTUAL_NAME_SUFFIX;

/// A scroll-capable input device found under `/dev/input`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrollDevice {
    pub path: PathBuf,
    pub name: String,
    /// Advertises `REL_WHEEL_HI_RES`.
    pub hi_res: bool,
    /// Advertises `REL_HWHEEL`.
    pub horizontal: bool,
}

/// Every readable device that advertises `REL_WHEEL`, sorted by path.
///
/// Virtual devices created by this tool are skipped so a second instance
/// never picks up the output of the first.
pub fn list_scroll_devices() -> Vec<ScrollDevice> {
    let mut devices: Vec<ScrollDevice> = evdev::enumerate()
        .filter_map(|(path, device)| {
            let axes = device.supported_relative_axes()?;
            if !axes.contains(RelativeAxisType::REL_WHEEL) {
                return None;
            }
            let name = device.name().unwrap_or("unnamed").to_string();
            if name.ends_with(VIRTUAL_NAME_SUFFIX) {
                return None;
            }
            Some(ScrollDevice {
                path,
                name,
                hi_res: axes.contains(RelativeAxisType::REL_WHEEL_HI_RES),
                horizontal: axes.contains(RelativeAxisType::REL_HWHEEL),
            })
        })
        .collect();
    devices.sort_by(|a, b| a.path.cmp(&b.path));
    devices
}

/// First scroll device whose name contains one of `keywords`.
pub fn find_scroll_device(keywords: &[String]) -> SmoothResult<ScrollDevice> {
    let devices = list_scroll_devices();
    tracing::debug!(candidates = devices.len(), ?keywords, "Scanning for scroll device");

    select_device(devices, keywords).ok_or_else(|| {
        SmoothError::device(format!(
            "no scroll device matching {keywords:?} found; pass a device path explicitly"
        ))
    })
}

fn select_device(devices: Vec<ScrollDevice>, keywords: &[String]) -> Option<ScrollDevice> {
    devices
        .into_iter()
        .find(|device| matches_keywords(&device.name, keywords))
}

/// Case-insensitive substring match against any keyword.
pub fn matches_keywords(name: &str, keywords: &[String]) -> bool {
    let name = name.to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.is_empty())
        .any(|k| name.contains(&k.to_lowercase()))
}

/// Grabbed evdev device read without blocking.
pub struct EvdevSource {
    device: RawDevice,
    path: PathBuf,
    name: String,
    pending: VecDeque<RawEvent>,
    grabbed: bool,
}

impl EvdevSource {
    /// Open `path` for non-blocking reads. The device is not grabbed yet.
    pub fn open(path: &Path) -> SmoothResult<Self> {
        if !path.exists() {
            return Err(SmoothError::DeviceNotFound {
                path: path.to_path_buf(),
            });
        }

        let device = RawDevice::open(path).map_err(|e| {
            if e.kind() == ErrorKind::PermissionDenied {
                SmoothError::permission_denied(device_access_diagnostic(path))
            } else {
                SmoothError::device(format!("Failed to open {}: {e}", path.display()))
            }
        })?;
        set_nonblocking(device.as_raw_fd())?;

        let name = device.name().unwrap_or("unnamed").to_string();
        tracing::info!(path = %path.display(), name = %name, "Opened source device");

        Ok(Self {
            device,
            path: path.to_path_buf(),
            name,
            pending: VecDeque::new(),
            grabbed: false,
        })
    }

    /// Take exclusive access so the original events stop reaching other
    /// readers.
    pub fn grab(&mut self) -> SmoothResult<()> {
        self.device.grab().map_err(|e| {
            SmoothError::device(format!("Failed to grab {}: {e}", self.path.display()))
        })?;
        self.grabbed = true;
        tracing::info!(path = %self.path.display(), "Grabbed source device");
        Ok(())
    }

    pub fn device(&self) -> &RawDevice {
        &self.device
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fill_pending(&mut self) -> SmoothResult<bool> {
        loop {
            match self.device.fetch_events() {
                Ok(events) => {
                    let before = self.pending.len();
                    self.pending.extend(
                        events.map(|ev| RawEvent::new(ev.event_type().0, ev.code(), ev.value())),
                    );
                    if self.pending.len() == before {
                        return Err(SmoothError::source_lost(format!(
                            "{} reached end of stream",
                            self.path.display()
                        )));
                    }
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(SmoothError::source_lost(format!(
                        "read from {} failed: {e}",
                        self.path.display()
                    )))
                }
            }
        }
    }
}

impl InputSource for EvdevSource {
    fn read_event(&mut self) -> SmoothResult<Option<RawEvent>> {
        if self.pending.is_empty() && !self.fill_pending()? {
            return Ok(None);
        }
        Ok(self.pending.pop_front())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl AsRawFd for EvdevSource {
    fn as_raw_fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }
}

impl Drop for EvdevSource {
    fn drop(&mut self) {
        if self.grabbed {
            if let Err(e) = self.device.ungrab() {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to release grab");
            } else {
                tracing::debug!(path = %self.path.display(), "Released source device");
            }
        }
    }
}

fn set_nonblocking(fd: RawFd) -> SmoothResult<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(SmoothError::device(format!(
            "fcntl(F_GETFL) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(SmoothError::device(format!(
            "fcntl(F_SETFL, O_NONBLOCK) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

/// Ownership and mode of a device node next to the process credentials.
pub fn device_access_diagnostic(path: &Path) -> String {
    let uid = unsafe { libc::geteuid() };
    let gid = unsafe { libc::getegid() };

    match std::fs::metadata(path) {
        Ok(meta) => format!(
            "device={} mode={:o} owner_uid={} owner_gid={} process_uid={uid} process_gid={gid}; \
             run as root or add the user to the 'input' group (sudo usermod -aG input $USER)",
            path.display(),
            meta.mode() & 0o777,
            meta.uid(),
            meta.gid(),
        ),
        Err(err) => format!("device={} unavailable ({err})", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn device(path: &str, name: &str) -> ScrollDevice {
        ScrollDevice {
            path: PathBuf::from(path),
            name: name.to_string(),
            hi_res: false,
            horizontal: false,
        }
    }

    #[test]
    fn test_keyword_match_ignores_case() {
        let words = keywords(&["spice", "qemu", "virtio"]);
        assert!(matches_keywords("QEMU Virtio Tablet", &words));
        assert!(matches_keywords("spice vdagent mouse", &words));
        assert!(!matches_keywords("Logitech USB Receiver", &words));
    }

    #[test]
    fn test_empty_keyword_matches_nothing() {
        assert!(!matches_keywords("anything", &keywords(&[""])));
        assert!(!matches_keywords("anything", &[]));
    }

    #[test]
    fn test_select_first_match_in_path_order() {
        let devices = vec![
            device("/dev/input/event2", "Logitech Mouse"),
            device("/dev/input/event5", "QEMU USB Mouse"),
            device("/dev/input/event7", "virtio-mouse"),
        ];
        let picked = select_device(devices, &keywords(&["virtio", "qemu"])).unwrap();
        assert_eq!(picked.path, PathBuf::from("/dev/input/event5"));
    }

    #[test]
    fn test_open_missing_device() {
        let err = EvdevSource::open(Path::new("/dev/input/does-not-exist")).err();
        assert!(matches!(err, Some(SmoothError::DeviceNotFound { .. })));
    }

    #[test]
    fn test_diagnostic_for_missing_node() {
        let msg = device_access_diagnostic(Path::new("/dev/input/does-not-exist"));
        assert!(msg.contains("unavailable"));
    }
}
