//! Virtual output device that mirrors the grabbed source.

use evdev::raw_stream::RawDevice;
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AbsInfo, AttributeSet, EventType, InputEvent, RelativeAxisType, UinputAbsSetup};
use smoothwheel_common::error::{SmoothError, SmoothResult};
use smoothwheel_scroll_core::{EventSink, RawEvent};

/// Appended to the source name to form the virtual device name.
pub const VIRTUAL_NAME_SUFFIX: &str = " (smooth scroll)";

/// Relative axes the virtual device always carries, whatever the source has.
const SCROLL_AXES: [RelativeAxisType; 4] = [
    RelativeAxisType::REL_WHEEL,
    RelativeAxisType::REL_HWHEEL,
    RelativeAxisType::REL_WHEEL_HI_RES,
    RelativeAxisType::REL_HWHEEL_HI_RES,
];

/// Name for the virtual twin of a source device.
pub fn virtual_device_name(source_name: &str) -> String {
    format!("{source_name}{VIRTUAL_NAME_SUFFIX}")
}

/// Buffered uinput sink.
///
/// Records are queued until [`EventSink::end_frame`], which hands the batch
/// to the kernel in one write followed by `SYN_REPORT`.
pub struct UinputSink {
    device: VirtualDevice,
    name: String,
    batch: Vec<InputEvent>,
    flushed: u64,
}

impl UinputSink {
    /// Create a virtual device with the source's identity and capabilities
    /// plus all four scroll axes.
    pub fn mirror(source: &RawDevice) -> SmoothResult<Self> {
        let name = virtual_device_name(source.name().unwrap_or("unnamed"));

        let mut builder = VirtualDeviceBuilder::new()
            .map_err(|e| uinput_error("open /dev/uinput", e))?
            .name(name.as_bytes())
            .input_id(source.input_id());

        if let Some(keys) = source.supported_keys() {
            builder = builder
                .with_keys(keys)
                .map_err(|e| uinput_error("set key capabilities", e))?;
        }

        let mut rel = AttributeSet::<RelativeAxisType>::new();
        if let Some(axes) = source.supported_relative_axes() {
            for axis in axes.iter() {
                rel.insert(axis);
            }
        }
        for axis in SCROLL_AXES {
            rel.insert(axis);
        }
        builder = builder
            .with_relative_axes(&rel)
            .map_err(|e| uinput_error("set relative axes", e))?;

        if let Some(abs_axes) = source.supported_absolute_axes() {
            match source.get_abs_state() {
                Ok(state) => {
                    for axis in abs_axes.iter() {
                        let Some(info) = state.get(axis.0 as usize) else {
                            continue;
                        };
                        let setup = UinputAbsSetup::new(
                            axis,
                            AbsInfo::new(
                                info.value,
                                info.minimum,
                                info.maximum,
                                info.fuzz,
                                info.flat,
                                info.resolution,
                            ),
                        );
                        builder = builder
                            .with_absolute_axis(&setup)
                            .map_err(|e| uinput_error("set absolute axis", e))?;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not read absolute axis info, skipping absolute axes");
                }
            }
        }

        if let Some(switches) = source.supported_switches() {
            builder = builder
                .with_switches(switches)
                .map_err(|e| uinput_error("set switches", e))?;
        }

        if let Some(misc) = source.misc_properties() {
            builder = builder
                .with_msc(misc)
                .map_err(|e| uinput_error("set misc codes", e))?;
        }

        let device = builder
            .build()
            .map_err(|e| uinput_error("create virtual device", e))?;
        tracing::info!(name = %name, "Created virtual device");

        Ok(Self {
            device,
            name,
            batch: Vec::with_capacity(16),
            flushed: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Batches written to the kernel so far.
    pub fn flushed(&self) -> u64 {
        self.flushed
    }
}

impl EventSink for UinputSink {
    fn write_event(&mut self, event: RawEvent) -> SmoothResult<()> {
        self.batch
            .push(InputEvent::new(EventType(event.event_type), event.code, event.value));
        Ok(())
    }

    fn end_frame(&mut self) -> SmoothResult<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        // The batch is dropped even on failure so one bad frame does not
        // poison the next.
        let result = self.device.emit(&self.batch);
        self.batch.clear();
        result.map_err(|e| uinput_error("write frame", e))?;
        self.flushed += 1;
        Ok(())
    }
}

fn uinput_error(action: &str, err: std::io::Error) -> SmoothError {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        SmoothError::permission_denied(format!(
            "{action}: {err}; /dev/uinput must be writable (root or a udev rule)"
        ))
    } else {
        SmoothError::uinput(format!("{action}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_name() {
        assert_eq!(
            virtual_device_name("QEMU USB Tablet"),
            "QEMU USB Tablet (smooth scroll)"
        );
        assert!(virtual_device_name("x").ends_with(VIRTUAL_NAME_SUFFIX));
    }

    #[test]
    fn test_scroll_axes_cover_both_resolutions() {
        let codes: Vec<u16> = SCROLL_AXES.iter().map(|a| a.0).collect();
        assert_eq!(codes, vec![0x08, 0x06, 0x0b, 0x0c]);
    }

    #[test]
    fn test_permission_error_mapping() {
        let err = uinput_error(
            "open /dev/uinput",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, SmoothError::PermissionDenied { .. }));

        let err = uinput_error("write frame", std::io::Error::from(std::io::ErrorKind::Other));
        assert!(matches!(err, SmoothError::Uinput { .. }));
    }
}
