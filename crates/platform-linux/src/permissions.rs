//! Permission detection and guidance for Linux.
//!
//! smoothwheel reads a raw evdev node, grabs it, and creates a uinput
//! device. Each of those needs access the default desktop user may lack.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use serde::Serialize;

use crate::device::{list_scroll_devices, matches_keywords};

/// A system capability that smoothwheel may need.
#[derive(Debug, Clone, Serialize)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub available: bool,
    pub required: bool,
    pub fix_instructions: Option<String>,
}

/// Check all capabilities and report status.
pub fn check_capabilities(keywords: &[String]) -> Vec<Capability> {
    vec![
        check_input_device_access(),
        check_uinput_access(),
        check_scroll_device(keywords),
    ]
}

/// Whether the input devices can be opened for reading.
fn check_input_device_access() -> Capability {
    let input_dir = Path::new("/dev/input");
    let readable = std::fs::read_dir(input_dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().starts_with("event"))
                .any(|e| can_access(&e.path(), libc::R_OK))
        })
        .unwrap_or(false);

    let in_input_group = std::process::Command::new("groups")
        .output()
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .split_whitespace()
                .any(|g| g == "input")
        })
        .unwrap_or(false);

    Capability {
        name: "Input Device Access".to_string(),
        description: "Read and grab /dev/input/event* (evdev)".to_string(),
        available: readable,
        required: true,
        fix_instructions: if readable {
            None
        } else if !in_input_group {
            Some(
                "Add user to input group: sudo usermod -aG input $USER (logout required), or run as root"
                    .to_string(),
            )
        } else {
            Some("Check the mode of /dev/input/event* (ls -l /dev/input)".to_string())
        },
    }
}

/// Whether a virtual device can be created.
fn check_uinput_access() -> Capability {
    let path = Path::new("/dev/uinput");
    let exists = path.exists();
    let writable = exists && can_access(path, libc::W_OK);

    Capability {
        name: "uinput".to_string(),
        description: "Write access to /dev/uinput for the virtual output device".to_string(),
        available: writable,
        required: true,
        fix_instructions: if writable {
            None
        } else if !exists {
            Some("Load the uinput module: sudo modprobe uinput".to_string())
        } else {
            Some(
                "Run as root or add a udev rule: KERNEL==\"uinput\", GROUP=\"input\", MODE=\"0660\""
                    .to_string(),
            )
        },
    }
}

/// Whether a device matching the keywords is visible.
fn check_scroll_device(keywords: &[String]) -> Capability {
    let devices = list_scroll_devices();
    let matched = devices
        .iter()
        .find(|d| matches_keywords(&d.name, keywords));

    Capability {
        name: "Scroll Device".to_string(),
        description: match matched {
            Some(d) => format!("{} ({})", d.name, d.path.display()),
            None => format!("Wheel device matching {keywords:?}"),
        },
        available: matched.is_some(),
        required: false,
        fix_instructions: match (matched, devices.is_empty()) {
            (Some(_), _) => None,
            (None, true) => Some("No readable wheel devices; fix input access first".to_string()),
            (None, false) => Some(
                "Pass the device path to `smoothwheel run` or add a --keyword (see `smoothwheel list`)"
                    .to_string(),
            ),
        },
    }
}

fn can_access(path: &Path, mode: libc::c_int) -> bool {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), mode) == 0 }
}

/// Print a user-friendly capability report.
pub fn print_capability_report(capabilities: &[Capability]) {
    println!("smoothwheel System Capabilities:");
    println!("{}", "-".repeat(60));

    for cap in capabilities {
        let status = if cap.available {
            "[OK]"
        } else if cap.required {
            "[MISSING - REQUIRED]"
        } else {
            "[MISSING - OPTIONAL]"
        };

        println!("  {} {}: {}", status, cap.name, cap.description);

        if let Some(ref fix) = cap.fix_instructions {
            println!("    Fix: {fix}");
        }
    }
}

/// All required capabilities are available.
pub fn all_required_available(capabilities: &[Capability]) -> bool {
    capabilities.iter().all(|c| c.available || !c.required)
}
