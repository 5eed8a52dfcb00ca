//! smoothwheel Linux Platform Integration
//!
//! Platform-specific implementations for Linux:
//! - **evdev:** scroll device discovery and the grabbed input source
//! - **uinput:** the virtual output device mirroring the source
//! - **timerfd / epoll:** the tick clock and readiness multiplexer
//! - **Permissions:** capability detection and user guidance

pub mod device;
pub mod permissions;
pub mod poller;
pub mod timer;
pub mod uinput;

pub use device::{find_scroll_device, list_scroll_devices, EvdevSource, ScrollDevice};
pub use poller::EpollMultiplexer;
pub use timer::TimerFdClock;
pub use uinput::UinputSink;
