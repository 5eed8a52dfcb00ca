//! `timerfd` tick clock on `CLOCK_MONOTONIC`.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use smoothwheel_common::clock::MonotonicNs;
use smoothwheel_common::error::{SmoothError, SmoothResult};
use smoothwheel_event_loop::TickClock;

const NS_PER_SEC: u64 = 1_000_000_000;

/// One-shot timer rearmed at absolute monotonic deadlines.
pub struct TimerFdClock {
    fd: OwnedFd,
}

impl TimerFdClock {
    pub fn new() -> SmoothResult<Self> {
        let raw = unsafe {
            libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_NONBLOCK | libc::TFD_CLOEXEC)
        };
        if raw < 0 {
            return Err(SmoothError::timer(format!(
                "timerfd_create failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        // SAFETY: timerfd_create returned a fresh descriptor we now own.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        Ok(Self { fd })
    }
}

impl AsRawFd for TimerFdClock {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl TickClock for TimerFdClock {
    fn now_ns(&self) -> MonotonicNs {
        monotonic_now_ns()
    }

    fn arm_at(&mut self, deadline_ns: MonotonicNs) -> SmoothResult<()> {
        // An all-zero it_value disarms the timer.
        let spec = libc::itimerspec {
            it_interval: timespec_from_ns(0),
            it_value: timespec_from_ns(deadline_ns.max(1)),
        };
        let rc = unsafe {
            libc::timerfd_settime(
                self.fd.as_raw_fd(),
                libc::TFD_TIMER_ABSTIME,
                &spec,
                std::ptr::null_mut(),
            )
        };
        if rc < 0 {
            return Err(SmoothError::timer(format!(
                "timerfd_settime failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }

    fn acknowledge(&mut self) -> SmoothResult<u64> {
        let mut expirations: u64 = 0;
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                (&mut expirations as *mut u64).cast::<libc::c_void>(),
                std::mem::size_of::<u64>(),
            )
        };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                return Ok(0);
            }
            return Err(SmoothError::timer(format!("read timerfd failed: {err}")));
        }
        Ok(expirations)
    }
}

/// `CLOCK_MONOTONIC` in nanoseconds.
pub fn monotonic_now_ns() -> MonotonicNs {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // CLOCK_MONOTONIC cannot fail with a valid pointer.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as u64) * NS_PER_SEC + ts.tv_nsec as u64
}

fn timespec_from_ns(ns: u64) -> libc::timespec {
    libc::timespec {
        tv_sec: (ns / NS_PER_SEC) as libc::time_t,
        tv_nsec: (ns % NS_PER_SEC) as libc::c_long,
    }
}
