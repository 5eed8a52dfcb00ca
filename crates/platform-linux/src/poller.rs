//! `epoll` multiplexer over the input device and the tick timer.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use smoothwheel_common::error::{SmoothError, SmoothResult};
use smoothwheel_event_loop::{Multiplexer, Readiness};

const INPUT_TOKEN: u64 = 0;
const CLOCK_TOKEN: u64 = 1;

/// Level-triggered epoll set with exactly two members.
///
/// The registered descriptors are borrowed, not owned. They must stay open
/// for as long as the multiplexer is waited on.
pub struct EpollMultiplexer {
    fd: OwnedFd,
}

impl EpollMultiplexer {
    pub fn new(input: &impl AsRawFd, clock: &impl AsRawFd) -> SmoothResult<Self> {
        let raw = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if raw < 0 {
            return Err(SmoothError::poll(format!(
                "epoll_create1 failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        // SAFETY: epoll_create1 returned a fresh descriptor we now own.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        let mux = Self { fd };
        mux.register(input.as_raw_fd(), INPUT_TOKEN)?;
        mux.register(clock.as_raw_fd(), CLOCK_TOKEN)?;
        Ok(mux)
    }

    fn register(&self, target: RawFd, token: u64) -> SmoothResult<()> {
        let mut event = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: token,
        };
        let rc = unsafe {
            libc::epoll_ctl(self.fd.as_raw_fd(), libc::EPOLL_CTL_ADD, target, &mut event)
        };
        if rc < 0 {
            return Err(SmoothError::poll(format!(
                "epoll_ctl(ADD, fd={target}) failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }
}

impl Multiplexer for EpollMultiplexer {
    fn wait(&mut self) -> SmoothResult<Readiness> {
        let mut events = [libc::epoll_event { events: 0, u64: 0 }; 2];
        let n = unsafe {
            libc::epoll_wait(
                self.fd.as_raw_fd(),
                events.as_mut_ptr(),
                events.len() as libc::c_int,
                -1,
            )
        };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(Readiness::interrupted());
            }
            return Err(SmoothError::poll(format!("epoll_wait failed: {err}")));
        }

        Ok(readiness_from(&events[..n as usize]))
    }
}

/// Hangup and error on the input count as readable so the next read
/// reports the failure.
fn readiness_from(events: &[libc::epoll_event]) -> Readiness {
    let mut ready = Readiness::default();
    let wake_mask = (libc::EPOLLIN | libc::EPOLLHUP | libc::EPOLLERR) as u32;
    for event in events {
        // Copy out of the packed struct before use.
        let (flags, token) = (event.events, event.u64);
        if flags & wake_mask == 0 {
            continue;
        }
        match token {
            INPUT_TOKEN => ready.input = true,
            CLOCK_TOKEN => ready.clock = true,
            _ => {}
        }
    }
    ready
}
