//! Grab a device and run the smoothing loop until interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use smoothwheel_common::config::AppConfig;
use smoothwheel_event_loop::{ScrollReactor, StopReason};
use smoothwheel_platform_linux::{
    find_scroll_device, EpollMultiplexer, EvdevSource, TimerFdClock, UinputSink,
};

pub fn run(config: AppConfig) -> anyhow::Result<()> {
    let path = match config.device.path {
        Some(ref path) => path.clone(),
        None => {
            let device = find_scroll_device(&config.device.keywords)?;
            tracing::info!(path = %device.path.display(), name = %device.name, "Auto-detected device");
            device.path
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop_clone = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            stop_clone.store(true, Ordering::Relaxed);
        })
        .context("failed to install signal handler")?;
    }

    let mut source = EvdevSource::open(&path)
        .with_context(|| format!("failed to open source device '{}'", path.display()))?;
    let sink = UinputSink::mirror(source.device()).context("failed to create virtual device")?;

    // Let udev and libinput pick up the virtual device before the source
    // goes silent.
    std::thread::sleep(Duration::from_millis(config.device.settle_ms));
    source.grab()?;

    let clock = TimerFdClock::new()?;
    let mux = EpollMultiplexer::new(&source, &clock)?;

    let mut reactor = ScrollReactor::new(config.scroll.clone(), source, clock, mux, sink)?
        .with_stop_flag(stop);
    let summary = reactor.run()?;

    match summary.reason {
        StopReason::Requested => tracing::info!("Shutting down"),
        StopReason::SourceLost(ref why) => tracing::warn!(reason = %why, "Source device lost"),
    }
    tracing::info!(
        stats = %serde_json::to_string(&summary.stats)?,
        device = reactor.sink().name(),
        kernel_writes = reactor.sink().flushed(),
        "Session totals"
    );

    // Dropping the reactor releases the grab and destroys the virtual device.
    drop(reactor);
    Ok(())
}
