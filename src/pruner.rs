//! Periodic reclamation of expired voices.
//!
//! The sweep cadence is two independent numbers: how often the timer ticks,
//! and on which ticks it actually sweeps. With the defaults the timer ticks
//! every 60 ms and sweeps every third tick.

use std::{
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{select, tick, Sender};
use tracing::{debug, trace};

/// Tick counter with an explicit duty cycle.
#[derive(Debug, Clone)]
pub struct Pruner {
    interval: Duration,
    duty_cycle: u32,
    ticks: u32,
}

impl Pruner {
    /// A `duty_cycle` of 0 is treated as 1 (sweep on every tick).
    pub fn new(interval: Duration, duty_cycle: u32) -> Self {
        Self {
            interval,
            duty_cycle: duty_cycle.max(1),
            ticks: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn duty_cycle(&self) -> u32 {
        self.duty_cycle
    }

    /// Count one timer tick. Returns `true` when this tick should sweep.
    pub fn on_tick(&mut self) -> bool {
        self.ticks += 1;
        if self.ticks >= self.duty_cycle {
            self.ticks = 0;
            true
        } else {
            false
        }
    }
}

/// Background thread driving a [`Pruner`].
///
/// `sweep` runs on every sweeping tick and returns `false` when the engine
/// it serves is gone, which ends the thread. Dropping the handle stops the
/// thread and joins it.
pub struct PrunerThread {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PrunerThread {
    pub fn spawn<F>(mut pruner: Pruner, mut sweep: F) -> std::io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (shutdown, stop) = crossbeam_channel::bounded::<()>(0);
        let ticker = tick(pruner.interval());

        let handle = thread::Builder::new()
            .name("tinysynth-pruner".into())
            .spawn(move || {
                debug!(interval = ?pruner.interval(), duty_cycle = pruner.duty_cycle(), "pruner started");
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            if pruner.on_tick() {
                                trace!("pruner sweep");
                                if !sweep() {
                                    break;
                                }
                            }
                        }
                        recv(stop) -> _ => break,
                    }
                }
                debug!("pruner stopped");
            })?;

        Ok(Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it. Idempotent.
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the channel and wakes the select.
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PrunerThread {
    fn drop(&mut self) {
        self.stop();
    }
}
