use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use super::worker::Worker;

/// Drives the worker with two independent timers: a short sweep interval and
/// a long rotation interval. Both fire once immediately on start.
pub struct Scheduler {
    worker: Worker,
    sweep_every: Duration,
    rotate_every: Duration,
}

impl Scheduler {
    pub fn new(worker: Worker, sweep_every: Duration, rotate_every: Duration) -> Self {
        Self { worker, sweep_every, rotate_every }
    }

    /// Start both loops. They run until their handles are aborted.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        info!(
            sweep_every_secs = self.sweep_every.as_secs(),
            rotate_every_secs = self.rotate_every.as_secs(),
            "Starting worker loops"
        );
        vec![self.start_sweeps(), self.start_rotation()]
    }

    fn start_sweeps(&self) -> JoinHandle<()> {
        let worker = self.worker.clone();
        let period = self.sweep_every;

        tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;
                debug!("Sweep timer fired");

                // A slow sweep never holds back the next one.
                let worker = worker.clone();
                tokio::spawn(async move {
                    worker.sweep().await;
                });
            }
        })
    }

    fn start_rotation(&self) -> JoinHandle<()> {
        let worker = self.worker.clone();
        let period = self.rotate_every;

        tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;
                debug!("Rotation timer fired");
                worker.rotate_logs().await;
            }
        })
    }
}
