use std::future;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// The timer driving periodic effects. At most one period runs at a time.
#[derive(Debug, Default)]
pub struct Scheduler {
    timer: Option<Interval>,
}

impl Scheduler {
    pub fn new() -> Scheduler {
        Scheduler { timer: None }
    }

    /// Replaces any running timer with one firing every `period`, starting one period from now.
    pub fn arm(&mut self, period: Duration) {
        // Interval panics on a zero period
        let period = period.max(Duration::from_millis(1));
        log::debug!("Scheduling ticks every {:?}", period);

        let mut timer = time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
    }

    pub fn disarm(&mut self) {
        if self.timer.take().is_some() {
            log::debug!("Stopped scheduled ticks");
        }
    }

    #[cfg(test)]
    pub fn period(&self) -> Option<Duration> {
        self.timer.as_ref().map(|timer| timer.period())
    }

    /// Completes on the next tick. Never completes while disarmed.
    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => future::pending().await,
        }
    }
}
