//! Self-rearming scrape scheduler.
//!
//! Runs one [`Cycle`] per tick on the calling thread. The next tick is only
//! armed once the current cycle has finished, so at most one cycle is ever
//! in flight. The loop has no terminal state; it ends only when a cycle
//! reports a connection failure or the process is terminated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::error::Result;
use crate::scrape::{Cycle, Sleeper};

/// How the delay before the next cycle is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulePolicy {
    /// Wait a full interval after the previous cycle finished; long cycles
    /// stretch the effective period.
    #[default]
    AfterCompletion,
    /// Wait whatever remains of the interval measured from the previous
    /// cycle's start; a cycle longer than the interval is followed
    /// immediately by the next one.
    FixedRate,
}

impl SchedulePolicy {
    pub fn next_delay(&self, interval: Duration, cycle_duration: Duration) -> Duration {
        match self {
            SchedulePolicy::AfterCompletion => interval,
            SchedulePolicy::FixedRate => interval.saturating_sub(cycle_duration),
        }
    }
}

impl fmt::Display for SchedulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulePolicy::AfterCompletion => write!(f, "after-completion"),
            SchedulePolicy::FixedRate => write!(f, "fixed-rate"),
        }
    }
}

/// States of the scheduling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

pub struct Scheduler<C: Cycle> {
    cycle: C,
    interval: Duration,
    policy: SchedulePolicy,
    state: SchedulerState,
    sleep: Sleeper,
}

impl<C: Cycle> Scheduler<C> {
    pub fn new(cycle: C, interval: Duration, policy: SchedulePolicy) -> Self {
        Self {
            cycle,
            interval,
            policy,
            state: SchedulerState::Idle,
            sleep: Box::new(std::thread::sleep),
        }
    }

    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + Send + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cycle(&self) -> &C {
        &self.cycle
    }

    /// Runs one cycle (IDLE → RUNNING → IDLE) and returns the delay before
    /// the next one.
    pub fn tick(&mut self) -> Result<Duration> {
        let start = Instant::now();
        self.state = SchedulerState::Running;
        let result = self.cycle.run_cycle();
        self.state = SchedulerState::Idle;

        result?;
        let delay = self.policy.next_delay(self.interval, start.elapsed());
        debug!("Next scrape cycle in {:.3}s", delay.as_secs_f64());
        Ok(delay)
    }

    /// Runs cycles forever. The first cycle starts immediately.
    pub fn run(mut self) -> Result<()> {
        loop {
            match self.tick() {
                Ok(delay) => (self.sleep)(delay),
                Err(e) => {
                    error!("Scrape cycle aborted: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExporterError;
    use crate::health_stats::CycleReport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct CountingCycle {
        runs: usize,
        fail_on: Option<usize>,
    }

    impl Cycle for CountingCycle {
        fn run_cycle(&mut self) -> Result<CycleReport> {
            self.runs += 1;
            if Some(self.runs) == self.fail_on {
                return Err(ExporterError::Connection {
                    uri: "test:///default".into(),
                    reason: "daemon went away".into(),
                });
            }
            Ok(CycleReport::default())
        }
    }

    #[test]
    fn test_after_completion_waits_full_interval() {
        let policy = SchedulePolicy::AfterCompletion;
        assert_eq!(
            policy.next_delay(Duration::from_secs(5), Duration::from_secs(3)),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.next_delay(Duration::from_secs(5), Duration::from_secs(9)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_fixed_rate_subtracts_cycle_time() {
        let policy = SchedulePolicy::FixedRate;
        assert_eq!(
            policy.next_delay(Duration::from_secs(5), Duration::from_secs(3)),
            Duration::from_secs(2)
        );
        assert_eq!(
            policy.next_delay(Duration::from_secs(5), Duration::from_secs(9)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_tick_returns_to_idle() {
        let mut scheduler = Scheduler::new(
            CountingCycle {
                runs: 0,
                fail_on: None,
            },
            Duration::from_secs(5),
            SchedulePolicy::AfterCompletion,
        );
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.tick().unwrap(), Duration::from_secs(5));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.cycle().runs, 1);
    }

    #[test]
    fn test_run_rearms_until_connection_failure() {
        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let recorded = sleeps.clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let scheduler = Scheduler::new(
            CountingCycle {
                runs: 0,
                fail_on: Some(4),
            },
            Duration::from_secs(5),
            SchedulePolicy::AfterCompletion,
        )
        .with_sleeper(move |d| {
            counter.fetch_add(1, Ordering::SeqCst);
            recorded.lock().unwrap().push(d);
        });

        let err = scheduler.run().unwrap_err();
        assert!(err.is_connection_failure());
        // Three successful cycles, each followed by one re-arm.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(sleeps
            .lock()
            .unwrap()
            .iter()
            .all(|d| *d == Duration::from_secs(5)));
    }

    #[test]
    fn test_policy_serde_names() {
        let policy: SchedulePolicy = serde_yaml::from_str("fixed-rate").unwrap();
        assert_eq!(policy, SchedulePolicy::FixedRate);
        assert_eq!(SchedulePolicy::AfterCompletion.to_string(), "after-completion");
    }
}
