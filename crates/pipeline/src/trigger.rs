//! Sources of scheduler firings.
//!
//! The scheduler loop asks its `TriggerSource` for the next firing and runs a
//! cycle each time one arrives. `DailyTrigger` fires once per day at a local
//! wall-clock time; `ManualTrigger` fires whenever its sender is signalled.

use crate::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Days, Duration, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A job as reported by the scheduler status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledJob {
    pub id: String,
    pub name: String,
    pub next_run_time: Option<DateTime<FixedOffset>>,
}

#[async_trait]
pub trait TriggerSource: Send {
    /// Waits for the next firing and returns its instant. `None` means the
    /// source is exhausted and the scheduler should stop.
    async fn next_fire(&mut self) -> Option<DateTime<Utc>>;

    /// Describes the job this source drives, including its next firing.
    fn job(&self) -> ScheduledJob;
}

/// Fires every day at `at` local time in `tz`.
#[derive(Debug)]
pub struct DailyTrigger {
    at: NaiveTime,
    tz: Tz,
    clock: Arc<dyn Clock>,
    next: DateTime<Utc>,
}

impl DailyTrigger {
    pub fn new(at: NaiveTime, tz: Tz, clock: Arc<dyn Clock>) -> Self {
        let next = next_run_after(clock.now(), at, tz);
        Self { at, tz, clock, next }
    }

    pub fn next_run(&self) -> DateTime<Tz> {
        self.next.with_timezone(&self.tz)
    }
}

#[async_trait]
impl TriggerSource for DailyTrigger {
    async fn next_fire(&mut self) -> Option<DateTime<Utc>> {
        // Sleep in a loop: the timer and the wall clock can drift apart.
        loop {
            let now = self.clock.now();
            if now >= self.next {
                break;
            }
            let wait = (self.next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
        }
        let fired = self.next;
        self.next = next_run_after(fired, self.at, self.tz);
        Some(fired)
    }

    fn job(&self) -> ScheduledJob {
        ScheduledJob {
            id: "daily_forecast".to_string(),
            name: format!("Daily forecast at {} {}", self.at.format("%H:%M"), self.tz),
            next_run_time: Some(self.next_run().fixed_offset()),
        }
    }
}

/// The first instant strictly after `after` whose local time in `tz` is `at`.
///
/// A local time skipped by a DST gap resolves to the same wall time one hour
/// later; a repeated local time resolves to its first occurrence.
pub fn next_run_after(after: DateTime<Utc>, at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let today = after.with_timezone(&tz).date_naive();
    (0..=2)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|date| resolve_local(date.and_time(at), tz))
        .map(|local| local.with_timezone(&Utc))
        .find(|candidate| *candidate > after)
        .unwrap_or(after + Duration::days(1))
}

fn resolve_local(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}

/// Fires once per message received on its channel.
#[derive(Debug)]
pub struct ManualTrigger {
    rx: mpsc::Receiver<()>,
}

impl ManualTrigger {
    /// Returns the sender that fires the trigger. Dropping every sender
    /// exhausts the trigger.
    pub fn channel(capacity: usize) -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl TriggerSource for ManualTrigger {
    async fn next_fire(&mut self) -> Option<DateTime<Utc>> {
        self.rx.recv().await.map(|()| Utc::now())
    }

    fn job(&self) -> ScheduledJob {
        ScheduledJob {
            id: "manual".to_string(),
            name: "On-demand forecast".to_string(),
            next_run_time: None,
        }
    }
}
