//! Daily Schedule - Next Report Instant in a Fixed UTC Offset

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};

use crate::config::ScheduleConfig;

/// Once-a-day trigger at a local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
  at: NaiveTime,
  offset: FixedOffset,
}

impl DailySchedule {
  pub fn new(at: NaiveTime, offset: FixedOffset) -> Self {
    Self { at, offset }
  }

  pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
    let at = NaiveTime::parse_from_str(&config.daily_at, "%H:%M")
      .with_context(|| format!("Invalid daily_at: {}", config.daily_at))?;
    let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600)
      .with_context(|| format!("Invalid utc_offset_hours: {}", config.utc_offset_hours))?;
    Ok(Self::new(at, offset))
  }

  pub fn offset(&self) -> FixedOffset {
    self.offset
  }

  /// `now` shown in the schedule's offset.
  pub fn local(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
    now.with_timezone(&self.offset)
  }

  /// The first trigger strictly after `now`.
  pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    let local_now = self.local(now);
    let today = local_now.date_naive().and_time(self.at);
    // A fixed offset has no gaps or folds, so this is always unique.
    let candidate = self
      .offset
      .from_local_datetime(&today)
      .single()
      .unwrap_or(local_now);

    let next = if candidate > local_now {
      candidate
    } else {
      candidate + Duration::days(1)
    };
    next.with_timezone(&Utc)
  }
}
