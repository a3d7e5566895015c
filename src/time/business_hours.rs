//! Timezone service with a configurable local business window.

use async_trait::async_trait;
use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::warn;

use super::clock::Clock;
use crate::config::FollowUpConfig;
use crate::types::{FlowError, Result};

/// Days searched ahead for the next business slot
const MAX_LOOKAHEAD_DAYS: i64 = 14;

/// Lead-local time arithmetic
#[async_trait]
pub trait TimezoneService: Send + Sync {
    /// Resolve a zone name; unknown or missing names use the service default
    fn zone(&self, tz: Option<&str>) -> Tz;

    async fn now_in_tz(&self, tz: Option<&str>) -> DateTime<Tz>;

    /// Next moment inside the local business window, strictly after `base` (default: now)
    async fn next_best_contact_time(
        &self,
        tz: Option<&str>,
        base: Option<DateTime<Utc>>,
    ) -> DateTime<Utc>;
}

/// Business window in local time, e.g. Mon–Fri 09:00–19:00
pub struct BusinessHoursService {
    clock: Arc<dyn Clock>,
    default_tz: Tz,
    start_hour: u32,
    end_hour: u32,
    business_days: Vec<Weekday>,
}

impl BusinessHoursService {
    pub fn new(
        clock: Arc<dyn Clock>,
        default_tz: Tz,
        start_hour: u32,
        end_hour: u32,
        business_days: Vec<Weekday>,
    ) -> Result<Self> {
        if start_hour >= end_hour || end_hour > 24 {
            return Err(FlowError::Config(format!(
                "business window must satisfy start < end <= 24, got {}..{}",
                start_hour, end_hour
            )));
        }
        if business_days.is_empty() {
            return Err(FlowError::Config(
                "business window needs at least one weekday".to_string(),
            ));
        }
        Ok(Self {
            clock,
            default_tz,
            start_hour,
            end_hour,
            business_days,
        })
    }

    pub fn from_config(clock: Arc<dyn Clock>, config: &FollowUpConfig) -> Result<Self> {
        let default_tz: Tz = config.default_timezone.parse().map_err(|_| {
            FlowError::Config(format!(
                "unknown default timezone '{}'",
                config.default_timezone
            ))
        })?;
        Self::new(
            clock,
            default_tz,
            config.business_start_hour,
            config.business_end_hour,
            config.business_days.clone(),
        )
    }

    fn is_business_day(&self, date: NaiveDate) -> bool {
        self.business_days.contains(&date.weekday())
    }

    fn window(&self, tz: &Tz, date: NaiveDate) -> (DateTime<Tz>, DateTime<Tz>) {
        let start = resolve_local_datetime(tz, date, self.start_hour);
        let end = if self.end_hour == 24 {
            resolve_local_datetime(tz, date + Duration::days(1), 0)
        } else {
            resolve_local_datetime(tz, date, self.end_hour)
        };
        (start, end)
    }

    fn next_slot(&self, tz: &Tz, base: DateTime<Utc>) -> DateTime<Utc> {
        let local = base.with_timezone(tz);
        let candidate = base + Duration::minutes(1);

        for offset in 0..=MAX_LOOKAHEAD_DAYS {
            let date = local.date_naive() + Duration::days(offset);
            if !self.is_business_day(date) {
                continue;
            }
            let (start, end) = self.window(tz, date);
            let start = start.with_timezone(&Utc);
            let end = end.with_timezone(&Utc);

            if base < start {
                return start;
            }
            if candidate < end {
                return candidate;
            }
        }

        warn!("No business slot found within {} days in {}", MAX_LOOKAHEAD_DAYS, tz);
        base + Duration::days(1)
    }
}

#[async_trait]
impl TimezoneService for BusinessHoursService {
    fn zone(&self, tz: Option<&str>) -> Tz {
        match tz.map(str::trim).filter(|name| !name.is_empty()) {
            None => self.default_tz,
            Some(name) => name.parse().unwrap_or_else(|_| {
                warn!("Unknown timezone '{}', using {}", name, self.default_tz);
                self.default_tz
            }),
        }
    }

    async fn now_in_tz(&self, tz: Option<&str>) -> DateTime<Tz> {
        self.clock.now().with_timezone(&self.zone(tz))
    }

    async fn next_best_contact_time(
        &self,
        tz: Option<&str>,
        base: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        let zone = self.zone(tz);
        self.next_slot(&zone, base.unwrap_or_else(|| self.clock.now()))
    }
}

/// Resolve a local date + hour to a zone-aware instant, handling DST gaps.
///
/// In a spring-forward gap `earliest()` is `None`; the post-transition
/// instant (`latest()`) is used, and UTC as a last resort.
fn resolve_local_datetime(tz: &Tz, date: NaiveDate, hour: u32) -> DateTime<Tz> {
    let naive = NaiveDateTime::new(
        date,
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN),
    );

    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt;
    }

    if let Some(dt) = tz.from_local_datetime(&naive).latest() {
        warn!(
            "DST gap detected for {} {:02}:00 in {}; using post-transition time",
            date, hour, tz
        );
        return dt;
    }

    warn!(
        "Could not resolve local datetime {} {:02}:00 in {}; falling back to UTC",
        date, hour, tz
    );
    Utc.from_utc_datetime(&naive).with_timezone(tz)
}
