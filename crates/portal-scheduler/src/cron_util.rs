use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::{Result, SchedulerError};

/// Computes the cron expression's next firing strictly after `after`. The
/// `cron` crate parses a leading seconds field; the standard 5-field
/// expressions this gateway accepts are widened by prefixing `"0 "`.
pub fn next_cron_firing(expr: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let six_field = format!("0 {}", expr.trim());
    let schedule = Schedule::from_str(&six_field).map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;
    schedule
        .after(&after)
        .next()
        .ok_or_else(|| SchedulerError::InvalidCron(format!("{expr} never fires again after {after}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn daily_two_am_fires_next_day_when_already_past_today() {
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 30).unwrap();
        let next = next_cron_firing("0 2 * * *", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 2, 2, 0, 0).unwrap());
    }

    #[test]
    fn every_hour_fires_at_the_next_hour_boundary() {
        let after = Utc.with_ymd_and_hms(2026, 1, 1, 2, 15, 0).unwrap();
        let next = next_cron_firing("0 * * * *", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 3, 0, 0).unwrap());
    }

    #[test]
    fn malformed_expression_is_rejected() {
        assert!(next_cron_firing("not a cron", Utc::now()).is_err());
    }
}
