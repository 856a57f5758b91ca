use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Time-in-force instructions for order validity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Immediate or Cancel: execute immediately (partially or fully) and cancel unfilled portion
    Ioc,

    /// Good Till Canceled: order remains active until explicitly canceled
    Gtc,

    /// Day order: automatically canceled at end of trading day
    Day,

    /// Good Till Date: order remains active until the specified datetime
    Gtd(DateTime<Utc>),
}

impl TimeInForce {
    /// Deadline after which an unfilled order must be canceled.
    ///
    /// `None` means the order carries no expiry of its own (GTC/IOC -
    /// IOC expiry is the broker's business, not the pipeline's timer).
    pub fn deadline(&self, submitted_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeInForce::Gtd(expiry) => Some(*expiry),
            // End of the submission's UTC day
            TimeInForce::Day => {
                let next_day = (submitted_at + Duration::days(1))
                    .date_naive()
                    .and_hms_opt(0, 0, 0)?;
                Some(DateTime::from_naive_utc_and_offset(next_day, Utc))
            }
            TimeInForce::Gtc | TimeInForce::Ioc => None,
        }
    }

    /// Check if the order has expired based on current time
    pub fn is_expired(&self, submitted_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.deadline(submitted_at).is_some_and(|d| now >= d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_gtd_deadline() {
        let expiry = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let tif = TimeInForce::Gtd(expiry);

        let submitted = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        assert_eq!(tif.deadline(submitted), Some(expiry));
        assert!(!tif.is_expired(submitted, submitted));
        assert!(tif.is_expired(submitted, expiry));
    }

    #[test]
    fn test_day_expires_at_utc_midnight() {
        let submitted = Utc.with_ymd_and_hms(2025, 6, 1, 15, 30, 0).unwrap();
        let tif = TimeInForce::Day;

        let deadline = tif.deadline(submitted).unwrap();
        assert_eq!(deadline, Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_gtc_never_expires() {
        let submitted = Utc::now();
        assert_eq!(TimeInForce::Gtc.deadline(submitted), None);
        assert!(!TimeInForce::Gtc.is_expired(submitted, submitted + Duration::days(365)));
    }
}
