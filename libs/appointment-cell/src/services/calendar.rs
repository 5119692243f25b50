use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use tracing::warn;

use crate::models::{Appointment, AppointmentError, BucketKey, RequestedTime};

/// Maps instants to the clinic's calendar days.
///
/// Queue buckets are per local day, so two bookings at 23:30 and 00:30 UTC can
/// land in the same bucket when the clinic runs ahead of UTC.
#[derive(Debug, Clone, Copy)]
pub struct ClinicCalendar {
    offset: FixedOffset,
}

impl ClinicCalendar {
    pub fn new(offset_minutes: i32) -> Self {
        let offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                warn!("Invalid clinic UTC offset {} minutes, falling back to UTC", offset_minutes);
                utc_offset()
            });
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: utc_offset() }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// Half-open `[start, end)` range covering one local day, in UTC.
    /// Days at the edge of the representable range are rejected.
    pub fn day_bounds(&self, date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), AppointmentError> {
        let start = self.local_to_utc(date.and_hms_opt(0, 0, 0).unwrap_or_default())?;
        let end = start
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| out_of_range(date))?;
        Ok((start, end))
    }

    /// Bare local times are read in the clinic's offset.
    pub fn resolve(&self, requested: RequestedTime) -> Result<DateTime<Utc>, AppointmentError> {
        match requested {
            RequestedTime::Zoned(at) => Ok(at.with_timezone(&Utc)),
            RequestedTime::Local(naive) => self.local_to_utc(naive),
        }
    }

    fn local_to_utc(&self, local: NaiveDateTime) -> Result<DateTime<Utc>, AppointmentError> {
        let shift = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        local
            .checked_sub_signed(shift)
            .map(|utc| Utc.from_utc_datetime(&utc))
            .ok_or_else(|| out_of_range(local))
    }

    pub fn bucket_of(&self, appointment: &Appointment) -> BucketKey {
        BucketKey {
            hospital_id: appointment.hospital_id,
            date: self.date_of(appointment.scheduled_at),
        }
    }
}

impl Default for ClinicCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

fn out_of_range(value: impl std::fmt::Display) -> AppointmentError {
    AppointmentError::ValidationError(format!("Date {} is out of the supported range", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_date_of_respects_offset() {
        let calendar = ClinicCalendar::new(300);
        assert_eq!(
            calendar.date_of(at("2025-01-27T20:00:00Z")),
            NaiveDate::from_ymd_opt(2025, 1, 28).unwrap()
        );
        assert_eq!(
            ClinicCalendar::utc().date_of(at("2025-01-27T20:00:00Z")),
            NaiveDate::from_ymd_opt(2025, 1, 27).unwrap()
        );
    }

    #[test]
    fn test_day_bounds() {
        let calendar = ClinicCalendar::new(300);
        let (start, end) = calendar.day_bounds(NaiveDate::from_ymd_opt(2025, 1, 28).unwrap()).unwrap();
        assert_eq!(start, at("2025-01-27T19:00:00Z"));
        assert_eq!(end, at("2025-01-28T19:00:00Z"));
    }

    #[test]
    fn test_resolve_local_time() {
        let calendar = ClinicCalendar::new(300);
        let naive = NaiveDate::from_ymd_opt(2025, 1, 27).unwrap().and_hms_opt(10, 0, 0).unwrap();
        assert_eq!(calendar.resolve(RequestedTime::Local(naive)).unwrap(), at("2025-01-27T05:00:00Z"));

        let zoned = DateTime::parse_from_rfc3339("2025-01-27T10:00:00+02:00").unwrap();
        assert_eq!(calendar.resolve(RequestedTime::Zoned(zoned)).unwrap(), at("2025-01-27T08:00:00Z"));
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        let calendar = ClinicCalendar::new(100_000);
        assert_eq!(calendar.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_offset_overflow_falls_back_to_utc() {
        assert_eq!(ClinicCalendar::new(i32::MAX).offset().local_minus_utc(), 0);
        assert_eq!(ClinicCalendar::new(i32::MIN).offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_last_representable_day_is_rejected() {
        let calendar = ClinicCalendar::utc();
        assert_matches!(calendar.day_bounds(NaiveDate::MAX), Err(AppointmentError::ValidationError(_)));

        let ahead = ClinicCalendar::new(300);
        assert_matches!(
            ahead.resolve(RequestedTime::Local(NaiveDate::MIN.and_hms_opt(0, 0, 0).unwrap())),
            Err(AppointmentError::ValidationError(_))
        );
    }
}
