use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use regex::Regex;

use crate::errors::BookingError;
use crate::models::{SeatingCategory, SeatingPreference};

pub const OPENING_MINUTE: u32 = 11 * 60;
pub const CLOSING_MINUTE: u32 = 22 * 60;
pub const SLOT_INTERVAL_MINUTES: u32 = 30;
pub const MAX_ADVANCE_WEEKS: i64 = 6;
pub const MIN_PARTY_SIZE: i32 = 1;
pub const MAX_PARTY_SIZE: i32 = 8;
pub const COUNTER_SEATS_PER_SLOT: i64 = 10;
pub const DUPLICATE_WINDOW_DAYS: i64 = 5;
pub const MAX_NAME_LENGTH: usize = 100;

// Seating by party size:
//   1-2 -> table for 2   (6 tables per slot)
//   3-4 -> table for 4   (10 tables per slot)
//   5-6 -> table for 6   (10 tables per slot)
//   7-8 -> counter       (10 seats per slot, shared)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableBucket {
    ForTwo,
    ForFour,
    ForSix,
}

impl TableBucket {
    pub fn for_party(party_size: i32) -> Option<TableBucket> {
        match party_size {
            1..=2 => Some(TableBucket::ForTwo),
            3..=4 => Some(TableBucket::ForFour),
            5..=6 => Some(TableBucket::ForSix),
            _ => None,
        }
    }

    pub fn table_size(self) -> i32 {
        match self {
            TableBucket::ForTwo => 2,
            TableBucket::ForFour => 4,
            TableBucket::ForSix => 6,
        }
    }

    pub fn tables_per_slot(self) -> usize {
        match self {
            TableBucket::ForTwo => 6,
            TableBucket::ForFour => 10,
            TableBucket::ForSix => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAssignment {
    Table(TableBucket),
    Counter,
}

impl SlotAssignment {
    pub fn category(self) -> SeatingCategory {
        match self {
            SlotAssignment::Table(_) => SeatingCategory::TABLE,
            SlotAssignment::Counter => SeatingCategory::COUNTER,
        }
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| BookingError::InvalidField {
        field: "date",
        message: "Date must be in YYYY-MM-DD format.".to_string(),
    })
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, BookingError> {
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| BookingError::InvalidField {
        field: "time",
        message: "Time must be in HH:MM format.".to_string(),
    })
}

pub fn validate_fields(name: &str, email: &str, party_size: i32) -> Result<(), BookingError> {
    if name.trim().is_empty() || name.len() > MAX_NAME_LENGTH {
        return Err(BookingError::InvalidField {
            field: "name",
            message: "Name must be between 1 and 100 characters.".to_string(),
        });
    }
    let name_re = Regex::new(r"^[a-zA-Z0-9 .'-]*$").unwrap();
    if name_re.captures(name).is_none() {
        return Err(BookingError::InvalidField {
            field: "name",
            message: "Name may only contain letters, numbers, spaces and .'- characters.".to_string(),
        });
    }
    let email_re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    if email_re.captures(email).is_none() {
        return Err(BookingError::InvalidField {
            field: "email",
            message: "Enter a valid email address.".to_string(),
        });
    }
    if !(MIN_PARTY_SIZE..=MAX_PARTY_SIZE).contains(&party_size) {
        return Err(BookingError::InvalidField {
            field: "party_size",
            message: "Party size must be between 1 and 8.".to_string(),
        });
    }
    Ok(())
}

pub fn is_allowed_time(time: NaiveTime) -> bool {
    if time.second() != 0 || time.nanosecond() != 0 {
        return false;
    }
    let minute = time.hour() * 60 + time.minute();
    (OPENING_MINUTE..=CLOSING_MINUTE).contains(&minute) && minute % SLOT_INTERVAL_MINUTES == 0
}

pub fn is_within_horizon(date: NaiveDate, today: NaiveDate) -> bool {
    date >= today && date <= today + Duration::weeks(MAX_ADVANCE_WEEKS)
}

pub fn check_slot(date: NaiveDate, time: NaiveTime, today: NaiveDate) -> Result<(), BookingError> {
    if !is_allowed_time(time) {
        return Err(BookingError::SlotUnavailable(
            "Bookings are available between 11:00 and 22:00 at 30 minute intervals.".to_string(),
        ));
    }
    if date < today {
        return Err(BookingError::SlotUnavailable(
            "The requested date has already passed.".to_string(),
        ));
    }
    if !is_within_horizon(date, today) {
        return Err(BookingError::SlotUnavailable(
            "Sorry, we don't take bookings more than 6 weeks ahead.".to_string(),
        ));
    }
    Ok(())
}

pub fn assign_seating(
    party_size: i32,
    preference: Option<SeatingPreference>,
) -> Result<SlotAssignment, BookingError> {
    let default = match TableBucket::for_party(party_size) {
        Some(bucket) => SlotAssignment::Table(bucket),
        None => SlotAssignment::Counter,
    };
    match preference {
        None => Ok(default),
        Some(SeatingPreference::Counter) => Ok(SlotAssignment::Counter),
        Some(SeatingPreference::Table) => match default {
            SlotAssignment::Table(_) => Ok(default),
            SlotAssignment::Counter => Err(BookingError::SeatingPreferenceInvalid),
        },
    }
}

// `existing` is the (seating_type, party_size) snapshot of every reservation
// already holding the same date and time.
pub fn check_capacity(
    assignment: SlotAssignment,
    party_size: i32,
    existing: &[(SeatingCategory, i32)],
) -> Result<(), BookingError> {
    match assignment {
        SlotAssignment::Table(bucket) => {
            let tables_taken = existing
                .iter()
                .filter(|(category, size)| {
                    *category == SeatingCategory::TABLE
                        && TableBucket::for_party(*size) == Some(bucket)
                })
                .count();
            if tables_taken >= bucket.tables_per_slot() {
                return Err(BookingError::CategoryFull {
                    category: SeatingCategory::TABLE,
                    bucket: Some(bucket),
                });
            }
        }
        SlotAssignment::Counter => {
            let seats_taken: i64 = existing
                .iter()
                .filter(|(category, _)| *category == SeatingCategory::COUNTER)
                .map(|(_, size)| i64::from(*size))
                .sum();
            if seats_taken + i64::from(party_size) > COUNTER_SEATS_PER_SLOT {
                return Err(BookingError::CategoryFull {
                    category: SeatingCategory::COUNTER,
                    bucket: None,
                });
            }
        }
    }
    Ok(())
}

pub fn duplicate_window(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    (
        date - Duration::days(DUPLICATE_WINDOW_DAYS),
        date + Duration::days(DUPLICATE_WINDOW_DAYS),
    )
}

// Advisory lock key for one (date, time) slot. Seconds from midnight fit in
// 17 bits, so distinct slots always map to distinct keys.
pub fn slot_lock_key(date: NaiveDate, time: NaiveTime) -> i64 {
    let days = i64::from(date.num_days_from_ce());
    let seconds = i64::from(time.num_seconds_from_midnight());
    (days << 17) | seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn every_half_hour_between_open_and_close_is_bookable() {
        let mut slots = 0;
        let mut minute = OPENING_MINUTE;
        while minute <= CLOSING_MINUTE {
            assert!(is_allowed_time(time(minute / 60, minute % 60)));
            slots += 1;
            minute += SLOT_INTERVAL_MINUTES;
        }
        assert_eq!(slots, 23);
    }

    #[test]
    fn off_grid_times_are_rejected() {
        assert!(!is_allowed_time(time(10, 30)));
        assert!(!is_allowed_time(time(22, 30)));
        assert!(!is_allowed_time(time(23, 0)));
        assert!(!is_allowed_time(time(19, 15)));
        assert!(!is_allowed_time(NaiveTime::from_hms_opt(19, 0, 30).unwrap()));
    }

    #[test]
    fn horizon_spans_today_through_six_weeks_inclusive() {
        let today = date(2026, 8, 22);
        assert!(is_within_horizon(today, today));
        assert!(is_within_horizon(today + Duration::weeks(6), today));
        assert!(!is_within_horizon(today + Duration::weeks(6) + Duration::days(1), today));
        assert!(!is_within_horizon(today - Duration::days(1), today));
    }

    #[test]
    fn check_slot_reports_the_failing_rule() {
        let today = date(2026, 8, 22);
        let err = check_slot(today, time(9, 0), today).unwrap_err();
        assert!(matches!(err, BookingError::SlotUnavailable(_)));

        let err = check_slot(today - Duration::days(1), time(19, 0), today).unwrap_err();
        assert!(matches!(err, BookingError::SlotUnavailable(ref m) if m.contains("passed")));

        let err = check_slot(today + Duration::weeks(7), time(19, 0), today).unwrap_err();
        assert!(matches!(err, BookingError::SlotUnavailable(ref m) if m.contains("6 weeks")));

        assert!(check_slot(today + Duration::weeks(2), time(22, 0), today).is_ok());
    }

    #[test]
    fn parties_default_to_their_bucket() {
        for size in 1..=2 {
            assert_eq!(
                assign_seating(size, None).unwrap(),
                SlotAssignment::Table(TableBucket::ForTwo)
            );
        }
        for size in 3..=4 {
            assert_eq!(
                assign_seating(size, None).unwrap(),
                SlotAssignment::Table(TableBucket::ForFour)
            );
        }
        for size in 5..=6 {
            assert_eq!(
                assign_seating(size, None).unwrap(),
                SlotAssignment::Table(TableBucket::ForSix)
            );
        }
        for size in 7..=8 {
            assert_eq!(assign_seating(size, None).unwrap(), SlotAssignment::Counter);
        }
    }

    #[test]
    fn small_parties_may_opt_into_counter() {
        for size in 1..=6 {
            assert_eq!(
                assign_seating(size, Some(SeatingPreference::Counter)).unwrap(),
                SlotAssignment::Counter
            );
        }
    }

    #[test]
    fn large_parties_cannot_request_a_table() {
        for size in 7..=8 {
            assert!(matches!(
                assign_seating(size, Some(SeatingPreference::Table)),
                Err(BookingError::SeatingPreferenceInvalid)
            ));
        }
        assert_eq!(
            assign_seating(4, Some(SeatingPreference::Table)).unwrap(),
            SlotAssignment::Table(TableBucket::ForFour)
        );
    }

    #[test]
    fn table_buckets_fill_independently() {
        // six two-tops taken, the for-two bucket is full
        let existing: Vec<(SeatingCategory, i32)> =
            (0..6).map(|_| (SeatingCategory::TABLE, 2)).collect();
        let err = check_capacity(SlotAssignment::Table(TableBucket::ForTwo), 2, &existing)
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::CategoryFull { category: SeatingCategory::TABLE, bucket: Some(TableBucket::ForTwo) }
        ));

        // a four-top is still free at the same slot
        assert!(check_capacity(SlotAssignment::Table(TableBucket::ForFour), 4, &existing).is_ok());
    }

    #[test]
    fn counter_counts_seats_not_parties() {
        let existing = vec![
            (SeatingCategory::COUNTER, 7),
            (SeatingCategory::COUNTER, 2),
        ];
        // 9 of 10 seats taken, a single diner still fits
        assert!(check_capacity(SlotAssignment::Counter, 1, &existing).is_ok());
        // a pair no longer does
        let err = check_capacity(SlotAssignment::Counter, 2, &existing).unwrap_err();
        assert!(matches!(
            err,
            BookingError::CategoryFull { category: SeatingCategory::COUNTER, bucket: None }
        ));
    }

    #[test]
    fn counter_ignores_table_reservations() {
        let existing = vec![
            (SeatingCategory::TABLE, 2),
            (SeatingCategory::TABLE, 6),
            (SeatingCategory::COUNTER, 3),
        ];
        assert!(check_capacity(SlotAssignment::Counter, 7, &existing).is_ok());
        assert!(check_capacity(SlotAssignment::Counter, 8, &existing).is_err());
    }

    #[test]
    fn opted_in_counter_parties_do_not_consume_tables() {
        // five two-tops plus a pair seated at the counter: one two-top left
        let mut existing: Vec<(SeatingCategory, i32)> =
            (0..5).map(|_| (SeatingCategory::TABLE, 2)).collect();
        existing.push((SeatingCategory::COUNTER, 2));
        assert!(check_capacity(SlotAssignment::Table(TableBucket::ForTwo), 2, &existing).is_ok());
    }

    #[test]
    fn duplicate_window_is_five_days_each_way() {
        let (start, end) = duplicate_window(date(2026, 9, 10));
        assert_eq!(start, date(2026, 9, 5));
        assert_eq!(end, date(2026, 9, 15));
    }

    #[test]
    fn lock_keys_are_distinct_per_slot() {
        let mut keys = std::collections::HashSet::new();
        for day in 1..=28 {
            let mut minute = OPENING_MINUTE;
            while minute <= CLOSING_MINUTE {
                assert!(keys.insert(slot_lock_key(
                    date(2026, 9, day),
                    time(minute / 60, minute % 60)
                )));
                minute += SLOT_INTERVAL_MINUTES;
            }
        }
        assert_eq!(keys.len(), 28 * 23);
    }

    #[test]
    fn field_validation_rejects_bad_input() {
        assert!(validate_fields("Ada Lovelace", "ada@example.com", 2).is_ok());
        assert!(validate_fields("O'Brien-Smith Jr.", "ob@example.com", 4).is_ok());

        assert!(matches!(
            validate_fields("", "ada@example.com", 2),
            Err(BookingError::InvalidField { field: "name", .. })
        ));
        assert!(matches!(
            validate_fields(&"x".repeat(101), "ada@example.com", 2),
            Err(BookingError::InvalidField { field: "name", .. })
        ));
        assert!(matches!(
            validate_fields("Ada <script>", "ada@example.com", 2),
            Err(BookingError::InvalidField { field: "name", .. })
        ));
        assert!(matches!(
            validate_fields("Ada", "not-an-email", 2),
            Err(BookingError::InvalidField { field: "email", .. })
        ));
        assert!(matches!(
            validate_fields("Ada", "a b@example.com", 2),
            Err(BookingError::InvalidField { field: "email", .. })
        ));
        for bad_size in [0, -1, 9] {
            assert!(matches!(
                validate_fields("Ada", "ada@example.com", bad_size),
                Err(BookingError::InvalidField { field: "party_size", .. })
            ));
        }
    }

    #[test]
    fn malformed_dates_and_times_are_rejected() {
        assert_eq!(parse_date("2026-09-01").unwrap(), date(2026, 9, 1));
        assert_eq!(parse_time("19:30").unwrap(), time(19, 30));

        for bad_date in ["2026-13-40", "01-09-2026", "tomorrow", ""] {
            assert!(matches!(
                parse_date(bad_date),
                Err(BookingError::InvalidField { field: "date", .. })
            ));
        }
        for bad_time in ["25:00", "9pm", "19:30:00", ""] {
            assert!(matches!(
                parse_time(bad_time),
                Err(BookingError::InvalidField { field: "time", .. })
            ));
        }
    }
}
