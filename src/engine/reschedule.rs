//! Reschedule slot generation and selection parsing
//!
//! Option generation is pure: one base date always yields the same three
//! slots, so conversations and tests are deterministic.

use crate::session::{RescheduleOption, RESCHEDULE_OPTION_COUNT};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Time-of-day slots, cycled by day offset
const SLOT_CYCLE: [(&str, u32); 3] = [("Morning", 9), ("Afternoon", 13), ("Evening", 18)];

/// Generate the three offered delivery slots from a base date.
///
/// Offsets 1..3 days out; slot is `SLOT_CYCLE[offset % 3]`, so offset 1 is
/// Afternoon, 2 is Evening, 3 wraps to Morning.
pub fn generate_options(base: DateTime<Utc>) -> Vec<RescheduleOption> {
    (1..=RESCHEDULE_OPTION_COUNT)
        .map(|offset| {
            let (slot_name, hour) = SLOT_CYCLE[offset % SLOT_CYCLE.len()];
            let days = i64::try_from(offset).expect("offset fits in i64");
            let day = (base + Duration::days(days)).date_naive();
            // and_hms on a valid calendar date with hour < 24 cannot fail
            let date = Utc
                .from_utc_datetime(&day.and_hms_opt(hour, 0, 0).expect("valid wall-clock time"));
            let label = format!("{}, {}", date.format("%a %b %-d"), slot_name);
            RescheduleOption { date, label }
        })
        .collect()
}

/// Parse a slot selection. Returns the zero-based index only when the input
/// is an integer within `[1, count]`.
pub fn parse_selection(input: &str, count: usize) -> Option<usize> {
    let n: usize = input.trim().parse().ok()?;
    if (1..=count).contains(&n) {
        Some(n - 1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 12, 30, 0).unwrap()
    }

    #[test]
    fn generates_exactly_three_options() {
        assert_eq!(generate_options(base()).len(), 3);
    }

    #[test]
    fn slot_cycle_is_afternoon_evening_morning() {
        let options = generate_options(base());
        assert!(options[0].label.ends_with("Afternoon"));
        assert!(options[1].label.ends_with("Evening"));
        assert!(options[2].label.ends_with("Morning"));
        assert_eq!(options[0].date.format("%H").to_string(), "13");
        assert_eq!(options[1].date.format("%H").to_string(), "18");
        assert_eq!(options[2].date.format("%H").to_string(), "09");
    }

    #[test]
    fn labels_carry_weekday_and_date() {
        let options = generate_options(base());
        // Base is Mon Jan 5 2026, so offsets land on Tue/Wed/Thu.
        assert_eq!(options[0].label, "Tue Jan 6, Afternoon");
        assert_eq!(options[1].label, "Wed Jan 7, Evening");
        assert_eq!(options[2].label, "Thu Jan 8, Morning");
    }

    #[test]
    fn selection_bounds() {
        assert_eq!(parse_selection("1", 3), Some(0));
        assert_eq!(parse_selection("2", 3), Some(1));
        assert_eq!(parse_selection(" 3 ", 3), Some(2));
        assert_eq!(parse_selection("0", 3), None);
        assert_eq!(parse_selection("4", 3), None);
        assert_eq!(parse_selection("abc", 3), None);
        assert_eq!(parse_selection("-1", 3), None);
        assert_eq!(parse_selection("", 3), None);
    }

    proptest! {
        #[test]
        fn options_are_deterministic_and_increasing(secs in 0i64..4_000_000_000) {
            let base = Utc.timestamp_opt(secs, 0).unwrap();
            let a = generate_options(base);
            let b = generate_options(base);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.len(), 3);
            prop_assert!(a[0].date < a[1].date);
            prop_assert!(a[1].date < a[2].date);
            for option in &a {
                prop_assert!(option.date > base);
            }
        }
    }
}
