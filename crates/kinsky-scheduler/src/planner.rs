//! Trigger parsing and next-run computation.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};

use crate::{CronJob, Isolate, SchedulerError, TriggerSpec};

/// The chronologically next trigger across a set of jobs.
#[derive(Debug, Clone, PartialEq)]
pub enum NextRun<'a, Tz: TimeZone> {
    /// The earliest job and when it fires.
    At { job: &'a CronJob, at: DateTime<Tz> },
    /// No job has a computable next run.
    FarFuture,
}

impl<'a, Tz: TimeZone> NextRun<'a, Tz> {
    pub fn job(&self) -> Option<&'a CronJob> {
        match self {
            NextRun::At { job, .. } => Some(*job),
            NextRun::FarFuture => None,
        }
    }

    pub fn at(&self) -> Option<&DateTime<Tz>> {
        match self {
            NextRun::At { at, .. } => Some(at),
            NextRun::FarFuture => None,
        }
    }
}

impl<Tz: TimeZone> fmt::Display for NextRun<'_, Tz>
where
    Tz::Offset: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextRun::At { job, at } => write!(f, "{} at {}", job.name, at.to_rfc3339()),
            NextRun::FarFuture => write!(f, "never"),
        }
    }
}

/// Parse a 12-hour "H:MM AM|PM" entry into a daily trigger at second 0.
///
/// 12 AM maps to hour 0, 1-11 PM to 13-23, and 12 PM stays 12. Any other
/// hour is taken as written and must still be a valid 24-hour value.
pub fn parse_schedule_time(text: &str) -> Result<TriggerSpec, SchedulerError> {
    let invalid = |reason: &str| SchedulerError::InvalidTime {
        input: text.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = text.split_whitespace();
    let clock = parts.next().ok_or_else(|| invalid("empty schedule time"))?;
    let meridiem = parts.next().ok_or_else(|| invalid("missing AM/PM"))?;
    if parts.next().is_some() {
        return Err(invalid("unexpected trailing text"));
    }

    let (hour, minute) = clock
        .split_once(':')
        .ok_or_else(|| invalid("expected H:MM"))?;
    let hour: u32 = hour.parse().map_err(|_| invalid("hour is not a number"))?;
    let minute: u32 = minute
        .parse()
        .map_err(|_| invalid("minute is not a number"))?;

    let pm = match meridiem.to_ascii_uppercase().as_str() {
        "AM" => false,
        "PM" => true,
        _ => return Err(invalid("expected AM or PM")),
    };

    TriggerSpec::daily(to_24_hour(hour, pm), minute)
        .map_err(|_| invalid("hour or minute out of range"))
}

fn to_24_hour(hour: u32, pm: bool) -> u32 {
    match (hour, pm) {
        (12, false) => 0,
        (1..=11, true) => hour + 12,
        _ => hour,
    }
}

/// Compute the next time `trigger` fires strictly after `now`, in `now`'s zone.
///
/// If today's occurrence is at or before `now`, the same wall-clock time on
/// the following calendar day is returned.
pub fn next_occurrence<Tz: TimeZone>(
    trigger: &TriggerSpec,
    now: &DateTime<Tz>,
) -> Result<DateTime<Tz>, SchedulerError> {
    let today = now.date_naive();
    if wall_clock(trigger, today)? > now.naive_local() {
        let candidate = occurrence_on(trigger, today, &now.timezone())?;
        if candidate > *now {
            return Ok(candidate);
        }
    }

    let tomorrow = today
        .succ_opt()
        .ok_or_else(|| SchedulerError::Fault(format!("no day after {}", today)))?;
    occurrence_on(trigger, tomorrow, &now.timezone())
}

fn wall_clock(trigger: &TriggerSpec, date: NaiveDate) -> Result<NaiveDateTime, SchedulerError> {
    date.and_hms_opt(trigger.hour, trigger.minute, trigger.second)
        .ok_or_else(|| SchedulerError::Fault(format!("{} is not a valid time of day", trigger)))
}

// Only the chosen day is resolved, so a gap on a day already past never faults.
fn occurrence_on<Tz: TimeZone>(
    trigger: &TriggerSpec,
    date: NaiveDate,
    tz: &Tz,
) -> Result<DateTime<Tz>, SchedulerError> {
    let naive = wall_clock(trigger, date)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| SchedulerError::Fault(format!("{} does not exist in this time zone", naive)))
}

/// Find the job that fires next.
///
/// A job whose next run cannot be computed is logged and left out; the
/// remaining jobs are still considered. [`NextRun::FarFuture`] is returned
/// only when `jobs` is empty or every job faults.
pub fn earliest_upcoming<'a, Tz: TimeZone>(
    jobs: &'a [CronJob],
    now: &DateTime<Tz>,
) -> NextRun<'a, Tz> {
    jobs.iter()
        .filter_map(|job| {
            Isolate
                .absorb("next-run", &job.name, next_occurrence(&job.trigger, now))
                .map(|at| (job, at))
        })
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(job, at)| NextRun::At { job, at })
        .unwrap_or(NextRun::FarFuture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, LocalResult, Timelike, Utc};
    use proptest::prelude::*;

    fn job(name: &str, trigger: TriggerSpec) -> CronJob {
        CronJob {
            name: name.to_string(),
            trigger,
            max_delay: std::time::Duration::ZERO,
        }
    }

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 10, hour, minute, second)
            .single()
            .unwrap()
    }

    // === Parsing ===

    #[test]
    fn test_parse_midnight() {
        let trigger = parse_schedule_time("12:00 AM").unwrap();
        assert_eq!(trigger.hour(), 0);
        assert_eq!(trigger.minute(), 0);
        assert_eq!(trigger.second(), 0);
    }

    #[test]
    fn test_parse_noon_unchanged() {
        let trigger = parse_schedule_time("12:30 PM").unwrap();
        assert_eq!(trigger.hour(), 12);
        assert_eq!(trigger.minute(), 30);
    }

    #[test]
    fn test_parse_afternoon() {
        let trigger = parse_schedule_time("1:05 PM").unwrap();
        assert_eq!(trigger.hour(), 13);
        assert_eq!(trigger.minute(), 5);
    }

    #[test]
    fn test_parse_morning_unchanged() {
        assert_eq!(parse_schedule_time("9:15 AM").unwrap().hour(), 9);
        assert_eq!(parse_schedule_time("11:59 PM").unwrap().hour(), 23);
    }

    #[test]
    fn test_parse_lowercase_meridiem() {
        assert_eq!(parse_schedule_time("7:45 pm").unwrap().hour(), 19);
    }

    #[test]
    fn test_parse_hour_zero_passes_through() {
        assert_eq!(parse_schedule_time("0:30 AM").unwrap().hour(), 0);
        assert_eq!(parse_schedule_time("0:30 PM").unwrap().hour(), 0);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in [
            "", "9:30", "930 AM", "9:30 XM", "nine:30 AM", "9:3x AM", "9:30 AM extra", "9:75 AM",
            "25:00 AM",
        ] {
            assert!(
                matches!(
                    parse_schedule_time(input),
                    Err(SchedulerError::InvalidTime { .. })
                ),
                "expected {:?} to be rejected",
                input
            );
        }
    }

    // === Next occurrence ===

    #[test]
    fn test_next_occurrence_later_today() {
        let trigger = TriggerSpec::daily(15, 0).unwrap();
        let next = next_occurrence(&trigger, &at(9, 0, 0)).unwrap();
        assert_eq!(next, at(15, 0, 0));
    }

    #[test]
    fn test_next_occurrence_earlier_today_rolls_to_tomorrow() {
        let trigger = TriggerSpec::daily(8, 0).unwrap();
        let next = next_occurrence(&trigger, &at(9, 0, 0)).unwrap();
        assert_eq!(next, at(8, 0, 0) + Duration::days(1));
    }

    #[test]
    fn test_next_occurrence_at_exact_time_is_tomorrow() {
        let trigger = TriggerSpec::daily(9, 30).unwrap();
        let now = at(9, 30, 0);
        let next = next_occurrence(&trigger, &now).unwrap();

        assert_ne!(next, now);
        assert_eq!(next, now + Duration::days(1));
    }

    #[test]
    fn test_next_occurrence_keeps_zone() {
        let zone = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = zone.with_ymd_and_hms(2026, 6, 10, 23, 0, 0).single().unwrap();
        let trigger = TriggerSpec::daily(6, 0).unwrap();

        let next = next_occurrence(&trigger, &now).unwrap();
        assert_eq!(next.offset(), now.offset());
        assert_eq!(next.hour(), 6);
        assert_eq!(next.date_naive(), now.date_naive().succ_opt().unwrap());
    }

    /// US Eastern around 2026-03-08: clocks jump from 02:00 to 03:00 local.
    #[derive(Debug, Clone, Copy)]
    struct SpringForward;

    impl SpringForward {
        fn standard() -> FixedOffset {
            FixedOffset::west_opt(5 * 3600).unwrap()
        }

        fn daylight() -> FixedOffset {
            FixedOffset::west_opt(4 * 3600).unwrap()
        }

        fn local(hour: u32) -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2026, 3, 8)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap()
        }
    }

    impl TimeZone for SpringForward {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            SpringForward
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            if *local < Self::local(2) {
                LocalResult::Single(Self::standard())
            } else if *local < Self::local(3) {
                LocalResult::None
            } else {
                LocalResult::Single(Self::daylight())
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            // 02:00 EST is 07:00 UTC
            if *utc < Self::local(7) {
                Self::standard()
            } else {
                Self::daylight()
            }
        }
    }

    #[test]
    fn test_next_occurrence_skips_past_gap_to_tomorrow() {
        let now = SpringForward
            .with_ymd_and_hms(2026, 3, 8, 10, 0, 0)
            .single()
            .unwrap();
        let trigger = TriggerSpec::daily(2, 30).unwrap();

        let next = next_occurrence(&trigger, &now).unwrap();
        assert_eq!(
            next.naive_local(),
            NaiveDate::from_ymd_opt(2026, 3, 9)
                .unwrap()
                .and_hms_opt(2, 30, 0)
                .unwrap()
        );
        assert_eq!(next.offset(), &SpringForward::daylight());
    }

    #[test]
    fn test_next_occurrence_in_upcoming_gap_faults() {
        let now = SpringForward
            .with_ymd_and_hms(2026, 3, 8, 1, 0, 0)
            .single()
            .unwrap();
        let trigger = TriggerSpec::daily(2, 30).unwrap();

        assert!(matches!(
            next_occurrence(&trigger, &now),
            Err(SchedulerError::Fault(_))
        ));
    }

    #[test]
    fn test_earliest_upcoming_keeps_job_after_gap() {
        let now = SpringForward
            .with_ymd_and_hms(2026, 3, 8, 10, 0, 0)
            .single()
            .unwrap();
        let jobs = vec![job("night", TriggerSpec::daily(2, 30).unwrap())];

        assert_eq!(
            earliest_upcoming(&jobs, &now).job().map(|j| j.name.as_str()),
            Some("night")
        );
    }

    #[test]
    fn test_next_occurrence_invalid_trigger_faults() {
        let trigger = TriggerSpec {
            hour: 24,
            minute: 0,
            second: 0,
        };
        assert!(matches!(
            next_occurrence(&trigger, &at(9, 0, 0)),
            Err(SchedulerError::Fault(_))
        ));
    }

    // === Earliest upcoming ===

    #[test]
    fn test_earliest_upcoming_picks_soonest() {
        let now = at(10, 0, 0);
        let jobs = vec![
            job("plus-1h", TriggerSpec::daily(11, 0).unwrap()),
            job("plus-3h", TriggerSpec::daily(13, 0).unwrap()),
            job("plus-30m", TriggerSpec::daily(10, 30).unwrap()),
        ];

        let next = earliest_upcoming(&jobs, &now);
        assert_eq!(next.job().map(|j| j.name.as_str()), Some("plus-30m"));
        assert_eq!(next.at(), Some(&at(10, 30, 0)));
    }

    #[test]
    fn test_earliest_upcoming_considers_tomorrow() {
        let now = at(22, 0, 0);
        let jobs = vec![
            job("morning", TriggerSpec::daily(7, 0).unwrap()),
            job("late", TriggerSpec::daily(23, 0).unwrap()),
        ];
        assert_eq!(
            earliest_upcoming(&jobs, &now).job().map(|j| j.name.as_str()),
            Some("late")
        );
    }

    #[test]
    fn test_earliest_upcoming_excludes_faulting_job() {
        let now = at(10, 0, 0);
        let broken = TriggerSpec {
            hour: 99,
            minute: 0,
            second: 0,
        };
        let jobs = vec![
            job("broken", broken),
            job("fine", TriggerSpec::daily(12, 0).unwrap()),
        ];

        let next = earliest_upcoming(&jobs, &now);
        assert_eq!(next.job().map(|j| j.name.as_str()), Some("fine"));
    }

    #[test]
    fn test_earliest_upcoming_empty_is_far_future() {
        let next = earliest_upcoming(&[], &at(10, 0, 0));
        assert_eq!(next, NextRun::FarFuture);
        assert_eq!(next.to_string(), "never");
    }

    #[test]
    fn test_earliest_upcoming_all_faulting_is_far_future() {
        let broken = TriggerSpec {
            hour: 30,
            minute: 0,
            second: 0,
        };
        let jobs = vec![job("a", broken), job("b", broken)];
        assert!(earliest_upcoming(&jobs, &at(10, 0, 0)).job().is_none());
    }

    // === Property-Based Tests ===

    proptest! {
        // The next occurrence is always strictly in the future and within a day
        #[test]
        fn next_occurrence_within_one_day(
            hour in 0u32..24,
            minute in 0u32..60,
            now_secs in 0i64..86_400,
        ) {
            let trigger = TriggerSpec::daily(hour, minute).unwrap();
            let now = at(0, 0, 0) + Duration::seconds(now_secs);
            let next = next_occurrence(&trigger, &now).unwrap();

            prop_assert!(next > now);
            prop_assert!(next - now <= Duration::days(1));
            prop_assert_eq!(next.hour(), hour);
            prop_assert_eq!(next.minute(), minute);
            prop_assert_eq!(next.second(), 0);
        }

        // 12-hour input always lands on a valid 24-hour trigger
        #[test]
        fn parse_twelve_hour_clock_is_valid(hour in 1u32..=12, minute in 0u32..60, pm in proptest::bool::ANY) {
            let text = format!("{}:{:02} {}", hour, minute, if pm { "PM" } else { "AM" });
            let trigger = parse_schedule_time(&text).unwrap();

            prop_assert!(trigger.hour() < 24);
            prop_assert_eq!(trigger.minute(), minute);
            prop_assert_eq!(trigger.hour() >= 12, pm);
        }
    }
}
