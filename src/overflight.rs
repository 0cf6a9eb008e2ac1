use chrono::{DateTime, Duration, Local, Utc};
use std::f64::consts::TAU;
use tracing::debug;

use crate::satellite::Satellite;

/// Crossings per satellite that are considered.
const CROSSINGS_PER_SATELLITE: usize = 4;
/// Crossings less than this after the previous kept one count as the same overflight.
const SIMULTANEOUS_MS: i64 = 1000;
const PADDING_MS: i64 = 3_600_000;
const FREE_INTERVALS: usize = 3;

/// Time between two consecutive overflights.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// `HH:MM:SS`, hours not wrapped at 24.
    pub fn duration_text(&self) -> String {
        let ms = self.duration().num_milliseconds().max(0);
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }

    pub fn describe(&self, index: usize) -> String {
        format!(
            "Interval {}: From {} to {} ({})",
            index + 1,
            self.start.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            self.end.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            self.duration_text()
        )
    }
}

/// The next zenith crossings of one satellite, one period apart.
pub fn zenith_crossings(sat: &Satellite, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let omega = sat.angular_speed;
    if omega == 0.0 || !omega.is_finite() {
        return Vec::new();
    }

    let period_ms = TAU / omega.abs() * 1000.0;
    let phase = sat.angle.rem_euclid(TAU);
    let remaining = if omega > 0.0 {
        (TAU - phase) % TAU
    } else {
        phase
    };
    let next_ms = remaining / omega.abs() * 1000.0;

    // Near-zero speeds push crossings past what chrono can represent
    let (Some(period), Some(first)) = (
        Duration::try_milliseconds(period_ms as i64),
        Duration::try_milliseconds(next_ms as i64),
    ) else {
        return Vec::new();
    };

    let mut crossings = Vec::with_capacity(CROSSINGS_PER_SATELLITE);
    let mut next = now.checked_add_signed(first);
    while let Some(t) = next {
        if crossings.len() == CROSSINGS_PER_SATELLITE {
            break;
        }
        crossings.push(t);
        next = t.checked_add_signed(period);
    }
    crossings
}

/// Next four distinct overflights over the observer, padded an hour at a
/// time when there are not enough.
pub fn upcoming_overflights(satellites: &[Satellite], now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut crossings: Vec<DateTime<Utc>> = satellites
        .iter()
        .flat_map(|sat| zenith_crossings(sat, now))
        .collect();
    crossings.sort();

    let mut unique: Vec<DateTime<Utc>> = Vec::with_capacity(crossings.len());
    for t in crossings {
        match unique.last() {
            Some(last) if (t - *last).num_milliseconds() < SIMULTANEOUS_MS => {}
            _ => unique.push(t),
        }
    }

    let mut upcoming: Vec<DateTime<Utc>> = unique
        .into_iter()
        .filter(|t| *t > now)
        .take(FREE_INTERVALS + 1)
        .collect();

    while upcoming.len() < FREE_INTERVALS + 1 {
        let anchor = upcoming.last().copied().unwrap_or(now);
        upcoming.push(anchor + Duration::milliseconds(PADDING_MS));
    }

    debug!(overflights = ?upcoming, "computed overflights");
    upcoming
}

/// The three free windows between the next four overflights.
pub fn next_free_intervals(satellites: &[Satellite], now: DateTime<Utc>) -> Vec<Interval> {
    let overflights = upcoming_overflights(satellites, now);
    overflights
        .windows(2)
        .map(|w| Interval {
            start: w[0],
            end: w[1],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::satellite::demo_constellation;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn spinning(angular_speed: f64, angle: f64) -> Satellite {
        let mut sat = demo_constellation().remove(0);
        sat.angular_speed = angular_speed;
        sat.angle = angle;
        sat
    }

    #[test]
    fn one_second_period_crossings() {
        let now = epoch();
        let sat = spinning(TAU, 0.0);

        let crossings = zenith_crossings(&sat, now);
        assert_eq!(crossings.len(), 4);
        for pair in crossings.windows(2) {
            assert_eq!((pair[1] - pair[0]).num_milliseconds(), 1000);
        }

        let upcoming = upcoming_overflights(&[sat.clone()], now);
        assert_eq!((upcoming[0] - now).num_milliseconds(), 1000);

        let intervals = next_free_intervals(&[sat], now);
        assert_eq!(intervals.len(), 3);
        let total: i64 = intervals.iter().map(|i| i.duration().num_milliseconds()).sum();
        assert_eq!(total, (upcoming[3] - upcoming[0]).num_milliseconds());
    }

    #[test]
    fn crossing_waits_for_the_rest_of_the_revolution() {
        let now = epoch();
        // Quarter turn done at 1 rad/s: three quarters of 2π seconds remain
        let sat = spinning(1.0, TAU / 4.0 + TAU * 3.0);
        let crossings = zenith_crossings(&sat, now);
        let expected_ms = (TAU * 0.75 * 1000.0) as i64;
        assert_eq!((crossings[0] - now).num_milliseconds(), expected_ms);
    }

    #[test]
    fn near_simultaneous_crossings_collapse() {
        let now = epoch();
        let a = spinning(0.1, TAU - 0.1); // crossing in 1000 ms
        let b = spinning(0.1, TAU - 0.15); // crossing in 1500 ms

        let upcoming = upcoming_overflights(&[a.clone(), b], now);
        let solo = upcoming_overflights(&[a], now);
        assert_eq!(upcoming, solo);
    }

    #[test]
    fn stationary_satellites_are_padded_hourly() {
        let now = epoch();
        let sat = spinning(0.0, 1.0);

        let intervals = next_free_intervals(&[sat], now);
        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[0].start, now + Duration::hours(1));
        for interval in &intervals {
            assert_eq!(interval.duration(), Duration::hours(1));
            assert_eq!(interval.duration_text(), "01:00:00");
        }
        assert!(next_free_intervals(&[], now).len() == 3);
    }

    #[test]
    fn crawling_satellites_do_not_overflow_the_calendar() {
        let now = epoch();
        assert!(zenith_crossings(&spinning(1e-300, 1.0), now).is_empty());

        // One crossing now and one ~200k years out; the third is past chrono's range
        let crossings = zenith_crossings(&spinning(1e-12, 0.0), now);
        assert!(crossings.len() < 4);

        let intervals = next_free_intervals(&[spinning(1e-300, 1.0)], now);
        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[0].start, now + Duration::hours(1));
    }

    #[test]
    fn short_lists_pad_from_the_last_overflight() {
        let now = epoch();
        let sat = spinning(TAU, 0.0);
        let upcoming = upcoming_overflights(&[sat], now);
        assert_eq!(upcoming[3] - upcoming[2], Duration::hours(1));
    }

    #[test]
    fn duration_text_is_zero_padded() {
        let start = epoch();
        let interval = Interval {
            start,
            end: start + Duration::seconds(3 * 3600 + 7 * 60 + 9) + Duration::milliseconds(999),
        };
        assert_eq!(interval.duration_text(), "03:07:09");
        assert!(interval.describe(0).starts_with("Interval 1: From "));
        assert!(interval.describe(0).ends_with("(03:07:09)"));
    }
}
