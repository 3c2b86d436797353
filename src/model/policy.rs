use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Calendar date from its parts; out-of-range parts give the Unix epoch.
pub(crate) fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// Dates between which an intervention is in force: `[start, stop)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyWindow {
    pub start: NaiveDate,
    pub stop: NaiveDate,
}

impl PolicyWindow {
    pub fn new(start: NaiveDate, stop: NaiveDate) -> Self {
        Self { start, stop }
    }

    /// Whether simulated day `t` (days since `reference`) falls inside the window.
    pub fn is_active(&self, reference: NaiveDate, t: f64) -> bool {
        let start = (self.start - reference).num_days() as f64;
        let stop = (self.stop - reference).num_days() as f64;
        t >= start && t < stop
    }
}

/// Intervention calendar. A `None` window means the policy is never on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySchedule {
    /// Calendar date of simulated day 0.
    pub reference_start: NaiveDate,
    pub social_distancing: Option<PolicyWindow>,
    pub immunity_passports: Option<PolicyWindow>,
    pub case_isolation: Option<PolicyWindow>,
}

impl Default for PolicySchedule {
    fn default() -> Self {
        Self {
            reference_start: ymd(2020, 2, 20),
            social_distancing: None,
            immunity_passports: None,
            case_isolation: None,
        }
    }
}

/// Which interventions are on at a given instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyFlags {
    pub social_distancing: bool,
    pub immunity_passports: bool,
    pub case_isolation: bool,
}

impl PolicySchedule {
    pub fn flags_at(&self, t: f64) -> PolicyFlags {
        let on = |w: &Option<PolicyWindow>| w.map_or(false, |w| w.is_active(self.reference_start, t));
        PolicyFlags {
            social_distancing: on(&self.social_distancing),
            immunity_passports: on(&self.immunity_passports),
            case_isolation: on(&self.case_isolation),
        }
    }

    /// Calendar date of the simulated day containing `t`.
    pub fn date_at(&self, t: f64) -> NaiveDate {
        self.reference_start + Duration::days(t.max(0.0).floor() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn window_is_half_open() {
        let reference = d(2020, 3, 1);
        let w = PolicyWindow::new(d(2020, 3, 11), d(2020, 3, 21));
        assert!(!w.is_active(reference, 9.99));
        assert!(w.is_active(reference, 10.0));
        assert!(w.is_active(reference, 19.5));
        assert!(!w.is_active(reference, 20.0));
    }

    #[test]
    fn schedule_flags_and_dates() {
        let schedule = PolicySchedule {
            reference_start: d(2020, 3, 1),
            social_distancing: Some(PolicyWindow::new(d(2020, 3, 1), d(2020, 4, 1))),
            immunity_passports: None,
            case_isolation: Some(PolicyWindow::new(d(2020, 3, 15), d(2020, 3, 16))),
        };
        let f = schedule.flags_at(14.5);
        assert!(f.social_distancing);
        assert!(!f.immunity_passports);
        assert!(f.case_isolation);
        assert!(!schedule.flags_at(15.0).case_isolation);
        assert_eq!(schedule.date_at(14.9), d(2020, 3, 15));
    }
}
