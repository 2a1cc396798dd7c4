use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Mutex;

/// Source of "now" for every date-window decision in the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and demos.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Pins the clock to noon on the given day.
    pub fn on(day: NaiveDate) -> Self {
        let noon = day.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc();
        Self::new(noon)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock mutex poisoned") = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_by_whole_days() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date");
        let clock = FixedClock::on(day);
        assert_eq!(clock.today(), day);

        clock.advance(Duration::days(2));
        assert_eq!(
            clock.today(),
            NaiveDate::from_ymd_opt(2025, 3, 16).expect("valid date")
        );
    }
}
