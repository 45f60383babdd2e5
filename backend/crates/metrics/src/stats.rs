use chrono::{DateTime, Utc};

/// Running mean that only counts the samples it is given.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    pub(crate) fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    /// Zero when nothing was pushed.
    pub(crate) fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

pub(crate) fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.0
}

pub(crate) fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    hours_between(from, to) / 24.0
}

/// `numerator / denominator`, or zero when the denominator is not positive.
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_mean_is_zero() {
        assert_eq!(Mean::default().value(), 0.0);
    }

    #[test]
    fn mean_of_samples() {
        let mut m = Mean::default();
        m.push(2.0);
        m.push(4.0);
        assert!((m.value() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn fractional_hours_and_days() {
        let a = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 1, 2, 12, 0, 0).unwrap();
        assert!((hours_between(a, b) - 36.0).abs() < 1e-9);
        assert!((days_between(a, b) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn ratio_guards_zero_and_negative() {
        assert_eq!(ratio(5.0, 0.0), 0.0);
        assert_eq!(ratio(5.0, -1.0), 0.0);
        assert_eq!(ratio(5.0, 2.0), 2.5);
    }
}
