use chrono::{DateTime, Duration, Utc};

/// Ordering a provider guarantees for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Newest first; the first out-of-window record ends the listing.
    Descending,
    /// No usable order; every page must be filtered in full.
    Unordered,
}

/// What to do with one listed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    Keep,
    Skip,
    Stop,
}

/// Trailing time window with an inclusive lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    since: DateTime<Utc>,
}

impl TimeWindow {
    pub fn trailing_days(days: u32) -> Self {
        Self::ending_at(Utc::now(), days)
    }

    pub fn ending_at(now: DateTime<Utc>, days: u32) -> Self {
        Self {
            since: now - Duration::days(i64::from(days)),
        }
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.since
    }

    pub fn scan(&self, ts: DateTime<Utc>, order: Order) -> Scan {
        match (self.contains(ts), order) {
            (true, _) => Scan::Keep,
            (false, Order::Descending) => Scan::Stop,
            (false, Order::Unordered) => Scan::Skip,
        }
    }
}
