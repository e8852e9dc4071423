use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Which tier a newly-ingested event should land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Hot,
    Cold,
}

/// `spec.md` §4.1: a pure function of `evt.scheduled_at - now()` and
/// `IMMEDIATE_HORIZON_SECONDS`. An already-past `scheduled_at` routes
/// hot (it will simply already be due when `HotLoop` next peeks); a
/// `scheduled_at` exactly on the threshold routes hot.
///
/// Routing itself cannot fail — the caller's store insert is where
/// `TransientStoreError`/`ConflictError` can occur.
pub fn route(
    scheduled_at: DateTime<Utc>,
    now: DateTime<Utc>,
    immediate_horizon_seconds: i64,
) -> Tier {
    let delay = scheduled_at - now;
    if delay <= ChronoDuration::seconds(immediate_horizon_seconds) {
        Tier::Hot
    } else {
        Tier::Cold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn past_due_routes_hot() {
        let now = Utc::now();
        let scheduled_at = now - ChronoDuration::seconds(5);
        assert_eq!(route(scheduled_at, now, 86_400), Tier::Hot);
    }

    #[test]
    fn within_horizon_routes_hot() {
        let now = Utc::now();
        let scheduled_at = now + ChronoDuration::seconds(100);
        assert_eq!(route(scheduled_at, now, 86_400), Tier::Hot);
    }

    #[test]
    fn exactly_on_horizon_routes_hot() {
        let now = Utc::now();
        let scheduled_at = now + ChronoDuration::seconds(86_400);
        assert_eq!(route(scheduled_at, now, 86_400), Tier::Hot);
    }

    #[test]
    fn beyond_horizon_routes_cold() {
        let now = Utc::now();
        let scheduled_at = now + ChronoDuration::seconds(86_401);
        assert_eq!(route(scheduled_at, now, 86_400), Tier::Cold);
    }
}
