use chrono::{DateTime, Duration, DurationRound, SecondsFormat, Utc};
use rand::Rng;

#[derive(Debug, Clone)]
pub struct ScheduleWindow {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

/// Identity minted for exactly one incoming request. Never persisted or
/// reused; freshness of signed stream urls depends on that.
#[derive(Debug, Clone)]
pub struct StreamSession {
    pub device_id: String,
    pub sid: String,
    pub generated_at: DateTime<Utc>,
    pub window: ScheduleWindow,
}

impl StreamSession {
    pub fn generated_at_rfc3339(&self) -> String {
        self.generated_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

pub trait SessionFactory: Send + Sync {
    fn create_session(&self) -> StreamSession;
}

pub struct EphemeralSessionFactory {
    window_hours: i64,
}

impl EphemeralSessionFactory {
    pub fn new(window_hours: i64) -> Self {
        Self { window_hours }
    }
}

impl SessionFactory for EphemeralSessionFactory {
    fn create_session(&self) -> StreamSession {
        let now = Utc::now();
        // schedule queries are hour-aligned so repeated requests share edges
        let start = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
        let mut rng = rand::rng();
        // millisecond prefix keeps device ids time-ordered
        let device_id = format!("{:012x}{:04x}{:08x}", now.timestamp_millis(), rng.random::<u16>(), rng.random::<u32>());
        let sid = format!("{:016x}{:016x}", rng.random::<u64>(), rng.random::<u64>());
        StreamSession {
            device_id,
            sid,
            generated_at: now,
            window: ScheduleWindow { start, stop: start + Duration::hours(self.window_hours) },
        }
    }
}
