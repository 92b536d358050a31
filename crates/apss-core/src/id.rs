use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic-enough nanosecond counter shared by every id-generation call
/// within a process: wall-clock nanoseconds alone can collide under a tight
/// loop, so we fold in a process-local sequence number.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Produces `<agent_id>-<monotonic nanoseconds>`, used whenever a monitor
/// leaves `SecurityEvent.id` blank and the Collector must assign one.
pub fn next_event_id(agent_id: &str) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{agent_id}-{nanos}{seq:04}")
}
