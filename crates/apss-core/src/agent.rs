use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: String,
    pub pod_name: String,
    pub pod_namespace: String,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub event_count: u64,
}

impl AgentInfo {
    pub fn new(agent_id: String, pod_name: String, pod_namespace: String, now: DateTime<Utc>) -> Self {
        Self {
            agent_id,
            pod_name,
            pod_namespace,
            connected_at: now,
            last_seen: now,
            event_count: 0,
        }
    }

    /// `last_seen` must be non-decreasing; a refresh with an out-of-order
    /// timestamp is clamped rather than rewinding liveness.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_seen {
            self.last_seen = now;
        }
        self.event_count += 1;
    }

    pub fn is_stale(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_seen) > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_never_rewinds_last_seen() {
        let t0 = Utc::now();
        let mut info = AgentInfo::new("a1".into(), "p".into(), "ns".into(), t0);
        let earlier = t0 - chrono::Duration::seconds(10);
        info.touch(earlier);
        assert_eq!(info.last_seen, t0);
        assert_eq!(info.event_count, 1);
    }

    #[test]
    fn stale_after_threshold() {
        let t0 = Utc::now();
        let info = AgentInfo::new("a1".into(), "p".into(), "ns".into(), t0);
        let threshold = chrono::Duration::seconds(120);
        assert!(!info.is_stale(t0 + chrono::Duration::seconds(60), threshold));
        assert!(info.is_stale(t0 + chrono::Duration::seconds(121), threshold));
    }
}
