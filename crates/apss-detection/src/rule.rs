use apss_core::{SecurityEvent, Severity};

/// A rule is data, not behavior: `predicate` is a first-class function of
/// `event -> bool`, not a trait object hierarchy, so the rule table can be
/// built as a plain `Vec` and iterated in order with no dynamic dispatch.
pub struct Rule {
    pub id: &'static str,
    pub name: &'static str,
    pub severity: Severity,
    pub mitre_tactic: Option<&'static str>,
    pub mitre_id: Option<&'static str>,
    pub recommended_actions: &'static [&'static str],
    pub predicate: fn(&SecurityEvent) -> bool,
}

impl Rule {
    pub fn matches(&self, event: &SecurityEvent) -> bool {
        (self.predicate)(event)
    }
}
