/// Source identity stamped onto every event by the Collector, and used by
/// every monitor to know whose events it is producing. Shared so monitors,
/// the Collector, and tests all construct the same three fields the same
/// way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentIdentity {
    pub agent_id: String,
    pub pod_name: String,
    pub pod_namespace: String,
}
