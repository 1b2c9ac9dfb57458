use crate::domain::delivery::DeliveryAgent;

/// Least-loaded delivery agent. Ties go to the agent that appears first in
/// `agents`, so the registry order is the tie-break.
pub fn least_loaded(agents: &[DeliveryAgent]) -> Option<&DeliveryAgent> {
    agents.iter().min_by_key(|agent| agent.load())
}
