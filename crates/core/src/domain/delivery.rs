use serde::{Deserialize, Serialize};

use crate::domain::order::OrderId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryAgentId(pub String);

/// Externally visible agent code. Orders reference agents by this code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryAgentCode(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAgent {
    pub id: DeliveryAgentId,
    pub code: DeliveryAgentCode,
    pub orders_assigned: Vec<OrderId>,
}

impl DeliveryAgent {
    pub fn load(&self) -> usize {
        self.orders_assigned.len()
    }
}
