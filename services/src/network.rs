/// A wireless network as seen by the client: SSID-style name plus hardware id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    pub name: String,
    pub hardware_id: String,
}

impl NetworkIdentity {
    pub fn new(name: impl Into<String>, hardware_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hardware_id: hardware_id.into(),
        }
    }

    pub fn matches_network(&self, allowed: &NetworkIdentity) -> bool {
        matches(&self.name, &self.hardware_id, &allowed.name, &allowed.hardware_id)
    }
}

/// Exact, case-sensitive equality on both name and hardware id.
pub fn matches(claimed_name: &str, claimed_hardware_id: &str, allowed_name: &str, allowed_hardware_id: &str) -> bool {
    claimed_name == allowed_name && claimed_hardware_id == allowed_hardware_id
}
