use serde::{Deserialize, Serialize};

/// Models reported by the external provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderState {
    pub models: Vec<String>,
}

impl ProviderState {
    /// Derived from the model list; there is no separate connection flag
    pub fn connected(&self) -> bool {
        !self.models.is_empty()
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}
