use serde::{Deserialize, Serialize};

/// Link to the business document behind a movement (sales order, GRN, return...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub reference_type: String,
    pub reference_id: String,
    pub reference_number: Option<String>,
}

impl DocumentRef {
    pub fn new(reference_type: impl Into<String>, reference_id: impl Into<String>) -> Self {
        Self {
            reference_type: reference_type.into(),
            reference_id: reference_id.into(),
            reference_number: None,
        }
    }

    pub fn matches(&self, reference_type: &str, reference_id: &str) -> bool {
        self.reference_type == reference_type && self.reference_id == reference_id
    }
}
