//! General behaviour switches.

use serde::{Deserialize, Serialize};

const fn default_validate_rows() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Check every row against its entity's JSON Schema before saving.
    #[serde(default = "default_validate_rows")]
    pub validate_rows: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            validate_rows: default_validate_rows(),
        }
    }
}
