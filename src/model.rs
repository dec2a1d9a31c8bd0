use serde::{Deserialize, Serialize};

/// A row of the `medicamentos` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationRecord {
    #[serde(rename = "nombre")]
    pub name: String,
    pub stock: u32,
    #[serde(rename = "costo")]
    pub cost: f64,
    #[serde(rename = "marca")]
    pub brand: String,
}

impl MedicationRecord {
    pub fn new(name: impl Into<String>, stock: u32, cost: f64, brand: impl Into<String>) -> Self {
        MedicationRecord {
            name: name.into(),
            stock,
            cost,
            brand: brand.into(),
        }
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Store lookup result for one candidate name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "disponible")]
    pub available: bool,
    #[serde(rename = "detalles", default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<MedicationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn found(name: String, matches: Vec<MedicationRecord>) -> Self {
        ValidationResult {
            name,
            available: !matches.is_empty(),
            matches,
            error: None,
        }
    }

    pub fn failed(name: String, error: impl Into<String>) -> Self {
        ValidationResult {
            name,
            available: false,
            matches: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Entry of the `/validar-stock` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockCheck {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "disponible")]
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ValidationResult> for StockCheck {
    /// A name is available for purchase only when some match has units left.
    fn from(result: &ValidationResult) -> Self {
        StockCheck {
            name: result.name.clone(),
            available: result.error.is_none() && result.matches.iter().any(|m| m.in_stock()),
            error: result.error.clone(),
        }
    }
}

/// Output of one run of the normalization pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationOutcome {
    #[serde(rename = "normalizado")]
    pub normalized_names: Vec<String>,
    #[serde(rename = "resultados")]
    pub results: Vec<ValidationResult>,
    #[serde(rename = "nota", default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
