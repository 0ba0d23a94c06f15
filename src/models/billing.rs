//! Billing table models returned by the extraction service.

use serde::{Deserialize, Serialize};

/// Column names in the fixed table order, as they appear on the wire.
pub const BILLING_COLUMNS: [&str; 6] = [
    "Periodo",
    "Demanda",
    "Consumo Total",
    "Factor de potencia",
    "Factor de Carga",
    "Precio Medio",
];

/// One row of the billing table.
///
/// All values are free text without units; numeric-ness is not validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BillingRow {
    #[serde(rename = "Periodo")]
    pub period: String,

    #[serde(rename = "Demanda")]
    pub demand: String,

    #[serde(rename = "Consumo Total")]
    pub total_consumption: String,

    #[serde(rename = "Factor de potencia")]
    pub power_factor: String,

    #[serde(rename = "Factor de Carga")]
    pub load_factor: String,

    #[serde(rename = "Precio Medio")]
    pub average_price: String,
}

impl BillingRow {
    /// Values in the same order as [`BILLING_COLUMNS`].
    pub fn values(&self) -> [&str; 6] {
        [
            &self.period,
            &self.demand,
            &self.total_consumption,
            &self.power_factor,
            &self.load_factor,
            &self.average_price,
        ]
    }
}

/// Rows extracted from one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTable {
    pub file_name: String,

    #[serde(rename = "data")]
    pub rows: Vec<BillingRow>,
}

impl ExtractedTable {
    pub fn new(file_name: impl Into<String>, rows: Vec<BillingRow>) -> Self {
        Self {
            file_name: file_name.into(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}
