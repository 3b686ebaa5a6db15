use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::VisitStatus;

/// Master catalog entry. Prices are in minor currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTest {
    pub code: String,
    pub name: String,
    pub unit: Option<String>,
    pub unit_price: i64,
    pub ref_min: f64,
    pub ref_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub branch_ref: String,
    pub patient_ref: String,
    pub status: VisitStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A test ordered onto a visit. Name, unit, price and reference range
/// are copies of the catalog row taken at order time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOrder {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub test_code: String,
    pub test_name: String,
    pub unit: Option<String>,
    pub unit_price: i64,
    pub ref_min: f64,
    pub ref_max: f64,
    pub position: i64,
    pub ordered_at: String,
}

impl TestOrder {
    /// `ref_min = ref_max = 0` is the "no range configured" sentinel.
    pub fn has_reference_range(&self) -> bool {
        !(self.ref_min == 0.0 && self.ref_max == 0.0)
    }
}
