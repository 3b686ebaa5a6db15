use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ReportStatus, ResultFlag};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportVersion {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub version_number: i64,
    pub status: ReportStatus,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub finalized_at: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: Uuid,
    pub version_id: Uuid,
    pub order_id: Uuid,
    pub value: Option<f64>,
    pub flag: Option<ResultFlag>,
    pub notes: Option<String>,
}
