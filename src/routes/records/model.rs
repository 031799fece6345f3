use serde::{Deserialize, Serialize};

use crate::database::Record;

#[derive(Debug, Serialize)]
pub struct RecordList {
    pub items: Vec<Record>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CreateResult {
    One(Record),
    Many { inserted: u64 },
}

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub field: String,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub count: u64,
    pub sum: Option<f64>,
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}
