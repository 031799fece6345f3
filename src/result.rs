use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 所有响应共用的 JSON 包装：`{success, data?, message, code?, errors?}`。
///
/// `extra` 展开到顶层，携带 `requiredFeature`、`retryAfter` 等错误专属字段。
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
    #[serde(flatten, skip_serializing_if = "Map::is_empty", default)]
    pub extra: Map<String, Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
            code: None,
            errors: None,
            extra: Map::new(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>, code: Option<&str>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
            code: code.map(str::to_string),
            errors: None,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }
}

pub fn success_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data, "تمت العملية بنجاح"))
}
