use std::collections::HashMap;

use axum::{
    extract::{Json, Path, Query},
    http::StatusCode,
};
use serde_json::Value;

use crate::{
    database::{Aggregate, Filter, Record},
    error::AppError,
    result::{ApiResponse, success_response},
    tenant::RequestContext,
};

use super::model::{CreateResult, DeleteResult, RecordList, Summary, SummaryQuery};

fn validate_collection(collection: &str) -> Result<(), AppError> {
    let valid = !collection.is_empty()
        && collection.len() <= 64
        && collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!("invalid collection name: {collection}")))
    }
}

fn into_record(value: Value) -> Result<Record, AppError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Validation(format!("expected an object, got {other}"))),
    }
}

#[axum::debug_handler]
pub async fn list_records(
    ctx: RequestContext,
    Path(collection): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse<RecordList>>, AppError> {
    validate_collection(&collection)?;

    let filter: Filter = query.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
    let items = ctx.data.find_many(&collection, filter).await?;
    Ok(success_response(RecordList {
        total: items.len() as u64,
        items,
    }))
}

/// JSON 对象创建单条记录，数组则批量创建
#[axum::debug_handler]
pub async fn create_record(
    ctx: RequestContext,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<ApiResponse<CreateResult>>), AppError> {
    validate_collection(&collection)?;

    let result = match body {
        Value::Array(items) => {
            let records = items
                .into_iter()
                .map(into_record)
                .collect::<Result<Vec<_>, _>>()?;
            let inserted = ctx.data.create_many(&collection, records).await?;
            CreateResult::Many { inserted }
        }
        other => CreateResult::One(ctx.data.create(&collection, into_record(other)?).await?),
    };

    tracing::debug!(
        "Tenant {} created records in {}",
        ctx.tenant.tenant_id,
        collection
    );
    Ok((StatusCode::CREATED, success_response(result)))
}

#[axum::debug_handler]
pub async fn delete_record(
    ctx: RequestContext,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<DeleteResult>>, AppError> {
    validate_collection(&collection)?;

    let mut filter = Filter::new();
    filter.insert("id".into(), Value::String(id));
    let deleted = ctx.data.delete(&collection, filter).await?.is_some();
    Ok(success_response(DeleteResult { deleted }))
}

#[axum::debug_handler]
pub async fn summarize_records(
    ctx: RequestContext,
    Path(collection): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ApiResponse<Summary>>, AppError> {
    validate_collection(&collection)?;

    let data = &ctx.data;
    let field = query.field;
    let count = data.count(&collection, Filter::new()).await?;
    let sum = data
        .aggregate(&collection, Filter::new(), Aggregate::Sum(field.clone()))
        .await?;
    let avg = data
        .aggregate(&collection, Filter::new(), Aggregate::Avg(field.clone()))
        .await?;
    let min = data
        .aggregate(&collection, Filter::new(), Aggregate::Min(field.clone()))
        .await?;
    let max = data
        .aggregate(&collection, Filter::new(), Aggregate::Max(field))
        .await?;

    Ok(success_response(Summary {
        count,
        sum,
        avg,
        min,
        max,
    }))
}
