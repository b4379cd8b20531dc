use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;

use super::domain::{DocumentId, DocumentRegistration};
use super::issue::CheckSelection;
use super::report::CheckReport;
use super::repository::{DocumentRepository, IssueFilter, IssueId, RuleCatalog};
use super::rules::RuleSet;
use super::service::{CompletenessService, DocumentIssues};

/// Router builder exposing document registration, checks, and issue triage.
pub fn completeness_router<D, C>(service: Arc<CompletenessService<D, C>>) -> Router
where
    D: DocumentRepository + 'static,
    C: RuleCatalog + 'static,
{
    Router::new()
        .route(
            "/api/v1/completeness/documents",
            post(register_handler::<D, C>),
        )
        .route(
            "/api/v1/completeness/documents/:document_id/check",
            post(check_handler::<D, C>),
        )
        .route(
            "/api/v1/completeness/documents/:document_id/issues",
            axum::routing::get(issues_handler::<D, C>),
        )
        .route(
            "/api/v1/completeness/issues/:issue_id/resolve",
            patch(resolve_handler::<D, C>),
        )
        .route("/api/v1/completeness/rules", put(publish_rules_handler::<D, C>))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CheckQuery {
    #[serde(default)]
    pub(crate) check_types: Option<String>,
}

pub(crate) async fn register_handler<D, C>(
    State(service): State<Arc<CompletenessService<D, C>>>,
    Json(registration): Json<DocumentRegistration>,
) -> Result<(StatusCode, Json<Value>), AppError>
where
    D: DocumentRepository + 'static,
    C: RuleCatalog + 'static,
{
    let record = service.register(registration)?;
    let payload = json!({
        "success": true,
        "document_id": record.document_id,
        "status": record.status.label(),
        "extracted_data": record.extracted_data,
    });
    Ok((StatusCode::CREATED, Json(payload)))
}

pub(crate) async fn check_handler<D, C>(
    State(service): State<Arc<CompletenessService<D, C>>>,
    Path(document_id): Path<String>,
    Query(query): Query<CheckQuery>,
) -> Result<Json<CheckReport>, AppError>
where
    D: DocumentRepository + 'static,
    C: RuleCatalog + 'static,
{
    let selection = match query.check_types.as_deref() {
        Some(raw) => CheckSelection::parse(raw)?,
        None => CheckSelection::all(),
    };

    let report = service.check(&DocumentId(document_id), &selection)?;
    Ok(Json(report))
}

pub(crate) async fn issues_handler<D, C>(
    State(service): State<Arc<CompletenessService<D, C>>>,
    Path(document_id): Path<String>,
    Query(filter): Query<IssueFilter>,
) -> Result<Json<DocumentIssues>, AppError>
where
    D: DocumentRepository + 'static,
    C: RuleCatalog + 'static,
{
    Ok(Json(service.issues(&DocumentId(document_id), &filter)?))
}

pub(crate) async fn resolve_handler<D, C>(
    State(service): State<Arc<CompletenessService<D, C>>>,
    Path(issue_id): Path<u64>,
) -> Result<Json<Value>, AppError>
where
    D: DocumentRepository + 'static,
    C: RuleCatalog + 'static,
{
    let record = service.resolve_issue(IssueId(issue_id))?;
    Ok(Json(json!({
        "success": true,
        "message": "Issue marked as resolved",
        "issue": record,
    })))
}

pub(crate) async fn publish_rules_handler<D, C>(
    State(service): State<Arc<CompletenessService<D, C>>>,
    Json(rule_set): Json<RuleSet>,
) -> Result<Json<Value>, AppError>
where
    D: DocumentRepository + 'static,
    C: RuleCatalog + 'static,
{
    let key = rule_set.key.normalized();
    let warnings = service.publish_rule_set(rule_set)?;
    Ok(Json(json!({
        "jurisdiction": key.jurisdiction,
        "form_code": key.form_code,
        "tax_year": key.tax_year,
        "warnings": warnings,
    })))
}
