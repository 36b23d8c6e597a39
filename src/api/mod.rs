use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    AssumptionsError, Defaults, DonorStats, EvaluationError, UserAssumptions, builtin_defaults,
    calculate_donor_stats_from_combined, create_combined_assumptions,
    get_cost_per_life_for_recipient_from_combined, get_cost_per_life_from_combined,
    normalize_user_assumptions,
};

/// Evaluation year when the caller does not supply one.
const DEFAULT_YEAR: i32 = 2025;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<AssumptionsError> for ApiError {
    fn from(err: AssumptionsError) -> Self {
        match err {
            AssumptionsError::CategoryNotFound { .. }
            | AssumptionsError::RecipientNotFound { .. }
            | AssumptionsError::EffectNotFound { .. } => ApiError::not_found(err.to_string()),
            _ => ApiError::bad_request(err.to_string()),
        }
    }
}

impl From<EvaluationError> for ApiError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::CategoryNotFound { .. }
            | EvaluationError::RecipientNotFound { .. } => ApiError::not_found(err.to_string()),
            _ => ApiError::bad_request(err.to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EstimatePayload {
    recipient_id: Option<String>,
    recipient_name: Option<String>,
    category_id: Option<String>,
    amount: Option<f64>,
    year: Option<i32>,
    assumptions: Option<UserAssumptions>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
enum TargetKind {
    Recipient,
    Category,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfo {
    kind: TargetKind,
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    target: TargetInfo,
    year: i32,
    /// `None` means no deliverable benefit under current assumptions.
    cost_per_life: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lives_saved: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AssumptionsPayload {
    assumptions: UserAssumptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssumptionsResponse {
    assumptions: Option<UserAssumptions>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DonorsPayload {
    year_override: Option<i32>,
    assumptions: Option<UserAssumptions>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DonorsResponse {
    donors: Vec<DonorStats>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn normalized_assumptions(
    raw: Option<UserAssumptions>,
    defaults: &Defaults,
) -> Result<Option<UserAssumptions>, ApiError> {
    match raw {
        Some(raw) => Ok(normalize_user_assumptions(&raw, defaults)?),
        None => Ok(None),
    }
}

fn estimate_from_payload(payload: EstimatePayload) -> Result<EstimateResponse, ApiError> {
    let defaults = builtin_defaults();
    let user = normalized_assumptions(payload.assumptions, &defaults)?;
    let combined = create_combined_assumptions(&defaults, user.as_ref());
    let year = payload.year.unwrap_or(DEFAULT_YEAR);

    let targets_given = [
        payload.recipient_id.is_some(),
        payload.recipient_name.is_some(),
        payload.category_id.is_some(),
    ]
    .iter()
    .filter(|given| **given)
    .count();
    if targets_given != 1 {
        return Err(ApiError::bad_request(
            "specify exactly one of recipientId, recipientName, categoryId",
        ));
    }

    let (target, cost) = if let Some(category_id) = payload.category_id {
        let category = combined.get_category_by_id(&category_id)?;
        let target = TargetInfo {
            kind: TargetKind::Category,
            id: category.id.clone(),
            name: category.name.clone(),
        };
        (
            target,
            get_cost_per_life_from_combined(&combined, &category_id, year)?,
        )
    } else {
        let recipient_id = match payload.recipient_id {
            Some(id) => id,
            None => {
                let name = payload.recipient_name.expect("exactly one target");
                combined
                    .find_recipient_id(&name)
                    .ok_or_else(|| ApiError::not_found(format!("no recipient named '{name}'")))?
                    .to_string()
            }
        };
        let recipient = combined.get_recipient_by_id(&recipient_id)?;
        let target = TargetInfo {
            kind: TargetKind::Recipient,
            id: recipient.id.clone(),
            name: recipient.name.clone(),
        };
        (
            target,
            get_cost_per_life_for_recipient_from_combined(&combined, &recipient_id, year)?,
        )
    };

    Ok(EstimateResponse {
        target,
        year,
        cost_per_life: cost.is_finite().then_some(cost),
        lives_saved: payload.amount.map(|amount| amount / cost),
    })
}

fn normalize_from_payload(payload: AssumptionsPayload) -> Result<AssumptionsResponse, ApiError> {
    let defaults = builtin_defaults();
    let assumptions = normalize_user_assumptions(&payload.assumptions, &defaults)?;
    Ok(AssumptionsResponse { assumptions })
}

fn donors_from_payload(payload: DonorsPayload) -> Result<DonorsResponse, ApiError> {
    let defaults = builtin_defaults();
    let user = normalized_assumptions(payload.assumptions, &defaults)?;
    let combined = create_combined_assumptions(&defaults, user.as_ref());
    let donations: Vec<_> = match payload.year_override {
        Some(year) => defaults
            .donations
            .iter()
            .cloned()
            .map(|mut d| {
                d.year = year;
                d
            })
            .collect(),
        None => defaults.donations.clone(),
    };
    let donors = calculate_donor_stats_from_combined(&combined, &donations)?;
    Ok(DonorsResponse { donors })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/estimate",
            get(estimate_get_handler).post(estimate_post_handler),
        )
        .route("/api/assumptions", post(normalize_handler))
        .route("/api/defaults", get(defaults_handler))
        .route("/api/donors", get(donors_get_handler).post(donors_post_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("lifecost HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/api/defaults");

    axum::serve(listener, app).await
}

async fn estimate_get_handler(Query(payload): Query<EstimatePayload>) -> Response {
    respond(estimate_from_payload(payload))
}

async fn estimate_post_handler(Json(payload): Json<EstimatePayload>) -> Response {
    respond(estimate_from_payload(payload))
}

async fn normalize_handler(Json(payload): Json<AssumptionsPayload>) -> Response {
    respond(normalize_from_payload(payload))
}

async fn defaults_handler() -> Response {
    json_response(StatusCode::OK, builtin_defaults())
}

async fn donors_get_handler(Query(payload): Query<DonorsPayload>) -> Response {
    respond(donors_from_payload(payload))
}

async fn donors_post_handler(Json(payload): Json<DonorsPayload>) -> Response {
    respond(donors_from_payload(payload))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => error_response(err.status, &err.message),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate_from_json(json: &str) -> Result<EstimateResponse, ApiError> {
        let payload =
            serde_json::from_str::<EstimatePayload>(json).expect("payload should parse");
        estimate_from_payload(payload)
    }

    #[test]
    fn estimate_payload_parses_web_keys() {
        let payload: EstimatePayload = serde_json::from_str(
            r#"{
              "recipientId": "against-malaria-fund",
              "amount": 10000,
              "year": 2024,
              "assumptions": {"globalParameters": {"discountRate": 0.05}}
            }"#,
        )
        .expect("payload should parse");
        assert_eq!(payload.recipient_id.as_deref(), Some("against-malaria-fund"));
        assert_eq!(payload.amount, Some(10_000.0));
        assert_eq!(payload.year, Some(2024));
        assert!(payload.assumptions.is_some());
    }

    #[test]
    fn estimate_requires_exactly_one_target() {
        let err = estimate_from_json("{}").expect_err("no target");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = estimate_from_json(
            r#"{"recipientId": "against-malaria-fund", "categoryId": "global-health"}"#,
        )
        .expect_err("two targets");
        assert!(err.message.contains("exactly one"));
    }

    #[test]
    fn estimate_for_builtin_recipient_is_finite_and_positive() {
        let response = estimate_from_json(
            r#"{"recipientId": "against-malaria-fund", "amount": 100000}"#,
        )
        .expect("must evaluate");
        let cost = response.cost_per_life.expect("finite cost");
        assert!(cost > 0.0);
        let lives = response.lives_saved.expect("amount given");
        assert!((lives - 100_000.0 / cost).abs() < 1e-9);
        assert_eq!(response.year, DEFAULT_YEAR);
    }

    #[test]
    fn estimate_resolves_recipient_by_name() {
        let response = estimate_from_json(r#"{"recipientName": "Against Malaria Fund"}"#)
            .expect("must evaluate");
        assert_eq!(response.target.id, "against-malaria-fund");
        assert_eq!(response.target.kind, TargetKind::Recipient);

        let err = estimate_from_json(r#"{"recipientName": "Nobody"}"#).expect_err("unknown name");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn estimate_applies_user_assumptions() {
        let baseline = estimate_from_json(r#"{"categoryId": "global-health"}"#)
            .expect("must evaluate")
            .cost_per_life
            .expect("finite");
        let adjusted = estimate_from_json(
            r#"{
              "categoryId": "global-health",
              "assumptions": {
                "categories": {
                  "global-health": {
                    "effects": [{"effectId": "malaria-nets", "costPerQALY": 190.0}]
                  }
                }
              }
            }"#,
        )
        .expect("must evaluate")
        .cost_per_life
        .expect("finite");
        assert!(adjusted > baseline);
    }

    #[test]
    fn estimate_rejects_unknown_ids_with_not_found() {
        let err = estimate_from_json(r#"{"recipientId": "nope"}"#).expect_err("unknown id");
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = estimate_from_json(r#"{"categoryId": "nope"}"#).expect_err("unknown id");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn normalize_endpoint_strips_defaults() {
        let payload: AssumptionsPayload = serde_json::from_str(
            r#"{"assumptions": {"globalParameters": {"discountRate": 0.02}}}"#,
        )
        .expect("payload should parse");
        let response = normalize_from_payload(payload).expect("valid document");
        assert_eq!(response.assumptions, None);

        let payload: AssumptionsPayload = serde_json::from_str(
            r#"{"assumptions": {"globalParameters": {"discountRate": 0.09}}}"#,
        )
        .expect("payload should parse");
        let response = normalize_from_payload(payload).expect("valid document");
        let tree = response.assumptions.expect("content survives");
        assert_eq!(
            tree.global_parameters.expect("overrides").discount_rate,
            Some(0.09)
        );
    }

    #[test]
    fn donor_stats_cover_every_ledger_donor() {
        let response = donors_from_payload(DonorsPayload::default()).expect("must evaluate");
        let defaults = builtin_defaults();
        let mut donors: Vec<_> = defaults.donations.iter().map(|d| d.donor.clone()).collect();
        donors.sort();
        donors.dedup();
        assert_eq!(response.donors.len(), donors.len());
        // Sorted by lives saved, best first.
        for pair in response.donors.windows(2) {
            assert!(pair[0].lives_saved >= pair[1].lives_saved);
        }
    }

    #[test]
    fn estimate_response_serialization_contains_expected_fields() {
        let response = estimate_from_json(
            r#"{"recipientId": "against-malaria-fund", "amount": 5000}"#,
        )
        .expect("must evaluate");
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"costPerLife\""));
        assert!(json.contains("\"livesSaved\""));
        assert!(json.contains("\"target\""));
        assert!(json.contains("\"kind\":\"recipient\""));
    }
}
