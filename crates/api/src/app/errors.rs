use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use partyplan_infra::ClaimError;

pub fn claim_error_to_response(err: ClaimError) -> axum::response::Response {
    let kind = err.kind();
    let message = err.to_string();
    match err {
        ClaimError::InvalidQuantity(_) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_quantity", kind, message)
        }
        ClaimError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", kind, message),
        ClaimError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", kind, message),
        ClaimError::Oversubscribed { available } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "oversubscribed",
                "kind": kind,
                "message": message,
                "available": available,
            })),
        )
            .into_response(),
        ClaimError::TargetLocked { .. } => json_error(StatusCode::CONFLICT, "target_locked", kind, message),
        ClaimError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", kind, message),
        ClaimError::StorageUnavailable(_) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", kind, message)
        }
        ClaimError::Internal(_) => {
            tracing::error!("internal registry error: {message}");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                kind,
                "internal error",
            )
        }
    }
}

/// Malformed or mistyped JSON bodies are validation failures, not 422s.
pub fn body_rejection(rejection: JsonRejection) -> axum::response::Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "invalid_body",
        "Validation",
        rejection.body_text(),
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    kind: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "kind": kind,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_map_to_client_statuses() {
        let cases = [
            (ClaimError::InvalidQuantity("zero".into()), StatusCode::BAD_REQUEST),
            (ClaimError::Validation("name".into()), StatusCode::BAD_REQUEST),
            (ClaimError::NotFound, StatusCode::NOT_FOUND),
            (ClaimError::Oversubscribed { available: 2 }, StatusCode::CONFLICT),
            (ClaimError::TargetLocked { claimed: 1 }, StatusCode::CONFLICT),
            (ClaimError::StorageUnavailable("pool".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ClaimError::Internal("decode".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(claim_error_to_response(err).status(), status);
        }
    }
}
