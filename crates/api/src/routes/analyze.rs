use crate::error::ApiError;
use axum::extract::Query;
use axum::Json;
use serde::Deserialize;
use timetable_core::{analyze, FetchPolicy, ScoreAnalysis};
use types::Timetable;

#[derive(Deserialize)]
pub struct AnalyzeQuery {
    #[serde(default, rename = "fetchPolicy")]
    pub fetch_policy: FetchPolicy,
}

#[utoipa::path(
        post,
        path = "/v1/analyze",
        request_body = Timetable,
        params(("fetchPolicy" = Option<String>, Query, description = "shallow (default) or full")),
        responses(
            (status = 200, description = "Per-constraint score breakdown", body = ScoreAnalysis),
            (status = 400, description = "Malformed problem")
        )
    )]
pub async fn analyze_handler(
    Query(query): Query<AnalyzeQuery>,
    Json(timetable): Json<Timetable>,
) -> Result<Json<ScoreAnalysis>, ApiError> {
    let analysis = analyze(&timetable, query.fetch_policy)?;
    Ok(Json(analysis))
}
