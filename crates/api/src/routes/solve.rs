use crate::error::ApiError;
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use types::{SolveOptions, Timetable};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct SolveRequest {
    pub timetable: Timetable,
    #[serde(default)]
    pub options: SolveOptions,
}

#[derive(serde::Serialize, ToSchema)]
pub struct JobCreated {
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub status: &'static str,
}

#[utoipa::path(
        post,
        path = "/v1/solve",
        request_body = SolveRequest,
        responses(
            (status = 200, description = "Job submitted", body = JobCreated),
            (status = 400, description = "Malformed problem")
        )
    )]
pub async fn solve(
    State(state): State<AppState>,
    Json(request): Json<SolveRequest>,
) -> Result<Json<JobCreated>, ApiError> {
    let id = state.jobs.submit(request.timetable, request.options)?;
    Ok(Json(JobCreated {
        job_id: id.0,
        status: "submitted",
    }))
}
