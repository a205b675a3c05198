use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use jobs::JobState;
use types::{Score, Timetable};
use utoipa::ToSchema;

#[derive(serde::Serialize, ToSchema)]
pub struct JobStatusView {
    pub score: Option<Score>,
    pub status: JobState,
}

#[utoipa::path(
        get,
        path = "/v1/jobs/{id}",
        params(("id" = String, Path, description = "Job ID")),
        responses(
            (status = 200, description = "Score and state", body = JobStatusView),
            (status = 404, description = "Unknown job id")
        )
    )]
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusView>, ApiError> {
    let (score, status) = state.jobs.get_status(&id)?;
    Ok(Json(JobStatusView { score, status }))
}

#[utoipa::path(
        get,
        path = "/v1/jobs/{id}/result",
        params(("id" = String, Path, description = "Job ID")),
        responses(
            (status = 200, description = "Most recent best solution", body = Timetable),
            (status = 404, description = "Unknown job id")
        )
    )]
pub async fn result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Timetable>, ApiError> {
    let (solution, _) = state.jobs.get_solution(&id)?;
    Ok(Json(solution))
}

#[utoipa::path(
        post,
        path = "/v1/jobs/{id}/terminate",
        params(("id" = String, Path, description = "Job ID")),
        responses(
            (status = 200, description = "Best solution found before termination", body = Timetable),
            (status = 404, description = "Unknown job id")
        )
    )]
pub async fn terminate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Timetable>, ApiError> {
    let (solution, _) = state.jobs.terminate(&id).await?;
    Ok(Json(solution))
}
