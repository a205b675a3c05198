mod error;
mod state;
mod telemetry;
pub mod routes {
    pub mod analyze;
    pub mod health;
    pub mod jobs;
    pub mod solve;
    pub mod validate;
}

use axum::{
    routing::{get, post},
    Router,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
        paths(
            routes::health::health,
            routes::solve::solve,
            routes::jobs::status,
            routes::jobs::result,
            routes::jobs::terminate,
            routes::analyze::analyze_handler,
            routes::validate::validate_handler,
        ),
        components(schemas(
            types::Timetable, types::Timeslot, types::Room, types::Teacher,
            types::StudentGroup, types::Lesson, types::TimeWindow,
            types::DayOfWeek, types::TimeOfDay, types::Year, types::LessonType,
            types::SolverStatus, types::SolveOptions, types::Acceptance,
            types::Score, types::Tier, types::ConstraintId,
            types::ConstraintWeights, types::WeightEntry,
            types::TimeslotId, types::RoomId, types::TeacherId,
            types::GroupId, types::LessonId,
            jobs::JobId, jobs::JobState,
            timetable_core::ScoreAnalysis, timetable_core::ConstraintAnalysis,
            timetable_core::ConstraintMatch, timetable_core::FetchPolicy,
            routes::solve::SolveRequest,
            routes::solve::JobCreated,
            routes::jobs::JobStatusView,
            routes::validate::ValidationReport
        )),
        tags(
            (name = "unitimetable", description = "University timetabling API")
        )
    )]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let app_state = state::AppState::new_default();

    let app = Router::new()
        .route("/v1/health", get(routes::health::health))
        .route("/v1/solve", post(routes::solve::solve))
        .route("/v1/jobs/:id", get(routes::jobs::status))
        .route("/v1/jobs/:id/result", get(routes::jobs::result))
        .route("/v1/jobs/:id/terminate", post(routes::jobs::terminate))
        .route("/v1/analyze", post(routes::analyze::analyze_handler))
        .route("/v1/validate", post(routes::validate::validate_handler))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(telemetry::stack())
        .with_state(app_state);

    let port = std::env::var("UNITIMETABLE__SERVER__PORT").unwrap_or_else(|_| "8080".into());
    let addr: std::net::SocketAddr = format!("0.0.0.0:{}", port)
        .parse()
        .expect("invalid listen addr");
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
