use jobs::InMemJobs;
use solver_ls::LocalSearchSolver;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<InMemJobs<LocalSearchSolver>>,
}

impl AppState {
    pub fn new_default() -> Self {
        Self {
            jobs: Arc::new(InMemJobs::new(LocalSearchSolver::new())),
        }
    }
}
