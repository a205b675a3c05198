//! In-memory solve-job manager: one worker task per job, a concurrent
//! registry of atomically replaceable records, cooperative termination.
//! The registry is process-local and not persisted; restarting the process
//! forgets every job.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use timetable_core::{SolveSession, Solver, ValidationError};
use tokio::task::JoinHandle;
use tracing::error;
use types::{Score, SolveOptions, SolverStatus, Timetable};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, ToSchema, PartialEq, Eq)]
pub struct JobId(pub String);

#[derive(
    Clone, Copy, Debug, serde::Serialize, serde::Deserialize, ToSchema, PartialEq, Eq,
)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Submitted,
    Solving,
    TerminatedEarly,
    Solved,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::TerminatedEarly | JobState::Solved | JobState::Failed
        )
    }

    fn as_solver_status(self) -> SolverStatus {
        match self {
            JobState::Submitted | JobState::Failed => SolverStatus::NotSolving,
            JobState::Solving => SolverStatus::Solving,
            JobState::TerminatedEarly => SolverStatus::TerminatedEarly,
            JobState::Solved => SolverStatus::Solved,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("no job found for id {0}")]
    NotFound(String),
    #[error("job {id} failed: {message}")]
    Solver { id: String, message: String },
}

struct JobEntry {
    state: JobState,
    session: SolveSession,
    error: Option<String>,
    handle: Option<JoinHandle<()>>,
}

pub struct InMemJobs<S: Solver> {
    inner: Arc<RwLock<HashMap<String, JobEntry>>>,
    solver: Arc<S>,
}

impl<S: Solver> Clone for InMemJobs<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            solver: self.solver.clone(),
        }
    }
}

impl<S: Solver> InMemJobs<S> {
    pub fn new(solver: S) -> Self {
        Self {
            inner: Default::default(),
            solver: Arc::new(solver),
        }
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.inner.read().keys().cloned().collect()
    }

    /// Validates the problem, registers the job and starts its worker.
    /// Returns immediately; the caller polls with the returned id.
    pub fn submit(
        &self,
        problem: Timetable,
        options: SolveOptions,
    ) -> Result<JobId, ValidationError> {
        timetable_core::validate(&problem)?;

        let id = Uuid::new_v4().to_string();
        let session = SolveSession::new();
        // The submitted aggregate is the best-known solution until the
        // engine publishes something better.
        session.mailbox.publish(problem.clone());

        let map = self.inner.clone();
        let solver = self.solver.clone();
        let id_for_task = id.clone();
        let worker_session = session.clone();

        let mut registry = self.inner.write();
        registry.insert(
            id.clone(),
            JobEntry {
                state: JobState::Submitted,
                session,
                error: None,
                handle: None,
            },
        );
        let handle = tokio::spawn(async move {
            if let Some(entry) = map.write().get_mut(&id_for_task) {
                entry.state = JobState::Solving;
            }
            match solver
                .solve(problem, options, worker_session.clone())
                .await
            {
                Ok(solution) => {
                    let state = match solution.status {
                        SolverStatus::TerminatedEarly => JobState::TerminatedEarly,
                        _ => JobState::Solved,
                    };
                    worker_session.mailbox.publish(solution);
                    if let Some(entry) = map.write().get_mut(&id_for_task) {
                        entry.state = state;
                    }
                }
                Err(e) => {
                    error!(job = %id_for_task, error = ?e, "job failed");
                    if let Some(entry) = map.write().get_mut(&id_for_task) {
                        entry.state = JobState::Failed;
                        entry.error = Some(format!("{e:#}"));
                    }
                }
            }
        });
        if let Some(entry) = registry.get_mut(&id) {
            entry.handle = Some(handle);
        }
        drop(registry);

        Ok(JobId(id))
    }

    /// The most recent best solution and the job's current state. A failed
    /// job surfaces its captured error here and nowhere else.
    pub fn get_solution(&self, id: &str) -> Result<(Timetable, JobState), JobError> {
        let guard = self.inner.read();
        let entry = guard
            .get(id)
            .ok_or_else(|| JobError::NotFound(id.to_owned()))?;
        if entry.state == JobState::Failed {
            return Err(JobError::Solver {
                id: id.to_owned(),
                message: entry.error.clone().unwrap_or_else(|| "unknown".into()),
            });
        }
        let mut solution = entry
            .session
            .mailbox
            .peek()
            .expect("mailbox is seeded at submit");
        solution.status = entry.state.as_solver_status();
        Ok((solution, entry.state))
    }

    /// Score and state only, without the solution payload.
    pub fn get_status(&self, id: &str) -> Result<(Option<Score>, JobState), JobError> {
        let (solution, state) = self.get_solution(id)?;
        Ok((solution.score, state))
    }

    /// Signals cooperative cancellation, waits for the worker to observe it
    /// and returns the best solution found. Not an error path.
    pub async fn terminate(&self, id: &str) -> Result<(Timetable, JobState), JobError> {
        let handle = {
            let mut guard = self.inner.write();
            let entry = guard
                .get_mut(id)
                .ok_or_else(|| JobError::NotFound(id.to_owned()))?;
            entry.session.cancel.cancel();
            entry.handle.take()
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.get_solution(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use solver_ls::LocalSearchSolver;
    use std::time::Duration;
    use types::*;

    fn fixture(lesson_count: u64, budget_minutes: u64) -> Timetable {
        let two_hour = |id: u64, day: DayOfWeek, hour: u16| Timeslot {
            id: TimeslotId(id),
            day,
            start: TimeOfDay::hm(hour, 0),
            end: TimeOfDay::hm(hour + 2, 0),
        };
        Timetable::new(
            vec![
                two_hour(1, DayOfWeek::Mon, 8),
                two_hour(2, DayOfWeek::Mon, 10),
                two_hour(3, DayOfWeek::Tue, 8),
                two_hour(4, DayOfWeek::Tue, 10),
            ],
            vec![
                Room {
                    id: RoomId(1),
                    name: "Room1".into(),
                    capacity: 40,
                    building: "A".into(),
                },
                Room {
                    id: RoomId(2),
                    name: "Room2".into(),
                    capacity: 40,
                    building: "A".into(),
                },
            ],
            vec![
                Teacher {
                    id: TeacherId(1),
                    name: "Teacher1".into(),
                    preferred_windows: vec![],
                },
                Teacher {
                    id: TeacherId(2),
                    name: "Teacher2".into(),
                    preferred_windows: vec![],
                },
            ],
            vec![StudentGroup {
                id: GroupId(1),
                year: Year::First,
                series: "A".into(),
                subgroup: "A1".into(),
                semigroup: String::new(),
                student_count: 30,
            }],
            (1..=lesson_count)
                .map(|id| Lesson {
                    id: LessonId(id),
                    subject: format!("Subject{id}"),
                    lesson_type: LessonType::Seminar,
                    year: Year::First,
                    duration_hours: 2,
                    teacher: TeacherId(1 + id % 2),
                    student_group: GroupId(1),
                    timeslot: None,
                    room: None,
                })
                .collect(),
            ConstraintWeights::standard(),
            budget_minutes,
        )
    }

    async fn wait_terminal<S: Solver>(jobs: &InMemJobs<S>, id: &str) -> JobState {
        for _ in 0..500 {
            match jobs.get_status(id) {
                Ok((_, state)) if state.is_terminal() => return state,
                Ok(_) => tokio::time::sleep(Duration::from_millis(10)).await,
                Err(JobError::Solver { .. }) => return JobState::Failed,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        panic!("job {id} never reached a terminal state");
    }

    #[tokio::test]
    async fn submit_runs_to_solved() {
        let jobs = InMemJobs::new(LocalSearchSolver::new());
        let options = SolveOptions {
            improvement_steps: Some(100),
            budget_minutes: Some(1),
            ..Default::default()
        };
        let id = jobs.submit(fixture(3, 1), options).unwrap();

        let state = wait_terminal(&jobs, &id.0).await;
        assert_eq!(state, JobState::Solved);

        let (solution, state) = jobs.get_solution(&id.0).unwrap();
        assert_eq!(state, JobState::Solved);
        assert_eq!(solution.status, SolverStatus::Solved);
        assert!(solution.lessons.iter().all(|l| l.is_assigned()));
        assert!(solution.score.is_some());
    }

    #[tokio::test]
    async fn solution_is_available_right_after_submit() {
        let jobs = InMemJobs::new(LocalSearchSolver::new());
        let id = jobs.submit(fixture(3, 0), SolveOptions::default()).unwrap();
        // Possibly still Submitted/Solving: the seeded snapshot answers.
        let (solution, _) = jobs.get_solution(&id.0).unwrap();
        assert_eq!(solution.lessons.len(), 3);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let jobs = InMemJobs::new(LocalSearchSolver::new());
        assert!(matches!(
            jobs.get_solution("nope"),
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            jobs.get_status("nope"),
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            jobs.terminate("nope").await,
            Err(JobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn malformed_problems_are_rejected_before_solving() {
        let jobs = InMemJobs::new(LocalSearchSolver::new());
        let mut tt = fixture(1, 1);
        tt.timeslots[0].end = TimeOfDay::hm(7, 0);
        assert!(jobs.submit(tt, SolveOptions::default()).is_err());
        assert!(jobs.job_ids().is_empty());
    }

    #[tokio::test]
    async fn terminate_returns_best_so_far() {
        let jobs = InMemJobs::new(LocalSearchSolver::new());
        // No step limit: the worker would improve for the whole budget.
        let id = jobs.submit(fixture(4, 5), SolveOptions::default()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (solution, state) = jobs.terminate(&id.0).await.unwrap();
        assert!(matches!(
            state,
            JobState::TerminatedEarly | JobState::Solved
        ));
        assert!(solution.score.is_some());
        // Terminating again is idempotent and still answers.
        let (again, _) = jobs.terminate(&id.0).await.unwrap();
        assert_eq!(again.score, solution.score);
    }

    /// Fails on problems whose first lesson is named "boom", otherwise
    /// delegates to the real engine.
    struct BoomSolver(LocalSearchSolver);

    #[async_trait]
    impl Solver for BoomSolver {
        async fn solve(
            &self,
            problem: Timetable,
            options: SolveOptions,
            session: SolveSession,
        ) -> anyhow::Result<Timetable> {
            if problem.lessons.first().is_some_and(|l| l.subject == "boom") {
                anyhow::bail!("synthetic engine fault");
            }
            self.0.solve(problem, options, session).await
        }
    }

    #[tokio::test]
    async fn a_failed_job_surfaces_only_on_its_own_id() {
        let jobs = InMemJobs::new(BoomSolver(LocalSearchSolver::new()));
        let options = SolveOptions {
            improvement_steps: Some(10),
            budget_minutes: Some(1),
            ..Default::default()
        };

        let mut bad_problem = fixture(1, 1);
        bad_problem.lessons[0].subject = "boom".into();
        let bad = jobs.submit(bad_problem, options).unwrap();
        let good = jobs.submit(fixture(2, 1), options).unwrap();

        assert_eq!(wait_terminal(&jobs, &bad.0).await, JobState::Failed);
        assert_eq!(wait_terminal(&jobs, &good.0).await, JobState::Solved);

        match jobs.get_solution(&bad.0) {
            Err(JobError::Solver { message, .. }) => {
                assert!(message.contains("synthetic engine fault"))
            }
            other => panic!("expected solver failure, got {other:?}"),
        }
        // The healthy job is untouched by its neighbour's crash.
        assert!(jobs.get_solution(&good.0).is_ok());
    }
}
