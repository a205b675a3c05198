//! Local-search engine: greedy construction in strength order, then seeded
//! random change/swap moves with incremental rescoring, bounded by a
//! wall-clock budget and a cooperative cancel token.

pub mod director;
pub mod moves;

use async_trait::async_trait;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};
use timetable_core::plan::{Plan, Slot};
use timetable_core::{validate, SolveSession, Solver};
use tracing::{debug, info, warn};
use types::{Acceptance, Score, SolveOptions, SolverStatus, Timetable};

pub use director::ScoreDirector;
pub use moves::{construction_order, domain_pairs, DecisionSlot, Move, SportFilter};

/// Engine state machine. A cancelled session ends in `TerminatedEarly`, an
/// exhausted budget or step limit in `Completed`; both keep the best
/// solution found so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Unsolved,
    Constructing,
    Improving,
    TerminatedEarly,
    Completed,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LocalSearchSolver;

impl LocalSearchSolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Solver for LocalSearchSolver {
    async fn solve(
        &self,
        problem: Timetable,
        options: SolveOptions,
        session: SolveSession,
    ) -> anyhow::Result<Timetable> {
        // The engine is a CPU-bound loop; keep it off the async runtime.
        tokio::task::spawn_blocking(move || solve_blocking(problem, options, &session))
            .await
            .map_err(|e| anyhow::anyhow!("solver worker crashed: {e}"))?
    }
}

enum Acceptor {
    NonWorsening,
    Late { ring: Vec<Score>, pos: usize },
}

impl Acceptor {
    fn new(policy: Acceptance, initial: Score) -> Self {
        match policy {
            Acceptance::NonWorsening => Acceptor::NonWorsening,
            Acceptance::LateAcceptance { length } => Acceptor::Late {
                ring: vec![initial; length.max(1) as usize],
                pos: 0,
            },
        }
    }

    fn accepts(&self, before: Score, after: Score) -> bool {
        match self {
            Acceptor::NonWorsening => after >= before,
            Acceptor::Late { ring, pos } => after >= before || after >= ring[*pos],
        }
    }

    fn record(&mut self, current: Score) {
        if let Acceptor::Late { ring, pos } = self {
            ring[*pos] = current;
            *pos = (*pos + 1) % ring.len();
        }
    }
}

fn snapshot(
    plan: &Plan,
    base: &Timetable,
    slots: &[Slot],
    score: Score,
    status: SolverStatus,
    started: Instant,
) -> Timetable {
    let mut out = base.clone();
    out.lessons = plan.lessons_with_slots(slots);
    out.score = Some(score);
    out.status = status;
    out.elapsed_millis = Some(started.elapsed().as_millis() as u64);
    out
}

/// Runs one whole solve on the current thread. The session's mailbox
/// receives a snapshot for every strictly improving solution.
pub fn solve_blocking(
    problem: Timetable,
    options: SolveOptions,
    session: &SolveSession,
) -> anyhow::Result<Timetable> {
    let started = Instant::now();
    validate(&problem)?;
    let plan = Plan::new(&problem)?;
    let sport = SportFilter::new(&plan);
    let mut director = ScoreDirector::new(
        &plan,
        &problem.constraint_weights,
        plan.initial_slots()?,
    );

    let budget = Duration::from_secs(
        60 * options.budget_minutes.unwrap_or(problem.budget_minutes),
    );

    // Construction: hardest lessons first, each into the best-scoring
    // admissible (timeslot, room) pair; ties go to the weakest pair.
    let mut phase = Phase::Constructing;
    debug!(?phase, lessons = plan.lesson_count(), "starting construction");
    let order = construction_order(&plan);
    let domain = domain_pairs(&plan);
    for &lesson in &order {
        if session.cancel.is_cancelled() {
            phase = Phase::TerminatedEarly;
            break;
        }
        if director.slot(lesson).full().is_some() {
            continue;
        }
        let mut best: Option<(Score, (u32, u32))> = None;
        for &(ts, room) in &domain {
            if !sport.admits_room(lesson, room) {
                continue;
            }
            director.place(lesson, ts, room);
            let score = director.score();
            director.unplace(lesson);
            if best.map_or(true, |(best_score, _)| score > best_score) {
                best = Some((score, (ts, room)));
            }
        }
        match best {
            Some((_, (ts, room))) => director.place(lesson, ts, room),
            None => warn!(lesson = %plan.lesson(lesson).id, "no admissible timeslot/room pair"),
        }
    }

    let mut best_score = director.score();
    let mut best_slots = director.slots().to_vec();
    session.mailbox.publish(snapshot(
        &plan,
        &problem,
        &best_slots,
        best_score,
        SolverStatus::Solving,
        started,
    ));

    // Improvement: seeded random change/swap moves under the acceptance
    // policy, until the budget, step limit or cancel signal ends the phase.
    let assigned: Vec<u32> = (0..plan.lesson_count() as u32)
        .filter(|&l| director.slot(l).full().is_some())
        .collect();

    if phase != Phase::TerminatedEarly && !assigned.is_empty() {
        phase = Phase::Improving;
        debug!(?phase, score = %best_score, "starting improvement");
        let deadline = started + budget;
        let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
        let mut acceptor = Acceptor::new(options.acceptance, director.score());
        let mut steps: u64 = 0;

        loop {
            if session.cancel.is_cancelled() {
                phase = Phase::TerminatedEarly;
                break;
            }
            if Instant::now() >= deadline {
                phase = Phase::Completed;
                break;
            }
            if let Some(limit) = options.improvement_steps {
                if steps >= limit {
                    phase = Phase::Completed;
                    break;
                }
            }
            steps += 1;

            let before = director.score();
            let mv = match rng.gen_range(0..3u8) {
                kind @ (0 | 1) => {
                    let slot = DecisionSlot::ALL[kind as usize];
                    let lesson = assigned[rng.gen_range(0..assigned.len())];
                    let (ts, room) = director.slot(lesson).full().expect("assigned");
                    let to = rng.gen_range(0..slot.domain_size(&plan));
                    match slot {
                        DecisionSlot::Timeslot => {
                            if to == ts {
                                continue;
                            }
                            Move::Change {
                                lesson,
                                timeslot: to,
                                room,
                            }
                        }
                        DecisionSlot::Room => {
                            if to == room || !sport.admits_room(lesson, to) {
                                continue;
                            }
                            Move::Change {
                                lesson,
                                timeslot: ts,
                                room: to,
                            }
                        }
                    }
                }
                _ => {
                    if assigned.len() < 2 {
                        continue;
                    }
                    let a = assigned[rng.gen_range(0..assigned.len())];
                    let b = assigned[rng.gen_range(0..assigned.len())];
                    if a == b {
                        continue;
                    }
                    let slot_a = director.slot(a).full().expect("assigned");
                    let slot_b = director.slot(b).full().expect("assigned");
                    if slot_a == slot_b {
                        continue;
                    }
                    if !sport.admits_swap(a, slot_a.1, b, slot_b.1) {
                        continue;
                    }
                    Move::Swap { a, b }
                }
            };

            let undo = director.apply(mv);
            if !acceptor.accepts(before, director.score()) {
                director.apply(undo);
            }
            acceptor.record(director.score());

            let current = director.score();
            if current > best_score {
                best_score = current;
                best_slots = director.slots().to_vec();
                session.mailbox.publish(snapshot(
                    &plan,
                    &problem,
                    &best_slots,
                    best_score,
                    SolverStatus::Solving,
                    started,
                ));
            }
        }
        debug!(?phase, steps, score = %best_score, "improvement ended");
    }

    let status = if phase == Phase::TerminatedEarly {
        SolverStatus::TerminatedEarly
    } else {
        SolverStatus::Solved
    };
    let result = snapshot(&plan, &problem, &best_slots, best_score, status, started);
    session.mailbox.publish(result.clone());
    info!(score = %best_score, ?status, "solve finished");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::*;

    fn two_hour(id: u64, day: DayOfWeek, hour: u16) -> Timeslot {
        Timeslot {
            id: TimeslotId(id),
            day,
            start: TimeOfDay::hm(hour, 0),
            end: TimeOfDay::hm(hour + 2, 0),
        }
    }

    fn fixture(lesson_count: u64) -> Timetable {
        let timeslots = vec![
            two_hour(1, DayOfWeek::Mon, 8),
            two_hour(2, DayOfWeek::Mon, 10),
            two_hour(3, DayOfWeek::Tue, 8),
            two_hour(4, DayOfWeek::Tue, 10),
            two_hour(5, DayOfWeek::Wed, 8),
            two_hour(6, DayOfWeek::Wed, 10),
        ];
        let rooms = vec![
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
        ];
        let teachers = (1..=3)
            .map(|id| Teacher {
                id: TeacherId(id),
                name: format!("Teacher{id}"),
                preferred_windows: vec![],
            })
            .collect();
        let groups = (1..=2)
            .map(|id| StudentGroup {
                id: GroupId(id),
                year: Year::First,
                series: "A".into(),
                subgroup: format!("A{id}"),
                semigroup: String::new(),
                student_count: 30,
            })
            .collect();
        let lessons = (1..=lesson_count)
            .map(|id| Lesson {
                id: LessonId(id),
                subject: format!("Subject{id}"),
                lesson_type: LessonType::Seminar,
                year: Year::First,
                duration_hours: 2,
                teacher: TeacherId(1 + id % 3),
                student_group: GroupId(1 + id % 2),
                timeslot: None,
                room: None,
            })
            .collect();
        Timetable::new(
            timeslots,
            rooms,
            teachers,
            groups,
            lessons,
            ConstraintWeights::standard(),
            0,
        )
    }

    fn options(seed: u64, steps: u64) -> SolveOptions {
        SolveOptions {
            seed,
            budget_minutes: Some(5),
            improvement_steps: Some(steps),
            acceptance: Acceptance::NonWorsening,
        }
    }

    #[test]
    fn construction_assigns_every_lesson() {
        let session = SolveSession::new();
        let result = solve_blocking(fixture(6), options(1, 0), &session).unwrap();
        assert_eq!(result.status, SolverStatus::Solved);
        assert!(result.lessons.iter().all(|l| l.is_assigned()));
        assert!(result.score.is_some());
        assert!(result.elapsed_millis.is_some());
    }

    #[test]
    fn construction_finds_the_conflict_free_layout() {
        // Six 2h seminars, six timeslots, two rooms: plenty of space, so the
        // greedy pass alone must land on a feasible solution.
        let session = SolveSession::new();
        let result = solve_blocking(fixture(6), options(1, 0), &session).unwrap();
        assert!(result.score.unwrap().is_feasible(), "{}", result.score.unwrap());
    }

    #[test]
    fn same_seed_reproduces_the_same_solution() {
        let a = solve_blocking(fixture(8), options(42, 400), &SolveSession::new()).unwrap();
        let b = solve_blocking(fixture(8), options(42, 400), &SolveSession::new()).unwrap();
        assert_eq!(a.score, b.score);
        let slots_a: Vec<_> = a.lessons.iter().map(|l| (l.timeslot, l.room)).collect();
        let slots_b: Vec<_> = b.lessons.iter().map(|l| (l.timeslot, l.room)).collect();
        assert_eq!(slots_a, slots_b);
    }

    #[test]
    fn improvement_repairs_a_preassigned_conflict() {
        // Both lessons pinned onto the same (timeslot, room): construction
        // skips assigned lessons, so only improvement can pull them apart.
        let mut tt = fixture(2);
        for lesson in &mut tt.lessons {
            lesson.timeslot = Some(TimeslotId(1));
            lesson.room = Some(RoomId(1));
        }
        let result =
            solve_blocking(tt, options(3, 2_000), &SolveSession::new()).unwrap();
        assert!(result.score.unwrap().is_feasible(), "{}", result.score.unwrap());
    }

    #[test]
    fn cancelled_session_returns_best_so_far_not_an_error() {
        let session = SolveSession::new();
        session.cancel.cancel();
        let result = solve_blocking(fixture(4), options(1, 10_000), &session).unwrap();
        assert_eq!(result.status, SolverStatus::TerminatedEarly);
    }

    #[test]
    fn sport_lessons_only_land_in_sport_rooms() {
        let mut tt = fixture(3);
        tt.lessons[0].subject = "Physical Education".into();
        tt.rooms[1].name = "Sports Hall".into();
        let result = solve_blocking(tt, options(5, 300), &SolveSession::new()).unwrap();
        assert_eq!(result.lessons[0].room, Some(RoomId(2)));
    }

    #[test]
    fn final_solution_is_published_to_the_mailbox() {
        let session = SolveSession::new();
        let result = solve_blocking(fixture(5), options(9, 100), &session).unwrap();
        let published = session.mailbox.peek().unwrap();
        assert_eq!(published.score, result.score);
        assert_eq!(published.status, result.status);
    }

    #[test]
    fn late_acceptance_matches_or_beats_nothing_worse_than_greedy_feasibility() {
        let mut opts = options(11, 500);
        opts.acceptance = Acceptance::LateAcceptance { length: 50 };
        let result = solve_blocking(fixture(8), opts, &SolveSession::new()).unwrap();
        assert!(result.score.unwrap().is_feasible(), "{}", result.score.unwrap());
    }
}
