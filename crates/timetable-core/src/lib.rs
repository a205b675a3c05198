pub mod analysis;
pub mod plan;
pub mod scoring;
pub mod session;

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;
use types::{SolveOptions, Timetable};

pub use analysis::{analyze, ConstraintAnalysis, ConstraintMatch, FetchPolicy, ScoreAnalysis};
pub use plan::Plan;
pub use session::{CancelToken, SolutionMailbox, SolveSession};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid timetable: {0}")]
    Msg(String),
}

/// Rejects a malformed aggregate before any solve starts. Collects every
/// problem it can find rather than stopping at the first.
pub fn validate(tt: &Timetable) -> Result<(), ValidationError> {
    let mut errors: Vec<String> = Vec::new();

    if tt.timeslots.is_empty() {
        errors.push("timeslots is empty".into());
    }
    if tt.rooms.is_empty() {
        errors.push("rooms is empty".into());
    }

    for slot in &tt.timeslots {
        if slot.start >= slot.end {
            errors.push(format!(
                "timeslot {} does not end after it starts ({}..{})",
                slot.id, slot.start, slot.end
            ));
        }
    }
    for teacher in &tt.teachers {
        for window in &teacher.preferred_windows {
            if window.start >= window.end {
                errors.push(format!(
                    "teacher {} has an empty preferred window ({}..{})",
                    teacher.id, window.start, window.end
                ));
            }
        }
    }

    fn chk_unique<I: std::fmt::Display>(
        name: &str,
        ids: impl Iterator<Item = I>,
        errors: &mut Vec<String>,
    ) {
        let mut seen = HashSet::new();
        for id in ids {
            let s = id.to_string();
            if !seen.insert(s.clone()) {
                errors.push(format!("duplicate {name} id: {s}"));
            }
        }
    }
    chk_unique("timeslot", tt.timeslots.iter().map(|x| x.id), &mut errors);
    chk_unique("room", tt.rooms.iter().map(|x| x.id), &mut errors);
    chk_unique("teacher", tt.teachers.iter().map(|x| x.id), &mut errors);
    chk_unique(
        "student group",
        tt.student_groups.iter().map(|x| x.id),
        &mut errors,
    );
    chk_unique("lesson", tt.lessons.iter().map(|x| x.id), &mut errors);

    let teachers: HashSet<_> = tt.teachers.iter().map(|t| t.id).collect();
    let groups: HashSet<_> = tt.student_groups.iter().map(|g| g.id).collect();
    let timeslots: HashSet<_> = tt.timeslots.iter().map(|t| t.id).collect();
    let rooms: HashSet<_> = tt.rooms.iter().map(|r| r.id).collect();

    for lesson in &tt.lessons {
        if !teachers.contains(&lesson.teacher) {
            errors.push(format!(
                "lesson {} references missing teacher {}",
                lesson.id, lesson.teacher
            ));
        }
        if !groups.contains(&lesson.student_group) {
            errors.push(format!(
                "lesson {} references missing student group {}",
                lesson.id, lesson.student_group
            ));
        }
        if let Some(ts) = lesson.timeslot {
            if !timeslots.contains(&ts) {
                errors.push(format!(
                    "lesson {} is assigned to missing timeslot {ts}",
                    lesson.id
                ));
            }
        }
        if let Some(room) = lesson.room {
            if !rooms.contains(&room) {
                errors.push(format!(
                    "lesson {} is assigned to missing room {room}",
                    lesson.id
                ));
            }
        }
        if lesson.duration_hours == 0 {
            errors.push(format!("lesson {} has zero duration", lesson.id));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Msg(errors.join("; ")))
    }
}

/// The seam between the job manager and a solving engine. Implementations
/// must honour the session's cancel token between moves and publish every
/// improving solution into the mailbox.
#[async_trait]
pub trait Solver: Send + Sync + 'static {
    async fn solve(
        &self,
        problem: Timetable,
        options: SolveOptions,
        session: SolveSession,
    ) -> anyhow::Result<Timetable>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::*;

    fn slot(id: u64, day: DayOfWeek, from: (u16, u16), to: (u16, u16)) -> Timeslot {
        Timeslot {
            id: TimeslotId(id),
            day,
            start: TimeOfDay::hm(from.0, from.1),
            end: TimeOfDay::hm(to.0, to.1),
        }
    }

    fn minimal() -> Timetable {
        Timetable::new(
            vec![slot(1, DayOfWeek::Mon, (8, 0), (10, 0))],
            vec![Room {
                id: RoomId(1),
                name: "Room1".into(),
                capacity: 30,
                building: "A".into(),
            }],
            vec![Teacher {
                id: TeacherId(1),
                name: "Teacher1".into(),
                preferred_windows: vec![],
            }],
            vec![StudentGroup {
                id: GroupId(1),
                year: Year::First,
                series: "A".into(),
                subgroup: "A1".into(),
                semigroup: String::new(),
                student_count: 25,
            }],
            vec![Lesson {
                id: LessonId(1),
                subject: "Algebra".into(),
                lesson_type: LessonType::Course,
                year: Year::First,
                duration_hours: 2,
                teacher: TeacherId(1),
                student_group: GroupId(1),
                timeslot: None,
                room: None,
            }],
            ConstraintWeights::standard(),
            1,
        )
    }

    #[test]
    fn accepts_a_well_formed_aggregate() {
        assert!(validate(&minimal()).is_ok());
    }

    #[test]
    fn rejects_inverted_timeslot() {
        let mut tt = minimal();
        tt.timeslots[0].end = TimeOfDay::hm(7, 0);
        let err = validate(&tt).unwrap_err().to_string();
        assert!(err.contains("does not end after it starts"), "{err}");
    }

    #[test]
    fn rejects_dangling_references() {
        let mut tt = minimal();
        tt.lessons[0].teacher = TeacherId(99);
        tt.lessons[0].room = Some(RoomId(42));
        let err = validate(&tt).unwrap_err().to_string();
        assert!(err.contains("missing teacher 99"), "{err}");
        assert!(err.contains("missing room 42"), "{err}");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut tt = minimal();
        let dup = tt.timeslots[0];
        tt.timeslots.push(dup);
        let err = validate(&tt).unwrap_err().to_string();
        assert!(err.contains("duplicate timeslot id: 1"), "{err}");
    }
}
