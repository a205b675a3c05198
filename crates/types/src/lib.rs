pub mod score;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

pub use score::{
    Acceptance, ConstraintId, ConstraintWeight, ConstraintWeights, Impact, Score, Tier,
    WeightEntry,
};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq,
            Ord, PartialOrd, Hash,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}
id_newtype!(TimeslotId);
id_newtype!(RoomId);
id_newtype!(TeacherId);
id_newtype!(GroupId);
id_newtype!(LessonId);

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Ord,
    PartialOrd, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayOfWeek::Mon => "Mon",
            DayOfWeek::Tue => "Tue",
            DayOfWeek::Wed => "Wed",
            DayOfWeek::Thu => "Thu",
            DayOfWeek::Fri => "Fri",
            DayOfWeek::Sat => "Sat",
            DayOfWeek::Sun => "Sun",
        };
        f.write_str(name)
    }
}

/// Minutes since midnight.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Ord,
    PartialOrd, Hash,
)]
#[serde(transparent)]
pub struct TimeOfDay(pub u16);

impl TimeOfDay {
    pub const fn hm(hour: u16, minute: u16) -> Self {
        TimeOfDay(hour * 60 + minute)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash)]
pub struct Timeslot {
    pub id: TimeslotId,
    pub day: DayOfWeek,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl Timeslot {
    pub fn duration_minutes(&self) -> u32 {
        u32::from(self.end.0.saturating_sub(self.start.0))
    }

    /// Whole hours of the slot span, truncating.
    pub fn duration_hours(&self) -> u32 {
        self.duration_minutes() / 60
    }

    pub fn overlaps(&self, other: &Timeslot) -> bool {
        self.day == other.day && self.start < other.end && other.start < self.end
    }
}

/// A teacher's preferred teaching window. Windows are independently sized,
/// not fixed-length slots.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash)]
pub struct TimeWindow {
    pub day: DayOfWeek,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeWindow {
    /// The window covers a timeslot when it falls entirely inside it.
    pub fn contains(&self, slot: &Timeslot) -> bool {
        self.day == slot.day && self.start <= slot.start && slot.end <= self.end
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
    #[serde(default)]
    pub preferred_windows: Vec<TimeWindow>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: u32,
    #[serde(default)]
    pub building: String,
}

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Year {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Sixth,
}

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    Course,
    Seminar,
    Laboratory,
    Project,
}

/// A cohort subdivision: `series` is the whole year series, `subgroup` the
/// group within it, `semigroup` an optional half-group tag.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct StudentGroup {
    pub id: GroupId,
    pub year: Year,
    pub series: String,
    pub subgroup: String,
    #[serde(default)]
    pub semigroup: String,
    pub student_count: u32,
}

/// The planning entity. `teacher` and `student_group` are fixed for the
/// lesson's lifetime; `timeslot` and `room` are the two decision slots and
/// stay `None` until the solver (or the caller) assigns them.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Lesson {
    pub id: LessonId,
    pub subject: String,
    pub lesson_type: LessonType,
    pub year: Year,
    pub duration_hours: u32,
    pub teacher: TeacherId,
    pub student_group: GroupId,
    #[serde(default)]
    pub timeslot: Option<TimeslotId>,
    #[serde(default)]
    pub room: Option<RoomId>,
}

impl Lesson {
    pub fn is_assigned(&self) -> bool {
        self.timeslot.is_some() && self.room.is_some()
    }
}

#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq,
)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    #[default]
    NotSolving,
    Solving,
    TerminatedEarly,
    Solved,
}

impl SolverStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SolverStatus::TerminatedEarly | SolverStatus::Solved)
    }
}

/// Problem and solution aggregate. Owns the fact snapshots, the lessons,
/// the weight configuration and the solve outcome; one instance belongs to
/// exactly one solve session.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Timetable {
    pub timeslots: Vec<Timeslot>,
    pub rooms: Vec<Room>,
    pub teachers: Vec<Teacher>,
    pub student_groups: Vec<StudentGroup>,
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub constraint_weights: ConstraintWeights,
    /// Wall-clock budget for the improvement phase, in minutes.
    #[serde(default = "default_budget_minutes")]
    pub budget_minutes: u64,
    #[serde(default)]
    pub score: Option<Score>,
    #[serde(default)]
    pub status: SolverStatus,
    #[serde(default)]
    pub elapsed_millis: Option<u64>,
}

fn default_budget_minutes() -> u64 {
    5
}

impl Timetable {
    pub fn new(
        timeslots: Vec<Timeslot>,
        rooms: Vec<Room>,
        teachers: Vec<Teacher>,
        student_groups: Vec<StudentGroup>,
        lessons: Vec<Lesson>,
        constraint_weights: ConstraintWeights,
        budget_minutes: u64,
    ) -> Self {
        Self {
            timeslots,
            rooms,
            teachers,
            student_groups,
            lessons,
            constraint_weights,
            budget_minutes,
            score: None,
            status: SolverStatus::NotSolving,
            elapsed_millis: None,
        }
    }
}

/// Per-submission solver knobs. The seed pins the whole run: same facts,
/// same weights, same seed give the same solution.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct SolveOptions {
    #[serde(default)]
    pub seed: u64,
    /// Overrides the aggregate's budget when set.
    #[serde(default)]
    pub budget_minutes: Option<u64>,
    /// Caps the improvement phase at a fixed number of steps, which makes a
    /// run reproducible independently of wall-clock speed.
    #[serde(default)]
    pub improvement_steps: Option<u64>,
    #[serde(default)]
    pub acceptance: Acceptance,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            budget_minutes: None,
            improvement_steps: None,
            acceptance: Acceptance::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeslot_hours_truncate() {
        let slot = Timeslot {
            id: TimeslotId(1),
            day: DayOfWeek::Mon,
            start: TimeOfDay::hm(14, 30),
            end: TimeOfDay::hm(16, 45),
        };
        assert_eq!(slot.duration_minutes(), 135);
        assert_eq!(slot.duration_hours(), 2);
    }

    #[test]
    fn overlap_requires_same_day() {
        let a = Timeslot {
            id: TimeslotId(1),
            day: DayOfWeek::Mon,
            start: TimeOfDay::hm(8, 0),
            end: TimeOfDay::hm(10, 0),
        };
        let b = Timeslot {
            id: TimeslotId(2),
            day: DayOfWeek::Tue,
            start: TimeOfDay::hm(9, 0),
            end: TimeOfDay::hm(11, 0),
        };
        let c = Timeslot {
            id: TimeslotId(3),
            day: DayOfWeek::Mon,
            start: TimeOfDay::hm(9, 0),
            end: TimeOfDay::hm(11, 0),
        };
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&a));
    }

    #[test]
    fn window_contains_slot_inside_it() {
        let window = TimeWindow {
            day: DayOfWeek::Wed,
            start: TimeOfDay::hm(8, 0),
            end: TimeOfDay::hm(12, 0),
        };
        let inside = Timeslot {
            id: TimeslotId(1),
            day: DayOfWeek::Wed,
            start: TimeOfDay::hm(8, 0),
            end: TimeOfDay::hm(10, 0),
        };
        let spilling = Timeslot {
            id: TimeslotId(2),
            day: DayOfWeek::Wed,
            start: TimeOfDay::hm(11, 0),
            end: TimeOfDay::hm(13, 0),
        };
        assert!(window.contains(&inside));
        assert!(!window.contains(&spilling));
    }

    #[test]
    fn time_of_day_formats_as_hh_mm() {
        assert_eq!(TimeOfDay::hm(8, 5).to_string(), "08:05");
        assert_eq!(TimeOfDay::hm(21, 30).to_string(), "21:30");
    }
}
