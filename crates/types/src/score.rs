use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use utoipa::ToSchema;

/// Three-tier lexicographic score. Field order gives the derived `Ord` the
/// hard > medium > soft precedence. Penalties subtract from a tier, rewards
/// add, so a feasible solution has `hard == 0` under an all-penalty
/// configuration.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq,
    Ord, PartialOrd, Hash,
)]
pub struct Score {
    pub hard: i64,
    pub medium: i64,
    pub soft: i64,
}

impl Score {
    pub const ZERO: Score = Score {
        hard: 0,
        medium: 0,
        soft: 0,
    };

    pub const fn of_hard(hard: i64) -> Score {
        Score {
            hard,
            medium: 0,
            soft: 0,
        }
    }

    pub const fn of_medium(medium: i64) -> Score {
        Score {
            hard: 0,
            medium,
            soft: 0,
        }
    }

    pub const fn of_soft(soft: i64) -> Score {
        Score {
            hard: 0,
            medium: 0,
            soft,
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.hard >= 0
    }

    pub fn scale(self, units: i64) -> Score {
        Score {
            hard: self.hard * units,
            medium: self.medium * units,
            soft: self.soft * units,
        }
    }
}

impl Add for Score {
    type Output = Score;
    fn add(self, rhs: Score) -> Score {
        Score {
            hard: self.hard + rhs.hard,
            medium: self.medium + rhs.medium,
            soft: self.soft + rhs.soft,
        }
    }
}

impl AddAssign for Score {
    fn add_assign(&mut self, rhs: Score) {
        *self = *self + rhs;
    }
}

impl Sub for Score {
    type Output = Score;
    fn sub(self, rhs: Score) -> Score {
        Score {
            hard: self.hard - rhs.hard,
            medium: self.medium - rhs.medium,
            soft: self.soft - rhs.soft,
        }
    }
}

impl SubAssign for Score {
    fn sub_assign(&mut self, rhs: Score) {
        *self = *self - rhs;
    }
}

impl Neg for Score {
    type Output = Score;
    fn neg(self) -> Score {
        Score::ZERO - self
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}hard/{}medium/{}soft", self.hard, self.medium, self.soft)
    }
}

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Hard,
    Medium,
    Soft,
}

impl Tier {
    pub fn unit(self, weight: i64) -> Score {
        match self {
            Tier::Hard => Score::of_hard(weight),
            Tier::Medium => Score::of_medium(weight),
            Tier::Soft => Score::of_soft(weight),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HARD" => Ok(Tier::Hard),
            "MEDIUM" => Ok(Tier::Medium),
            "SOFT" => Ok(Tier::Soft),
            other => Err(format!("unknown score tier: {other}")),
        }
    }
}

/// Whether a matched constraint instance subtracts from or adds to its tier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Impact {
    Penalize,
    Reward,
}

/// The fixed catalog of constraint identifiers. Tier and weight per rule are
/// data (`ConstraintWeights`); the identifiers themselves are compiled in so
/// weight tables are validated when the problem is built, not string-matched
/// during scoring.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash,
)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintId {
    RoomConflict,
    TeacherConflict,
    RoomConflictUniversity,
    TeacherConflictUniversity,
    StudentGroupConflict,
    CapacityRoomConflict,
    CourseStudentsGroupedInTheSameRoom,
    SeminarStudentsGroupedInTheSameRoom,
    LabsStudentsGroupedInTheSameRoom,
    OverlappingTimeslot,
    LessonDurationConflict,
    MaximumCoursesForStudents,
    MaximmumCoursesTeached,
    MaximizePreferredTimeslotAssignments,
    CoursesGroupedInTheSameTimeslot,
    SeminarsGroupedInTheSameTimeslot,
    LabsGroupedInTheSameTimeslot,
    TeacherRoomStability,
    TeacherTimeEfficiency,
    CoursesInTheSameBuilding,
    GapsLongerThan4Hours,
    LabAfterSeminar,
    StudentGroupVariety,
}

pub const CONSTRAINT_COUNT: usize = 23;

impl ConstraintId {
    pub const ALL: [ConstraintId; CONSTRAINT_COUNT] = [
        ConstraintId::RoomConflict,
        ConstraintId::TeacherConflict,
        ConstraintId::RoomConflictUniversity,
        ConstraintId::TeacherConflictUniversity,
        ConstraintId::StudentGroupConflict,
        ConstraintId::CapacityRoomConflict,
        ConstraintId::CourseStudentsGroupedInTheSameRoom,
        ConstraintId::SeminarStudentsGroupedInTheSameRoom,
        ConstraintId::LabsStudentsGroupedInTheSameRoom,
        ConstraintId::OverlappingTimeslot,
        ConstraintId::LessonDurationConflict,
        ConstraintId::MaximumCoursesForStudents,
        ConstraintId::MaximmumCoursesTeached,
        ConstraintId::MaximizePreferredTimeslotAssignments,
        ConstraintId::CoursesGroupedInTheSameTimeslot,
        ConstraintId::SeminarsGroupedInTheSameTimeslot,
        ConstraintId::LabsGroupedInTheSameTimeslot,
        ConstraintId::TeacherRoomStability,
        ConstraintId::TeacherTimeEfficiency,
        ConstraintId::CoursesInTheSameBuilding,
        ConstraintId::GapsLongerThan4Hours,
        ConstraintId::LabAfterSeminar,
        ConstraintId::StudentGroupVariety,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ConstraintId::RoomConflict => "roomConflict",
            ConstraintId::TeacherConflict => "teacherConflict",
            ConstraintId::RoomConflictUniversity => "roomConflictUniversity",
            ConstraintId::TeacherConflictUniversity => "teacherConflictUniversity",
            ConstraintId::StudentGroupConflict => "studentGroupConflict",
            ConstraintId::CapacityRoomConflict => "capacityRoomConflict",
            ConstraintId::CourseStudentsGroupedInTheSameRoom => {
                "courseStudentsGroupedInTheSameRoom"
            }
            ConstraintId::SeminarStudentsGroupedInTheSameRoom => {
                "seminarStudentsGroupedInTheSameRoom"
            }
            ConstraintId::LabsStudentsGroupedInTheSameRoom => "labsStudentsGroupedInTheSameRoom",
            ConstraintId::OverlappingTimeslot => "overlappingTimeslot",
            ConstraintId::LessonDurationConflict => "lessonDurationConflict",
            ConstraintId::MaximumCoursesForStudents => "maximumCoursesForStudents",
            ConstraintId::MaximmumCoursesTeached => "maximmumCoursesTeached",
            ConstraintId::MaximizePreferredTimeslotAssignments => {
                "maximizePreferredTimeslotAssignments"
            }
            ConstraintId::CoursesGroupedInTheSameTimeslot => "coursesGroupedInTheSameTimeslot",
            ConstraintId::SeminarsGroupedInTheSameTimeslot => "seminarsGroupedInTheSameTimeslot",
            ConstraintId::LabsGroupedInTheSameTimeslot => "labsGroupedInTheSameTimeslot",
            ConstraintId::TeacherRoomStability => "teacherRoomStability",
            ConstraintId::TeacherTimeEfficiency => "teacherTimeEfficiency",
            ConstraintId::CoursesInTheSameBuilding => "coursesInTheSameBuilding",
            ConstraintId::GapsLongerThan4Hours => "gapsLongerThan4Hours",
            ConstraintId::LabAfterSeminar => "labAfterSeminar",
            ConstraintId::StudentGroupVariety => "studentGroupVariety",
        }
    }

    /// The tier the rule belongs to before any reconfiguration.
    pub fn canonical_tier(self) -> Tier {
        use ConstraintId::*;
        match self {
            RoomConflict | TeacherConflict | RoomConflictUniversity
            | TeacherConflictUniversity | StudentGroupConflict | CapacityRoomConflict
            | CourseStudentsGroupedInTheSameRoom | SeminarStudentsGroupedInTheSameRoom
            | LabsStudentsGroupedInTheSameRoom | OverlappingTimeslot
            | LessonDurationConflict => Tier::Hard,
            MaximumCoursesForStudents | MaximmumCoursesTeached
            | MaximizePreferredTimeslotAssignments | CoursesGroupedInTheSameTimeslot
            | SeminarsGroupedInTheSameTimeslot | LabsGroupedInTheSameTimeslot => Tier::Medium,
            TeacherRoomStability | TeacherTimeEfficiency | CoursesInTheSameBuilding
            | GapsLongerThan4Hours | LabAfterSeminar | StudentGroupVariety => Tier::Soft,
        }
    }

    pub fn impact(self) -> Impact {
        use ConstraintId::*;
        match self {
            TeacherRoomStability | TeacherTimeEfficiency | CoursesInTheSameBuilding
            | LabAfterSeminar => Impact::Reward,
            _ => Impact::Penalize,
        }
    }
}

impl std::str::FromStr for ConstraintId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConstraintId::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown constraint: {s}"))
    }
}

/// One row of the weight table.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq)]
pub struct WeightEntry {
    pub constraint: ConstraintId,
    pub tier: Tier,
    pub weight: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstraintWeight {
    pub tier: Tier,
    pub weight: i64,
}

/// Per-problem constraint configuration. Every rule defaults to weight 0
/// (disabled) in its canonical tier; entries override tier and weight, last
/// entry wins.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(transparent)]
pub struct ConstraintWeights {
    pub entries: Vec<WeightEntry>,
}

impl ConstraintWeights {
    pub fn set(&mut self, constraint: ConstraintId, tier: Tier, weight: i64) -> &mut Self {
        self.entries.push(WeightEntry {
            constraint,
            tier,
            weight,
        });
        self
    }

    /// Flattens the entry list into one weight per catalog rule.
    pub fn resolved(&self) -> [ConstraintWeight; CONSTRAINT_COUNT] {
        let mut table = [ConstraintWeight {
            tier: Tier::Soft,
            weight: 0,
        }; CONSTRAINT_COUNT];
        for id in ConstraintId::ALL {
            table[id.index()].tier = id.canonical_tier();
        }
        for entry in &self.entries {
            table[entry.constraint.index()] = ConstraintWeight {
                tier: entry.tier,
                weight: entry.weight,
            };
        }
        table
    }

    /// The production rule set: university conflict variants active, the
    /// plain pairwise variants left disabled.
    pub fn standard() -> Self {
        use ConstraintId::*;
        let mut weights = ConstraintWeights::default();
        for id in [
            StudentGroupConflict,
            CapacityRoomConflict,
            CourseStudentsGroupedInTheSameRoom,
            SeminarStudentsGroupedInTheSameRoom,
            LabsStudentsGroupedInTheSameRoom,
            RoomConflictUniversity,
            TeacherConflictUniversity,
            OverlappingTimeslot,
            LessonDurationConflict,
            MaximumCoursesForStudents,
            MaximmumCoursesTeached,
            MaximizePreferredTimeslotAssignments,
            CoursesGroupedInTheSameTimeslot,
            SeminarsGroupedInTheSameTimeslot,
            LabsGroupedInTheSameTimeslot,
            TeacherRoomStability,
            TeacherTimeEfficiency,
            CoursesInTheSameBuilding,
            GapsLongerThan4Hours,
        ] {
            weights.set(id, id.canonical_tier(), 1);
        }
        weights
    }

    /// Every rule active at weight 1 in its canonical tier.
    pub fn all_enabled() -> Self {
        let mut weights = ConstraintWeights::default();
        for id in ConstraintId::ALL {
            weights.set(id, id.canonical_tier(), 1);
        }
        weights
    }
}

/// Move-acceptance policy for the improvement phase.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq,
)]
#[serde(rename_all = "snake_case")]
pub enum Acceptance {
    /// Accept only lexicographically non-worsening moves.
    #[default]
    NonWorsening,
    /// Accept a move when it beats the score from `length` steps ago,
    /// allowing bounded uphill escapes from plateaus.
    LateAcceptance { length: u32 },
}
