//! Decomposes a solution's score into per-constraint contributions, with
//! optional human-readable justifications naming the entities involved.

use crate::plan::{Plan, Slot};
use crate::scoring::{run_catalog, AssignmentIndex, MatchSink, WeightTable};
use crate::ValidationError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use types::score::CONSTRAINT_COUNT;
use types::{ConstraintId, LessonId, Score, Tier, Timeslot, Timetable};
use utoipa::ToSchema;

#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq,
)]
#[serde(rename_all = "lowercase")]
pub enum FetchPolicy {
    /// Counts and contributions only.
    #[default]
    Shallow,
    /// Also materializes one justification per match.
    Full,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ConstraintMatch {
    pub lessons: Vec<LessonId>,
    pub score: Score,
    pub justification: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ConstraintAnalysis {
    pub constraint: ConstraintId,
    pub tier: Tier,
    pub weight: i64,
    pub match_count: u64,
    pub score: Score,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<ConstraintMatch>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ScoreAnalysis {
    pub score: Score,
    pub constraints: Vec<ConstraintAnalysis>,
}

#[derive(Default)]
struct Row {
    match_count: u64,
    units: i64,
    matches: Vec<(Vec<u32>, i64)>,
}

struct AnalysisSink {
    rows: Vec<Row>,
    keep_matches: bool,
}

impl AnalysisSink {
    fn new(keep_matches: bool) -> Self {
        Self {
            rows: (0..CONSTRAINT_COUNT).map(|_| Row::default()).collect(),
            keep_matches,
        }
    }
}

impl MatchSink for AnalysisSink {
    fn add(&mut self, constraint: ConstraintId, units: i64, lessons: &[u32]) {
        let row = &mut self.rows[constraint.index()];
        row.match_count += 1;
        row.units += units;
        if self.keep_matches {
            row.matches.push((lessons.to_vec(), units));
        }
    }
}

/// Recomputes the whole catalog for one aggregate. Synchronous; independent
/// of any solve session.
pub fn analyze(tt: &Timetable, policy: FetchPolicy) -> Result<ScoreAnalysis, ValidationError> {
    let plan = Plan::new(tt)?;
    let slots = plan.initial_slots()?;
    let table = WeightTable::new(&tt.constraint_weights);
    let index = AssignmentIndex::build(&plan, &slots);

    let mut sink = AnalysisSink::new(policy == FetchPolicy::Full);
    run_catalog(&plan, &slots, &index, &mut sink);

    let resolved = tt.constraint_weights.resolved();
    let mut total = Score::ZERO;
    let mut constraints = Vec::with_capacity(CONSTRAINT_COUNT);
    for id in ConstraintId::ALL {
        let row = &mut sink.rows[id.index()];
        let unit = table.unit(id);
        let score = unit.scale(row.units);
        total += score;

        let matches = if policy == FetchPolicy::Full {
            row.matches.sort();
            Some(
                row.matches
                    .iter()
                    .map(|(lessons, units)| ConstraintMatch {
                        lessons: lessons.iter().map(|&l| plan.lesson(l).id).collect(),
                        score: unit.scale(*units),
                        justification: describe(&plan, &slots, id, lessons, *units),
                    })
                    .collect(),
            )
        } else {
            None
        };

        constraints.push(ConstraintAnalysis {
            constraint: id,
            tier: resolved[id.index()].tier,
            weight: resolved[id.index()].weight,
            match_count: row.match_count,
            score,
            matches,
        });
    }

    Ok(ScoreAnalysis {
        score: total,
        constraints,
    })
}

fn when(ts: &Timeslot) -> String {
    format!("{} {}-{}", ts.day, ts.start, ts.end)
}

fn cohort(plan: &Plan, lesson: u32) -> String {
    let group = plan.group_of(lesson);
    format!("{}/{}", group.series, group.subgroup)
}

fn describe(plan: &Plan, slots: &[Slot], constraint: ConstraintId, lessons: &[u32], units: i64) -> String {
    use ConstraintId::*;
    let subj = |l: u32| plan.lesson(l).subject.as_str();
    let ts = |l: u32| plan.timeslot(slots[l as usize].timeslot.expect("matched lesson is assigned"));
    let room = |l: u32| plan.room(slots[l as usize].room.expect("matched lesson is assigned"));
    let teacher = |l: u32| plan.teacher(plan.teacher_of(l)).name.as_str();
    let first = lessons[0];

    match constraint {
        RoomConflict | RoomConflictUniversity => format!(
            "Room '{}' hosts lesson '{}' for group '{}' and lesson '{}' for group '{}' at {}",
            room(first).name,
            subj(lessons[0]),
            cohort(plan, lessons[0]),
            subj(lessons[1]),
            cohort(plan, lessons[1]),
            when(ts(first)),
        ),
        TeacherConflict | TeacherConflictUniversity => format!(
            "Teacher '{}' has lessons '{}' and '{}' at {}",
            teacher(first),
            subj(lessons[0]),
            subj(lessons[1]),
            when(ts(first)),
        ),
        StudentGroupConflict => format!(
            "Student group '{}' attends {} clashing lessons at {}: {}",
            cohort(plan, first),
            lessons.len(),
            when(ts(first)),
            lessons.iter().map(|&l| subj(l)).collect::<Vec<_>>().join(", "),
        ),
        CapacityRoomConflict => format!(
            "Lesson '{}' brings {} students to room '{}' with capacity {}",
            subj(first),
            plan.student_count_of(first),
            room(first).name,
            room(first).capacity,
        ),
        CourseStudentsGroupedInTheSameRoom
        | SeminarStudentsGroupedInTheSameRoom
        | LabsStudentsGroupedInTheSameRoom => format!(
            "{} students over capacity in room '{}' at {} across {} grouped lessons",
            units,
            room(first).name,
            when(ts(first)),
            lessons.len(),
        ),
        OverlappingTimeslot => format!(
            "Lessons '{}' ({}) and '{}' ({}) overlap for group '{}'",
            subj(lessons[0]),
            when(ts(lessons[0])),
            subj(lessons[1]),
            when(ts(lessons[1])),
            cohort(plan, first),
        ),
        LessonDurationConflict => format!(
            "Lesson '{}' lasts {}h but timeslot {} spans {}h",
            subj(first),
            plan.lesson(first).duration_hours,
            when(ts(first)),
            ts(first).duration_hours(),
        ),
        MaximumCoursesForStudents => format!(
            "Group '{}' is scheduled {} hours over the daily cap on {}",
            cohort(plan, first),
            units,
            ts(first).day,
        ),
        MaximmumCoursesTeached => format!(
            "Teacher '{}' teaches {} hours over the daily cap on {}",
            teacher(first),
            units,
            ts(first).day,
        ),
        MaximizePreferredTimeslotAssignments => format!(
            "Lesson '{}' at {} falls outside every preferred window of teacher '{}'",
            subj(first),
            when(ts(first)),
            teacher(first),
        ),
        CoursesGroupedInTheSameTimeslot
        | SeminarsGroupedInTheSameTimeslot
        | LabsGroupedInTheSameTimeslot => format!(
            "Subject '{}' for cohort '{}' is split across {} timeslot/room pairs",
            subj(first),
            cohort(plan, first),
            units + 1,
        ),
        TeacherRoomStability => format!(
            "Teacher '{}' keeps room '{}' across lessons '{}' and '{}'",
            teacher(first),
            room(first).name,
            subj(lessons[0]),
            subj(lessons[1]),
        ),
        TeacherTimeEfficiency => format!(
            "Teacher '{}' teaches '{}' and '{}' back-to-back on {}",
            teacher(first),
            subj(lessons[0]),
            subj(lessons[1]),
            ts(first).day,
        ),
        CoursesInTheSameBuilding => format!(
            "Group '{}' stays in building '{}' between '{}' and '{}'",
            cohort(plan, first),
            room(first).building,
            subj(lessons[0]),
            subj(lessons[1]),
        ),
        GapsLongerThan4Hours => format!(
            "Group '{}' waits more than 3 hours between '{}' and '{}' on {}",
            cohort(plan, first),
            subj(lessons[0]),
            subj(lessons[1]),
            ts(first).day,
        ),
        LabAfterSeminar => format!(
            "Group '{}' has '{}' and '{}' back-to-back on {}",
            cohort(plan, first),
            subj(lessons[0]),
            subj(lessons[1]),
            ts(first).day,
        ),
        StudentGroupVariety => format!(
            "Group '{}' repeats subject '{}' in consecutive lessons on {}",
            cohort(plan, first),
            subj(first),
            ts(first).day,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::*;

    fn fixture() -> Timetable {
        let timeslots = vec![
            Timeslot {
                id: TimeslotId(1),
                day: DayOfWeek::Mon,
                start: TimeOfDay::hm(12, 0),
                end: TimeOfDay::hm(14, 0),
            },
            Timeslot {
                id: TimeslotId(2),
                day: DayOfWeek::Tue,
                start: TimeOfDay::hm(12, 0),
                end: TimeOfDay::hm(14, 0),
            },
        ];
        let rooms = vec![Room {
            id: RoomId(1),
            name: "Room1".into(),
            capacity: 60,
            building: "A".into(),
        }];
        let teachers = vec![
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
            Teacher {
                id: TeacherId(3),
                name: "Teacher3".into(),
                preferred_windows: vec![],
            },
        ];
        let groups = vec![
            StudentGroup {
                id: GroupId(1),
                year: Year::First,
                series: "A".into(),
                subgroup: "A1".into(),
                semigroup: String::new(),
                student_count: 30,
            },
            StudentGroup {
                id: GroupId(2),
                year: Year::First,
                series: "B".into(),
                subgroup: "B1".into(),
                semigroup: String::new(),
                student_count: 30,
            },
            StudentGroup {
                id: GroupId(3),
                year: Year::First,
                series: "C".into(),
                subgroup: "C1".into(),
                semigroup: String::new(),
                student_count: 30,
            },
        ];
        let mk = |id: u64, teacher: u64, group: u64, ts: u64| Lesson {
            id: LessonId(id),
            subject: format!("Subject{id}"),
            lesson_type: LessonType::Course,
            year: Year::First,
            duration_hours: 2,
            teacher: TeacherId(teacher),
            student_group: GroupId(group),
            timeslot: Some(TimeslotId(ts)),
            room: Some(RoomId(1)),
        };
        Timetable::new(
            timeslots,
            rooms,
            teachers,
            groups,
            vec![mk(1, 1, 1, 1), mk(2, 2, 2, 1), mk(3, 3, 3, 2)],
            ConstraintWeights::standard(),
            1,
        )
    }

    fn row(analysis: &ScoreAnalysis, id: ConstraintId) -> &ConstraintAnalysis {
        analysis
            .constraints
            .iter()
            .find(|c| c.constraint == id)
            .unwrap()
    }

    #[test]
    fn shallow_reports_counts_without_matches() {
        let analysis = analyze(&fixture(), FetchPolicy::Shallow).unwrap();
        let conflicts = row(&analysis, ConstraintId::RoomConflictUniversity);
        assert_eq!(conflicts.match_count, 1);
        assert_eq!(conflicts.score, Score::of_hard(-1));
        assert!(conflicts.matches.is_none());
        assert_eq!(analysis.constraints.len(), ConstraintId::ALL.len());
    }

    #[test]
    fn full_carries_justifications() {
        let analysis = analyze(&fixture(), FetchPolicy::Full).unwrap();
        let conflicts = row(&analysis, ConstraintId::RoomConflictUniversity);
        let matches = conflicts.matches.as_ref().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].lessons, vec![LessonId(1), LessonId(2)]);
        assert!(matches[0].justification.contains("Room1"));
        assert!(matches[0].justification.contains("Subject1"));
        assert_eq!(matches[0].score, Score::of_hard(-1));
    }

    #[test]
    fn disabled_rules_still_count_matches_but_score_zero() {
        let analysis = analyze(&fixture(), FetchPolicy::Shallow).unwrap();
        // roomConflict is weight 0 under the standard config.
        let plain = row(&analysis, ConstraintId::RoomConflict);
        assert_eq!(plain.weight, 0);
        assert_eq!(plain.match_count, 1);
        assert_eq!(plain.score, Score::ZERO);
    }

    #[test]
    fn total_is_the_sum_of_contributions() {
        let analysis = analyze(&fixture(), FetchPolicy::Shallow).unwrap();
        let sum = analysis
            .constraints
            .iter()
            .fold(Score::ZERO, |acc, c| acc + c.score);
        assert_eq!(analysis.score, sum);
    }

    #[test]
    fn analyze_rejects_dangling_assignments() {
        let mut tt = fixture();
        tt.lessons[0].timeslot = Some(TimeslotId(99));
        assert!(analyze(&tt, FetchPolicy::Shallow).is_err());
    }
}
