//! The constraint catalog. Every rule is evaluated over small "buckets" of
//! lessons sharing an index key, so a move only ever re-scores the buckets
//! its lessons leave and enter; full evaluation and incremental maintenance
//! run the exact same bucket functions.
//!
//! Lessons without both decision slots assigned are absent from every
//! bucket and contribute nothing, uniformly across all rules.

use crate::plan::{Plan, Slot};
use std::collections::{HashMap, HashSet};
use types::score::CONSTRAINT_COUNT;
use types::{ConstraintId, ConstraintWeights, DayOfWeek, Impact, LessonType, Score, Timeslot};

pub const MAX_STUDENT_HOURS_PER_DAY: i64 = 10;
pub const MAX_TEACHER_HOURS_PER_DAY: i64 = 12;
/// Gaps longer than this (minutes) between two lessons of one group count
/// as a schedule hole.
pub const MAX_GAP_MINUTES: i32 = 180;
/// Two lessons at most this many minutes apart count as consecutive.
pub const CONSECUTIVE_GAP_MINUTES: i32 = 30;

/// Weight configuration resolved to one signed unit score per rule:
/// penalties subtract from their tier, rewards add.
pub struct WeightTable {
    unit: [Score; CONSTRAINT_COUNT],
}

impl WeightTable {
    pub fn new(weights: &ConstraintWeights) -> Self {
        let resolved = weights.resolved();
        let mut unit = [Score::ZERO; CONSTRAINT_COUNT];
        for id in ConstraintId::ALL {
            let entry = resolved[id.index()];
            let signed = match id.impact() {
                Impact::Penalize => -entry.weight,
                Impact::Reward => entry.weight,
            };
            unit[id.index()] = entry.tier.unit(signed);
        }
        Self { unit }
    }

    pub fn unit(&self, constraint: ConstraintId) -> Score {
        self.unit[constraint.index()]
    }
}

/// Receives every matched constraint instance. `units` is the match's raw
/// magnitude (pair count, excess students, excess hours, ...).
pub trait MatchSink {
    fn add(&mut self, constraint: ConstraintId, units: i64, lessons: &[u32]);
}

/// Sink that folds matches straight into a score.
pub struct ScoreSink<'t> {
    table: &'t WeightTable,
    pub total: Score,
}

impl<'t> ScoreSink<'t> {
    pub fn new(table: &'t WeightTable) -> Self {
        Self {
            table,
            total: Score::ZERO,
        }
    }
}

impl MatchSink for ScoreSink<'_> {
    fn add(&mut self, constraint: ConstraintId, units: i64, _lessons: &[u32]) {
        self.total += self.table.unit(constraint).scale(units);
    }
}

/// Auxiliary indices over the current assignment, one entry per non-empty
/// bucket. Only fully assigned lessons are ever inserted.
#[derive(Default)]
pub struct AssignmentIndex {
    pub ts_room: HashMap<(u32, u32), Vec<u32>>,
    pub teacher_ts: HashMap<(u32, u32), Vec<u32>>,
    pub group_ts: HashMap<(u32, u32), Vec<u32>>,
    pub group_day: HashMap<(u32, DayOfWeek), Vec<u32>>,
    pub teacher_day: HashMap<(u32, DayOfWeek), Vec<u32>>,
    /// (lesson type, series-or-subgroup label, subject): the grouping key
    /// of the "grouped in the same timeslot" rules. Projects are not keyed.
    pub cohort_subject: HashMap<(LessonType, u32, u32), Vec<u32>>,
}

/// The grouping key a lesson contributes to for the grouped-delivery rules:
/// courses group by series, seminars and labs by subgroup.
pub fn cohort_key(plan: &Plan, lesson: u32) -> Option<(LessonType, u32, u32)> {
    let subject = plan.subject_of(lesson);
    match plan.lesson_type_of(lesson) {
        LessonType::Course => Some((LessonType::Course, plan.series_of(lesson), subject)),
        LessonType::Seminar => Some((LessonType::Seminar, plan.subgroup_of(lesson), subject)),
        LessonType::Laboratory => {
            Some((LessonType::Laboratory, plan.subgroup_of(lesson), subject))
        }
        LessonType::Project => None,
    }
}

impl AssignmentIndex {
    pub fn build(plan: &Plan, slots: &[Slot]) -> Self {
        let mut index = AssignmentIndex::default();
        for lesson in 0..plan.lesson_count() as u32 {
            if let Some((ts, room)) = slots[lesson as usize].full() {
                index.insert(plan, lesson, ts, room);
            }
        }
        index
    }

    pub fn insert(&mut self, plan: &Plan, lesson: u32, ts: u32, room: u32) {
        let day = plan.timeslot(ts).day;
        let teacher = plan.teacher_of(lesson);
        let group = plan.group_idx_of(lesson);
        self.ts_room.entry((ts, room)).or_default().push(lesson);
        self.teacher_ts.entry((teacher, ts)).or_default().push(lesson);
        self.group_ts.entry((group, ts)).or_default().push(lesson);
        self.group_day.entry((group, day)).or_default().push(lesson);
        self.teacher_day
            .entry((teacher, day))
            .or_default()
            .push(lesson);
        if let Some(key) = cohort_key(plan, lesson) {
            self.cohort_subject.entry(key).or_default().push(lesson);
        }
    }

    pub fn remove(&mut self, plan: &Plan, lesson: u32, ts: u32, room: u32) {
        let day = plan.timeslot(ts).day;
        let teacher = plan.teacher_of(lesson);
        let group = plan.group_idx_of(lesson);
        detach(&mut self.ts_room, (ts, room), lesson);
        detach(&mut self.teacher_ts, (teacher, ts), lesson);
        detach(&mut self.group_ts, (group, ts), lesson);
        detach(&mut self.group_day, (group, day), lesson);
        detach(&mut self.teacher_day, (teacher, day), lesson);
        if let Some(key) = cohort_key(plan, lesson) {
            detach(&mut self.cohort_subject, key, lesson);
        }
    }
}

fn detach<K: std::hash::Hash + Eq>(map: &mut HashMap<K, Vec<u32>>, key: K, lesson: u32) {
    if let Some(members) = map.get_mut(&key) {
        if let Some(pos) = members.iter().position(|&l| l == lesson) {
            members.swap_remove(pos);
        }
        if members.is_empty() {
            map.remove(&key);
        }
    }
}

fn ts_of<'p>(plan: &Plan<'p>, slots: &[Slot], lesson: u32) -> &'p Timeslot {
    plan.timeslot(slots[lesson as usize].timeslot.expect("lesson in bucket is assigned"))
}

/// Minutes from `a`'s end to `b`'s start; negative when `b` starts first.
fn gap_minutes(a: &Timeslot, b: &Timeslot) -> i32 {
    i32::from(b.start.0) - i32::from(a.end.0)
}

fn is_consecutive(a: &Timeslot, b: &Timeslot) -> bool {
    let gap = gap_minutes(a, b);
    (0..=CONSECUTIVE_GAP_MINUTES).contains(&gap)
}

/// Pair conflicts unless the lessons belong to the same series and either
/// share subgroup and subject, or share type and subject.
fn university_room_conflict(plan: &Plan, a: u32, b: u32) -> bool {
    if plan.series_of(a) != plan.series_of(b) {
        return true;
    }
    let same_subject = plan.subject_of(a) == plan.subject_of(b);
    let exempt = same_subject
        && (plan.subgroup_of(a) == plan.subgroup_of(b)
            || plan.lesson_type_of(a) == plan.lesson_type_of(b));
    !exempt
}

/// A teacher may deliver one shared lesson to several cohorts at once: same
/// series, type, subject and room, and either the same subgroup or a
/// COURSE-type lesson spanning subgroups.
fn university_teacher_conflict(plan: &Plan, slots: &[Slot], a: u32, b: u32) -> bool {
    if plan.series_of(a) != plan.series_of(b) {
        return true;
    }
    let shared_delivery = plan.lesson_type_of(a) == plan.lesson_type_of(b)
        && plan.subject_of(a) == plan.subject_of(b)
        && slots[a as usize].room == slots[b as usize].room;
    if !shared_delivery {
        return true;
    }
    if plan.subgroup_of(a) == plan.subgroup_of(b) {
        return false;
    }
    plan.lesson_type_of(a) != LessonType::Course
}

fn sorted_by_id(members: &[u32]) -> Vec<u32> {
    let mut sorted = members.to_vec();
    sorted.sort_unstable();
    sorted
}

fn sorted_by_time(plan: &Plan, slots: &[Slot], members: &[u32]) -> Vec<u32> {
    let mut sorted = members.to_vec();
    sorted.sort_unstable_by_key(|&l| {
        let ts = ts_of(plan, slots, l);
        (ts.start, ts.end, l)
    });
    sorted
}

/// Rules keyed by (timeslot, room): pairwise room conflicts and the grouped
/// per-cohort capacity checks.
pub fn eval_ts_room_bucket(
    plan: &Plan,
    slots: &[Slot],
    members: &[u32],
    sink: &mut dyn MatchSink,
) {
    if members.is_empty() {
        return;
    }
    let sorted = sorted_by_id(members);
    for i in 0..sorted.len() {
        for j in i + 1..sorted.len() {
            let (a, b) = (sorted[i], sorted[j]);
            sink.add(ConstraintId::RoomConflict, 1, &[a, b]);
            if university_room_conflict(plan, a, b) {
                sink.add(ConstraintId::RoomConflictUniversity, 1, &[a, b]);
            }
        }
    }

    let room = plan.room(slots[sorted[0] as usize].room.expect("lesson in bucket is assigned"));
    let capacity = i64::from(room.capacity);
    for (ty, constraint) in [
        (
            LessonType::Course,
            ConstraintId::CourseStudentsGroupedInTheSameRoom,
        ),
        (
            LessonType::Seminar,
            ConstraintId::SeminarStudentsGroupedInTheSameRoom,
        ),
        (
            LessonType::Laboratory,
            ConstraintId::LabsStudentsGroupedInTheSameRoom,
        ),
    ] {
        let mut per_cohort: Vec<(u32, i64, Vec<u32>)> = Vec::new();
        for &l in &sorted {
            if plan.lesson_type_of(l) != ty {
                continue;
            }
            let label = match ty {
                LessonType::Course => plan.series_of(l),
                _ => plan.subgroup_of(l),
            };
            match per_cohort.iter_mut().find(|(k, _, _)| *k == label) {
                Some((_, total, lessons)) => {
                    *total += i64::from(plan.student_count_of(l));
                    lessons.push(l);
                }
                None => per_cohort.push((label, i64::from(plan.student_count_of(l)), vec![l])),
            }
        }
        for (_, total, lessons) in per_cohort {
            if total > capacity {
                sink.add(constraint, total - capacity, &lessons);
            }
        }
    }
}

/// Rules keyed by (teacher, timeslot): pairwise teacher conflicts and the
/// room-stability reward (which requires an identical timeslot anyway).
pub fn eval_teacher_ts_bucket(
    plan: &Plan,
    slots: &[Slot],
    members: &[u32],
    sink: &mut dyn MatchSink,
) {
    let sorted = sorted_by_id(members);
    for i in 0..sorted.len() {
        for j in i + 1..sorted.len() {
            let (a, b) = (sorted[i], sorted[j]);
            sink.add(ConstraintId::TeacherConflict, 1, &[a, b]);
            if university_teacher_conflict(plan, slots, a, b) {
                sink.add(ConstraintId::TeacherConflictUniversity, 1, &[a, b]);
            }
            let ts = ts_of(plan, slots, a);
            if slots[a as usize].room == slots[b as usize].room && is_consecutive(ts, ts) {
                sink.add(ConstraintId::TeacherRoomStability, 1, &[a, b]);
            }
        }
    }
}

/// (student group, timeslot): k lessons clash as k·(k−1)/2 pairs.
pub fn eval_group_ts_bucket(
    _plan: &Plan,
    _slots: &[Slot],
    members: &[u32],
    sink: &mut dyn MatchSink,
) {
    let n = members.len() as i64;
    if n > 1 {
        sink.add(
            ConstraintId::StudentGroupConflict,
            n * (n - 1) / 2,
            &sorted_by_id(members),
        );
    }
}

/// (student group, day): overlap pairs, the daily hour cap, and all the
/// same-day adjacency rules for one cohort.
pub fn eval_group_day_bucket(
    plan: &Plan,
    slots: &[Slot],
    members: &[u32],
    sink: &mut dyn MatchSink,
) {
    let sorted = sorted_by_time(plan, slots, members);

    let hours: i64 = sorted
        .iter()
        .map(|&l| i64::from(ts_of(plan, slots, l).duration_hours()))
        .sum();
    if hours > MAX_STUDENT_HOURS_PER_DAY {
        sink.add(
            ConstraintId::MaximumCoursesForStudents,
            hours - MAX_STUDENT_HOURS_PER_DAY,
            &sorted,
        );
    }

    for i in 0..sorted.len() {
        for j in i + 1..sorted.len() {
            let (a, b) = (sorted[i], sorted[j]);
            let (ta, tb) = (ts_of(plan, slots, a), ts_of(plan, slots, b));
            if ta.overlaps(tb) {
                sink.add(ConstraintId::OverlappingTimeslot, 1, &[a, b]);
            }
            if is_consecutive(ta, tb) {
                let room_a = plan.room(slots[a as usize].room.expect("assigned"));
                let room_b = plan.room(slots[b as usize].room.expect("assigned"));
                if room_a.building == room_b.building {
                    sink.add(ConstraintId::CoursesInTheSameBuilding, 1, &[a, b]);
                }
                let types = (plan.lesson_type_of(a), plan.lesson_type_of(b));
                if matches!(
                    types,
                    (LessonType::Seminar, LessonType::Laboratory)
                        | (LessonType::Laboratory, LessonType::Seminar)
                ) {
                    sink.add(ConstraintId::LabAfterSeminar, 1, &[a, b]);
                }
                if plan.subject_of(a) == plan.subject_of(b) {
                    sink.add(ConstraintId::StudentGroupVariety, 1, &[a, b]);
                }
            }
            if gap_minutes(ta, tb) > MAX_GAP_MINUTES {
                let intervening = sorted.iter().any(|&c| {
                    let tc = ts_of(plan, slots, c);
                    ta.end < tc.start && tc.start < tb.start
                });
                if !intervening {
                    sink.add(ConstraintId::GapsLongerThan4Hours, 1, &[a, b]);
                }
            }
        }
    }
}

/// (teacher, day): the taught-hours cap (distinct timeslots count once) and
/// the back-to-back teaching reward.
pub fn eval_teacher_day_bucket(
    plan: &Plan,
    slots: &[Slot],
    members: &[u32],
    sink: &mut dyn MatchSink,
) {
    let sorted = sorted_by_time(plan, slots, members);

    let mut distinct: Vec<u32> = sorted
        .iter()
        .map(|&l| slots[l as usize].timeslot.expect("assigned"))
        .collect();
    distinct.sort_unstable();
    distinct.dedup();
    let hours: i64 = distinct
        .iter()
        .map(|&t| i64::from(plan.timeslot(t).duration_hours()))
        .sum();
    if hours > MAX_TEACHER_HOURS_PER_DAY {
        sink.add(
            ConstraintId::MaximmumCoursesTeached,
            hours - MAX_TEACHER_HOURS_PER_DAY,
            &sorted,
        );
    }

    for i in 0..sorted.len() {
        for j in i + 1..sorted.len() {
            let (a, b) = (sorted[i], sorted[j]);
            if is_consecutive(ts_of(plan, slots, a), ts_of(plan, slots, b)) {
                sink.add(ConstraintId::TeacherTimeEfficiency, 1, &[a, b]);
            }
        }
    }
}

/// (type, cohort label, subject): every cohort ideally hears a subject's
/// lessons of one type in exactly one (timeslot, room).
pub fn eval_cohort_bucket(
    plan: &Plan,
    slots: &[Slot],
    members: &[u32],
    sink: &mut dyn MatchSink,
) {
    if members.is_empty() {
        return;
    }
    let constraint = match plan.lesson_type_of(members[0]) {
        LessonType::Course => ConstraintId::CoursesGroupedInTheSameTimeslot,
        LessonType::Seminar => ConstraintId::SeminarsGroupedInTheSameTimeslot,
        LessonType::Laboratory => ConstraintId::LabsGroupedInTheSameTimeslot,
        LessonType::Project => return,
    };
    let distinct: HashSet<(u32, u32)> = members
        .iter()
        .filter_map(|&l| slots[l as usize].full())
        .collect();
    if distinct.len() > 1 {
        sink.add(constraint, distinct.len() as i64 - 1, &sorted_by_id(members));
    }
}

/// Rules matching one lesson at a time.
pub fn eval_lesson(plan: &Plan, slots: &[Slot], lesson: u32, sink: &mut dyn MatchSink) {
    let Some((ts_idx, room_idx)) = slots[lesson as usize].full() else {
        return;
    };
    let ts = plan.timeslot(ts_idx);
    let room = plan.room(room_idx);

    let students = i64::from(plan.student_count_of(lesson));
    let capacity = i64::from(room.capacity);
    if students > capacity {
        sink.add(
            ConstraintId::CapacityRoomConflict,
            students - capacity,
            &[lesson],
        );
    }

    if u64::from(plan.lesson(lesson).duration_hours) != u64::from(ts.duration_hours()) {
        sink.add(ConstraintId::LessonDurationConflict, 1, &[lesson]);
    }

    let windows = &plan.teacher(plan.teacher_of(lesson)).preferred_windows;
    if !windows.is_empty() && !windows.iter().any(|w| w.contains(ts)) {
        sink.add(
            ConstraintId::MaximizePreferredTimeslotAssignments,
            1,
            &[lesson],
        );
    }
}

/// Runs every rule over every bucket and assigned lesson.
pub fn run_catalog(
    plan: &Plan,
    slots: &[Slot],
    index: &AssignmentIndex,
    sink: &mut dyn MatchSink,
) {
    for members in index.ts_room.values() {
        eval_ts_room_bucket(plan, slots, members, sink);
    }
    for members in index.teacher_ts.values() {
        eval_teacher_ts_bucket(plan, slots, members, sink);
    }
    for members in index.group_ts.values() {
        eval_group_ts_bucket(plan, slots, members, sink);
    }
    for members in index.group_day.values() {
        eval_group_day_bucket(plan, slots, members, sink);
    }
    for members in index.teacher_day.values() {
        eval_teacher_day_bucket(plan, slots, members, sink);
    }
    for members in index.cohort_subject.values() {
        eval_cohort_bucket(plan, slots, members, sink);
    }
    for lesson in 0..plan.lesson_count() as u32 {
        eval_lesson(plan, slots, lesson, sink);
    }
}

/// From-scratch score of an assignment under a weight configuration.
pub fn evaluate(plan: &Plan, slots: &[Slot], weights: &ConstraintWeights) -> Score {
    let table = WeightTable::new(weights);
    let index = AssignmentIndex::build(plan, slots);
    let mut sink = ScoreSink::new(&table);
    run_catalog(plan, slots, &index, &mut sink);
    sink.total
}
