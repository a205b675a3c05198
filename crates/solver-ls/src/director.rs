//! Incremental score maintenance. A lesson touches six bucket families; a
//! placement subtracts those buckets' contributions, updates the index and
//! adds them back, so a move costs a handful of small bucket evaluations
//! instead of a full catalog pass.

use crate::moves::Move;
use timetable_core::plan::{Plan, Slot};
use timetable_core::scoring::{
    cohort_key, eval_cohort_bucket, eval_group_day_bucket, eval_group_ts_bucket, eval_lesson,
    eval_teacher_day_bucket, eval_teacher_ts_bucket, eval_ts_room_bucket, run_catalog,
    AssignmentIndex, ScoreSink, WeightTable,
};
use types::{ConstraintWeights, Score};

pub struct ScoreDirector<'p, 'tt> {
    plan: &'p Plan<'tt>,
    table: WeightTable,
    slots: Vec<Slot>,
    index: AssignmentIndex,
    score: Score,
}

impl<'p, 'tt> ScoreDirector<'p, 'tt> {
    pub fn new(plan: &'p Plan<'tt>, weights: &ConstraintWeights, initial: Vec<Slot>) -> Self {
        let mut director = Self {
            plan,
            table: WeightTable::new(weights),
            slots: vec![Slot::default(); plan.lesson_count()],
            index: AssignmentIndex::default(),
            score: Score::ZERO,
        };
        for (lesson, slot) in initial.iter().enumerate() {
            if let Some((ts, room)) = slot.full() {
                director.place(lesson as u32, ts, room);
            }
        }
        director
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, lesson: u32) -> Slot {
        self.slots[lesson as usize]
    }

    /// Contribution of every bucket the lesson touches at (ts, room), plus
    /// its single-lesson rules, under the current index and slots.
    fn neighborhood_score(&self, lesson: u32, ts: u32, room: u32) -> Score {
        let day = self.plan.timeslot(ts).day;
        let teacher = self.plan.teacher_of(lesson);
        let group = self.plan.group_idx_of(lesson);

        let mut sink = ScoreSink::new(&self.table);
        if let Some(members) = self.index.ts_room.get(&(ts, room)) {
            eval_ts_room_bucket(self.plan, &self.slots, members, &mut sink);
        }
        if let Some(members) = self.index.teacher_ts.get(&(teacher, ts)) {
            eval_teacher_ts_bucket(self.plan, &self.slots, members, &mut sink);
        }
        if let Some(members) = self.index.group_ts.get(&(group, ts)) {
            eval_group_ts_bucket(self.plan, &self.slots, members, &mut sink);
        }
        if let Some(members) = self.index.group_day.get(&(group, day)) {
            eval_group_day_bucket(self.plan, &self.slots, members, &mut sink);
        }
        if let Some(members) = self.index.teacher_day.get(&(teacher, day)) {
            eval_teacher_day_bucket(self.plan, &self.slots, members, &mut sink);
        }
        if let Some(key) = cohort_key(self.plan, lesson) {
            if let Some(members) = self.index.cohort_subject.get(&key) {
                eval_cohort_bucket(self.plan, &self.slots, members, &mut sink);
            }
        }
        eval_lesson(self.plan, &self.slots, lesson, &mut sink);
        sink.total
    }

    pub fn place(&mut self, lesson: u32, ts: u32, room: u32) {
        debug_assert!(self.slots[lesson as usize].full().is_none());
        let entering = self.neighborhood_score(lesson, ts, room);
        self.index.insert(self.plan, lesson, ts, room);
        self.slots[lesson as usize] = Slot::of(ts, room);
        let entered = self.neighborhood_score(lesson, ts, room);
        self.score += entered - entering;
    }

    pub fn unplace(&mut self, lesson: u32) -> (u32, u32) {
        let (ts, room) = self.slots[lesson as usize]
            .full()
            .expect("unplace of an unassigned lesson");
        let leaving = self.neighborhood_score(lesson, ts, room);
        self.index.remove(self.plan, lesson, ts, room);
        self.slots[lesson as usize] = Slot::default();
        let left = self.neighborhood_score(lesson, ts, room);
        self.score += left - leaving;
        (ts, room)
    }

    /// Moves a lesson to a new (timeslot, room) pair, returning the old one
    /// so the caller can revert.
    pub fn change(&mut self, lesson: u32, ts: u32, room: u32) -> (u32, u32) {
        let old = self.unplace(lesson);
        self.place(lesson, ts, room);
        old
    }

    /// Applies a move and returns its inverse.
    pub fn apply(&mut self, mv: Move) -> Move {
        match mv {
            Move::Change {
                lesson,
                timeslot,
                room,
            } => {
                let (old_ts, old_room) = self.change(lesson, timeslot, room);
                Move::Change {
                    lesson,
                    timeslot: old_ts,
                    room: old_room,
                }
            }
            Move::Swap { a, b } => {
                self.swap(a, b);
                Move::Swap { a, b }
            }
        }
    }

    /// Exchanges both decision slots between two lessons. Self-inverse.
    pub fn swap(&mut self, a: u32, b: u32) {
        let slot_a = self.unplace(a);
        let slot_b = self.unplace(b);
        self.place(a, slot_b.0, slot_b.1);
        self.place(b, slot_a.0, slot_a.1);
    }

    /// From-scratch score over the current slots; the incremental score must
    /// always agree with this.
    pub fn recomputed(&self) -> Score {
        let index = AssignmentIndex::build(self.plan, &self.slots);
        let mut sink = ScoreSink::new(&self.table);
        run_catalog(self.plan, &self.slots, &index, &mut sink);
        sink.total
    }
}
