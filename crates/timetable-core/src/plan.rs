use crate::ValidationError;
use std::collections::HashMap;
use types::{
    GroupId, Lesson, LessonType, Room, RoomId, StudentGroup, Teacher, TeacherId, Timeslot,
    TimeslotId, Timetable,
};

/// A lesson's two decision slots, as indices into the plan's fact arrays.
/// `None` means the solver has not assigned the slot yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Slot {
    pub timeslot: Option<u32>,
    pub room: Option<u32>,
}

impl Slot {
    pub fn of(timeslot: u32, room: u32) -> Self {
        Slot {
            timeslot: Some(timeslot),
            room: Some(room),
        }
    }

    /// Both decision slots, when the lesson is fully assigned.
    pub fn full(self) -> Option<(u32, u32)> {
        match (self.timeslot, self.room) {
            (Some(t), Some(r)) => Some((t, r)),
            _ => None,
        }
    }
}

/// Index-based view of one aggregate: every id reference resolved to a
/// dense index, subjects and cohort labels interned for cheap grouping
/// keys. Owned by a single solve session (or one analyzer call); nothing
/// here is shared across sessions.
pub struct Plan<'a> {
    tt: &'a Timetable,
    ts_index: HashMap<TimeslotId, u32>,
    room_index: HashMap<RoomId, u32>,
    lesson_teacher: Vec<u32>,
    lesson_group: Vec<u32>,
    lesson_subject: Vec<u32>,
    group_series: Vec<u32>,
    group_subgroup: Vec<u32>,
}

impl<'a> Plan<'a> {
    pub fn new(tt: &'a Timetable) -> Result<Self, ValidationError> {
        let ts_index: HashMap<_, _> = tt
            .timeslots
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id, i as u32))
            .collect();
        let room_index: HashMap<_, _> = tt
            .rooms
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i as u32))
            .collect();
        let teacher_index: HashMap<TeacherId, u32> = tt
            .teachers
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id, i as u32))
            .collect();
        let group_index: HashMap<GroupId, u32> = tt
            .student_groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.id, i as u32))
            .collect();

        let mut interner = Interner::default();
        let mut lesson_teacher = Vec::with_capacity(tt.lessons.len());
        let mut lesson_group = Vec::with_capacity(tt.lessons.len());
        let mut lesson_subject = Vec::with_capacity(tt.lessons.len());
        for lesson in &tt.lessons {
            let teacher = teacher_index.get(&lesson.teacher).copied().ok_or_else(|| {
                ValidationError::Msg(format!(
                    "lesson {} references missing teacher {}",
                    lesson.id, lesson.teacher
                ))
            })?;
            let group = group_index
                .get(&lesson.student_group)
                .copied()
                .ok_or_else(|| {
                    ValidationError::Msg(format!(
                        "lesson {} references missing student group {}",
                        lesson.id, lesson.student_group
                    ))
                })?;
            lesson_teacher.push(teacher);
            lesson_group.push(group);
            lesson_subject.push(interner.intern(&lesson.subject));
        }

        let mut label_interner = Interner::default();
        let mut group_series = Vec::with_capacity(tt.student_groups.len());
        let mut group_subgroup = Vec::with_capacity(tt.student_groups.len());
        for group in &tt.student_groups {
            group_series.push(label_interner.intern(&group.series));
            group_subgroup.push(label_interner.intern(&group.subgroup));
        }

        Ok(Self {
            tt,
            ts_index,
            room_index,
            lesson_teacher,
            lesson_group,
            lesson_subject,
            group_series,
            group_subgroup,
        })
    }

    pub fn timetable(&self) -> &'a Timetable {
        self.tt
    }

    pub fn lesson_count(&self) -> usize {
        self.tt.lessons.len()
    }

    pub fn timeslot_count(&self) -> usize {
        self.tt.timeslots.len()
    }

    pub fn room_count(&self) -> usize {
        self.tt.rooms.len()
    }

    pub fn timeslot(&self, idx: u32) -> &'a Timeslot {
        &self.tt.timeslots[idx as usize]
    }

    pub fn room(&self, idx: u32) -> &'a Room {
        &self.tt.rooms[idx as usize]
    }

    pub fn lesson(&self, idx: u32) -> &'a Lesson {
        &self.tt.lessons[idx as usize]
    }

    pub fn teacher_of(&self, lesson: u32) -> u32 {
        self.lesson_teacher[lesson as usize]
    }

    pub fn teacher(&self, idx: u32) -> &'a Teacher {
        &self.tt.teachers[idx as usize]
    }

    pub fn group_idx_of(&self, lesson: u32) -> u32 {
        self.lesson_group[lesson as usize]
    }

    pub fn group(&self, idx: u32) -> &'a StudentGroup {
        &self.tt.student_groups[idx as usize]
    }

    pub fn group_of(&self, lesson: u32) -> &'a StudentGroup {
        self.group(self.group_idx_of(lesson))
    }

    pub fn subject_of(&self, lesson: u32) -> u32 {
        self.lesson_subject[lesson as usize]
    }

    pub fn series_of(&self, lesson: u32) -> u32 {
        self.group_series[self.group_idx_of(lesson) as usize]
    }

    pub fn subgroup_of(&self, lesson: u32) -> u32 {
        self.group_subgroup[self.group_idx_of(lesson) as usize]
    }

    pub fn lesson_type_of(&self, lesson: u32) -> LessonType {
        self.lesson(lesson).lesson_type
    }

    pub fn student_count_of(&self, lesson: u32) -> u32 {
        self.group_of(lesson).student_count
    }

    /// The lessons' current assignments resolved to indices, as submitted.
    pub fn initial_slots(&self) -> Result<Vec<Slot>, ValidationError> {
        let mut slots = Vec::with_capacity(self.tt.lessons.len());
        for lesson in &self.tt.lessons {
            let timeslot = match lesson.timeslot {
                None => None,
                Some(id) => Some(self.ts_index.get(&id).copied().ok_or_else(|| {
                    ValidationError::Msg(format!(
                        "lesson {} is assigned to missing timeslot {id}",
                        lesson.id
                    ))
                })?),
            };
            let room = match lesson.room {
                None => None,
                Some(id) => Some(self.room_index.get(&id).copied().ok_or_else(|| {
                    ValidationError::Msg(format!(
                        "lesson {} is assigned to missing room {id}",
                        lesson.id
                    ))
                })?),
            };
            slots.push(Slot { timeslot, room });
        }
        Ok(slots)
    }

    /// Writes a slot vector back onto a copy of the aggregate's lessons.
    pub fn lessons_with_slots(&self, slots: &[Slot]) -> Vec<Lesson> {
        self.tt
            .lessons
            .iter()
            .enumerate()
            .map(|(i, lesson)| {
                let mut out = lesson.clone();
                out.timeslot = slots[i].timeslot.map(|t| self.timeslot(t).id);
                out.room = slots[i].room.map(|r| self.room(r).id);
                out
            })
            .collect()
    }
}

#[derive(Default)]
struct Interner {
    by_name: HashMap<String, u32>,
}

impl Interner {
    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.by_name.len() as u32;
        self.by_name.insert(name.to_owned(), id);
        id
    }
}
