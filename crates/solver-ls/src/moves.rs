//! Move shapes, the sport-category filter and the strength orderings that
//! drive construction and candidate ranking.

use timetable_core::plan::Plan;
use types::LessonType;

/// The planning entity's fixed, enumerable set of decision slots. Move
/// generation iterates this list and asks each slot for its value domain,
/// so no per-entity metadata or reflection is involved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionSlot {
    Timeslot,
    Room,
}

impl DecisionSlot {
    pub const ALL: [DecisionSlot; 2] = [DecisionSlot::Timeslot, DecisionSlot::Room];

    /// Size of the value domain this slot draws from.
    pub fn domain_size(self, plan: &Plan) -> u32 {
        match self {
            DecisionSlot::Timeslot => plan.timeslot_count() as u32,
            DecisionSlot::Room => plan.room_count() as u32,
        }
    }
}

/// An atomic mutation of one or two lessons' decision slots. A change move
/// reassigns one slot of one lesson (the untouched slot is carried along);
/// a swap exchanges both slots between two lessons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Move {
    Change {
        lesson: u32,
        timeslot: u32,
        room: u32,
    },
    Swap {
        a: u32,
        b: u32,
    },
}

const SPORT_SUBJECTS: [&str; 4] = [
    "sport",
    "educatie fizica",
    "educație fizică",
    "physical education",
];
const SPORT_ROOMS: [&str; 3] = ["sala de sport", "gym", "sports hall"];

pub fn is_sport_subject(subject: &str) -> bool {
    let lower = subject.to_lowercase();
    lower == "pe" || SPORT_SUBJECTS.iter().any(|k| lower.contains(k))
}

pub fn is_sport_room(name: &str) -> bool {
    let lower = name.to_lowercase();
    SPORT_ROOMS.iter().any(|k| lower.contains(k))
}

/// Category filter: physical-education lessons only ever occupy sports
/// rooms. Matching is precomputed once per solve session.
pub struct SportFilter {
    lesson_is_sport: Vec<bool>,
    room_is_sport: Vec<bool>,
}

impl SportFilter {
    pub fn new(plan: &Plan) -> Self {
        let lesson_is_sport = (0..plan.lesson_count() as u32)
            .map(|l| is_sport_subject(&plan.lesson(l).subject))
            .collect();
        let room_is_sport = (0..plan.room_count() as u32)
            .map(|r| is_sport_room(&plan.room(r).name))
            .collect();
        Self {
            lesson_is_sport,
            room_is_sport,
        }
    }

    pub fn admits_room(&self, lesson: u32, room: u32) -> bool {
        !self.lesson_is_sport[lesson as usize] || self.room_is_sport[room as usize]
    }

    /// A swap hands each lesson the other's room, so both sides must end up
    /// admissible (trivially true when both lessons are non-sport).
    pub fn admits_swap(&self, a: u32, room_of_a: u32, b: u32, room_of_b: u32) -> bool {
        self.admits_room(a, room_of_b) && self.admits_room(b, room_of_a)
    }
}

fn type_rank(ty: LessonType) -> u8 {
    match ty {
        LessonType::Project => 1,
        LessonType::Laboratory => 2,
        LessonType::Seminar => 3,
        LessonType::Course => 4,
    }
}

/// Difficulty key of a lesson; bigger keys are harder to place.
fn lesson_strength(plan: &Plan, lesson: u32) -> (u32, u8, usize, u32, u64) {
    (
        plan.lesson(lesson).duration_hours,
        type_rank(plan.lesson_type_of(lesson)),
        plan.teacher(plan.teacher_of(lesson)).preferred_windows.len(),
        plan.student_count_of(lesson),
        plan.lesson(lesson).id.0,
    )
}

/// Lessons in construction order: hardest to place first.
pub fn construction_order(plan: &Plan) -> Vec<u32> {
    let mut order: Vec<u32> = (0..plan.lesson_count() as u32).collect();
    order.sort_by_key(|&l| std::cmp::Reverse(lesson_strength(plan, l)));
    order
}

/// The (timeslot, room) candidate domain in ascending strength order, so
/// ties during construction resolve toward the weakest values: short slots
/// and small rooms are used up before long slots and big rooms.
pub fn domain_pairs(plan: &Plan) -> Vec<(u32, u32)> {
    let mut timeslots: Vec<u32> = (0..plan.timeslot_count() as u32).collect();
    timeslots.sort_by_key(|&t| {
        let ts = plan.timeslot(t);
        (ts.duration_hours(), ts.id.0)
    });
    let mut rooms: Vec<u32> = (0..plan.room_count() as u32).collect();
    rooms.sort_by_key(|&r| {
        let room = plan.room(r);
        (room.capacity, room.id.0)
    });

    let mut pairs = Vec::with_capacity(timeslots.len() * rooms.len());
    for &t in &timeslots {
        for &r in &rooms {
            pairs.push((t, r));
        }
    }
    pairs
}
