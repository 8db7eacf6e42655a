use serde::{Deserialize, Serialize};

use super::CourseId;

/// Course with a fixed number of seats.
///
/// ## Invariant
/// `0 <= current_enrollment <= capacity`. The mutators below cannot break it;
/// the store only lets the critical section persist a mutated course.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    id: CourseId,
    name: String,
    capacity: u32,
    current_enrollment: u32,
}

impl Course {
    /// Creates an empty course.
    pub fn new(id: CourseId, name: impl Into<String>, capacity: u32) -> Self {
        Self {
            id,
            name: name.into(),
            capacity,
            current_enrollment: 0,
        }
    }

    pub fn id(&self) -> CourseId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn current_enrollment(&self) -> u32 {
        self.current_enrollment
    }

    /// Seats left.
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.current_enrollment)
    }

    /// True once every seat is taken.
    pub fn is_full(&self) -> bool {
        self.current_enrollment >= self.capacity
    }

    /// Takes a seat if one is left; returns whether it did.
    pub fn enroll(&mut self) -> bool {
        if self.is_full() {
            return false;
        }
        self.current_enrollment += 1;
        true
    }

    /// Gives a seat back (never below zero).
    pub fn cancel(&mut self) {
        self.current_enrollment = self.current_enrollment.saturating_sub(1);
    }
}
