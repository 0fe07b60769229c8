//! Nail bookkeeping
//!
//! Nails are keyed by the id the drawing client chose. The first registration
//! for an id resolves its collision category and group number; any later
//! registration for the same id gets the original assignment back.

use crate::category_pool::CategoryPool;
use crate::error::AllocationError;
use shared::{Category, GroupNumber, Vec2};
use std::collections::HashMap;

/// Hands out group numbers -1, -2, -3, ... and never repeats one
#[derive(Debug, Clone)]
pub struct GroupAllocator {
    next: GroupNumber,
}

impl GroupAllocator {
    pub fn new() -> Self {
        Self { next: -1 }
    }

    /// Returns the current counter value and moves the counter down by one
    pub fn next(&mut self) -> Result<GroupNumber, AllocationError> {
        let group = self.next;
        self.next = self
            .next
            .checked_sub(1)
            .ok_or(AllocationError::GroupNumbersExhausted)?;
        Ok(group)
    }
}

impl Default for GroupAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Collision filter resolved for a nail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub category: Category,
    pub group: GroupNumber,
}

/// Outcome of `NailRegistry::register_or_create`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created(Assignment),
    /// The id was already registered; carries the original assignment.
    AlreadyExists(Assignment),
}

impl Registration {
    pub fn assignment(&self) -> Assignment {
        match self {
            Registration::Created(assignment) | Registration::AlreadyExists(assignment) => {
                *assignment
            }
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Registration::Created(_))
    }
}

/// What a client supplies when placing a nail
#[derive(Debug, Clone, PartialEq)]
pub struct NailSpec {
    pub id: String,
    pub center: Vec2,
    pub radius: f32,
    pub target_body: Option<String>,
    pub category: Option<Category>,
    pub group: Option<GroupNumber>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Nail {
    pub id: String,
    pub center: Vec2,
    pub radius: f32,
    pub target_body: Option<String>,
    pub assignment: Assignment,
}

#[derive(Debug, Clone, Default)]
pub struct NailRegistry {
    nails: HashMap<String, Nail>,
    groups: GroupAllocator,
}

impl NailRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a nail, or returns the assignment of the one already stored
    ///
    /// Missing category/group values are taken from `pool` and the group
    /// counter. When the pool is exhausted nothing is stored and the pool is
    /// left untouched.
    pub fn register_or_create(
        &mut self,
        pool: &mut CategoryPool,
        request: NailSpec,
    ) -> Result<Registration, AllocationError> {
        if let Some(existing) = self.nails.get(&request.id) {
            return Ok(Registration::AlreadyExists(existing.assignment));
        }

        let category = match request.category {
            Some(category) => category,
            None => pool
                .acquire()
                .ok_or(AllocationError::CategoryPoolExhausted)?,
        };

        let group = match request.group {
            Some(group) => group,
            None => match self.groups.next() {
                Ok(group) => group,
                Err(e) => {
                    if request.category.is_none() {
                        pool.release(category);
                    }
                    return Err(e);
                }
            },
        };

        let assignment = Assignment { category, group };
        self.nails.insert(
            request.id.clone(),
            Nail {
                id: request.id,
                center: request.center,
                radius: request.radius,
                target_body: request.target_body,
                assignment,
            },
        );

        Ok(Registration::Created(assignment))
    }

    /// Deletes a nail. Its category stays assigned until explicitly released.
    pub fn remove(&mut self, id: &str) -> Option<Nail> {
        self.nails.remove(id)
    }

    pub fn clear(&mut self) {
        self.nails.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Nail> {
        self.nails.get(id)
    }

    pub fn len(&self) -> usize {
        self.nails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nails.is_empty()
    }
}
