//! Chronological scheduling of moments
//!
//! Moments are held in a stack sorted so that `pop()` hands them out in
//! processing order. Ties on the same date are broken, in order:
//!
//! 1. the `Cash` subject first
//! 2. `AssetStart` moments before all others, so same-day flows see the
//!    seeded value
//! 3. asset growth and tracking moments after non-asset moments
//! 4. `CrystallizedPension…` subjects first
//! 5. name, then type tag
//!
//! Moments identical in date, name and type cannot be ordered; they compare
//! equal and stay in their generated order.

use std::cmp::Ordering;

use crate::model::{
    Moment, MomentKind,
    tokens::{CASH, CRYSTALLIZED_PENSION},
};

/// `Less` when `a` must be processed before `b`
pub fn processing_order(a: &Moment, b: &Moment) -> Ordering {
    let ordering = a
        .date
        .cmp(&b.date)
        .then_with(|| first_when(a.name == CASH, b.name == CASH))
        .then_with(|| {
            first_when(
                a.kind == MomentKind::AssetStart,
                b.kind == MomentKind::AssetStart,
            )
        })
        .then_with(|| first_when(!a.kind.is_generic_asset(), !b.kind.is_generic_asset()))
        .then_with(|| {
            first_when(
                a.name.starts_with(CRYSTALLIZED_PENSION),
                b.name.starts_with(CRYSTALLIZED_PENSION),
            )
        })
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.kind.tag().cmp(b.kind.tag()));

    if ordering == Ordering::Equal {
        tracing::debug!(
            date = %a.date,
            name = %a.name,
            kind = a.kind.tag(),
            "moments cannot be ordered, treating as equal"
        );
    }
    ordering
}

/// `Less` when only `a` has the property
fn first_when(a: bool, b: bool) -> Ordering {
    b.cmp(&a)
}

/// Moments awaiting processing
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    stack: Vec<Moment>,
}

impl Schedule {
    pub fn new(mut moments: Vec<Moment>) -> Self {
        moments.sort_by(|a, b| processing_order(b, a));
        Self { stack: moments }
    }

    pub fn pop(&mut self) -> Option<Moment> {
        self.stack.pop()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

impl Iterator for Schedule {
    type Item = Moment;

    fn next(&mut self) -> Option<Moment> {
        self.pop()
    }
}
