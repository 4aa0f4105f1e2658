//! Weighted reward selection
//!
//! Shared by case openings and battle rolls. Randomness is always injected
//! so callers can script outcomes in tests.

use crate::errors::{HazardError, HazardResult};
use crate::games::types::CaseItem;
use rand::{Rng, RngCore};

/// Anything with a non-negative selection weight
pub trait Weighted {
    fn weight(&self) -> f64;
}

impl Weighted for CaseItem {
    fn weight(&self) -> f64 {
        self.chance
    }
}

/// Draw `n` items independently, with replacement.
///
/// A uniform point in `[0, total)` selects the first item whose cumulative
/// weight exceeds it, so zero-weight items are never chosen.
pub fn draw<'a, T: Weighted>(
    items: &'a [T],
    n: usize,
    rng: &mut dyn RngCore,
) -> HazardResult<Vec<&'a T>> {
    let total: f64 = items.iter().map(|item| item.weight().max(0.0)).sum();
    if items.is_empty() || !(total > 0.0) || !total.is_finite() {
        return Err(HazardError::Integrity(format!(
            "cannot draw from {} items with total weight {}",
            items.len(),
            total
        )));
    }

    let mut drawn = Vec::with_capacity(n);
    for _ in 0..n {
        let point = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        let picked = items.iter().find(|item| {
            cumulative += item.weight().max(0.0);
            point < cumulative
        });
        match picked {
            Some(item) => drawn.push(item),
            None => {
                return Err(HazardError::Integrity(format!(
                    "no item selected for point {} of {}",
                    point, total
                )))
            }
        }
    }
    Ok(drawn)
}

/// Uniform index in `0..len`
pub fn pick_index(rng: &mut dyn RngCore, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    ((rng.gen::<f64>() * len as f64) as usize).min(len - 1)
}
