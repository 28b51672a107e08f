// src/utils/parallel.rs
//! Ordered fan-out of independent CPU-bound work.
//!
//! Hashing and signing a handful of credential fields (or checking a handful
//! of rule signatures) are independent computations; only the final array
//! assembly is ordered. Results come back in input order.

use rayon::prelude::*;

/// Applies `f` to every item on the rayon pool, returning results in input order.
///
/// Single-item inputs run inline.
pub fn map_ordered<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if items.len() <= 1 {
        return items.iter().map(f).collect();
    }
    items.par_iter().map(f).collect()
}
