use ndarray::{Array1, ArrayView1};

use crate::{CoordinatorErr, Result};

/// The unweighted parameter-wise arithmetic mean of `updates`.
///
/// Every update counts the same regardless of how much data produced it.
///
/// # Errors
/// `SizeMismatch` if the updates don't all have the same length.
pub fn mean<P: AsRef<[f32]>>(updates: &[P]) -> Result<Vec<f32>> {
    let Some(first) = updates.first() else {
        return Ok(Vec::new());
    };

    let expected = first.as_ref().len();
    let mut acc = Array1::<f32>::zeros(expected);

    for update in updates {
        let update = update.as_ref();

        if update.len() != expected {
            return Err(CoordinatorErr::SizeMismatch {
                got: update.len(),
                expected,
            });
        }

        acc += &ArrayView1::from(update);
    }

    acc /= updates.len() as f32;
    Ok(acc.to_vec())
}
