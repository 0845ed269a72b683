use crate::error::{GenerateError, Result};
use rand::Rng;

/// Picks a dimension uniformly from `[base - base / 2, base + base / 2]`.
///
/// Width and height are drawn by separate calls, so outputs are generally
/// not square even when the base is.
pub fn randomize<R: Rng + ?Sized>(rng: &mut R, base: u32) -> Result<u32> {
    if base == 0 {
        return Err(GenerateError::config("base dimension must be at least 1"));
    }

    let (min, max) = bounds(base);
    let max = u32::try_from(max).map_err(|_| {
        GenerateError::config(format!("base dimension {} is too large", base))
    })?;

    Ok(rng.gen_range(min..=max))
}

fn bounds(base: u32) -> (u32, u64) {
    let half = base / 2;
    (base - half, base as u64 + half as u64)
}
