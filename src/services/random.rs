//! Uniform random selection backed by the OS random source

use anyhow::{anyhow, Result};
use getrandom::fill;

/// Uniform index in `0..bound` (`bound` must be non-zero).
fn index_below(bound: usize) -> Result<usize> {
    let bound = bound as u64;
    // Largest multiple of `bound` representable; values above it would bias
    // the modulo toward small indices.
    let zone = u64::MAX - (u64::MAX % bound);

    loop {
        let mut buf = [0u8; 8];
        fill(&mut buf).map_err(|e| anyhow!("Failed to read random bytes: {}", e))?;
        let value = u64::from_le_bytes(buf);
        if value < zone {
            return Ok((value % bound) as usize);
        }
    }
}

/// Return `items` untouched when it holds at most `max` entries, otherwise
/// exactly `max` entries drawn uniformly without replacement.
pub fn sample<T>(mut items: Vec<T>, max: usize) -> Result<Vec<T>> {
    if items.len() <= max {
        return Ok(items);
    }

    // Partial Fisher-Yates: the first `max` slots end up a uniform sample.
    let len = items.len();
    for i in 0..max {
        let j = i + index_below(len - i)?;
        items.swap(i, j);
    }
    items.truncate(max);

    Ok(items)
}

/// One uniformly chosen entry, or `None` for an empty input.
pub fn choose<T>(mut items: Vec<T>) -> Result<Option<T>> {
    if items.is_empty() {
        return Ok(None);
    }
    let index = index_below(items.len())?;
    Ok(Some(items.swap_remove(index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_choose_empty_is_none() {
        assert_eq!(choose(Vec::<i32>::new()).unwrap(), None);
    }

    #[test]
    fn test_choose_single() {
        assert_eq!(choose(vec![7]).unwrap(), Some(7));
    }

    #[test]
    fn test_sample_reaches_every_item() {
        let mut seen = HashSet::new();
        for _ in 0..500 {
            seen.extend(sample((0..5).collect(), 1).unwrap());
        }
        assert_eq!(seen.len(), 5);
    }

    proptest! {
        #[test]
        fn sample_small_input_is_unchanged(items in prop::collection::vec(any::<u16>(), 0..20), extra in 0usize..5) {
            let max = items.len() + extra;
            prop_assert_eq!(sample(items.clone(), max).unwrap(), items);
        }

        #[test]
        fn sample_large_input_is_exact_subset(len in 1usize..60, max in 0usize..30) {
            prop_assume!(max < len);
            let items: Vec<usize> = (0..len).collect();
            let picked = sample(items, max).unwrap();

            prop_assert_eq!(picked.len(), max);
            let unique: HashSet<_> = picked.iter().copied().collect();
            prop_assert_eq!(unique.len(), max);
            prop_assert!(picked.iter().all(|&i| i < len));
        }
    }
}
