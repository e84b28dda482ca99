//! Fair merge of per-source result lists.

use rand::Rng;

/// Merges labeled sequences so no single source dominates the front.
///
/// Each round visits the non-exhausted groups in label order and takes a
/// batch of one or two items from each, with the batch size drawn from `rng`.
/// Every item appears exactly once and per-group order is preserved.
pub fn interleave<L, T, R>(mut groups: Vec<(L, Vec<T>)>, rng: &mut R) -> Vec<T>
where
    L: Ord,
    R: Rng,
{
    groups.sort_by(|a, b| a.0.cmp(&b.0));

    let total = groups.iter().map(|(_, items)| items.len()).sum();
    let mut cursors: Vec<_> = groups.into_iter().map(|(_, items)| items.into_iter()).collect();
    let mut exhausted = vec![false; cursors.len()];
    let mut merged = Vec::with_capacity(total);

    while exhausted.iter().any(|done| !done) {
        for (cursor, done) in cursors.iter_mut().zip(exhausted.iter_mut()) {
            if *done {
                continue;
            }
            let batch = rng.random_range(1..=2);
            for _ in 0..batch {
                match cursor.next() {
                    Some(item) => merged.push(item),
                    None => {
                        *done = true;
                        break;
                    }
                }
            }
        }
    }

    merged
}
