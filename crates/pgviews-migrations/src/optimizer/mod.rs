//! Folding view operations that cancel out or supersede each other

use crate::{Reduction, ViewOperation};

#[cfg(test)]
mod tests;

/// Reduce `operations` to an equivalent, shorter list.
///
/// Each operation is compared with the ones after it. When a pair reduces,
/// it is replaced in place, provided every operation in between is about
/// another view. Passes repeat until nothing changes, so optimizing an
/// already optimized list returns it unchanged.
pub fn optimize(operations: &[ViewOperation]) -> Vec<ViewOperation> {
    let mut current = operations.to_vec();
    loop {
        let next = optimize_pass(&current);
        if next == current {
            return next;
        }
        tracing::trace!(before = current.len(), after = next.len(), "folded view operations");
        current = next;
    }
}

fn optimize_pass(operations: &[ViewOperation]) -> Vec<ViewOperation> {
    for (index, operation) in operations.iter().enumerate() {
        for (offset, other) in operations[index + 1..].iter().enumerate() {
            match operation.reduce(other) {
                Reduction::Independent => continue,
                Reduction::Blocked => break,
                Reduction::Replace(replacement) => {
                    let later = index + 1 + offset;
                    let mut reduced = Vec::with_capacity(operations.len());
                    reduced.extend_from_slice(&operations[..index]);
                    reduced.extend_from_slice(&operations[index + 1..later]);
                    reduced.extend(replacement);
                    reduced.extend_from_slice(&operations[later + 1..]);
                    return reduced;
                }
            }
        }
    }
    operations.to_vec()
}
