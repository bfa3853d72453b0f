//! Weight rebalancing after convergence.
//!
//! Weights become the observed instance counts divided by their gcd, so
//! traffic follows provisioned capacity independent of its absolute scale.

use crate::pool::backend::BackendPool;

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Recompute weights from current instance counts.
///
/// When every count is 0 the first backend gets weight 1 and the rest 0, so
/// routing stays well-defined.
pub fn rebalance(pool: &BackendPool) -> BackendPool {
    let mut next = pool.clone();
    let g = pool
        .backends
        .iter()
        .fold(0, |acc, b| gcd(acc, b.current_instance_count));

    for backend in &mut next.backends {
        backend.weight = if g == 0 { 0 } else { backend.current_instance_count / g };
    }

    if next.backends.iter().all(|b| b.weight == 0) {
        if let Some(first) = next.backends.first_mut() {
            first.weight = 1;
        }
    }

    tracing::debug!(
        pool = %next.id,
        gcd = g,
        weights = ?next.weights(),
        "Rebalanced pool weights"
    );
    next
}
