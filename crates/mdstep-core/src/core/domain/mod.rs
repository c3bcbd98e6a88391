//! Cross-domain reduction.
//!
//! A simulation may be split across several spatial domains, each owning a disjoint subset
//! of the particles. Components that produce global quantities sum their local partial
//! values through a [`Communicator`]. The decomposition itself is an external concern; this
//! module only defines the reduction contract plus two implementations: [`SingleDomain`],
//! where every reduction is the identity, and [`LocalDomains`], which connects domains
//! running on threads of one process.

mod local;

pub use local::{LocalDomain, LocalDomains};

/// Blocking collective reductions across all domains of a simulation.
///
/// Every domain must call each collective in the same order with slices of equal length;
/// the calls return once all domains have contributed.
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;

    fn num_domains(&self) -> usize;

    /// Replaces each element with its sum over all domains.
    fn all_reduce_sum(&self, values: &mut [f64]);

    fn is_distributed(&self) -> bool {
        self.num_domains() > 1
    }

    fn all_reduce_count(&self, count: u64) -> u64 {
        let mut value = [count as f64];
        self.all_reduce_sum(&mut value);
        value[0].round() as u64
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SingleDomain;

impl Communicator for SingleDomain {
    fn rank(&self) -> usize {
        0
    }

    fn num_domains(&self) -> usize {
        1
    }

    fn all_reduce_sum(&self, _values: &mut [f64]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_domain_reduction_is_identity() {
        let comm = SingleDomain;
        let mut values = [1.5, -2.0];
        comm.all_reduce_sum(&mut values);
        assert_eq!(values, [1.5, -2.0]);
        assert_eq!(comm.all_reduce_count(7), 7);
        assert!(!comm.is_distributed());
    }
}
