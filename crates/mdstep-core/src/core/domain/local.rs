use super::Communicator;
use std::sync::{Arc, Barrier, Mutex, PoisonError};

#[derive(Debug)]
struct Exchange {
    barrier: Barrier,
    slots: Mutex<Vec<Vec<f64>>>,
}

/// A group of in-process domains that reduce through shared memory.
///
/// Each [`LocalDomain`] is handed to the thread that drives one domain. Sums are formed in
/// rank order, so every domain observes bit-identical results.
#[derive(Debug)]
pub struct LocalDomains {
    exchange: Arc<Exchange>,
    num_domains: usize,
}

impl LocalDomains {
    pub fn new(num_domains: usize) -> Self {
        let num_domains = num_domains.max(1);
        Self {
            exchange: Arc::new(Exchange {
                barrier: Barrier::new(num_domains),
                slots: Mutex::new(vec![Vec::new(); num_domains]),
            }),
            num_domains,
        }
    }

    pub fn into_domains(self) -> Vec<LocalDomain> {
        (0..self.num_domains)
            .map(|rank| LocalDomain {
                rank,
                num_domains: self.num_domains,
                exchange: Arc::clone(&self.exchange),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct LocalDomain {
    rank: usize,
    num_domains: usize,
    exchange: Arc<Exchange>,
}

impl Communicator for LocalDomain {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_domains(&self) -> usize {
        self.num_domains
    }

    fn all_reduce_sum(&self, values: &mut [f64]) {
        if self.num_domains == 1 {
            return;
        }
        {
            let mut slots = self
                .exchange
                .slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            slots[self.rank].clear();
            slots[self.rank].extend_from_slice(values);
        }
        self.exchange.barrier.wait();
        {
            let slots = self
                .exchange
                .slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for (i, value) in values.iter_mut().enumerate() {
                *value = slots.iter().map(|slot| slot[i]).sum();
            }
        }
        // Nobody may refill a slot until every domain has read the sums.
        self.exchange.barrier.wait();
    }
}
