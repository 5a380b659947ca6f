//! Priority Scheduler: holds the mutable set of descriptors and answers
//! "which service is due next, and when". Priorities are not decrease-keyed;
//! a descriptor's priority value is recomputed at pop time from
//! `last_checked_at`, then the descriptor is popped and later re-pushed by
//! the agent with an updated value. Correct because only one descriptor is
//! live outside the heap at a time per agent.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::Utc;

use crate::config::ServiceDescriptor;

/// A descriptor paired with the priority value it was pushed with. Smaller
/// priority pops first, so this wraps `std::cmp::Reverse`-style ordering
/// around a max-heap (`BinaryHeap` is a max-heap; we invert `Ord`).
struct Entry {
    priority: f64,
    descriptor: ServiceDescriptor,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, but we want the smallest
        // priority value (soonest due) to pop first.
        other
            .priority
            .partial_cmp(&self.priority)
            .unwrap_or(Ordering::Equal)
    }
}

/// Min-heap over descriptors ordered by "seconds until next probe".
pub struct PriorityScheduler {
    heap: BinaryHeap<Entry>,
    size: usize,
}

/// Priority value: seconds until the descriptor is next due. Zero for
/// never-probed descriptors (highest priority).
pub fn priority_value(descriptor: &ServiceDescriptor) -> f64 {
    match descriptor.last_checked_at {
        None => 0.0,
        Some(last) => {
            let elapsed = (Utc::now() - last).num_milliseconds() as f64 / 1000.0;
            descriptor.interval_sec as f64 - elapsed
        }
    }
}

impl PriorityScheduler {
    pub fn new(descriptors: Vec<ServiceDescriptor>) -> Self {
        let size = descriptors.len();
        let heap = descriptors
            .into_iter()
            .map(|descriptor| Entry {
                priority: priority_value(&descriptor),
                descriptor,
            })
            .collect();
        Self { heap, size }
    }

    /// Fixed after construction.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Remove and return the descriptor with the smallest priority value,
    /// alongside that value. Returns `None` only if the scheduler was
    /// constructed with zero descriptors.
    pub fn pop(&mut self) -> Option<(ServiceDescriptor, f64)> {
        self.heap.pop().map(|entry| (entry.descriptor, entry.priority))
    }

    /// Re-insert a descriptor, recomputing its priority from its current
    /// `last_checked_at`.
    pub fn push(&mut self, descriptor: ServiceDescriptor) {
        let priority = priority_value(&descriptor);
        self.heap.push(Entry {
            priority,
            descriptor,
        });
    }
}
