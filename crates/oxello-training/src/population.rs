//! Fixed-size population with synchronous generation turnover.

/// A population of programs plus the offspring queued to replace them.
///
/// Slots are stable within a generation; [`Population::update`] swaps the
/// queued offspring in wholesale, so any per-slot state held elsewhere (score
/// caches in particular) must be invalidated at the same time.
#[derive(Debug)]
pub struct Population<P> {
    members: Vec<P>,
    offspring: Vec<P>,
    generation: usize,
}

impl<P: Clone> Population<P> {
    /// Creates a population of `size` clones of `founder`.
    #[must_use]
    pub fn spawn(founder: P, size: usize) -> Self {
        Self {
            members: vec![founder; size.max(1)],
            offspring: Vec::new(),
            generation: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub fn generation(&self) -> usize {
        self.generation
    }

    #[must_use]
    pub fn members(&self) -> &[P] {
        &self.members
    }

    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&P> {
        self.members.get(slot)
    }

    /// Queues a child for the next generation.
    pub fn queue_offspring(&mut self, child: P) {
        self.offspring.push(child);
    }

    #[must_use]
    pub fn queued(&self) -> usize {
        self.offspring.len()
    }

    /// Replaces the population with the queued offspring.
    ///
    /// # Panics
    ///
    /// Panics unless exactly one child was queued per slot.
    pub fn update(&mut self) {
        assert_eq!(
            self.offspring.len(),
            self.members.len(),
            "offspring count must match population size"
        );
        std::mem::swap(&mut self.members, &mut self.offspring);
        self.offspring.clear();
        self.generation += 1;
    }
}
