//! Parent selection schemes.
//!
//! Every scheme reads a fully evaluated [`ScoreCache`] and returns one parent
//! slot per population slot. The first `unmutated` parents in the outcome are
//! elite copies that must skip mutation.

use oxello_evaluator::{ScoreCache, TestCaseSet};
use rand::Rng;
use rand::seq::{IndexedRandom as _, SliceRandom as _};

/// Number of game-round phases for a case set.
#[must_use]
pub fn phase_count(max_round: usize, phase_len: usize) -> usize {
    (max_round / phase_len.max(1)).max(1)
}

/// Maps a game round onto a phase, clamping past-the-end rounds to the last
/// phase.
#[must_use]
pub fn phase_for_round(round: usize, max_round: usize, phase_len: usize) -> usize {
    (round / phase_len.max(1)).min(phase_count(max_round, phase_len) - 1)
}

/// The parents chosen for one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOutcome {
    /// One parent slot per offspring, elites first.
    pub parents: Vec<usize>,
    /// How many leading parents are elite copies exempt from mutation.
    pub unmutated: usize,
}

pub trait SelectionScheme {
    /// Picks one parent per population slot from an evaluated cache.
    fn select<R: Rng + ?Sized>(
        &mut self,
        cache: &ScoreCache,
        cases: &TestCaseSet,
        rng: &mut R,
    ) -> SelectionOutcome;
}

fn totals(cache: &ScoreCache) -> Vec<f64> {
    (0..cache.num_slots())
        .map(|slot| cache.total(slot).unwrap_or(f64::NEG_INFINITY))
        .collect()
}

/// Picks the best of `size` uniformly drawn slots. Draws are with
/// replacement; the incumbent wins ties.
pub fn tournament_select<R: Rng + ?Sized>(fitness: &[f64], size: usize, rng: &mut R) -> usize {
    let mut best = rng.random_range(0..fitness.len());
    for _ in 1..size.max(1) {
        let challenger = rng.random_range(0..fitness.len());
        if fitness[challenger] > fitness[best] {
            best = challenger;
        }
    }
    best
}

/// Classic tournament selection with optional elitism.
#[derive(Debug, Clone)]
pub struct TournamentSelection {
    pub tournament_size: usize,
    pub elite_count: usize,
}

impl SelectionScheme for TournamentSelection {
    fn select<R: Rng + ?Sized>(
        &mut self,
        cache: &ScoreCache,
        _cases: &TestCaseSet,
        rng: &mut R,
    ) -> SelectionOutcome {
        let fitness = totals(cache);
        let mut ranked: Vec<usize> = (0..fitness.len()).collect();
        ranked.sort_by(|&a, &b| fitness[b].total_cmp(&fitness[a]));

        let elites = self.elite_count.min(fitness.len());
        let mut parents: Vec<usize> = ranked[..elites].to_vec();
        while parents.len() < fitness.len() {
            parents.push(tournament_select(&fitness, self.tournament_size, rng));
        }
        SelectionOutcome {
            parents,
            unmutated: elites,
        }
    }
}

/// Lexicase selection: each pick filters the population through the test
/// cases in a fresh random order, keeping only the slots tied for the best
/// score on each case.
#[derive(Debug, Clone, Default)]
pub struct LexicaseSelection;

impl LexicaseSelection {
    fn pick<R: Rng + ?Sized>(
        cache: &ScoreCache,
        case_order: &mut Vec<usize>,
        rng: &mut R,
    ) -> usize {
        case_order.shuffle(rng);
        let mut candidates: Vec<usize> = (0..cache.num_slots()).collect();
        for &case in case_order.iter() {
            if candidates.len() <= 1 {
                break;
            }
            let best = candidates
                .iter()
                .map(|&slot| cache.case_score(slot, case).unwrap_or(f64::NEG_INFINITY))
                .fold(f64::NEG_INFINITY, f64::max);
            candidates.retain(|&slot| {
                cache.case_score(slot, case).unwrap_or(f64::NEG_INFINITY) == best
            });
        }
        *candidates.choose(rng).unwrap_or(&0)
    }
}

impl SelectionScheme for LexicaseSelection {
    fn select<R: Rng + ?Sized>(
        &mut self,
        cache: &ScoreCache,
        _cases: &TestCaseSet,
        rng: &mut R,
    ) -> SelectionOutcome {
        let mut case_order: Vec<usize> = (0..cache.num_cases()).collect();
        let parents = (0..cache.num_slots())
            .map(|_| Self::pick(cache, &mut case_order, rng))
            .collect();
        SelectionOutcome {
            parents,
            unmutated: 0,
        }
    }
}

/// Tournament selection over resource-weighted fitness.
///
/// Each game-round phase holds a depletable resource. Slots that score well
/// in a phase earn a fitness bonus proportional to that phase's current
/// resource level, and each picked winner consumes from the phases it drew
/// its bonus from. Resources replenish once per generation up to a fixed
/// capacity, so crowded phases pay out less and selection pressure spreads
/// across the game.
#[derive(Debug, Clone)]
pub struct EcoSelection {
    pub tournament_size: usize,
    pub phase_len: usize,
    pub max_round: usize,
    /// Bonus per unit of positive phase score at full resource level.
    pub bonus_scale: f64,
    /// Fraction of a winner's positive phase score drained from the phase.
    pub consume_frac: f64,
    /// Resource added to each phase per generation.
    pub inflow: f64,
    /// Resource ceiling per phase.
    pub capacity: f64,
    resources: Vec<f64>,
}

impl EcoSelection {
    #[must_use]
    pub fn new(tournament_size: usize, phase_len: usize, max_round: usize) -> Self {
        Self {
            tournament_size,
            phase_len,
            max_round,
            bonus_scale: 1.0,
            consume_frac: 0.0025,
            inflow: 25.0,
            capacity: 100.0,
            resources: vec![0.0; phase_count(max_round, phase_len)],
        }
    }

    #[must_use]
    pub fn resources(&self) -> &[f64] {
        &self.resources
    }

    /// Positive score earned per phase, one row per slot.
    fn phase_sums(&self, cache: &ScoreCache, cases: &TestCaseSet) -> Vec<Vec<f64>> {
        let phases = self.resources.len();
        (0..cache.num_slots())
            .map(|slot| {
                let mut sums = vec![0.0; phases];
                for (case, info) in cases.iter().enumerate() {
                    let phase = phase_for_round(info.round, self.max_round, self.phase_len);
                    let score = cache.case_score(slot, case).unwrap_or(0.0);
                    sums[phase] += score.max(0.0);
                }
                sums
            })
            .collect()
    }
}

impl SelectionScheme for EcoSelection {
    fn select<R: Rng + ?Sized>(
        &mut self,
        cache: &ScoreCache,
        cases: &TestCaseSet,
        rng: &mut R,
    ) -> SelectionOutcome {
        for level in &mut self.resources {
            *level = (*level + self.inflow).min(self.capacity);
        }
        let base = totals(cache);
        let phase_sums = self.phase_sums(cache, cases);

        let mut parents = Vec::with_capacity(base.len());
        for _ in 0..base.len() {
            let adjusted: Vec<f64> = (0..base.len())
                .map(|slot| {
                    let bonus: f64 = phase_sums[slot]
                        .iter()
                        .zip(&self.resources)
                        .map(|(sum, level)| sum * self.bonus_scale * (level / self.capacity))
                        .sum();
                    base[slot] + bonus
                })
                .collect();
            let winner = tournament_select(&adjusted, self.tournament_size, rng);
            for (level, sum) in self.resources.iter_mut().zip(&phase_sums[winner]) {
                *level = (*level - self.consume_frac * sum).max(0.0);
            }
            parents.push(winner);
        }
        SelectionOutcome {
            parents,
            unmutated: 0,
        }
    }
}

/// Fitness-proportionate selection. Totals are shifted so the weakest slot
/// still has weight 1 when any total is negative.
#[derive(Debug, Clone, Default)]
pub struct RouletteSelection;

impl SelectionScheme for RouletteSelection {
    fn select<R: Rng + ?Sized>(
        &mut self,
        cache: &ScoreCache,
        _cases: &TestCaseSet,
        rng: &mut R,
    ) -> SelectionOutcome {
        let fitness = totals(cache);
        let min = fitness.iter().copied().fold(f64::INFINITY, f64::min);
        let shift = if min < 0.0 { 1.0 - min } else { 0.0 };
        let weights: Vec<f64> = fitness.iter().map(|&f| f + shift).collect();
        let sum: f64 = weights.iter().sum();

        let parents = (0..fitness.len())
            .map(|_| {
                if sum <= 0.0 {
                    return rng.random_range(0..fitness.len());
                }
                let mut target = rng.random_range(0.0..sum);
                for (slot, &weight) in weights.iter().enumerate() {
                    if target < weight {
                        return slot;
                    }
                    target -= weight;
                }
                fitness.len() - 1
            })
            .collect();
        SelectionOutcome {
            parents,
            unmutated: 0,
        }
    }
}
