//! The generation loop: evaluate, select, reproduce.

use oxello_engine::BoardCache;
use oxello_evaluator::{MoveEvaluator, ScoreCache, ScoreValues, TestCaseSet};
use oxello_stats::descriptive::DescriptiveStats;
use oxello_vm::{HardwareLimits, MutationParams, ProgramRep};
use rand::SeedableRng as _;
use rand_pcg::Pcg64Mcg;

use crate::{
    EcoSelection, LexicaseSelection, Population, RouletteSelection, SelectionOutcome,
    SelectionScheme, TournamentSelection,
};

/// Which parent-selection scheme a run uses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::FromStr,
)]
pub enum SelectionMethod {
    Tournament,
    Lexicase,
    Eco,
    Roulette,
}

/// Knobs for one training run.
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub pop_size: usize,
    pub selection: SelectionMethod,
    pub tournament_size: usize,
    pub elite_count: usize,
    pub step_budget: usize,
    pub sandbox_count: usize,
    /// Game rounds per eco phase.
    pub phase_len: usize,
    /// Largest game round the eco phase partition covers. An experiment
    /// parameter, not derived from the loaded cases, so the bucket count is
    /// stable across datasets.
    pub max_round: usize,
    pub score_values: ScoreValues,
    pub mutation: MutationParams,
    pub limits: HardwareLimits,
    pub seed: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            pop_size: 1000,
            selection: SelectionMethod::Tournament,
            tournament_size: 4,
            elite_count: 1,
            step_budget: oxello_evaluator::DEFAULT_STEP_BUDGET,
            sandbox_count: 1,
            phase_len: 10,
            max_round: 60,
            score_values: ScoreValues::default(),
            mutation: MutationParams::default(),
            limits: HardwareLimits::default(),
            seed: 0,
        }
    }
}

/// Fitness snapshot of one evaluated generation.
#[derive(Debug, Clone)]
pub struct GenerationSummary {
    pub generation: usize,
    pub best_slot: usize,
    pub best_total: f64,
    pub fitness: DescriptiveStats,
}

enum Selector {
    Tournament(TournamentSelection),
    Lexicase(LexicaseSelection),
    Eco(EcoSelection),
    Roulette(RouletteSelection),
}

impl Selector {
    fn select(
        &mut self,
        cache: &ScoreCache,
        cases: &TestCaseSet,
        rng: &mut Pcg64Mcg,
    ) -> SelectionOutcome {
        match self {
            Self::Tournament(scheme) => scheme.select(cache, cases, rng),
            Self::Lexicase(scheme) => scheme.select(cache, cases, rng),
            Self::Eco(scheme) => scheme.select(cache, cases, rng),
            Self::Roulette(scheme) => scheme.select(cache, cases, rng),
        }
    }
}

/// A whole training run: population, shared caches, and the RNG that makes it
/// reproducible.
///
/// Drive it by alternating [`Experiment::evaluate`] and
/// [`Experiment::advance`]; the summary returned by `evaluate` describes the
/// current generation before it turns over.
pub struct Experiment<P: ProgramRep> {
    config: ExperimentConfig,
    rng: Pcg64Mcg,
    cases: TestCaseSet,
    board_cache: BoardCache,
    score_cache: ScoreCache,
    population: Population<P>,
    evaluator: MoveEvaluator<P::Hardware>,
    selector: Selector,
}

impl<P: ProgramRep> Experiment<P> {
    #[must_use]
    pub fn new(config: ExperimentConfig, cases: TestCaseSet, founder: P) -> Self {
        let hardware = founder.boot(&config.limits);
        let evaluator = MoveEvaluator::new(hardware, config.sandbox_count, config.step_budget);
        let population = Population::spawn(founder, config.pop_size);
        let score_cache = ScoreCache::new(population.len(), cases.len());
        let selector = match config.selection {
            SelectionMethod::Tournament => Selector::Tournament(TournamentSelection {
                tournament_size: config.tournament_size,
                elite_count: config.elite_count,
            }),
            SelectionMethod::Lexicase => Selector::Lexicase(LexicaseSelection),
            SelectionMethod::Eco => Selector::Eco(EcoSelection::new(
                config.tournament_size,
                config.phase_len,
                config.max_round,
            )),
            SelectionMethod::Roulette => Selector::Roulette(RouletteSelection),
        };
        let rng = Pcg64Mcg::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            cases,
            board_cache: BoardCache::new(),
            score_cache,
            population,
            evaluator,
            selector,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    #[must_use]
    pub fn population(&self) -> &Population<P> {
        &self.population
    }

    #[must_use]
    pub fn cases(&self) -> &TestCaseSet {
        &self.cases
    }

    #[must_use]
    pub fn board_cache(&self) -> &BoardCache {
        &self.board_cache
    }

    /// Scores every slot on every case and summarizes the generation.
    pub fn evaluate(&mut self) -> GenerationSummary {
        let Self {
            config,
            cases,
            board_cache,
            score_cache,
            population,
            evaluator,
            ..
        } = self;
        for slot in 0..population.len() {
            population.members()[slot].load_into(evaluator.hardware_mut());
            score_cache.evaluate(slot, |case| {
                cases.get(case).map_or(0.0, |case| {
                    evaluator.evaluate_and_score(board_cache, case, &config.score_values)
                })
            });
        }

        let totals: Vec<f64> = (0..population.len())
            .map(|slot| score_cache.total(slot).unwrap_or(f64::NEG_INFINITY))
            .collect();
        let (best_slot, best_total) = totals
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map_or((0, 0.0), |(slot, &total)| (slot, total));
        GenerationSummary {
            generation: population.generation(),
            best_slot,
            best_total,
            fitness: DescriptiveStats::new(totals)
                .unwrap_or_else(|| DescriptiveStats::new([0.0]).unwrap()),
        }
    }

    /// The slot with the highest total this generation, if evaluated.
    #[must_use]
    pub fn best_program(&self) -> &P {
        let best = (0..self.population.len())
            .max_by(|&a, &b| {
                let a = self.score_cache.total(a).unwrap_or(f64::NEG_INFINITY);
                let b = self.score_cache.total(b).unwrap_or(f64::NEG_INFINITY);
                a.total_cmp(&b)
            })
            .unwrap_or(0);
        &self.population.members()[best]
    }

    /// Selects parents, breeds the next generation, and invalidates the
    /// per-generation score cache. Call after [`Experiment::evaluate`].
    pub fn advance(&mut self) {
        let outcome = self
            .selector
            .select(&self.score_cache, &self.cases, &mut self.rng);
        let mut children = Vec::with_capacity(outcome.parents.len());
        for (index, &parent) in outcome.parents.iter().enumerate() {
            let mut child = self.population.members()[parent].clone();
            if index >= outcome.unmutated {
                child.mutate(&self.config.mutation, &mut self.rng);
            }
            children.push(child);
        }
        for child in children {
            self.population.queue_offspring(child);
        }
        self.population.update();
        self.score_cache.clear_all();
    }
}
