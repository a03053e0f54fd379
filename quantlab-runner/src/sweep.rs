//! Parameter sweep utilities for grid/random search.
//!
//! A sweep varies the execution-side knobs of one base [`EngineConfig`]
//! over a fixed dataset. Every point is an independent run with its own
//! engine, so points can execute in parallel without sharing state.

use std::sync::atomic::{AtomicBool, Ordering};

use quantlab_core::engine::{DateRange, EngineConfig};
use quantlab_core::fingerprint::RunId;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data_loader::LoadedData;
use crate::runner::{run_with_data, RunError, RunReport};

/// Parameter grid specification.
///
/// Each axis lists the values to try. An empty axis keeps the base config's
/// value for that parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub max_positions: Vec<usize>,
    pub participation_rates: Vec<f64>,
    pub min_order_notionals: Vec<f64>,
    pub commission_rates: Vec<f64>,
}

/// The varied parameters of one grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepParams {
    pub max_positions: usize,
    pub max_participation_rate: f64,
    pub min_order_notional: f64,
    pub commission_rate: f64,
}

impl SweepParams {
    fn of(config: &EngineConfig) -> Self {
        Self {
            max_positions: config.interpreter.max_positions,
            max_participation_rate: config.execution.max_participation_rate,
            min_order_notional: config.interpreter.min_order_notional,
            commission_rate: config.execution.costs.commission_rate,
        }
    }

    fn apply(&self, config: &mut EngineConfig) {
        config.interpreter.max_positions = self.max_positions;
        config.execution.max_participation_rate = self.max_participation_rate;
        config.interpreter.min_order_notional = self.min_order_notional;
        config.execution.costs.commission_rate = self.commission_rate;
    }
}

/// One configuration to run.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPoint {
    pub params: SweepParams,
    pub config: EngineConfig,
}

fn axis<T: Copy>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

impl ParamGrid {
    /// Returns the total number of configurations in this grid.
    pub fn size(&self) -> usize {
        [
            self.max_positions.len(),
            self.participation_rates.len(),
            self.min_order_notionals.len(),
            self.commission_rates.len(),
        ]
        .iter()
        .map(|&n| n.max(1))
        .product()
    }

    /// Generates all configurations in the grid, in axis order
    /// (max_positions outermost, commission innermost).
    pub fn generate_configs(&self, base: &EngineConfig) -> Vec<SweepPoint> {
        let b = SweepParams::of(base);
        let mut points = Vec::with_capacity(self.size());

        for &max_positions in &axis(&self.max_positions, b.max_positions) {
            for &rate in &axis(&self.participation_rates, b.max_participation_rate) {
                for &min_notional in &axis(&self.min_order_notionals, b.min_order_notional) {
                    for &commission in &axis(&self.commission_rates, b.commission_rate) {
                        let params = SweepParams {
                            max_positions,
                            max_participation_rate: rate,
                            min_order_notional: min_notional,
                            commission_rate: commission,
                        };
                        let mut config = base.clone();
                        params.apply(&mut config);
                        points.push(SweepPoint { params, config });
                    }
                }
            }
        }

        points
    }

    /// Seeded random subset of `n` grid points, kept in grid order.
    ///
    /// Returns the full grid when `n` covers it.
    pub fn sample(&self, base: &EngineConfig, n: usize, seed: u64) -> Vec<SweepPoint> {
        let all = self.generate_configs(base);
        if n >= all.len() {
            return all;
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut picked = rand::seq::index::sample(&mut rng, all.len(), n).into_vec();
        picked.sort_unstable();

        let mut all: Vec<Option<SweepPoint>> = all.into_iter().map(Some).collect();
        picked.into_iter().filter_map(|i| all[i].take()).collect()
    }
}

/// Headline numbers of one sweep run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub params: SweepParams,
    pub run_id: RunId,
    pub sharpe: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub num_trades: usize,
    pub final_equity: f64,
}

impl SweepSummary {
    fn of(params: SweepParams, report: &RunReport) -> Self {
        let r = &report.results;
        Self {
            params,
            run_id: report.run_id.clone(),
            sharpe: r.metrics.sharpe,
            total_return: r.metrics.total_return,
            max_drawdown: r.metrics.max_drawdown,
            num_trades: r.trades.len(),
            final_equity: r.final_equity(),
        }
    }
}

/// A grid point whose run returned an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub params: SweepParams,
    pub error: String,
}

/// Results from a parameter sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    /// Ranked by Sharpe, best first. Ties keep grid order.
    pub summaries: Vec<SweepSummary>,
    pub failures: Vec<SweepFailure>,
    /// True when the cancel flag stopped the sweep before every point ran.
    pub cancelled: bool,
}

impl SweepResults {
    pub fn best(&self) -> Option<&SweepSummary> {
        self.summaries.first()
    }

    pub fn len(&self) -> usize {
        self.summaries.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parameter sweep executor.
///
/// Runs backtests for a list of points, optionally in parallel.
pub struct ParamSweep {
    parallel: bool,
}

impl Default for ParamSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamSweep {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every point over `data`.
    ///
    /// `cancel` is checked before each run is dispatched; runs already in
    /// flight finish. A failing point is recorded and does not stop the rest.
    pub fn run(
        &self,
        points: &[SweepPoint],
        data: &LoadedData,
        range: DateRange,
        cancel: Option<&AtomicBool>,
    ) -> SweepResults {
        let is_cancelled = || cancel.is_some_and(|f| f.load(Ordering::Relaxed));
        let run_one = |(idx, point): (usize, &SweepPoint)| {
            if is_cancelled() {
                return None;
            }
            let outcome = run_with_data(point.config.clone(), data, range);
            Some((idx, point.params, outcome))
        };

        let outcomes: Vec<Option<(usize, SweepParams, Result<RunReport, RunError>)>> =
            if self.parallel {
                points.par_iter().enumerate().map(run_one).collect()
            } else {
                points.iter().enumerate().map(run_one).collect()
            };

        let mut results = SweepResults {
            cancelled: outcomes.iter().any(Option::is_none),
            ..SweepResults::default()
        };
        let mut ranked: Vec<(usize, SweepSummary)> = Vec::new();
        for (idx, params, outcome) in outcomes.into_iter().flatten() {
            match outcome {
                Ok(report) => ranked.push((idx, SweepSummary::of(params, &report))),
                Err(err) => {
                    warn!(?params, error = %err, "sweep point failed");
                    results.failures.push(SweepFailure {
                        params,
                        error: err.to_string(),
                    });
                }
            }
        }

        // NaN Sharpe sorts last
        ranked.sort_by(|(ia, a), (ib, b)| {
            let key = |s: f64| if s.is_nan() { f64::NEG_INFINITY } else { s };
            key(b.sharpe)
                .total_cmp(&key(a.sharpe))
                .then(ia.cmp(ib))
        });
        results.summaries = ranked.into_iter().map(|(_, s)| s).collect();

        info!(
            points = points.len(),
            completed = results.summaries.len(),
            failed = results.failures.len(),
            cancelled = results.cancelled,
            "sweep finished"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> ParamGrid {
        ParamGrid {
            max_positions: vec![1, 2, 3],
            participation_rates: vec![0.05, 0.1],
            min_order_notionals: vec![],
            commission_rates: vec![0.0, 0.001],
        }
    }

    #[test]
    fn size_counts_empty_axes_as_one() {
        assert_eq!(grid().size(), 12);
        assert_eq!(ParamGrid::default().size(), 1);
    }

    #[test]
    fn generate_applies_params_and_keeps_base_for_empty_axis() {
        let mut base = EngineConfig::new(1_000_000.0);
        base.interpreter.min_order_notional = 123.0;
        let points = grid().generate_configs(&base);

        assert_eq!(points.len(), 12);
        for p in &points {
            assert_eq!(p.config.interpreter.max_positions, p.params.max_positions);
            assert_eq!(
                p.config.execution.max_participation_rate,
                p.params.max_participation_rate
            );
            assert_eq!(p.config.execution.costs.commission_rate, p.params.commission_rate);
            assert_eq!(p.config.interpreter.min_order_notional, 123.0);
            assert_eq!(p.config.initial_capital, 1_000_000.0);
        }
        assert_eq!(points[0].params.max_positions, 1);
        assert_eq!(points[11].params.max_positions, 3);
        assert_eq!(points[1].params.commission_rate, 0.001);
    }

    #[test]
    fn sample_is_seeded_and_ordered() {
        let base = EngineConfig::default();
        let a = grid().sample(&base, 5, 7);
        let b = grid().sample(&base, 5, 7);
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);

        let all = grid().generate_configs(&base);
        let positions: Vec<usize> = a
            .iter()
            .map(|p| all.iter().position(|q| q == p).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn oversized_sample_returns_full_grid() {
        let base = EngineConfig::default();
        assert_eq!(grid().sample(&base, 100, 1), grid().generate_configs(&base));
    }

    #[test]
    fn empty_point_list_is_empty_result() {
        let data = LoadedData::new(Default::default(), Default::default());
        let results = ParamSweep::new().run(&[], &data, DateRange::default(), None);
        assert!(results.is_empty());
        assert!(!results.cancelled);
    }
}
