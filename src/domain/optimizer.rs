//! Grid search over EMA periods and the trailing/protection thresholds.
//!
//! Every candidate runs in its own [`SimulationEngine`]; the bar slice is
//! shared read-only, so candidates can run on the rayon pool.

use rayon::prelude::*;
use tracing::{debug, info};

use super::error::SimError;
use super::metrics::Metrics;
use super::ohlcv::Bar;
use super::simulation::{SimulationConfig, SimulationEngine};
use super::strategy::EmaCrossover;

/// Values to search, one list per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamGrid {
    pub fast_periods: Vec<usize>,
    pub slow_periods: Vec<usize>,
    pub trailing_activation_pcts: Vec<f64>,
    pub protection_peak_pcts: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        ParamGrid {
            fast_periods: vec![5, 9, 12],
            slow_periods: vec![21, 26, 50],
            trailing_activation_pcts: vec![0.5, 1.0, 2.0],
            protection_peak_pcts: vec![3.0, 5.0],
        }
    }
}

impl ParamGrid {
    /// Upper bound on candidates, before invalid combinations are dropped.
    pub fn size(&self) -> usize {
        self.fast_periods.len()
            * self.slow_periods.len()
            * self.trailing_activation_pcts.len()
            * self.protection_peak_pcts.len()
    }

    /// All valid combinations in a fixed order. `fast >= slow` is skipped.
    pub fn candidates(&self) -> Vec<OptimizationParams> {
        let mut out = Vec::new();
        for &fast in &self.fast_periods {
            for &slow in &self.slow_periods {
                if fast >= slow {
                    continue;
                }
                for &trailing_activation_pct in &self.trailing_activation_pcts {
                    for &protection_peak_pct in &self.protection_peak_pcts {
                        out.push(OptimizationParams {
                            fast,
                            slow,
                            trailing_activation_pct,
                            protection_peak_pct,
                        });
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizationParams {
    pub fast: usize,
    pub slow: usize,
    pub trailing_activation_pct: f64,
    pub protection_peak_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationRun {
    pub params: OptimizationParams,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationReport {
    /// Best first: Sharpe, then total return.
    pub runs: Vec<OptimizationRun>,
    /// Candidates abandoned for lack of data or signals.
    pub skipped: usize,
}

impl OptimizationReport {
    pub fn best(&self) -> Option<&OptimizationRun> {
        self.runs.first()
    }

    pub fn top(&self, n: usize) -> &[OptimizationRun] {
        &self.runs[..n.min(self.runs.len())]
    }
}

pub struct Optimizer {
    base_config: SimulationConfig,
    base_strategy: EmaCrossover,
    parallel: bool,
}

impl Optimizer {
    pub fn new(base_config: SimulationConfig, base_strategy: EmaCrossover) -> Self {
        Optimizer {
            base_config,
            base_strategy,
            parallel: true,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn optimize(&self, bars: &[Bar], grid: &ParamGrid) -> Result<OptimizationReport, SimError> {
        let candidates = grid.candidates();
        info!(
            symbol = %self.base_config.symbol,
            candidates = candidates.len(),
            parallel = self.parallel,
            "optimization started"
        );

        let outcomes: Vec<Option<OptimizationRun>> = if self.parallel {
            candidates
                .par_iter()
                .map(|params| self.evaluate(bars, params))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            candidates
                .iter()
                .map(|params| self.evaluate(bars, params))
                .collect::<Result<Vec<_>, _>>()?
        };

        let skipped = outcomes.iter().filter(|o| o.is_none()).count();
        let mut runs: Vec<OptimizationRun> = outcomes.into_iter().flatten().collect();
        runs.sort_by(|a, b| {
            b.metrics
                .sharpe_ratio
                .total_cmp(&a.metrics.sharpe_ratio)
                .then_with(|| b.metrics.total_return.total_cmp(&a.metrics.total_return))
        });

        info!(completed = runs.len(), skipped, "optimization finished");
        Ok(OptimizationReport { runs, skipped })
    }

    fn evaluate(
        &self,
        bars: &[Bar],
        params: &OptimizationParams,
    ) -> Result<Option<OptimizationRun>, SimError> {
        let mut config = self.base_config.clone();
        config.risk.trailing_activation_pct = params.trailing_activation_pct;
        config.risk.protection_peak_pct = params.protection_peak_pct;

        let strategy = EmaCrossover {
            fast: params.fast,
            slow: params.slow,
            ..self.base_strategy.clone()
        };

        match SimulationEngine::new(config).run(bars, &strategy) {
            Ok(result) => Ok(Some(OptimizationRun {
                params: *params,
                metrics: Metrics::from_result(&result),
            })),
            Err(e) if e.is_data_insufficient() => {
                debug!(?params, error = %e, "candidate skipped");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
