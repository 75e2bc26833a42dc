//! Metric Fetcher - Ordered Fallback Chains per Metric
//!
//! Every metric owns an ordered list of attempts. Attempts run in order
//! and the first one that yields a value inside the metric kind's domain
//! wins; the rest are never started. A chain with no winner produces
//! `MetricValue::Unavailable`, which is a normal outcome.
//!
//! All chains of a cycle run concurrently. Each chain is a shared future,
//! and a derived attempt awaits only the shared futures of its own
//! inputs, so a derived metric never waits on unrelated network calls.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use futures_util::future::{join_all, BoxFuture, FutureExt, Shared};
use tracing::{debug, info, instrument, warn};

use crate::domain::derived::DerivedOp;
use crate::domain::error::FetchError;
use crate::domain::metric::{Metric, MetricKind, MetricVector};
use crate::ports::source::Source;

/// One attempt in a metric's fallback chain.
#[derive(Clone)]
pub enum Attempt {
  /// Network-backed source.
  Source(Arc<dyn Source>),
  /// Arithmetic over other metrics of the same cycle.
  Derived { op: DerivedOp, inputs: Vec<String> },
}

impl Attempt {
  pub fn describe(&self) -> String {
    match self {
      Self::Source(source) => source.describe(),
      Self::Derived { op, inputs } => format!("derived {op:?}({})", inputs.join(", ")),
    }
  }

  fn inputs(&self) -> &[String] {
    match self {
      Self::Derived { inputs, .. } => inputs,
      Self::Source(_) => &[],
    }
  }
}

impl fmt::Debug for Attempt {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.describe())
  }
}

/// A metric definition ready to fetch.
#[derive(Debug, Clone)]
pub struct MetricPlan {
  pub name: String,
  pub kind: MetricKind,
  pub attempts: Vec<Attempt>,
}

impl MetricPlan {
  pub fn new(name: impl Into<String>, kind: MetricKind, attempts: Vec<Attempt>) -> Self {
    Self {
      name: name.into(),
      kind,
      attempts,
    }
  }

  /// Metrics any attempt of this plan depends on.
  pub fn dependencies(&self) -> BTreeSet<&str> {
    self
      .attempts
      .iter()
      .flat_map(Attempt::inputs)
      .map(String::as_str)
      .collect()
  }
}

/// One failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
  pub source: String,
  pub error: FetchError,
}

/// How a metric's chain ended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
  /// Index of the winning attempt, if any.
  pub winner: Option<usize>,
  /// Failures in attempt order, up to the winner.
  pub failures: Vec<AttemptFailure>,
}

/// Vector of one fetch pass plus per-metric outcomes.
#[derive(Debug, Clone, Default)]
pub struct FetchedVector {
  pub vector: MetricVector,
  pub outcomes: BTreeMap<String, FetchOutcome>,
}

type ChainResult = (Metric, FetchOutcome);
type SharedChain = Shared<BoxFuture<'static, ChainResult>>;

/// Runs every metric's fallback chain.
#[derive(Debug, Clone)]
pub struct MetricFetcher {
  /// Plans in dependency order: inputs before the metrics using them.
  plans: Vec<Arc<MetricPlan>>,
}

impl MetricFetcher {
  /// Build a fetcher. Fails on duplicate names, unknown derived inputs
  /// and dependency cycles.
  pub fn new(plans: Vec<MetricPlan>) -> Result<Self> {
    let mut by_name: BTreeMap<String, MetricPlan> = BTreeMap::new();
    for plan in plans {
      anyhow::ensure!(
        !by_name.contains_key(&plan.name),
        "Duplicate metric plan: {}",
        plan.name
      );
      by_name.insert(plan.name.clone(), plan);
    }

    for plan in by_name.values() {
      for dep in plan.dependencies() {
        anyhow::ensure!(
          by_name.contains_key(dep),
          "Metric {} depends on unknown metric {}",
          plan.name,
          dep
        );
      }
    }

    // Repeatedly emit plans whose dependencies are all emitted.
    let mut ordered: Vec<Arc<MetricPlan>> = Vec::with_capacity(by_name.len());
    let mut emitted: BTreeSet<String> = BTreeSet::new();
    while !by_name.is_empty() {
      let ready: Vec<String> = by_name
        .values()
        .filter(|p| p.dependencies().iter().all(|d| emitted.contains(*d)))
        .map(|p| p.name.clone())
        .collect();

      anyhow::ensure!(
        !ready.is_empty(),
        "Metric dependency cycle among: {}",
        by_name.keys().cloned().collect::<Vec<_>>().join(", ")
      );

      for name in ready {
        if let Some(plan) = by_name.remove(&name) {
          emitted.insert(name);
          ordered.push(Arc::new(plan));
        }
      }
    }

    Ok(Self { plans: ordered })
  }

  /// Metric names in evaluation order.
  pub fn metric_names(&self) -> impl Iterator<Item = &str> {
    self.plans.iter().map(|p| p.name.as_str())
  }

  pub fn len(&self) -> usize {
    self.plans.len()
  }

  pub fn is_empty(&self) -> bool {
    self.plans.is_empty()
  }

  /// Fetch every configured metric.
  #[instrument(skip(self), fields(metrics = self.plans.len()))]
  pub async fn fetch_all(&self) -> FetchedVector {
    let fetched = self.run(|_| true).await;
    info!(
      available = fetched.vector.len() - fetched.vector.unavailable_names().len(),
      unavailable = fetched.vector.unavailable_names().len(),
      "Fetch pass complete"
    );
    fetched
  }

  /// Fetch one metric, plus whatever it transitively depends on.
  ///
  /// Returns `None` for a name that is not configured.
  #[instrument(skip(self))]
  pub async fn fetch(&self, metric: &str) -> Option<Metric> {
    let mut needed: BTreeSet<&str> = BTreeSet::new();
    let mut stack = vec![metric];
    while let Some(name) = stack.pop() {
      let plan = self.plans.iter().find(|p| p.name == name)?;
      if needed.insert(plan.name.as_str()) {
        stack.extend(plan.dependencies());
      }
    }

    let fetched = self.run(|name| needed.contains(name)).await;
    fetched.vector.get(metric).copied()
  }

  async fn run(&self, include: impl Fn(&str) -> bool) -> FetchedVector {
    let mut chains: BTreeMap<String, SharedChain> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();

    for plan in self.plans.iter().filter(|p| include(p.name.as_str())) {
      let inputs: BTreeMap<String, SharedChain> = plan
        .dependencies()
        .into_iter()
        .filter_map(|d| chains.get(d).map(|c| (d.to_string(), c.clone())))
        .collect();

      let chain = run_chain(Arc::clone(plan), inputs).boxed().shared();
      chains.insert(plan.name.clone(), chain);
      order.push(plan.name.clone());
    }

    let results = join_all(order.iter().filter_map(|name| chains.get(name).cloned())).await;

    let mut fetched = FetchedVector::default();
    for (name, (metric, outcome)) in order.into_iter().zip(results) {
      fetched.vector.insert(name.clone(), metric);
      fetched.outcomes.insert(name, outcome);
    }
    fetched
  }
}

async fn run_chain(plan: Arc<MetricPlan>, inputs: BTreeMap<String, SharedChain>) -> ChainResult {
  let mut outcome = FetchOutcome::default();

  for (index, attempt) in plan.attempts.iter().enumerate() {
    let raw = match attempt {
      Attempt::Source(source) => source.attempt(&plan.name).await,
      Attempt::Derived { op, inputs: names } => derive(*op, names, &inputs).await,
    };

    match raw.and_then(|v| plan.kind.coerce(v)) {
      Ok(value) => {
        debug!(
          metric = %plan.name,
          attempt = index,
          source = %attempt.describe(),
          value,
          "Attempt succeeded"
        );
        outcome.winner = Some(index);
        return (Metric::available(plan.kind, value), outcome);
      }
      Err(error) => {
        debug!(
          metric = %plan.name,
          attempt = index,
          source = %attempt.describe(),
          error = %error,
          "Attempt failed"
        );
        outcome.failures.push(AttemptFailure {
          source: attempt.describe(),
          error,
        });
      }
    }
  }

  warn!(
    metric = %plan.name,
    failures = ?outcome
      .failures
      .iter()
      .map(|f| format!("{}: {}", f.source, f.error))
      .collect::<Vec<_>>(),
    "All sources failed, metric unavailable"
  );
  (Metric::unavailable(plan.kind), outcome)
}

async fn derive(
  op: DerivedOp,
  names: &[String],
  chains: &BTreeMap<String, SharedChain>,
) -> Result<f64, FetchError> {
  let mut values = Vec::with_capacity(names.len());
  for name in names {
    let chain = chains
      .get(name)
      .ok_or_else(|| FetchError::MissingDependency(name.clone()))?;
    let (metric, _) = chain.clone().await;
    let value = metric
      .value
      .as_option()
      .ok_or_else(|| FetchError::MissingDependency(name.clone()))?;
    values.push(value);
  }
  op.apply(&values)
}
