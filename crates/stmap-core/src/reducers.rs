//! Statistical reductions of masked arrays.
//!
//! A reducer is written `<statistic>` or `<dimension>_<statistic>`, e.g.
//! `t_mean` or `s_median`. Reducers apply left to right and keep the rank
//! of the array: reduced axes shrink to length 1.
//!
//! | Code | Axes |
//! |---|---|
//! | `t` | 0 (time) |
//! | `s` | 1, 2 |
//! | `h`, `x`, `we`, `ew`, `w-e`, `e-w` | 1 |
//! | `v`, `y`, `ns`, `sn`, `n-s`, `s-n` | 2 |
//! | `all` | 0, 1, 2 |
//!
//! A bare statistic, or an unknown dimension code, reduces time.

use std::fmt;
use std::str::FromStr;

use ndarray::Array3;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use stmap_common::{StmapError, StmapResult};
use tracing::debug;

use crate::masked::{MaskedArray, WeightMask};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Mean,
    Std,
    Var,
    Median,
    Min,
    Max,
    /// One sample drawn with probability proportional to its weight.
    Random,
}

impl Statistic {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mean" => Some(Self::Mean),
            "std" => Some(Self::Std),
            "var" => Some(Self::Var),
            "median" => Some(Self::Median),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "random" => Some(Self::Random),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Std => "std",
            Self::Var => "var",
            Self::Median => "median",
            Self::Min => "min",
            Self::Max => "max",
            Self::Random => "random",
        }
    }
}

/// Axes a reducer collapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dimension {
    #[default]
    Temporal,
    Spatial,
    Horizontal,
    Vertical,
    All,
}

impl Dimension {
    /// Look up a dimension code; `None` for unknown codes.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "t" => Some(Self::Temporal),
            "s" => Some(Self::Spatial),
            "h" | "x" | "we" | "ew" | "w-e" | "e-w" => Some(Self::Horizontal),
            "v" | "y" | "ns" | "sn" | "n-s" | "s-n" => Some(Self::Vertical),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// Which of the `[band, row, col]` axes are reduced.
    pub fn axes(&self) -> [bool; 3] {
        match self {
            Self::Temporal => [true, false, false],
            Self::Spatial => [false, true, true],
            Self::Horizontal => [false, true, false],
            Self::Vertical => [false, false, true],
            Self::All => [true, true, true],
        }
    }
}

/// A statistic applied along a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reducer {
    pub statistic: Statistic,
    pub dimension: Dimension,
}

impl Reducer {
    pub fn new(statistic: Statistic, dimension: Dimension) -> Self {
        Self { statistic, dimension }
    }

    /// Parse a list of reducer names.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> StmapResult<Vec<Self>> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl FromStr for Reducer {
    type Err = StmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim().to_lowercase();
        let (dimension, name) = match spec.split_once('_') {
            Some((code, name)) => (Dimension::from_code(code).unwrap_or_default(), name),
            None => (Dimension::Temporal, spec.as_str()),
        };
        let statistic = Statistic::from_name(name).ok_or_else(|| {
            StmapError::invalid_parameter("reducers", format!("unknown reducer '{}'", s.trim()))
        })?;
        Ok(Self::new(statistic, dimension))
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self.dimension {
            Dimension::Temporal => "t",
            Dimension::Spatial => "s",
            Dimension::Horizontal => "h",
            Dimension::Vertical => "v",
            Dimension::All => "all",
        };
        write!(f, "{}_{}", code, self.statistic.as_str())
    }
}

/// Apply `reducers` in order.
///
/// `weights` is a `[row, col]` coverage mask shared by every band. When
/// given, each step also sums the weights over the reduced axes so the next
/// step sees the total weight behind every surviving cell.
pub fn reduce<R: Rng + ?Sized>(
    reducers: &[Reducer],
    data: MaskedArray,
    weights: Option<&WeightMask>,
    rng: &mut R,
) -> StmapResult<MaskedArray> {
    let mut weights = match weights {
        Some(w) => Some(
            w.broadcast(data.dim())
                .ok_or_else(|| {
                    StmapError::InternalError(format!(
                        "weights {:?} do not fit data {:?}",
                        w.dim(),
                        data.dim()
                    ))
                })?
                .to_owned(),
        ),
        None => None,
    };

    let mut data = data;
    for reducer in reducers {
        let (reduced, reduced_weights) = reduce_once(*reducer, &data, weights.as_ref(), rng)?;
        debug!(reducer = %reducer, shape = ?reduced.dim(), "applied reducer");
        data = reduced;
        weights = reduced_weights;
    }
    Ok(data)
}

/// Samples behind one output cell: `(value, weight)`.
type Bucket = Vec<(f64, f64)>;

fn reduce_once<R: Rng + ?Sized>(
    reducer: Reducer,
    data: &MaskedArray,
    weights: Option<&Array3<f64>>,
    rng: &mut R,
) -> StmapResult<(MaskedArray, Option<Array3<f64>>)> {
    let axes = reducer.dimension.axes();
    let (b, r, c) = data.dim();
    let out_dim = (
        if axes[0] { 1 } else { b },
        if axes[1] { 1 } else { r },
        if axes[2] { 1 } else { c },
    );

    let mut buckets: Vec<Bucket> = vec![Vec::new(); out_dim.0 * out_dim.1 * out_dim.2];
    let flat = |i: usize, j: usize, k: usize| (i * out_dim.1 + j) * out_dim.2 + k;

    for ((i, j, k), value) in data.data().indexed_iter() {
        if data.mask()[[i, j, k]] {
            continue;
        }
        let w = weights.map_or(1.0, |w| w[[i, j, k]]);
        let (oi, oj, ok) = (
            if axes[0] { 0 } else { i },
            if axes[1] { 0 } else { j },
            if axes[2] { 0 } else { k },
        );
        buckets[flat(oi, oj, ok)].push((*value, w));
    }

    let weighted = weights.is_some();
    let mut values = Array3::from_elem(out_dim, f64::NAN);
    let mut mask = Array3::from_elem(out_dim, true);
    let mut totals = Array3::zeros(out_dim);

    for (idx, v) in values.indexed_iter_mut() {
        let bucket = &buckets[flat(idx.0, idx.1, idx.2)];
        totals[idx] = bucket.iter().map(|s| s.1).sum::<f64>();
        if let Some(result) = statistic(reducer.statistic, bucket, weighted, rng) {
            *v = result;
            mask[idx] = false;
        }
    }

    let reduced = MaskedArray::new(values, mask)?;
    Ok((reduced, weighted.then_some(totals)))
}

fn statistic<R: Rng + ?Sized>(stat: Statistic, bucket: &Bucket, weighted: bool, rng: &mut R) -> Option<f64> {
    if bucket.is_empty() {
        return None;
    }
    match stat {
        Statistic::Min => bucket.iter().map(|s| s.0).reduce(f64::min),
        Statistic::Max => bucket.iter().map(|s| s.0).reduce(f64::max),
        Statistic::Mean if weighted => weighted_mean(bucket),
        Statistic::Mean => Some(bucket.iter().map(|s| s.0).sum::<f64>() / bucket.len() as f64),
        Statistic::Var => variance(bucket, weighted),
        Statistic::Std => variance(bucket, weighted).map(f64::sqrt),
        Statistic::Median if weighted => weighted_median(bucket),
        Statistic::Median => median(bucket.iter().map(|s| s.0).collect()),
        Statistic::Random => {
            let weights = bucket.iter().map(|s| if weighted { s.1.max(0.0) } else { 1.0 });
            let dist = WeightedIndex::new(weights).ok()?;
            Some(bucket[dist.sample(rng)].0)
        }
    }
}

fn weighted_mean(bucket: &Bucket) -> Option<f64> {
    let total: f64 = bucket.iter().map(|s| s.1).sum();
    (total > 0.0).then(|| bucket.iter().map(|(x, w)| w * x).sum::<f64>() / total)
}

/// Population variance, or `Σw(x − μ)² / (Σw)²` when weighted.
fn variance(bucket: &Bucket, weighted: bool) -> Option<f64> {
    if weighted {
        let total: f64 = bucket.iter().map(|s| s.1).sum();
        let mu = weighted_mean(bucket)?;
        let ss: f64 = bucket.iter().map(|(x, w)| w * (x - mu).powi(2)).sum();
        Some(ss / (total * total))
    } else {
        let n = bucket.len() as f64;
        let mu = bucket.iter().map(|s| s.0).sum::<f64>() / n;
        Some(bucket.iter().map(|(x, _)| (x - mu).powi(2)).sum::<f64>() / n)
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    })
}

/// Sort by value and walk the cumulative weight up to half the total. On
/// an exact half the two straddling values are averaged; a tie on the last
/// sample returns that sample.
///
/// Equal weights everywhere reduce to the plain median.
fn weighted_median(bucket: &Bucket) -> Option<f64> {
    let mut samples: Vec<(f64, f64)> = bucket.iter().copied().filter(|s| s.1 > 0.0).collect();
    let first = samples.first()?.1;
    if samples.iter().all(|s| s.1 == first) {
        return median(samples.into_iter().map(|s| s.0).collect());
    }

    samples.sort_by(|a, b| a.0.total_cmp(&b.0));
    let half = samples.iter().map(|s| s.1).sum::<f64>() / 2.0;
    let mut cumulative = 0.0;
    for (n, (value, weight)) in samples.iter().enumerate() {
        cumulative += weight;
        if cumulative > half {
            return Some(*value);
        }
        if cumulative == half {
            return Some(samples.get(n + 1).map_or(*value, |next| (value + next.0) / 2.0));
        }
    }
    samples.last().map(|s| s.0)
}
