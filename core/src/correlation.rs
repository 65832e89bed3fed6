//! Categorical-affinity correlation over all cost-bearing elements.
//!
//! Elements (CAPEX items followed by risks, input order) get a pairwise
//! affinity score summed from matched categorical attributes, capped below
//! 1. The resulting symmetric matrix is clamped to positive semi-definite
//! and factored once per run; categorical attributes never change mid-run,
//! so the factor is cached for every checkpoint.
//!
//! REPAIR LADDER (in order):
//!   1. Cholesky as-is.
//!   2. Clip eigenvalues below EIGEN_FLOOR, re-symmetrise, unit-diagonal,
//!      retry.
//!   3. Additive jitter lambda*I from JITTER_START, doubling to JITTER_MAX.
//!   4. Give up: SimError::Numeric with the minimum eigenvalue seen.

use crate::error::{SimError, SimResult};
use crate::types::EntityId;
use serde::{Deserialize, Serialize};

const EIGEN_FLOOR: f64 = 1e-8;
const JITTER_START: f64 = 1e-6;
const JITTER_MAX: f64 = 1e-2;

/// Pairwise affinity contributions. The defaults are normative: they must
/// not change, or deterministic cross-implementation tests break.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffinityWeights {
    pub same_owner:         f64,
    pub same_discipline:    f64,
    pub same_phase:         f64,
    pub adjacent_phase:     f64,
    pub same_location:      f64,
    pub parent_location:    f64,
    /// Fallback for same-category risks when the category row carries no
    /// default_correlation hint.
    pub same_risk_category: f64,
    pub same_risk_log:      f64,
    /// Ceiling on any pairwise sum; keeps the matrix away from singularity.
    pub cap:                f64,
}

impl Default for AffinityWeights {
    fn default() -> Self {
        Self {
            same_owner:         0.5,
            same_discipline:    0.4,
            same_phase:         0.3,
            adjacent_phase:     0.2,
            same_location:      0.3,
            parent_location:    0.2,
            same_risk_category: 0.4,
            same_risk_log:      0.2,
            cap:                0.95,
        }
    }
}

/// Categorical attributes of one element, with lookup joins already done
/// (phase_order, parent location, category hint) so scoring never touches
/// the lookup tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementTraits {
    pub owner:              Option<String>,
    pub discipline_id:      Option<EntityId>,
    pub phase_id:           Option<EntityId>,
    pub phase_order:        Option<i64>,
    pub location_id:        Option<EntityId>,
    pub parent_location_id: Option<EntityId>,
    pub risk_category_id:   Option<EntityId>,
    /// Resolved default_correlation of the risk's category, when any.
    pub category_affinity:  Option<f64>,
    pub risk_log_id:        Option<EntityId>,
}

fn both_eq<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

/// Summed categorical affinity between two elements, capped. Missing
/// attributes never match — two unknowns have no affinity with each other.
pub fn affinity(a: &ElementTraits, b: &ElementTraits, w: &AffinityWeights) -> f64 {
    let mut sum = 0.0;

    if both_eq(&a.owner, &b.owner) {
        sum += w.same_owner;
    }
    if both_eq(&a.discipline_id, &b.discipline_id) {
        sum += w.same_discipline;
    }
    if both_eq(&a.phase_id, &b.phase_id) {
        sum += w.same_phase;
    } else if let (Some(pa), Some(pb)) = (a.phase_order, b.phase_order) {
        if (pa - pb).abs() == 1 {
            sum += w.adjacent_phase;
        }
    }
    if both_eq(&a.location_id, &b.location_id) {
        sum += w.same_location;
    } else if both_eq(&a.parent_location_id, &b.location_id)
        || both_eq(&b.parent_location_id, &a.location_id)
    {
        sum += w.parent_location;
    }
    if both_eq(&a.risk_category_id, &b.risk_category_id) {
        sum += a.category_affinity.unwrap_or(w.same_risk_category);
    }
    if both_eq(&a.risk_log_id, &b.risk_log_id) {
        sum += w.same_risk_log;
    }

    sum.min(w.cap)
}

/// Symmetric correlation matrix in row-major storage.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    data: Vec<f64>,
    dim:  usize,
}

impl CorrelationMatrix {
    pub fn identity(dim: usize) -> Self {
        let mut data = vec![0.0; dim * dim];
        for i in 0..dim {
            data[i * dim + i] = 1.0;
        }
        Self { data, dim }
    }

    /// Score every pair of elements. O(n^2) affinity walks; n is the item
    /// count plus the risk count, at most a few hundred in practice.
    pub fn from_traits(traits: &[ElementTraits], weights: &AffinityWeights) -> Self {
        let dim = traits.len();
        let mut matrix = Self::identity(dim);
        for i in 0..dim {
            for j in (i + 1)..dim {
                let score = affinity(&traits[i], &traits[j], weights);
                if score > 0.0 {
                    matrix.set_sym(i, j, score);
                }
            }
        }
        matrix
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.dim + j]
    }

    fn set_sym(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.dim + j] = value;
        self.data[j * self.dim + i] = value;
    }

    /// Lower-triangular Cholesky factor, or None when the matrix is not
    /// positive definite.
    pub fn cholesky(&self) -> Option<CholeskyFactor> {
        let n = self.dim;
        let mut lower = vec![0.0; n * n];

        for i in 0..n {
            for j in 0..=i {
                let mut sum = 0.0;
                if j == i {
                    for k in 0..j {
                        let l_jk = lower[j * n + k];
                        sum += l_jk * l_jk;
                    }
                    let diag = self.get(j, j) - sum;
                    if diag <= 0.0 {
                        return None;
                    }
                    lower[j * n + j] = diag.sqrt();
                } else {
                    for k in 0..j {
                        sum += lower[i * n + k] * lower[j * n + k];
                    }
                    let l_jj = lower[j * n + j];
                    if l_jj <= 0.0 {
                        return None;
                    }
                    lower[i * n + j] = (self.get(i, j) - sum) / l_jj;
                }
            }
        }

        Some(CholeskyFactor { data: lower, dim: n })
    }

    /// Shrink off-diagonals by adding lambda*I and renormalising back to a
    /// unit diagonal.
    fn with_jitter(&self, lambda: f64) -> Self {
        let n = self.dim;
        let mut out = self.clone();
        for i in 0..n {
            for j in 0..n {
                out.data[i * n + j] = if i == j {
                    1.0
                } else {
                    self.data[i * n + j] / (1.0 + lambda)
                };
            }
        }
        out
    }

    fn summarise(&self, repaired: bool, min_eigenvalue: Option<f64>) -> CorrelationSummary {
        let n = self.dim;
        let mut pairs = 0usize;
        let mut sum = 0.0;
        let mut max = 0.0f64;
        for i in 0..n {
            for j in (i + 1)..n {
                let value = self.get(i, j);
                if value.abs() > 1e-12 {
                    pairs += 1;
                }
                sum += value;
                max = max.max(value);
            }
        }
        let off_count = n * (n - 1) / 2;
        CorrelationSummary {
            pairs,
            mean_off_diagonal: if off_count > 0 { sum / off_count as f64 } else { 0.0 },
            max_off_diagonal: max,
            repaired,
            min_eigenvalue,
        }
    }
}

/// Lower-triangular factor L with C = L*L^T. Transforms independent
/// standard normals into correlated ones.
#[derive(Debug, Clone)]
pub struct CholeskyFactor {
    data: Vec<f64>,
    dim:  usize,
}

impl CholeskyFactor {
    pub fn identity(dim: usize) -> Self {
        let mut data = vec![0.0; dim * dim];
        for i in 0..dim {
            data[i * dim + i] = 1.0;
        }
        Self { data, dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        if j > i {
            0.0
        } else {
            self.data[i * self.dim + j]
        }
    }

    /// y = L * z. Lengths must equal dim(); guaranteed after validation.
    pub fn transform_into(&self, z: &[f64], y: &mut [f64]) {
        debug_assert_eq!(z.len(), self.dim);
        debug_assert_eq!(y.len(), self.dim);
        let n = self.dim;
        for i in 0..n {
            let mut sum = 0.0;
            for j in 0..=i {
                sum += self.data[i * n + j] * z[j];
            }
            y[i] = sum;
        }
    }
}

/// Header diagnostics for the built matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSummary {
    /// Count of non-zero off-diagonal pairs.
    pub pairs:             usize,
    pub mean_off_diagonal: f64,
    pub max_off_diagonal:  f64,
    /// Whether PSD repair (clipping or jitter) was needed.
    pub repaired:          bool,
    /// Lowest eigenvalue seen before clipping. None when no repair ran.
    pub min_eigenvalue:    Option<f64>,
}

impl CorrelationSummary {
    pub fn independent() -> Self {
        Self {
            pairs:             0,
            mean_off_diagonal: 0.0,
            max_off_diagonal:  0.0,
            repaired:          false,
            min_eigenvalue:    None,
        }
    }
}

/// A built, repaired, factored correlation structure, cached for the run.
#[derive(Debug, Clone)]
pub struct FactoredCorrelation {
    pub matrix:  CorrelationMatrix,
    pub factor:  CholeskyFactor,
    pub summary: CorrelationSummary,
}

impl FactoredCorrelation {
    /// L = I: independent sampling.
    pub fn independent(dim: usize) -> Self {
        Self {
            matrix:  CorrelationMatrix::identity(dim),
            factor:  CholeskyFactor::identity(dim),
            summary: CorrelationSummary::independent(),
        }
    }

    /// Build from element traits, repair to PSD, and factor.
    pub fn build(traits: &[ElementTraits], weights: &AffinityWeights) -> SimResult<Self> {
        let mut matrix = CorrelationMatrix::from_traits(traits, weights);
        let mut repaired = false;
        let mut min_eigenvalue = None;

        let factor = match matrix.cholesky() {
            Some(l) => l,
            None => {
                repaired = true;
                let (eigvals, eigvecs) = symmetric_eigen(&matrix);
                let lowest = eigvals.iter().cloned().fold(f64::INFINITY, f64::min);
                min_eigenvalue = Some(lowest);
                log::warn!(
                    "correlation matrix not PSD (min eigenvalue {lowest:.3e}), clipping"
                );

                matrix = reconstruct_clipped(&eigvals, &eigvecs, matrix.dim);
                match matrix.cholesky() {
                    Some(l) => l,
                    None => jitter_escalate(&mut matrix, lowest)?,
                }
            }
        };

        let summary = matrix.summarise(repaired, min_eigenvalue);
        log::debug!(
            "correlation: {}x{}, {} correlated pair(s), mean off-diagonal {:.3}",
            matrix.dim,
            matrix.dim,
            summary.pairs,
            summary.mean_off_diagonal
        );
        Ok(Self { matrix, factor, summary })
    }
}

fn jitter_escalate(
    matrix: &mut CorrelationMatrix,
    min_eigenvalue: f64,
) -> SimResult<CholeskyFactor> {
    let mut lambda = JITTER_START;
    while lambda <= JITTER_MAX {
        let jittered = matrix.with_jitter(lambda);
        if let Some(l) = jittered.cholesky() {
            log::warn!("correlation matrix required jitter lambda={lambda:.1e}");
            *matrix = jittered;
            return Ok(l);
        }
        lambda *= 2.0;
    }
    Err(SimError::Numeric { min_eigenvalue })
}

/// Rebuild the matrix from clipped eigenvalues: V * diag(max(lambda, floor))
/// * V^T, re-symmetrised with the diagonal forced back to 1.
fn reconstruct_clipped(eigvals: &[f64], eigvecs: &[f64], n: usize) -> CorrelationMatrix {
    let clipped: Vec<f64> = eigvals.iter().map(|&l| l.max(EIGEN_FLOOR)).collect();

    let mut data = vec![0.0; n * n];
    for i in 0..n {
        for j in i..n {
            let mut sum = 0.0;
            for k in 0..n {
                sum += eigvecs[i * n + k] * clipped[k] * eigvecs[j * n + k];
            }
            data[i * n + j] = sum;
            data[j * n + i] = sum;
        }
    }

    // Renormalise to a unit diagonal.
    let scale: Vec<f64> = (0..n).map(|i| data[i * n + i].sqrt()).collect();
    for i in 0..n {
        for j in 0..n {
            data[i * n + j] /= scale[i] * scale[j];
        }
        data[i * n + i] = 1.0;
    }

    CorrelationMatrix { data, dim: n }
}

/// Cyclic Jacobi eigendecomposition of a symmetric matrix. Returns the
/// eigenvalues and the eigenvector matrix V (row-major; column k is the
/// k-th eigenvector). Plenty accurate for the matrix sizes seen here.
fn symmetric_eigen(matrix: &CorrelationMatrix) -> (Vec<f64>, Vec<f64>) {
    let n = matrix.dim;
    let mut a = matrix.data.clone();
    let mut v = vec![0.0; n * n];
    for i in 0..n {
        v[i * n + i] = 1.0;
    }

    for _sweep in 0..64 {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[p * n + q] * a[p * n + q];
            }
        }
        if off.sqrt() < 1e-12 {
            break;
        }

        for p in 0..n.saturating_sub(1) {
            for q in (p + 1)..n {
                let apq = a[p * n + q];
                if apq.abs() < 1e-15 {
                    continue;
                }
                let theta = (a[q * n + q] - a[p * n + p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                // A <- J^T A J
                for k in 0..n {
                    let akp = a[k * n + p];
                    let akq = a[k * n + q];
                    a[k * n + p] = c * akp - s * akq;
                    a[k * n + q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[p * n + k];
                    let aqk = a[q * n + k];
                    a[p * n + k] = c * apk - s * aqk;
                    a[q * n + k] = s * apk + c * aqk;
                }
                // V <- V J
                for k in 0..n {
                    let vkp = v[k * n + p];
                    let vkq = v[k * n + q];
                    v[k * n + p] = c * vkp - s * vkq;
                    v[k * n + q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigvals = (0..n).map(|i| a[i * n + i]).collect();
    (eigvals, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traits(owner: Option<&str>, discipline: Option<i64>) -> ElementTraits {
        ElementTraits {
            owner: owner.map(str::to_string),
            discipline_id: discipline,
            ..Default::default()
        }
    }

    #[test]
    fn contributions_are_summed_and_capped() {
        let w = AffinityWeights::default();
        let a = ElementTraits {
            owner: Some("alice".into()),
            discipline_id: Some(1),
            phase_id: Some(2),
            location_id: Some(3),
            ..Default::default()
        };
        // owner 0.5 + discipline 0.4 + phase 0.3 + location 0.3 = 1.5 -> cap
        assert_eq!(affinity(&a, &a.clone(), &w), 0.95);

        let b = traits(Some("alice"), Some(1));
        assert!((affinity(&b, &b.clone(), &w) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn missing_attributes_never_match() {
        let w = AffinityWeights::default();
        assert_eq!(affinity(&traits(None, None), &traits(None, None), &w), 0.0);
        assert_eq!(affinity(&traits(Some("a"), None), &traits(None, None), &w), 0.0);
    }

    #[test]
    fn adjacent_phases_contribute_but_wider_gaps_do_not() {
        let w = AffinityWeights::default();
        let at = |phase_id: i64, order: i64| ElementTraits {
            phase_id: Some(phase_id),
            phase_order: Some(order),
            ..Default::default()
        };
        assert!((affinity(&at(1, 1), &at(2, 2), &w) - 0.2).abs() < 1e-12);
        assert_eq!(affinity(&at(1, 1), &at(3, 3), &w), 0.0);
    }

    #[test]
    fn parent_child_locations_contribute() {
        let w = AffinityWeights::default();
        let parent = ElementTraits { location_id: Some(10), ..Default::default() };
        let child = ElementTraits {
            location_id: Some(11),
            parent_location_id: Some(10),
            ..Default::default()
        };
        assert!((affinity(&parent, &child, &w) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn category_hint_overrides_the_default_weight() {
        let w = AffinityWeights::default();
        let risk = |hint: Option<f64>| ElementTraits {
            risk_category_id: Some(7),
            category_affinity: hint,
            ..Default::default()
        };
        assert!((affinity(&risk(None), &risk(None), &w) - 0.4).abs() < 1e-12);
        assert!((affinity(&risk(Some(0.7)), &risk(Some(0.7)), &w) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn jacobi_matches_known_2x2_spectrum() {
        let mut m = CorrelationMatrix::identity(2);
        m.set_sym(0, 1, 0.5);
        let (mut eigvals, _) = symmetric_eigen(&m);
        eigvals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((eigvals[0] - 0.5).abs() < 1e-10);
        assert!((eigvals[1] - 1.5).abs() < 1e-10);
    }

    #[test]
    fn cholesky_reconstructs_the_matrix() {
        let mut m = CorrelationMatrix::identity(3);
        m.set_sym(0, 1, 0.3);
        m.set_sym(1, 2, 0.4);
        m.set_sym(0, 2, 0.2);
        let l = m.cholesky().expect("PD matrix");
        for i in 0..3 {
            for j in 0..3 {
                let mut sum = 0.0;
                for k in 0..3 {
                    sum += l.get(i, k) * l.get(j, k);
                }
                assert!((sum - m.get(i, j)).abs() < 1e-10, "mismatch at ({i},{j})");
            }
        }
    }

    #[test]
    fn non_psd_matrix_is_repaired() {
        // Indefinite: strong 0-1 and 1-2 links but a weak 0-2 link.
        let mut m = CorrelationMatrix::identity(3);
        m.set_sym(0, 1, 0.9);
        m.set_sym(1, 2, 0.9);
        m.set_sym(0, 2, 0.1);
        assert!(m.cholesky().is_none(), "test premise: matrix must not be PD");

        let (eigvals, eigvecs) = symmetric_eigen(&m);
        let repaired = reconstruct_clipped(&eigvals, &eigvecs, 3);
        assert!(repaired.cholesky().is_some(), "clipped matrix must factor");

        let (eigvals_after, _) = symmetric_eigen(&repaired);
        let lowest = eigvals_after.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!(lowest >= -1e-10, "min eigenvalue after repair: {lowest}");
        for i in 0..3 {
            assert!((repaired.get(i, i) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn transform_applies_lower_triangle() {
        let mut m = CorrelationMatrix::identity(2);
        m.set_sym(0, 1, 0.5);
        let l = m.cholesky().unwrap();
        let mut y = [0.0; 2];
        l.transform_into(&[1.0, 0.0], &mut y);
        assert!((y[0] - 1.0).abs() < 1e-12);
        assert!((y[1] - 0.5).abs() < 1e-12);
    }
}
