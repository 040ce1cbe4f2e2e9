use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverErrors {
    #[error("matrix is {0}x{1} but got {2} right hand side rows and {3} bounds")]
    DimensionMismatch(usize, usize, usize, usize),
    #[error("lower bound of variable {0} is above its upper bound")]
    InvalidBounds(usize),
    #[error("no optimum after {0} iterations")]
    IterationLimit(usize),
    #[error("got non-finite values in the problem")]
    NonFinite,
    #[error("svd failed: {0}")]
    Svd(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Bound {
    Free,
    Lower,
    Upper,
    /// lower == upper, never released
    Fixed,
}

/// Bounded-variable least squares, `min |A x - b|^2` subject to
/// `lower <= x <= upper`, by a primal active set method.
///
/// Starts from `clamp(0)`. Each iteration solves the unconstrained problem
/// over the free variables (SVD, so rank deficient blocks give the minimum
/// norm step). A step that leaves the box is cut at the first bound hit and
/// that variable is bound. Once the free solution is feasible the gradient
/// decides whether releasing a bound variable can still lower the cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedLeastSquares {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for BoundedLeastSquares {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 200,
        }
    }
}

impl BoundedLeastSquares {
    pub fn solve(
        &self,
        a: &DMatrix<f64>,
        b: &DVector<f64>,
        lower: &DVector<f64>,
        upper: &DVector<f64>,
    ) -> Result<DVector<f64>, SolverErrors> {
        let (m, n) = a.shape();
        if b.len() != m || lower.len() != n || upper.len() != n {
            return Err(SolverErrors::DimensionMismatch(m, n, b.len(), lower.len().min(upper.len())));
        }
        if !a.iter().chain(b.iter()).all(|v| v.is_finite())
            || lower.iter().chain(upper.iter()).any(|v| v.is_nan())
        {
            return Err(SolverErrors::NonFinite);
        }
        for i in 0..n {
            if lower[i] > upper[i] {
                return Err(SolverErrors::InvalidBounds(i));
            }
        }

        let tol = self.tolerance;
        let mut x = DVector::from_fn(n, |i, _| 0.0_f64.clamp(lower[i], upper[i]));
        let mut state: Vec<Bound> = (0..n)
            .map(|i| {
                if upper[i] - lower[i] <= tol {
                    Bound::Fixed
                } else if x[i] <= lower[i] {
                    Bound::Lower
                } else if x[i] >= upper[i] {
                    Bound::Upper
                } else {
                    Bound::Free
                }
            })
            .collect();

        // gradient threshold scales with the size of the problem data
        let kkt_tol = tol * (1.0 + (a.transpose() * b).amax());

        for _ in 0..self.max_iterations {
            let free: Vec<usize> = (0..n).filter(|&i| state[i] == Bound::Free).collect();

            if !free.is_empty() {
                let z = solve_free(a, b, &x, &free, tol)?;

                // largest step toward z that stays inside the box
                let mut alpha = 1.0_f64;
                for (k, &i) in free.iter().enumerate() {
                    let step = z[k] - x[i];
                    let limit = if z[k] < lower[i] - tol {
                        (lower[i] - x[i]) / step
                    } else if z[k] > upper[i] + tol {
                        (upper[i] - x[i]) / step
                    } else {
                        continue;
                    };
                    alpha = alpha.min(limit);
                }

                if alpha < 1.0 {
                    let alpha = alpha.max(0.0);
                    for (k, &i) in free.iter().enumerate() {
                        x[i] += alpha * (z[k] - x[i]);
                        if x[i] <= lower[i] + tol {
                            x[i] = lower[i];
                            state[i] = Bound::Lower;
                        } else if x[i] >= upper[i] - tol {
                            x[i] = upper[i];
                            state[i] = Bound::Upper;
                        }
                    }
                    continue;
                }

                for (k, &i) in free.iter().enumerate() {
                    x[i] = z[k].clamp(lower[i], upper[i]);
                }
            }

            let gradient = a.transpose() * (a * &x - b);
            let mut release: Option<(usize, f64)> = None;
            for i in 0..n {
                let violation = match state[i] {
                    Bound::Lower => -gradient[i],
                    Bound::Upper => gradient[i],
                    Bound::Free | Bound::Fixed => continue,
                };
                if violation > kkt_tol && release.is_none_or(|(_, v)| violation > v) {
                    release = Some((i, violation));
                }
            }
            match release {
                Some((i, _)) => state[i] = Bound::Free,
                None => return Ok(x),
            }
        }
        Err(SolverErrors::IterationLimit(self.max_iterations))
    }
}

/// Least squares over the free columns with the bound variables held.
fn solve_free(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    x: &DVector<f64>,
    free: &[usize],
    tol: f64,
) -> Result<DVector<f64>, SolverErrors> {
    let mut held = x.clone();
    for &i in free {
        held[i] = 0.0;
    }
    let rhs = b - a * held;
    let a_free = a.select_columns(free);
    let z = a_free
        .svd(true, true)
        .solve(&rhs, tol)
        .map_err(|e| SolverErrors::Svd(e.to_string()))?;
    if !z.iter().all(|v| v.is_finite()) {
        return Err(SolverErrors::NonFinite);
    }
    Ok(z)
}
