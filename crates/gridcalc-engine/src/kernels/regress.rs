//! Least-squares regression via Householder QR
//!
//! Solves `min ‖Xb - y‖₂` for the TREND/GROWTH/FORECAST family. The design
//! matrix is reduced to upper-triangular form by Householder reflections
//! applied simultaneously to the right-hand side, then back-substituted.
//! Rank deficiency is a domain error.

use super::KernelError;

/// Solve the least-squares problem for an `n × p` design matrix, `n >= p`
pub fn least_squares(
    design: &[Vec<f64>],
    y: &[f64],
) -> std::result::Result<Vec<f64>, KernelError> {
    let n = design.len();
    if n == 0 || y.len() != n {
        return Err(KernelError::Domain);
    }
    let p = design[0].len();
    if p == 0 || n < p || design.iter().any(|row| row.len() != p) {
        return Err(KernelError::Domain);
    }

    let mut a = design.to_vec();
    let mut rhs = y.to_vec();

    for k in 0..p {
        let norm: f64 = (k..n).map(|i| a[i][k] * a[i][k]).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Err(KernelError::Domain);
        }
        let alpha = if a[k][k] > 0.0 { -norm } else { norm };
        let mut v: Vec<f64> = (k..n).map(|i| a[i][k]).collect();
        v[0] -= alpha;
        let vtv: f64 = v.iter().map(|x| x * x).sum();
        if vtv == 0.0 {
            continue;
        }
        for j in k..p {
            let s: f64 = v.iter().zip(k..n).map(|(vi, i)| vi * a[i][j]).sum();
            let factor = 2.0 * s / vtv;
            for (vi, i) in v.iter().zip(k..n) {
                a[i][j] -= factor * vi;
            }
        }
        let s: f64 = v.iter().zip(k..n).map(|(vi, i)| vi * rhs[i]).sum();
        let factor = 2.0 * s / vtv;
        for (vi, i) in v.iter().zip(k..n) {
            rhs[i] -= factor * vi;
        }
    }

    // Back-substitute R b = Qᵀy
    let mut coef = vec![0.0; p];
    for i in (0..p).rev() {
        let mut s = rhs[i];
        for j in i + 1..p {
            s -= a[i][j] * coef[j];
        }
        if a[i][i].abs() < 1e-12 {
            return Err(KernelError::Domain);
        }
        coef[i] = s / a[i][i];
    }
    Ok(coef)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_line_fit() {
        // y = 2x + 1 through a [1, x] design matrix
        let design: Vec<Vec<f64>> = (1..=4).map(|x| vec![1.0, x as f64]).collect();
        let y = [3.0, 5.0, 7.0, 9.0];
        let coef = least_squares(&design, &y).unwrap();
        assert!((coef[0] - 1.0).abs() < 1e-12);
        assert!((coef[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_overdetermined_fit() {
        // Least-squares slope/intercept of noisy points
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [0.1, 0.9, 2.1, 2.9];
        let design: Vec<Vec<f64>> = xs.iter().map(|&x| vec![1.0, x]).collect();
        let coef = least_squares(&design, &ys).unwrap();
        assert!((coef[1] - 0.96).abs() < 1e-9);
        assert!((coef[0] - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_rank_deficient() {
        let design = vec![vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0]];
        let y = [1.0, 2.0, 3.0];
        assert_eq!(least_squares(&design, &y), Err(KernelError::Domain));
    }
}
