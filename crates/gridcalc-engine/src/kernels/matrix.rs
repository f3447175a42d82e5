//! Dense matrix primitives for MDETERM, MINVERSE and MMULT
//!
//! Sizes here are spreadsheet-scale (a handful of rows), so the
//! determinant uses straightforward cofactor expansion and the inverse
//! the adjugate formula.

use super::{KernelError, KernelResult};

pub type Mat = Vec<Vec<f64>>;

fn is_square(m: &[Vec<f64>]) -> bool {
    !m.is_empty() && m.iter().all(|row| row.len() == m.len())
}

/// Determinant by cofactor expansion along the first row
pub fn determinant(m: &[Vec<f64>]) -> KernelResult {
    if !is_square(m) {
        return Err(KernelError::Domain);
    }
    Ok(det_unchecked(m))
}

fn det_unchecked(m: &[Vec<f64>]) -> f64 {
    let n = m.len();
    match n {
        1 => m[0][0],
        2 => m[0][0] * m[1][1] - m[0][1] * m[1][0],
        _ => {
            let mut det = 0.0;
            for col in 0..n {
                let sign = if col % 2 == 0 { 1.0 } else { -1.0 };
                det += sign * m[0][col] * det_unchecked(&minor(m, 0, col));
            }
            det
        }
    }
}

fn minor(m: &[Vec<f64>], drop_row: usize, drop_col: usize) -> Mat {
    m.iter()
        .enumerate()
        .filter(|(i, _)| *i != drop_row)
        .map(|(_, row)| {
            row.iter()
                .enumerate()
                .filter(|(j, _)| *j != drop_col)
                .map(|(_, v)| *v)
                .collect()
        })
        .collect()
}

/// Inverse via the adjugate; a singular matrix is a domain error
pub fn inverse(m: &[Vec<f64>]) -> std::result::Result<Mat, KernelError> {
    if !is_square(m) {
        return Err(KernelError::Domain);
    }
    let n = m.len();
    let det = det_unchecked(m);
    if det == 0.0 {
        return Err(KernelError::Domain);
    }
    if n == 1 {
        return Ok(vec![vec![1.0 / det]]);
    }
    let mut inv = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            let sign = if (i + j) % 2 == 0 { 1.0 } else { -1.0 };
            // Adjugate transposes the cofactor matrix
            inv[j][i] = sign * det_unchecked(&minor(m, i, j)) / det;
        }
    }
    Ok(inv)
}

/// Matrix product; inner dimensions must agree
pub fn multiply(a: &[Vec<f64>], b: &[Vec<f64>]) -> std::result::Result<Mat, KernelError> {
    if a.is_empty() || b.is_empty() || a.iter().any(|row| row.len() != b.len()) {
        return Err(KernelError::Domain);
    }
    let cols = b[0].len();
    if b.iter().any(|row| row.len() != cols) {
        return Err(KernelError::Domain);
    }
    let mut out = vec![vec![0.0; cols]; a.len()];
    for (i, row) in a.iter().enumerate() {
        for j in 0..cols {
            out[i][j] = row.iter().zip(b.iter()).map(|(x, brow)| x * brow[j]).sum();
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinant() {
        assert_eq!(determinant(&[vec![4.0]]).unwrap(), 4.0);
        assert_eq!(
            determinant(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap(),
            -2.0
        );
        let m = vec![
            vec![2.0, 0.0, 1.0],
            vec![1.0, 3.0, 2.0],
            vec![0.0, 1.0, 1.0],
        ];
        assert_eq!(determinant(&m).unwrap(), 3.0);
        assert_eq!(
            determinant(&[vec![1.0, 2.0]]),
            Err(KernelError::Domain)
        );
    }

    #[test]
    fn test_inverse_round_trip() {
        let m = vec![
            vec![2.0, 0.0, 1.0],
            vec![1.0, 3.0, 2.0],
            vec![0.0, 1.0, 1.0],
        ];
        let inv = inverse(&m).unwrap();
        let product = multiply(&m, &inv).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product[i][j] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_singular_matrix() {
        let m = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert_eq!(inverse(&m), Err(KernelError::Domain));
    }

    #[test]
    fn test_multiply() {
        let a = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let b = vec![vec![5.0], vec![6.0]];
        assert_eq!(multiply(&a, &b).unwrap(), vec![vec![17.0], vec![39.0]]);
        assert_eq!(multiply(&a, &[vec![1.0]]), Err(KernelError::Domain));
    }
}
