//! Root-finding
//!
//! Three solvers shared by the inverse distribution functions and the
//! iterative financial functions: plain bisection, a safeguarded Newton
//! iteration that falls back to bisection whenever a step leaves the
//! bracket, and Brent's method with inverse-quadratic interpolation.

use super::{KernelError, KernelResult};

pub const DEFAULT_TOL: f64 = 1e-12;
pub const DEFAULT_MAX_ITER: usize = 100;

/// Bisection on a bracketing interval; `f(lo)` and `f(hi)` must differ in
/// sign
pub fn bisection<F: Fn(f64) -> f64>(
    f: F,
    mut lo: f64,
    mut hi: f64,
    tol: f64,
    max_iter: usize,
) -> KernelResult {
    let mut flo = f(lo);
    let fhi = f(hi);
    if flo == 0.0 {
        return Ok(lo);
    }
    if fhi == 0.0 {
        return Ok(hi);
    }
    if flo * fhi > 0.0 {
        return Err(KernelError::Domain);
    }
    for _ in 0..max_iter {
        let mid = 0.5 * (lo + hi);
        let fmid = f(mid);
        if fmid == 0.0 || (hi - lo).abs() < tol {
            return Ok(mid);
        }
        if flo * fmid < 0.0 {
            hi = mid;
        } else {
            lo = mid;
            flo = fmid;
        }
    }
    Err(KernelError::NoConvergence(max_iter))
}

/// Newton iteration with a numeric derivative, safeguarded by the bracket
/// `[lo, hi]`: any step that leaves the bracket or fails to shrink it is
/// replaced by a bisection step
pub fn newton_bisect<F: Fn(f64) -> f64>(
    f: F,
    mut lo: f64,
    mut hi: f64,
    tol: f64,
    max_iter: usize,
) -> KernelResult {
    let mut flo = f(lo);
    let mut fhi = f(hi);
    if flo == 0.0 {
        return Ok(lo);
    }
    if fhi == 0.0 {
        return Ok(hi);
    }
    if flo * fhi > 0.0 {
        return Err(KernelError::Domain);
    }
    if flo > 0.0 {
        std::mem::swap(&mut lo, &mut hi);
        std::mem::swap(&mut flo, &mut fhi);
    }
    let mut x = 0.5 * (lo + hi);
    let mut step = (hi - lo).abs();
    for _ in 0..max_iter {
        let fx = f(x);
        if fx == 0.0 || step.abs() < tol {
            return Ok(x);
        }
        if fx < 0.0 {
            lo = x;
        } else {
            hi = x;
        }
        let h = tol.max(1e-8 * x.abs().max(1.0));
        let dfx = (f(x + h) - f(x - h)) / (2.0 * h);
        let newton = if dfx != 0.0 { x - fx / dfx } else { f64::NAN };
        if newton.is_finite() && (lo - newton) * (newton - hi) > 0.0 {
            step = newton - x;
            x = newton;
        } else {
            step = 0.5 * (hi - lo);
            x = 0.5 * (lo + hi);
        }
    }
    Err(KernelError::NoConvergence(max_iter))
}

/// Brent's method: inverse-quadratic interpolation with secant and
/// bisection safeguards
pub fn brent<F: Fn(f64) -> f64>(
    f: F,
    lo: f64,
    hi: f64,
    tol: f64,
    max_iter: usize,
) -> KernelResult {
    let (mut a, mut b) = (lo, hi);
    let (mut fa, mut fb) = (f(a), f(b));
    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }
    if fa * fb > 0.0 {
        return Err(KernelError::Domain);
    }
    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut e = d;
    for _ in 0..max_iter {
        if fb.abs() > fc.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }
        let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * tol;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb == 0.0 {
            return Ok(b);
        }
        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            // Inverse quadratic interpolation, or secant when only two
            // distinct points are available
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                (2.0 * xm * s, 1.0 - s)
            } else {
                let q = fa / fc;
                let r = fb / fc;
                (
                    s * (2.0 * xm * q * (q - r) - (b - a) * (r - 1.0)),
                    (q - 1.0) * (r - 1.0) * (s - 1.0),
                )
            };
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * xm * q - (tol1 * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }
        a = b;
        fa = fb;
        b += if d.abs() > tol1 {
            d
        } else {
            tol1.copysign(xm)
        };
        fb = f(b);
        if (fb > 0.0) == (fc > 0.0) {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
    }
    Err(KernelError::NoConvergence(max_iter))
}
