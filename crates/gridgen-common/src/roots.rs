//! Bracketed scalar root-finding (Brent's method).

use crate::CommonError;

/// Default absolute tolerance used when the caller has no better estimate.
pub const DEFAULT_ATOL: f64 = 1e-12;

/// Finds a root of `f` bracketed in `[xmin, xmax]` using Brent's method (bisection, secant and
/// inverse quadratic interpolation, whichever converges fastest on each step).
///
/// # Errors
/// - [`CommonError::NoSignChange`] if `f(xmin)` and `f(xmax)` have the same sign.
/// - [`CommonError::NotConverged`] if `maxiter` steps elapse without reaching `atol`.
pub fn brent<F>(
    mut f: F,
    xmin: f64,
    xmax: f64,
    atol: f64,
    maxiter: usize,
) -> Result<f64, CommonError>
where
    F: FnMut(f64) -> f64,
{
    let (mut a, mut b) = (xmin, xmax);
    let (mut fa, mut fb) = (f(a), f(b));

    if fa * fb > 0.0 {
        return Err(CommonError::NoSignChange {
            xmin,
            xmax,
            f_xmin: fa,
            f_xmax: fb,
        });
    }

    if fa.abs() < fb.abs() {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }

    let mut c = a;
    let mut fc = fa;
    let mut mflag = true;
    let mut d = a;

    for _ in 0..maxiter {
        if fb.abs() <= atol || (b - a).abs() <= atol {
            return Ok(b);
        }

        let mut s = if (fa - fc).abs() > f64::EPSILON && (fb - fc).abs() > f64::EPSILON {
            // Inverse quadratic interpolation.
            a * fb * fc / ((fa - fb) * (fa - fc))
                + b * fa * fc / ((fb - fa) * (fb - fc))
                + c * fa * fb / ((fc - fa) * (fc - fb))
        } else {
            // Secant.
            b - fb * (b - a) / (fb - fa)
        };

        let bisection_mid = (3.0 * a + b) / 4.0;
        let cond1 = (s < bisection_mid && s < b) || (s > bisection_mid && s > b);
        let cond2 = mflag && (s - b).abs() >= (b - c).abs() / 2.0;
        let cond3 = !mflag && (s - b).abs() >= (c - d).abs() / 2.0;
        let cond4 = mflag && (b - c).abs() < atol;
        let cond5 = !mflag && (c - d).abs() < atol;

        if cond1 || cond2 || cond3 || cond4 || cond5 {
            s = (a + b) / 2.0;
            mflag = true;
        } else {
            mflag = false;
        }

        let fs = f(s);
        d = c;
        c = b;
        fc = fb;

        if fa * fs < 0.0 {
            b = s;
            fb = fs;
        } else {
            a = s;
            fa = fs;
        }

        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }
    }

    Err(CommonError::NotConverged {
        method: "brent",
        iterations: maxiter,
        tolerance: atol,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_brent_simple_root() {
        let root = brent(|x| x * x - 2.0, 0.0, 2.0, 1e-12, 100).unwrap();
        assert_relative_eq!(root, 2.0_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_brent_no_sign_change() {
        let err = brent(|x| x * x + 1.0, 0.0, 2.0, 1e-12, 100).unwrap_err();
        assert!(matches!(err, CommonError::NoSignChange { .. }));
    }
}
