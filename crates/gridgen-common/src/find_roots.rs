//! `findRoots_1d`: adaptive interval subdivision until enough sign changes are bracketed.

use crate::roots::brent;
use crate::CommonError;

/// Finds at least `n` roots of `f` on `[xmin, xmax]`.
///
/// The interval is repeatedly halved (doubling the sample count) until at least `n` sign changes
/// are bracketed or `max_intervals` samples have been tried; each bracket is then refined with
/// [`brent`].
///
/// # Errors
/// [`CommonError::NotConverged`] if fewer than `n` sign changes are found by `max_intervals`
/// samples.
pub fn find_roots_1d<F>(
    mut f: F,
    n: usize,
    xmin: f64,
    xmax: f64,
    atol: f64,
    rtol: f64,
    max_intervals: usize,
) -> Result<Vec<f64>, CommonError>
where
    F: FnMut(f64) -> f64,
{
    let mut intervals = 16usize.max(n + 1);

    loop {
        let step = (xmax - xmin) / intervals as f64;
        let samples: Vec<f64> = (0..=intervals).map(|i| xmin + step * i as f64).collect();
        let values: Vec<f64> = samples.iter().map(|&x| f(x)).collect();

        let mut brackets = Vec::new();
        for i in 0..intervals {
            if values[i] == 0.0 {
                brackets.push((samples[i], samples[i]));
            } else if values[i].signum() != values[i + 1].signum() {
                brackets.push((samples[i], samples[i + 1]));
            }
        }

        if brackets.len() >= n || intervals >= max_intervals {
            if brackets.len() < n {
                return Err(CommonError::NotConverged {
                    method: "find_roots_1d",
                    iterations: intervals,
                    tolerance: atol,
                });
            }
            let roots = brackets
                .into_iter()
                .map(|(lo, hi)| {
                    if (hi - lo).abs() <= f64::EPSILON {
                        Ok(lo)
                    } else {
                        brent(&mut f, lo, hi, atol.max(rtol * hi.abs()), 200)
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(roots);
        }

        intervals = (intervals * 2).min(max_intervals);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_finds_multiple_roots() {
        // sin(x) on [0.1, 3*pi + 0.1] has roots near pi and 2*pi.
        let roots =
            find_roots_1d(|x: f64| x.sin(), 2, 0.1, 3.0 * std::f64::consts::PI, 1e-10, 1e-8, 1024)
                .unwrap();
        assert!(roots.len() >= 2);
        assert_relative_eq!(roots[0], std::f64::consts::PI, epsilon = 1e-6);
    }
}
