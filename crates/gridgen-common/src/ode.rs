//! Adaptive embedded Runge-Kutta-Fehlberg (RKF45) integration of small ODE systems.
//!
//! `refinePoint`'s "integrate" method and `followPerpendicular` both solve
//! `d(R,Z)/dpsi = grad-psi/|grad-psi|^2` along a psi-path; this stepper is shared by both so the
//! two call sites stay numerically consistent.

use crate::CommonError;

/// Dormand-ish RKF45 Butcher tableau coefficients, 4th/5th order embedded pair.
const A2: f64 = 1.0 / 4.0;
const A3: f64 = 3.0 / 8.0;
const A4: f64 = 12.0 / 13.0;
const A5: f64 = 1.0;
const A6: f64 = 1.0 / 2.0;

const B21: f64 = 1.0 / 4.0;
const B31: f64 = 3.0 / 32.0;
const B32: f64 = 9.0 / 32.0;
const B41: f64 = 1932.0 / 2197.0;
const B42: f64 = -7200.0 / 2197.0;
const B43: f64 = 7296.0 / 2197.0;
const B51: f64 = 439.0 / 216.0;
const B52: f64 = -8.0;
const B53: f64 = 3680.0 / 513.0;
const B54: f64 = -845.0 / 4104.0;
const B61: f64 = -8.0 / 27.0;
const B62: f64 = 2.0;
const B63: f64 = -3544.0 / 2565.0;
const B64: f64 = 1859.0 / 4104.0;
const B65: f64 = -11.0 / 40.0;

const C1: f64 = 25.0 / 216.0;
const C3: f64 = 1408.0 / 2565.0;
const C4: f64 = 2197.0 / 4104.0;
const C5: f64 = -1.0 / 5.0;

const CH1: f64 = 16.0 / 135.0;
const CH3: f64 = 6656.0 / 12825.0;
const CH4: f64 = 28561.0 / 56430.0;
const CH5: f64 = -9.0 / 50.0;
const CH6: f64 = 2.0 / 55.0;

/// State vector processed by the stepper: always a 2-vector `(R, Z)` in this crate's usage.
pub type Vec2 = [f64; 2];

fn add(a: Vec2, b: Vec2) -> Vec2 {
    [a[0] + b[0], a[1] + b[1]]
}

fn scale(a: Vec2, s: f64) -> Vec2 {
    [a[0] * s, a[1] * s]
}

/// Integrates `dy/dt = f(t, y)` from `t0` to `t1` starting at `y0`, with adaptive step-size
/// control targeting `rtol`/`atol`.
///
/// Returns the state at `t1`. Mirrors the teacher's own hand-rolled stepper rather than reaching
/// for a general-purpose ODE crate, since the system here is always the fixed 2-state
/// `(dR/dpsi, dZ/dpsi)` line integral.
///
/// # Errors
/// [`CommonError::NotConverged`] if the step size underflows before reaching `t1`.
pub fn integrate<F>(
    mut f: F,
    t0: f64,
    t1: f64,
    y0: Vec2,
    rtol: f64,
    atol: f64,
) -> Result<Vec2, CommonError>
where
    F: FnMut(f64, Vec2) -> Vec2,
{
    let direction = if t1 >= t0 { 1.0 } else { -1.0 };
    let span = (t1 - t0).abs();
    if span <= atol {
        return Ok(y0);
    }

    let mut t = t0;
    let mut y = y0;
    let mut h = direction * span / 4.0;
    let min_h = span * 1e-10;
    let max_steps = 10_000;

    for _ in 0..max_steps {
        if (t1 - t).abs() <= atol {
            return Ok(y);
        }
        if direction * (t + h - t1) > 0.0 {
            h = t1 - t;
        }

        let k1 = scale(f(t, y), h);
        let k2 = scale(f(t + A2 * h, add(y, scale(k1, B21))), h);
        let k3 = scale(
            f(t + A3 * h, add(y, add(scale(k1, B31), scale(k2, B32)))),
            h,
        );
        let k4 = scale(
            f(
                t + A4 * h,
                add(y, add(scale(k1, B41), add(scale(k2, B42), scale(k3, B43)))),
            ),
            h,
        );
        let k5 = scale(
            f(
                t + A5 * h,
                add(
                    y,
                    add(
                        scale(k1, B51),
                        add(scale(k2, B52), add(scale(k3, B53), scale(k4, B54))),
                    ),
                ),
            ),
            h,
        );
        let k6 = scale(
            f(
                t + A6 * h,
                add(
                    y,
                    add(
                        scale(k1, B61),
                        add(
                            scale(k2, B62),
                            add(scale(k3, B63), add(scale(k4, B64), scale(k5, B65))),
                        ),
                    ),
                ),
            ),
            h,
        );

        let y4 = add(
            y,
            add(
                scale(k1, C1),
                add(scale(k3, C3), add(scale(k4, C4), scale(k5, C5))),
            ),
        );
        let y5 = add(
            y,
            add(
                scale(k1, CH1),
                add(
                    scale(k3, CH3),
                    add(scale(k4, CH4), add(scale(k5, CH5), scale(k6, CH6))),
                ),
            ),
        );

        let err = ((y5[0] - y4[0]).powi(2) + (y5[1] - y4[1]).powi(2)).sqrt();
        let scale_tol = atol + rtol * y5[0].hypot(y5[1]);

        if err <= scale_tol || h.abs() <= min_h {
            t += h;
            y = y5;
        }

        let err_ratio = if err <= f64::EPSILON {
            4.0
        } else {
            (scale_tol / err).powf(0.2).min(4.0).max(0.1)
        };
        h *= 0.9 * err_ratio;
        if h.abs() <= min_h {
            h = direction * min_h;
        }
    }

    Err(CommonError::NotConverged {
        method: "rkf45",
        iterations: max_steps,
        tolerance: rtol,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_integrate_linear_growth() {
        // dy/dt = 1 everywhere: y(t1) = y0 + (t1 - t0).
        let y = integrate(|_t, _y| [1.0, 0.0], 0.0, 2.0, [0.0, 0.0], 1e-10, 1e-12).unwrap();
        assert_relative_eq!(y[0], 2.0, epsilon = 1e-8);
    }

    #[test]
    fn test_integrate_exponential() {
        // dy/dt = y: y(1) = y0 * e.
        let y = integrate(|_t, y| [y[0], 0.0], 0.0, 1.0, [1.0, 0.0], 1e-12, 1e-14).unwrap();
        assert_relative_eq!(y[0], std::f64::consts::E, epsilon = 1e-6);
    }
}
