//! `MultiLocationArray`: up to four co-sized arrays held on the staggered grid's four
//! cell-locations, with lazy-per-location elementwise arithmetic.

use ndarray::Array2;

/// One of the four staggered-grid sample locations a [`MultiLocationArray`] may hold data at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Cell centre, shape `(nx, ny)`.
    Centre,
    /// Radial (x) cell face, shape `(nx+1, ny)`.
    XLow,
    /// Poloidal (y) cell face, shape `(nx, ny+1)`.
    YLow,
    /// Cell corner, shape `(nx+1, ny+1)`.
    Corners,
}

/// A container of up to four dense arrays, one per staggered-grid [`Location`], with elementwise
/// arithmetic dispatched independently per location: a location absent on either operand leaves
/// the result absent at that location (no broadcasting across locations; only against scalars).
#[derive(Debug, Clone, Default)]
pub struct MultiLocationArray {
    centre: Option<Array2<f64>>,
    xlow: Option<Array2<f64>>,
    ylow: Option<Array2<f64>>,
    corners: Option<Array2<f64>>,
}

impl MultiLocationArray {
    /// An empty array with every location absent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the array at `location`, if materialised.
    #[must_use]
    pub fn get(&self, location: Location) -> Option<&Array2<f64>> {
        match location {
            Location::Centre => self.centre.as_ref(),
            Location::XLow => self.xlow.as_ref(),
            Location::YLow => self.ylow.as_ref(),
            Location::Corners => self.corners.as_ref(),
        }
    }

    /// Returns a mutable reference to the array at `location`, if materialised.
    pub fn get_mut(&mut self, location: Location) -> Option<&mut Array2<f64>> {
        match location {
            Location::Centre => self.centre.as_mut(),
            Location::XLow => self.xlow.as_mut(),
            Location::YLow => self.ylow.as_mut(),
            Location::Corners => self.corners.as_mut(),
        }
    }

    /// Materialises `location` with `data`.
    pub fn set(&mut self, location: Location, data: Array2<f64>) {
        match location {
            Location::Centre => self.centre = Some(data),
            Location::XLow => self.xlow = Some(data),
            Location::YLow => self.ylow = Some(data),
            Location::Corners => self.corners = Some(data),
        }
    }

    /// Whether `location` has been assigned.
    #[must_use]
    pub fn has(&self, location: Location) -> bool {
        self.get(location).is_some()
    }

    /// Applies `f` elementwise per materialised location of `self` and `other`; a location absent
    /// in either operand is absent in the result.
    #[must_use]
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64 + Copy) -> Self {
        let mut out = Self::new();
        for location in [Location::Centre, Location::XLow, Location::YLow, Location::Corners] {
            if let (Some(a), Some(b)) = (self.get(location), other.get(location)) {
                out.set(location, ndarray::Zip::from(a).and(b).map_collect(|&x, &y| f(x, y)));
            }
        }
        out
    }

    /// Applies `f` to every materialised location's elements, leaving absent locations absent.
    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64 + Copy) -> Self {
        let mut out = Self::new();
        for location in [Location::Centre, Location::XLow, Location::YLow, Location::Corners] {
            if let Some(a) = self.get(location) {
                out.set(location, a.mapv(f));
            }
        }
        out
    }

    /// Adds a scalar to every materialised location.
    #[must_use]
    pub fn add_scalar(&self, s: f64) -> Self {
        self.map(|x| x + s)
    }

    /// Multiplies every materialised location by a scalar.
    #[must_use]
    pub fn scale(&self, s: f64) -> Self {
        self.map(|x| x * s)
    }
}

impl std::ops::Add for &MultiLocationArray {
    type Output = MultiLocationArray;

    fn add(self, rhs: Self) -> MultiLocationArray {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl std::ops::Sub for &MultiLocationArray {
    type Output = MultiLocationArray;

    fn sub(self, rhs: Self) -> MultiLocationArray {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl std::ops::Mul for &MultiLocationArray {
    type Output = MultiLocationArray;

    fn mul(self, rhs: Self) -> MultiLocationArray {
        self.zip_with(rhs, |a, b| a * b)
    }
}

impl std::ops::Div for &MultiLocationArray {
    type Output = MultiLocationArray;

    fn div(self, rhs: Self) -> MultiLocationArray {
        self.zip_with(rhs, |a, b| a / b)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_absent_location_stays_absent() {
        let mut a = MultiLocationArray::new();
        a.set(Location::Centre, array![[1.0, 2.0], [3.0, 4.0]]);
        let mut b = MultiLocationArray::new();
        b.set(Location::Centre, array![[1.0, 1.0], [1.0, 1.0]]);
        b.set(Location::XLow, array![[0.0, 0.0], [0.0, 0.0], [0.0, 0.0]]);

        let sum = &a + &b;
        assert!(sum.has(Location::Centre));
        assert!(!sum.has(Location::XLow));
    }

    #[test]
    fn test_elementwise_add() {
        let mut a = MultiLocationArray::new();
        a.set(Location::Centre, array![[1.0, 2.0]]);
        let mut b = MultiLocationArray::new();
        b.set(Location::Centre, array![[10.0, 20.0]]);
        let sum = &a + &b;
        assert_eq!(sum.get(Location::Centre).unwrap(), &array![[11.0, 22.0]]);
    }
}
