use serde::Serialize;

/// Inclusive horizontal window, `x_min <= x_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowBounds {
    pub x_min: f64,
    pub x_max: f64,
}

impl WindowBounds {
    pub fn new(x_min: f64, x_max: f64) -> Option<Self> {
        if !x_min.is_finite() || !x_max.is_finite() || x_min > x_max {
            return None;
        }
        Some(Self { x_min, x_max })
    }

    /// Build bounds from a view range, which is reversed on a flipped axis.
    pub fn from_range([a, b]: [f64; 2]) -> Option<Self> {
        if a > b {
            return Self::new(b, a);
        }
        Self::new(a, b)
    }

    pub fn contains(&self, x: f64) -> bool {
        self.x_min <= x && x <= self.x_max
    }

    pub fn midpoint(&self) -> f64 {
        (self.x_min + self.x_max) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStats {
    pub sum: f64,
    pub count: usize,
    pub avg: f64,
}

/// Average over a window. `NoPoints` is not an average of zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowAverage {
    Points(WindowStats),
    NoPoints,
}

impl WindowAverage {
    pub fn stats(&self) -> Option<&WindowStats> {
        match self {
            WindowAverage::Points(stats) => Some(stats),
            WindowAverage::NoPoints => None,
        }
    }
}

/// Window result of one plotted series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesWindow {
    pub index: usize,
    pub name: String,
    pub average: WindowAverage,
}

pub struct Accumulator {
    n_vals: usize,
    sum: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self { n_vals: 0, sum: 0.0 }
    }

    /// Add a value; non-finite values are ignored.
    pub fn add(&mut self, val: f64) {
        if !val.is_finite() {
            return;
        }
        self.n_vals += 1;
        self.sum += val;
    }

    pub fn report(&self) -> WindowAverage {
        if self.n_vals == 0 {
            return WindowAverage::NoPoints;
        }
        WindowAverage::Points(WindowStats {
            sum: self.sum,
            count: self.n_vals,
            avg: self.sum / self.n_vals as f64,
        })
    }
}

/// Average of the finite `ys` whose paired x lies inside `bounds`.
///
/// Callers must skip series whose `xs` and `ys` differ in length; extra
/// elements of the longer slice are never looked at.
pub fn compute_window(xs: &[f64], ys: &[f64], bounds: WindowBounds) -> WindowAverage {
    let mut acc = Accumulator::new();
    for (&x, &y) in xs.iter().zip(ys) {
        if bounds.contains(x) {
            acc.add(y);
        }
    }
    acc.report()
}

/// Average of every finite value, used for the full-range baseline.
pub fn full_range_mean(ys: &[f64]) -> WindowAverage {
    let mut acc = Accumulator::new();
    for &y in ys {
        acc.add(y);
    }
    acc.report()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::seq::SliceRandom;
    use rand_chacha::ChaCha12Rng;

    fn bounds(x_min: f64, x_max: f64) -> WindowBounds {
        WindowBounds::new(x_min, x_max).expect("valid bounds")
    }

    fn series_a() -> (Vec<f64>, Vec<f64>) {
        ((0..10).map(f64::from).collect(), (1..=10).map(f64::from).collect())
    }

    fn series_b() -> (Vec<f64>, Vec<f64>) {
        ((0..10).map(f64::from).collect(), (1..=10).rev().map(f64::from).collect())
    }

    #[test]
    fn window_averages_of_two_series() {
        let (xs, ys) = series_a();
        assert_eq!(
            compute_window(&xs, &ys, bounds(2.0, 5.0)),
            WindowAverage::Points(WindowStats { sum: 18.0, count: 4, avg: 4.5 })
        );

        let (xs, ys) = series_b();
        assert_eq!(
            compute_window(&xs, &ys, bounds(2.0, 5.0)),
            WindowAverage::Points(WindowStats { sum: 26.0, count: 4, avg: 6.5 })
        );
    }

    #[test]
    fn window_outside_data_has_no_points() {
        let (xs, ys) = series_a();
        assert_eq!(compute_window(&xs, &ys, bounds(20.0, 30.0)), WindowAverage::NoPoints);
    }

    #[test]
    fn no_points_differs_from_zero_average() {
        let xs = [0.0, 1.0];
        let ys = [-1.0, 1.0];
        let zero = compute_window(&xs, &ys, bounds(0.0, 1.0));
        assert_eq!(zero.stats().map(|s| s.avg), Some(0.0));
        assert_ne!(zero, WindowAverage::NoPoints);
        assert_eq!(compute_window(&xs, &ys, bounds(5.0, 6.0)), WindowAverage::NoPoints);
    }

    #[test]
    fn bounds_are_inclusive() {
        let xs = [1.0, 2.0, 3.0];
        let ys = [10.0, 20.0, 30.0];
        let stats = compute_window(&xs, &ys, bounds(1.0, 3.0));
        assert_eq!(stats.stats().map(|s| s.count), Some(3));
        let point = compute_window(&xs, &ys, bounds(2.0, 2.0));
        assert_eq!(point.stats().map(|s| s.avg), Some(20.0));
    }

    #[test]
    fn non_finite_values_are_skipped() {
        let xs = [0.0, 1.0, f64::NAN, 3.0, 4.0];
        let ys = [f64::NAN, 2.0, 100.0, f64::INFINITY, 4.0];
        assert_eq!(
            compute_window(&xs, &ys, bounds(0.0, 4.0)),
            WindowAverage::Points(WindowStats { sum: 6.0, count: 2, avg: 3.0 })
        );
        assert_eq!(
            compute_window(&[0.0], &[f64::NAN], bounds(0.0, 1.0)),
            WindowAverage::NoPoints
        );
    }

    #[test]
    fn permuting_pairs_keeps_the_result() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let mut pairs: Vec<(f64, f64)> = (0..200)
            .map(|i| (f64::from(i % 37), f64::from((i * 13) % 101) - 50.0))
            .collect();
        let window = bounds(5.0, 25.0);

        let (xs, ys): (Vec<_>, Vec<_>) = pairs.iter().copied().unzip();
        let expected = compute_window(&xs, &ys, window);
        assert!(expected.stats().is_some());

        for _ in 0..20 {
            pairs.shuffle(&mut rng);
            let (xs, ys): (Vec<_>, Vec<_>) = pairs.iter().copied().unzip();
            assert_eq!(compute_window(&xs, &ys, window), expected);
        }
    }

    #[test]
    fn reversed_range_is_normalized() {
        assert_eq!(WindowBounds::from_range([5.0, 2.0]), Some(bounds(2.0, 5.0)));
        assert_eq!(WindowBounds::new(5.0, 2.0), None);
        assert_eq!(WindowBounds::from_range([f64::NAN, 2.0]), None);
        assert_eq!(bounds(2.0, 5.0).midpoint(), 3.5);
    }

    #[test]
    fn full_range_mean_ignores_gaps() {
        assert_eq!(
            full_range_mean(&[1.0, f64::NAN, 3.0]).stats().map(|s| s.avg),
            Some(2.0)
        );
        assert_eq!(full_range_mean(&[]), WindowAverage::NoPoints);
    }
}
