// NURBS curve evaluation.
//
// Rational B-spline evaluation over homogeneous control points: knot span
// search and Cox-de Boor basis functions, followed by the perspective divide.

use glam::{Vec3, Vec4};

/// A rational B-spline curve with homogeneous control points (w = weight).
#[derive(Clone, Debug)]
pub struct NurbsCurve {
    /// Polynomial degree (order - 1)
    pub degree: usize,

    /// Knot vector
    pub knots: Vec<f64>,

    /// Control points; `w` is the rational weight
    pub control_points: Vec<Vec4>,

    /// Index of the knot where evaluation starts
    pub start_knot: usize,

    /// Index of the knot where evaluation ends
    pub end_knot: usize,
}

impl NurbsCurve {
    /// Create a curve spanning the whole knot vector.
    pub fn new(degree: usize, knots: Vec<f64>, control_points: Vec<Vec4>) -> Self {
        let end_knot = knots.len().saturating_sub(1);
        Self {
            degree,
            knots,
            control_points,
            start_knot: 0,
            end_knot,
        }
    }

    /// Restrict evaluation to the knot range `[start_knot, end_knot]`.
    pub fn with_knot_range(mut self, start_knot: usize, end_knot: usize) -> Self {
        self.start_knot = start_knot;
        self.end_knot = end_knot;
        self
    }

    /// Check that knots, control points and the evaluation range agree.
    pub fn is_valid(&self) -> bool {
        let p = self.degree;
        !self.control_points.is_empty()
            && self.knots.len() >= p + 2
            && self.knots.len() - p - 1 <= self.control_points.len()
            && self.start_knot <= self.end_knot
            && self.end_knot < self.knots.len()
    }

    /// Evaluate the curve at normalized parameter `t` in [0, 1].
    pub fn point_at(&self, t: f64) -> Option<Vec3> {
        if !self.is_valid() {
            return None;
        }
        let k0 = self.knots[self.start_knot];
        let k1 = self.knots[self.end_knot];
        let u = k0 + t * (k1 - k0);

        let h = self.bspline_point(u)?;
        if h.w != 1.0 && h.w != 0.0 {
            Some(Vec3::new(h.x / h.w, h.y / h.w, h.z / h.w))
        } else {
            Some(h.truncate())
        }
    }

    /// Sample `divisions + 1` evenly spaced points, both ends included.
    pub fn points(&self, divisions: usize) -> Vec<Vec3> {
        if divisions == 0 {
            return self.point_at(0.0).into_iter().collect();
        }
        (0..=divisions)
            .filter_map(|d| self.point_at(d as f64 / divisions as f64))
            .collect()
    }

    fn find_span(&self, u: f64) -> usize {
        let p = self.degree;
        let knots = &self.knots;
        let n = knots.len() - p - 1;

        if u >= knots[n] {
            return n - 1;
        }
        if u <= knots[p] {
            return p;
        }

        let mut low = p;
        let mut high = n;
        let mut mid = (low + high) / 2;
        while u < knots[mid] || u >= knots[mid + 1] {
            if u < knots[mid] {
                high = mid;
            } else {
                low = mid;
            }
            mid = (low + high) / 2;
        }
        mid
    }

    fn basis_functions(&self, span: usize, u: f64) -> Vec<f64> {
        let p = self.degree;
        let knots = &self.knots;
        let mut n = vec![0.0; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        n[0] = 1.0;

        for j in 1..=p {
            left[j] = u - knots[span + 1 - j];
            right[j] = knots[span + j] - u;

            let mut saved = 0.0;
            for r in 0..j {
                let rv = right[r + 1];
                let lv = left[j - r];
                let denom = rv + lv;
                let temp = if denom == 0.0 { 0.0 } else { n[r] / denom };
                n[r] = saved + rv * temp;
                saved = lv * temp;
            }
            n[j] = saved;
        }
        n
    }

    fn bspline_point(&self, u: f64) -> Option<Vec4> {
        let p = self.degree;
        let span = self.find_span(u);
        if span < p {
            return None;
        }
        let basis = self.basis_functions(span, u);

        let mut c = [0.0f64; 4];
        for (j, nj) in basis.iter().enumerate() {
            let point = self.control_points.get(span - p + j)?;
            let w = point.w as f64;
            let wnj = w * nj;
            c[0] += point.x as f64 * wnj;
            c[1] += point.y as f64 * wnj;
            c[2] += point.z as f64 * wnj;
            c[3] += w * nj;
        }
        Some(Vec4::new(c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32))
    }
}
