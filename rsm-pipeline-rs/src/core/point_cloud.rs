//! Reciprocal space point cloud.

use nalgebra::Vector3;

/// One detector pixel of one exposure mapped into reciprocal space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReciprocalPoint {
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,
    pub intensity: f64,
}

impl ReciprocalPoint {
    #[inline]
    pub fn new(q: Vector3<f64>, intensity: f64) -> Self {
        Self {
            qx: q.x,
            qy: q.y,
            qz: q.z,
            intensity,
        }
    }

    /// Q components as `[qx, qy, qz]`.
    #[inline]
    pub fn q(&self) -> [f64; 3] {
        [self.qx, self.qy, self.qz]
    }
}

/// Ordered collection of reciprocal points: exposure order, then pixel order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<ReciprocalPoint>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn from_points(points: Vec<ReciprocalPoint>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn push(&mut self, point: ReciprocalPoint) {
        self.points.push(point);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReciprocalPoint> {
        self.points.iter()
    }

    /// Per-axis `(min, max)` of the Q components, `None` for an empty cloud.
    ///
    /// NaN components are skipped.
    pub fn q_bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        if self.points.is_empty() {
            return None;
        }
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for point in &self.points {
            for (axis, q) in point.q().into_iter().enumerate() {
                lo[axis] = lo[axis].min(q);
                hi[axis] = hi[axis].max(q);
            }
        }
        Some((lo, hi))
    }

    /// Sum of all intensities.
    pub fn total_intensity(&self) -> f64 {
        self.points.iter().map(|p| p.intensity).sum()
    }
}

impl FromIterator<ReciprocalPoint> for PointCloud {
    fn from_iter<I: IntoIterator<Item = ReciprocalPoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a ReciprocalPoint;
    type IntoIter = std::slice::Iter<'a, ReciprocalPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
