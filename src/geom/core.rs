use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

// ─────────────────────────────────────────────────────────────────────────────
// Vec3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    /// Unit vector along the X axis.
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    /// Unit vector along the Y axis.
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    /// Unit vector along the Z axis.
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub const fn length_squared(self) -> f64 {
        self.dot(self)
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[must_use]
    pub const fn cross(self, rhs: Self) -> Self {
        Self {
            x: self.y * rhs.z - self.z * rhs.y,
            y: self.z * rhs.x - self.x * rhs.z,
            z: self.x * rhs.y - self.y * rhs.x,
        }
    }

    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len.is_finite() && len > Tolerance::ZERO_LENGTH.eps {
            Some(Self::new(self.x / len, self.y / len, self.z / len))
        } else {
            None
        }
    }

    /// Normalizes, falling back to `fallback` for zero or non-finite input.
    #[must_use]
    pub fn normalized_or(self, fallback: Self) -> Self {
        self.normalized().unwrap_or(fallback)
    }

    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Any unit vector perpendicular to `self` (which must be unit length).
    #[must_use]
    pub fn any_perpendicular(self) -> Self {
        let helper = if self.x.abs() < 0.9 { Self::X } else { Self::Y };
        self.cross(helper).normalized_or(Self::Z)
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Self::Output {
        Vec3::new(self * rhs.x, self * rhs.y, self * rhs.z)
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rot4
// ─────────────────────────────────────────────────────────────────────────────

/// Element of the cyclic rotation group of order four (multiples of 90°).
///
/// Addition composes rotations, negation inverts them. The stored value is
/// always in `0..4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rot4(u8);

impl Rot4 {
    pub const IDENTITY: Self = Self(0);
    pub const QUARTER: Self = Self(1);
    pub const HALF: Self = Self(2);
    pub const THREE_QUARTERS: Self = Self(3);
    pub const ALL: [Self; 4] = [Self(0), Self(1), Self(2), Self(3)];

    /// Reduces any integer amount of quarter turns into the group.
    #[must_use]
    pub const fn new(quarter_turns: i32) -> Self {
        Self(quarter_turns.rem_euclid(4) as u8)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_odd(self) -> bool {
        self.0 & 1 == 1
    }

    #[must_use]
    pub const fn inverse(self) -> Self {
        Self((4 - self.0) % 4)
    }
}

impl Add for Rot4 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self((self.0 + rhs.0) % 4)
    }
}

impl AddAssign for Rot4 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Rot4 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        self + rhs.inverse()
    }
}

impl Neg for Rot4 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        self.inverse()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GridOffset
// ─────────────────────────────────────────────────────────────────────────────

/// Integer displacement on the quad lattice, measured in lattice steps along
/// the two tangent directions of some local frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridOffset {
    pub x: i32,
    pub y: i32,
}

impl GridOffset {
    pub const ZERO: Self = Self::new(0, 0);

    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.x == 0 && self.y == 0
    }

    /// Rotates counter-clockwise by the given number of quarter turns.
    #[must_use]
    pub const fn rotate(self, rotation: Rot4) -> Self {
        let mut out = self;
        if rotation.is_odd() {
            out = Self::new(-out.y, out.x);
        }
        if rotation.value() >= 2 {
            out = Self::new(-out.x, -out.y);
        }
        out
    }

    /// Discrete signed area spanned by `self` and `rhs`.
    #[must_use]
    pub const fn cross(self, rhs: Self) -> i64 {
        self.x as i64 * rhs.y as i64 - self.y as i64 * rhs.x as i64
    }

    #[must_use]
    pub const fn l1(self) -> i32 {
        self.x.abs() + self.y.abs()
    }

    /// Both components have unit magnitude.
    #[must_use]
    pub const fn is_unit_diagonal(self) -> bool {
        self.x.abs() == 1 && self.y.abs() == 1
    }

    /// Exactly one lattice step along one axis.
    #[must_use]
    pub const fn is_unit_step(self) -> bool {
        self.l1() == 1
    }

    /// At least one component is zero.
    #[must_use]
    pub const fn is_axis_aligned(self) -> bool {
        self.x == 0 || self.y == 0
    }

    /// Clamps each component into `-1..=1`.
    #[must_use]
    pub const fn clamp_unit(self) -> Self {
        Self::new(self.x.signum(), self.y.signum())
    }

    /// Largest component magnitude.
    #[must_use]
    pub const fn max_abs(self) -> i32 {
        let (x, y) = (self.x.abs(), self.y.abs());
        if x > y { x } else { y }
    }

    #[must_use]
    pub const fn component(self, axis: usize) -> i32 {
        if axis == 0 { self.x } else { self.y }
    }

    pub fn component_mut(&mut self, axis: usize) -> &mut i32 {
        if axis == 0 { &mut self.x } else { &mut self.y }
    }
}

impl Add for GridOffset {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for GridOffset {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for GridOffset {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for GridOffset {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Neg for GridOffset {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tolerance
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub eps: f64,
}

impl Tolerance {
    /// Default tolerance for geometric comparisons.
    pub const DEFAULT: Self = Self::new(1e-9);

    /// Below this a vector is treated as zero length.
    pub const ZERO_LENGTH: Self = Self::new(1e-12);

    /// Relative residual at which the iterative position solve stops.
    pub const SOLVER: Self = Self::new(1e-10);

    /// Regulariser for near-parallel normals in the tangent-plane intersection.
    pub const PLANE_REGULARIZER: Self = Self::new(1e-4);

    #[must_use]
    pub const fn new(eps: f64) -> Self {
        Self { eps }
    }

    #[must_use]
    pub fn approx_eq_f64(self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.eps
    }

    #[must_use]
    pub fn is_zero(self, value: f64) -> bool {
        value.abs() <= self.eps
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rot4_composes_modulo_four() {
        assert_eq!(Rot4::QUARTER + Rot4::THREE_QUARTERS, Rot4::IDENTITY);
        assert_eq!(Rot4::new(-1), Rot4::THREE_QUARTERS);
        assert_eq!(Rot4::new(6), Rot4::HALF);
        assert_eq!(Rot4::QUARTER - Rot4::HALF, Rot4::THREE_QUARTERS);
        assert_eq!(-Rot4::QUARTER, Rot4::THREE_QUARTERS);
    }

    #[test]
    fn grid_offset_rotates_counter_clockwise() {
        let v = GridOffset::new(1, 0);
        assert_eq!(v.rotate(Rot4::QUARTER), GridOffset::new(0, 1));
        assert_eq!(v.rotate(Rot4::HALF), GridOffset::new(-1, 0));
        assert_eq!(v.rotate(Rot4::THREE_QUARTERS), GridOffset::new(0, -1));
        let w = GridOffset::new(2, -3);
        for a in Rot4::ALL {
            for b in Rot4::ALL {
                assert_eq!(w.rotate(a).rotate(b), w.rotate(a + b));
            }
        }
    }

    #[test]
    fn grid_offset_clamp_keeps_sign() {
        assert_eq!(GridOffset::new(2, 0).clamp_unit(), GridOffset::new(1, 0));
        assert_eq!(GridOffset::new(-5, 1).clamp_unit(), GridOffset::new(-1, 1));
        assert_eq!(GridOffset::ZERO.clamp_unit(), GridOffset::ZERO);
    }

    #[test]
    fn grid_offset_classification() {
        assert!(GridOffset::new(1, -1).is_unit_diagonal());
        assert!(GridOffset::new(0, -1).is_unit_step());
        assert!(GridOffset::new(0, 3).is_axis_aligned());
        assert!(!GridOffset::new(1, 1).is_axis_aligned());
        assert_eq!(GridOffset::new(1, 0).cross(GridOffset::new(0, 1)), 1);
    }

    #[test]
    fn vec3_normalized_rejects_zero() {
        assert!(Vec3::ZERO.normalized().is_none());
        let n = Vec3::new(3.0, 0.0, 4.0).normalized().unwrap();
        assert!(Tolerance::DEFAULT.approx_eq_f64(n.length(), 1.0));
        let p = Vec3::Z.any_perpendicular();
        assert!(Tolerance::DEFAULT.is_zero(p.dot(Vec3::Z)));
    }
}
