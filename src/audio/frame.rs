use std::ops::{Add, Mul, Sub};

/// One stereo sample instant.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    pub const ZERO: Frame = Frame { left: 0.0, right: 0.0 };

    #[must_use]
    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Both channels set to the same value.
    #[must_use]
    pub fn from_mono(value: f32) -> Self {
        Self::new(value, value)
    }
}

impl Add for Frame {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl Sub for Frame {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.left - rhs.left, self.right - rhs.right)
    }
}

impl Mul<f32> for Frame {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.left * rhs, self.right * rhs)
    }
}

/// Approximate the signal at `fraction` (0.0..1.0) between `current` and
/// `next_1`, using one frame of history on each side.
///
/// 4-point, 3rd-order Hermite interpolation (x-form), from Olli Niemitalo,
/// "Polynomial Interpolators for High-Quality Resampling of Oversampled Audio", p. 43.
#[must_use]
pub fn interpolate_frame(previous: Frame, current: Frame, next_1: Frame, next_2: Frame, fraction: f32) -> Frame {
    let c0 = current;
    let c1 = (next_1 - previous) * 0.5;
    let c2 = previous - current * 2.5 + next_1 * 2.0 - next_2 * 0.5;
    let c3 = (next_2 - previous) * 0.5 + (current - next_1) * 1.5;
    ((c3 * fraction + c2) * fraction + c1) * fraction + c0
}
