use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

/// Upper triangle of a symmetric 3x3 virial (or kinetic) tensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Virial {
    pub xx: f64,
    pub xy: f64,
    pub xz: f64,
    pub yy: f64,
    pub yz: f64,
    pub zz: f64,
}

impl Virial {
    pub fn new(xx: f64, xy: f64, xz: f64, yy: f64, yz: f64, zz: f64) -> Self {
        Self {
            xx,
            xy,
            xz,
            yy,
            yz,
            zz,
        }
    }

    pub fn isotropic(value: f64) -> Self {
        Self::new(value, 0.0, 0.0, value, 0.0, value)
    }

    #[inline]
    pub fn trace(&self) -> f64 {
        self.xx + self.yy + self.zz
    }

    #[inline]
    pub fn components(&self) -> [f64; 6] {
        [self.xx, self.xy, self.xz, self.yy, self.yz, self.zz]
    }
}

impl Add for Virial {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            xx: self.xx + rhs.xx,
            xy: self.xy + rhs.xy,
            xz: self.xz + rhs.xz,
            yy: self.yy + rhs.yy,
            yz: self.yz + rhs.yz,
            zz: self.zz + rhs.zz,
        }
    }
}

impl AddAssign for Virial {
    fn add_assign(&mut self, rhs: Self) {
        self.xx += rhs.xx;
        self.xy += rhs.xy;
        self.xz += rhs.xz;
        self.yy += rhs.yy;
        self.yz += rhs.yz;
        self.zz += rhs.zz;
    }
}

impl Mul<f64> for Virial {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self {
            xx: self.xx * rhs,
            xy: self.xy * rhs,
            xz: self.xz * rhs,
            yy: self.yy * rhs,
            yz: self.yz * rhs,
            zz: self.zz * rhs,
        }
    }
}

impl Sum for Virial {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, term| acc + term)
    }
}
