use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// The set of optional observables that consumers need this step.
///
/// Force kernels skip virial accumulation and the thermo reducer skips the corresponding
/// sums when nobody asked for them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RequestedFlags(u8);

impl RequestedFlags {
    pub const NONE: Self = Self(0);
    pub const POTENTIAL_ENERGY: Self = Self(1 << 0);
    pub const VIRIAL: Self = Self(1 << 1);
    pub const PRESSURE_TENSOR: Self = Self(1 << 2);
    pub const ISOTROPIC_VIRIAL: Self = Self(1 << 3);
    pub const ROTATIONAL_KINETIC_ENERGY: Self = Self(1 << 4);

    const NAMES: [(Self, &'static str); 5] = [
        (Self::POTENTIAL_ENERGY, "potential_energy"),
        (Self::VIRIAL, "virial"),
        (Self::PRESSURE_TENSOR, "pressure_tensor"),
        (Self::ISOTROPIC_VIRIAL, "isotropic_virial"),
        (Self::ROTATIONAL_KINETIC_ENERGY, "rotational_kinetic_energy"),
    ];

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether force kernels must accumulate per-particle virials.
    #[inline]
    pub fn needs_virial(self) -> bool {
        self.intersects(Self::VIRIAL | Self::PRESSURE_TENSOR | Self::ISOTROPIC_VIRIAL)
    }
}

impl BitOr for RequestedFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RequestedFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for RequestedFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "RequestedFlags({})", names.join(" | "))
    }
}
