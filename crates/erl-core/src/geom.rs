use core::fmt;
use core::ops::Sub;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Integer voxel coordinate in `(z, y, x)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[usize; 3]", into = "[usize; 3]")]
pub struct Voxel {
    pub z: usize,
    pub y: usize,
    pub x: usize,
}

impl Voxel {
    pub const fn new(z: usize, y: usize, x: usize) -> Self {
        Self { z, y, x }
    }
}

impl From<[usize; 3]> for Voxel {
    fn from([z, y, x]: [usize; 3]) -> Self {
        Self { z, y, x }
    }
}

impl From<Voxel> for [usize; 3] {
    fn from(v: Voxel) -> Self {
        [v.z, v.y, v.x]
    }
}

impl fmt::Display for Voxel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.z, self.y, self.x)
    }
}

/// Volume extent `(depth, height, width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[usize; 3]", into = "[usize; 3]")]
pub struct Shape3 {
    pub depth: usize,
    pub height: usize,
    pub width: usize,
}

impl Shape3 {
    pub const fn new(depth: usize, height: usize, width: usize) -> Self {
        Self {
            depth,
            height,
            width,
        }
    }

    /// Voxel count, or `None` on overflow.
    pub fn checked_len(&self) -> Option<usize> {
        self.plane_len()?.checked_mul(self.depth)
    }

    /// Voxels in one z plane, or `None` on overflow.
    pub fn plane_len(&self) -> Option<usize> {
        self.height.checked_mul(self.width)
    }

    pub fn contains(&self, v: Voxel) -> bool {
        v.z < self.depth && v.y < self.height && v.x < self.width
    }

    /// Same plane, different depth.
    pub fn with_depth(&self, depth: usize) -> Self {
        Self { depth, ..*self }
    }
}

impl From<[usize; 3]> for Shape3 {
    fn from([depth, height, width]: [usize; 3]) -> Self {
        Self {
            depth,
            height,
            width,
        }
    }
}

impl From<Shape3> for [usize; 3] {
    fn from(s: Shape3) -> Self {
        [s.depth, s.height, s.width]
    }
}

impl fmt::Display for Shape3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.depth, self.height, self.width)
    }
}

/// Physical position in `(z, y, x)` order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub z: f64,
    pub y: f64,
    pub x: f64,
}

impl Point3 {
    pub fn norm(self) -> f64 {
        (self.z * self.z + self.y * self.y + self.x * self.x).sqrt()
    }

    pub fn distance(self, other: Self) -> f64 {
        (self - other).norm()
    }
}

impl Sub for Point3 {
    type Output = Point3;

    fn sub(self, rhs: Point3) -> Self::Output {
        Point3 {
            z: self.z - rhs.z,
            y: self.y - rhs.y,
            x: self.x - rhs.x,
        }
    }
}

/// Physical units per voxel along `z`, `y`, `x`.
///
/// All three factors are positive and finite; construct through
/// [`Anisotropy::new`] or parse from `"z,y,x"` text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct Anisotropy {
    z: f64,
    y: f64,
    x: f64,
}

impl Anisotropy {
    pub const ISOTROPIC: Anisotropy = Anisotropy {
        z: 1.0,
        y: 1.0,
        x: 1.0,
    };

    pub fn new(z: f64, y: f64, x: f64) -> Result<Self, Error> {
        for (axis, v) in [("z", z), ("y", y), ("x", x)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(Error::InvalidAnisotropy(format!(
                    "{axis} factor must be positive and finite, got {v}"
                )));
            }
        }
        Ok(Self { z, y, x })
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    /// Scales a voxel coordinate into physical units.
    pub fn apply(&self, v: Voxel) -> Point3 {
        Point3 {
            z: v.z as f64 * self.z,
            y: v.y as f64 * self.y,
            x: v.x as f64 * self.x,
        }
    }
}

impl Default for Anisotropy {
    fn default() -> Self {
        Self::ISOTROPIC
    }
}

impl TryFrom<[f64; 3]> for Anisotropy {
    type Error = Error;

    fn try_from([z, y, x]: [f64; 3]) -> Result<Self, Self::Error> {
        Self::new(z, y, x)
    }
}

impl From<Anisotropy> for [f64; 3] {
    fn from(a: Anisotropy) -> Self {
        [a.z, a.y, a.x]
    }
}

impl FromStr for Anisotropy {
    type Err = Error;

    /// Accepts `z,y,x` with optional surrounding parentheses or brackets.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .trim()
            .trim_start_matches(['(', '['])
            .trim_end_matches([')', ']']);
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(Error::InvalidAnisotropy(format!(
                "expected three comma-separated factors, got '{s}'"
            )));
        }

        let mut values = [0.0f64; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| Error::InvalidAnisotropy(format!("'{part}' is not a number")))?;
        }
        Self::new(values[0], values[1], values[2])
    }
}

impl fmt::Display for Anisotropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.z, self.y, self.x)
    }
}
