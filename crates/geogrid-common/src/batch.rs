//! Batch generators for iterating large grids in bounded windows.
//!
//! A batch is an axis-aligned window of grid indices, exposed as half-open
//! ranges. The generators cover the whole grid exhaustively without
//! overlap; with no cap a single window covers everything. Batch sizes aim
//! for a cube-like shape under the cap: an axis no larger than the
//! cube-root target is taken whole and the remaining axes solved with the
//! correspondingly larger cap.

use std::fmt;
use std::ops::Range;

/// A 2-D window of grid indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch2D {
    pub x_range: Range<usize>,
    pub y_range: Range<usize>,
}

impl Batch2D {
    /// Number of grid points in the window.
    pub fn len(&self) -> usize {
        self.x_range.len() * self.y_range.len()
    }

    /// True when the window is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Batch2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Batch2D [{}:{}, {}:{}]",
            self.x_range.start, self.x_range.end, self.y_range.start, self.y_range.end
        )
    }
}

/// A 3-D window of grid indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch3D {
    pub x_range: Range<usize>,
    pub y_range: Range<usize>,
    pub z_range: Range<usize>,
}

impl Batch3D {
    /// Number of grid points in the window.
    pub fn len(&self) -> usize {
        self.x_range.len() * self.y_range.len() * self.z_range.len()
    }

    /// True when the window is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Batch3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Batch3D [{}:{}, {}:{}, {}:{}]",
            self.x_range.start,
            self.x_range.end,
            self.y_range.start,
            self.y_range.end,
            self.z_range.start,
            self.z_range.end
        )
    }
}

/// Largest edge whose square fits under the cap.
fn square_edge(cap: usize) -> usize {
    let mut edge = (cap as f64).sqrt().round() as usize;
    while edge > 1 && edge * edge > cap {
        edge -= 1;
    }
    edge.max(1)
}

/// Largest edge whose cube fits under the cap.
fn cube_edge(cap: usize) -> usize {
    let mut edge = (cap as f64).cbrt().round() as usize;
    while edge > 1 && edge * edge * edge > cap {
        edge -= 1;
    }
    edge.max(1)
}

/// Choose 2-D batch sizes whose product stays at or under the cap.
fn batch_sizes_2d(num_x: usize, num_y: usize, cap: usize) -> (usize, usize) {
    let cap = cap.max(1);
    if num_x * num_y <= cap {
        return (num_x, num_y);
    }
    let target = square_edge(cap);
    if num_x > target && num_y > target {
        (target, target)
    } else if num_x <= target {
        (num_x, (cap / num_x).max(1))
    } else {
        ((cap / num_y).max(1), num_y)
    }
}

/// Choose 3-D batch sizes whose product stays at or under the cap.
///
/// An axis already at or below the cube-root target is taken whole and the
/// remaining axes solved as a 2-D problem with the reduced cap.
fn batch_sizes_3d(num_x: usize, num_y: usize, num_z: usize, cap: usize) -> (usize, usize, usize) {
    let cap = cap.max(1);
    if num_x * num_y * num_z <= cap {
        return (num_x, num_y, num_z);
    }
    let target = cube_edge(cap);
    if num_x > target && num_y > target && num_z > target {
        (target, target, target)
    } else if num_z <= target {
        let (bx, by) = batch_sizes_2d(num_x, num_y, cap / num_z.max(1));
        (bx, by, num_z)
    } else if num_x <= target {
        let (by, bz) = batch_sizes_2d(num_y, num_z, cap / num_x.max(1));
        (num_x, by, bz)
    } else {
        let (bx, bz) = batch_sizes_2d(num_x, num_z, cap / num_y.max(1));
        (bx, num_y, bz)
    }
}

fn div_ceil(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

/// Iterator over 2-D batches covering `[0, num_x) x [0, num_y)`.
#[derive(Debug, Clone)]
pub struct BatchGenerator2D {
    num_x: usize,
    num_y: usize,
    bnum_x: usize,
    bnum_y: usize,
    nbatch_x: usize,
    nbatch_y: usize,
    ix: usize,
    iy: usize,
}

impl BatchGenerator2D {
    /// Create a generator; `max_points` caps the point count per batch.
    pub fn new(num_x: usize, num_y: usize, max_points: Option<usize>) -> Self {
        let (bnum_x, bnum_y) = match max_points {
            Some(cap) => batch_sizes_2d(num_x, num_y, cap),
            None => (num_x, num_y),
        };
        let generator = Self {
            num_x,
            num_y,
            bnum_x,
            bnum_y,
            nbatch_x: div_ceil(num_x, bnum_x),
            nbatch_y: div_ceil(num_y, bnum_y),
            ix: 0,
            iy: 0,
        };
        tracing::debug!(
            batch_x = generator.bnum_x,
            batch_y = generator.bnum_y,
            count_x = generator.nbatch_x,
            count_y = generator.nbatch_y,
            "2D batches"
        );
        generator
    }

    /// Total number of batches.
    pub fn num_batches(&self) -> usize {
        self.nbatch_x * self.nbatch_y
    }
}

impl Iterator for BatchGenerator2D {
    type Item = Batch2D;

    fn next(&mut self) -> Option<Batch2D> {
        if self.ix >= self.nbatch_x {
            return None;
        }
        let x_start = self.ix * self.bnum_x;
        let y_start = self.iy * self.bnum_y;
        let batch = Batch2D {
            x_range: x_start..(x_start + self.bnum_x).min(self.num_x),
            y_range: y_start..(y_start + self.bnum_y).min(self.num_y),
        };
        self.iy += 1;
        if self.iy >= self.nbatch_y {
            self.iy = 0;
            self.ix += 1;
        }
        Some(batch)
    }
}

/// Iterator over 3-D batches covering `[0, num_x) x [0, num_y) x [0, num_z)`.
#[derive(Debug, Clone)]
pub struct BatchGenerator3D {
    num_x: usize,
    num_y: usize,
    num_z: usize,
    bnum_x: usize,
    bnum_y: usize,
    bnum_z: usize,
    nbatch_x: usize,
    nbatch_y: usize,
    nbatch_z: usize,
    ix: usize,
    iy: usize,
    iz: usize,
}

impl BatchGenerator3D {
    /// Create a generator; `max_points` caps the point count per batch.
    pub fn new(num_x: usize, num_y: usize, num_z: usize, max_points: Option<usize>) -> Self {
        let (bnum_x, bnum_y, bnum_z) = match max_points {
            Some(cap) => batch_sizes_3d(num_x, num_y, num_z, cap),
            None => (num_x, num_y, num_z),
        };
        let generator = Self {
            num_x,
            num_y,
            num_z,
            bnum_x,
            bnum_y,
            bnum_z,
            nbatch_x: div_ceil(num_x, bnum_x),
            nbatch_y: div_ceil(num_y, bnum_y),
            nbatch_z: div_ceil(num_z, bnum_z),
            ix: 0,
            iy: 0,
            iz: 0,
        };
        tracing::debug!(
            batch_x = generator.bnum_x,
            batch_y = generator.bnum_y,
            batch_z = generator.bnum_z,
            count_x = generator.nbatch_x,
            count_y = generator.nbatch_y,
            count_z = generator.nbatch_z,
            "3D batches"
        );
        generator
    }

    /// Total number of batches.
    pub fn num_batches(&self) -> usize {
        self.nbatch_x * self.nbatch_y * self.nbatch_z
    }
}

impl Iterator for BatchGenerator3D {
    type Item = Batch3D;

    fn next(&mut self) -> Option<Batch3D> {
        if self.ix >= self.nbatch_x {
            return None;
        }
        let x_start = self.ix * self.bnum_x;
        let y_start = self.iy * self.bnum_y;
        let z_start = self.iz * self.bnum_z;
        let batch = Batch3D {
            x_range: x_start..(x_start + self.bnum_x).min(self.num_x),
            y_range: y_start..(y_start + self.bnum_y).min(self.num_y),
            z_range: z_start..(z_start + self.bnum_z).min(self.num_z),
        };
        self.iz += 1;
        if self.iz >= self.nbatch_z {
            self.iz = 0;
            self.iy += 1;
        }
        if self.iy >= self.nbatch_y {
            self.iz = 0;
            self.iy = 0;
            self.ix += 1;
        }
        Some(batch)
    }
}
