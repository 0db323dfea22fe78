//! Rectangular, non-wrapping grid storage. The world is a `width x height`
//! block of cells addressed by `(x, y)` with `(0, 0)` in the top-left corner
//! and y growing southward. Cells are stored column-major so that the
//! canonical iteration order (x outer, y inner) walks memory linearly.

use serde::{Deserialize, Serialize};

/// Offsets of the 4 cardinal neighbors, in N/E/S/W order.
pub const DIRS4: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Offsets of all 8 neighbors, row by row.
pub const DIRS8: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// A cardinal direction, used for river connections. The order matches the
/// bit layout of the river mask.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// The `(dx, dy)` offset of the neighbor in this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::East => Self::West,
            Self::South => Self::North,
            Self::West => Self::East,
        }
    }
}

/// Dense 2D storage for one per-tile field. Cells can be mutated but never
/// added or removed: the world's shape is fixed at allocation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: u32,
    height: u32,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    pub fn new(width: u32, height: u32) -> Self
    where
        T: Default + Clone,
    {
        Self::filled(width, height, T::default())
    }

    pub fn filled(width: u32, height: u32, value: T) -> Self
    where
        T: Clone,
    {
        Self {
            width,
            height,
            cells: vec![value; (width as usize) * (height as usize)],
        }
    }

    /// Build a grid by calling `f` once per cell, in column-major order.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> T) -> Self {
        let mut cells = Vec::with_capacity((width as usize) * (height as usize));
        for x in 0..width {
            for y in 0..height {
                cells.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (x as usize) * (self.height as usize) + (y as usize)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    pub fn get(&self, x: u32, y: u32) -> &T {
        &self.cells[self.index(x, y)]
    }

    pub fn get_mut(&mut self, x: u32, y: u32) -> &mut T {
        let i = self.index(x, y);
        &mut self.cells[i]
    }

    pub fn set(&mut self, x: u32, y: u32, value: T) {
        let i = self.index(x, y);
        self.cells[i] = value;
    }

    /// Checked lookup with signed coordinates; `None` when off the map.
    pub fn checked(&self, x: i32, y: i32) -> Option<&T> {
        if self.contains(x, y) {
            Some(self.get(x as u32, y as u32))
        } else {
            None
        }
    }

    /// Iterate all coordinates in the canonical column-major order (x outer).
    /// Every full-map pass in the pipeline goes through this so that RNG
    /// consumption order is fixed.
    pub fn coords(&self) -> impl Iterator<Item = (u32, u32)> {
        let (w, h) = (self.width, self.height);
        (0..w).flat_map(move |x| (0..h).map(move |y| (x, y)))
    }

    pub fn cells(&self) -> impl Iterator<Item = &T> {
        self.cells.iter()
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.cells.iter_mut()
    }

    /// 4-connected neighbor coordinates of `(x, y)`, in N/E/S/W order.
    pub fn neighbors4(&self, x: u32, y: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        DIRS4.iter().filter_map(move |&(dx, dy)| {
            let (nx, ny) = (x as i32 + dx, y as i32 + dy);
            self.contains(nx, ny).then(|| (nx as u32, ny as u32))
        })
    }

    /// 8-connected neighbor coordinates of `(x, y)`.
    pub fn neighbors8(&self, x: u32, y: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        DIRS8.iter().filter_map(move |&(dx, dy)| {
            let (nx, ny) = (x as i32 + dx, y as i32 + dy);
            self.contains(nx, ny).then(|| (nx as u32, ny as u32))
        })
    }

    /// All in-bounds coordinates within Chebyshev distance `radius` of
    /// `(x, y)`, including the center, in column-major order.
    pub fn square(&self, x: u32, y: u32, radius: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        let r = radius as i32;
        let (cx, cy) = (x as i32, y as i32);
        (cx - r..=cx + r).flat_map(move |nx| {
            (cy - r..=cy + r)
                .filter_map(move |ny| self.contains(nx, ny).then(|| (nx as u32, ny as u32)))
        })
    }
}

/// Chebyshev (king-move) distance between two cells.
pub fn chebyshev_distance(a: (u32, u32), b: (u32, u32)) -> u32 {
    let dx = (a.0 as i32 - b.0 as i32).unsigned_abs();
    let dy = (a.1 as i32 - b.1 as i32).unsigned_abs();
    dx.max(dy)
}

/// Straight-line distance between two cells, for start-position spacing.
pub fn euclidean_distance(a: (u32, u32), b: (u32, u32)) -> f64 {
    let dx = a.0 as f64 - b.0 as f64;
    let dy = a.1 as f64 - b.1 as f64;
    (dx * dx + dy * dy).sqrt()
}
