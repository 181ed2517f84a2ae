//! Grid edge access for the step loop
//!
//! The simulation itself lives elsewhere; the coordinator only needs to read
//! this peer's outgoing border and overwrite its ghost column.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::protocol::{BorderVector, Pixel, Role};

const ALIVE: Pixel = [255, 255, 255];
const DEAD: Pixel = [0, 0, 0];

/// Owner of a grid snapshot that can publish and accept border columns
pub trait GridEdges {
    /// Columns including both ghost columns
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Border this peer sends for the given role
    fn get_edge(&self, role: Role) -> BorderVector;

    /// Store the partner's border in this peer's ghost column
    fn set_edge(&mut self, role: Role, edge: BorderVector);
}

/// Row-major RGB grid held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    pixels: Vec<Pixel>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![DEAD; width * height],
        }
    }

    /// Random live/dead cells, reproducible for a given seed
    pub fn seeded(width: usize, height: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let pixels = (0..width * height)
            .map(|_| if rng.gen_bool(0.5) { ALIVE } else { DEAD })
            .collect();

        Self { width, height, pixels }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, row: usize, col: usize) -> Pixel {
        self.pixels[row * self.width + col]
    }

    pub fn set(&mut self, row: usize, col: usize, pixel: Pixel) {
        self.pixels[row * self.width + col] = pixel;
    }

    pub fn column(&self, col: usize) -> BorderVector {
        (0..self.height).map(|row| self.get(row, col)).collect::<Vec<_>>().into()
    }

    pub fn set_column(&mut self, col: usize, edge: &BorderVector) {
        for (row, pixel) in edge.pixels().iter().take(self.height).enumerate() {
            self.set(row, col, *pixel);
        }
    }

    /// Number of cells that are not fully dark
    pub fn live_cells(&self) -> usize {
        self.pixels.iter().filter(|p| **p != DEAD).count()
    }
}

impl GridEdges for Grid {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn get_edge(&self, role: Role) -> BorderVector {
        self.column(role.send_column(self.width))
    }

    fn set_edge(&mut self, role: Role, edge: BorderVector) {
        self.set_column(role.receive_column(self.width), &edge);
    }
}
