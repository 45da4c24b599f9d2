//! Provisional placement reservations.
//!
//! When a building order is dispatched, its footprint (plus a margin) is
//! claimed here until the environment confirms the building exists or the
//! order is abandoned. This stops two in-flight orders from being proposed on
//! overlapping ground before the environment has had a chance to occupy it.

use serde::{Deserialize, Serialize};

use crate::orders::OrderId;

// ============================================================================
// Coordinates
// ============================================================================

/// A tile position on the placement grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TilePos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TilePos {
    /// Create a new tile position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (chessboard) distance to another tile.
    #[must_use]
    pub fn chebyshev(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

/// Size of a building in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
}

impl Footprint {
    /// Create a new footprint.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of cells covered.
    #[must_use]
    pub const fn cell_count(&self) -> u32 {
        self.width * self.height
    }

    /// True if the footprint covers no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Footprint {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Half-open cell rectangle `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRect {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

impl CellRect {
    fn expanded(origin: TilePos, footprint: Footprint, margin: u32) -> Self {
        let margin = i64::from(margin);
        Self {
            x0: i64::from(origin.x) - margin,
            y0: i64::from(origin.y) - margin,
            x1: i64::from(origin.x) + i64::from(footprint.width) + margin,
            y1: i64::from(origin.y) + i64::from(footprint.height) + margin,
        }
    }

    fn clipped(self, width: u32, height: u32) -> Self {
        Self {
            x0: self.x0.max(0),
            y0: self.y0.max(0),
            x1: self.x1.min(i64::from(width)),
            y1: self.y1.min(i64::from(height)),
        }
    }

    fn cells(self) -> impl Iterator<Item = (i64, i64)> {
        (self.y0..self.y1).flat_map(move |y| (self.x0..self.x1).map(move |x| (x, y)))
    }
}

// ============================================================================
// Reservation Grid
// ============================================================================

/// Grid of cells provisionally claimed by pending building orders.
///
/// Each cell is either free or owned by the order that claimed it. Claimed
/// regions never overlap, and a release only frees cells owned by the
/// releasing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationGrid {
    /// Grid width in cells.
    width: u32,
    /// Grid height in cells.
    height: u32,
    /// Cells claimed around every footprint.
    margin: u32,
    /// Unbuildable ring at the edge of the grid.
    border: u32,
    /// Claim owner per cell, row-major.
    cells: Vec<Option<OrderId>>,
}

impl ReservationGrid {
    /// Create an empty grid.
    #[must_use]
    pub fn new(width: u32, height: u32, margin: u32, border: u32) -> Self {
        let cell_count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            margin,
            border,
            cells: vec![None; cell_count],
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Cells claimed around every footprint.
    #[must_use]
    pub const fn margin(&self) -> u32 {
        self.margin
    }

    #[inline]
    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        // Both coordinates are inside u32 bounds here.
        Some(y as usize * self.width as usize + x as usize)
    }

    /// Order owning the cell, if any. Out-of-bounds cells have no owner.
    #[must_use]
    pub fn owner_at(&self, x: i32, y: i32) -> Option<OrderId> {
        self.index(i64::from(x), i64::from(y))
            .and_then(|index| self.cells[index])
    }

    /// True if the cell is claimed.
    #[must_use]
    pub fn is_claimed(&self, x: i32, y: i32) -> bool {
        self.owner_at(x, y).is_some()
    }

    /// Whether the expanded footprint lies inside the buildable area.
    ///
    /// Anything touching the border ring is rejected, so footprints that
    /// reach the map edge never make it to the environment's validator. The
    /// ring is at least one cell wide whatever the configured border.
    fn in_buildable_area(&self, rect: CellRect) -> bool {
        let border = i64::from(self.border.max(1));
        rect.x0 >= border
            && rect.y0 >= border
            && rect.x1 <= i64::from(self.width) - border
            && rect.y1 <= i64::from(self.height) - border
    }

    /// Check whether a claim would succeed, without mutating the grid.
    #[must_use]
    pub fn can_claim(&self, origin: TilePos, footprint: Footprint) -> bool {
        if footprint.is_empty() {
            return false;
        }
        let rect = CellRect::expanded(origin, footprint, self.margin);
        if !self.in_buildable_area(rect) {
            return false;
        }
        rect.cells()
            .all(|(x, y)| self.index(x, y).is_some_and(|index| self.cells[index].is_none()))
    }

    /// Claim the footprint (plus margin) for `owner`.
    ///
    /// Returns `false` without touching the grid if any expanded cell is
    /// already claimed or the footprint is outside the buildable area.
    pub fn claim(&mut self, origin: TilePos, footprint: Footprint, owner: OrderId) -> bool {
        if !self.can_claim(origin, footprint) {
            return false;
        }
        let rect = CellRect::expanded(origin, footprint, self.margin);
        for (x, y) in rect.cells() {
            if let Some(index) = self.index(x, y) {
                self.cells[index] = Some(owner);
            }
        }
        true
    }

    /// Free the footprint (plus margin) claimed by `owner`.
    ///
    /// Cells in the region owned by another order are left alone.
    /// Idempotent: releasing an already-free region changes nothing.
    pub fn release(&mut self, origin: TilePos, footprint: Footprint, owner: OrderId) {
        let rect = CellRect::expanded(origin, footprint, self.margin).clipped(self.width, self.height);
        for (x, y) in rect.cells() {
            if let Some(index) = self.index(x, y) {
                if self.cells[index] == Some(owner) {
                    self.cells[index] = None;
                }
            }
        }
    }

    /// All claimed cells with their owners, row-major.
    #[must_use]
    pub fn claimed_cells(&self) -> Vec<((u32, u32), OrderId)> {
        let width = self.width as usize;
        self.cells
            .iter()
            .copied()
            .enumerate()
            .filter_map(|(index, cell)| {
                cell.map(|owner| (((index % width) as u32, (index / width) as u32), owner))
            })
            .collect()
    }

    /// Number of claimed cells.
    #[must_use]
    pub fn claimed_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    /// Free every cell.
    pub fn clear(&mut self) {
        self.cells.fill(None);
    }
}
