//! Rectangular and diamond-shaped tile sets and their iterators.
//!
//! Iterators are finite and not restartable: once exhausted they keep
//! returning `None`.

use crate::map::{MapSize, TileIndex};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle of tiles anchored at its north corner.
///
/// A zero-width area is empty; [`OrthogonalTileArea::add_tile`] on an empty
/// area turns it into the 1x1 area of that tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrthogonalTileArea {
    pub tile: TileIndex,
    pub w: u16,
    pub h: u16,
}

impl OrthogonalTileArea {
    pub fn new(tile: TileIndex, w: u16, h: u16) -> Self {
        Self { tile, w, h }
    }

    pub fn empty() -> Self {
        Self::new(TileIndex(0), 0, 0)
    }

    /// Smallest area covering both corner tiles.
    pub fn from_corners(size: MapSize, a: TileIndex, b: TileIndex) -> Self {
        let (ax, ay) = (size.tile_x(a), size.tile_y(a));
        let (bx, by) = (size.tile_x(b), size.tile_y(b));
        let (sx, ex) = (ax.min(bx), ax.max(bx));
        let (sy, ey) = (ay.min(by), ay.max(by));
        Self::new(
            size.tile(sx, sy),
            (ex - sx + 1) as u16,
            (ey - sy + 1) as u16,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    fn bounds(&self, size: MapSize) -> (u32, u32, u32, u32) {
        let left = size.tile_x(self.tile);
        let top = size.tile_y(self.tile);
        (
            left,
            top,
            left + self.w as u32 - 1,
            top + self.h as u32 - 1,
        )
    }

    /// Grow the area to cover `tile`.
    pub fn add_tile(&mut self, size: MapSize, tile: TileIndex) {
        if self.is_empty() {
            *self = Self::new(tile, 1, 1);
            return;
        }
        let (left, top, right, bottom) = self.bounds(size);
        let (x, y) = (size.tile_x(tile), size.tile_y(tile));
        let (sx, sy) = (left.min(x), top.min(y));
        let (ex, ey) = (right.max(x), bottom.max(y));
        *self = Self::new(
            size.tile(sx, sy),
            (ex - sx + 1) as u16,
            (ey - sy + 1) as u16,
        );
    }

    /// Grow the area to cover `other`.
    pub fn add_area(&mut self, size: MapSize, other: &OrthogonalTileArea) {
        if other.is_empty() {
            return;
        }
        let (_, _, right, bottom) = other.bounds(size);
        self.add_tile(size, other.tile);
        self.add_tile(size, size.tile(right, bottom));
    }

    pub fn intersects(&self, size: MapSize, other: &OrthogonalTileArea) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        let (left1, top1, right1, bottom1) = self.bounds(size);
        let (left2, top2, right2, bottom2) = other.bounds(size);
        !(left2 > right1 || right2 < left1 || top2 > bottom1 || bottom2 < top1)
    }

    pub fn contains(&self, size: MapSize, tile: TileIndex) -> bool {
        if self.is_empty() {
            return false;
        }
        let (left, top, right, bottom) = self.bounds(size);
        let (x, y) = (size.tile_x(tile), size.tile_y(tile));
        (left..=right).contains(&x) && (top..=bottom).contains(&y)
    }

    /// Grow by `rad` tiles in every direction, clipped to the map.
    pub fn expand(&mut self, size: MapSize, rad: u32) {
        if self.is_empty() {
            return;
        }
        let (left, top, right, bottom) = self.bounds(size);
        let sx = left.saturating_sub(rad);
        let sy = top.saturating_sub(rad);
        let ex = (right + rad).min(size.x - 1);
        let ey = (bottom + rad).min(size.y - 1);
        *self = Self::new(
            size.tile(sx, sy),
            (ex - sx + 1) as u16,
            (ey - sy + 1) as u16,
        );
    }

    /// Cut off any part of the area beyond the map edge.
    pub fn clamp_to_map(&mut self, size: MapSize) {
        let x = size.tile_x(self.tile);
        let y = size.tile_y(self.tile);
        self.w = self.w.min((size.x - x) as u16);
        self.h = self.h.min((size.y - y) as u16);
    }

    /// The tile of the area closest to `tile`.
    pub fn closest_tile(&self, size: MapSize, tile: TileIndex) -> Option<TileIndex> {
        if self.is_empty() {
            return None;
        }
        let (left, top, right, bottom) = self.bounds(size);
        let x = size.tile_x(tile).clamp(left, right);
        let y = size.tile_y(tile).clamp(top, bottom);
        Some(size.tile(x, y))
    }

    /// Remove `tile` from the edge of the area, shrinking it when a full
    /// border row or column is gone. `still_member` reports whether a tile of
    /// the area still belongs to the owner of the area.
    pub fn shrink_after_removal(
        &mut self,
        size: MapSize,
        mut still_member: impl FnMut(TileIndex) -> bool,
    ) {
        loop {
            if self.is_empty() {
                *self = Self::empty();
                return;
            }
            let (left, top, right, bottom) = self.bounds(size);
            let row_empty = |y: u32, f: &mut dyn FnMut(TileIndex) -> bool| {
                (left..=right).all(|x| !f(size.tile(x, y)))
            };
            let col_empty = |x: u32, f: &mut dyn FnMut(TileIndex) -> bool| {
                (top..=bottom).all(|y| !f(size.tile(x, y)))
            };
            if row_empty(top, &mut still_member) {
                self.tile = size.tile(left, top + (self.h > 1) as u32);
                self.h -= 1;
            } else if row_empty(bottom, &mut still_member) {
                self.h -= 1;
            } else if col_empty(left, &mut still_member) {
                self.tile = size.tile(left + (self.w > 1) as u32, top);
                self.w -= 1;
            } else if col_empty(right, &mut still_member) {
                self.w -= 1;
            } else {
                return;
            }
        }
    }

    pub fn iter(&self, size: MapSize) -> OrthogonalTileIterator {
        OrthogonalTileIterator::new(size, *self)
    }
}

/// Row-major walk over an [`OrthogonalTileArea`].
#[derive(Debug, Clone)]
pub struct OrthogonalTileIterator {
    size: MapSize,
    current: Option<TileIndex>,
    w: u16,
    x: u16,
    y: u16,
}

impl OrthogonalTileIterator {
    pub fn new(size: MapSize, area: OrthogonalTileArea) -> Self {
        Self {
            size,
            current: (!area.is_empty()).then_some(area.tile),
            w: area.w,
            x: area.w,
            y: area.h,
        }
    }
}

impl Iterator for OrthogonalTileIterator {
    type Item = TileIndex;

    fn next(&mut self) -> Option<TileIndex> {
        let tile = self.current?;
        self.x -= 1;
        self.current = if self.x > 0 {
            Some(TileIndex(tile.0 + 1))
        } else {
            self.y -= 1;
            if self.y > 0 {
                self.x = self.w;
                Some(TileIndex(tile.0 + 1 + self.size.x - self.w as u32))
            } else {
                None
            }
        };
        Some(tile)
    }
}

/// Diamond of tiles in rotated coordinates `a = x + y`, `b = x - y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiagonalTileArea {
    pub a0: i64,
    pub a1: i64,
    pub b0: i64,
    pub b1: i64,
}

impl DiagonalTileArea {
    /// Diamond spanned by two corner tiles.
    pub fn from_corners(size: MapSize, c1: TileIndex, c2: TileIndex) -> Self {
        let (a_1, b_1) = rotate(size, c1);
        let (a_2, b_2) = rotate(size, c2);
        Self {
            a0: a_1.min(a_2),
            a1: a_1.max(a_2),
            b0: b_1.min(b_2),
            b1: b_1.max(b_2),
        }
    }

    pub fn contains(&self, size: MapSize, tile: TileIndex) -> bool {
        let (a, b) = rotate(size, tile);
        (self.a0..=self.a1).contains(&a) && (self.b0..=self.b1).contains(&b)
    }

    pub fn iter(&self, size: MapSize) -> DiagonalTileIterator {
        DiagonalTileIterator::new(size, *self)
    }
}

fn rotate(size: MapSize, tile: TileIndex) -> (i64, i64) {
    let x = size.tile_x(tile) as i64;
    let y = size.tile_y(tile) as i64;
    (x + y, x - y)
}

/// Walks a [`DiagonalTileArea`] one `a` row at a time.
///
/// A tile exists at `(a, b)` only when `a` and `b` share parity, so rows
/// alternate between starting at `b0` and at `b0 + 1` depending on whether
/// `a - b0` is even or odd. When the side difference `b1 - b0` is even the
/// even rows are one tile longer than the odd ones; when it is odd all rows
/// have the same length.
#[derive(Debug, Clone)]
pub struct DiagonalTileIterator {
    size: MapSize,
    area: DiagonalTileArea,
    a: i64,
    b: i64,
}

impl DiagonalTileIterator {
    pub fn new(size: MapSize, area: DiagonalTileArea) -> Self {
        let mut it = Self {
            size,
            area,
            a: area.a0,
            b: row_start(area.a0, area.b0),
        };
        if it.b > area.b1 {
            it.advance_row();
        }
        it
    }

    fn advance_row(&mut self) {
        loop {
            self.a += 1;
            if self.a > self.area.a1 {
                return;
            }
            self.b = row_start(self.a, self.area.b0);
            if self.b <= self.area.b1 {
                return;
            }
        }
    }
}

/// First `b >= b0` with the parity of `a`.
fn row_start(a: i64, b0: i64) -> i64 {
    if (a - b0).rem_euclid(2) == 0 {
        b0
    } else {
        b0 + 1
    }
}

impl Iterator for DiagonalTileIterator {
    type Item = TileIndex;

    fn next(&mut self) -> Option<TileIndex> {
        while self.a <= self.area.a1 {
            let (a, b) = (self.a, self.b);
            self.b += 2;
            if self.b > self.area.b1 {
                self.advance_row();
            }
            // Parity matches, so both divisions are exact
            let x = (a + b) / 2;
            let y = (a - b) / 2;
            if let Some(tile) = self.size.tile_checked(x, y) {
                return Some(tile);
            }
        }
        None
    }
}

/// Either shape behind one iterator type.
#[derive(Debug, Clone)]
pub enum TileIter {
    Orthogonal(OrthogonalTileIterator),
    Diagonal(DiagonalTileIterator),
}

impl TileIter {
    /// Iterate the area spanned by two corners, as a rectangle or a diamond.
    pub fn between(size: MapSize, c1: TileIndex, c2: TileIndex, diagonal: bool) -> TileIter {
        if diagonal {
            TileIter::Diagonal(DiagonalTileArea::from_corners(size, c1, c2).iter(size))
        } else {
            TileIter::Orthogonal(OrthogonalTileArea::from_corners(size, c1, c2).iter(size))
        }
    }
}

impl Iterator for TileIter {
    type Item = TileIndex;

    fn next(&mut self) -> Option<TileIndex> {
        match self {
            TileIter::Orthogonal(it) => it.next(),
            TileIter::Diagonal(it) => it.next(),
        }
    }
}

/// Spiral search: the start area's tiles are not produced; the rings around
/// it are, innermost first, each walked clockwise from its north corner.
#[derive(Debug, Clone)]
pub struct CircularTileIterator {
    size: MapSize,
    /// Bounds of the area being circled (inclusive, signed).
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
    radius: u32,
    ring: u32,
    side: u8,
    step: i64,
    started: bool,
    include_center: Option<TileIndex>,
}

impl CircularTileIterator {
    /// The center tile followed by every ring up to `radius`.
    pub fn around_tile(size: MapSize, center: TileIndex, radius: u32) -> Self {
        let mut it = Self::around_area(size, OrthogonalTileArea::new(center, 1, 1), radius);
        it.include_center = Some(center);
        it
    }

    /// The rings around a rectangle, up to `radius` tiles away.
    pub fn around_area(size: MapSize, area: OrthogonalTileArea, radius: u32) -> Self {
        let left = size.tile_x(area.tile) as i64;
        let top = size.tile_y(area.tile) as i64;
        Self {
            size,
            left,
            top,
            right: left + area.w.max(1) as i64 - 1,
            bottom: top + area.h.max(1) as i64 - 1,
            radius,
            ring: 1,
            side: 0,
            step: 0,
            started: false,
            include_center: None,
        }
    }

    /// Current ring's corner-to-corner side lengths (exclusive of end corner).
    fn side_len(&self, side: u8) -> i64 {
        let r = self.ring as i64;
        match side {
            0 | 2 => self.right - self.left + 2 * r,
            _ => self.bottom - self.top + 2 * r,
        }
    }

    fn current_xy(&self) -> (i64, i64) {
        let r = self.ring as i64;
        let (nx, ny) = (self.left - r, self.top - r);
        let (sx, sy) = (self.right + r, self.bottom + r);
        match self.side {
            0 => (nx + self.step, ny),
            1 => (sx, ny + self.step),
            2 => (sx - self.step, sy),
            _ => (nx, sy - self.step),
        }
    }
}

impl Iterator for CircularTileIterator {
    type Item = TileIndex;

    fn next(&mut self) -> Option<TileIndex> {
        if !self.started {
            self.started = true;
            if let Some(center) = self.include_center {
                return Some(center);
            }
        }
        while self.ring <= self.radius {
            let (x, y) = self.current_xy();
            self.step += 1;
            if self.step >= self.side_len(self.side) {
                self.step = 0;
                self.side += 1;
                if self.side == 4 {
                    self.side = 0;
                    self.ring += 1;
                }
            }
            if let Some(tile) = self.size.tile_checked(x, y) {
                return Some(tile);
            }
        }
        None
    }
}
