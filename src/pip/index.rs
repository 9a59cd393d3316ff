//! Uniform grid index over the boundary store.

use rayon::prelude::*;
use tracing::{debug, info};

use super::boundary::{BoundaryStore, PolygonView};
use super::geometry::{scanline_crossings, suffix_windings, winding_at};
use crate::config::IndexConfig;
use crate::error::Result;

/// One candidate polygon registered in a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellEntry(u32);

impl CellEntry {
    const INTERIOR: u32 = 1 << 31;

    fn boundary(polygon: u32) -> Self {
        CellEntry(polygon)
    }

    fn interior(polygon: u32) -> Self {
        CellEntry(polygon | Self::INTERIOR)
    }

    /// Index of the polygon in the boundary store
    #[inline]
    pub fn polygon(self) -> usize {
        (self.0 & !Self::INTERIOR) as usize
    }

    /// The whole cell lies inside the polygon, so no exact test is needed.
    #[inline]
    pub fn is_interior(self) -> bool {
        self.0 & Self::INTERIOR != 0
    }
}

/// Cell arithmetic shared by build and query.
#[derive(Debug, Clone, Copy)]
struct Grid {
    scale: f64,
    cols: usize,
    rows: usize,
}

impl Grid {
    fn new(cells_per_degree: u32) -> Self {
        Self {
            scale: cells_per_degree as f64,
            cols: 360 * cells_per_degree as usize,
            rows: 180 * cells_per_degree as usize,
        }
    }

    /// `as usize` saturates negatives (and NaN) to 0 and floors the rest.
    #[inline(always)]
    fn col(&self, lon: f64) -> usize {
        (((lon + 180.0) * self.scale) as usize).min(self.cols - 1)
    }

    #[inline(always)]
    fn row(&self, lat: f64) -> usize {
        (((lat + 90.0) * self.scale) as usize).min(self.rows - 1)
    }

    fn col_center(&self, col: usize) -> f64 {
        (col as f64 + 0.5) / self.scale - 180.0
    }

    fn row_center(&self, row: usize) -> f64 {
        (row as f64 + 0.5) / self.scale - 90.0
    }
}

/// Summary of an index build
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexStats {
    pub cells: usize,
    pub occupied_cells: usize,
    pub entries: usize,
    pub interior_entries: usize,
    pub max_candidates: usize,
    pub mean_candidates: f64,
}

/// Uniform lat/lon grid mapping each cell to its candidate polygons.
///
/// Cell `row * cols + col` covers
/// `[col / k - 180, (col + 1) / k - 180) x [row / k - 90, (row + 1) / k - 90)`
/// for `k` cells per degree; the top row also owns latitude `90`.
/// A cell's entries are sorted by the owning country's numeric id, so the
/// first containing entry is the lowest-id match.
pub struct GridIndex {
    grid: Grid,
    cells_per_degree: u32,
    offsets: Vec<u32>,
    entries: Vec<CellEntry>,
}

impl GridIndex {
    pub fn build(store: &BoundaryStore, config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        let grid = Grid::new(config.cells_per_degree);

        info!(
            "Building {}x{} grid index for {} polygons...",
            grid.cols,
            grid.rows,
            store.polygon_count()
        );

        let per_polygon: Vec<Vec<(u32, CellEntry)>> = (0..store.polygon_count())
            .into_par_iter()
            .map(|p| rasterize(&grid, store.polygon(p), p as u32))
            .collect();

        let mut registered: Vec<(u32, u16, CellEntry)> = per_polygon
            .into_iter()
            .flatten()
            .map(|(cell, entry)| {
                let id = store.polygon(entry.polygon()).country().numeric_id();
                (cell, id, entry)
            })
            .collect();
        registered.par_sort_unstable_by_key(|&(cell, id, entry)| (cell, id, entry.polygon()));

        let cell_count = grid.cols * grid.rows;
        let mut offsets = Vec::with_capacity(cell_count + 1);
        let mut entries = Vec::with_capacity(registered.len());
        let mut next = registered.iter().peekable();
        offsets.push(0);
        for cell in 0..cell_count as u32 {
            while let Some((_, _, entry)) = next.next_if(|(c, _, _)| *c == cell) {
                entries.push(*entry);
            }
            offsets.push(entries.len() as u32);
        }

        let index = Self {
            grid,
            cells_per_degree: config.cells_per_degree,
            offsets,
            entries,
        };

        let stats = index.stats();
        info!(
            "Grid index built: {} of {} cells occupied, {} entries ({} interior), \
             max {} candidates, mean {:.2}",
            stats.occupied_cells,
            stats.cells,
            stats.entries,
            stats.interior_entries,
            stats.max_candidates,
            stats.mean_candidates
        );

        Ok(index)
    }

    pub fn cells_per_degree(&self) -> u32 {
        self.cells_per_degree
    }

    /// Cell owning a normalized coordinate (`lat` in [-90, 90], `lon` in [-180, 180)).
    #[inline]
    pub fn cell(&self, lat: f64, lon: f64) -> usize {
        self.grid.row(lat) * self.grid.cols + self.grid.col(lon)
    }

    #[inline]
    pub fn candidates(&self, cell: usize) -> &[CellEntry] {
        let start = self.offsets[cell] as usize;
        let end = self.offsets[cell + 1] as usize;
        &self.entries[start..end]
    }

    pub fn cell_count(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn stats(&self) -> IndexStats {
        let cells = self.cell_count();
        let mut occupied_cells = 0;
        let mut max_candidates = 0;
        for cell in 0..cells {
            let n = self.candidates(cell).len();
            if n > 0 {
                occupied_cells += 1;
                max_candidates = max_candidates.max(n);
            }
        }
        IndexStats {
            cells,
            occupied_cells,
            entries: self.entries.len(),
            interior_entries: self.entries.iter().filter(|e| e.is_interior()).count(),
            max_candidates,
            mean_candidates: if occupied_cells == 0 {
                0.0
            } else {
                self.entries.len() as f64 / occupied_cells as f64
            },
        }
    }
}

/// Register one polygon in every cell it can occupy.
///
/// Cells covered by the bounding box of any edge get a boundary entry. Every
/// other cell inside the polygon's bounding box lies entirely on one side of
/// the boundary, so its centre decides: inside gives an interior entry,
/// outside gives nothing.
fn rasterize(grid: &Grid, polygon: PolygonView<'_>, index: u32) -> Vec<(u32, CellEntry)> {
    let bbox = polygon.bbox();
    let (c0, c1) = (grid.col(bbox.min_lon), grid.col(bbox.max_lon));
    let (r0, r1) = (grid.row(bbox.min_lat), grid.row(bbox.max_lat));
    let width = c1 - c0 + 1;

    let mut touched = vec![false; width * (r1 - r0 + 1)];
    for ring in polygon.rings() {
        for edge in ring.windows(2) {
            let (a, b) = (edge[0], edge[1]);
            if a == b {
                continue;
            }
            let (ea, eb) = (grid.col(a.x.min(b.x)), grid.col(a.x.max(b.x)));
            let (ra, rb) = (grid.row(a.y.min(b.y)), grid.row(a.y.max(b.y)));
            for row in ra..=rb {
                let line = (row - r0) * width;
                touched[line + ea - c0..=line + eb - c0].fill(true);
            }
        }
    }

    let mut out = Vec::new();
    let mut crossings = Vec::new();
    let mut suffix = Vec::new();
    for row in r0..=r1 {
        scanline_crossings(polygon.rings(), grid.row_center(row), &mut crossings);
        suffix_windings(&crossings, &mut suffix);
        let line = (row - r0) * width;
        for col in c0..=c1 {
            let cell = (row * grid.cols + col) as u32;
            if touched[line + col - c0] {
                out.push((cell, CellEntry::boundary(index)));
            } else if winding_at(&crossings, &suffix, grid.col_center(col)) != 0 {
                out.push((cell, CellEntry::interior(index)));
            }
        }
    }

    debug!(
        "Polygon {} of country {} registered in {} cells",
        index,
        polygon.country().numeric_id(),
        out.len()
    );

    out
}
