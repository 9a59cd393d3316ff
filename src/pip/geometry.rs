//! Point-in-polygon evaluation.
//!
//! Containment uses the winding number of a ray cast toward +x. Outer rings
//! are counter-clockwise (+1 inside) and holes clockwise (-1 inside), so a
//! point in a hole sums to zero.
//!
//! Points exactly on an edge resolve half-open: west and south edges of a
//! region belong to it, east and north edges do not. This matches the
//! `[-180, 180)` longitude range, so a territory split at the antimeridian
//! claims longitude `-180` through its western piece.

use geo_types::Coord;

use super::boundary::PolygonView;

/// Twice the signed area of triangle `(a, b, p)`; positive when `p` is left of `a -> b`.
#[inline(always)]
fn is_left(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y)
}

/// Winding number of a closed ring around `p`. Zero-length edges are skipped.
#[inline]
pub fn winding_number(ring: &[Coord<f64>], p: Coord<f64>) -> i32 {
    let mut wn = 0;
    for edge in ring.windows(2) {
        let (a, b) = (edge[0], edge[1]);
        if a == b {
            continue;
        }
        if a.y <= p.y {
            if b.y > p.y && is_left(a, b, p) > 0.0 {
                wn += 1;
            }
        } else if b.y <= p.y && is_left(a, b, p) < 0.0 {
            wn -= 1;
        }
    }
    wn
}

/// Whether a polygon (outer ring plus holes) contains `p`.
#[inline]
pub fn polygon_contains(polygon: PolygonView<'_>, p: Coord<f64>) -> bool {
    if !polygon.bbox().contains(p) {
        return false;
    }

    let mut rings = polygon.rings();
    let outer = match rings.next() {
        Some(ring) => winding_number(ring, p),
        None => return false,
    };
    if outer == 0 {
        return false;
    }

    rings.fold(outer, |wn, hole| wn + winding_number(hole, p)) != 0
}

/// Signed crossings of the horizontal line `y` with a set of rings.
///
/// Fills `out` with `(x, direction)` sorted by `x`; upward edges count `+1`,
/// downward edges `-1`, using the same half-open rule as [`winding_number`].
/// For any `x` not on an edge, the winding number at `(x, y)` is the sum of
/// directions of crossings strictly east of `x`.
pub(crate) fn scanline_crossings<'a>(
    rings: impl Iterator<Item = &'a [Coord<f64>]>,
    y: f64,
    out: &mut Vec<(f64, i32)>,
) {
    out.clear();
    for ring in rings {
        for edge in ring.windows(2) {
            let (a, b) = (edge[0], edge[1]);
            let direction = if a.y <= y && b.y > y {
                1
            } else if a.y > y && b.y <= y {
                -1
            } else {
                continue;
            };
            let x = a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y);
            out.push((x, direction));
        }
    }
    out.sort_unstable_by(|l, r| l.0.total_cmp(&r.0));
}

/// Winding numbers east of each crossing: `suffix[i]` sums directions of `crossings[i..]`.
pub(crate) fn suffix_windings(crossings: &[(f64, i32)], suffix: &mut Vec<i32>) {
    suffix.clear();
    suffix.resize(crossings.len() + 1, 0);
    for i in (0..crossings.len()).rev() {
        suffix[i] = suffix[i + 1] + crossings[i].1;
    }
}

/// Winding number at `x` on the scanline described by `crossings` and its `suffix`.
#[inline]
pub(crate) fn winding_at(crossings: &[(f64, i32)], suffix: &[i32], x: f64) -> i32 {
    let east = crossings.partition_point(|c| c.0 <= x);
    suffix[east]
}
