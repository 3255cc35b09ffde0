// SPDX-License-Identifier: GPL-3.0-only

//! Best-fit resolution selection
//!
//! Picks the supported resolution whose aspect ratio is closest to a
//! target (usually the screen, or a manually requested capture size).
//! The target is landscape-normalised so a portrait screen matches a
//! landscape sensor mode of the same shape. Candidates are compared as
//! the device reports them.
//!
//! Ratios are compared exactly by cross-multiplication, so the ordering
//! is total and the result does not depend on candidate order.

use super::types::Size;
use std::cmp::Ordering;
use tracing::debug;

/// Choose the candidate closest to the target's aspect ratio
///
/// Ordering, first difference wins:
/// 1. aspect ratio distance, ascending
/// 2. `|tw - cw| + |th - ch|`, ascending
/// 3. larger width, then larger height
///
/// Returns `None` when the target or every candidate is degenerate.
pub fn select_best_size(target: Size, candidates: &[Size]) -> Option<Size> {
    if target.is_empty() {
        return None;
    }
    let target = target.landscape();

    let best = candidates
        .iter()
        .copied()
        .filter(|c| !c.is_empty())
        .min_by(|a, b| compare(target, *a, *b));

    if let Some(size) = best {
        debug!(target = %target, selected = %size, count = candidates.len(), "Selected size");
    }
    best
}

fn compare(target: Size, a: Size, b: Size) -> Ordering {
    compare_ratio_distance(target, a, b)
        .then_with(|| gap(target, a).cmp(&gap(target, b)))
        .then_with(|| (b.width, b.height).cmp(&(a.width, a.height)))
}

/// Compare `|a.h/a.w - t.h/t.w|` against `|b.h/b.w - t.h/t.w|`
///
/// Each distance is `|c.h * t.w - t.h * c.w| / (c.w * t.w)`. The common
/// `t.w` factor cancels, leaving a cross-multiplied integer comparison.
fn compare_ratio_distance(target: Size, a: Size, b: Size) -> Ordering {
    let num_a = ratio_numerator(target, a);
    let num_b = ratio_numerator(target, b);
    (num_a * b.width as u128).cmp(&(num_b * a.width as u128))
}

fn ratio_numerator(target: Size, c: Size) -> u128 {
    let lhs = c.height as u128 * target.width as u128;
    let rhs = target.height as u128 * c.width as u128;
    lhs.abs_diff(rhs)
}

fn gap(target: Size, c: Size) -> u64 {
    target.width.abs_diff(c.width) as u64 + target.height.abs_diff(c.height) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(list: &[(u32, u32)]) -> Vec<Size> {
        list.iter().map(|&(w, h)| Size::new(w, h)).collect()
    }

    #[test]
    fn test_portrait_screen_matches_landscape_mode() {
        let candidates = sizes(&[(640, 480), (1280, 720), (1920, 1080), (1600, 1200)]);
        assert_eq!(
            select_best_size(Size::new(1080, 1920), &candidates),
            Some(Size::new(1920, 1080))
        );
    }

    #[test]
    fn test_candidate_orientation_counts() {
        // Only the target is normalised; a portrait mode does not match a landscape target
        let candidates = sizes(&[(1080, 1920), (1280, 720)]);
        assert_eq!(
            select_best_size(Size::new(1920, 1080), &candidates),
            Some(Size::new(1280, 720))
        );
        assert_eq!(
            select_best_size(Size::new(1080, 1920), &candidates),
            Some(Size::new(1280, 720))
        );
    }

    #[test]
    fn test_exact_ratio_beats_closer_size() {
        // 1280x960 is far from the target in pixels but has the exact 4:3 ratio
        let candidates = sizes(&[(2000, 1200), (1280, 960), (1920, 1080)]);
        assert_eq!(
            select_best_size(Size::new(2000, 1500), &candidates),
            Some(Size::new(1280, 960))
        );
    }

    #[test]
    fn test_gap_breaks_ratio_ties() {
        let candidates = sizes(&[(640, 360), (3840, 2160), (1920, 1080), (1280, 720)]);
        assert_eq!(
            select_best_size(Size::new(1366, 768), &candidates),
            Some(Size::new(1280, 720))
        );
    }

    #[test]
    fn test_order_independence() {
        let base = sizes(&[
            (176, 144),
            (320, 240),
            (640, 480),
            (800, 600),
            (1280, 720),
            (1280, 960),
            (1920, 1080),
            (1080, 1920),
            (1440, 1080),
            (960, 720),
        ]);
        let targets = [
            Size::new(1080, 1920),
            Size::new(1000, 1000),
            Size::new(800, 480),
            Size::new(4000, 3000),
        ];

        for target in targets {
            let expected = select_best_size(target, &base);
            // Every rotation plus the reversed list
            for shift in 0..base.len() {
                let mut permuted = base.clone();
                permuted.rotate_left(shift);
                assert_eq!(
                    select_best_size(target, &permuted),
                    expected,
                    "rotation {} changed the result for {}",
                    shift,
                    target
                );
                permuted.reverse();
                assert_eq!(select_best_size(target, &permuted), expected);
            }
        }
    }

    #[test]
    fn test_degenerate_input() {
        assert_eq!(select_best_size(Size::new(0, 100), &sizes(&[(640, 480)])), None);
        assert_eq!(select_best_size(Size::new(640, 480), &[]), None);
        assert_eq!(
            select_best_size(Size::new(640, 480), &sizes(&[(0, 0), (320, 240)])),
            Some(Size::new(320, 240))
        );
    }
}
