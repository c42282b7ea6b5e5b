//! Background Removal Engine — border-seeded flood fill over a raster copy.
//!
//! DESIGN
//! ======
//! Approximate removal under a uniform-background assumption, not model-based
//! segmentation. A multi-source BFS starts from every border pixel; the
//! reference color is sampled once from `(0,0)` and never re-sampled per
//! seed, so a frame with two background-like colors only clears the one the
//! corner happens to match. Known approximation, kept as-is.
//!
//! Visitation gates the queue: a dequeued pixel enqueues its unvisited
//! orthogonal neighbors regardless of color, so traversal reaches everything
//! connected to the border. The per-channel tolerance test against the single
//! reference gates only the alpha clear. Monotonic visitation marking bounds
//! the walk at O(W·H) time and one visited bit per pixel, so termination is
//! structural.

#[cfg(test)]
#[path = "bgremove_test.rs"]
mod bgremove_test;

use std::collections::VecDeque;

use image::RgbaImage;

/// Per-channel color tolerance on the 0–255 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tolerance {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const DEFAULT_TOLERANCE: u8 = 32;

impl Tolerance {
    #[must_use]
    pub fn uniform(t: u8) -> Self {
        Self { r: t, g: t, b: t }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::uniform(DEFAULT_TOLERANCE)
    }
}

/// Clear the alpha of every border-reachable pixel whose color sits within
/// `tolerance` of the top-left reference pixel. Returns how many pixels were
/// cleared. Empty images are a no-op.
pub fn clear_background(img: &mut RgbaImage, tolerance: Tolerance) -> usize {
    let (w, h) = (img.width(), img.height());
    if w == 0 || h == 0 {
        return 0;
    }

    let reference = *img.get_pixel(0, 0);
    let mut visited = vec![false; (w as usize) * (h as usize)];
    let mut queue: VecDeque<(u32, u32)> = VecDeque::new();

    let mut seed = |x: u32, y: u32, visited: &mut Vec<bool>, queue: &mut VecDeque<(u32, u32)>| {
        let idx = (y as usize) * (w as usize) + (x as usize);
        if !visited[idx] {
            visited[idx] = true;
            queue.push_back((x, y));
        }
    };

    // Seed all four edges.
    for x in 0..w {
        seed(x, 0, &mut visited, &mut queue);
        seed(x, h - 1, &mut visited, &mut queue);
    }
    for y in 0..h {
        seed(0, y, &mut visited, &mut queue);
        seed(w - 1, y, &mut visited, &mut queue);
    }

    let mut cleared = 0;
    while let Some((x, y)) = queue.pop_front() {
        let pixel = img.get_pixel_mut(x, y);
        let matches = pixel[0].abs_diff(reference[0]) <= tolerance.r
            && pixel[1].abs_diff(reference[1]) <= tolerance.g
            && pixel[2].abs_diff(reference[2]) <= tolerance.b;
        if matches {
            if pixel[3] != 0 {
                cleared += 1;
            }
            pixel[3] = 0;
        }

        let neighbors = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbors {
            if nx < w && ny < h {
                let idx = (ny as usize) * (w as usize) + (nx as usize);
                if !visited[idx] {
                    visited[idx] = true;
                    queue.push_back((nx, ny));
                }
            }
        }
    }

    cleared
}
