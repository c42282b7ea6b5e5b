use image::{Rgba, RgbaImage};

use super::*;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const RED: Rgba<u8> = Rgba([200, 30, 30, 255]);

fn uniform(w: u32, h: u32, color: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(w, h, color)
}

// =============================================================
// uniform backgrounds
// =============================================================

#[test]
fn uniform_image_is_fully_cleared() {
    let mut img = uniform(10, 8, WHITE);
    let cleared = clear_background(&mut img, Tolerance::default());
    assert_eq!(cleared, 80);
    for pixel in img.pixels() {
        assert_eq!(pixel[3], 0);
    }
}

#[test]
fn second_run_clears_nothing() {
    let mut img = uniform(10, 8, WHITE);
    clear_background(&mut img, Tolerance::default());
    let cleared = clear_background(&mut img, Tolerance::default());
    // Alpha is already zero everywhere; colors still match, count stays zero.
    assert_eq!(cleared, 0);
}

#[test]
fn empty_image_is_noop() {
    let mut img = RgbaImage::new(0, 0);
    assert_eq!(clear_background(&mut img, Tolerance::default()), 0);
}

#[test]
fn single_pixel_image() {
    let mut img = uniform(1, 1, WHITE);
    assert_eq!(clear_background(&mut img, Tolerance::default()), 1);
    assert_eq!(img.get_pixel(0, 0)[3], 0);
}

// =============================================================
// subject preservation
// =============================================================

#[test]
fn subject_pixels_keep_their_alpha() {
    // White background, red 4x4 block in the middle.
    let mut img = uniform(10, 10, WHITE);
    for y in 3..7 {
        for x in 3..7 {
            img.put_pixel(x, y, RED);
        }
    }
    let cleared = clear_background(&mut img, Tolerance::default());
    assert_eq!(cleared, 100 - 16);
    assert_eq!(img.get_pixel(5, 5)[3], 255);
    assert_eq!(img.get_pixel(0, 0)[3], 0);
    assert_eq!(img.get_pixel(9, 9)[3], 0);
}

#[test]
fn background_enclosed_by_subject_is_still_cleared() {
    // Traversal crosses the subject: a background-colored hole inside a red
    // ring is reachable and gets cleared, while the ring itself is kept.
    let mut img = uniform(9, 9, WHITE);
    for i in 2..7 {
        img.put_pixel(i, 2, RED);
        img.put_pixel(i, 6, RED);
        img.put_pixel(2, i, RED);
        img.put_pixel(6, i, RED);
    }
    clear_background(&mut img, Tolerance::default());
    assert_eq!(img.get_pixel(4, 4)[3], 0); // hole center
    assert_eq!(img.get_pixel(2, 4)[3], 255); // ring
}

// =============================================================
// reference pixel and tolerance
// =============================================================

#[test]
fn reference_comes_from_top_left_only() {
    // Two background-like colors on the border: only the one matching (0,0)
    // is cleared.
    let mut img = uniform(6, 6, WHITE);
    let blue = Rgba([30, 30, 220, 255]);
    img.put_pixel(5, 5, blue);
    clear_background(&mut img, Tolerance::default());
    assert_eq!(img.get_pixel(5, 5)[3], 255);
    assert_eq!(img.get_pixel(0, 5)[3], 0);
}

#[test]
fn tolerance_admits_near_colors_per_channel() {
    let mut img = uniform(4, 4, Rgba([100, 100, 100, 255]));
    img.put_pixel(1, 0, Rgba([120, 90, 110, 255])); // within 32 on every channel
    img.put_pixel(2, 0, Rgba([140, 100, 100, 255])); // r off by 40, beyond
    clear_background(&mut img, Tolerance::uniform(32));
    assert_eq!(img.get_pixel(1, 0)[3], 0);
    assert_eq!(img.get_pixel(2, 0)[3], 255);
}

#[test]
fn zero_tolerance_requires_exact_match() {
    let mut img = uniform(4, 4, WHITE);
    img.put_pixel(3, 3, Rgba([254, 255, 255, 255]));
    clear_background(&mut img, Tolerance::uniform(0));
    assert_eq!(img.get_pixel(3, 3)[3], 255);
    assert_eq!(img.get_pixel(0, 0)[3], 0);
}

#[test]
fn cleared_count_ignores_already_transparent_pixels() {
    let mut img = uniform(4, 4, WHITE);
    img.put_pixel(0, 0, Rgba([255, 255, 255, 0]));
    let cleared = clear_background(&mut img, Tolerance::default());
    assert_eq!(cleared, 15);
}
