//! Canny edge detection on the raw 3x3 Sobel gradient
//!
//! No smoothing pass runs before the gradient, and magnitudes use the L1 norm
//! `|gx| + |gy|`, so `low`/`high` are compared against the same scale as
//! integer Sobel responses. Non-maximum suppression quantizes the gradient
//! direction to four sectors; hysteresis keeps weak pixels 8-connected to a
//! strong one.

use image::{GrayImage, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

/// tan(22.5°)
const TAN_22_5: f32 = 0.414_213_56;
/// tan(67.5°)
const TAN_67_5: f32 = 2.414_213_6;

const EDGE: Luma<u8> = Luma([255]);

/// Binary edge map (255 on edges, 0 elsewhere) of `gray`.
///
/// A pixel is a candidate when its magnitude exceeds `low` and is a local
/// maximum along the gradient; candidates above `high` seed the edges.
pub fn canny_l1(gray: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let mut edges = GrayImage::new(width, height);
    if width < 3 || height < 3 {
        return edges;
    }

    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);

    let w = width as usize;
    let h = height as usize;
    let idx = |x: usize, y: usize| y * w + x;

    let magnitude: Vec<i32> = gx
        .pixels()
        .zip(gy.pixels())
        .map(|(sx, sy)| (sx[0] as i32).abs() + (sy[0] as i32).abs())
        .collect();

    // 0 = suppressed, 1 = weak candidate, 2 = strong
    let mut class = vec![0u8; w * h];
    let mut stack = Vec::new();

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let m = magnitude[idx(x, y)];
            if m as f32 <= low {
                continue;
            }

            let sx = gx.get_pixel(x as u32, y as u32)[0] as i32;
            let sy = gy.get_pixel(x as u32, y as u32)[0] as i32;
            let ax = sx.abs() as f32;
            let ay = sy.abs() as f32;

            let is_max = if ay <= ax * TAN_22_5 {
                m > magnitude[idx(x - 1, y)] && m >= magnitude[idx(x + 1, y)]
            } else if ay > ax * TAN_67_5 {
                m > magnitude[idx(x, y - 1)] && m >= magnitude[idx(x, y + 1)]
            } else if (sx ^ sy) < 0 {
                m > magnitude[idx(x + 1, y - 1)] && m > magnitude[idx(x - 1, y + 1)]
            } else {
                m > magnitude[idx(x - 1, y - 1)] && m > magnitude[idx(x + 1, y + 1)]
            };

            if !is_max {
                continue;
            }
            if m as f32 > high {
                class[idx(x, y)] = 2;
                stack.push((x, y));
            } else {
                class[idx(x, y)] = 1;
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        edges.put_pixel(x as u32, y as u32, EDGE);
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                let i = idx(nx, ny);
                if class[i] == 1 {
                    class[i] = 2;
                    stack.push((nx, ny));
                }
            }
        }
    }

    edges
}
