//! Region anonymization on RGBA pixel grids.
//!
//! Every compositor here works in place on an [`RgbaImage`], touches only samples inside each
//! region (clipped to the image), leaves alpha untouched, and processes regions in the order
//! given, so overlapping regions resolve last-write-wins.
//!
//! Block size, cell grid and ellipse always follow the declared region, even when it overhangs
//! the image; clipping only decides which samples are read and written.

use faceblur_utils::config::{CompositingSettings, ObscureStyle};
use image::{RgbaImage, imageops};

use crate::region::{PixelRect, Region};

/// Block sizing for pixelation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelationConfig {
    /// Smallest block edge in pixels.
    pub min_block_size: u32,
    /// Block edge is `min(width, height) / block_divisor` when that exceeds the minimum.
    pub block_divisor: u32,
}

impl Default for PixelationConfig {
    fn default() -> Self {
        Self {
            min_block_size: 8,
            block_divisor: 10,
        }
    }
}

impl PixelationConfig {
    /// Block edge for a `width` x `height` region; larger faces get coarser blocks.
    pub fn block_size(&self, width: u32, height: u32) -> u32 {
        let scaled = width.min(height) / self.block_divisor.max(1);
        scaled.max(self.min_block_size).max(1)
    }
}

/// Everything needed to obscure a list of regions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompositeOptions {
    pub style: ObscureStyle,
    /// Restrict the effect to each region's inscribed ellipse.
    pub circular: bool,
    pub pixelation: PixelationConfig,
}

impl From<&CompositingSettings> for CompositeOptions {
    fn from(settings: &CompositingSettings) -> Self {
        Self {
            style: settings.style.sanitized(),
            circular: settings.circular,
            pixelation: PixelationConfig {
                min_block_size: settings.min_block_size,
                block_divisor: settings.block_divisor,
            },
        }
    }
}

/// Ellipse inscribed in a `width` x `height` rectangle, in region-local pixel coordinates.
#[derive(Debug, Clone, Copy)]
struct EllipseMask {
    center_x: f32,
    center_y: f32,
    radius_x: f32,
    radius_y: f32,
}

impl EllipseMask {
    fn inscribed(width: u32, height: u32) -> Self {
        Self {
            center_x: width as f32 / 2.0,
            center_y: height as f32 / 2.0,
            radius_x: width as f32 / 2.0,
            radius_y: height as f32 / 2.0,
        }
    }

    fn contains(&self, dx: u32, dy: u32) -> bool {
        let nx = (dx as f32 - self.center_x) / self.radius_x;
        let ny = (dy as f32 - self.center_y) / self.radius_y;
        nx * nx + ny * ny <= 1.0
    }
}

fn included(mask: Option<&EllipseMask>, dx: u32, dy: u32) -> bool {
    mask.is_none_or(|mask| mask.contains(dx, dy))
}

/// Pixelate `regions` with the default block sizing.
pub fn apply_pixelation(image: &mut RgbaImage, regions: &[Region], circular: bool) {
    apply_pixelation_with(image, regions, circular, &PixelationConfig::default());
}

/// Pixelate `regions` in order. Degenerate or fully out-of-bounds regions are skipped.
pub fn apply_pixelation_with(
    image: &mut RgbaImage,
    regions: &[Region],
    circular: bool,
    config: &PixelationConfig,
) {
    let (width, height) = image.dimensions();
    for region in regions {
        let Some(visible) = Visible::of(region, width, height) else {
            log::trace!("skipping region {region:?} outside {width}x{height}");
            continue;
        };
        let block = config.block_size(visible.region_width, visible.region_height);
        pixelate_visible(image, &visible, block, circular);
    }
}

/// Pixelate a single region with an explicit block edge.
pub fn pixelate_region_with_block(
    image: &mut RgbaImage,
    region: &Region,
    block_size: u32,
    circular: bool,
) {
    let (width, height) = image.dimensions();
    if let Some(visible) = Visible::of(region, width, height) {
        pixelate_visible(image, &visible, block_size, circular);
    }
}

/// A region together with the part of it that lies inside the image.
///
/// Local coordinates are measured from the declared region origin; `local_x..local_x + rect.width`
/// is the visible span.
struct Visible {
    rect: PixelRect,
    local_x: u32,
    local_y: u32,
    region_width: u32,
    region_height: u32,
}

impl Visible {
    fn of(region: &Region, width: u32, height: u32) -> Option<Self> {
        let rect = region.clip(width, height)?;
        Some(Self {
            rect,
            local_x: (i64::from(rect.x) - i64::from(region.x)) as u32,
            local_y: (i64::from(rect.y) - i64::from(region.y)) as u32,
            region_width: region.width as u32,
            region_height: region.height as u32,
        })
    }

    fn mask(&self, circular: bool) -> Option<EllipseMask> {
        circular.then(|| EllipseMask::inscribed(self.region_width, self.region_height))
    }

    /// Image coordinates of a visible region-local sample.
    fn to_image(&self, lx: u32, ly: u32) -> (u32, u32) {
        (
            self.rect.x + (lx - self.local_x),
            self.rect.y + (ly - self.local_y),
        )
    }
}

/// First cell origin at or before `start` on a grid anchored at zero.
fn grid_start(start: u32, block: u32) -> u32 {
    start - start % block
}

fn pixelate_visible(image: &mut RgbaImage, visible: &Visible, block_size: u32, circular: bool) {
    let block = block_size.max(1);
    let mask = visible.mask(circular);
    let (x_begin, y_begin) = (visible.local_x, visible.local_y);
    let x_end = x_begin + visible.rect.width;
    let y_end = y_begin + visible.rect.height;

    for cell_y in (grid_start(y_begin, block)..y_end).step_by(block as usize) {
        let cell_top = cell_y.max(y_begin);
        let cell_bottom = (cell_y + block).min(y_end);
        for cell_x in (grid_start(x_begin, block)..x_end).step_by(block as usize) {
            let cell_left = cell_x.max(x_begin);
            let cell_right = (cell_x + block).min(x_end);

            let mut sum = [0u64; 3];
            let mut count = 0u64;
            for ly in cell_top..cell_bottom {
                for lx in cell_left..cell_right {
                    if !included(mask.as_ref(), lx, ly) {
                        continue;
                    }
                    let (x, y) = visible.to_image(lx, ly);
                    let pixel = image.get_pixel(x, y);
                    for (acc, &channel) in sum.iter_mut().zip(&pixel.0[..3]) {
                        *acc += u64::from(channel);
                    }
                    count += 1;
                }
            }
            if count == 0 {
                continue;
            }

            let mean = sum.map(|total| ((total + count / 2) / count) as u8);
            for ly in cell_top..cell_bottom {
                for lx in cell_left..cell_right {
                    if included(mask.as_ref(), lx, ly) {
                        let (x, y) = visible.to_image(lx, ly);
                        let pixel = image.get_pixel_mut(x, y);
                        pixel.0[..3].copy_from_slice(&mean);
                    }
                }
            }
        }
    }
}

/// Gaussian-blur `regions` in order, writing back RGB only.
///
/// Each clipped region is blurred in isolation, so colours from outside the region never bleed
/// in. The mask is the declared region's ellipse.
pub fn apply_gaussian_blur(image: &mut RgbaImage, regions: &[Region], circular: bool, sigma: f32) {
    let (width, height) = image.dimensions();
    for region in regions {
        let Some(visible) = Visible::of(region, width, height) else {
            continue;
        };
        let rect = visible.rect;
        let patch = imageops::crop_imm(&*image, rect.x, rect.y, rect.width, rect.height).to_image();
        let blurred = imageops::blur(&patch, sigma);
        let mask = visible.mask(circular);

        for (dx, dy, source) in blurred.enumerate_pixels() {
            if included(mask.as_ref(), visible.local_x + dx, visible.local_y + dy) {
                let pixel = image.get_pixel_mut(rect.x + dx, rect.y + dy);
                pixel.0[..3].copy_from_slice(&source.0[..3]);
            }
        }
    }
}

/// Obscure `regions` with the configured style.
pub fn apply_obscure(image: &mut RgbaImage, regions: &[Region], options: &CompositeOptions) {
    match options.style {
        ObscureStyle::Pixelate => {
            apply_pixelation_with(image, regions, options.circular, &options.pixelation)
        }
        ObscureStyle::Gaussian { sigma } => {
            apply_gaussian_blur(image, regions, options.circular, sigma)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8, 255])
        })
    }

    #[test]
    fn block_size_scales_with_smaller_dimension() {
        let config = PixelationConfig::default();
        assert_eq!(config.block_size(100, 50), 8);
        assert_eq!(config.block_size(200, 300), 20);
        assert_eq!(config.block_size(3, 3), 8);
        assert_eq!(config.block_size(89, 1000), 8);
    }

    #[test]
    fn solid_region_is_unchanged() {
        let original = RgbaImage::from_pixel(40, 30, Rgba([90, 150, 210, 77]));
        for circular in [false, true] {
            for block in [1, 3, 8, 64] {
                let mut image = original.clone();
                pixelate_region_with_block(&mut image, &Region::new(2, 3, 31, 25), block, circular);
                assert_eq!(image, original, "block {block}, circular {circular}");
            }
        }
    }

    #[test]
    fn straddling_block_averages_by_pixel_count() {
        // 10x10 region: left 4 columns red, right 6 columns blue.
        let mut image = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 4 {
                Rgba([200, 0, 0, 255])
            } else {
                Rgba([0, 0, 100, 255])
            }
        });
        pixelate_region_with_block(&mut image, &Region::new(0, 0, 10, 10), 10, false);

        for pixel in image.pixels() {
            assert_eq!(pixel, &Rgba([80, 0, 60, 255]));
        }
    }

    #[test]
    fn partial_edge_blocks_average_only_their_samples() {
        // 12 wide with block 10: columns 10..12 form their own cell.
        let mut image = RgbaImage::from_fn(12, 10, |x, _| {
            if x < 10 {
                Rgba([10, 10, 10, 255])
            } else if x == 10 {
                Rgba([100, 100, 100, 255])
            } else {
                Rgba([201, 201, 201, 255])
            }
        });
        pixelate_region_with_block(&mut image, &Region::new(0, 0, 12, 10), 10, false);

        assert_eq!(image.get_pixel(0, 0), &Rgba([10, 10, 10, 255]));
        // (100 + 201) / 2 = 150.5, rounded up.
        assert_eq!(image.get_pixel(10, 4), &Rgba([151, 151, 151, 255]));
        assert_eq!(image.get_pixel(11, 9), &Rgba([151, 151, 151, 255]));
    }

    #[test]
    fn alpha_channel_is_preserved() {
        let mut image = RgbaImage::from_fn(16, 16, |x, y| Rgba([x as u8 * 10, y as u8, 0, (x + y) as u8]));
        let before = image.clone();
        apply_pixelation(&mut image, &[Region::new(0, 0, 16, 16)], false);
        for (after, before) in image.pixels().zip(before.pixels()) {
            assert_eq!(after.0[3], before.0[3]);
        }
    }

    #[test]
    fn pixels_outside_regions_are_untouched() {
        let original = gradient(64, 48);
        let mut image = original.clone();
        let region = Region::new(10, 12, 20, 16);
        apply_pixelation(&mut image, &[region], false);

        let mut changed = false;
        for (x, y, pixel) in image.enumerate_pixels() {
            let inside = (10..30).contains(&x) && (12..28).contains(&y);
            if inside {
                changed |= pixel != original.get_pixel(x, y);
            } else {
                assert_eq!(pixel, original.get_pixel(x, y), "({x}, {y}) changed");
            }
        }
        assert!(changed, "region should be pixelated");
    }

    #[test]
    fn degenerate_and_outside_regions_are_skipped() {
        let original = gradient(20, 20);
        let mut image = original.clone();
        apply_pixelation(
            &mut image,
            &[
                Region::new(5, 5, 0, 10),
                Region::new(5, 5, 10, -3),
                Region::new(25, 0, 10, 10),
                Region::new(-30, -30, 10, 10),
            ],
            true,
        );
        assert_eq!(image, original);
    }

    #[test]
    fn overhanging_region_is_clipped() {
        let original = gradient(20, 20);
        let mut image = original.clone();
        apply_pixelation(&mut image, &[Region::new(-5, -5, 15, 15)], false);
        for (x, y, pixel) in image.enumerate_pixels() {
            if x >= 10 || y >= 10 {
                assert_eq!(pixel, original.get_pixel(x, y));
            }
        }
        // Cells start at the declared origin (-5, -5): image 0..3 and 3..10.
        assert_eq!(image.get_pixel(0, 0), image.get_pixel(2, 2));
        assert_eq!(image.get_pixel(3, 3), image.get_pixel(9, 9));
        assert_ne!(image.get_pixel(2, 2), image.get_pixel(3, 3));
    }

    #[test]
    fn overhanging_region_keeps_declared_block_size() {
        // Declared 200x200 gives block 20 even though only 100 columns are visible.
        let original = gradient(100, 200);
        let mut image = original.clone();
        apply_pixelation(&mut image, &[Region::new(-100, 0, 200, 200)], false);

        assert_eq!(image.get_pixel(0, 0), image.get_pixel(15, 0));
        assert_eq!(image.get_pixel(0, 0), image.get_pixel(19, 19));
        assert_ne!(image.get_pixel(19, 0), image.get_pixel(20, 0));
    }

    #[test]
    fn overhanging_circular_region_uses_declared_ellipse() {
        let original = gradient(40, 40);
        let mut image = original.clone();
        apply_pixelation(&mut image, &[Region::new(-20, 0, 40, 40)], true);

        // Local (35, 3) lies outside the declared ellipse.
        assert_eq!(image.get_pixel(15, 3), original.get_pixel(15, 3));
        // Everything right of the declared region is untouched.
        for (x, y, pixel) in image.enumerate_pixels() {
            if x >= 20 {
                assert_eq!(pixel, original.get_pixel(x, y), "({x}, {y}) changed");
            }
        }
        // Local (20, 20) is the ellipse centre.
        assert_ne!(image.get_pixel(0, 20), original.get_pixel(0, 20));
    }

    #[test]
    fn masked_average_ignores_samples_outside_ellipse() {
        let inside = Rgba([40, 180, 90, 255]);
        let outside = Rgba([250, 0, 250, 255]);
        let mask = EllipseMask::inscribed(20, 20);
        let original = RgbaImage::from_fn(20, 20, |x, y| {
            if mask.contains(x, y) { inside } else { outside }
        });

        for block in [5, 10, 20] {
            let mut image = original.clone();
            pixelate_region_with_block(&mut image, &Region::new(0, 0, 20, 20), block, true);
            assert_eq!(image, original, "block {block}");
        }

        // Without the mask the corner colour bleeds into every cell.
        let mut unmasked = original.clone();
        pixelate_region_with_block(&mut unmasked, &Region::new(0, 0, 20, 20), 20, false);
        assert_ne!(unmasked.get_pixel(10, 10), &inside);
    }

    #[test]
    fn circular_mask_leaves_corners_alone() {
        let original = gradient(40, 40);
        let mut image = original.clone();
        apply_pixelation(&mut image, &[Region::new(0, 0, 40, 40)], true);

        assert_eq!(image.get_pixel(0, 0), original.get_pixel(0, 0));
        assert_eq!(image.get_pixel(39, 0), original.get_pixel(39, 0));
        assert_eq!(image.get_pixel(0, 39), original.get_pixel(0, 39));
        assert_eq!(image.get_pixel(39, 39), original.get_pixel(39, 39));
        assert_ne!(image.get_pixel(18, 18), original.get_pixel(18, 18));
    }

    #[test]
    fn reapplying_is_a_no_op() {
        for circular in [false, true] {
            let mut image = gradient(50, 37);
            let regions = [Region::new(3, 4, 41, 30)];
            apply_pixelation(&mut image, &regions, circular);
            let once = image.clone();
            apply_pixelation(&mut image, &regions, circular);
            assert_eq!(image, once, "circular {circular}");
        }
    }

    #[test]
    fn overlapping_regions_apply_in_order() {
        let original = gradient(60, 60);
        let a = Region::new(0, 0, 40, 40);
        let b = Region::new(20, 20, 40, 40);

        let mut batched = original.clone();
        apply_pixelation(&mut batched, &[a, b], false);

        let mut sequential = original.clone();
        apply_pixelation(&mut sequential, &[a], false);
        apply_pixelation(&mut sequential, &[b], false);

        assert_eq!(batched, sequential);
    }

    #[test]
    fn gaussian_blur_stays_inside_region_and_keeps_alpha() {
        let original = RgbaImage::from_fn(30, 30, |x, y| {
            let v = if (x + y) % 2 == 0 { 255 } else { 0 };
            Rgba([v, v, v, 128])
        });
        let mut image = original.clone();
        apply_gaussian_blur(&mut image, &[Region::new(5, 5, 20, 20)], false, 3.0);

        for (x, y, pixel) in image.enumerate_pixels() {
            assert_eq!(pixel.0[3], 128);
            if !((5..25).contains(&x) && (5..25).contains(&y)) {
                assert_eq!(pixel, original.get_pixel(x, y));
            }
        }
        assert_ne!(image.get_pixel(15, 15), original.get_pixel(15, 15));
    }

    #[test]
    fn apply_obscure_dispatches_on_style() {
        let original = gradient(32, 32);
        let regions = [Region::new(0, 0, 32, 32)];

        let mut via_options = original.clone();
        apply_obscure(&mut via_options, &regions, &CompositeOptions::default());
        let mut direct = original.clone();
        apply_pixelation(&mut direct, &regions, false);
        assert_eq!(via_options, direct);

        let settings = CompositingSettings {
            style: ObscureStyle::Gaussian { sigma: 2.0 },
            circular: true,
            ..CompositingSettings::default()
        };
        let options = CompositeOptions::from(&settings);
        let mut blurred = original.clone();
        apply_obscure(&mut blurred, &regions, &options);
        let mut expected = original.clone();
        apply_gaussian_blur(&mut expected, &regions, true, 2.0);
        assert_eq!(blurred, expected);
    }
}
