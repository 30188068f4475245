use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use crate::types::LabelMask;

/// Inclusive pixel bounds of one label in the mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl LabelBounds {
    fn at(x: u32, y: u32) -> Self {
        Self { min_x: x, min_y: y, max_x: x, max_y: y }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// Collect every positive label with its bounds, in ascending label order.
/// Background (`0`) is skipped.
pub fn label_regions(mask: &LabelMask) -> BTreeMap<u32, LabelBounds> {
    let mut regions: BTreeMap<u32, LabelBounds> = BTreeMap::new();
    for (x, y, pixel) in mask.enumerate_pixels() {
        let label = pixel[0];
        if label == 0 {
            continue;
        }
        regions
            .entry(label)
            .and_modify(|bounds| bounds.include(x, y))
            .or_insert_with(|| LabelBounds::at(x, y));
    }
    regions
}

/// Build the binary indicator grid of `label` over its bounds, padded with one
/// background cell on every side so border-touching objects still close.
///
/// Cell `(1, 1)` of the result corresponds to mask pixel `(bounds.min_x, bounds.min_y)`.
pub fn padded_indicator(mask: &LabelMask, label: u32, bounds: &LabelBounds) -> GrayImage {
    let mut grid = GrayImage::new(bounds.width() + 2, bounds.height() + 2);
    for y in bounds.min_y..=bounds.max_y {
        for x in bounds.min_x..=bounds.max_x {
            if mask.get_pixel(x, y)[0] == label {
                grid.put_pixel(x - bounds.min_x + 1, y - bounds.min_y + 1, Luma([1u8]));
            }
        }
    }
    grid
}
