use serde::{Deserialize, Serialize};

/// Integer rectangle in original-image pixel coordinates.
///
/// Serialized as `{"x", "y", "width", "height"}`; this is both the compositor's input unit and
/// the detector's output unit. Coordinates may be negative or extend past the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersect with a `width` x `height` image.
    ///
    /// Returns `None` for degenerate regions (width or height <= 0) and for regions that do not
    /// overlap the image at all.
    pub fn clip(&self, width: u32, height: u32) -> Option<PixelRect> {
        if self.width <= 0 || self.height <= 0 {
            return None;
        }
        let left = i64::from(self.x).max(0);
        let top = i64::from(self.y).max(0);
        let right = (i64::from(self.x) + i64::from(self.width)).min(i64::from(width));
        let bottom = (i64::from(self.y) + i64::from(self.height)).min(i64::from(height));
        if right <= left || bottom <= top {
            return None;
        }
        Some(PixelRect {
            x: left as u32,
            y: top as u32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

/// Non-empty rectangle guaranteed to lie inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}
