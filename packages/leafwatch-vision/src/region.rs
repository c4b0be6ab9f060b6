use std::fmt;
use std::str::FromStr;

use image::{imageops, RgbImage};

/// A fixed rectangle in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns the part of the region that lies inside a `frame_width` x
    /// `frame_height` frame, or `None` when they do not overlap.
    pub fn clip(&self, frame_width: u32, frame_height: u32) -> Option<Region> {
        if self.x >= frame_width || self.y >= frame_height {
            return None;
        }
        let right = self.x.saturating_add(self.width).min(frame_width);
        let bottom = self.y.saturating_add(self.height).min(frame_height);
        if right <= self.x || bottom <= self.y {
            return None;
        }
        Some(Region::new(self.x, self.y, right - self.x, bottom - self.y))
    }

    /// Copies the visible part of the region out of `frame`.
    pub fn crop(&self, frame: &RgbImage) -> Option<RgbImage> {
        let visible = self.clip(frame.width(), frame.height())?;
        Some(
            imageops::crop_imm(frame, visible.x, visible.y, visible.width, visible.height)
                .to_image(),
        )
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid region {input:?}: expected x,y,width,height with non-zero size")]
pub struct ParseRegionError {
    input: String,
}

impl FromStr for Region {
    type Err = ParseRegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRegionError {
            input: s.to_string(),
        };
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| err())?;
        match parts.as_slice() {
            [x, y, w, h] if *w > 0 && *h > 0 => Ok(Region::new(*x, *y, *w, *h)),
            _ => Err(err()),
        }
    }
}
