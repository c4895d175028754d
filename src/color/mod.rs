use serde::{Deserialize, Serialize};

mod rainbow;

pub use rainbow::rainbow;

/// A full-array list of pixels, ordered by index.
///
/// Used both for render commands and for the state reported back by the backend.
pub type Snapshot = Vec<Pixel>;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const OFF: Color = Color { r: 0, g: 0, b: 0 };

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Color {
        Color { r, g, b }
    }

    /// Linear blend towards `target`, `passed` in `0.0..=1.0`.
    pub fn lerp(self, target: Color, passed: f64) -> Color {
        let channel = |from: u8, to: u8| {
            (from as f64 + (to as f64 - from as f64) * passed).round().clamp(0.0, 255.0) as u8
        };

        Color {
            r: channel(self.r, target.r),
            g: channel(self.g, target.g),
            b: channel(self.b, target.b),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pixel {
    pub index: usize,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Pixel {
    pub const fn new(index: usize, color: Color) -> Pixel {
        Pixel {
            index,
            r: color.r,
            g: color.g,
            b: color.b,
        }
    }

    pub const fn color(&self) -> Color {
        Color::new(self.r, self.g, self.b)
    }
}

/// Builds a full-array list from one color per index.
pub fn frame<I: IntoIterator<Item = Color>>(colors: I) -> Snapshot {
    colors
        .into_iter()
        .enumerate()
        .map(|(index, color)| Pixel::new(index, color))
        .collect()
}
