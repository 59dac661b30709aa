//! Indexed-colour render target shared by the effects and the sequencer.

use serde::{Deserialize, Serialize};

use crate::{DemoError, Result};

/// Default surface width, matching VGA mode 13h.
pub const WIDTH: usize = 320;
/// Default surface height, matching VGA mode 13h.
pub const HEIGHT: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    fn scaled(self, factor: f32) -> Self {
        let scale = |c: u8| (f32::from(c) * factor).round().clamp(0.0, 255.0) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

/// 256-entry colour lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette([Rgb; 256]);

impl Default for Palette {
    fn default() -> Self {
        Self::default_vga()
    }
}

impl Palette {
    pub fn from_fn(mut f: impl FnMut(u8) -> Rgb) -> Self {
        let mut colors = [Rgb::BLACK; 256];
        for (index, color) in colors.iter_mut().enumerate() {
            *color = f(index as u8);
        }
        Self(colors)
    }

    /// Standard layout: 16 CGA colours, a 6×6×6 cube, then a grey ramp.
    pub fn default_vga() -> Self {
        const CGA: [Rgb; 16] = [
            Rgb::new(0, 0, 0),
            Rgb::new(0, 0, 170),
            Rgb::new(0, 170, 0),
            Rgb::new(0, 170, 170),
            Rgb::new(170, 0, 0),
            Rgb::new(170, 0, 170),
            Rgb::new(170, 85, 0),
            Rgb::new(170, 170, 170),
            Rgb::new(85, 85, 85),
            Rgb::new(85, 85, 255),
            Rgb::new(85, 255, 85),
            Rgb::new(85, 255, 255),
            Rgb::new(255, 85, 85),
            Rgb::new(255, 85, 255),
            Rgb::new(255, 255, 85),
            Rgb::new(255, 255, 255),
        ];

        Self::from_fn(|index| match index {
            0..=15 => CGA[usize::from(index)],
            16..=231 => {
                let cube = index - 16;
                Rgb::new((cube / 36) * 51, ((cube / 6) % 6) * 51, (cube % 6) * 51)
            }
            _ => {
                let grey = 8 + (index - 232) * 10;
                Rgb::new(grey, grey, grey)
            }
        })
    }

    /// Linear ramp from `from` at index 0 to `to` at index 255.
    pub fn gradient(from: Rgb, to: Rgb) -> Self {
        let lerp = |a: u8, b: u8, t: f32| (f32::from(a) + t * (f32::from(b) - f32::from(a))) as u8;
        Self::from_fn(|index| {
            let t = f32::from(index) / 255.0;
            Rgb::new(lerp(from.r, to.r, t), lerp(from.g, to.g, t), lerp(from.b, to.b, t))
        })
    }

    /// Copy with every colour scaled by `factor` (clamped to `[0, 1]`).
    pub fn faded(&self, factor: f32) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        let mut colors = self.0;
        for color in &mut colors {
            *color = color.scaled(factor);
        }
        Self(colors)
    }

    pub fn get(&self, index: u8) -> Rgb {
        self.0[usize::from(index)]
    }

    pub fn set(&mut self, index: u8, color: Rgb) {
        self.0[usize::from(index)] = color;
    }
}

/// Palette-indexed framebuffer.
#[derive(Debug, Clone)]
pub struct Surface {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
    palette: Palette,
}

impl Surface {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DemoError::InvalidInput("surface dimensions must be positive"));
        }
        Ok(Self {
            width,
            height,
            pixels: vec![0; width * height],
            palette: Palette::default_vga(),
        })
    }

    /// 320×200 surface with the default palette.
    pub fn vga() -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            pixels: vec![0; WIDTH * HEIGHT],
            palette: Palette::default_vga(),
        }
    }

    /// Blank surface of the same size that shares this surface's palette.
    pub fn scratch_like(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            pixels: vec![0; self.pixels.len()],
            palette: self.palette.clone(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    pub fn palette_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    pub fn clear(&mut self, color: u8) {
        self.pixels.fill(color);
    }

    /// Writes a pixel, ignoring coordinates outside the surface.
    pub fn set_pixel(&mut self, x: usize, y: usize, color: u8) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u8> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    /// Fills the intersection of the rectangle with the surface.
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u8) {
        let x_end = (x + w).min(self.width);
        let y_end = (y + h).min(self.height);
        for row in y.min(y_end)..y_end {
            let offset = row * self.width;
            self.pixels[offset + x.min(x_end)..offset + x_end].fill(color);
        }
    }

    /// Expands indexed pixels into RGBA bytes through the current palette.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.pixels.len() * 4);
        for &index in &self.pixels {
            let color = self.palette.get(index);
            rgba.extend_from_slice(&[color.r, color.g, color.b, 255]);
        }
        rgba
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_palette_layout() {
        let palette = Palette::default_vga();
        assert_eq!(palette.get(1), Rgb::new(0, 0, 170));
        assert_eq!(palette.get(15), Rgb::new(255, 255, 255));
        assert_eq!(palette.get(16), Rgb::BLACK);
        assert_eq!(palette.get(231), Rgb::new(255, 255, 255));
        assert_eq!(palette.get(232), Rgb::new(8, 8, 8));
        assert_eq!(palette.get(255), Rgb::new(238, 238, 238));
    }

    #[test]
    fn gradient_spans_endpoints() {
        let palette = Palette::gradient(Rgb::BLACK, Rgb::new(200, 100, 50));
        assert_eq!(palette.get(0), Rgb::BLACK);
        assert_eq!(palette.get(255), Rgb::new(200, 100, 50));
    }

    #[test]
    fn faded_palette_scales_towards_black() {
        let palette = Palette::gradient(Rgb::new(200, 200, 200), Rgb::new(200, 200, 200));
        assert_eq!(palette.faded(0.5).get(10), Rgb::new(100, 100, 100));
        assert_eq!(palette.faded(0.0).get(10), Rgb::BLACK);
    }

    #[test]
    fn fill_rect_clips_to_bounds() {
        let mut surface = Surface::new(4, 3).unwrap();
        surface.fill_rect(2, 1, 10, 10, 7);
        assert_eq!(surface.pixel(1, 1), Some(0));
        assert_eq!(surface.pixel(3, 2), Some(7));
        assert_eq!(surface.pixels().iter().filter(|&&p| p == 7).count(), 4);

        surface.fill_rect(9, 9, 2, 2, 1);
        assert_eq!(surface.pixel(9, 9), None);
    }

    #[test]
    fn rgba_uses_palette() {
        let mut surface = Surface::new(2, 1).unwrap();
        surface.set_pixel(1, 0, 4);
        assert_eq!(surface.to_rgba(), vec![0, 0, 0, 255, 170, 0, 0, 255]);
    }

    #[test]
    fn scratch_shares_palette_not_pixels() {
        let mut surface = Surface::new(2, 2).unwrap();
        surface.set_palette(Palette::gradient(Rgb::BLACK, Rgb::new(9, 9, 9)));
        surface.clear(3);
        let scratch = surface.scratch_like();
        assert_eq!(scratch.palette(), surface.palette());
        assert!(scratch.pixels().iter().all(|&p| p == 0));
    }
}
