//! Built-in effects shipped with the player. Each one repaints the whole
//! surface on every draw.

use demo_sync_core::{
    position::MAX_CHANNELS, Effect, Palette, PositionSnapshot, Rgb, Surface,
};

/// Names in the order cue indices refer to them.
pub const BUILTIN: [&str; 4] = ["bars", "pulse", "gradient", "checker"];

pub fn builtin() -> Vec<Box<dyn Effect>> {
    vec![
        Box::new(Bars::default()),
        Box::new(Pulse::default()),
        Box::new(Gradient::default()),
        Box::new(Checker::default()),
    ]
}

/// Per-channel level meters over a background that flashes on each row.
#[derive(Default)]
struct Bars {
    levels: Vec<u8>,
    flash: f32,
}

impl Effect for Bars {
    fn name(&self) -> &str {
        "bars"
    }

    fn init(&mut self, surface: &mut Surface) {
        surface.set_palette(Palette::gradient(Rgb::new(0, 0, 24), Rgb::new(80, 255, 255)));
    }

    fn update(&mut self, _dt: f32, sync: &PositionSnapshot) {
        let active = sync.active_channels.min(MAX_CHANNELS);
        self.levels.clear();
        self.levels.extend_from_slice(&sync.channel_levels[..active]);
        self.flash = sync.row_pulse();
    }

    fn draw(&mut self, surface: &mut Surface) {
        let background = (self.flash * 48.0) as u8;
        surface.clear(background);
        if self.levels.is_empty() {
            return;
        }

        let (width, height) = (surface.width(), surface.height());
        let slot = (width / self.levels.len()).max(1);
        for (channel, &level) in self.levels.iter().enumerate() {
            let bar = usize::from(level) * height / 255;
            let color = 96 + level / 2;
            surface.fill_rect(channel * slot + 1, height - bar, slot.saturating_sub(2), bar, color);
        }
    }
}

/// Concentric rings expanding from the centre, pushed outward on each beat.
#[derive(Default)]
struct Pulse {
    phase: f32,
    beat: f32,
}

impl Effect for Pulse {
    fn name(&self) -> &str {
        "pulse"
    }

    fn init(&mut self, surface: &mut Surface) {
        surface.set_palette(Palette::from_fn(|index| {
            let t = f32::from(index) / 255.0;
            let wave = (t * std::f32::consts::TAU * 2.0).sin() * 0.5 + 0.5;
            Rgb::new((wave * 255.0) as u8, (t * 64.0) as u8, ((1.0 - wave) * 200.0) as u8)
        }));
    }

    fn update(&mut self, dt: f32, sync: &PositionSnapshot) {
        self.beat = sync.beat_pulse();
        self.phase = (self.phase + dt * (40.0 + 120.0 * self.beat)) % 256.0;
    }

    fn draw(&mut self, surface: &mut Surface) {
        let (width, height) = (surface.width(), surface.height());
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let spacing = 1.5 + self.beat;
        let phase = self.phase;
        for (index, pixel) in surface.pixels_mut().iter_mut().enumerate() {
            let dx = (index % width) as f32 - cx;
            let dy = (index / width) as f32 - cy;
            let distance = (dx * dx + dy * dy).sqrt();
            *pixel = (distance * spacing - phase).rem_euclid(256.0) as u8;
        }
    }
}

/// Vertical colour ramp scrolling at a tempo-dependent speed.
#[derive(Default)]
struct Gradient {
    offset: f32,
}

impl Effect for Gradient {
    fn name(&self) -> &str {
        "gradient"
    }

    fn init(&mut self, surface: &mut Surface) {
        surface.set_palette(Palette::from_fn(|index| {
            let t = f32::from(index) / 255.0;
            let up = if t < 0.5 { t * 2.0 } else { (1.0 - t) * 2.0 };
            Rgb::new((up * 255.0) as u8, (up * 140.0) as u8, 40)
        }));
    }

    fn update(&mut self, dt: f32, sync: &PositionSnapshot) {
        let speed = sync.tempo.max(1) as f32 * (1.0 + sync.beat_pulse());
        self.offset = (self.offset + dt * speed).rem_euclid(256.0);
    }

    fn draw(&mut self, surface: &mut Surface) {
        let width = surface.width();
        let offset = self.offset as usize;
        for (y, row) in surface.pixels_mut().chunks_mut(width).enumerate() {
            row.fill(((y + offset) % 256) as u8);
        }
    }
}

/// Checkerboard that swaps its colours every row.
#[derive(Default)]
struct Checker {
    inverted: bool,
}

impl Effect for Checker {
    fn name(&self) -> &str {
        "checker"
    }

    fn init(&mut self, surface: &mut Surface) {
        let palette = surface.palette_mut();
        palette.set(1, Rgb::new(30, 30, 30));
        palette.set(2, Rgb::new(230, 200, 60));
    }

    fn update(&mut self, _dt: f32, sync: &PositionSnapshot) {
        self.inverted = sync.row % 2 == 1;
    }

    fn draw(&mut self, surface: &mut Surface) {
        const CELL: usize = 20;
        let width = surface.width();
        let inverted = self.inverted;
        for (index, pixel) in surface.pixels_mut().iter_mut().enumerate() {
            let (x, y) = (index % width / CELL, index / width / CELL);
            let dark = ((x + y) % 2 == 0) != inverted;
            *pixel = if dark { 1 } else { 2 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_registry() {
        let names: Vec<String> = builtin().iter().map(|e| e.name().to_string()).collect();
        assert_eq!(names, BUILTIN);
    }

    #[test]
    fn every_effect_repaints_the_surface() {
        let mut sync = PositionSnapshot::at(1, 3);
        sync.tempo = 125;
        sync.set_channel_levels(&[255, 0, 128, 64]);

        for mut effect in builtin() {
            let mut first = Surface::new(64, 40).unwrap();
            let mut second = Surface::new(64, 40).unwrap();
            second.clear(77);

            effect.init(&mut first);
            effect.update(0.1, &sync);
            effect.draw(&mut first);
            effect.draw(&mut second);
            assert_eq!(first.pixels(), second.pixels(), "{} left stale pixels", effect.name());
        }
    }
}
