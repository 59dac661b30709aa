use crate::{position::PositionSnapshot, render::Surface};

/// Visual unit driven by the sequencer.
///
/// Implementations must tolerate `init` being called more than once per
/// activation, must not keep references to the surface past a call, and
/// must repaint every pixel they own in `draw`.
pub trait Effect {
    /// Name used by cue files to refer to this effect.
    fn name(&self) -> &str;

    /// Prepares the effect, typically by installing its palette.
    fn init(&mut self, surface: &mut Surface);

    /// Advances animation by `dt` seconds.
    fn update(&mut self, dt: f32, sync: &PositionSnapshot);

    fn draw(&mut self, surface: &mut Surface);
}

impl<E: Effect + ?Sized> Effect for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn init(&mut self, surface: &mut Surface) {
        (**self).init(surface)
    }

    fn update(&mut self, dt: f32, sync: &PositionSnapshot) {
        (**self).update(dt, sync)
    }

    fn draw(&mut self, surface: &mut Surface) {
        (**self).draw(surface)
    }
}
