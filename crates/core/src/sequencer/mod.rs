//! Cue-driven state machine switching between effects.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    effect::Effect,
    position::PositionSnapshot,
    render::Surface,
    timeline::{Timeline, Transition},
    DemoError, Result,
};

/// How the outgoing and incoming effects are combined during a fade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossfadeMode {
    /// Outgoing pixels until alpha reaches 0.5, incoming pixels after.
    #[default]
    Threshold,
    /// Ordered dither: each pixel switches at its own alpha threshold.
    Dissolve,
}

const BAYER_4X4: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

/// Mutable sequencing state, owned by the visual update loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerState {
    pub active: usize,
    pub previous: Option<usize>,
    pub fade_elapsed: f32,
    pub fade_duration: f32,
    pub fade_alpha: f32,
    pub fading: bool,
    pub last_cue: Option<usize>,
    initialized: BTreeSet<usize>,
}

impl SequencerState {
    fn new(active: usize) -> Self {
        Self {
            active,
            previous: None,
            fade_elapsed: 0.0,
            fade_duration: 0.0,
            fade_alpha: 1.0,
            fading: false,
            last_cue: None,
            initialized: BTreeSet::new(),
        }
    }

    pub fn is_initialized(&self, effect: usize) -> bool {
        self.initialized.contains(&effect)
    }

    fn advance_fade(&mut self, dt: f32) {
        if !self.fading {
            return;
        }
        self.fade_elapsed += dt;
        self.fade_alpha = if self.fade_duration > 0.0 {
            self.fade_elapsed / self.fade_duration
        } else {
            1.0
        };
        if self.fade_alpha >= 1.0 {
            self.fade_alpha = 1.0;
            self.fading = false;
        }
    }
}

/// Drives a fixed list of effects from the playback position.
pub struct Sequencer {
    effects: Vec<Box<dyn Effect>>,
    timeline: Timeline,
    state: SequencerState,
    scratch: Surface,
    crossfade: CrossfadeMode,
}

impl Sequencer {
    /// Validates the timeline against `effects` and initializes the effect
    /// of the first cue (or the first effect) on `surface`.
    pub fn new(
        effects: Vec<Box<dyn Effect>>,
        timeline: Timeline,
        surface: &mut Surface,
    ) -> Result<Self> {
        if effects.is_empty() {
            return Err(DemoError::config("sequencer needs at least one effect"));
        }
        timeline.validate(effects.len())?;

        let first = timeline.first_effect();
        let mut sequencer = Self {
            effects,
            timeline,
            state: SequencerState::new(first),
            scratch: surface.scratch_like(),
            crossfade: CrossfadeMode::default(),
        };
        sequencer.effects[first].init(surface);
        sequencer.state.initialized.insert(first);
        debug!(effect = sequencer.effects[first].name(), "sequencer ready");
        Ok(sequencer)
    }

    pub fn with_crossfade(mut self, mode: CrossfadeMode) -> Self {
        self.crossfade = mode;
        self
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn active_effect(&self) -> &str {
        self.effects[self.state.active].name()
    }

    pub fn effect_names(&self) -> Vec<&str> {
        self.effects.iter().map(|effect| effect.name()).collect()
    }

    /// Applies any cue change, advances the fade and animates the visible effects.
    pub fn update(&mut self, dt: f32, sync: &PositionSnapshot, surface: &mut Surface) {
        let dt = dt.max(0.0);
        self.apply_cue(sync, surface);
        self.state.advance_fade(dt);

        self.effects[self.state.active].update(dt, sync);
        if self.state.fading {
            if let Some(previous) = self.state.previous {
                self.effects[previous].update(dt, sync);
            }
        }
    }

    fn apply_cue(&mut self, sync: &PositionSnapshot, surface: &mut Surface) {
        let Some(cue_index) = self.timeline.resolve(sync) else {
            return;
        };
        if self.state.last_cue == Some(cue_index) {
            return;
        }
        self.state.last_cue = Some(cue_index);

        let cue = &self.timeline.cues()[cue_index];
        let target = cue.effect;
        if target == self.state.active {
            return;
        }

        if self.state.initialized.insert(target) {
            self.effects[target].init(surface);
        }

        debug!(
            cue = cue_index,
            from = self.effects[self.state.active].name(),
            to = self.effects[target].name(),
            transition = ?cue.transition,
            "cue fired"
        );

        match cue.transition {
            Transition::Fade | Transition::Crossfade => {
                self.state.previous = Some(self.state.active);
                self.state.active = target;
                self.state.fade_duration = cue.fade_seconds;
                self.state.fade_elapsed = 0.0;
                self.state.fade_alpha = 0.0;
                self.state.fading = true;
            }
            Transition::Cut => {
                self.state.active = target;
                self.state.previous = None;
                self.state.fading = false;
                self.state.fade_alpha = 1.0;
                // A cut always resets the effect, even right after its lazy init.
                self.effects[target].init(surface);
            }
        }
    }

    /// Draws the active effect, blending with the previous one mid-fade.
    pub fn draw(&mut self, surface: &mut Surface) {
        let active = self.state.active;
        let previous = match self.state.previous {
            Some(previous) if self.state.fading => previous,
            _ => {
                self.effects[active].draw(surface);
                return;
            }
        };

        if self.scratch.width() != surface.width() || self.scratch.height() != surface.height() {
            self.scratch = surface.scratch_like();
        } else {
            self.scratch.set_palette(surface.palette().clone());
        }

        self.effects[previous].draw(&mut self.scratch);
        self.effects[active].draw(surface);
        compose(surface, &self.scratch, self.state.fade_alpha, self.crossfade);
    }
}

/// Replaces pixels of `surface` with `outgoing` where the fade has not yet
/// reached them.
fn compose(surface: &mut Surface, outgoing: &Surface, alpha: f32, mode: CrossfadeMode) {
    match mode {
        CrossfadeMode::Threshold => {
            if alpha < 0.5 {
                surface.pixels_mut().copy_from_slice(outgoing.pixels());
            }
        }
        CrossfadeMode::Dissolve => {
            let width = surface.width();
            for (index, (pixel, &old)) in surface
                .pixels_mut()
                .iter_mut()
                .zip(outgoing.pixels())
                .enumerate()
            {
                let (x, y) = (index % width, index / width);
                let threshold = (f32::from(BAYER_4X4[y % 4][x % 4]) + 0.5) / 16.0;
                if alpha < threshold {
                    *pixel = old;
                }
            }
        }
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("effects", &self.effect_names())
            .field("timeline", &self.timeline.len())
            .field("state", &self.state)
            .field("crossfade", &self.crossfade)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::HashMap, rc::Rc};

    use super::*;
    use crate::{render::Palette, timeline::Cue};

    #[derive(Default)]
    struct Log {
        inits: HashMap<&'static str, usize>,
        updates: HashMap<&'static str, usize>,
    }

    /// Fills the surface with its own colour and counts lifecycle calls.
    struct Solid {
        name: &'static str,
        color: u8,
        log: Rc<RefCell<Log>>,
    }

    impl Effect for Solid {
        fn name(&self) -> &str {
            self.name
        }

        fn init(&mut self, surface: &mut Surface) {
            *self.log.borrow_mut().inits.entry(self.name).or_default() += 1;
            surface.palette_mut().set(self.color, crate::render::Rgb::new(self.color, 0, 0));
        }

        fn update(&mut self, _dt: f32, _sync: &PositionSnapshot) {
            *self.log.borrow_mut().updates.entry(self.name).or_default() += 1;
        }

        fn draw(&mut self, surface: &mut Surface) {
            surface.clear(self.color);
        }
    }

    fn effects(log: &Rc<RefCell<Log>>) -> Vec<Box<dyn Effect>> {
        [("a", 1), ("b", 2), ("c", 3)]
            .into_iter()
            .map(|(name, color)| {
                Box::new(Solid {
                    name,
                    color,
                    log: Rc::clone(log),
                }) as Box<dyn Effect>
            })
            .collect()
    }

    fn at(order: i32) -> PositionSnapshot {
        PositionSnapshot::at(order, 0)
    }

    fn inits(log: &Rc<RefCell<Log>>, name: &str) -> usize {
        log.borrow().inits.get(name).copied().unwrap_or(0)
    }

    #[test]
    fn starts_on_first_cue_effect() {
        let log = Rc::default();
        let mut surface = Surface::new(8, 4).unwrap();
        let timeline = Timeline::new(vec![Cue::cut(0, 0, 2), Cue::cut(1, 0, 0)]);
        let sequencer = Sequencer::new(effects(&log), timeline, &mut surface).unwrap();

        assert_eq!(sequencer.active_effect(), "c");
        assert_eq!(inits(&log, "c"), 1);
        assert_eq!(inits(&log, "a"), 0);
    }

    #[test]
    fn rejects_out_of_range_cue_at_construction() {
        let log = Rc::default();
        let mut surface = Surface::new(8, 4).unwrap();
        let timeline = Timeline::new(vec![Cue::cut(0, 0, 7)]);
        let err = Sequencer::new(effects(&log), timeline, &mut surface).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn rejects_empty_effect_list() {
        let mut surface = Surface::new(8, 4).unwrap();
        assert!(Sequencer::new(Vec::new(), Timeline::default(), &mut surface).is_err());
    }

    #[test]
    fn fade_scenario_reaches_full_alpha_after_duration() {
        let log = Rc::default();
        let mut surface = Surface::new(8, 4).unwrap();
        let timeline = Timeline::new(vec![Cue::cut(0, 0, 0), Cue::fade(2, 0, 1, 2.0)]);
        let mut sequencer = Sequencer::new(effects(&log), timeline, &mut surface).unwrap();

        sequencer.update(0.1, &at(0), &mut surface);
        assert_eq!(sequencer.active_effect(), "a");
        sequencer.update(0.1, &at(1), &mut surface);
        assert_eq!(sequencer.active_effect(), "a");
        assert!(!sequencer.state().fading);

        sequencer.update(0.0, &at(2), &mut surface);
        assert_eq!(sequencer.active_effect(), "b");
        assert_eq!(sequencer.state().previous, Some(0));
        assert!(sequencer.state().fading);
        assert_eq!(sequencer.state().fade_alpha, 0.0);

        let mut last_alpha = 0.0;
        let mut elapsed = 0.0;
        while sequencer.state().fading {
            sequencer.update(0.25, &at(2), &mut surface);
            elapsed += 0.25;
            let alpha = sequencer.state().fade_alpha;
            assert!(alpha >= last_alpha);
            assert!(alpha <= 1.0);
            last_alpha = alpha;
        }

        assert_eq!(sequencer.state().fade_alpha, 1.0);
        assert!((elapsed - 2.0f32).abs() < 1e-4);
    }

    #[test]
    fn both_effects_animate_during_fade() {
        let log: Rc<RefCell<Log>> = Rc::default();
        let mut surface = Surface::new(8, 4).unwrap();
        let timeline = Timeline::new(vec![Cue::cut(0, 0, 0), Cue::fade(1, 0, 1, 1.0)]);
        let mut sequencer = Sequencer::new(effects(&log), timeline, &mut surface).unwrap();

        sequencer.update(0.1, &at(1), &mut surface);
        sequencer.update(0.1, &at(1), &mut surface);
        assert_eq!(log.borrow().updates.get("a"), Some(&2));
        assert_eq!(log.borrow().updates.get("b"), Some(&2));
    }

    #[test]
    fn init_runs_once_except_on_cuts() {
        let log = Rc::default();
        let mut surface = Surface::new(8, 4).unwrap();
        let timeline = Timeline::new(vec![
            Cue::cut(0, 0, 0),
            Cue::fade(1, 0, 1, 0.5),
            Cue::fade(2, 0, 0, 0.5),
            Cue::fade(3, 0, 1, 0.5),
            Cue::cut(4, 0, 0),
            Cue::cut(5, 0, 2),
        ]);
        let mut sequencer = Sequencer::new(effects(&log), timeline, &mut surface).unwrap();

        for order in 0..4 {
            sequencer.update(1.0, &at(order), &mut surface);
        }
        assert_eq!(inits(&log, "a"), 1);
        assert_eq!(inits(&log, "b"), 1);

        sequencer.update(1.0, &at(4), &mut surface);
        assert_eq!(inits(&log, "a"), 2, "cut re-initializes a known effect");

        sequencer.update(1.0, &at(5), &mut surface);
        assert_eq!(inits(&log, "c"), 2, "lazy init then cut reset");
        assert!(sequencer.state().is_initialized(2));
    }

    #[test]
    fn first_cut_onto_fresh_effect_inits_twice() {
        let log = Rc::default();
        let mut surface = Surface::new(8, 4).unwrap();
        let timeline = Timeline::new(vec![Cue::cut(0, 0, 0), Cue::cut(1, 0, 1)]);
        let mut sequencer = Sequencer::new(effects(&log), timeline, &mut surface).unwrap();

        sequencer.update(0.1, &at(1), &mut surface);
        assert_eq!(sequencer.active_effect(), "b");
        assert_eq!(inits(&log, "b"), 2);
        assert!(!sequencer.state().fading);
        assert_eq!(sequencer.state().fade_alpha, 1.0);
    }

    #[test]
    fn same_effect_cue_does_not_transition() {
        let log = Rc::default();
        let mut surface = Surface::new(8, 4).unwrap();
        let timeline = Timeline::new(vec![Cue::cut(0, 0, 0), Cue::fade(1, 0, 0, 1.0)]);
        let mut sequencer = Sequencer::new(effects(&log), timeline, &mut surface).unwrap();

        sequencer.update(0.1, &at(1), &mut surface);
        assert!(!sequencer.state().fading);
        assert_eq!(sequencer.state().last_cue, Some(1));
        assert_eq!(inits(&log, "a"), 1);
    }

    #[test]
    fn threshold_blend_switches_at_half() {
        let log = Rc::default();
        let mut surface = Surface::new(8, 4).unwrap();
        let timeline = Timeline::new(vec![Cue::cut(0, 0, 0), Cue::fade(1, 0, 1, 1.0)]);
        let mut sequencer = Sequencer::new(effects(&log), timeline, &mut surface).unwrap();

        sequencer.update(0.4, &at(1), &mut surface);
        sequencer.draw(&mut surface);
        assert!(surface.pixels().iter().all(|&p| p == 1));

        sequencer.update(0.2, &at(1), &mut surface);
        sequencer.draw(&mut surface);
        assert!(surface.pixels().iter().all(|&p| p == 2));

        sequencer.update(1.0, &at(1), &mut surface);
        assert!(!sequencer.state().fading);
        sequencer.draw(&mut surface);
        assert!(surface.pixels().iter().all(|&p| p == 2));
    }

    #[test]
    fn dissolve_blend_mixes_proportionally() {
        let log = Rc::default();
        let mut surface = Surface::new(16, 16).unwrap();
        let timeline = Timeline::new(vec![Cue::cut(0, 0, 0), Cue::fade(1, 0, 1, 1.0)]);
        let mut sequencer = Sequencer::new(effects(&log), timeline, &mut surface)
            .unwrap()
            .with_crossfade(CrossfadeMode::Dissolve);

        sequencer.update(0.25, &at(1), &mut surface);
        sequencer.draw(&mut surface);
        let incoming = surface.pixels().iter().filter(|&&p| p == 2).count();
        assert_eq!(incoming, 16 * 16 / 4);
    }

    #[test]
    fn scratch_uses_the_live_palette() {
        let log = Rc::default();
        let mut surface = Surface::new(4, 4).unwrap();
        let timeline = Timeline::new(vec![Cue::cut(0, 0, 0), Cue::fade(1, 0, 1, 1.0)]);
        let mut sequencer = Sequencer::new(effects(&log), timeline, &mut surface).unwrap();

        let custom = Palette::gradient(crate::render::Rgb::BLACK, crate::render::Rgb::new(1, 2, 3));
        surface.set_palette(custom.clone());
        sequencer.update(0.1, &at(1), &mut surface);
        sequencer.draw(&mut surface);
        assert_eq!(sequencer.scratch.palette().get(200), custom.get(200));
    }
}
