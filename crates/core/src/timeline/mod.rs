use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{position::PositionSnapshot, DemoError, Result};

/// Row value meaning "any row of the order".
pub const ANY_ROW: i32 = -1;

/// Fade length used when a cue asks for a non-positive duration.
pub const DEFAULT_FADE_SECONDS: f32 = 1.0;

/// How the sequencer switches to a cue's effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    #[default]
    Cut,
    Fade,
    Crossfade,
}

impl Transition {
    /// Fade and crossfade share the same blend.
    pub fn is_blended(self) -> bool {
        matches!(self, Self::Fade | Self::Crossfade)
    }
}

/// Point in the tracker timeline where a cue becomes eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuePosition {
    pub order: i32,
    /// [`ANY_ROW`] matches every row of `order`.
    pub row: i32,
}

impl CuePosition {
    pub fn new(order: i32, row: i32) -> Self {
        Self { order, row }
    }

    pub fn any_row(order: i32) -> Self {
        Self::new(order, ANY_ROW)
    }

    pub fn is_any_row(&self) -> bool {
        self.row == ANY_ROW
    }

    /// `true` once playback is at or past this position.
    pub fn reached_by(&self, sync: &PositionSnapshot) -> bool {
        match sync.order.cmp(&self.order) {
            Ordering::Greater => true,
            Ordering::Equal => self.is_any_row() || sync.row >= self.row,
            Ordering::Less => false,
        }
    }

    /// Ordering key between thresholds; a wildcard sorts as the first row.
    fn key(&self) -> (i32, i32) {
        (self.order, self.row.max(0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub position: CuePosition,
    /// Index into the sequencer's effect list.
    pub effect: usize,
    pub transition: Transition,
    pub fade_seconds: f32,
}

impl Cue {
    /// Builds a cue, substituting [`DEFAULT_FADE_SECONDS`] for a non-positive fade.
    pub fn new(position: CuePosition, effect: usize, transition: Transition, fade_seconds: f32) -> Self {
        let fade_seconds = if fade_seconds > 0.0 {
            fade_seconds
        } else {
            DEFAULT_FADE_SECONDS
        };
        Self {
            position,
            effect,
            transition,
            fade_seconds,
        }
    }

    pub fn cut(order: i32, row: i32, effect: usize) -> Self {
        Self::new(CuePosition::new(order, row), effect, Transition::Cut, 0.0)
    }

    pub fn fade(order: i32, row: i32, effect: usize, seconds: f32) -> Self {
        Self::new(CuePosition::new(order, row), effect, Transition::Fade, seconds)
    }
}

/// Cue list resolved against the playback position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    cues: Vec<Cue>,
}

impl Timeline {
    pub fn new(cues: Vec<Cue>) -> Self {
        Self { cues }
    }

    /// Built-in running order used when no cue file is given: cuts through
    /// the first effects, then a two second fade back to the first one.
    /// Cues naming effects beyond `effect_count` are dropped.
    pub fn default_for(effect_count: usize) -> Self {
        let cues = [
            Cue::cut(0, 0, 0),
            Cue::cut(1, 0, 3),
            Cue::cut(2, 0, 2),
            Cue::cut(3, 0, 1),
            Cue::fade(4, 0, 0, 2.0),
        ];
        Self::new(
            cues.into_iter()
                .filter(|cue| cue.effect < effect_count)
                .collect(),
        )
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn get(&self, index: usize) -> Option<&Cue> {
        self.cues.get(index)
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Effect shown before any cue fires.
    pub fn first_effect(&self) -> usize {
        self.cues.first().map(|cue| cue.effect).unwrap_or(0)
    }

    /// Checks every cue against the number of available effects.
    pub fn validate(&self, effect_count: usize) -> Result<()> {
        for cue in &self.cues {
            if cue.effect >= effect_count {
                return Err(DemoError::EffectIndexOutOfRange {
                    index: cue.effect,
                    available: effect_count,
                });
            }
            if cue.position.row < ANY_ROW {
                return Err(DemoError::config(format!(
                    "cue at order {} has invalid row {}",
                    cue.position.order, cue.position.row
                )));
            }
        }
        Ok(())
    }

    /// Index of the cue with the latest threshold already reached by `sync`.
    ///
    /// List order does not matter; when two reached cues share a threshold
    /// the later entry wins. Returns `None` before the first threshold.
    pub fn resolve(&self, sync: &PositionSnapshot) -> Option<usize> {
        let mut best: Option<(usize, (i32, i32))> = None;
        for (index, cue) in self.cues.iter().enumerate() {
            if !cue.position.reached_by(sync) {
                continue;
            }
            let key = cue.position.key();
            match best {
                Some((_, best_key)) if key < best_key => {}
                _ => best = Some((index, key)),
            }
        }
        best.map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(order: i32, row: i32) -> PositionSnapshot {
        PositionSnapshot::at(order, row)
    }

    #[test]
    fn nothing_resolves_before_first_threshold() {
        let timeline = Timeline::new(vec![Cue::cut(1, 0, 0)]);
        assert_eq!(timeline.resolve(&at(0, 63)), None);
        assert_eq!(timeline.resolve(&at(1, 0)), Some(0));
    }

    #[test]
    fn picks_latest_reached_threshold() {
        let timeline = Timeline::new(vec![
            Cue::cut(0, 0, 0),
            Cue::cut(0, 32, 1),
            Cue::fade(2, 0, 2, 2.0),
        ]);
        assert_eq!(timeline.resolve(&at(0, 31)), Some(0));
        assert_eq!(timeline.resolve(&at(0, 32)), Some(1));
        assert_eq!(timeline.resolve(&at(1, 0)), Some(1));
        assert_eq!(timeline.resolve(&at(2, 0)), Some(2));
    }

    #[test]
    fn tolerates_out_of_order_lists() {
        let timeline = Timeline::new(vec![
            Cue::cut(3, 0, 2),
            Cue::cut(0, 0, 0),
            Cue::cut(1, 0, 1),
        ]);
        assert_eq!(timeline.resolve(&at(0, 5)), Some(1));
        assert_eq!(timeline.resolve(&at(2, 0)), Some(2));
        assert_eq!(timeline.resolve(&at(5, 0)), Some(0));
    }

    #[test]
    fn wildcard_row_matches_whole_order() {
        let timeline = Timeline::new(vec![
            Cue::cut(0, 0, 0),
            Cue::new(CuePosition::any_row(1), 1, Transition::Cut, 0.0),
        ]);
        assert_eq!(timeline.resolve(&at(1, 0)), Some(1));
        assert_eq!(timeline.resolve(&at(1, 40)), Some(1));
        assert_eq!(timeline.resolve(&at(0, 63)), Some(0));
    }

    #[test]
    fn never_rewinds_while_position_advances() {
        let timeline = Timeline::new(vec![
            Cue::cut(2, 16, 3),
            Cue::cut(0, 0, 0),
            Cue::new(CuePosition::any_row(1), 1, Transition::Fade, 1.0),
            Cue::cut(1, 8, 2),
            Cue::cut(2, 16, 4),
            Cue::cut(3, 0, 1),
        ]);

        let mut last_key: Option<(i32, i32)> = None;
        for order in 0..5 {
            for row in 0..64 {
                if let Some(index) = timeline.resolve(&at(order, row)) {
                    let key = timeline.get(index).unwrap().position.key();
                    if let Some(previous) = last_key {
                        assert!(key >= previous, "rewound from {previous:?} to {key:?}");
                    }
                    last_key = Some(key);
                }
            }
        }
        assert_eq!(last_key, Some((3, 0)));
    }

    #[test]
    fn equal_thresholds_prefer_later_entry() {
        let timeline = Timeline::new(vec![Cue::cut(2, 16, 3), Cue::cut(2, 16, 4)]);
        assert_eq!(timeline.resolve(&at(2, 16)), Some(1));
    }

    #[test]
    fn non_positive_fade_uses_default() {
        assert_eq!(Cue::fade(0, 0, 0, 0.0).fade_seconds, DEFAULT_FADE_SECONDS);
        assert_eq!(Cue::fade(0, 0, 0, -3.0).fade_seconds, DEFAULT_FADE_SECONDS);
        assert_eq!(Cue::fade(0, 0, 0, 2.5).fade_seconds, 2.5);
    }

    #[test]
    fn validate_rejects_missing_effect() {
        let timeline = Timeline::new(vec![Cue::cut(0, 0, 0), Cue::cut(1, 0, 5)]);
        assert!(timeline.validate(6).is_ok());
        let err = timeline.validate(5).unwrap_err();
        assert!(matches!(
            err,
            DemoError::EffectIndexOutOfRange { index: 5, available: 5 }
        ));
    }

    #[test]
    fn default_timeline_drops_unknown_effects() {
        assert_eq!(Timeline::default_for(6).len(), 5);
        let small = Timeline::default_for(2);
        assert!(small.cues().iter().all(|cue| cue.effect < 2));
        assert_eq!(small.len(), 3);
        assert_eq!(small.first_effect(), 0);
        assert_eq!(Timeline::default_for(0).first_effect(), 0);
    }

    #[test]
    fn transition_parses_lowercase() {
        let t: Transition = serde_json::from_str("\"crossfade\"").unwrap();
        assert_eq!(t, Transition::Crossfade);
        assert!(t.is_blended());
        assert!(!Transition::Cut.is_blended());
        assert!(serde_json::from_str::<Transition>("\"wipe\"").is_err());
    }
}
