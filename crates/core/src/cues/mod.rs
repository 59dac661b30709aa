//! JSON cue files: named effects plus the cue records that reference them.
//!
//! ```json
//! {
//!   "effects": ["bars", "pulse"],
//!   "cues": [
//!     { "order": 0, "row": 0, "effect": "bars" },
//!     { "order": 2, "row": -1, "effect": "pulse", "transition": "fade", "fade_dur": 2.0 }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    timeline::{Cue, CuePosition, Timeline, Transition},
    DemoError, Result,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CueFile {
    /// Effects the file refers to. May be empty, in which case every cue is
    /// checked against the host's effect list directly.
    #[serde(default)]
    pub effects: Vec<String>,
    pub cues: Vec<CueDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CueDef {
    pub order: i32,
    #[serde(default)]
    pub row: i32,
    pub effect: String,
    #[serde(default)]
    pub transition: Option<Transition>,
    #[serde(default)]
    pub fade_dur: Option<f32>,
}

impl CueFile {
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|err| DemoError::config(format!("failed to read cue file {}: {err}", path.display())))?;
        let file = Self::from_json(&data)?;
        debug!(path = %path.display(), cues = file.cues.len(), "loaded cue file");
        Ok(file)
    }

    /// Maps effect names to positions in `available` and applies defaults.
    ///
    /// Fails on the first name that is not both declared (when the file
    /// declares any) and available.
    pub fn resolve(&self, available: &[&str]) -> Result<Timeline> {
        let lookup = |name: &str| {
            available
                .iter()
                .position(|candidate| *candidate == name)
                .ok_or_else(|| DemoError::UnknownEffect {
                    name: name.to_string(),
                })
        };

        for declared in &self.effects {
            lookup(declared)?;
        }

        let mut cues = Vec::with_capacity(self.cues.len());
        for def in &self.cues {
            if !self.effects.is_empty() && !self.effects.iter().any(|e| *e == def.effect) {
                return Err(DemoError::UnknownEffect {
                    name: def.effect.clone(),
                });
            }
            cues.push(Cue::new(
                CuePosition::new(def.order, def.row),
                lookup(&def.effect)?,
                def.transition.unwrap_or_default(),
                def.fade_dur.unwrap_or(0.0),
            ));
        }

        let timeline = Timeline::new(cues);
        timeline.validate(available.len())?;
        Ok(timeline)
    }
}
