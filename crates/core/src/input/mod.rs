use std::{collections::HashSet, hash::Hash};

/// Key state owned by the update loop, giving press edges between frames.
#[derive(Debug, Clone)]
pub struct InputState<K> {
    down: HashSet<K>,
    previous: HashSet<K>,
}

impl<K> Default for InputState<K> {
    fn default() -> Self {
        Self {
            down: HashSet::new(),
            previous: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash + Copy> InputState<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new frame with `held` as the set of keys currently down.
    pub fn advance(&mut self, held: impl IntoIterator<Item = K>) {
        std::mem::swap(&mut self.previous, &mut self.down);
        self.down.clear();
        self.down.extend(held);
    }

    pub fn is_down(&self, key: K) -> bool {
        self.down.contains(&key)
    }

    /// `true` only on the frame the key went down.
    pub fn just_pressed(&self, key: K) -> bool {
        self.down.contains(&key) && !self.previous.contains(&key)
    }

    pub fn just_released(&self, key: K) -> bool {
        !self.down.contains(&key) && self.previous.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_is_reported_once() {
        let mut input = InputState::new();
        input.advance(['q']);
        assert!(input.just_pressed('q'));

        input.advance(['q']);
        assert!(input.is_down('q'));
        assert!(!input.just_pressed('q'));

        input.advance([]);
        assert!(input.just_released('q'));
        input.advance(['q']);
        assert!(input.just_pressed('q'));
    }

    #[test]
    fn keys_are_independent() {
        let mut input = InputState::new();
        input.advance(['d']);
        input.advance(['d', 'q']);
        assert!(!input.just_pressed('d'));
        assert!(input.just_pressed('q'));
    }
}
