//! Stable per-task-name color assignment, so re-running the same graph reproduces the same
//! colors regardless of which order tasks happen to claim the foreground in.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use owo_colors::{AnsiColors, OwoColorize};

const PALETTE: &[AnsiColors] = &[
    AnsiColors::Cyan,
    AnsiColors::Yellow,
    AnsiColors::Green,
    AnsiColors::Magenta,
    AnsiColors::Blue,
    AnsiColors::BrightCyan,
    AnsiColors::BrightYellow,
    AnsiColors::BrightGreen,
    AnsiColors::BrightMagenta,
    AnsiColors::BrightBlue,
];

/// Assigns each task name a color drawn from a fixed palette, keyed by the name's hash rather
/// than assignment order.
#[derive(Debug, Default, Clone, Copy)]
pub struct ColorSelector;

impl ColorSelector {
    pub fn color_for(&self, task_name: &str) -> AnsiColors {
        let mut hasher = DefaultHasher::new();
        task_name.hash(&mut hasher);
        let index = (hasher.finish() as usize) % PALETTE.len();
        PALETTE[index]
    }

    pub fn prefix(&self, task_name: &str) -> String {
        format!("{} ", task_name.color(self.color_for(task_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_always_gets_the_same_color() {
        let selector = ColorSelector;
        let first = selector.color_for("web#build");
        let second = selector.color_for("web#build");
        assert!(matches!((first, second), (a, b) if format!("{a:?}") == format!("{b:?}")));
    }

    #[test]
    fn different_names_can_get_different_colors() {
        let selector = ColorSelector;
        let colors: std::collections::HashSet<String> = ["a", "b", "c", "d", "e", "f"]
            .iter()
            .map(|name| format!("{:?}", selector.color_for(name)))
            .collect();
        assert!(colors.len() > 1, "expected the palette to spread names across more than one color");
    }
}
