//! Light/dark theme shared by every view.

use serde::{Deserialize, Serialize};

use super::store::Store;

/// Colour scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light scheme.
    #[default]
    Light,
    /// Dark scheme.
    Dark,
}

impl Theme {
    /// The other scheme.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Flip the theme held in `store`, notifying subscribers.
pub fn toggle_theme(store: &Store<Theme>) {
    store.update(|theme| *theme = theme.toggled());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle() {
        let store = Store::new(Theme::default());
        toggle_theme(&store);
        assert_eq!(store.get(), Theme::Dark);
        toggle_theme(&store);
        assert_eq!(store.get(), Theme::Light);
    }
}
