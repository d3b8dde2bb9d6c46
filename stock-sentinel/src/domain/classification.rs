//! The fixed-shape result of classifying a fetched page.

use serde::{Deserialize, Serialize};

/// Boolean signals derived from one page fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    /// The page offers a way to order / buy / reserve.
    pub has_order_signal: bool,
    /// The page asserts the item is available (and nothing asserts otherwise).
    pub has_availability_signal: bool,
}

impl Classification {
    /// The "unknown / nothing detected" classification.
    pub const NEUTRAL: Self = Self {
        has_order_signal: false,
        has_availability_signal: false,
    };

    pub fn new(has_order_signal: bool, has_availability_signal: bool) -> Self {
        Self {
            has_order_signal,
            has_availability_signal,
        }
    }

    /// Whether `self` gained the order signal relative to `previous`.
    pub fn gained_order(&self, previous: &Classification) -> bool {
        self.has_order_signal && !previous.has_order_signal
    }

    /// Whether `self` gained the availability signal relative to `previous`.
    pub fn gained_availability(&self, previous: &Classification) -> bool {
        self.has_availability_signal && !previous.has_availability_signal
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "order={} availability={}",
            self.has_order_signal, self.has_availability_signal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gains_are_one_directional() {
        let before = Classification::new(false, true);
        let after = Classification::new(true, false);

        assert!(after.gained_order(&before));
        assert!(!after.gained_availability(&before));
        assert!(!before.gained_order(&after));
        assert!(before.gained_availability(&after));
    }

    #[test]
    fn test_neutral_is_default() {
        assert_eq!(Classification::default(), Classification::NEUTRAL);
    }
}
