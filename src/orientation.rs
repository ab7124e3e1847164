//! Scanline orientation.

/// Which visual row a buffer stores first.
///
/// Image files store the visually topmost scanline first. GPU textures read
/// back with a bottom-left origin store the bottom scanline first and must be
/// flipped before writing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RowOrder {
    /// Row 0 is the topmost scanline.
    #[default]
    TopLineFirst,
    /// Row 0 is the bottommost scanline.
    BottomLineFirst,
}

impl RowOrder {
    /// Map a `top_line_first` flag to a row order.
    pub fn from_top_line_first(top_line_first: bool) -> Self {
        if top_line_first {
            Self::TopLineFirst
        } else {
            Self::BottomLineFirst
        }
    }

    /// Whether row 0 is the topmost scanline.
    pub fn is_top_line_first(self) -> bool {
        matches!(self, Self::TopLineFirst)
    }

    /// The opposite order.
    pub fn flipped(self) -> Self {
        match self {
            Self::TopLineFirst => Self::BottomLineFirst,
            Self::BottomLineFirst => Self::TopLineFirst,
        }
    }

    /// Storage row holding visual row `y` of an image `height` rows tall.
    ///
    /// The mapping is its own inverse.
    #[inline]
    pub fn storage_row(self, y: u32, height: u32) -> u32 {
        match self {
            Self::TopLineFirst => y,
            Self::BottomLineFirst => height - 1 - y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_flag() {
        assert_eq!(RowOrder::from_top_line_first(true), RowOrder::TopLineFirst);
        assert_eq!(
            RowOrder::from_top_line_first(false),
            RowOrder::BottomLineFirst
        );
        assert!(RowOrder::TopLineFirst.is_top_line_first());
        assert!(!RowOrder::BottomLineFirst.is_top_line_first());
    }

    #[test]
    fn storage_rows() {
        assert_eq!(RowOrder::TopLineFirst.storage_row(0, 4), 0);
        assert_eq!(RowOrder::TopLineFirst.storage_row(3, 4), 3);
        assert_eq!(RowOrder::BottomLineFirst.storage_row(0, 4), 3);
        assert_eq!(RowOrder::BottomLineFirst.storage_row(3, 4), 0);
    }

    #[test]
    fn storage_row_is_involution() {
        for y in 0..5 {
            let order = RowOrder::BottomLineFirst;
            assert_eq!(order.storage_row(order.storage_row(y, 5), 5), y);
        }
    }

    #[test]
    fn flipped_and_default() {
        assert_eq!(RowOrder::default(), RowOrder::TopLineFirst);
        assert_eq!(RowOrder::TopLineFirst.flipped(), RowOrder::BottomLineFirst);
        assert_eq!(RowOrder::BottomLineFirst.flipped(), RowOrder::TopLineFirst);
    }
}
