use crate::map::{Map, TileIndex};
use crate::track::Trackdir;
use serde::{Deserialize, Serialize};

/// Logical position on the track network.
///
/// `wormhole` is set while inside the middle section of a tunnel or bridge:
/// `tile` is then the head that was entered and `wormhole` the far head.
/// Two positions on the same head tile differ by this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathPos {
    pub tile: TileIndex,
    pub td: Trackdir,
    pub wormhole: Option<TileIndex>,
}

impl PathPos {
    pub fn new(tile: TileIndex, td: Trackdir) -> Self {
        Self {
            tile,
            td,
            wormhole: None,
        }
    }

    pub fn in_wormhole(tile: TileIndex, td: Trackdir, far_end: TileIndex) -> Self {
        Self {
            tile,
            td,
            wormhole: Some(far_end),
        }
    }

    pub fn is_in_wormhole(&self) -> bool {
        self.wormhole.is_some()
    }

    /// Same spot, travelling the other way.
    pub fn reverse(&self) -> Self {
        match self.wormhole {
            Some(far) => Self::in_wormhole(far, self.td.reverse(), self.tile),
            None => Self::new(self.tile, self.td.reverse()),
        }
    }

    /// Whether this position is on a wormhole head and about to enter the
    /// middle section.
    pub fn enters_wormhole(&self, map: &Map) -> bool {
        self.wormhole.is_none()
            && map
                .wormhole(self.tile)
                .is_some_and(|w| w.dir == self.td.exitdir())
    }
}

impl std::fmt::Display for PathPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.wormhole {
            Some(far) => write!(f, "{}~{} {:?}", self.tile, far, self.td),
            None => write!(f, "{} {:?}", self.tile, self.td),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_inside_wormhole_swaps_heads() {
        let pos = PathPos::in_wormhole(TileIndex(3), Trackdir::XSw, TileIndex(7));
        let rev = pos.reverse();
        assert_eq!(rev.tile, TileIndex(7));
        assert_eq!(rev.wormhole, Some(TileIndex(3)));
        assert_eq!(rev.td, Trackdir::XNe);
        assert_eq!(rev.reverse(), pos);
    }
}
