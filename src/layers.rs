//! Cumulative layer boundaries of a scalable bitstream.
//!
//! Layer `i` occupies the soft bits `[lower(i), upper(i))` of a frame. A frame
//! of length `len` carries layer `i` only when `len >= upper(i)`, so the only
//! legal frame lengths are zero and the boundaries themselves.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::{EidError, Result};

/// Maximum number of layers (and therefore pattern files) per run.
pub const MAX_LAYERS: usize = 32;

/// Default layering: 8 to 32 kbit/s in 20 ms frames.
pub const DEFAULT_LAYERS: [usize; 5] = [160, 240, 320, 480, 640];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerTopology {
    upper: Vec<usize>,
}

impl LayerTopology {
    /// Build a topology from strictly increasing, positive boundaries.
    pub fn new(upper: Vec<usize>) -> Result<Self> {
        if upper.is_empty() {
            return Err(EidError::Config("at least one layer boundary is required".into()));
        }
        if upper.len() > MAX_LAYERS {
            return Err(EidError::Config(format!(
                "{} layers requested, at most {MAX_LAYERS} are supported",
                upper.len()
            )));
        }
        if upper[0] == 0 {
            return Err(EidError::Config("layer boundaries must be positive".into()));
        }
        if let Some(w) = upper.windows(2).find(|w| w[0] >= w[1]) {
            return Err(EidError::Config(format!(
                "layer boundaries must be strictly increasing ({} followed by {})",
                w[0], w[1]
            )));
        }
        Ok(Self { upper })
    }

    pub fn layer_count(&self) -> usize {
        self.upper.len()
    }

    /// End (exclusive) of layer `i` in bits.
    pub fn upper(&self, i: usize) -> usize {
        self.upper[i]
    }

    /// Start of layer `i` in bits.
    pub fn lower(&self, i: usize) -> usize {
        if i == 0 {
            0
        } else {
            self.upper[i - 1]
        }
    }

    pub fn range(&self, i: usize) -> Range<usize> {
        self.lower(i)..self.upper(i)
    }

    /// Length of a frame carrying every layer.
    pub fn max_bits(&self) -> usize {
        self.upper[self.upper.len() - 1]
    }

    pub fn boundaries(&self) -> &[usize] {
        &self.upper
    }

    /// Whether a frame of `len` bits contains layer `i`.
    pub fn reaches(&self, len: usize, i: usize) -> bool {
        len >= self.upper[i]
    }

    /// Whether `len` is a legal frame length for this layering.
    pub fn is_boundary(&self, len: usize) -> bool {
        len == 0 || self.upper.binary_search(&len).is_ok()
    }

    /// Largest legal frame length not above `len`.
    pub fn floor_boundary(&self, len: usize) -> usize {
        match self.upper.binary_search(&len) {
            Ok(i) => self.upper[i],
            Err(0) => 0,
            Err(i) => self.upper[i - 1],
        }
    }
}

impl Default for LayerTopology {
    fn default() -> Self {
        Self {
            upper: DEFAULT_LAYERS.to_vec(),
        }
    }
}

impl FromStr for LayerTopology {
    type Err = EidError;

    /// Parse a comma separated boundary list such as `160,240,320`.
    fn from_str(s: &str) -> Result<Self> {
        let mut upper = Vec::new();
        for item in s.split(',') {
            let item = item.trim();
            let value = item.parse::<usize>().map_err(|_| {
                EidError::Config(format!("illegal layer boundary {item:?} in {s:?}"))
            })?;
            upper.push(value);
        }
        Self::new(upper)
    }
}

impl fmt::Display for LayerTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.upper.iter().map(|b| b.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layering() {
        let t = LayerTopology::default();
        assert_eq!(t.layer_count(), 5);
        assert_eq!(t.max_bits(), 640);
        assert_eq!(t.lower(0), 0);
        assert_eq!(t.lower(3), 320);
        assert_eq!(t.range(1), 160..240);
    }

    #[test]
    fn parse_boundary_list() {
        let t: LayerTopology = "2, 4,6".parse().unwrap();
        assert_eq!(t.boundaries(), &[2, 4, 6]);
        assert_eq!(t.to_string(), "2,4,6");
    }

    #[test]
    fn rejects_bad_lists() {
        assert!("".parse::<LayerTopology>().is_err());
        assert!("160,,240".parse::<LayerTopology>().is_err());
        assert!("160,-240".parse::<LayerTopology>().is_err());
        assert!("240,160".parse::<LayerTopology>().is_err());
        assert!("160,160".parse::<LayerTopology>().is_err());
        assert!("0,160".parse::<LayerTopology>().is_err());
        assert!(LayerTopology::new((1..=33).collect()).is_err());
        assert!(LayerTopology::new((1..=32).collect()).is_ok());
    }

    #[test]
    fn boundary_lookup() {
        let t = LayerTopology::new(vec![2, 4]).unwrap();
        assert!(t.is_boundary(0));
        assert!(t.is_boundary(2));
        assert!(t.is_boundary(4));
        assert!(!t.is_boundary(3));
        assert!(!t.is_boundary(6));
        assert!(t.reaches(4, 1));
        assert!(!t.reaches(2, 1));
    }

    #[test]
    fn floor_snaps_to_layer_grid() {
        let t = LayerTopology::new(vec![2, 4]).unwrap();
        assert_eq!(t.floor_boundary(0), 0);
        assert_eq!(t.floor_boundary(1), 0);
        assert_eq!(t.floor_boundary(3), 2);
        assert_eq!(t.floor_boundary(4), 4);
        assert_eq!(t.floor_boundary(9), 4);
    }
}
