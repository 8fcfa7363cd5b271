#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::data::{LETTERS, PIXELS};
use crate::{Error, Result};

/// Width of each hidden layer in the default topology.
pub const DEFAULT_HIDDEN_WIDTH: usize = 100;

/// Ordered layer widths: input first, output last, hidden layers in between.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<usize>", into = "Vec<usize>"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    sizes: Vec<usize>,
}

impl Default for Topology {
    /// 28x28 glyphs in, 26 letters out, two hidden layers of 100.
    fn default() -> Self {
        Self {
            sizes: vec![PIXELS, DEFAULT_HIDDEN_WIDTH, DEFAULT_HIDDEN_WIDTH, LETTERS],
        }
    }
}

impl Topology {
    pub fn new(sizes: Vec<usize>) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(Error::InvalidConfig(
                "topology must include input and output widths".to_owned(),
            ));
        }
        if sizes.contains(&0) {
            return Err(Error::InvalidConfig(
                "all layer widths must be > 0".to_owned(),
            ));
        }
        Ok(Self { sizes })
    }

    /// `hidden_count` layers of `hidden_width` between fixed input/output widths.
    pub fn with_hidden(
        input: usize,
        hidden_count: usize,
        hidden_width: usize,
        output: usize,
    ) -> Result<Self> {
        if hidden_count > 0 && hidden_width == 0 {
            return Err(Error::InvalidConfig("hidden width must be > 0".to_owned()));
        }
        let mut sizes = Vec::with_capacity(hidden_count + 2);
        sizes.push(input);
        sizes.extend(std::iter::repeat_n(hidden_width, hidden_count));
        sizes.push(output);
        Self::new(sizes)
    }

    /// Wrap widths taken from an existing network, which already satisfy the
    /// invariants `new` checks.
    pub(crate) fn from_validated(sizes: Vec<usize>) -> Self {
        debug_assert!(
            sizes.len() >= 2 && !sizes.contains(&0),
            "invalid layer widths {sizes:?}"
        );
        Self { sizes }
    }

    #[inline]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    #[inline]
    pub fn input_size(&self) -> usize {
        self.sizes[0]
    }

    #[inline]
    pub fn output_size(&self) -> usize {
        self.sizes[self.sizes.len() - 1]
    }

    #[inline]
    pub fn layer_count(&self) -> usize {
        self.sizes.len()
    }

    #[inline]
    pub fn hidden_count(&self) -> usize {
        self.sizes.len() - 2
    }

    /// Panics if `idx >= layer_count()`.
    #[inline]
    pub fn layer_size(&self, idx: usize) -> usize {
        self.sizes[idx]
    }

    /// `(in, out)` width pairs, one per weight transition.
    pub fn transitions(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.sizes.windows(2).map(|w| (w[0], w[1]))
    }
}

impl TryFrom<Vec<usize>> for Topology {
    type Error = Error;

    fn try_from(sizes: Vec<usize>) -> Result<Self> {
        Self::new(sizes)
    }
}

impl From<Topology> for Vec<usize> {
    fn from(topology: Topology) -> Self {
        topology.sizes
    }
}
