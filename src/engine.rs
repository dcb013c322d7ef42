//! Per-frame layer erasure.
//!
//! [`apply_erasures`] turns one input frame and one [`LayerFlag`] per layer
//! into the damaged output frame and tells which layers were hit. It works in
//! two passes: an overlay that copies the intact layers the frame carries, then
//! a truncation pass that cuts erased layers off the end of the frame and
//! re-attributes what the cut removed.

use std::fmt;

use clap::ValueEnum;
use serde::Serialize;
use tracing::debug;

use crate::error::{EidError, Result};
use crate::format::{Frame, FrameTag, SOFT_ERASED};
use crate::layers::{LayerTopology, MAX_LAYERS};
use crate::pattern::LayerFlag;

/// How erased layers are removed from a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Truncate the frame at the lowest erased layer.
    #[default]
    Layered,
    /// Truncate only the erased top layers; blank erased layers below them
    /// and leave it to the decoder to find the usable bits.
    Individual,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Layered => f.write_str("layered"),
            Mode::Individual => f.write_str("individual"),
        }
    }
}

/// Set of layer indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct LayerMask(u32);

impl LayerMask {
    pub const EMPTY: LayerMask = LayerMask(0);

    pub fn insert(&mut self, layer: usize) {
        debug_assert!(layer < MAX_LAYERS);
        self.0 |= 1 << layer;
    }

    pub fn contains(self, layer: usize) -> bool {
        layer < MAX_LAYERS && self.0 & (1 << layer) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..MAX_LAYERS).filter(move |&i| self.contains(i))
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl FromIterator<usize> for LayerMask {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut mask = LayerMask::EMPTY;
        for i in iter {
            mask.insert(i);
        }
        mask
    }
}

/// Damage attribution for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outcome {
    /// Layers this run erased, directly or by truncating above an erasure.
    pub applied: LayerMask,
    /// Layers missing or blank in the output frame, whatever the cause.
    pub cumulative: LayerMask,
    /// Lowest layer whose erasure shortened the frame.
    pub first_truncated: Option<usize>,
}

impl Outcome {
    /// Whether this run damaged the frame at all.
    pub fn disturbed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Apply one frame's layer flags to `input`, writing the result to `out`.
///
/// `out` is fully overwritten; its allocation is reused.
pub fn apply_erasures(
    input: &Frame,
    flags: &[LayerFlag],
    topology: &LayerTopology,
    mode: Mode,
    out: &mut Frame,
) -> Result<Outcome> {
    let n = topology.layer_count();
    if flags.len() != n {
        return Err(EidError::Config(format!(
            "{} layer flags supplied for {n} layers",
            flags.len()
        )));
    }
    if !topology.is_boundary(input.len()) {
        return Err(EidError::IllegalFrameLength {
            frame: 0,
            len: input.len(),
        });
    }

    // A tag outside the vocabulary means the frame is lost altogether.
    let (tag, len) = if input.tag.is_valid() {
        (input.tag, input.len())
    } else {
        debug!(tag = ?input.tag, "illegal input tag, frame set to erasure");
        (FrameTag::Fer, 0)
    };

    out.tag = tag;
    out.bits.clear();
    out.bits.resize(len, SOFT_ERASED);

    let mut outcome = Outcome::default();
    for i in 0..n {
        if !topology.reaches(len, i) {
            continue;
        }
        if flags[i].is_erased() {
            out.tag = FrameTag::Fer;
            outcome.applied.insert(i);
        } else {
            let range = topology.range(i);
            out.bits[range.clone()].copy_from_slice(&input.bits[range]);
        }
    }

    let mut out_len = len;
    match mode {
        Mode::Layered => {
            for i in (0..n).rev() {
                if topology.reaches(out_len, i) && flags[i].is_erased() {
                    out_len = topology.lower(i);
                    outcome.first_truncated = Some(i);
                }
            }
            if let Some(first) = outcome.first_truncated {
                for i in first + 1..n {
                    if !flags[i].is_erased() && topology.reaches(len, i) {
                        outcome.applied.insert(i);
                    }
                }
            }
        }
        Mode::Individual => {
            let top = (0..n).rev().find(|&i| topology.reaches(len, i));
            if let Some(top) = top {
                let mut i = top;
                while i > 0 && flags[i].is_erased() {
                    out_len = topology.lower(i);
                    outcome.first_truncated = Some(i);
                    i -= 1;
                }
            }
        }
    }
    out.bits.truncate(out_len);

    // A truncated frame without blanks left in it is a good, shorter frame.
    if out_len != 0 {
        out.tag = if out.bits.contains(&SOFT_ERASED) {
            FrameTag::Fer
        } else {
            FrameTag::Sync
        };
    }

    if !out.is_no_data() {
        let mut i = n;
        while i > 0 && out_len < topology.upper(i - 1) {
            outcome.cumulative.insert(i - 1);
            i -= 1;
        }
        if out.tag == FrameTag::Fer {
            for k in 0..i {
                if out.bits[topology.range(k)].iter().all(|&b| b == SOFT_ERASED) {
                    outcome.cumulative.insert(k);
                }
            }
        }
    }

    debug!(
        in_tag = ?input.tag,
        in_len = input.len(),
        out_tag = ?out.tag,
        out_len,
        applied = outcome.applied.bits(),
        cumulative = outcome.cumulative.bits(),
        "frame processed"
    );
    Ok(outcome)
}

/// Owns the reusable output frame and the per-run settings.
pub struct ErasureEngine {
    topology: LayerTopology,
    mode: Mode,
    out: Frame,
    frames: u64,
}

impl ErasureEngine {
    pub fn new(topology: LayerTopology, mode: Mode) -> Self {
        let out = Frame {
            tag: FrameTag::Sync,
            bits: Vec::with_capacity(topology.max_bits()),
        };
        Self {
            topology,
            mode,
            out,
            frames: 0,
        }
    }

    pub fn topology(&self) -> &LayerTopology {
        &self.topology
    }

    /// Process the next frame of the stream.
    pub fn process(&mut self, input: &Frame, flags: &[LayerFlag]) -> Result<(&Frame, Outcome)> {
        let frame = self.frames;
        let outcome = apply_erasures(input, flags, &self.topology, self.mode, &mut self.out)
            .map_err(|e| match e {
                EidError::IllegalFrameLength { len, .. } => {
                    EidError::IllegalFrameLength { frame, len }
                }
                other => other,
            })?;
        self.frames += 1;
        Ok((&self.out, outcome))
    }
}
