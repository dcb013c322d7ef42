use std::path::PathBuf;

use crate::engine::Mode;
use crate::error::{EidError, Result};
use crate::format::Encoding;
use crate::layers::LayerTopology;

/// Runtime configuration of one erasure insertion run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Encoded speech bitstream to damage.
    pub input: PathBuf,
    /// One frame erasure pattern per layer, innermost layer first.
    pub patterns: Vec<PathBuf>,
    /// Damaged bitstream to write.
    pub output: PathBuf,
    /// Declared input encoding; the detected encoding wins on disagreement.
    pub bitstream_format: Option<Encoding>,
    /// Output encoding, defaults to the effective input encoding.
    pub output_format: Option<Encoding>,
    /// Declared pattern encoding; the detected encoding wins on disagreement.
    pub pattern_format: Option<Encoding>,
    pub topology: LayerTopology,
    pub mode: Mode,
    /// Show a frame counter while processing.
    pub progress: bool,
}

impl Config {
    pub fn new(
        input: impl Into<PathBuf>,
        patterns: Vec<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            patterns,
            output: output.into(),
            bitstream_format: None,
            output_format: None,
            pattern_format: None,
            topology: LayerTopology::default(),
            mode: Mode::default(),
            progress: false,
        }
    }

    /// Check the settings against each other before any file is touched.
    pub fn validate(&self) -> Result<()> {
        let layers = self.topology.layer_count();
        if self.patterns.len() != layers {
            return Err(EidError::Config(format!(
                "{} error pattern files given for {layers} layers ({})",
                self.patterns.len(),
                self.topology
            )));
        }
        Ok(())
    }
}
