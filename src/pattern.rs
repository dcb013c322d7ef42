//! Per-layer frame erasure patterns.
//!
//! Each pattern is a pre-recorded stream of SYNC/FER tags, one per frame. A
//! pattern shorter than the bitstream is replayed from the start; the number
//! of replays is kept as the wrap count.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{EidError, Result};
use crate::format::{detect_format, Encoding, FrameCodec, FrameTag, StreamKind};
use crate::io_utils::io_error;

/// Erasure decision for one layer of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerFlag {
    #[default]
    Intact,
    Erased,
}

impl LayerFlag {
    pub fn is_erased(self) -> bool {
        self == LayerFlag::Erased
    }
}

impl From<FrameTag> for LayerFlag {
    /// Only an explicit FER tag erases a layer.
    fn from(tag: FrameTag) -> Self {
        match tag {
            FrameTag::Fer => LayerFlag::Erased,
            _ => LayerFlag::Intact,
        }
    }
}

/// Sequential reader of one erasure pattern.
pub struct ErasurePatternSource<R> {
    inner: R,
    codec: Box<dyn FrameCodec>,
    label: String,
    wraps: u64,
    flags: u64,
}

impl<R: Read + Seek> ErasurePatternSource<R> {
    pub fn new(inner: R, codec: Box<dyn FrameCodec>, label: impl Into<String>) -> Self {
        Self {
            inner,
            codec,
            label: label.into(),
            wraps: 0,
            flags: 0,
        }
    }

    /// Next flag of the pattern, rewinding once at the end of the stream.
    pub fn next_flag(&mut self) -> Result<LayerFlag> {
        let mut word = [0u16; 1];
        if self.codec.read_raw(&mut self.inner, &mut word)? == 0 {
            self.inner.seek(SeekFrom::Start(0))?;
            self.wraps += 1;
            debug!(pattern = %self.label, wraps = self.wraps, "pattern wrapped");
            if self.codec.read_raw(&mut self.inner, &mut word)? == 0 {
                return Err(EidError::Config(format!(
                    "error pattern {} is empty",
                    self.label
                )));
            }
        }
        self.flags += 1;
        Ok(self.codec.tag_from_raw(word[0]).into())
    }

    /// How many times the pattern restarted from the beginning.
    pub fn wraps(&self) -> u64 {
        self.wraps
    }

    pub fn flags_read(&self) -> u64 {
        self.flags
    }

    pub fn encoding(&self) -> Encoding {
        self.codec.encoding()
    }
}

/// Open one pattern per layer and check that they agree on their format.
///
/// Every pattern must be a frame erasure (tag only) stream and all of them must
/// share one encoding. A `declared` encoding that disagrees with what the files
/// contain is overridden by the detected one.
pub fn open_patterns<P: AsRef<Path>>(
    paths: &[P],
    declared: Option<Encoding>,
) -> Result<Vec<ErasurePatternSource<BufReader<File>>>> {
    let mut sources = Vec::with_capacity(paths.len());
    let mut common: Option<Encoding> = None;
    for (i, path) in paths.iter().enumerate() {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| io_error("opening error pattern", path, e))?;
        let mut reader = BufReader::new(file);
        let detected = detect_format(&mut reader).map_err(|e| match e {
            EidError::Config(msg) => {
                EidError::Config(format!("error pattern {}: {msg}", path.display()))
            }
            other => other,
        })?;
        if detected.kind != StreamKind::Tagged {
            return Err(EidError::Config(format!(
                "error pattern {} holds bit errors; only frame erasure patterns are supported",
                path.display()
            )));
        }
        let encoding = detected.reconcile(declared, &format!("error pattern[{i}]"));
        match common {
            None => common = Some(encoding),
            Some(first) if first != encoding => {
                return Err(EidError::Config(format!(
                    "error pattern formats must match for all layers \
                     ({} is {encoding}, pattern[0] is {first})",
                    path.display()
                )));
            }
            Some(_) => {}
        }
        info!(layer = i, path = %path.display(), %encoding, "opened error pattern");
        sources.push(ErasurePatternSource::new(
            reader,
            encoding.codec(),
            path.display().to_string(),
        ));
    }
    Ok(sources)
}
