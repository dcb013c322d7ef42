//! Frame erasure insertion for layered (embedded variable bit rate) G.192
//! bitstreams.
//!
//! A bitstream frame is split into nested layers by cumulative bit
//! boundaries. One pre-recorded erasure pattern per layer says, frame by
//! frame, which layers the simulated channel loses. The damaged frames are
//! written out for a decoder under test, and the damage is tallied both as
//! newly applied by this run and as present in the output overall.
//!
//! ```no_run
//! use eid_layers::{run, Config};
//!
//! let patterns = (0..5).map(|i| format!("ep{i}.g192").into()).collect();
//! let summary = run(&Config::new("speech.g192", patterns, "damaged.g192"))?;
//! println!("{summary}");
//! # Ok::<(), eid_layers::EidError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod io_utils;
pub mod layers;
pub mod pattern;
pub mod runner;
pub mod stats;

pub use config::Config;
pub use engine::{apply_erasures, ErasureEngine, LayerMask, Mode, Outcome};
pub use error::{EidError, Result};
pub use format::{
    classify, detect_format, probe_sync_header, ByteCodec, Detected, Encoding, Frame,
    FrameCodec, FrameReader, FrameTag, FrameWriter, Framing, G192Codec, StreamKind,
    BYTE_FER, BYTE_MAX_FRAME_LEN, BYTE_ONE, BYTE_SYNC, BYTE_ZERO, G192_FER, G192_ONE,
    G192_SYNC, G192_ZERO, SOFT_ERASED,
};
pub use layers::{LayerTopology, DEFAULT_LAYERS, MAX_LAYERS};
pub use pattern::{open_patterns, ErasurePatternSource, LayerFlag};
pub use runner::{process, run};
pub use stats::{DamageAccounting, LayerSummary, Rates, RunInfo, Summary};
