//! G.192 frame records in their two on-disk encodings.
//!
//! A record is `[tag, len, bit_0 .. bit_len-1]`. The word encoding stores every
//! element as a little-endian `u16`; the byte encoding keeps only the low byte
//! of each element, which limits a frame to 255 soft bits. Erasure patterns use
//! the same tag vocabulary but carry only the tag element per frame.
//!
//! Soft bits are kept in their canonical word form in memory whichever
//! encoding they came from. The byte values of the soft bits coincide with
//! their word values, so only the tags need translating.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};

use clap::ValueEnum;
use serde::Serialize;
use tracing::warn;

use crate::error::{EidError, Result};
use crate::layers::LayerTopology;

/// Good frame tag.
pub const G192_SYNC: u16 = 0x6B21;
/// Frame erasure tag.
pub const G192_FER: u16 = 0x6B20;
/// Soft bit for a hard `0`.
pub const G192_ZERO: u16 = 0x007F;
/// Soft bit for a hard `1`.
pub const G192_ONE: u16 = 0x0081;
/// Soft bit carrying no information.
pub const SOFT_ERASED: u16 = 0x0000;

pub const BYTE_SYNC: u8 = 0x21;
pub const BYTE_FER: u8 = 0x20;
pub const BYTE_ZERO: u8 = 0x7F;
pub const BYTE_ONE: u8 = 0x81;
/// Largest payload a byte encoded record can declare.
pub const BYTE_MAX_FRAME_LEN: usize = 255;

const CHUNK: usize = 512;

/// On-disk element encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// 16-bit words (`0x6B21`, `0x007F`, ...).
    G192,
    /// Single bytes (`0x21`, `0x7F`, ...).
    Byte,
}

impl Encoding {
    pub fn element_size(self) -> usize {
        match self {
            Encoding::G192 => 2,
            Encoding::Byte => 1,
        }
    }

    /// Codec reading and writing elements in this encoding.
    pub fn codec(self) -> Box<dyn FrameCodec> {
        match self {
            Encoding::G192 => Box::new(G192Codec),
            Encoding::Byte => Box::new(ByteCodec),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::G192 => f.write_str("g192"),
            Encoding::Byte => f.write_str("byte"),
        }
    }
}

/// Frame tag as found in a record header or erasure pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameTag {
    /// Valid frame with payload.
    #[default]
    Sync,
    /// Frame erasure.
    Fer,
    /// Anything else, kept as its canonical word.
    Unknown(u16),
}

impl FrameTag {
    pub fn from_word(word: u16) -> Self {
        match word {
            G192_SYNC => FrameTag::Sync,
            G192_FER => FrameTag::Fer,
            other => FrameTag::Unknown(other),
        }
    }

    pub fn to_word(self) -> u16 {
        match self {
            FrameTag::Sync => G192_SYNC,
            FrameTag::Fer => G192_FER,
            FrameTag::Unknown(word) => word,
        }
    }

    pub fn is_valid(self) -> bool {
        !matches!(self, FrameTag::Unknown(_))
    }
}

/// One bitstream frame with its soft bits in canonical word form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub tag: FrameTag,
    pub bits: Vec<u16>,
}

impl Frame {
    pub fn new(tag: FrameTag, bits: Vec<u16>) -> Self {
        Self { tag, bits }
    }

    /// Build a frame from hard bits.
    pub fn from_hard_bits(tag: FrameTag, bits: &[bool]) -> Self {
        let bits = bits
            .iter()
            .map(|&b| if b { G192_ONE } else { G192_ZERO })
            .collect();
        Self { tag, bits }
    }

    /// Declared length in bits.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// A good frame without payload (DTX "no data").
    pub fn is_no_data(&self) -> bool {
        self.tag == FrameTag::Sync && self.bits.is_empty()
    }
}

/// Element level access to one on-disk encoding.
pub trait FrameCodec {
    fn encoding(&self) -> Encoding;

    /// Largest length a record header can carry.
    fn max_frame_len(&self) -> usize;

    /// Read up to `buf.len()` raw elements, returning how many complete
    /// elements were read. Fewer than requested means end of stream.
    fn read_raw(&self, reader: &mut dyn Read, buf: &mut [u16]) -> io::Result<usize>;

    fn write_raw(&self, writer: &mut dyn Write, words: &[u16]) -> io::Result<()>;

    fn tag_from_raw(&self, raw: u16) -> FrameTag;

    fn tag_to_raw(&self, tag: FrameTag) -> u16;

    /// Whether `raw` belongs to the tag family (`0x6B2x` words, `0x2x` bytes),
    /// including tags the engine later sanitizes.
    fn is_tag_family(&self, raw: u16) -> bool;
}

/// 16-bit word encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct G192Codec;

impl FrameCodec for G192Codec {
    fn encoding(&self) -> Encoding {
        Encoding::G192
    }

    fn max_frame_len(&self) -> usize {
        u16::MAX as usize
    }

    fn read_raw(&self, reader: &mut dyn Read, buf: &mut [u16]) -> io::Result<usize> {
        let mut raw = [0u8; 2 * CHUNK];
        let mut done = 0;
        while done < buf.len() {
            let want = (buf.len() - done).min(CHUNK);
            let got = fill(reader, &mut raw[..2 * want])?;
            let whole = got / 2;
            for (dst, pair) in buf[done..done + whole].iter_mut().zip(raw.chunks_exact(2)) {
                *dst = u16::from_le_bytes([pair[0], pair[1]]);
            }
            done += whole;
            if got < 2 * want {
                break;
            }
        }
        Ok(done)
    }

    fn write_raw(&self, writer: &mut dyn Write, words: &[u16]) -> io::Result<()> {
        let mut raw = Vec::with_capacity(words.len() * 2);
        for w in words {
            raw.extend_from_slice(&w.to_le_bytes());
        }
        writer.write_all(&raw)
    }

    fn tag_from_raw(&self, raw: u16) -> FrameTag {
        FrameTag::from_word(raw)
    }

    fn tag_to_raw(&self, tag: FrameTag) -> u16 {
        tag.to_word()
    }

    fn is_tag_family(&self, raw: u16) -> bool {
        raw & 0xFFF0 == 0x6B20
    }
}

/// Single byte encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteCodec;

impl FrameCodec for ByteCodec {
    fn encoding(&self) -> Encoding {
        Encoding::Byte
    }

    fn max_frame_len(&self) -> usize {
        BYTE_MAX_FRAME_LEN
    }

    fn read_raw(&self, reader: &mut dyn Read, buf: &mut [u16]) -> io::Result<usize> {
        let mut raw = [0u8; CHUNK];
        let mut done = 0;
        while done < buf.len() {
            let want = (buf.len() - done).min(CHUNK);
            let got = fill(reader, &mut raw[..want])?;
            for (dst, &b) in buf[done..done + got].iter_mut().zip(raw.iter()) {
                *dst = b as u16;
            }
            done += got;
            if got < want {
                break;
            }
        }
        Ok(done)
    }

    fn write_raw(&self, writer: &mut dyn Write, words: &[u16]) -> io::Result<()> {
        let raw: Vec<u8> = words.iter().map(|&w| (w & 0xFF) as u8).collect();
        writer.write_all(&raw)
    }

    fn tag_from_raw(&self, raw: u16) -> FrameTag {
        match raw {
            r if r == BYTE_SYNC as u16 => FrameTag::Sync,
            r if r == BYTE_FER as u16 => FrameTag::Fer,
            other => FrameTag::Unknown(other),
        }
    }

    fn tag_to_raw(&self, tag: FrameTag) -> u16 {
        match tag {
            FrameTag::Sync => BYTE_SYNC as u16,
            FrameTag::Fer => BYTE_FER as u16,
            FrameTag::Unknown(word) => word & 0xFF,
        }
    }

    fn is_tag_family(&self, raw: u16) -> bool {
        raw & 0xF0 == 0x20
    }
}

/// Read until `buf` is full or the stream ends.
fn fill(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut done = 0;
    while done < buf.len() {
        match reader.read(&mut buf[done..]) {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(done)
}

/// What the first element of a stream says about its layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Starts with a SYNC/FER tag: framed bitstream or frame erasure pattern.
    Tagged,
    /// Starts with a soft bit: headerless bitstream or bit error pattern.
    SoftBits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detected {
    pub encoding: Encoding,
    pub kind: StreamKind,
}

impl Detected {
    /// Pick the detected encoding over a declared one, warning when they differ.
    pub fn reconcile(&self, declared: Option<Encoding>, what: &str) -> Encoding {
        if let Some(declared) = declared {
            if declared != self.encoding {
                warn!(
                    "{what}: switching format from {declared} to detected {}",
                    self.encoding
                );
            }
        }
        self.encoding
    }
}

/// Classify a stream from its leading bytes.
pub fn classify(head: &[u8]) -> Result<Detected> {
    if head.len() >= 2 {
        let word = u16::from_le_bytes([head[0], head[1]]);
        if word & 0xFFF0 == 0x6B20 {
            return Ok(Detected {
                encoding: Encoding::G192,
                kind: StreamKind::Tagged,
            });
        }
        if word == G192_ZERO || word == G192_ONE {
            return Ok(Detected {
                encoding: Encoding::G192,
                kind: StreamKind::SoftBits,
            });
        }
    }
    match head.first() {
        None => Err(EidError::Config("stream is empty".into())),
        Some(&b) if b & 0xF0 == 0x20 => Ok(Detected {
            encoding: Encoding::Byte,
            kind: StreamKind::Tagged,
        }),
        Some(&b) if b == BYTE_ZERO || b == BYTE_ONE => Ok(Detected {
            encoding: Encoding::Byte,
            kind: StreamKind::SoftBits,
        }),
        Some(&b) => Err(EidError::Config(format!(
            "unrecognized stream format (leading byte 0x{b:02X})"
        ))),
    }
}

/// Inspect the start of a stream and seek back to where it was.
pub fn detect_format<R: Read + Seek>(reader: &mut R) -> Result<Detected> {
    let start = reader.stream_position()?;
    let mut head = [0u8; 2];
    let got = fill(reader, &mut head)?;
    reader.seek(SeekFrom::Start(start))?;
    classify(&head[..got])
}

/// Check that a tagged stream really carries `[tag, len]` headers: skip the
/// first record and expect another tag of the same family (or the end of the
/// stream) after it.
pub fn probe_sync_header<R: Read + Seek>(reader: &mut R, codec: &dyn FrameCodec) -> Result<bool> {
    let start = reader.stream_position()?;
    let mut header = [0u16; 2];
    let verdict = if codec.read_raw(reader, &mut header)? < 2 {
        false
    } else {
        let skip = header[1] as i64 * codec.encoding().element_size() as i64;
        reader.seek(SeekFrom::Current(skip))?;
        let mut next = [0u16; 1];
        match codec.read_raw(reader, &mut next)? {
            0 => true,
            _ => codec.is_tag_family(next[0]),
        }
    };
    reader.seek(SeekFrom::Start(start))?;
    Ok(verdict)
}

/// How records are delimited in a bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Every record starts with `[tag, len]`.
    Headered,
    /// Bare soft bits, `frame_len` per frame, every frame implicitly SYNC.
    Headerless { frame_len: usize },
}

/// Sequential frame reader over one bitstream.
pub struct FrameReader<R> {
    inner: R,
    codec: Box<dyn FrameCodec>,
    framing: Framing,
    layers: Option<LayerTopology>,
    frames: u64,
    truncated: u64,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R, codec: Box<dyn FrameCodec>, framing: Framing) -> Self {
        Self {
            inner,
            codec,
            framing,
            layers: None,
            frames: 0,
            truncated: 0,
        }
    }

    /// Cut a short headerless tail down to the last layer boundary it
    /// fully covers instead of keeping every bit that was read.
    pub fn with_layers(mut self, layers: LayerTopology) -> Self {
        self.layers = Some(layers);
        self
    }

    pub fn encoding(&self) -> Encoding {
        self.codec.encoding()
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn frames_read(&self) -> u64 {
        self.frames
    }

    /// Headerless frames that came up short at the end of the stream.
    pub fn truncated_frames(&self) -> u64 {
        self.truncated
    }

    /// Read the next frame, `None` at end of stream.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut frame = Frame::default();
        Ok(self.read_frame_into(&mut frame)?.then_some(frame))
    }

    /// Read the next frame into `frame`, reusing its buffer. Returns `false`
    /// at end of stream.
    pub fn read_frame_into(&mut self, frame: &mut Frame) -> Result<bool> {
        match self.framing {
            Framing::Headered => {
                let mut header = [0u16; 2];
                match self.codec.read_raw(&mut self.inner, &mut header)? {
                    0 => return Ok(false),
                    1 => {
                        return Err(EidError::TruncatedFrame {
                            frame: self.frames,
                            expected: 2,
                            got: 1,
                        })
                    }
                    _ => {}
                }
                let len = header[1] as usize;
                frame.tag = self.codec.tag_from_raw(header[0]);
                frame.bits.clear();
                frame.bits.resize(len, SOFT_ERASED);
                let got = self.codec.read_raw(&mut self.inner, &mut frame.bits)?;
                if got < len {
                    return Err(EidError::TruncatedFrame {
                        frame: self.frames,
                        expected: len,
                        got,
                    });
                }
            }
            Framing::Headerless { frame_len } => {
                frame.tag = FrameTag::Sync;
                frame.bits.clear();
                frame.bits.resize(frame_len, SOFT_ERASED);
                let got = self.codec.read_raw(&mut self.inner, &mut frame.bits)?;
                if got == 0 {
                    return Ok(false);
                }
                if got < frame_len {
                    let kept = self.layers.as_ref().map_or(got, |t| t.floor_boundary(got));
                    warn!(
                        frame = self.frames,
                        expected = frame_len,
                        got,
                        kept,
                        dropped = got - kept,
                        "headerless stream size is not a multiple of the frame length; \
                         shortening the last frame"
                    );
                    frame.bits.truncate(kept);
                    self.truncated += 1;
                }
            }
        }
        self.frames += 1;
        Ok(true)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Sequential frame writer; always emits `[tag, len]` headers.
pub struct FrameWriter<W> {
    inner: W,
    codec: Box<dyn FrameCodec>,
    scratch: Vec<u16>,
    frames: u64,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W, codec: Box<dyn FrameCodec>) -> Self {
        Self {
            inner,
            codec,
            scratch: Vec::new(),
            frames: 0,
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.codec.encoding()
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.len() > self.codec.max_frame_len() {
            return Err(EidError::Config(format!(
                "frame {} has {} bits, {} format records hold at most {}",
                self.frames,
                frame.len(),
                self.codec.encoding(),
                self.codec.max_frame_len()
            )));
        }
        self.scratch.clear();
        self.scratch.push(self.codec.tag_to_raw(frame.tag));
        self.scratch.push(frame.len() as u16);
        self.scratch.extend_from_slice(&frame.bits);
        self.codec.write_raw(&mut self.inner, &self.scratch)?;
        self.frames += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
