//! Opens the streams of a run, checks them against each other and drives the
//! frame loop: read a frame, pull one flag per layer, damage, write, count.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::ErasureEngine;
use crate::error::{EidError, Result};
use crate::format::{
    detect_format, probe_sync_header, Encoding, Frame, FrameReader, FrameWriter, Framing,
    StreamKind, BYTE_MAX_FRAME_LEN,
};
use crate::io_utils::io_error;
use crate::layers::LayerTopology;
use crate::pattern::{open_patterns, ErasurePatternSource, LayerFlag};
use crate::stats::{DamageAccounting, RunInfo, Summary};

/// Run the frame loop until the input is exhausted.
///
/// Every pattern source advances by exactly one flag per input frame,
/// whether or not the frame carries that source's layer.
pub fn process<R, W, P>(
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    patterns: &mut [ErasurePatternSource<P>],
    engine: &mut ErasureEngine,
    progress: Option<&ProgressBar>,
) -> Result<DamageAccounting>
where
    R: Read,
    W: Write,
    P: Read + Seek,
{
    let layers = engine.topology().layer_count();
    if patterns.len() != layers {
        return Err(EidError::Config(format!(
            "{} error patterns for {layers} layers",
            patterns.len()
        )));
    }

    let mut acc = DamageAccounting::new(layers);
    let mut input = Frame::default();
    let mut flags = vec![LayerFlag::Intact; layers];
    while reader.read_frame_into(&mut input)? {
        for (flag, source) in flags.iter_mut().zip(patterns.iter_mut()) {
            *flag = source.next_flag()?;
        }
        acc.record_input(&input);
        let (out, outcome) = engine.process(&input, &flags)?;
        writer.write_frame(out)?;
        acc.record_outcome(&outcome);
        acc.record_output(out);
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }
    writer.flush()?;
    Ok(acc)
}

fn byte_capacity_check(what: &str, encoding: Encoding, topology: &LayerTopology) -> Result<()> {
    if encoding == Encoding::Byte && topology.max_bits() > BYTE_MAX_FRAME_LEN {
        return Err(EidError::Config(format!(
            "{what} uses the byte format, layers can not be larger than \
             {BYTE_MAX_FRAME_LEN} bits (top boundary is {})",
            topology.max_bits()
        )));
    }
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {pos} frames [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb
}

/// Run one erasure insertion as described by `config`.
pub fn run(config: &Config) -> Result<Summary> {
    config.validate()?;
    let topology = &config.topology;

    let file = File::open(&config.input)
        .map_err(|e| io_error("opening input bitstream", &config.input, e))?;
    let mut input = BufReader::new(file);
    let detected = detect_format(&mut input).map_err(|e| match e {
        EidError::Config(msg) => EidError::Config(format!("input bitstream: {msg}")),
        other => other,
    })?;
    let input_format = detected.reconcile(config.bitstream_format, "input bitstream");
    let codec = input_format.codec();

    let framing = match detected.kind {
        StreamKind::Tagged => {
            if !probe_sync_header(&mut input, codec.as_ref())? {
                return Err(EidError::Config(
                    "input bitstream must carry G.192 sync headers for layered erasure".into(),
                ));
            }
            Framing::Headered
        }
        StreamKind::SoftBits => {
            warn!(
                frame_len = topology.max_bits(),
                "input bitstream has no sync headers, reading full-rate frames"
            );
            Framing::Headerless {
                frame_len: topology.max_bits(),
            }
        }
    };

    let output_format = config.output_format.unwrap_or(input_format);
    byte_capacity_check("input bitstream", input_format, topology)?;
    byte_capacity_check("output bitstream", output_format, topology)?;

    let mut patterns = open_patterns(&config.patterns, config.pattern_format)?;
    let pattern_format = patterns
        .first()
        .map(|p| p.encoding())
        .ok_or_else(|| EidError::Config("no error pattern files".into()))?;

    let out_file = File::create(&config.output)
        .map_err(|e| io_error("creating output bitstream", &config.output, e))?;
    let mut writer = FrameWriter::new(BufWriter::new(out_file), output_format.codec());
    let mut reader = FrameReader::new(input, codec, framing).with_layers(topology.clone());
    let mut engine = ErasureEngine::new(topology.clone(), config.mode);

    info!(
        input = %config.input.display(),
        output = %config.output.display(),
        %input_format,
        %output_format,
        mode = %config.mode,
        layers = %topology,
        "starting erasure insertion"
    );

    let progress = config.progress.then(progress_bar);
    let acc = process(
        &mut reader,
        &mut writer,
        &mut patterns,
        &mut engine,
        progress.as_ref(),
    )?;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let wraps: Vec<u64> = patterns.iter().map(|p| p.wraps()).collect();
    info!(
        frames = acc.processed(),
        disturbed = acc.disturbed(),
        truncated_tail = reader.truncated_frames(),
        "erasure insertion finished"
    );
    let run = RunInfo {
        input_format,
        output_format,
        pattern_format,
        headered: framing == Framing::Headered,
        mode: config.mode,
        layers: topology.boundaries().to_vec(),
    };
    Ok(acc.summary(run, &wraps))
}
