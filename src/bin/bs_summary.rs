//! Prints the frame length histogram and tag counts of a G.192 bitstream.
//! Handy for checking a bitstream against a layer setup before (or after)
//! running eid-ev on it.

use clap::Parser;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use eid_layers::io_utils::{eid_cli_error, io_cli_error, simple_cli_error, CliError};
use eid_layers::{
    detect_format, probe_sync_header, Encoding, FrameReader, FrameTag, Framing, LayerTopology,
    StreamKind, SOFT_ERASED,
};

#[derive(Parser)]
struct Args {
    /// Bitstream to inspect
    input: PathBuf,
    /// Layer boundaries used to flag misaligned frame lengths
    #[arg(long, default_value = "160,240,320,480,640")]
    layers: LayerTopology,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize, Default)]
struct Report {
    encoding: Option<Encoding>,
    headered: bool,
    frames: u64,
    sync: u64,
    fer: u64,
    unknown_tags: u64,
    no_data: u64,
    frames_with_erased_bits: u64,
    misaligned: u64,
    lengths: BTreeMap<usize, u64>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(e.code);
    }
}

fn run() -> Result<(), CliError> {
    let args = Args::parse();
    let file = File::open(&args.input)
        .map_err(|e| io_cli_error("opening bitstream", &args.input, e))?;
    let mut input = BufReader::new(file);
    let detected =
        detect_format(&mut input).map_err(|e| eid_cli_error("detecting bitstream format", e))?;
    let codec = detected.encoding.codec();
    let framing = match detected.kind {
        StreamKind::Tagged => {
            let headered = probe_sync_header(&mut input, codec.as_ref())
                .map_err(|e| eid_cli_error("probing sync headers", e))?;
            if !headered {
                return Err(simple_cli_error(
                    "stream starts with a tag but has no [tag, length] headers (error pattern?)",
                ));
            }
            Framing::Headered
        }
        StreamKind::SoftBits => Framing::Headerless {
            frame_len: args.layers.max_bits(),
        },
    };

    let mut report = Report {
        encoding: Some(detected.encoding),
        headered: framing == Framing::Headered,
        ..Report::default()
    };
    let mut reader = FrameReader::new(input, codec, framing);
    while let Some(frame) = reader
        .read_frame()
        .map_err(|e| eid_cli_error("reading bitstream", e))?
    {
        report.frames += 1;
        match frame.tag {
            FrameTag::Sync => report.sync += 1,
            FrameTag::Fer => report.fer += 1,
            FrameTag::Unknown(_) => report.unknown_tags += 1,
        }
        if frame.is_no_data() {
            report.no_data += 1;
        }
        if frame.bits.contains(&SOFT_ERASED) {
            report.frames_with_erased_bits += 1;
        }
        if !args.layers.is_boundary(frame.len()) {
            report.misaligned += 1;
        }
        *report.lengths.entry(frame.len()).or_insert(0) += 1;
    }

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| simple_cli_error(&format!("serializing report: {e}")))?;
        println!("{json}");
        return Ok(());
    }

    println!(
        "format: {} ({})",
        detected.encoding,
        if report.headered { "G.192 headers" } else { "headerless" }
    );
    println!("frames: {}", report.frames);
    println!("  sync: {}  fer: {}  unknown tag: {}", report.sync, report.fer, report.unknown_tags);
    println!("  no data: {}  with erased bits: {}", report.no_data, report.frames_with_erased_bits);
    println!("  lengths off the layer grid ({}): {}", args.layers, report.misaligned);
    for (len, count) in &report.lengths {
        println!("{len:>6}-bit frames: {count}");
    }
    Ok(())
}
