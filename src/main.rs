use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use eid_layers::io_utils::{eid_cli_error, simple_cli_error, CliError};
use eid_layers::{run, Config, Encoding, LayerTopology, Mode};

/// Insert per-layer frame erasures into a layered G.192 bitstream.
///
/// By default the frame is truncated at the lowest erased layer and kept as a
/// good frame; it becomes an erasure only when the base layer is hit. With
/// --ind, erased intermediate layers are blanked (soft bits set to zero) and
/// the frame is tagged as an erasure, while erased top layers are still cut.
#[derive(Parser)]
#[command(name = "eid-ev", version)]
struct Args {
    /// Input encoded speech bitstream
    input: PathBuf,
    /// Error pattern files, one per layer (innermost first), then the output bitstream
    #[arg(required = true, num_args = 2.., value_name = "EP.. OUT_BS")]
    files: Vec<PathBuf>,
    /// Input bitstream format (overridden by what the file contains)
    #[arg(long = "bs", value_enum)]
    bitstream_format: Option<Encoding>,
    /// Error pattern format (overridden by what the files contain)
    #[arg(long = "ep", value_enum)]
    pattern_format: Option<Encoding>,
    /// Output bitstream format [default: same as input]
    #[arg(long = "obs", value_enum)]
    output_format: Option<Encoding>,
    /// Layer boundaries in absolute bits, comma separated
    #[arg(long, default_value = "160,240,320,480,640")]
    layers: LayerTopology,
    /// Treat layers individually: blank erased intermediate layers instead of truncating
    #[arg(long)]
    ind: bool,
    /// Quiet operation, skip the statistics report
    #[arg(short, long)]
    quiet: bool,
    /// Print the statistics as JSON on stdout
    #[arg(long)]
    json: bool,
    /// Show a frame counter while processing
    #[arg(long)]
    progress: bool,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.quiet);
    if let Err(e) = execute(args) {
        eprintln!("{e}");
        std::process::exit(e.code);
    }
}

fn init_tracing(quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if quiet { "error" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn execute(args: Args) -> Result<(), CliError> {
    let mut files = args.files;
    let output = files
        .pop()
        .ok_or_else(|| simple_cli_error("missing output bitstream"))?;

    let mut config = Config::new(args.input, files, output);
    config.bitstream_format = args.bitstream_format;
    config.pattern_format = args.pattern_format;
    config.output_format = args.output_format;
    config.topology = args.layers;
    config.mode = if args.ind { Mode::Individual } else { Mode::Layered };
    config.progress = args.progress;

    let summary = run(&config).map_err(|e| eid_cli_error("erasure insertion failed", e))?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| simple_cli_error(&format!("serializing summary: {e}")))?;
        println!("{json}");
    }
    if !args.quiet {
        eprint!("{summary}");
    }
    Ok(())
}
