//! Running damage counters and the end-of-run summary.
//!
//! `DamageAccounting` only adds things up; every decision about what a frame
//! lost is taken by the engine and arrives here as an [`Outcome`].

use std::fmt;

use serde::Serialize;

use crate::engine::{Mode, Outcome};
use crate::format::{Encoding, Frame, FrameTag};

#[derive(Debug, Clone, Default)]
pub struct DamageAccounting {
    processed: u64,
    disturbed: u64,
    sum_in_bits: u64,
    sum_out_bits: u64,
    fer_in: u64,
    fer_out: u64,
    no_data_in: u64,
    no_data_out: u64,
    max_len_in: Option<usize>,
    max_len_out: Option<usize>,
    cumulative: Vec<u64>,
    applied: Vec<u64>,
}

impl DamageAccounting {
    pub fn new(layers: usize) -> Self {
        Self {
            cumulative: vec![0; layers],
            applied: vec![0; layers],
            ..Self::default()
        }
    }

    pub fn record_input(&mut self, frame: &Frame) {
        self.sum_in_bits += frame.len() as u64;
        if frame.tag == FrameTag::Fer {
            self.fer_in += 1;
        }
        if frame.is_no_data() {
            self.no_data_in += 1;
        }
        self.max_len_in = self.max_len_in.max(Some(frame.len()));
    }

    pub fn record_outcome(&mut self, outcome: &Outcome) {
        if outcome.disturbed() {
            self.disturbed += 1;
        }
        for i in outcome.applied.iter() {
            self.applied[i] += 1;
        }
        for i in outcome.cumulative.iter() {
            self.cumulative[i] += 1;
        }
    }

    /// Count a written frame. Each call closes one processed frame.
    pub fn record_output(&mut self, frame: &Frame) {
        self.processed += 1;
        self.sum_out_bits += frame.len() as u64;
        if frame.tag == FrameTag::Fer {
            self.fer_out += 1;
        }
        if frame.is_no_data() {
            self.no_data_out += 1;
        }
        self.max_len_out = self.max_len_out.max(Some(frame.len()));
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn disturbed(&self) -> u64 {
        self.disturbed
    }

    pub fn cumulative(&self) -> &[u64] {
        &self.cumulative
    }

    pub fn applied(&self) -> &[u64] {
        &self.applied
    }

    /// Per-frame averages, `None` before the first frame.
    pub fn rates(&self) -> Option<Rates> {
        if self.processed == 0 {
            return None;
        }
        let n = self.processed as f64;
        let pct = |count: u64| 100.0 * count as f64 / n;
        Some(Rates {
            disturbance_pct: pct(self.disturbed),
            avg_bits_in: self.sum_in_bits as f64 / n,
            avg_bits_out: self.sum_out_bits as f64 / n,
            fer_in_pct: pct(self.fer_in),
            fer_out_pct: pct(self.fer_out),
            no_data_in_pct: pct(self.no_data_in),
            no_data_out_pct: pct(self.no_data_out),
        })
    }

    /// Freeze the counters into a report. `wraps[i]` is the wrap count of
    /// layer `i`'s pattern.
    pub fn summary(&self, run: RunInfo, wraps: &[u64]) -> Summary {
        let layers = (0..self.applied.len())
            .map(|i| {
                let pct = |count: u64| {
                    (self.processed > 0).then(|| 100.0 * count as f64 / self.processed as f64)
                };
                LayerSummary {
                    layer: i,
                    pattern_wraps: wraps.get(i).copied().unwrap_or(0),
                    applied: self.applied[i],
                    cumulative: self.cumulative[i],
                    applied_pct: pct(self.applied[i]),
                    cumulative_pct: pct(self.cumulative[i]),
                }
            })
            .collect();
        Summary {
            run,
            processed: self.processed,
            disturbed: self.disturbed,
            bits_in: self.sum_in_bits,
            bits_out: self.sum_out_bits,
            fer_in: self.fer_in,
            fer_out: self.fer_out,
            no_data_in: self.no_data_in,
            no_data_out: self.no_data_out,
            max_len_in: self.max_len_in,
            max_len_out: self.max_len_out,
            rates: self.rates(),
            layers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rates {
    pub disturbance_pct: f64,
    pub avg_bits_in: f64,
    pub avg_bits_out: f64,
    pub fer_in_pct: f64,
    pub fer_out_pct: f64,
    pub no_data_in_pct: f64,
    pub no_data_out_pct: f64,
}

/// Settings the run used, echoed in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunInfo {
    pub input_format: Encoding,
    pub output_format: Encoding,
    pub pattern_format: Encoding,
    pub headered: bool,
    pub mode: Mode,
    pub layers: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSummary {
    pub layer: usize,
    pub pattern_wraps: u64,
    pub applied: u64,
    pub cumulative: u64,
    pub applied_pct: Option<f64>,
    pub cumulative_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub run: RunInfo,
    pub processed: u64,
    pub disturbed: u64,
    pub bits_in: u64,
    pub bits_out: u64,
    pub fer_in: u64,
    pub fer_out: u64,
    pub no_data_in: u64,
    pub no_data_out: u64,
    pub max_len_in: Option<usize>,
    pub max_len_out: Option<usize>,
    /// `None` when no frame was processed.
    pub rates: Option<Rates>,
    pub layers: Vec<LayerSummary>,
}

fn opt_len(v: Option<usize>) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

fn opt_pct(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.6} %"))
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.run;
        writeln!(
            f,
            "# Bitstream format {}........ : {}",
            if r.headered { "(G.192 header) " } else { "(headerless) .." },
            r.input_format
        )?;
        if r.input_format != r.output_format {
            writeln!(f, "# Out bitstream format ................... : {}", r.output_format)?;
        }
        writeln!(f, "# EP pattern format (frame erasures) ..... : {}", r.pattern_format)?;
        writeln!(f, "# EP application method .................. : {}", r.mode)?;
        writeln!(f, "# Layer boundaries ....................... : {:?}", r.layers)?;
        writeln!(f, "# Processed frames ....................... : {}", self.processed)?;
        writeln!(f, "# Distorted frames (applied) ............. : {}", self.disturbed)?;
        match &self.rates {
            Some(rates) => {
                writeln!(
                    f,
                    "# EP frame disturbance rate .............. : {:.6} %",
                    rates.disturbance_pct,
                )?;
                writeln!(
                    f,
                    "# Average rate/frame (input) ............. : {:.4}",
                    rates.avg_bits_in,
                )?;
                writeln!(
                    f,
                    "# Average rate/frame (output) ............ : {:.4}",
                    rates.avg_bits_out,
                )?;
                writeln!(
                    f,
                    "# Erasure rate (input) ................... : {:.6} %",
                    rates.fer_in_pct,
                )?;
                writeln!(
                    f,
                    "# Erasure rate (output) .................. : {:.6} %",
                    rates.fer_out_pct,
                )?;
                writeln!(
                    f,
                    "# NoData rate (input) .................... : {:.6} %",
                    rates.no_data_in_pct,
                )?;
                writeln!(
                    f,
                    "# NoData rate (output) ................... : {:.6} %",
                    rates.no_data_out_pct,
                )?;
            }
            None => writeln!(f, "# No frames processed, rates unavailable")?,
        }
        writeln!(f, "# Max frame size (input) ................. : {}", opt_len(self.max_len_in))?;
        writeln!(f, "# Max frame size (output) ................ : {}", opt_len(self.max_len_out))?;
        for l in &self.layers {
            writeln!(f, "#################")?;
            writeln!(
                f,
                "# Error pattern file[{}] wrapped .......... : {} times",
                l.layer,
                l.pattern_wraps,
            )?;
            writeln!(
                f,
                "# Layer[{}] erasing rate ................... : {}",
                l.layer,
                opt_pct(l.applied_pct),
            )?;
            writeln!(
                f,
                "# Layer[{}] total erasure rate ............. : {}",
                l.layer,
                opt_pct(l.cumulative_pct),
            )?;
        }
        Ok(())
    }
}
