//! JSON report written at the end of a run

use errors::ModlensResult;
use modlens_decode::{Diagnostic, ParserState, Statistics, Transaction};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::config::OutputConfig;

/// `{ packets, statistics, diagnostics? }`
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub packets: &'a [Transaction],
    pub statistics: Statistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<&'a [Diagnostic]>,
}

impl<'a> Report<'a> {
    pub fn new(state: &'a ParserState, config: &OutputConfig) -> Self {
        Self {
            packets: state.transactions(),
            statistics: state.statistics(),
            diagnostics: config.include_diagnostics.then(|| state.diagnostics()),
        }
    }

    pub fn write_to<W: Write>(&self, writer: W, pretty: bool) -> ModlensResult<()> {
        let mut writer = BufWriter::new(writer);
        if pretty {
            serde_json::to_writer_pretty(&mut writer, self)?;
        } else {
            serde_json::to_writer(&mut writer, self)?;
        }
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Write the report to `path`, or stdout when `None`
pub fn write_report(
    state: &ParserState,
    config: &OutputConfig,
    path: Option<&Path>,
) -> ModlensResult<()> {
    let report = Report::new(state, config);
    match path {
        Some(path) => {
            report.write_to(File::create(path)?, config.pretty)?;
            tracing::info!("Results written to {}", path.display());
        },
        None => report.write_to(io::stdout().lock(), config.pretty)?,
    }
    Ok(())
}
