//! Offline subcommands. Neither needs credentials or the network.

pub(crate) mod check;
pub(crate) mod schema;

use std::path::Path;
use std::process;

use clap::ValueEnum;
use parcelkit_core::domain::{rating, shipment, Domain};
use parcelkit_core::EvaluationMode;
use serde_json::Value;

use crate::config::Settings;
use crate::pipeline::{self, Discovery};
use crate::{report_error, OutputFormat};

/// Which request a body file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Operation {
    Shipment,
    Rate,
}

impl Operation {
    fn domain(self) -> &'static Domain {
        match self {
            Operation::Shipment => &shipment::DOMAIN,
            Operation::Rate => &rating::DOMAIN,
        }
    }

    fn mode(self, request_option: Option<&str>) -> EvaluationMode {
        match (self, request_option) {
            (Operation::Rate, Some(option)) => EvaluationMode::with_request_option(option),
            (Operation::Rate, None) => EvaluationMode::with_request_option("Rate"),
            (Operation::Shipment, _) => EvaluationMode::default(),
        }
    }
}

/// Inputs shared by `check` and `schema`.
pub(crate) struct BodyArgs<'a> {
    pub operation: Operation,
    pub request_option: Option<&'a str>,
    pub body: &'a Path,
    pub settings: &'a Settings,
}

/// Reads, defaults and evaluates the body file; exits 1 on any failure.
fn discover_or_exit(args: &BodyArgs<'_>, output: OutputFormat, quiet: bool) -> Discovery {
    let body = read_body(args.body, output, quiet);
    let mode = args.operation.mode(args.request_option);
    match pipeline::discover(args.operation.domain(), &body, &mode, args.settings) {
        Ok(found) => found,
        Err(e) => {
            match output {
                OutputFormat::Json => {
                    let err_json = serde_json::to_string_pretty(&e.to_json_value())
                        .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", e));
                    eprintln!("{}", err_json);
                }
                OutputFormat::Text => {
                    if !quiet {
                        eprintln!("{}", e);
                    }
                }
            }
            process::exit(1);
        }
    }
}

fn read_body(path: &Path, output: OutputFormat, quiet: bool) -> Value {
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let body: Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    if !body.is_object() {
        let msg = format!("'{}' must contain a JSON object", path.display());
        report_error(&msg, output, quiet);
        process::exit(1);
    }
    body
}
