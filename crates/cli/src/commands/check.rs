use std::process;

use serde_json::json;

use super::{discover_or_exit, BodyArgs};
use crate::OutputFormat;

/// Exit status when the body still lacks required fields.
const EXIT_MISSING: i32 = 2;

pub(crate) fn cmd_check(args: &BodyArgs<'_>, output: OutputFormat, quiet: bool) {
    let found = discover_or_exit(args, output, quiet);
    let complete = found.missing.is_empty();

    if !quiet {
        match output {
            OutputFormat::Json => {
                let report = json!({
                    "complete": complete,
                    "missing": &found.missing,
                    "body": &found.body,
                });
                let rendered = serde_json::to_string_pretty(&report)
                    .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
                println!("{}", rendered);
            }
            OutputFormat::Text => {
                if complete {
                    println!("Request body is complete.");
                } else {
                    println!("Missing {} required field(s):", found.missing.len());
                    for field in &found.missing {
                        let kind = if field.elicitable { "" } else { "  [structural]" };
                        println!("  {:<28} {}{}", field.flat_key, field.dot_path, kind);
                        println!("  {:<28} {}", "", field.prompt);
                    }
                }
            }
        }
    }

    if !complete {
        process::exit(EXIT_MISSING);
    }
}
