use parcelkit_core::rules::partition;
use parcelkit_core::{FormSchemaBuilder, SchemaBuilder};

use super::{discover_or_exit, BodyArgs};
use crate::OutputFormat;

/// Prints the form a client would be shown for this body. Structural
/// fields are listed on stderr since no form can carry them.
pub(crate) fn cmd_schema(args: &BodyArgs<'_>, output: OutputFormat, quiet: bool) {
    let found = discover_or_exit(args, output, quiet);
    let (elicitable, structural) = partition(found.missing);

    if !quiet {
        for field in &structural {
            eprintln!("note: {} must be added to the body directly", field.dot_path);
        }
    }

    let schema = FormSchemaBuilder::default().build(&elicitable);
    let rendered = serde_json::to_string_pretty(&schema)
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
    println!("{}", rendered);
}
