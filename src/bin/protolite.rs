//! protolite CLI: Schema-Plan anzeigen, Binär <-> JSON konvertieren.

use clap::{Args, Parser, Subcommand};
use protolite::field::{DefaultValue, FieldVariant};
use protolite::json::{from_json, to_json};
use protolite::{schema_from_str, CompileOptions, CompiledSchema, WireWriter};
use std::io::{IsTerminal, Read, Write};
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "protolite", about = "Protocol Buffers wire codec driven by a JSON schema")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the compiled field plan (variant, tags, presence bits)
    Plan(PlanArgs),
    /// Decode a binary message to JSON
    Decode(DecodeArgs),
    /// Encode a JSON message to binary
    Encode(EncodeArgs),
}

#[derive(Args)]
struct SchemaArgs {
    /// Schema file (JSON)
    #[arg(short, long)]
    schema: String,

    /// Maximum nesting depth while parsing
    #[arg(long, default_value_t = 100)]
    recursion_limit: usize,

    /// Validate UTF-8 of string fields while parsing instead of on first read
    #[arg(long)]
    validate_utf8: bool,
}

#[derive(Args)]
struct PlanArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// Only this message type
    #[arg(short, long)]
    message: Option<String>,
}

#[derive(Args)]
struct DecodeArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// Message type of the input
    #[arg(short, long)]
    message: String,

    /// Input file (- for stdin)
    #[arg(short, long)]
    input: String,

    /// Output file (- or omitted = stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Pretty-printed JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct EncodeArgs {
    #[command(flatten)]
    schema: SchemaArgs,

    /// Message type of the output
    #[arg(short, long)]
    message: String,

    /// Input file (- for stdin)
    #[arg(short, long)]
    input: String,

    /// Output file (- or omitted = stdout)
    #[arg(short, long)]
    output: Option<String>,
}

impl SchemaArgs {
    fn load(&self) -> Result<Arc<CompiledSchema>, String> {
        let text = std::fs::read_to_string(&self.schema).map_err(|e| format!("Lesefehler '{}': {e}", self.schema))?;
        let schema = schema_from_str(&text).map_err(|e| format!("Schema-Fehler: {e}"))?;
        let options = CompileOptions::default()
            .with_recursion_limit(self.recursion_limit)
            .with_validate_utf8_on_parse(self.validate_utf8);
        CompiledSchema::compile_with_options(&schema, options).map_err(|e| format!("Schema-Fehler: {e}"))
    }
}

fn read_input(path: &str) -> Result<Vec<u8>, String> {
    if path == "-" {
        if std::io::stdin().is_terminal() {
            eprintln!("Lese von stdin (Ctrl+D zum Beenden)...");
        }
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| format!("Lesefehler (stdin): {e}"))?;
        Ok(buf)
    } else {
        std::fs::read(path).map_err(|e| format!("Lesefehler '{path}': {e}"))
    }
}

/// Schreibt nach stdout (`-`/ohne `-o`) oder atomar in eine Datei (tmp+rename).
fn write_output(output: Option<&str>, bytes: &[u8]) -> Result<(), String> {
    match output {
        None | Some("-") => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).map_err(|e| format!("Schreibfehler: {e}"))?;
            stdout.flush().map_err(|e| format!("Schreibfehler: {e}"))
        }
        Some(path) => {
            let tmp_path = format!("{path}.tmp");
            if let Err(e) = std::fs::write(&tmp_path, bytes) {
                let _ = std::fs::remove_file(&tmp_path);
                return Err(format!("Schreibfehler: {e}"));
            }
            std::fs::rename(&tmp_path, path).map_err(|e| format!("Rename-Fehler: {e}"))
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Plan(args) => run_plan(args),
        Command::Decode(args) => run_decode(args),
        Command::Encode(args) => run_encode(args),
    }
}

fn run_plan(args: PlanArgs) -> Result<(), String> {
    let schema = args.schema.load()?;
    let mut out = String::new();
    let mut found = false;
    for layout in schema.messages() {
        if args.message.as_deref().is_some_and(|m| m != layout.name()) {
            continue;
        }
        found = true;
        out.push_str(&format!(
            "message {} ({} fields, {} presence words)\n",
            layout.name(),
            layout.fields().len(),
            layout.presence().word_count()
        ));
        for plan in layout.fields() {
            let type_name = match plan.variant() {
                FieldVariant::Scalar(kind) | FieldVariant::RepeatedScalar { kind, .. } => match plan.variant().enum_id() {
                    Some(id) => schema.enum_layout(id).name().to_string(),
                    None => kind.keyword().to_string(),
                },
                FieldVariant::String | FieldVariant::RepeatedString => "string".to_string(),
                FieldVariant::Bytes | FieldVariant::RepeatedBytes => "bytes".to_string(),
                FieldVariant::Message(id) | FieldVariant::RepeatedMessage(id) => schema.layout(id).name().to_string(),
            };
            let presence = plan
                .presence()
                .map_or_else(|| "-".to_string(), |bit| bit.index().to_string());
            let packed = plan
                .packed_tag()
                .map_or_else(String::new, |tag| format!(" packed_tag=0x{tag:x}"));
            let default = match plan.default_value() {
                Some(DefaultValue::Scalar(bits)) => format!(" default_bits=0x{bits:x}"),
                Some(DefaultValue::Text(text)) => format!(" default={text:?}"),
                Some(DefaultValue::Blob(bytes)) => format!(" default={} bytes", bytes.len()),
                None => String::new(),
            };
            out.push_str(&format!(
                "  #{:<3} {:<20} {:<12} {:<24} tag=0x{:x}{packed} bit={presence}{}{default}\n",
                plan.number(),
                plan.name(),
                type_name,
                plan.variant().describe(),
                plan.tag(),
                if plan.is_required() { " required" } else { "" },
            ));
            for doc in plan.docs() {
                out.push_str(&format!("        // {doc}\n"));
            }
        }
    }
    if !found {
        if let Some(name) = args.message {
            return Err(format!("unbekannter Message-Typ '{name}'"));
        }
    }
    write_output(None, out.as_bytes())
}

fn run_decode(args: DecodeArgs) -> Result<(), String> {
    let schema = args.schema.load()?;
    let input = read_input(&args.input)?;
    if input.is_empty() {
        log::warn!("empty input, decoding '{}' with all fields unset", args.message);
    }

    let mut message = schema.new_message(&args.message).map_err(|e| e.to_string())?;
    message.parse_bytes(&input).map_err(|e| format!("Decode-Fehler: {e}"))?;
    let value = to_json(&message).map_err(|e| format!("Decode-Fehler: {e}"))?;

    let mut json = if args.pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .map_err(|e| format!("JSON encode error: {e}"))?;
    json.push('\n');
    write_output(args.output.as_deref(), json.as_bytes())
}

fn run_encode(args: EncodeArgs) -> Result<(), String> {
    let schema = args.schema.load()?;
    let input = read_input(&args.input)?;
    let value: serde_json::Value =
        serde_json::from_slice(&input).map_err(|e| format!("JSON parse error: {e}"))?;

    let mut message = schema.new_message(&args.message).map_err(|e| e.to_string())?;
    from_json(&mut message, &value).map_err(|e| format!("Encode-Fehler: {e}"))?;

    let mut writer = WireWriter::with_capacity(message.compute_size());
    message
        .serialize(&mut writer)
        .map_err(|e| format!("Encode-Fehler: {e}"))?;
    write_output(args.output.as_deref(), writer.bytes())
}
