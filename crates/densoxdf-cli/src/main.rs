use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use densoxdf_core::{
    LocatorConfig, MapInfo, MapKind, MapTable, OffsetOrigin, TableError, encode_utf16,
    format_timestamp, read_map_table, render_xdf,
};
use glob::glob;
use serde::Serialize;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("DENSOXDF_BUILD_COMMIT"),
    ", ",
    env!("DENSOXDF_BUILD_DATE"),
    ")"
);

const EXAMPLES: &str = "Examples:\n  densoxdf generate ecu.bin ecu.xdf\n  densoxdf generate ecu.bin ecu.xdf --position 2C000\n  densoxdf locate ecu.bin\n  densoxdf list ecu.bin --json --pretty";

#[derive(Parser, Debug)]
#[command(name = "densoxdf")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Generate TunerPro XDF definitions from Denso SuperH/M32R ECU images.",
    long_about = None,
    after_help = EXAMPLES
)]
struct Cli {
    /// Print diagnostic logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode the map lookup table and write an XDF definition file.
    #[command(visible_aliases = ["gen-xdf", "xdf"])]
    #[command(after_help = EXAMPLES)]
    Generate {
        /// Path to the ECU image (.bin)
        input: PathBuf,

        /// Output XDF path
        output: PathBuf,

        /// Hexadecimal offset of the lookup table; discovered when omitted
        #[arg(short, long, value_parser = parse_hex_offset)]
        position: Option<usize>,

        #[command(flatten)]
        scan: ScanArgs,

        /// Suppress non-error output
        #[arg(long)]
        quiet: bool,

        /// List decoded maps after generation
        #[arg(long)]
        list_maps: bool,
    },
    /// Print the offset of the map lookup table.
    Locate {
        /// Path to the ECU image (.bin)
        input: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the decoded map records.
    #[command(alias = "ls")]
    List {
        /// Path to the ECU image (.bin)
        input: PathBuf,

        /// Hexadecimal offset of the lookup table; discovered when omitted
        #[arg(short, long, value_parser = parse_hex_offset)]
        position: Option<usize>,

        #[command(flatten)]
        scan: ScanArgs,

        /// Print the table as JSON
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output
        #[arg(long, requires = "json")]
        pretty: bool,
    },
}

#[derive(Args, Debug, Clone, Copy)]
struct ScanArgs {
    /// Consecutive plausible records required to accept a table start [default: 5]
    #[arg(long, value_name = "N")]
    min_run: Option<NonZeroUsize>,

    /// Byte alignment of candidate table starts [default: 4]
    #[arg(long, value_name = "BYTES")]
    alignment: Option<NonZeroUsize>,
}

impl ScanArgs {
    fn config(&self) -> LocatorConfig {
        let defaults = LocatorConfig::default();
        LocatorConfig::new(
            self.min_run.unwrap_or(defaults.min_run()),
            self.alignment.unwrap_or(defaults.alignment()),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Generate {
            input,
            output,
            position,
            scan,
            quiet,
            list_maps,
        } => cmd_generate(input, output, position, scan, quiet, list_maps),
        Commands::Locate { input, scan, json } => cmd_locate(input, scan, json),
        Commands::List {
            input,
            position,
            scan,
            json,
            pretty,
        } => cmd_list(input, position, scan, json, pretty),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("densoxdf=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

impl From<TableError> for CliError {
    fn from(err: TableError) -> Self {
        let hint = match &err {
            TableError::Locate(_) => "provide the table start with --position <HEX>",
            TableError::OffsetOutOfRange { .. } => "check --position against the image size",
            TableError::Record { .. } => "the image may be truncated or --position may be wrong",
        };
        CliError::new(err.to_string(), Some(hint.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct LocateReport {
    offset: usize,
    offset_hex: String,
    image_bytes: usize,
}

fn cmd_generate(
    input: PathBuf,
    output: PathBuf,
    position: Option<usize>,
    scan: ScanArgs,
    quiet: bool,
    list_maps: bool,
) -> Result<(), CliError> {
    let input = resolve_input_path(&input)?;
    validate_input_file(&input)?;
    ensure_distinct_output(&input, &output)?;

    let image = read_image(&input)?;
    let table = decode_image(&image, position, &scan.config())?;
    if table.origin == OffsetOrigin::Discovered && !quiet {
        eprintln!("Found lookup table offset: {:#x}", table.offset);
    }

    let generated_at = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let generated_at = format_timestamp(generated_at).context("Failed to format timestamp")?;
    let xdf = render_xdf(&table, &generated_at).context("Failed to render XDF")?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    fs::write(&output, encode_utf16(&xdf))
        .with_context(|| format!("Failed to write XDF: {}", output.display()))?;

    if list_maps && !quiet {
        eprintln!("Maps:");
        for (index, map) in table.maps.iter().enumerate() {
            eprintln!("  {}", describe_map(index + 1, map));
        }
    }
    if !quiet {
        eprintln!(
            "{} 2D maps and {} 3D maps identified",
            table.count(MapKind::TwoD),
            table.count(MapKind::ThreeD)
        );
        eprintln!("OK: XDF written -> {}", output.display());
    }
    Ok(())
}

fn cmd_locate(input: PathBuf, scan: ScanArgs, json: bool) -> Result<(), CliError> {
    let input = resolve_input_path(&input)?;
    validate_input_file(&input)?;
    let image = read_image(&input)?;

    let offset = densoxdf_core::find_lookup_table_offset_with(&image, &scan.config())
        .map_err(TableError::from)?;
    tracing::info!(offset = %format!("{offset:#x}"), "lookup table located");

    if json {
        let report = LocateReport {
            offset,
            offset_hex: format!("{offset:#x}"),
            image_bytes: image.len(),
        };
        let text = serde_json::to_string(&report).context("JSON serialization failed")?;
        println!("{}", text);
    } else {
        println!("{:#x}", offset);
    }
    Ok(())
}

fn cmd_list(
    input: PathBuf,
    position: Option<usize>,
    scan: ScanArgs,
    json: bool,
    pretty: bool,
) -> Result<(), CliError> {
    let input = resolve_input_path(&input)?;
    validate_input_file(&input)?;
    let image = read_image(&input)?;
    let table = decode_image(&image, position, &scan.config())?;

    if json {
        println!("{}", serialize_table(&table, pretty)?);
        return Ok(());
    }
    println!(
        "lookup table at {:#x} ({}), {} maps",
        table.offset,
        origin_label(table.origin),
        table.maps.len()
    );
    for (index, map) in table.maps.iter().enumerate() {
        println!("  {}", describe_map(index + 1, map));
    }
    Ok(())
}

fn decode_image(
    image: &[u8],
    position: Option<usize>,
    config: &LocatorConfig,
) -> Result<MapTable, CliError> {
    tracing::debug!(
        bytes = image.len(),
        min_run = config.min_run().get(),
        alignment = config.alignment().get(),
        explicit = position.is_some(),
        "decoding lookup table"
    );
    let table = read_map_table(image, position, config)?;
    tracing::info!(
        offset = %format!("{:#x}", table.offset),
        origin = origin_label(table.origin),
        maps = table.maps.len(),
        "lookup table decoded"
    );
    for map in &table.maps {
        tracing::debug!(
            kind = map.kind().label(),
            type_id = %format!("{:#04x}", map.type_id()),
            z_address = %format!("{:#x}", map.z_address()),
            "map record"
        );
    }
    Ok(table)
}

fn serialize_table(table: &MapTable, pretty: bool) -> Result<String, CliError> {
    if pretty {
        serde_json::to_string_pretty(table)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(table)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

fn origin_label(origin: OffsetOrigin) -> &'static str {
    match origin {
        OffsetOrigin::Explicit => "explicit",
        OffsetOrigin::Discovered => "discovered",
    }
}

fn describe_map(index: usize, map: &MapInfo) -> String {
    let mut line = format!(
        "{:>3} {} type={:#04x} x={}@{:#x}/{}",
        index,
        map.kind().label(),
        map.type_id(),
        map.x_length(),
        map.x_address(),
        map.x_width().bits()
    );
    if let (Some(length), Some(address), Some(width)) =
        (map.y_length(), map.y_address(), map.y_width())
    {
        line.push_str(&format!(" y={}@{:#x}/{}", length, address, width.bits()));
    }
    line.push_str(&format!(
        " z@{:#x}/{}",
        map.z_address(),
        map.z_width().bits()
    ));
    line
}

fn parse_hex_offset(value: &str) -> Result<usize, String> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    usize::from_str_radix(digits, 16).map_err(|err| format!("invalid hex offset '{value}': {err}"))
}

fn read_image(input: &Path) -> Result<Vec<u8>, CliError> {
    let image = fs::read(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;
    if image.is_empty() {
        return Err(CliError::new(
            format!("input file is empty: {}", input.display()),
            Some("use a full ECU image dump".to_string()),
        ));
    }
    Ok(image)
}

fn ensure_distinct_output(input: &Path, output: &Path) -> Result<(), CliError> {
    let input_abs = fs::canonicalize(input)
        .with_context(|| format!("Failed to resolve input path: {}", input.display()))?;
    let output_dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    // A missing output directory cannot contain the input.
    let Ok(output_dir) = fs::canonicalize(output_dir) else {
        return Ok(());
    };
    let file_name = output
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid output path: {}", output.display()))?;
    if output_dir.join(file_name) == input_abs {
        return Err(CliError::new(
            format!("output path must differ from input: {}", output.display()),
            Some("choose a different output path".to_string()),
        ));
    }
    Ok(())
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("pass the path of an ECU image (.bin)".to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("pass the path of an ECU image (.bin)".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let mut matches = Vec::new();
    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    if matches.is_empty() {
        return Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern".to_string()),
        ));
    }
    if matches.len() > 1 {
        let listed = matches
            .iter()
            .take(3)
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let more = if matches.len() > 3 { ", ..." } else { "" };
        return Err(CliError::new(
            format!(
                "multiple files match pattern '{}' ({} matches); matches: {}{}",
                pattern,
                matches.len(),
                listed,
                more
            ),
            Some("pass a single image file, or run once per file".to_string()),
        ));
    }

    Ok(matches.remove(0))
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
