use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use rawexr::batch::run_batch;
use rawexr::io::exr_reader::read_container;
use rawexr::utils::batch_config::{example_config, load_batch_config, save_batch_config};
use rawexr::utils::logging::{init_logging, tagged};
use rawexr::utils::progress::LogProgress;
use rawexr::{LayerCodec, LayerKind, LayerTable, Revision};

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  rawexr convert <layer> <rows> <cols> <input> [output.exr] [--revision float_depth|half_depth]");
    eprintln!("  rawexr batch <config.json>");
    eprintln!("  rawexr inspect <file.exr>");
    eprintln!("  rawexr init <config.json>");
    eprintln!();
    eprintln!("Layers: depth, velocity, input, output, input_post");
}

fn default_out_path(input: &Path) -> PathBuf {
    let mut out = input.to_path_buf();
    out.set_extension("exr");
    out
}

fn parse_dimension(value: &str, what: &str) -> Result<usize> {
    let n: usize = value.parse().with_context(|| format!("{} must be a positive integer, got '{}'", what, value))?;
    if n == 0 {
        bail!("{} must be positive", what);
    }
    Ok(n)
}

fn cmd_convert(args: &[String]) -> Result<()> {
    let mut positional: Vec<&str> = Vec::new();
    let mut revision = Revision::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--revision" {
            let value = iter.next().context("--revision needs a value")?;
            revision = value.parse()?;
        } else {
            positional.push(arg);
        }
    }
    if positional.len() < 4 || positional.len() > 5 {
        bail!("convert expects <layer> <rows> <cols> <input> [output.exr]");
    }

    let kind: LayerKind = positional[0].parse()?;
    let rows = parse_dimension(positional[1], "rows")?;
    let cols = parse_dimension(positional[2], "cols")?;
    let input = Path::new(positional[3]);
    let output = positional.get(4).map(|p| PathBuf::from(*p)).unwrap_or_else(|| default_out_path(input));

    let codec = LayerCodec::new(LayerTable::for_revision(revision));
    codec
        .decode_and_write(kind, input, rows, cols, &output)
        .with_context(|| format!("Failed to convert {} layer '{}'", kind, input.display()))?;

    println!("OK: {}", output.display());
    Ok(())
}

/// Returns whether every job converted
fn cmd_batch(config_path: &Path) -> Result<bool> {
    let config = load_batch_config(config_path)?;
    let report = run_batch(&config, &LogProgress::default())?;
    for (job, err) in &report.failed {
        eprintln!("{}", tagged("failed", format!("frame {} {}: {}", job.frame, job.kind, err)));
    }
    println!(
        "OK: {} converted into {} ({} failed, {} skipped)",
        report.converted.len(),
        config.output_dir().display(),
        report.failed.len(),
        report.skipped.len()
    );
    Ok(report.is_success())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let info = read_container(path).with_context(|| format!("Failed to read EXR: {}", path.display()))?;
    println!("{}", path.display());
    println!("  size: {}x{}", info.width, info.height);
    for ch in &info.channels {
        match ch.range() {
            Some((lo, hi)) => println!("  {:<8} {:<8} min {:<12} max {}", ch.name, ch.pixel_type_name(), lo, hi),
            None => println!("  {:<8} {:<8} (no finite samples)", ch.name, ch.pixel_type_name()),
        }
    }
    Ok(())
}

fn cmd_init(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("refusing to overwrite existing file: {}", path.display());
    }
    save_batch_config(&example_config(), path)?;
    println!("OK: {}", path.display());
    Ok(())
}

fn main() {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_usage();
        std::process::exit(2);
    };
    let rest = &args[1..];

    let result = match (command.as_str(), rest.len()) {
        ("convert", _) => cmd_convert(rest).map(|_| true),
        ("batch", 1) => cmd_batch(Path::new(&rest[0])),
        ("inspect", 1) => cmd_inspect(Path::new(&rest[0])).map(|_| true),
        ("init", 1) => cmd_init(Path::new(&rest[0])).map(|_| true),
        _ => {
            print_usage();
            std::process::exit(2);
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(4),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(3);
        }
    }
}
