//! faktura – command-line invoice renderer.
//!
//! Usage:
//!   faktura <template.xml> <data.json> [output.pdf] [--strict] [--title T] [--layout-json]
//!
//! If `output.pdf` is omitted the PDF is written next to the template file
//! with the same stem (e.g. `invoice.xml` → `invoice.pdf`).

use std::{env, fs, path::PathBuf, process};

use faktura::binding::BindMode;
use faktura::pipeline::{render, render_document, PageConfig};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut template_path: Option<PathBuf> = None;
    let mut data_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut strict = false;
    let mut layout_json = false;
    let mut title: Option<String> = None;
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--strict" | "-s" => strict = true,
            "--layout-json" => layout_json = true,
            "--title" | "-t" => match iter.next() {
                Some(v) => title = Some(v.clone()),
                None => {
                    eprintln!("--title requires a value");
                    process::exit(1);
                }
            },
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
            path => {
                match positional {
                    0 => template_path = Some(PathBuf::from(path)),
                    1 => data_path = Some(PathBuf::from(path)),
                    2 => output_path = Some(PathBuf::from(path)),
                    _ => {
                        eprintln!("Unexpected argument: {path}");
                        print_usage(&args[0]);
                        process::exit(1);
                    }
                }
                positional += 1;
            }
        }
    }

    let (template_path, data_path) = match (template_path, data_path) {
        (Some(t), Some(d)) => (t, d),
        _ => {
            eprintln!("Error: template and data files are required.");
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    // Default output: same directory + same stem as the template, but .pdf
    let output = output_path.unwrap_or_else(|| {
        let mut o = template_path.clone();
        o.set_extension("pdf");
        o
    });

    let markup = match fs::read_to_string(&template_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", template_path.display());
            process::exit(1);
        }
    };
    let record: serde_json::Value = match fs::read_to_string(&data_path) {
        Ok(s) => match serde_json::from_str(&s) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Error parsing '{}': {e}", data_path.display());
                process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Error reading '{}': {e}", data_path.display());
            process::exit(1);
        }
    };

    // Default title: stem of the template filename.
    let default_title = template_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("faktura output")
        .to_string();

    let mut config = PageConfig::default();
    config.title = title.unwrap_or(default_title);
    if strict {
        config.bind_mode = BindMode::Strict;
    }

    if layout_json {
        match render_document(&markup, &record, &config) {
            Ok(doc) => println!("{}", doc.to_json()),
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
        return;
    }

    match render(&markup, &record, &config) {
        Ok(bytes) => {
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        eprintln!("Error creating output directory: {e}");
                        process::exit(1);
                    }
                }
            }
            if let Err(e) = fs::write(&output, &bytes) {
                eprintln!("Error writing '{}': {e}", output.display());
                process::exit(1);
            }
            eprintln!("Wrote '{}' ({} bytes)", output.display(), bytes.len());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!("faktura – invoice markup to PDF renderer");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <template.xml> <data.json> [output.pdf] [--strict] [--title T] [--layout-json]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <template.xml>  Markup template");
    eprintln!("  <data.json>     Data record (JSON)");
    eprintln!("  [output.pdf]    Output path (default: template stem with .pdf)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --strict, -s    Fail on unresolved data fields (default: blank)");
    eprintln!("  --title, -t     Document title in PDF metadata (default: template stem)");
    eprintln!("  --layout-json   Print the paginated layout as JSON instead of writing a PDF");
    eprintln!("  --help          Print this message");
}
