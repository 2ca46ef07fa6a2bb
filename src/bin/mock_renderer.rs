//! Mock renderer binary for integration testing
//!
//! Implements the renderer command line (`render|print <flags...> <out> <in>`)
//! without drawing anything. Output depends only on the document's
//! non-blank lines, trimmed, so equal markup gives equal bytes.
//!
//! Documents containing one of these markers misbehave on purpose:
//! - `RENDERER-CRASH`: exit with status 3
//! - `RENDERER-SILENT`: exit successfully without writing output
//! - `RENDERER-SLOW`: sleep for ten seconds first

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        eprintln!("usage: mock_renderer <render|print> [flags...] <output> <input>");
        return ExitCode::from(64);
    }

    let mode = args[0].as_str();
    let output = Path::new(&args[args.len() - 2]);
    let input = Path::new(&args[args.len() - 1]);

    let document = match std::fs::read_to_string(input) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("cannot read {}: {e}", input.display());
            return ExitCode::from(66);
        }
    };
    let content = normalize(&document);

    if content.contains("RENDERER-SLOW") {
        std::thread::sleep(Duration::from_secs(10));
    }
    if content.contains("RENDERER-CRASH") {
        eprintln!("layout panicked");
        return ExitCode::from(3);
    }
    if content.contains("RENDERER-SILENT") {
        return ExitCode::SUCCESS;
    }

    let bytes = match mode {
        "render" => format!("BM\n{content}\n").into_bytes(),
        "print" => {
            let text = format!("%PDF-1.4 mock\n---\n{content}\n---\ntrailer\n---\n%%EOF\n");
            // The textual dump goes to stdout as well as the file
            let _ = std::io::stdout().write_all(text.as_bytes());
            text.into_bytes()
        }
        other => {
            eprintln!("unknown mode '{other}'");
            return ExitCode::from(64);
        }
    };

    if let Err(e) = std::fs::write(output, bytes) {
        eprintln!("cannot write {}: {e}", output.display());
        return ExitCode::from(73);
    }
    ExitCode::SUCCESS
}

/// Trimmed non-blank lines, doctype removed
fn normalize(document: &str) -> String {
    document
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("<!DOCTYPE"))
        .collect::<Vec<_>>()
        .join("\n")
}
