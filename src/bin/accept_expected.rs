//! Binary to generate/update .expected.py and .expected.err fixture files
//!
//! Usage:
//!   cargo run --bin accept_expected            # Update all
//!   cargo run --bin accept_expected -- control # Update only fixtures matching "control"

use blockpy_codegen::{generate_with, GenerateOptions, Workspace};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

fn main() {
    let filter: Option<String> = std::env::args().nth(1);
    let fixture_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures");

    let mut updated = 0;
    let mut skipped = 0;

    for entry in WalkDir::new(&fixture_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|s| s == "json"))
    {
        let path = entry.path();
        let path_str = path.to_string_lossy();

        if let Some(ref f) = filter {
            if !path_str.contains(f) {
                skipped += 1;
                continue;
            }
        }

        process_file(path);
        updated += 1;
    }

    println!("Updated {} files, skipped {}", updated, skipped);
}

fn process_file(path: &Path) {
    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {:?}: {}", path, e);
            return;
        }
    };

    let workspace = match Workspace::from_json(&source) {
        Ok(workspace) => workspace,
        Err(e) => {
            eprintln!("ERROR: {:?} is not a valid workspace: {}", path, e);
            return;
        }
    };

    let is_error_test = path.to_string_lossy().contains("/errors/");
    let options = GenerateOptions { verify_syntax: true, ..GenerateOptions::default() };

    match generate_with(&workspace, &options) {
        Ok(result) => {
            if is_error_test {
                eprintln!("ERROR: {:?} is in errors/ but generated successfully", path);
                return;
            }
            let expected_py = path.with_extension("expected.py");
            write(&expected_py, &result.code);
        }
        Err(e) => {
            if is_error_test {
                let expected_err = path.with_extension("expected.err");
                let filename = path.file_name().and_then(|s| s.to_str()).unwrap_or("unknown");
                write(&expected_err, &e.render(filename));
            } else {
                eprintln!("ERROR: {:?} failed to generate but is not in errors/: {}", path, e);
            }
        }
    }
}

fn write(path: &Path, contents: &str) {
    if let Err(e) = fs::write(path, contents) {
        eprintln!("Failed to write {:?}: {}", path, e);
    } else {
        println!("  wrote {}", path.display());
    }
}
