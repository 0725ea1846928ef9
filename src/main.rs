use musictime::{load_str, TimingReport};
use std::env;
use std::fs;
use std::process;

const USAGE: &str = "Usage: musictime [--force] <song.yaml> [report.yaml]";

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();

    // Parse flags
    let force = args.first().is_some_and(|arg| arg == "--force");
    let rest = if force { &args[1..] } else { &args[..] };
    let Some(input_path) = rest.first() else {
        eprintln!("{}", USAGE);
        process::exit(1);
    };
    let output_path = rest.get(1);

    // Read input file
    let source = match fs::read_to_string(input_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", input_path, e);
            process::exit(1);
        }
    };

    // Resolve
    let result = load_str(&source).and_then(|mut timeline| {
        timeline.resolve(force)?;
        TimingReport::from_timeline(&mut timeline)?.to_yaml()
    });

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Resolution error: {}", e);
            process::exit(1);
        }
    };

    // Output
    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(path, &report) {
                eprintln!("Error writing to '{}': {}", path, e);
                process::exit(1);
            }
            eprintln!("Wrote timing report to {}", path);
        }
        None => {
            print!("{}", report);
        }
    }
}
