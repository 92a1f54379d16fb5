//! gentrack binary entry point.

fn main() {
    if let Err(e) = gentrack::cli::run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
