//! Binary entrypoint for fontdex-cli.

fn main() {
    if let Err(err) = fontdex_cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
