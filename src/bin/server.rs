//! Thin entry point: load the config file named on the command line and run
//! the server (mirrors the reference implementation's `main`, `src/server.c:37`).

use fstore::config::ServerConfig;

fn main() {
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "fstore-server".to_string());
    let config_path = match args.next() {
        Some(p) => p,
        None => {
            eprintln!("usage: {program} <config file>");
            std::process::exit(1);
        }
    };

    let config = match ServerConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{program}: failed to load config {config_path}: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = fstore::server::run(config) {
        eprintln!("{program}: {e}");
        std::process::exit(1);
    }
}
