//! Reference client CLI: a thin `clap` binary driving
//! `fstore::client::ClientHandle`. Mirrors the option surface of the
//! original C client (`src/client.c`) — `-w`/`-W` upload, `-r`/`-R` download,
//! `-l`/`-u`/`-c` lock/unlock/remove, `-d`/`-D` persist read/evicted content,
//! `-t` inter-request delay, `-p` verbose trace. Filesystem plumbing
//! (recursive directory listing, mkdir-p, save-file) is plain `std::fs` —
//! not where the interesting engineering in this crate lives.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use clap::Parser;
use fstore::client::{ClientHandle, FileContent};

#[derive(Parser, Debug)]
#[command(name = "fstore-client", about = "Reference client for the fstore cache server")]
struct Cli {
    /// Unix socket path of the running server.
    #[arg(short = 'f', long = "socket")]
    socket: String,

    /// Upload every file under `dir`, created+locked, via `ls -R`; an
    /// optional `,n` suffix caps the upload to the first n files found.
    #[arg(short = 'w', long = "write-dir", value_name = "DIR[,N]")]
    write_dir: Option<String>,

    /// Upload a comma-separated list of files, created+locked.
    #[arg(short = 'W', long = "write-files", value_name = "FILES")]
    write_files: Option<String>,

    /// Directory to save evicted victims returned by `-w`/`-W` uploads.
    #[arg(short = 'D', long = "evicted-dir", value_name = "DIR")]
    evicted_dir: Option<String>,

    /// Read a comma-separated list of files.
    #[arg(short = 'r', long = "read-files", value_name = "FILES")]
    read_files: Option<String>,

    /// Read N files from the cache (all, if N is omitted).
    #[arg(short = 'R', long = "read-n", value_name = "N", num_args = 0..=1, default_missing_value = "0")]
    read_n: Option<i64>,

    /// Directory to save files retrieved by `-r`/`-R`.
    #[arg(short = 'd', long = "read-dir", value_name = "DIR")]
    read_dir: Option<String>,

    /// Milliseconds to sleep between consecutive requests.
    #[arg(short = 't', long = "delay", value_name = "MSEC", default_value_t = 0)]
    delay_msec: u64,

    /// Lock a comma-separated list of files (opening them first if needed).
    #[arg(short = 'l', long = "lock", value_name = "FILES")]
    lock: Option<String>,

    /// Unlock a comma-separated list of files.
    #[arg(short = 'u', long = "unlock", value_name = "FILES")]
    unlock: Option<String>,

    /// Remove a comma-separated list of files.
    #[arg(short = 'c', long = "remove", value_name = "FILES")]
    remove: Option<String>,

    /// Print a one-line trace of each operation.
    #[arg(short = 'p', long = "verbose")]
    verbose: bool,

    /// Exit with the server's errno on a FATAL reply instead of erroring.
    #[arg(long)]
    strict: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut client = match ClientHandle::connect(&cli.socket) {
        Ok(c) => c.with_flags(cli.verbose, cli.strict),
        Err(e) => {
            eprintln!("fstore-client: failed to connect to {}: {e}", cli.socket);
            std::process::exit(1);
        }
    };

    let delay = Duration::from_millis(cli.delay_msec);

    if let Some(spec) = &cli.write_dir {
        let (dir, limit) = split_dir_limit(spec);
        let mut files = list_recursive(Path::new(&dir)).unwrap_or_else(|e| {
            eprintln!("fstore-client: failed to list {dir}: {e}");
            Vec::new()
        });
        if let Some(n) = limit {
            files.truncate(n);
        }
        for path in files {
            upload_one(&mut client, &path, cli.evicted_dir.as_deref());
            thread::sleep(delay);
        }
    }

    if let Some(list) = &cli.write_files {
        for path in list.split(',').filter(|s| !s.is_empty()) {
            upload_one(&mut client, Path::new(path), cli.evicted_dir.as_deref());
            thread::sleep(delay);
        }
    }

    if let Some(list) = &cli.read_files {
        for path in list.split(',').filter(|s| !s.is_empty()) {
            download_one(&mut client, path, cli.read_dir.as_deref());
            thread::sleep(delay);
        }
    }

    if let Some(n) = cli.read_n {
        match client.read_n(n) {
            Ok(files) => {
                if let Some(dir) = &cli.read_dir {
                    for f in &files {
                        persist(dir, &f.name, &f.content);
                    }
                }
            }
            Err(e) => eprintln!("fstore-client: readN failed: {e}"),
        }
        thread::sleep(delay);
    }

    if let Some(list) = &cli.lock {
        for path in list.split(',').filter(|s| !s.is_empty()) {
            let _ = client.open(path, false, false);
            if let Err(e) = client.lock(path) {
                eprintln!("fstore-client: lock {path} failed: {e}");
            }
            let _ = client.close(path);
            thread::sleep(delay);
        }
    }

    if let Some(list) = &cli.unlock {
        for path in list.split(',').filter(|s| !s.is_empty()) {
            let _ = client.open(path, false, false);
            if let Err(e) = client.unlock(path) {
                eprintln!("fstore-client: unlock {path} failed: {e}");
            }
            let _ = client.close(path);
            thread::sleep(delay);
        }
    }

    if let Some(list) = &cli.remove {
        for path in list.split(',').filter(|s| !s.is_empty()) {
            let _ = client.open(path, false, false);
            if let Err(e) = client.remove(path) {
                eprintln!("fstore-client: remove {path} failed: {e}");
            }
            thread::sleep(delay);
        }
    }
}

fn split_dir_limit(spec: &str) -> (String, Option<usize>) {
    match spec.rsplit_once(',') {
        Some((dir, n)) => (dir.to_string(), n.parse().ok()),
        None => (spec.to_string(), None),
    }
}

/// `ls -R`-equivalent: every regular file under `dir`, recursively.
fn list_recursive(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    Ok(out)
}

fn upload_one(client: &mut ClientHandle, path: &Path, evicted_dir: Option<&str>) {
    let name = path.to_string_lossy().to_string();
    let content = match fs::read(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fstore-client: failed to read {name}: {e}");
            return;
        }
    };
    if let Err(e) = client.open(&name, true, true) {
        eprintln!("fstore-client: open {name} failed: {e}");
        return;
    }
    match client.write(&name, content) {
        Ok(evicted) => {
            if let Some(dir) = evicted_dir {
                persist_all(dir, &evicted);
            }
        }
        Err(e) => eprintln!("fstore-client: write {name} failed: {e}"),
    }
    let _ = client.unlock(&name);
    let _ = client.close(&name);
}

fn download_one(client: &mut ClientHandle, name: &str, read_dir: Option<&str>) {
    if let Err(e) = client.open(name, false, false) {
        eprintln!("fstore-client: open {name} failed: {e}");
        return;
    }
    match client.read(name, read_dir.is_some()) {
        Ok(content) => {
            if let Some(dir) = read_dir {
                persist(dir, name, &content);
            }
        }
        Err(e) => eprintln!("fstore-client: read {name} failed: {e}"),
    }
    let _ = client.close(name);
}

fn persist_all(dir: &str, files: &[FileContent]) {
    for f in files {
        persist(dir, &f.name, &f.content);
    }
}

/// `save-file`-equivalent: writes `content` under `dir`, creating `dir`
/// (mkdir-p) and any path components in `name` first.
fn persist(dir: &str, name: &str, content: &[u8]) {
    let dest = Path::new(dir).join(name.trim_start_matches('/'));
    if let Some(parent) = dest.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("fstore-client: mkdir -p {}: {e}", parent.display());
            return;
        }
    }
    if let Err(e) = fs::write(&dest, content) {
        eprintln!("fstore-client: save {}: {e}", dest.display());
    }
}
