//! Example Shell
//!
//! Loads a device under a registration root and drives it interactively:
//! open handles, write to the shared buffer, read it back, release.

use clap::Parser;
use simple_chardev::{CharDevice, DeviceConfig, OpenFile};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chardev-shell")]
#[command(about = "Interactive shell for a simple_chardev device", long_about = None)]
struct Args {
    /// Registration root directory
    #[arg(short, long, default_value = "/tmp/simple_chardev")]
    root: PathBuf,

    /// Buffer capacity in bytes
    #[arg(short, long, default_value_t = 1024)]
    capacity: usize,

    /// Device name
    #[arg(long, default_value = "simple_chardev")]
    name: String,

    /// Class name
    #[arg(long, default_value = "simple_class")]
    class: String,
}

fn print_help() {
    println!("Commands:");
    println!("  open              - Open a new handle");
    println!("  write <id> <text> - Replace the buffer through handle <id>");
    println!("  read <id> <n>     - Read up to n bytes through handle <id>");
    println!("  release <id>      - Release handle <id>");
    println!("  list              - Show open handles and their offsets");
    println!("  status            - Show device state");
    println!("  exit              - Release everything and unload");
    println!("  help              - Show this help");
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = DeviceConfig {
        device_name: args.name,
        class_name: args.class,
        capacity: args.capacity,
        root: args.root,
    };

    let device = match CharDevice::load(config) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("[Shell] Failed to load device: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(node) = device.node_path() {
        println!("[Shell] Device published at {}", node.display());
    }
    println!("[Shell] Type 'help' for available commands");
    println!();

    let mut files: BTreeMap<u64, OpenFile> = BTreeMap::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!(">>> ");
        let _ = stdout.flush();

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" {
            break;
        }

        execute_command(&device, &mut files, input);
    }

    let endpoint = device.endpoint();
    for (_, file) in std::mem::take(&mut files) {
        endpoint.release(file);
    }
    device.shutdown();
    println!("[Shell] Goodbye!");
}

fn parse_id(arg: Option<&str>) -> Option<u64> {
    arg.and_then(|s| s.parse().ok())
}

fn lookup<'a>(files: &'a mut BTreeMap<u64, OpenFile>, arg: Option<&str>) -> Option<&'a mut OpenFile> {
    let id = parse_id(arg)?;
    files.get_mut(&id)
}

fn execute_command(device: &CharDevice, files: &mut BTreeMap<u64, OpenFile>, input: &str) {
    let mut parts = input.splitn(3, ' ');
    let cmd = parts.next().unwrap_or("");
    let endpoint = device.endpoint();

    match cmd {
        "help" => print_help(),

        "open" => {
            let file = endpoint.open();
            println!("[Shell] Opened handle {}", file.id());
            files.insert(file.id(), file);
        }

        "write" => {
            let Some(file) = lookup(files, parts.next()) else {
                println!("[Shell] Usage: write <id> <text>");
                return;
            };
            let text = parts.next().unwrap_or("");
            match endpoint.write(file, text.as_bytes()) {
                Ok(n) if n < text.len() => {
                    println!("[Shell] Wrote {} of {} bytes (truncated)", n, text.len())
                }
                Ok(n) => println!("[Shell] Wrote {} bytes", n),
                Err(e) => println!("[Shell] Write failed: {}", e),
            }
        }

        "read" => {
            let Some(file) = lookup(files, parts.next()) else {
                println!("[Shell] Usage: read <id> <n>");
                return;
            };
            let len = parts
                .next()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(endpoint.capacity());
            match endpoint.read_to_vec(file, len) {
                Ok(data) if data.is_empty() => println!("[Shell] End of data"),
                Ok(data) => println!(
                    "[Shell] Data ({} bytes, offset now {}): {}",
                    data.len(),
                    file.offset(),
                    String::from_utf8_lossy(&data)
                ),
                Err(e) => println!("[Shell] Read failed: {}", e),
            }
        }

        "release" => match parse_id(parts.next()).and_then(|id| files.remove(&id)) {
            Some(file) => {
                let id = file.id();
                endpoint.release(file);
                println!("[Shell] Released handle {}", id);
            }
            None => println!("[Shell] Usage: release <id>"),
        },

        "list" => {
            if files.is_empty() {
                println!("[Shell] No open handles");
            }
            for (id, file) in files.iter() {
                println!("[Shell] handle {:>3}  offset {}", id, file.offset());
            }
        }

        "status" => {
            println!("[Shell] Device:   {}", endpoint.name());
            if let Some(devnum) = device.devnum() {
                println!("[Shell] Number:   {}", devnum);
            }
            println!("[Shell] Capacity: {} bytes", endpoint.capacity());
            println!("[Shell] Content:  {} bytes", endpoint.content_len());
        }

        other => println!("[Shell] Unknown command: {} (try 'help')", other),
    }
}
