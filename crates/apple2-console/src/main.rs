//! Apple II console bridge binary.
//!
//! Boots the Bobbin emulator and prints the screen, tokenizes a BASIC
//! file, or serves the machine over MCP.

use std::path::{Path, PathBuf};
use std::process;

use apple2_console::config::{Apple2Config, Machine};
use apple2_console::mcp::McpServer;
use apple2_console::tokenize::TokenizeMode;
use apple2_console::Apple2;
use format_applesoft::list;

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

struct CliArgs {
    mcp: bool,
    script_path: Option<PathBuf>,
    emulator: Option<PathBuf>,
    machine: Machine,
    disk: Option<PathBuf>,
    ceiling: Option<u16>,
    snapshot_dir: Option<PathBuf>,
    tokenize_path: Option<PathBuf>,
    offline: bool,
    type_text: Option<String>,
}

fn parse_u16(s: &str) -> Option<u16> {
    match s.strip_prefix('$').or_else(|| s.strip_prefix("0x")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        mcp: false,
        script_path: None,
        emulator: None,
        machine: Machine::default(),
        disk: None,
        ceiling: None,
        snapshot_dir: None,
        tokenize_path: None,
        offline: false,
        type_text: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--mcp" => {
                cli.mcp = true;
            }
            "--script" => {
                i += 1;
                cli.script_path = args.get(i).map(PathBuf::from);
            }
            "--emulator" => {
                i += 1;
                cli.emulator = args.get(i).map(PathBuf::from);
            }
            "--machine" => {
                i += 1;
                match args.get(i).map(|s| s.parse::<Machine>()) {
                    Some(Ok(m)) => cli.machine = m,
                    Some(Err(e)) => {
                        eprintln!("{e}");
                        process::exit(1);
                    }
                    None => {}
                }
            }
            "--disk" => {
                i += 1;
                cli.disk = args.get(i).map(PathBuf::from);
            }
            "--ceiling" => {
                i += 1;
                cli.ceiling = args.get(i).and_then(|s| parse_u16(s));
                if cli.ceiling.is_none() {
                    eprintln!("--ceiling needs an address such as $9600");
                    process::exit(1);
                }
            }
            "--snapshots" => {
                i += 1;
                cli.snapshot_dir = args.get(i).map(PathBuf::from);
            }
            "--tokenize" => {
                i += 1;
                cli.tokenize_path = args.get(i).map(PathBuf::from);
            }
            "--offline" => {
                cli.offline = true;
            }
            "--type" => {
                i += 1;
                cli.type_text = args.get(i).cloned();
            }
            "--help" | "-h" => {
                eprintln!("Usage: apple2-console [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --mcp                Run as MCP server (JSON-RPC over stdio)");
                eprintln!("  --script <file>      Run a JSON script file (batch mode)");
                eprintln!("  --emulator <path>    Bobbin binary [default: $BOBBIN or bobbin]");
                eprintln!("  --machine <model>    plus, enhanced or twoey [default: enhanced]");
                eprintln!("  --disk <file>        Disk image to insert");
                eprintln!("  --ceiling <addr>     Highest address for injected programs [default: $9600]");
                eprintln!("  --snapshots <dir>    Snapshot directory [default: snapshots]");
                eprintln!("  --tokenize <file>    Tokenize a BASIC file and print the bytes");
                eprintln!("  --offline            With --tokenize, use the emulator's batch tokenizer");
                eprintln!("  --type <text>        Type a line at the BASIC prompt before printing the screen");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn make_config(cli: &CliArgs) -> Apple2Config {
    let mut config = Apple2Config {
        machine: cli.machine,
        disk: cli.disk.clone(),
        ..Apple2Config::default()
    };
    if let Some(ref emulator) = cli.emulator {
        config.emulator.clone_from(emulator);
    }
    if let Some(ceiling) = cli.ceiling {
        config.ceiling = ceiling;
    }
    if let Some(ref dir) = cli.snapshot_dir {
        config.snapshot_dir.clone_from(dir);
    }
    config
}

fn make_machine(config: Apple2Config) -> Apple2<apple2_console::ProcessLauncher> {
    match Apple2::open(config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Failed to configure session: {e}");
            process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Batch modes
// ---------------------------------------------------------------------------

fn run_tokenize(cli: &CliArgs, path: &Path) {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Cannot read {}: {e}", path.display());
            process::exit(1);
        }
    };
    let config = make_config(cli);
    let emulator = config.emulator.clone();
    let mut apple2 = make_machine(config);
    let mode = if cli.offline {
        TokenizeMode::Process
    } else {
        TokenizeMode::Live
    };
    if mode == TokenizeMode::Live
        && let Err(e) = apple2.boot()
    {
        eprintln!("Boot error: {e}");
        process::exit(1);
    }

    let result = apple2.tokenize_with(&source, mode, &emulator);
    apple2.shutdown();
    match result {
        Ok(tokenized) => {
            println!("{}", tokenized.hex());
            match list(&tokenized.image) {
                Ok(listing) => print!("{listing}"),
                Err(e) => eprintln!("Listing error: {e}"),
            }
        }
        Err(e) => {
            eprintln!("Tokenize error: {e}");
            process::exit(1);
        }
    }
}

fn run_screen(cli: &CliArgs) {
    let mut apple2 = make_machine(make_config(cli));
    if let Err(e) = apple2.boot() {
        eprintln!("Boot error: {e}");
        process::exit(1);
    }
    if let Some(ref text) = cli.type_text
        && let Err(e) = apple2.type_line(text)
    {
        eprintln!("Type error: {e}");
    }
    let screen = apple2.get_screen_text();
    apple2.shutdown();
    match screen {
        Ok(lines) => {
            for line in lines {
                println!("{}", line.trim_end());
            }
        }
        Err(e) => {
            eprintln!("Screen error: {e}");
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::init();
    let cli = parse_args();

    if cli.mcp || cli.script_path.is_some() {
        let mut server = match McpServer::new(make_config(&cli)) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to start MCP server: {e}");
                process::exit(1);
            }
        };
        if let Some(ref path) = cli.script_path {
            if let Err(e) = server.run_script(path) {
                eprintln!("Script error: {e}");
                process::exit(1);
            }
        } else {
            server.run();
        }
        return;
    }

    if let Some(ref path) = cli.tokenize_path {
        run_tokenize(&cli, path);
        return;
    }

    run_screen(&cli);
}
