//! Headless driver for the PS/2 bus machine.
//!
//! ```text
//! ps2-bus --mcp                       # JSON-RPC server on stdin/stdout
//! ps2-bus --send 78 --read            # keyboard sends 0x78, host reads it
//! ps2-bus --write 55 --read
//! ```

use std::process;

use machine_ps2_bus::mcp::McpServer;
use machine_ps2_bus::peripheral_ps2_bus::Polarity;
use machine_ps2_bus::{FrameFault, MachineConfig, MachineError, Ps2BusMachine};

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

enum Action {
    Send(u8, FrameFault),
    Write(u8),
    Read,
    PulseRead,
}

struct CliArgs {
    mcp: bool,
    config: MachineConfig,
    actions: Vec<Action>,
}

fn parse_byte(s: &str) -> Option<u8> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(digits, 16).ok()
}

fn byte_arg(args: &[String], i: usize, flag: &str) -> u8 {
    match args.get(i).and_then(|s| parse_byte(s)) {
        Some(b) => b,
        None => {
            eprintln!("{flag} needs a hex byte");
            process::exit(1);
        }
    }
}

fn parse_count(s: &str) -> Option<u8> {
    s.parse().ok()
}

fn count_arg(args: &[String], i: usize, flag: &str) -> u8 {
    match args.get(i).and_then(|s| parse_count(s)) {
        Some(n) => n,
        None => {
            eprintln!("{flag} needs a count from 0 to 255");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        mcp: false,
        config: MachineConfig::default(),
        actions: Vec::new(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--mcp" => {
                cli.mcp = true;
            }
            "--send" => {
                i += 1;
                let b = byte_arg(&args, i, "--send");
                cli.actions.push(Action::Send(b, FrameFault::None));
            }
            "--send-bad-parity" => {
                i += 1;
                let b = byte_arg(&args, i, "--send-bad-parity");
                cli.actions.push(Action::Send(b, FrameFault::BadParity));
            }
            "--write" => {
                i += 1;
                let b = byte_arg(&args, i, "--write");
                cli.actions.push(Action::Write(b));
            }
            "--read" => {
                cli.actions.push(Action::Read);
            }
            "--pulse-read" => {
                cli.actions.push(Action::PulseRead);
            }
            "--active-low" => {
                cli.config.peripheral.polarity = Polarity::ActiveLow;
            }
            "--wait-states" => {
                i += 1;
                let n = count_arg(&args, i, "--wait-states");
                cli.config.peripheral.read_wait_states = n;
                cli.config.peripheral.write_wait_states = n;
            }
            "--read-only" => {
                cli.config.peripheral.host_writable = false;
            }
            "--help" | "-h" => {
                eprintln!("Usage: ps2-bus [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --mcp                  Run as MCP server (JSON-RPC over stdio)");
                eprintln!("  --send <hex>           Keyboard sends one frame");
                eprintln!("  --send-bad-parity <hex> Keyboard sends a frame with bad parity");
                eprintln!("  --write <hex>          Host writes the data register");
                eprintln!("  --read                 Host reads the data register (handshake)");
                eprintln!("  --pulse-read           Host reads with a one-clock strobe");
                eprintln!("  --active-low           CS/DS asserted low");
                eprintln!("  --wait-states <n>      Wait states on reads and writes [default: 0]");
                eprintln!("  --read-only            Acknowledge host writes but drop the data");
                eprintln!();
                eprintln!("Actions run in order. Set PS2_BUS_TRACE=1 to trace bus cycles and frames.");
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

// ---------------------------------------------------------------------------
// Headless mode
// ---------------------------------------------------------------------------

fn run_headless(cli: &CliArgs) -> Result<(), MachineError> {
    let mut machine = Ps2BusMachine::new(cli.config)?;
    machine.reset();

    for action in &cli.actions {
        match *action {
            Action::Send(byte, fault) => {
                machine.send_frame(byte, fault);
                match machine.flush_keyboard()? {
                    Some(Ok(b)) => println!("frame  {b:#04X}"),
                    Some(Err(e)) => println!("frame  dropped ({e})"),
                    None => println!("frame  none"),
                }
            }
            Action::Write(byte) => {
                let cycle = machine.write(byte)?;
                println!("write  {:#04X} ({} clocks)", cycle.data, cycle.latency);
            }
            Action::Read => {
                let byte = machine.read()?;
                println!("read   {byte:#04X}");
            }
            Action::PulseRead => {
                let byte = machine.pulse_read()?;
                println!("read   {byte:#04X} (pulsed)");
            }
        }
    }

    let p = machine.peripheral();
    println!(
        "status dtack={} int={} t={} {}",
        u8::from(p.dtack()),
        u8::from(p.interrupt()),
        machine.now(),
        p.decoder().stats()
    );
    Ok(())
}

fn main() {
    let cli = parse_args();

    if cli.mcp {
        let mut server = McpServer::new(cli.config);
        server.run();
        return;
    }

    if let Err(e) = run_headless(&cli) {
        eprintln!("ps2-bus: {e}");
        process::exit(1);
    }
}
