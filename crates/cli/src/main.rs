//! Manual REPL over the swap executor, for local exploration of the swap
//! pipeline outside the integration test suite. Reads commands from
//! stdin line-by-line, whether that's an interactive terminal or a
//! piped script; not part of the tested core.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;

use swapcore_executor::{Command, ExecError, Executor, Output, SwapConfig};
use swapcore_storage::InMemoryEngine;

fn main() {
    tracing_subscriber::fmt::init();

    let engine = Arc::new(InMemoryEngine::new());
    let mut executor = match Executor::new(0, engine, SwapConfig::strict()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("failed to start executor: {e}");
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut out = io::stdout();

    loop {
        if interactive {
            print!("swapcore> ");
            let _ = out.flush();
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("read error: {e}");
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        match parse_command(line) {
            Ok(command) => match executor.execute(command) {
                Ok(output) => println!("{}", format_output(&output)),
                Err(e) => println!("(error) {}", format_error(&e)),
            },
            Err(msg) => println!("(error) {msg}"),
        }
    }
}

fn format_output(output: &Output) -> String {
    match output {
        Output::Bulk(Some(v)) => format!("\"{}\"", String::from_utf8_lossy(v)),
        Output::Bulk(None) => "(nil)".to_string(),
        Output::Integer(n) => format!("(integer) {n}"),
        Output::Ok => "OK".to_string(),
        Output::MultiBulk(values) => values
            .iter()
            .map(|v| match v {
                Some(v) => format!("\"{}\"", String::from_utf8_lossy(v)),
                None => "(nil)".to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n  "),
        Output::ScanPage { cursor, keys } => {
            let mut s = format!("cursor={cursor}");
            for key in keys {
                s.push_str(&format!("\n  {}", String::from_utf8_lossy(key)));
            }
            s
        }
    }
}

fn format_error(err: &ExecError) -> String {
    err.to_string()
}

/// Parse one REPL line into a [`Command`]. Deliberately permissive: the
/// reference command set is small and this is a developer aid, not a
/// protocol parser (spec.md's wire-protocol front end is an explicit
/// non-goal of this workspace).
fn parse_command(line: &str) -> Result<Command, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let (name, args) = parts.split_first().ok_or("empty command")?;
    match name.to_ascii_uppercase().as_str() {
        "GET" => {
            let [key] = args else { return Err("usage: GET key".into()) };
            Ok(Command::Get { key: key.as_bytes().to_vec() })
        }
        "SET" => {
            let [key, value] = args else { return Err("usage: SET key value".into()) };
            Ok(Command::Set { key: key.as_bytes().to_vec(), value: value.as_bytes().to_vec() })
        }
        "GETDEL" => {
            let [key] = args else { return Err("usage: GETDEL key".into()) };
            Ok(Command::GetDel { key: key.as_bytes().to_vec() })
        }
        "DEL" => {
            let [key] = args else { return Err("usage: DEL key".into()) };
            Ok(Command::Del { key: key.as_bytes().to_vec() })
        }
        "HSET" => {
            if args.len() < 3 || args.len() % 2 == 0 {
                return Err("usage: HSET key field value [field value ...]".into());
            }
            let key = args[0].as_bytes().to_vec();
            let fields = args[1..]
                .chunks(2)
                .map(|pair| (pair[0].as_bytes().to_vec(), pair[1].as_bytes().to_vec()))
                .collect();
            Ok(Command::HSet { key, fields })
        }
        "HGET" => {
            let [key, field] = args else { return Err("usage: HGET key field".into()) };
            Ok(Command::HGet { key: key.as_bytes().to_vec(), field: field.as_bytes().to_vec() })
        }
        "HDEL" => {
            if args.len() < 2 {
                return Err("usage: HDEL key field [field ...]".into());
            }
            let key = args[0].as_bytes().to_vec();
            let fields = args[1..].iter().map(|f| f.as_bytes().to_vec()).collect();
            Ok(Command::HDel { key, fields })
        }
        "MGET" => {
            if args.is_empty() {
                return Err("usage: MGET key [key ...]".into());
            }
            Ok(Command::MGet { keys: args.iter().map(|k| k.as_bytes().to_vec()).collect() })
        }
        "SCAN" => {
            let cursor = args.first().map(|s| s.parse::<u64>()).transpose().map_err(|_| "bad cursor")?.unwrap_or(0);
            let count = match args.get(1..3) {
                Some([kw, n]) if kw.eq_ignore_ascii_case("count") => {
                    n.parse::<usize>().map_err(|_| "bad count")?
                }
                _ => 10,
            };
            Ok(Command::Scan { cursor, count })
        }
        "DEBUG" => {
            let [sub] = args else { return Err("usage: DEBUG RELOAD".into()) };
            if sub.eq_ignore_ascii_case("RELOAD") {
                Ok(Command::DebugReload)
            } else {
                Err(format!("unknown DEBUG subcommand {sub:?}"))
            }
        }
        other => Err(format!("unknown command {other:?}")),
    }
}
