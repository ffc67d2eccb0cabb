//! The cairn shell: a line-oriented prompt over the engine.

use cairn_common::EngineConfig;
use cairn_engine::{Engine, Outcome};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let data_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./data".to_string());
    let config = EngineConfig::with_data_dir(data_dir);
    let mut engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("cairn: {e}");
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        print!("cairn> ");
        stdout.flush().ok();

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("cairn: {e}");
                return ExitCode::FAILURE;
            }
        }

        match engine.execute_line(&line) {
            Ok(None) => {}
            Ok(Some(Outcome::Message(message))) => {
                if !message.is_empty() {
                    println!("{message}");
                }
            }
            Ok(Some(Outcome::Quit)) => break,
            Err(e) => println!("{e}"),
        }
    }
    ExitCode::SUCCESS
}
