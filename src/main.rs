use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::Parser;

use cairn::{eval, eval_to_string, Runtime};

#[derive(Parser)]
#[command(name = "cairn", version, about = "The cairn stack language")]
struct Cli {
    /// Script file to run; omit for a REPL.
    script: Option<String>,

    /// Evaluate a snippet and exit.
    #[arg(short = 'e', long = "eval", value_name = "CODE")]
    eval: Option<String>,

    /// Print the token stream instead of evaluating.
    #[arg(long)]
    tokens: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut rt = Runtime::new();

    if let Some(code) = cli.eval {
        return run_source(&mut rt, &code, cli.tokens);
    }
    if let Some(path) = cli.script {
        let source = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error reading {path}: {e}");
                return ExitCode::FAILURE;
            }
        };
        return run_source(&mut rt, &source, cli.tokens);
    }
    repl(&mut rt)
}

fn run_source(rt: &mut Runtime, source: &str, tokens: bool) -> ExitCode {
    if tokens {
        match cairn::parser::tokenize(source, rt) {
            Ok(toks) => {
                for t in toks {
                    println!("{t:?}");
                }
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }
    match eval(rt, source) {
        Ok(items) => {
            if !items.is_empty() {
                let parts: Vec<String> = items.iter().map(|o| o.repr(rt.symbols())).collect();
                println!("{}", parts.join(" "));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn repl(rt: &mut Runtime) -> ExitCode {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        print!("cairn> ");
        if stdout.flush().is_err() {
            return ExitCode::FAILURE;
        }
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // Errors do not end the session.
        match eval_to_string(rt, line) {
            Ok(out) => {
                if !out.is_empty() {
                    println!("{out}");
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }
}
