use std::fs;
use std::io::Read;
use std::process::exit;

use grammar_table_generator::{ebnf, Grammar, GrammarError};

fn print_help() {
    println!("Usage: grammar-table-generator outputs [options] [grammar file]");
    println!("outputs:");
    println!("  prod: Normalized (pure BNF) productions");
    println!("  nff: Nullable, first and follow sets");
    println!("  lr1fsm: Canonical LR(1) automaton");
    println!("  lr1table: LR(1) parsing table");
    println!("  conflicts: Shift-reduce and reduce-reduce conflict report");
    println!("options:");
    println!("  -h: Print this help");
    println!("  -l: Print in LaTeX format");
    println!("  -j: Print in JSON format");
    println!("  -c: Print in CSV format (lr1table only)");
    println!("The grammar is read from stdin when no file is given.");
}

fn fail(e: GrammarError) -> ! {
    eprintln!("error: {}", e);
    exit(1);
}

fn main() {
    env_logger::init();

    let args = std::env::args().skip(1).collect::<Vec<String>>();
    let mut outputs: Vec<&str> = Vec::new();
    let mut i: usize = 0;
    while i < args.len()
        && ["prod", "nff", "lr1fsm", "lr1table", "conflicts"].contains(&args[i].as_str())
    {
        outputs.push(args[i].as_str());
        i += 1;
    }

    enum OutputFormat {
        Plain,
        LaTeX,
        Json,
        Csv,
    }
    let mut output_format = OutputFormat::Plain;

    while i < args.len() && ["-h", "--help", "-l", "-j", "-c"].contains(&args[i].as_str()) {
        if args[i] == "-h" || args[i] == "--help" {
            print_help();
            return;
        } else if args[i] == "-l" {
            output_format = OutputFormat::LaTeX;
        } else if args[i] == "-j" {
            output_format = OutputFormat::Json;
        } else if args[i] == "-c" {
            output_format = OutputFormat::Csv;
        }
        i += 1;
    }

    if i + 1 < args.len() || outputs.is_empty() {
        print_help();
        return;
    }

    if matches!(output_format, OutputFormat::Csv) && outputs.iter().any(|o| *o != "lr1table") {
        eprintln!("error: -c only applies to lr1table");
        exit(1);
    }

    let input: String = if i == args.len() {
        let mut buffer = String::new();
        match std::io::stdin().lock().read_to_string(&mut buffer) {
            Ok(_) => buffer,
            Err(e) => fail(GrammarError::Io {
                path: "<stdin>".to_string(),
                source: e,
            }),
        }
    } else {
        match fs::read_to_string(&args[i]) {
            Ok(s) => s,
            Err(e) => fail(GrammarError::Io {
                path: args[i].clone(),
                source: e,
            }),
        }
    };

    let normalized = ebnf::normalize(&input).unwrap_or_else(|e| fail(e));
    let mut grammar = Grammar::parse(&normalized).unwrap_or_else(|e| fail(e));
    if outputs.iter().any(|o| *o == "nff") {
        grammar.calculate_nullable_first_follow();
    }

    for output in outputs {
        if output == "prod" {
            let t = grammar.to_production_output_vec();
            println!(
                "{}",
                match output_format {
                    OutputFormat::LaTeX => t.to_latex(),
                    OutputFormat::Json => t.to_json(),
                    _ => t.to_plaintext(),
                }
            );
        }
        if output == "nff" {
            let t = grammar.to_non_terminal_output_vec();
            println!(
                "{}",
                match output_format {
                    OutputFormat::LaTeX => t.to_latex(),
                    OutputFormat::Json => t.to_json(),
                    _ => t.to_plaintext(),
                }
            );
        }
        if output == "lr1fsm" {
            let t = grammar
                .to_lr_automaton()
                .unwrap_or_else(|e| fail(e))
                .to_output();
            println!(
                "{}",
                match output_format {
                    OutputFormat::LaTeX => t.to_latex(),
                    OutputFormat::Json => t.to_json(),
                    _ => t.to_plaintext(),
                }
            );
        }
        if output == "lr1table" {
            let t = grammar
                .to_lr_automaton()
                .unwrap_or_else(|e| fail(e))
                .to_parsing_table();
            println!(
                "{}",
                match output_format {
                    OutputFormat::LaTeX => t.to_latex(),
                    OutputFormat::Json => t.to_json(),
                    OutputFormat::Csv => t.to_csv(),
                    OutputFormat::Plain => t.to_plaintext(),
                }
            );
        }
        if output == "conflicts" {
            let t = grammar
                .to_lr_automaton()
                .unwrap_or_else(|e| fail(e))
                .to_parsing_table();
            println!(
                "{}",
                match output_format {
                    OutputFormat::LaTeX => t.conflicts_to_latex(),
                    OutputFormat::Json => t.conflicts_to_json(),
                    _ => t.conflicts_to_plaintext(),
                }
            );
        }
    }
}
