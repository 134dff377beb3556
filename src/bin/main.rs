use std::env;
use std::io::{stdin, stdout, Write};
use std::path::Path;
use std::process;

use contextspell::{SpellCorrector, VERSION};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("train") if args.len() == 5 => train(&args[2], &args[3], &args[4]),
        Some("fix") if args.len() == 3 => fix_repl(&args[2]),
        Some("report") if args.len() >= 4 => report(&args[2], &args[3..].join(" ")),
        _ => {
            eprintln!("contextspell v{VERSION}");
            eprintln!("usage:");
            eprintln!("  contextspell train <corpus.txt> <alphabet.txt> <model-out>");
            eprintln!("  contextspell fix <model>");
            eprintln!("  contextspell report <model> <text...>");
            process::exit(1);
        }
    }
}

fn train(corpus: &str, alphabet: &str, model_out: &str) {
    let mut corrector = SpellCorrector::new();
    if let Err(e) = corrector.train_lang_model(
        Path::new(corpus),
        Path::new(alphabet),
        Path::new(model_out),
    ) {
        eprintln!("[ERROR] training failed: {e}");
        process::exit(1);
    }
    println!("Model written to '{model_out}'");
}

fn fix_repl(model: &str) {
    let corrector = load(model);

    println!("contextspell v{VERSION}. Type a line to correct it, 'exit' to quit.");
    loop {
        print!("> ");
        if stdout().flush().is_err() {
            break;
        }
        let mut line = String::new();
        match stdin().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim_end_matches(['\n', '\r']);
        if line == "exit" {
            break;
        }
        println!("{}", corrector.fix_fragment(line));
    }
}

fn report(model: &str, text: &str) {
    let corrector = load(model);
    match corrector.misspelling_report_json(text) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("[ERROR] report failed: {e}");
            process::exit(1);
        }
    }
}

fn load(model: &str) -> SpellCorrector {
    let mut corrector = SpellCorrector::new();
    if let Err(e) = corrector.load_lang_model(Path::new(model)) {
        eprintln!("[ERROR] could not load model '{model}': {e}");
        process::exit(1);
    }
    corrector
}
