use std::env;
use std::fs;
use std::path::Path;
use std::process;
use std::time::Instant;

use contextspell::SpellCorrector;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let (model_path, text_path) = match (args.get(1), args.get(2)) {
        (Some(m), Some(t)) => (m.clone(), t.clone()),
        _ => {
            eprintln!("usage: contextspell-evaluate <model> <text-file>");
            process::exit(1);
        }
    };

    let text = match fs::read_to_string(&text_path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("[ERROR] could not read '{text_path}': {e}");
            process::exit(1);
        }
    };

    let load_start = Instant::now();
    let mut corrector = SpellCorrector::new();
    if let Err(e) = corrector.load_lang_model(Path::new(&model_path)) {
        eprintln!("[ERROR] could not load model '{model_path}': {e}");
        process::exit(1);
    }
    eprintln!("Model loaded in {:?}", load_start.elapsed());

    let word_count = text.split_whitespace().count();
    let start = Instant::now();
    let corrected = corrector.fix_fragment_normalized(&text);
    let elapsed = start.elapsed();

    println!("{corrected}");
    eprintln!("Corrected {} words in {:?}", word_count, elapsed);
    eprintln!(
        "Words per second: {:.0}",
        word_count as f64 / elapsed.as_secs_f64()
    );
}
