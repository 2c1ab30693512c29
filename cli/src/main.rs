use std::fs;
use std::io;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use pcfg_cky::{read_treebank, AnnotationConfig, Err, Pcfg};
use tracing_subscriber::EnvFilter;

/// Viterbi CKY parsing with a probabilistic context-free grammar.
///
/// Reads one whitespace-tokenized sentence per line from stdin and prints the
/// most probable tree with its log-probability.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
  /// Grammar file of `A -> B C : p;` rules
  #[arg(short, long, required_unless_present = "treebank", conflicts_with = "treebank")]
  grammar: Option<PathBuf>,

  /// Treebank of bracketed trees to estimate a grammar from
  #[arg(short, long)]
  treebank: Option<PathBuf>,

  /// Horizontal Markov order when training (unbounded if omitted)
  #[arg(short = 'H', long, requires = "treebank")]
  horizontal: Option<usize>,

  /// Vertical Markov order when training
  #[arg(short = 'v', long, default_value_t = 0, requires = "treebank")]
  vertical: usize,

  /// Print the parse chart
  #[arg(short, long)]
  chart: bool,

  /// Print the loaded grammar and lexicon before reading sentences
  #[arg(short, long)]
  print_grammar: bool,
}

fn load(args: &Args) -> Result<Pcfg, Err> {
  if let Some(path) = &args.grammar {
    return fs::read_to_string(path)?.parse();
  }

  let path = args.treebank.as_ref().ok_or("either --grammar or --treebank is required")?;
  let trees = read_treebank(&fs::read_to_string(path)?)?;
  tracing::info!(trees = trees.len(), "read treebank");
  Pcfg::train(&trees, AnnotationConfig::new(args.horizontal, args.vertical))
}

fn parse(pcfg: &Pcfg, sentence: &str, print_chart: bool) -> Result<(), Err> {
  let sentence = sentence.split_whitespace().collect::<Vec<_>>();

  for &word in sentence.iter().filter(|w| !pcfg.lexicon.knows(w)) {
    tracing::debug!(word, "unknown word");
  }

  let chart = pcfg.parse_chart(&sentence)?;
  if print_chart {
    println!("chart:\n{}", chart.display(&pcfg.grammar));
  }

  match pcfg.best_parse(&chart)? {
    Some(parse) => println!("{} {:.6}", parse.tree, parse.score),
    None => println!("(no parse)"),
  }

  Ok(())
}

fn main() -> Result<(), Err> {
  let args = Args::parse();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  tracing::trace!("CLI args = {:?}", args);

  let pcfg = load(&args)?;
  tracing::debug!(symbols = pcfg.grammar.symbols().len(), "grammar ready");
  if args.print_grammar {
    println!("{}", pcfg);
  }

  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    input.clear();
    if io::stdin().read_line(&mut input)? == 0 {
      // ctrl+d
      return Ok(());
    }
    let line = input.trim();
    if line.is_empty() {
      continue;
    }
    parse(&pcfg, line, args.chart)?;
  }
}
