#[macro_use]
extern crate lazy_static;

#[macro_use]
pub mod utils;

pub mod backtrace;
pub mod chart;
pub mod cky;
pub mod grammar;
pub mod lexicon;
pub mod parse_grammar;
pub mod rules;
pub mod symbol;
pub mod syntree;
pub mod transform;

use rayon::prelude::*;
use std::fmt;

pub use crate::chart::Chart;
pub use crate::cky::ParseError;
pub use crate::grammar::Grammar;
pub use crate::lexicon::{Lexicon, TagLexicon};
pub use crate::symbol::{Symbol, SymbolTable};
pub use crate::syntree::{read_treebank, SynTree};
pub use crate::transform::{annotate, unannotate, AnnotationConfig};
pub use crate::utils::Err;

/// A grammar and lexicon over one symbol table, ready to parse.
#[derive(Debug)]
pub struct Pcfg<L = TagLexicon> {
  pub grammar: Grammar,
  pub lexicon: L,
  /// Markovization the grammar's symbols were trained with
  pub annotation: AnnotationConfig,
}

/// The best parse of a sentence
#[derive(Debug, Clone, PartialEq)]
pub struct Parse {
  /// Un-annotated tree in the treebank's own labels
  pub tree: SynTree<String, String>,
  /// Log-probability of the derivation
  pub score: f64,
}

impl Parse {
  pub fn probability(&self) -> f64 {
    self.score.exp()
  }
}

impl<L: Lexicon> Pcfg<L> {
  pub fn new(grammar: Grammar, lexicon: L) -> Self {
    Self {
      grammar,
      lexicon,
      annotation: AnnotationConfig::default(),
    }
  }

  pub fn parse_chart(&self, input: &[&str]) -> Result<Chart, ParseError> {
    cky::parse_chart(&self.grammar, &self.lexicon, input)
  }

  /// Most probable tree for `input`, or `Ok(None)` if the start symbol cannot
  /// cover the whole sentence. Errors only for grammars that break the
  /// engine's preconditions.
  #[tracing::instrument(skip_all, fields(words = input.len()))]
  pub fn parse(&self, input: &[&str]) -> Result<Option<Parse>, ParseError> {
    let chart = self.parse_chart(input)?;
    self.best_parse(&chart)
  }

  /// The best parse recorded in an already filled `chart`
  pub fn best_parse(&self, chart: &Chart) -> Result<Option<Parse>, ParseError> {
    let start = self.grammar.start();
    let score = match chart.top().and_then(|top| top.get(start)) {
      Some(derivation) => derivation.score,
      None => {
        tracing::debug!("no parse");
        return Ok(None);
      }
    };

    let derivation = backtrace::build_tree(&self.grammar, chart, start)?;
    Ok(derivation.map(|tree| Parse {
      tree: unannotate(&tree),
      score,
    }))
  }

  /// Parses independent sentences in parallel. Results follow input order.
  pub fn parse_batch<W>(&self, sentences: &[Vec<W>]) -> Vec<Result<Option<Parse>, ParseError>>
  where
    W: AsRef<str> + Sync,
  {
    sentences
      .par_iter()
      .map(|sentence| {
        let words = sentence.iter().map(AsRef::as_ref).collect::<Vec<&str>>();
        self.parse(&words)
      })
      .collect()
  }
}

impl Pcfg<TagLexicon> {
  /// Annotates `trees` under `config` and estimates a grammar and lexicon from them
  #[tracing::instrument(skip_all, fields(trees = trees.len()))]
  pub fn train(trees: &[SynTree<String, String>], config: AnnotationConfig) -> Result<Self, Err> {
    let annotated = trees
      .iter()
      .map(|t| annotate(t, &config))
      .collect::<Vec<_>>();

    let mut symbols = SymbolTable::new();
    let lexicon = TagLexicon::from_trees(&annotated, &mut symbols)?;
    let grammar = Grammar::from_trees(&annotated, symbols)?;

    Ok(Self {
      grammar,
      lexicon,
      annotation: config,
    })
  }
}

/// The grammar followed by the lexicon, one `;`-terminated rule per line.
///
/// This is a dump of the binarized grammar, not a loadable file in general:
/// rules headed by synthetic `@` symbols are printed as they are, and the
/// grammar reader rejects those symbols. Only grammars without flat rules
/// read back to themselves.
impl fmt::Display for Pcfg<TagLexicon> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.grammar)?;
    for rule in self.lexicon.rules() {
      writeln!(f, "{};", rules::Rule::Terminal(rule).display(self.grammar.symbols()))?;
    }
    Ok(())
  }
}
