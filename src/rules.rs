use std::fmt;

use crate::symbol::{SymbolId, SymbolTable};

/// `parent -> child`
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryRule {
  pub parent: SymbolId,
  pub child: SymbolId,
  pub score: f64,
  log_score: f64,
}

impl UnaryRule {
  pub fn new(parent: SymbolId, child: SymbolId, score: f64) -> Self {
    Self {
      parent,
      child,
      score,
      log_score: score.ln(),
    }
  }

  pub fn log_score(&self) -> f64 {
    self.log_score
  }
}

/// `parent -> left right`
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryRule {
  pub parent: SymbolId,
  pub left: SymbolId,
  pub right: SymbolId,
  pub score: f64,
  log_score: f64,
}

impl BinaryRule {
  pub fn new(parent: SymbolId, left: SymbolId, right: SymbolId, score: f64) -> Self {
    Self {
      parent,
      left,
      right,
      score,
      log_score: score.ln(),
    }
  }

  pub fn log_score(&self) -> f64 {
    self.log_score
  }
}

/// `tag -> "word"`. The word is not a chart symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalRule {
  pub tag: SymbolId,
  pub word: String,
  pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
  Unary(UnaryRule),
  Binary(BinaryRule),
  Terminal(TerminalRule),
}

impl Rule {
  pub fn parent(&self) -> SymbolId {
    match self {
      Self::Unary(r) => r.parent,
      Self::Binary(r) => r.parent,
      Self::Terminal(r) => r.tag,
    }
  }

  pub fn score(&self) -> f64 {
    match self {
      Self::Unary(r) => r.score,
      Self::Binary(r) => r.score,
      Self::Terminal(r) => r.score,
    }
  }

  /// Display a rule with symbol names resolved
  pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> RuleDisplay<'a> {
    RuleDisplay { rule: self, symbols }
  }
}

pub struct RuleDisplay<'a> {
  rule: &'a Rule,
  symbols: &'a SymbolTable,
}

impl fmt::Display for RuleDisplay<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = |id| self.symbols.resolve(id);
    match self.rule {
      Rule::Unary(r) => write!(f, "{} -> {}", name(r.parent), name(r.child))?,
      Rule::Binary(r) => write!(
        f,
        "{} -> {} {}",
        name(r.parent),
        name(r.left),
        name(r.right)
      )?,
      Rule::Terminal(r) => write!(f, "{} -> {:?}", name(r.tag), r.word)?,
    }
    write!(f, " : {}", self.rule.score())
  }
}

#[test]
fn test_rule_display() {
  use crate::symbol::Symbol;

  let mut symbols = SymbolTable::new();
  let s = symbols.intern(Symbol::original("S"));
  let np = symbols.intern(Symbol::original("NP"));
  let vp = symbols.intern(Symbol::original("VP"));

  let binary = Rule::Binary(BinaryRule::new(s, np, vp, 0.5));
  assert_eq!(binary.display(&symbols).to_string(), "S -> NP VP : 0.5");

  let unary = Rule::Unary(UnaryRule::new(s, vp, 1.0));
  assert_eq!(unary.display(&symbols).to_string(), "S -> VP : 1");
  assert_eq!(unary.parent(), s);

  let terminal = Rule::Terminal(TerminalRule {
    tag: np,
    word: "it".to_string(),
    score: 0.25,
  });
  assert_eq!(terminal.display(&symbols).to_string(), "NP -> \"it\" : 0.25");
}
