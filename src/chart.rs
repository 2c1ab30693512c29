use indexmap::IndexMap;
use std::fmt;

use crate::grammar::Grammar;
use crate::symbol::SymbolId;

/// Where a cell entry's best derivation came from. Symbol references point
/// into the same cell (`Unary`) or into the two sub-spans split at `split` (`Binary`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Origin {
  /// A tag emitting the word under this cell
  Terminal,
  Unary(SymbolId),
  Binary {
    split: usize,
    left: SymbolId,
    right: SymbolId,
  },
}

/// Best derivation found so far for a symbol over a span. `score` is a log-probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivation {
  pub score: f64,
  pub origin: Origin,
}

/// Best derivation per symbol for one span. Iteration follows insertion
/// order, which keeps tie-breaking reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
  entries: IndexMap<SymbolId, Derivation>,
}

impl Cell {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn get(&self, symbol: SymbolId) -> Option<&Derivation> {
    self.entries.get(&symbol)
  }

  pub fn contains(&self, symbol: SymbolId) -> bool {
    self.entries.contains_key(&symbol)
  }

  pub fn get_index(&self, idx: usize) -> Option<(SymbolId, Derivation)> {
    self.entries.get_index(idx).map(|(s, d)| (*s, *d))
  }

  pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Derivation)> {
    self.entries.iter().map(|(s, d)| (*s, d))
  }

  /// Records `origin` for `symbol` if the symbol is new or `score` strictly
  /// beats the recorded one. Returns whether anything changed. Candidates
  /// with zero probability are dropped.
  pub fn offer(&mut self, symbol: SymbolId, score: f64, origin: Origin) -> bool {
    if score == f64::NEG_INFINITY || score.is_nan() {
      return false;
    }
    match self.entries.get_mut(&symbol) {
      Some(existing) if score > existing.score => {
        *existing = Derivation { score, origin };
        true
      }
      Some(_) => false,
      None => {
        self.entries.insert(symbol, Derivation { score, origin });
        true
      }
    }
  }
}

/// Triangular table of cells over fencepost spans `0 <= begin < end <= n`.
/// Filled one span width at a time; a row is frozen once pushed.
#[derive(Debug, Clone)]
pub struct Chart {
  words: Vec<String>,
  /// `rows[width - 1][begin]` is the cell for `begin..begin + width`
  rows: Vec<Vec<Cell>>,
}

impl Chart {
  pub fn new(words: &[&str]) -> Self {
    Self {
      words: words.iter().map(|w| w.to_string()).collect(),
      rows: Vec::with_capacity(words.len()),
    }
  }

  /// Number of words
  pub fn len(&self) -> usize {
    self.words.len()
  }

  pub fn is_empty(&self) -> bool {
    self.words.is_empty()
  }

  pub fn word(&self, position: usize) -> &str {
    &self.words[position]
  }

  pub(crate) fn push_row(&mut self, row: Vec<Cell>) {
    debug_assert_eq!(row.len(), self.len() - self.rows.len());
    self.rows.push(row);
  }

  pub fn cell(&self, begin: usize, end: usize) -> Option<&Cell> {
    if begin >= end {
      return None;
    }
    self.rows.get(end - begin - 1)?.get(begin)
  }

  /// The cell spanning the whole sentence, if it has been filled
  pub fn top(&self) -> Option<&Cell> {
    self.cell(0, self.len())
  }

  /// Display the chart with symbol names resolved through `grammar`
  pub fn display<'a>(&'a self, grammar: &'a Grammar) -> ChartDisplay<'a> {
    ChartDisplay { chart: self, grammar }
  }
}

pub struct ChartDisplay<'a> {
  chart: &'a Chart,
  grammar: &'a Grammar,
}

impl fmt::Display for ChartDisplay<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (width_idx, row) in self.chart.rows.iter().enumerate() {
      for (begin, cell) in row.iter().enumerate() {
        let end = begin + width_idx + 1;
        writeln!(
          f,
          "{}..{} {:?}:",
          begin,
          end,
          self.chart.words[begin..end].join(" ")
        )?;
        for (symbol, derivation) in cell.iter() {
          write!(f, "  {} = {:.4}", self.grammar.symbol(symbol), derivation.score)?;
          match derivation.origin {
            Origin::Terminal => writeln!(f)?,
            Origin::Unary(child) => writeln!(f, " <- {}", self.grammar.symbol(child))?,
            Origin::Binary { split, left, right } => writeln!(
              f,
              " <- {} {} @ {}",
              self.grammar.symbol(left),
              self.grammar.symbol(right),
              split
            )?,
          }
        }
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_offer_is_monotone() {
    let x = SymbolId(0);
    let mut cell = Cell::new();

    let mut history = Vec::new();
    for score in [-3.0, -5.0, -1.0, -1.0, -2.0, -0.5] {
      cell.offer(x, score, Origin::Terminal);
      history.push(cell.get(x).unwrap().score);
    }
    assert_eq!(history, vec![-3.0, -3.0, -1.0, -1.0, -1.0, -0.5]);
    assert!(history.windows(2).all(|w| w[0] <= w[1]));
  }

  #[test]
  fn test_offer_ties_keep_first() {
    let (x, a, b) = (SymbolId(0), SymbolId(1), SymbolId(2));
    let mut cell = Cell::new();
    assert!(cell.offer(x, -1.0, Origin::Unary(a)));
    assert!(!cell.offer(x, -1.0, Origin::Unary(b)));
    assert_eq!(cell.get(x).unwrap().origin, Origin::Unary(a));
  }

  #[test]
  fn test_offer_drops_impossible() {
    let mut cell = Cell::new();
    assert!(!cell.offer(SymbolId(0), f64::NEG_INFINITY, Origin::Terminal));
    assert!(cell.is_empty());
  }

  #[test]
  fn test_cell_indexing() {
    let mut chart = Chart::new(&["a", "b", "c"]);
    chart.push_row(vec![Cell::new(), Cell::new(), Cell::new()]);
    chart.push_row(vec![Cell::new(), Cell::new()]);
    assert!(chart.cell(0, 1).is_some());
    assert!(chart.cell(1, 3).is_some());
    assert!(chart.cell(2, 4).is_none());
    assert!(chart.cell(1, 1).is_none());
    assert!(chart.top().is_none());
  }
}
