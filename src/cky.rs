use rayon::prelude::*;

use crate::chart::{Cell, Chart, Origin};
use crate::grammar::Grammar;
use crate::lexicon::Lexicon;

/// Fatal parse failures. A sentence the grammar simply cannot derive is not an
/// error; see [`crate::Pcfg::parse`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
  /// Unary closure kept improving scores past the pass limit. The grammar has a
  /// unary cycle whose product of probabilities exceeds 1.
  #[error("unary closure over {begin}..{end} did not converge after {passes} passes")]
  UnaryClosureDiverged {
    begin: usize,
    end: usize,
    passes: usize,
  },
  #[error("backpointers for {symbol} over {begin}..{end} form a cycle")]
  CyclicBacktrace {
    symbol: String,
    begin: usize,
    end: usize,
  },
  /// A backpointer names a symbol or span the chart never recorded
  #[error("backpointer to {symbol} over {begin}..{end} has no chart entry")]
  DanglingBackpointer {
    symbol: String,
    begin: usize,
    end: usize,
  },
}

/// Fills a chart for `input` bottom-up.
///
/// Width 1 is seeded from the lexicon, then each wider span combines pairs of
/// adjacent narrower cells through the binary rules, and every cell is closed
/// under the unary rules. Cells of one width only read narrower cells, so each
/// width is computed in parallel and frozen before the next one starts.
#[tracing::instrument(skip_all, fields(words = input.len()))]
pub fn parse_chart<L>(g: &Grammar, lexicon: &L, input: &[&str]) -> Result<Chart, ParseError>
where
  L: Lexicon + ?Sized,
{
  let n = input.len();
  let mut chart = Chart::new(input);
  if n == 0 {
    return Ok(chart);
  }

  let seeded = input
    .par_iter()
    .enumerate()
    .map(|(position, word)| seed_cell(g, lexicon, position, word))
    .collect::<Result<Vec<_>, _>>()?;
  chart.push_row(seeded);

  for width in 2..=n {
    let row = (0..=n - width)
      .into_par_iter()
      .map(|begin| fill_cell(g, &chart, begin, begin + width))
      .collect::<Result<Vec<_>, _>>()?;
    tracing::trace!(
      width,
      entries = row.iter().map(Cell::len).sum::<usize>(),
      "filled span width"
    );
    chart.push_row(row);
  }

  Ok(chart)
}

/// Every tag with a nonzero emission score for `word`, then unary closure
fn seed_cell<L>(g: &Grammar, lexicon: &L, position: usize, word: &str) -> Result<Cell, ParseError>
where
  L: Lexicon + ?Sized,
{
  let mut cell = Cell::new();
  for &tag in lexicon.tags() {
    let score = lexicon.score_tagging(word, tag);
    if score > 0.0 {
      cell.offer(tag, score.ln(), Origin::Terminal);
    }
  }
  if cell.is_empty() {
    tracing::debug!(position, word, "no tag can emit word");
  }
  close_unaries(g, &mut cell, position, position + 1)?;
  Ok(cell)
}

/// Best binary combinations over every split of `begin..end`, then unary closure.
///
/// Of equally scored candidates the first one offered wins. Splits ascend, so
/// the lowest split wins a tie. Within a split, left-cell entries are visited
/// in their insertion order, and only then rules in declaration order.
fn fill_cell(g: &Grammar, chart: &Chart, begin: usize, end: usize) -> Result<Cell, ParseError> {
  let mut cell = Cell::new();
  for split in begin + 1..end {
    let (left_cell, right_cell) = match (chart.cell(begin, split), chart.cell(split, end)) {
      (Some(l), Some(r)) => (l, r),
      _ => unreachable!("narrower cells are filled before {}..{}", begin, end),
    };
    if left_cell.is_empty() || right_cell.is_empty() {
      continue;
    }

    for (left, left_derivation) in left_cell.iter() {
      for rule in g.binary_rules_by_left_child(left) {
        if let Some(right_derivation) = right_cell.get(rule.right) {
          let score = rule.log_score() + left_derivation.score + right_derivation.score;
          cell.offer(
            rule.parent,
            score,
            Origin::Binary {
              split,
              left,
              right: rule.right,
            },
          );
        }
      }
    }
  }
  close_unaries(g, &mut cell, begin, end)?;
  Ok(cell)
}

/// Applies unary rules until no entry of `cell` improves.
///
/// Children are visited in the cell's insertion order, then their rules in
/// declaration order, and a tie keeps the first derivation. Insertion order
/// wins over declaration order: for `S -> X` and `S -> Y` with equal scores,
/// `S` comes from whichever of `X` and `Y` entered the cell first. At width 1
/// that is the lexicon's tag order.
///
/// This reaches a fixed point whenever no unary cycle has probability above 1.
/// A grammar that violates that keeps improving forever, so the number of
/// passes is capped at the longest possible improving chain.
pub(crate) fn close_unaries(
  g: &Grammar,
  cell: &mut Cell,
  begin: usize,
  end: usize,
) -> Result<(), ParseError> {
  let max_passes = g.symbols().len() + 2;
  for _ in 0..max_passes {
    let mut changed = false;
    // entries appended during the pass are visited in the same pass
    let mut idx = 0;
    while let Some((child, derivation)) = cell.get_index(idx) {
      idx += 1;
      for rule in g.unary_rules_by_child(child) {
        if cell.offer(
          rule.parent,
          rule.log_score() + derivation.score,
          Origin::Unary(child),
        ) {
          changed = true;
        }
      }
    }
    if !changed {
      return Ok(());
    }
  }

  tracing::warn!(begin, end, max_passes, "unary closure diverged");
  Err(ParseError::UnaryClosureDiverged {
    begin,
    end,
    passes: max_passes,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::{GrammarBuilder, Normalization};
  use crate::lexicon::TagLexicon;
  use crate::symbol::{Symbol, SymbolId};

  fn sym(s: &str) -> Symbol {
    Symbol::original(s)
  }

  /// S -> NP VP, NP -> Det N, VP -> V, plus an ambiguous VP -> VP NP
  fn toy() -> (Grammar, TagLexicon) {
    let mut b = GrammarBuilder::default();
    b.set_start(sym("S"));
    b.add_rule(sym("S"), vec![sym("NP"), sym("VP")], 1.0).unwrap();
    b.add_rule(sym("NP"), vec![sym("Det"), sym("N")], 0.8).unwrap();
    b.add_rule(sym("NP"), vec![sym("N")], 0.2).unwrap();
    b.add_rule(sym("VP"), vec![sym("V")], 0.6).unwrap();
    b.add_rule(sym("VP"), vec![sym("V"), sym("NP")], 0.4).unwrap();
    let det = b.intern(sym("Det"));
    let n = b.intern(sym("N"));
    let v = b.intern(sym("V"));
    let g = b.build(Normalization::SyntheticOnly).unwrap();

    let mut lex = TagLexicon::new();
    lex.insert(det, "the", 1.0);
    lex.insert(n, "dog", 0.5);
    lex.insert(n, "bones", 0.3);
    lex.insert(v, "barks", 0.5);
    lex.insert(n, "barks", 0.2);
    lex.insert(v, "eats", 0.5);
    (g, lex)
  }

  fn id(g: &Grammar, s: &str) -> SymbolId {
    g.id(&sym(s)).unwrap()
  }

  #[test]
  fn test_seed_and_unaries() {
    let (g, lex) = toy();
    let chart = parse_chart(&g, &lex, &["barks"]).unwrap();
    let cell = chart.cell(0, 1).unwrap();

    // V and N from the lexicon, VP and NP through unary rules
    assert_eq!(cell.len(), 4);
    let vp = cell.get(id(&g, "VP")).unwrap();
    assert!((vp.score - (0.6f64 * 0.5).ln()).abs() < 1e-12);
    assert_eq!(vp.origin, Origin::Unary(id(&g, "V")));
    assert!(!cell.contains(id(&g, "S")));
  }

  #[test]
  fn test_viterbi_picks_best_split() {
    let (g, lex) = toy();
    let chart = parse_chart(&g, &lex, &["the", "dog", "eats", "bones"]).unwrap();
    let top = chart.top().unwrap();
    let s = top.get(id(&g, "S")).unwrap();

    // NP(the dog) = .8 * 1 * .5, VP(eats bones) = .4 * .5 * (.2 * .3)
    let expected = (1.0f64 * (0.8 * 0.5) * (0.4 * 0.5 * (0.2 * 0.3))).ln();
    assert!((s.score - expected).abs() < 1e-12);
    assert_eq!(
      s.origin,
      Origin::Binary {
        split: 2,
        left: id(&g, "NP"),
        right: id(&g, "VP")
      }
    );
  }

  #[test]
  fn test_empty_input() {
    let (g, lex) = toy();
    let chart = parse_chart(&g, &lex, &[]).unwrap();
    assert!(chart.is_empty());
    assert!(chart.top().is_none());
  }

  #[test]
  fn test_unknown_word_leaves_empty_cell() {
    let (g, lex) = toy();
    let chart = parse_chart(&g, &lex, &["the", "axolotl", "barks"]).unwrap();
    assert!(chart.cell(1, 2).unwrap().is_empty());
    assert!(chart.top().unwrap().is_empty());
  }

  #[test]
  fn test_closure_idempotent() {
    let (g, lex) = toy();
    let chart = parse_chart(&g, &lex, &["the", "dog", "barks"]).unwrap();
    for (begin, end) in [(0, 1), (1, 2), (2, 3), (0, 2), (1, 3), (0, 3)] {
      let closed = chart.cell(begin, end).unwrap().clone();
      let mut again = closed.clone();
      close_unaries(&g, &mut again, begin, end).unwrap();
      assert_eq!(again, closed);
    }
  }

  #[test]
  fn test_unary_self_loop_terminates() {
    let mut b = GrammarBuilder::default();
    b.set_start(sym("S"));
    b.add_rule(sym("S"), vec![sym("S")], 1.0).unwrap();
    b.add_rule(sym("S"), vec![sym("X")], 0.5).unwrap();
    b.add_rule(sym("X"), vec![sym("S")], 0.5).unwrap();
    let x = b.intern(sym("X"));
    let g = b.build(Normalization::SyntheticOnly).unwrap();
    let mut lex = TagLexicon::new();
    lex.insert(x, "x", 1.0);

    let chart = parse_chart(&g, &lex, &["x"]).unwrap();
    let s = chart.top().unwrap().get(id(&g, "S")).unwrap();
    assert!((s.score - 0.5f64.ln()).abs() < 1e-12);
  }

  #[test]
  fn test_divergent_unary_cycle() {
    let mut b = GrammarBuilder::default();
    b.set_start(sym("S"));
    b.add_rule(sym("S"), vec![sym("X")], 2.0).unwrap();
    b.add_rule(sym("X"), vec![sym("S")], 1.0).unwrap();
    let x = b.intern(sym("X"));
    let g = b.build(Normalization::SyntheticOnly).unwrap();
    let mut lex = TagLexicon::new();
    lex.insert(x, "x", 1.0);

    match parse_chart(&g, &lex, &["x"]) {
      Err(ParseError::UnaryClosureDiverged { begin: 0, end: 1, .. }) => {}
      other => panic!("expected divergence, got {:?}", other),
    }
  }

  fn text_grammar(src: &str) -> crate::Pcfg {
    src.parse().unwrap()
  }

  #[test]
  fn test_binary_tie_takes_lowest_split() {
    let pcfg = text_grammar("S -> A A : 1; A -> A A : 1; A -> \"a\" : 1;");
    let g = &pcfg.grammar;
    let chart = parse_chart(g, &pcfg.lexicon, &["a", "a", "a"]).unwrap();
    let a = id(g, "A");

    // both splits score 0
    assert_eq!(
      chart.top().unwrap().get(id(g, "S")).unwrap().origin,
      Origin::Binary {
        split: 1,
        left: a,
        right: a
      }
    );
    let parse = pcfg.parse(&["a", "a", "a"]).unwrap().unwrap();
    assert_eq!(parse.tree.to_string(), "(S (A a) (A (A a) (A a)))");
  }

  #[test]
  fn test_unary_tie_follows_cell_order() {
    // S -> X is declared first, but Y is the lexicon's first tag
    let pcfg = text_grammar("S -> X : 0.5; S -> Y : 0.5; Y -> \"w\"; X -> \"w\";");
    let chart = pcfg.parse_chart(&["w"]).unwrap();
    let s = chart.top().unwrap().get(id(&pcfg.grammar, "S")).unwrap();
    assert_eq!(s.origin, Origin::Unary(id(&pcfg.grammar, "Y")));
    let parse = pcfg.parse(&["w"]).unwrap().unwrap();
    assert_eq!(parse.tree.to_string(), "(S (Y w))");

    let pcfg = text_grammar("S -> X : 0.5; S -> Y : 0.5; X -> \"w\"; Y -> \"w\";");
    let parse = pcfg.parse(&["w"]).unwrap().unwrap();
    assert_eq!(parse.tree.to_string(), "(S (X w))");
  }

  #[test]
  fn test_unary_tie_keeps_first_offered() {
    let pcfg = text_grammar("S -> T : 1; S -> X : 0.5; T -> X : 0.5; X -> \"w\";");
    let parse = pcfg.parse(&["w"]).unwrap().unwrap();
    // S -> X and S -> T -> X both score 0.5; S is first offered through X
    assert_eq!(parse.tree.to_string(), "(S (X w))");
  }

  #[test]
  fn test_deterministic() {
    let (g, lex) = toy();
    let input = ["the", "dog", "eats", "the", "bones"];
    let first = parse_chart(&g, &lex, &input).unwrap();
    for _ in 0..5 {
      let again = parse_chart(&g, &lex, &input).unwrap();
      for width in 1..=input.len() {
        for begin in 0..=input.len() - width {
          assert_eq!(
            again.cell(begin, begin + width),
            first.cell(begin, begin + width)
          );
        }
      }
    }
  }
}
