use crate::chart::{Chart, Origin};
use crate::cky::ParseError;
use crate::grammar::Grammar;
use crate::symbol::{Symbol, SymbolId};
use crate::syntree::{Constituent, SynTree, Word};

/// Materializes the best derivation of `symbol` over the whole sentence by
/// following backpointers. Returns `Ok(None)` if the top cell lacks `symbol`.
/// The tree is still annotated; see `transform::unannotate`.
pub fn build_tree(
  g: &Grammar,
  chart: &Chart,
  symbol: SymbolId,
) -> Result<Option<SynTree<Symbol, String>>, ParseError> {
  match chart.top() {
    Some(top) if top.contains(symbol) => build(g, chart, symbol, 0, chart.len(), 0).map(Some),
    _ => Ok(None),
  }
}

/// `unary_depth` counts the unary steps taken inside the current cell. A chain
/// longer than the cell has entries must revisit one of them.
fn build(
  g: &Grammar,
  chart: &Chart,
  symbol: SymbolId,
  begin: usize,
  end: usize,
  unary_depth: usize,
) -> Result<SynTree<Symbol, String>, ParseError> {
  let dangling = || ParseError::DanglingBackpointer {
    symbol: g.symbol(symbol).to_string(),
    begin,
    end,
  };
  let cell = chart.cell(begin, end).ok_or_else(dangling)?;
  let derivation = cell.get(symbol).ok_or_else(dangling)?;

  let constituent = Constituent {
    value: g.symbol(symbol).clone(),
    span: (begin, end),
  };

  let children = match derivation.origin {
    Origin::Terminal => vec![SynTree::Leaf(Word {
      value: chart.word(begin).to_string(),
      span: (begin, end),
    })],
    Origin::Unary(child) => {
      if unary_depth >= cell.len() {
        return Err(ParseError::CyclicBacktrace {
          symbol: g.symbol(symbol).to_string(),
          begin,
          end,
        });
      }
      vec![build(g, chart, child, begin, end, unary_depth + 1)?]
    }
    Origin::Binary { split, left, right } => vec![
      build(g, chart, left, begin, split, 0)?,
      build(g, chart, right, split, end, 0)?,
    ],
  };

  Ok(SynTree::Branch(constituent, children))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::chart::Cell;
  use crate::cky::parse_chart;
  use crate::grammar::{GrammarBuilder, Normalization};
  use crate::lexicon::TagLexicon;

  fn sym(s: &str) -> Symbol {
    Symbol::original(s)
  }

  #[test]
  fn test_build_tree() {
    let mut b = GrammarBuilder::default();
    let s = b.set_start(sym("S"));
    b.add_rule(sym("S"), vec![sym("NP"), sym("VP")], 1.0).unwrap();
    b.add_rule(sym("NP"), vec![sym("N")], 1.0).unwrap();
    b.add_rule(sym("VP"), vec![sym("V")], 1.0).unwrap();
    let n = b.intern(sym("N"));
    let v = b.intern(sym("V"));
    let g = b.build(Normalization::SyntheticOnly).unwrap();
    let mut lex = TagLexicon::new();
    lex.insert(n, "dogs", 1.0);
    lex.insert(v, "bark", 1.0);

    let chart = parse_chart(&g, &lex, &["dogs", "bark"]).unwrap();
    let tree = build_tree(&g, &chart, s).unwrap().unwrap();
    assert_eq!(tree.to_string(), "(S (NP (N dogs)) (VP (V bark)))");
    assert_eq!(tree.span(), (0, 2));
    let (_, children) = tree.get_branch().unwrap();
    assert_eq!(children[1].span(), (1, 2));

    // a symbol missing from the top cell is no parse
    assert_eq!(build_tree(&g, &chart, n).unwrap(), None);
  }

  #[test]
  fn test_cyclic_backpointers() {
    let mut b = GrammarBuilder::default();
    let s = b.set_start(sym("S"));
    let x = b.intern(sym("X"));
    let g = b.build(Normalization::SyntheticOnly).unwrap();

    let mut cell = Cell::new();
    cell.offer(s, 0.0, Origin::Unary(x));
    cell.offer(x, 0.0, Origin::Unary(s));
    let mut chart = Chart::new(&["x"]);
    chart.push_row(vec![cell]);

    assert!(matches!(
      build_tree(&g, &chart, s),
      Err(ParseError::CyclicBacktrace { .. })
    ));
  }

  #[test]
  fn test_dangling_backpointers() {
    let mut b = GrammarBuilder::default();
    let s = b.set_start(sym("S"));
    let x = b.intern(sym("X"));
    let g = b.build(Normalization::SyntheticOnly).unwrap();

    // X was never recorded in the cell
    let mut cell = Cell::new();
    cell.offer(s, 0.0, Origin::Unary(x));
    let mut chart = Chart::new(&["x"]);
    chart.push_row(vec![cell]);
    assert_eq!(
      build_tree(&g, &chart, s),
      Err(ParseError::DanglingBackpointer {
        symbol: "X".to_string(),
        begin: 0,
        end: 1
      })
    );

    // the split points past the sentence
    let mut cell = Cell::new();
    cell.offer(s, 0.0, Origin::Binary { split: 2, left: x, right: x });
    let mut chart = Chart::new(&["x"]);
    chart.push_row(vec![cell]);
    assert!(matches!(
      build_tree(&g, &chart, s),
      Err(ParseError::DanglingBackpointer { .. })
    ));
  }
}
