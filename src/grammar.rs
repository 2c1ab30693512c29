use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

use crate::rules::{BinaryRule, Rule, UnaryRule};
use crate::symbol::{Intermediate, Symbol, SymbolId, SymbolTable};
use crate::syntree::SynTree;
use crate::Err;

/// Unary and binary rules of a PCFG, indexed by child for bottom-up lookup.
/// Lexical rules live in a [`crate::lexicon::Lexicon`] that shares this grammar's symbol ids.
#[derive(Debug)]
pub struct Grammar {
  start: SymbolId,
  symbols: SymbolTable,
  rules: Vec<Rule>,
  binary_by_left: HashMap<SymbolId, Vec<BinaryRule>>,
  unary_by_child: HashMap<SymbolId, Vec<UnaryRule>>,
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "//** start: {}", self.symbols.resolve(self.start))?;
    writeln!(f, "//** symbols: {}", self.symbols.len())?;
    for rule in self.rules.iter() {
      writeln!(f, "{};", rule.display(&self.symbols))?;
    }
    Ok(())
  }
}

impl Grammar {
  pub fn start(&self) -> SymbolId {
    self.start
  }

  pub fn symbols(&self) -> &SymbolTable {
    &self.symbols
  }

  pub fn symbol(&self, id: SymbolId) -> &Symbol {
    self.symbols.resolve(id)
  }

  pub fn id(&self, symbol: &Symbol) -> Option<SymbolId> {
    self.symbols.get(symbol)
  }

  /// Binary rules `? -> left ?`, in declaration order
  pub fn binary_rules_by_left_child(&self, left: SymbolId) -> &[BinaryRule] {
    self.binary_by_left.get(&left).map_or(&[], Vec::as_slice)
  }

  /// Unary rules `? -> child`, in declaration order
  pub fn unary_rules_by_child(&self, child: SymbolId) -> &[UnaryRule] {
    self.unary_by_child.get(&child).map_or(&[], Vec::as_slice)
  }

  /// All unary and binary rules in declaration order
  pub fn rules(&self) -> impl Iterator<Item = &Rule> {
    self.rules.iter()
  }

  /// Relative-frequency estimate of the phrasal rules of annotated trees.
  /// Preterminals are skipped; they belong to the lexicon. The root label of
  /// the first tree is the start symbol, and every tree must share it.
  pub fn from_trees(trees: &[SynTree<Symbol, String>], symbols: SymbolTable) -> Result<Self, Err> {
    let mut builder = GrammarBuilder::new(symbols);
    for (idx, tree) in trees.iter().enumerate() {
      let (root, _) = tree
        .get_branch()
        .ok_or_else(|| format!("tree {} is a bare word", idx + 1))?;
      let root = builder.intern(root.value.clone());
      match builder.start {
        None => builder.start = Some(root),
        Some(start) if start != root => {
          return Err(
            format!(
              "tree {} is rooted in {}, expected {}",
              idx + 1,
              builder.symbols.resolve(root),
              builder.symbols.resolve(start)
            )
            .into(),
          );
        }
        Some(_) => {}
      }
      count_rules(tree, &mut builder)?;
    }
    builder.build(Normalization::ByParent)
  }
}

fn count_rules(tree: &SynTree<Symbol, String>, builder: &mut GrammarBuilder) -> Result<(), Err> {
  let (cons, children) = match tree.get_branch() {
    Some(branch) if !tree.is_preterminal() => branch,
    _ => return Ok(()),
  };
  let child_symbols = children
    .iter()
    .map(|c| match c {
      SynTree::Branch(cc, _) => Ok(cc.value.clone()),
      SynTree::Leaf(w) => Err(format!("word {:?} directly under phrase {}", w.value, cons.value)),
    })
    .collect::<Result<Vec<_>, _>>()?;
  builder.add_rule(cons.value.clone(), child_symbols, 1.0)?;
  for child in children.iter() {
    count_rules(child, builder)?;
  }
  Ok(())
}

/// How accumulated rule mass becomes a score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
  /// Every rule is divided by the total mass of its parent (estimation from counts)
  ByParent,
  /// Only rules headed by synthetic symbols are normalized; the rest keep their given score
  SyntheticOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RuleKey {
  Unary(SymbolId, SymbolId),
  Binary(SymbolId, SymbolId, SymbolId),
}

impl RuleKey {
  fn parent(&self) -> SymbolId {
    match *self {
      Self::Unary(p, _) => p,
      Self::Binary(p, _, _) => p,
    }
  }
}

/// Accumulates rule mass in declaration order. Rules with more than two children
/// are binarized into the same synthetic symbols `transform::annotate` produces.
#[derive(Debug, Default)]
pub struct GrammarBuilder {
  symbols: SymbolTable,
  start: Option<SymbolId>,
  mass: IndexMap<RuleKey, f64>,
}

impl GrammarBuilder {
  pub fn new(symbols: SymbolTable) -> Self {
    Self {
      symbols,
      start: None,
      mass: IndexMap::new(),
    }
  }

  pub fn intern(&mut self, symbol: Symbol) -> SymbolId {
    self.symbols.intern(symbol)
  }

  pub fn set_start(&mut self, symbol: Symbol) -> SymbolId {
    let id = self.intern(symbol);
    self.start = Some(id);
    id
  }

  pub fn has_start(&self) -> bool {
    self.start.is_some()
  }

  /// Adds `score` to the mass of `parent -> children`
  pub fn add_rule(&mut self, parent: Symbol, children: Vec<Symbol>, score: f64) -> Result<(), Err> {
    if !score.is_finite() || score < 0.0 {
      return Err(format!("rule for {} has invalid score {}", parent, score).into());
    }

    match children.as_slice() {
      [] => Err(format!("rule for {} has no children", parent).into()),
      [child] => {
        let p = self.intern(parent);
        let c = self.intern(child.clone());
        *self.mass.entry(RuleKey::Unary(p, c)).or_default() += score;
        Ok(())
      }
      [left, right] => {
        let p = self.intern(parent);
        let l = self.intern(left.clone());
        let r = self.intern(right.clone());
        *self.mass.entry(RuleKey::Binary(p, l, r)).or_default() += score;
        Ok(())
      }
      _ => self.add_flat_rule(parent, children, score),
    }
  }

  /// `P -> c0 c1 ... ck` becomes `P -> c0 @P->_c0`, `@P->_c0 -> c1 @P->_c0_c1`, ...,
  /// `@P->_c0.._ck-2 -> ck-1 ck`
  fn add_flat_rule(&mut self, parent: Symbol, children: Vec<Symbol>, score: f64) -> Result<(), Err> {
    let label = match &parent {
      Symbol::Original(label) => label.clone(),
      Symbol::Synthetic(_) => {
        return Err(format!("synthetic symbol {} cannot head a flat rule", parent).into());
      }
    };

    let mut head = self.intern(parent);
    let last = children.len() - 2;
    for (idx, child) in children[..=last].iter().enumerate() {
      let left = self.intern(child.clone());
      let right = if idx == last {
        self.intern(children[last + 1].clone())
      } else {
        let history = children[..=idx]
          .iter()
          .map(|c| c.label().map_or_else(|| c.to_string(), |l| l.base.clone()))
          .collect();
        self.intern(Symbol::Synthetic(Intermediate {
          parent: label.clone(),
          history,
          truncated: false,
        }))
      };
      *self.mass.entry(RuleKey::Binary(head, left, right)).or_default() += score;
      head = right;
    }
    Ok(())
  }

  pub fn build(self, normalization: Normalization) -> Result<Grammar, Err> {
    let start = self.start.ok_or("grammar has no start symbol")?;

    let mut totals: HashMap<SymbolId, f64> = HashMap::new();
    for (key, mass) in self.mass.iter() {
      *totals.entry(key.parent()).or_default() += mass;
    }

    let mut rules = Vec::with_capacity(self.mass.len());
    let mut binary_by_left: HashMap<SymbolId, Vec<BinaryRule>> = HashMap::new();
    let mut unary_by_child: HashMap<SymbolId, Vec<UnaryRule>> = HashMap::new();
    for (key, mass) in self.mass.into_iter() {
      if mass == 0.0 {
        continue;
      }
      let normalize = match normalization {
        Normalization::ByParent => true,
        Normalization::SyntheticOnly => self.symbols.resolve(key.parent()).is_synthetic(),
      };
      let score = if normalize { mass / totals[&key.parent()] } else { mass };

      match key {
        RuleKey::Unary(parent, child) => {
          let rule = UnaryRule::new(parent, child, score);
          unary_by_child.entry(child).or_default().push(rule.clone());
          rules.push(Rule::Unary(rule));
        }
        RuleKey::Binary(parent, left, right) => {
          let rule = BinaryRule::new(parent, left, right, score);
          binary_by_left.entry(left).or_default().push(rule.clone());
          rules.push(Rule::Binary(rule));
        }
      }
    }

    tracing::debug!(
      rules = rules.len(),
      symbols = self.symbols.len(),
      "built grammar"
    );

    Ok(Grammar {
      start,
      symbols: self.symbols,
      rules,
      binary_by_left,
      unary_by_child,
    })
  }
}
