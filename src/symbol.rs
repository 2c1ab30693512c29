use std::collections::HashMap;
use std::fmt;

/// Separates a label from its vertical-Markovization ancestors: `NP^S^ROOT`
pub const ANCESTOR_SEP: char = '^';
/// Reserved prefix of synthetic binarization symbols. Never starts an ordinary label.
pub const SYNTHETIC_MARKER: char = '@';

/// An ordinary grammar symbol, optionally decorated with the labels of its
/// nearest ancestors (nearest first).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
  pub base: String,
  pub ancestors: Vec<String>,
}

impl Label {
  pub fn new(base: impl Into<String>) -> Self {
    Self {
      base: base.into(),
      ancestors: Vec::new(),
    }
  }

  pub fn with_ancestors(base: impl Into<String>, ancestors: Vec<String>) -> Self {
    Self {
      base: base.into(),
      ancestors,
    }
  }

  /// The base label with function tags removed: `NP-SBJ=2` -> `NP`.
  /// Labels that start with a dash (`-NONE-`, `-LRB-`) are left alone.
  pub fn stripped(&self) -> &str {
    strip_function_tags(&self.base)
  }
}

impl From<&str> for Label {
  /// Splits at the first ancestor separator, so `"NP^S"` has base `NP` and ancestor `S`
  fn from(s: &str) -> Self {
    let mut parts = s.split(ANCESTOR_SEP);
    let base = parts.next().unwrap_or_default().to_string();
    Self {
      base,
      ancestors: parts.map(str::to_string).collect(),
    }
  }
}

impl fmt::Display for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.base)?;
    for a in self.ancestors.iter() {
      write!(f, "{}{}", ANCESTOR_SEP, a)?;
    }
    Ok(())
  }
}

pub fn strip_function_tags(label: &str) -> &str {
  match label.char_indices().skip(1).find(|(_, c)| *c == '-' || *c == '=') {
    Some((idx, _)) => &label[..idx],
    None => label,
  }
}

/// A symbol introduced by binarization. It stands for the suffix of a flat
/// rule of `parent` whose first children, `history`, are already attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Intermediate {
  pub parent: Label,
  pub history: Vec<String>,
  /// Set when horizontal Markovization dropped older history entries
  pub truncated: bool,
}

impl fmt::Display for Intermediate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}->", SYNTHETIC_MARKER, self.parent)?;
    if self.truncated {
      write!(f, "..")?;
    }
    for h in self.history.iter() {
      write!(f, "_{}", h)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
  Original(Label),
  Synthetic(Intermediate),
}

impl Symbol {
  pub fn original(base: impl Into<String>) -> Self {
    Self::Original(Label::new(base))
  }

  pub fn is_synthetic(&self) -> bool {
    matches!(self, Self::Synthetic(_))
  }

  pub fn label(&self) -> Option<&Label> {
    match self {
      Self::Original(l) => Some(l),
      Self::Synthetic(_) => None,
    }
  }

  /// The label this symbol un-annotates to. Synthetic symbols report their parent's.
  pub fn stripped(&self) -> &str {
    match self {
      Self::Original(l) => l.stripped(),
      Self::Synthetic(i) => i.parent.stripped(),
    }
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Original(l) => write!(f, "{}", l),
      Self::Synthetic(i) => write!(f, "{}", i),
    }
  }
}

/// Interned handle for a symbol in a SymbolTable
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// Interner mapping symbols to dense ids. Ids are handed out in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
  symbols: Vec<Symbol>,
  ids: HashMap<Symbol, SymbolId>,
}

impl SymbolTable {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn intern(&mut self, symbol: Symbol) -> SymbolId {
    if let Some(id) = self.ids.get(&symbol) {
      return *id;
    }
    let id = SymbolId(self.symbols.len() as u32);
    self.symbols.push(symbol.clone());
    self.ids.insert(symbol, id);
    id
  }

  pub fn get(&self, symbol: &Symbol) -> Option<SymbolId> {
    self.ids.get(symbol).copied()
  }

  pub fn resolve(&self, id: SymbolId) -> &Symbol {
    &self.symbols[id.0 as usize]
  }

  pub fn len(&self) -> usize {
    self.symbols.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
    self
      .symbols
      .iter()
      .enumerate()
      .map(|(idx, s)| (SymbolId(idx as u32), s))
  }
}
