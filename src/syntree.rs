use std::fmt;
use std::str::FromStr;

use crate::utils::{needed_char, needed_re, optional_char, preview, skip_whitespace, Err, ParseResult};

/// Label given to the unlabeled outermost bracket of treebank files: `( (S ...) )`
pub const IMPLICIT_ROOT: &str = "ROOT";

#[derive(Debug, PartialEq, Clone)]
pub struct Constituent<T> {
  pub value: T,
  pub span: (usize, usize),
}

impl<T> fmt::Display for Constituent<T>
where
  T: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}: {}", self.span.0, self.span.1, self.value)
  }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Word<U> {
  pub value: U,
  pub span: (usize, usize),
}

impl<U> fmt::Display for Word<U>
where
  U: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}: {}", self.span.0, self.span.1, self.value)
  }
}

/// An ordered phrase-structure tree. Every node knows the fencepost span it covers.
#[derive(Debug, PartialEq, Clone)]
pub enum SynTree<T, U> {
  Branch(Constituent<T>, Vec<SynTree<T, U>>),
  Leaf(Word<U>),
}

impl<T, U> SynTree<T, U> {
  pub fn branch(value: T, children: Vec<SynTree<T, U>>) -> Self {
    let span = match (children.first(), children.last()) {
      (Some(first), Some(last)) => (first.span().0, last.span().1),
      _ => (0, 0),
    };
    Self::Branch(Constituent { value, span }, children)
  }

  pub fn leaf(value: U, position: usize) -> Self {
    Self::Leaf(Word {
      value,
      span: (position, position + 1),
    })
  }

  pub fn is_leaf(&self) -> bool {
    matches!(self, Self::Leaf(_))
  }

  /// A branch whose only child is a word
  pub fn is_preterminal(&self) -> bool {
    match self {
      Self::Branch(_, children) => children.len() == 1 && children[0].is_leaf(),
      _ => false,
    }
  }

  pub fn span(&self) -> (usize, usize) {
    match self {
      Self::Branch(c, _) => c.span,
      Self::Leaf(w) => w.span,
    }
  }

  pub fn get_branch(&self) -> Option<(&Constituent<T>, &Vec<SynTree<T, U>>)> {
    match self {
      Self::Branch(c, cs) => Some((c, cs)),
      _ => None,
    }
  }

  /// The words of the tree, left to right
  pub fn words(&self) -> Vec<&U> {
    let mut words = Vec::new();
    self.collect_words(&mut words);
    words
  }

  fn collect_words<'a>(&'a self, words: &mut Vec<&'a U>) {
    match self {
      Self::Leaf(w) => words.push(&w.value),
      Self::Branch(_, children) => {
        for child in children.iter() {
          child.collect_words(words);
        }
      }
    }
  }
}

impl SynTree<String, String> {
  /// The node's label, or its word if it is a leaf
  pub fn label(&self) -> &str {
    match self {
      Self::Branch(c, _) => &c.value,
      Self::Leaf(w) => &w.value,
    }
  }
}

/// Penn-style one-line bracketing: `(S (NP (Det the) (N dog)) (VP (V barks)))`
impl<T, U> fmt::Display for SynTree<T, U>
where
  T: fmt::Display,
  U: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(w) => write!(f, "{}", w.value),
      Self::Branch(c, children) => {
        write!(f, "({}", c.value)?;
        for child in children.iter() {
          write!(f, " {}", child)?;
        }
        write!(f, ")")
      }
    }
  }
}

impl FromStr for SynTree<String, String> {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (tree, rest) = parse_tree(skip_whitespace(s), &mut 0)?;
    let rest = skip_whitespace(rest);
    if rest.is_empty() {
      Ok(tree)
    } else {
      Err(format!("trailing input after tree: {}", preview(rest)).into())
    }
  }
}

/// Reads every bracketed tree in `s`. Trees may span multiple lines.
pub fn read_treebank(s: &str) -> Result<Vec<SynTree<String, String>>, Err> {
  let mut trees = Vec::new();
  let mut rem = skip_whitespace(s);
  while !rem.is_empty() {
    let (tree, s) =
      parse_tree(rem, &mut 0).map_err(|e| -> Err { format!("tree {}: {}", trees.len() + 1, e).into() })?;
    trees.push(tree);
    rem = skip_whitespace(s);
  }
  Ok(trees)
}

fn parse_token(s: &str) -> ParseResult<'_, &str> {
  regex_static!(TOKEN, r"[^\s()]+");
  needed_re(&TOKEN, s)
}

/// `(` label? (tree | word)+ `)`. `position` counts words consumed so far.
fn parse_tree<'a>(s: &'a str, position: &mut usize) -> ParseResult<'a, SynTree<String, String>> {
  let (_, s) = needed_char('(', s)?;
  let s = skip_whitespace(s);

  let (label, mut rem) = if s.starts_with('(') {
    (IMPLICIT_ROOT, s)
  } else {
    parse_token(s).map_err(|e| -> Err { format!("tree label: {}", e).into() })?
  };

  let begin = *position;
  let mut children = Vec::new();
  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), s) = optional_char(')', rem) {
      rem = s;
      break;
    }
    if rem.starts_with('(') {
      let (child, s) = parse_tree(rem, position)?;
      children.push(child);
      rem = s;
    } else {
      let (word, s) = parse_token(rem).map_err(|e| -> Err { format!("word under {}: {}", label, e).into() })?;
      children.push(SynTree::leaf(word.to_string(), *position));
      *position += 1;
      rem = s;
    }
  }

  if children.is_empty() {
    return Err(format!("constituent {} has no children", label).into());
  }

  Ok((
    SynTree::Branch(
      Constituent {
        value: label.to_string(),
        span: (begin, *position),
      },
      children,
    ),
    rem,
  ))
}
