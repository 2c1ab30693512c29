//! Reversible preprocessing of training trees.
//!
//! `annotate` binarizes every constituent with more than two children into a
//! right-branching cascade of synthetic [`Intermediate`] nodes, optionally
//! decorating labels with ancestor context first. `unannotate` splices the
//! synthetic nodes back out and drops all decoration, so parser output uses
//! the treebank's own labels and flat branching.

use crate::symbol::{Intermediate, Label, Symbol};
use crate::syntree::{Constituent, SynTree};

/// Markovization orders threaded through `annotate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnnotationConfig {
  /// How many already-attached siblings a synthetic symbol remembers. `None` keeps all of them.
  pub horizontal: Option<usize>,
  /// How many ancestor labels decorate each constituent. 0 disables vertical Markovization.
  pub vertical: usize,
}

impl AnnotationConfig {
  pub fn new(horizontal: Option<usize>, vertical: usize) -> Self {
    Self { horizontal, vertical }
  }
}

pub fn annotate(tree: &SynTree<String, String>, config: &AnnotationConfig) -> SynTree<Symbol, String> {
  annotate_node(tree, &[], config)
}

/// `ancestors` holds the original labels above `tree`, nearest first
fn annotate_node(
  tree: &SynTree<String, String>,
  ancestors: &[&str],
  config: &AnnotationConfig,
) -> SynTree<Symbol, String> {
  let (cons, children) = match tree {
    SynTree::Leaf(w) => return SynTree::Leaf(w.clone()),
    SynTree::Branch(cons, children) => (cons, children),
  };

  let label = Label::with_ancestors(
    cons.value.clone(),
    ancestors
      .iter()
      .take(config.vertical)
      .map(|a| a.to_string())
      .collect(),
  );

  let mut child_ancestors = Vec::with_capacity(ancestors.len() + 1);
  child_ancestors.push(cons.value.as_str());
  child_ancestors.extend_from_slice(ancestors);

  let mut annotated = children
    .iter()
    .map(|child| annotate_node(child, &child_ancestors, config))
    .collect::<Vec<_>>();

  if annotated.len() <= 2 {
    return SynTree::Branch(
      Constituent {
        value: Symbol::Original(label),
        span: cons.span,
      },
      annotated,
    );
  }

  // build the cascade bottom-up: the last synthetic node takes the final two children,
  // and every earlier one takes one child plus the cascade to its right
  let history = children.iter().map(|c| c.label().to_string()).collect::<Vec<_>>();
  let mut cascade = annotated.pop().expect("more than two children");
  for attached in (1..annotated.len()).rev() {
    let left = annotated.pop().expect("attached < annotated.len()");
    let span = (left.span().0, cascade.span().1);
    let symbol = Symbol::Synthetic(intermediate(&label, &history[..attached], config));
    cascade = SynTree::Branch(Constituent { value: symbol, span }, vec![left, cascade]);
  }
  let first = annotated.pop().expect("first child is never attached to the cascade");

  SynTree::Branch(
    Constituent {
      value: Symbol::Original(label),
      span: cons.span,
    },
    vec![first, cascade],
  )
}

fn intermediate(parent: &Label, attached: &[String], config: &AnnotationConfig) -> Intermediate {
  let keep = config.horizontal.map_or(attached.len(), |h| h.min(attached.len()));
  Intermediate {
    parent: parent.clone(),
    history: attached[attached.len() - keep..].to_vec(),
    truncated: keep < attached.len(),
  }
}

/// Inverts `annotate`: splices out synthetic nodes (promoting their children in
/// order), drops ancestor decoration and strips function tags.
pub fn unannotate(tree: &SynTree<Symbol, String>) -> SynTree<String, String> {
  match tree {
    SynTree::Leaf(w) => SynTree::Leaf(w.clone()),
    SynTree::Branch(cons, children) => {
      let mut flat = Vec::with_capacity(children.len());
      splice_children(children, &mut flat);
      SynTree::Branch(
        Constituent {
          value: cons.value.stripped().to_string(),
          span: cons.span,
        },
        flat,
      )
    }
  }
}

fn splice_children(children: &[SynTree<Symbol, String>], out: &mut Vec<SynTree<String, String>>) {
  for child in children.iter() {
    match child {
      SynTree::Branch(cons, grandchildren) if cons.value.is_synthetic() => {
        splice_children(grandchildren, out)
      }
      _ => out.push(unannotate(child)),
    }
  }
}
