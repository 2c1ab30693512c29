use indexmap::IndexMap;
use std::collections::HashMap;

use crate::rules::TerminalRule;
use crate::symbol::{Symbol, SymbolId, SymbolTable};
use crate::syntree::SynTree;
use crate::utils::Err;

/// Emission scores for preterminal tags. Shared read-only between parses.
pub trait Lexicon: Sync {
  /// Every tag the lexicon knows, in a fixed order
  fn tags(&self) -> &[SymbolId];

  /// Probability that `tag` emits `word`, 0 if it cannot. Unknown-word
  /// smoothing, if any, happens in here.
  fn score_tagging(&self, word: &str, tag: SymbolId) -> f64;
}

/// How a TagLexicon scores words it has never seen
#[derive(Debug, Clone, PartialEq)]
pub enum UnknownWords {
  /// Unknown words get no tags, so any sentence containing one fails to parse
  Reject,
  /// Per-tag probability of emitting an unseen word
  PerTag(HashMap<SymbolId, f64>),
}

/// A word -> [(tag, probability)] table
#[derive(Debug, Clone)]
pub struct TagLexicon {
  tags: Vec<SymbolId>,
  words: IndexMap<String, Vec<(SymbolId, f64)>>,
  unknown: UnknownWords,
}

impl TagLexicon {
  pub fn new() -> Self {
    Self {
      tags: Vec::new(),
      words: IndexMap::new(),
      unknown: UnknownWords::Reject,
    }
  }

  /// Records `tag -> word` with `score`. A repeated entry replaces the earlier score.
  pub fn insert(&mut self, tag: SymbolId, word: impl Into<String>, score: f64) {
    if !self.tags.contains(&tag) {
      self.tags.push(tag);
    }
    let entries = self.words.entry(word.into()).or_default();
    match entries.iter_mut().find(|(t, _)| *t == tag) {
      Some(entry) => entry.1 = score,
      None => entries.push((tag, score)),
    }
  }

  pub fn set_unknown_words(&mut self, unknown: UnknownWords) {
    self.unknown = unknown;
  }

  pub fn knows(&self, word: &str) -> bool {
    self.words.contains_key(word)
  }

  /// Lexical rules, words in first-inserted order
  pub fn rules(&self) -> impl Iterator<Item = TerminalRule> + '_ {
    self.words.iter().flat_map(|(word, entries)| {
      entries.iter().map(move |&(tag, score)| TerminalRule {
        tag,
        word: word.clone(),
        score,
      })
    })
  }

  pub fn len(&self) -> usize {
    self.words.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Estimates emission probabilities from the preterminals of annotated trees.
  ///
  /// Known words score `c(tag, word) / c(tag)`. Unseen words score
  /// `(c1(tag) + 1) / (c(tag) + |tags|)`, where `c1` counts the tag's tokens
  /// whose word occurred exactly once in training.
  pub fn from_trees(trees: &[SynTree<Symbol, String>], symbols: &mut SymbolTable) -> Result<Self, Err> {
    let mut pairs: Vec<(SymbolId, &str)> = Vec::new();
    for tree in trees.iter() {
      collect_preterminals(tree, symbols, &mut pairs)?;
    }

    let mut word_counts: HashMap<&str, usize> = HashMap::new();
    let mut tag_counts: HashMap<SymbolId, usize> = HashMap::new();
    let mut pair_counts: HashMap<(SymbolId, &str), usize> = HashMap::new();
    for &(tag, word) in pairs.iter() {
      *word_counts.entry(word).or_default() += 1;
      *tag_counts.entry(tag).or_default() += 1;
      *pair_counts.entry((tag, word)).or_default() += 1;
    }

    let mut lexicon = Self::new();
    let mut hapax_counts: HashMap<SymbolId, usize> = HashMap::new();
    // walk the tokens in corpus order so tag and entry order is reproducible
    for &(tag, word) in pairs.iter() {
      if lexicon.words.get(word).is_some_and(|e| e.iter().any(|(t, _)| *t == tag)) {
        continue;
      }
      let score = pair_counts[&(tag, word)] as f64 / tag_counts[&tag] as f64;
      lexicon.insert(tag, word, score);
      if word_counts[word] == 1 {
        *hapax_counts.entry(tag).or_default() += 1;
      }
    }

    let num_tags = lexicon.tags.len() as f64;
    let unknown = lexicon
      .tags
      .iter()
      .map(|tag| {
        let once = hapax_counts.get(tag).copied().unwrap_or(0) as f64;
        (*tag, (once + 1.0) / (tag_counts[tag] as f64 + num_tags))
      })
      .collect();
    lexicon.set_unknown_words(UnknownWords::PerTag(unknown));

    tracing::debug!(
      words = lexicon.len(),
      tags = lexicon.tags.len(),
      "estimated lexicon"
    );
    Ok(lexicon)
  }
}

impl Default for TagLexicon {
  fn default() -> Self {
    Self::new()
  }
}

fn collect_preterminals<'a>(
  tree: &'a SynTree<Symbol, String>,
  symbols: &mut SymbolTable,
  out: &mut Vec<(SymbolId, &'a str)>,
) -> Result<(), Err> {
  match tree {
    SynTree::Leaf(w) => Err(format!("word {:?} is not dominated by a tag", w.value).into()),
    SynTree::Branch(cons, children) => {
      if let [SynTree::Leaf(word)] = children.as_slice() {
        out.push((symbols.intern(cons.value.clone()), word.value.as_str()));
        return Ok(());
      }
      for child in children.iter() {
        collect_preterminals(child, symbols, out)?;
      }
      Ok(())
    }
  }
}

impl Lexicon for TagLexicon {
  fn tags(&self) -> &[SymbolId] {
    &self.tags
  }

  fn score_tagging(&self, word: &str, tag: SymbolId) -> f64 {
    match self.words.get(word) {
      Some(entries) => entries
        .iter()
        .find(|(t, _)| *t == tag)
        .map_or(0.0, |(_, score)| *score),
      None => match &self.unknown {
        UnknownWords::Reject => 0.0,
        UnknownWords::PerTag(scores) => scores.get(&tag).copied().unwrap_or(0.0),
      },
    }
  }
}
