//! Simple recursive-descent parsing of PCFG files
//!
//! ```text
//! // the first rule's parent is the start symbol
//! S -> NP VP : 0.9;
//! S -> VP : 0.1;
//! NP -> Det Adj N : 0.5;   // flat rules are binarized on load
//! NP -> N;                 // score defaults to 1
//! Det -> "the";            // lexical rule: a tag emitting one quoted word
//! ```
//!
//! Symbols are whitespace-delimited and may carry ancestor decoration (`NP^S`).

use std::str::FromStr;

use crate::Pcfg;
use crate::grammar::{GrammarBuilder, Normalization};
use crate::lexicon::TagLexicon;
use crate::symbol::{Label, Symbol};
use crate::utils::{needed_char, needed_re, optional_char, preview, skip_whitespace, Err, ParseResult};

impl FromStr for Pcfg<TagLexicon> {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (rules, _) = parse_rules(s)?;

    if rules.is_empty() {
      return Err("empty ruleset".into());
    }

    let mut builder = GrammarBuilder::default();
    let mut lexical = Vec::new();
    for rule in rules.into_iter() {
      if !builder.has_start() {
        builder.set_start(Symbol::Original(rule.parent.clone()));
      }
      match rule.rhs {
        Rhs::Word(word) => {
          if !rule.score.is_finite() || rule.score < 0.0 {
            return Err(format!("rule for {} has invalid score {}", rule.parent, rule.score).into());
          }
          let tag = builder.intern(Symbol::Original(rule.parent));
          lexical.push((tag, word, rule.score));
        }
        Rhs::Symbols(children) => builder.add_rule(
          Symbol::Original(rule.parent),
          children.into_iter().map(Symbol::Original).collect(),
          rule.score,
        )?,
      }
    }

    let mut lexicon = TagLexicon::new();
    for (tag, word, score) in lexical.into_iter() {
      lexicon.insert(tag, word, score);
    }

    let grammar = builder.build(Normalization::SyntheticOnly)?;
    Ok(Pcfg::new(grammar, lexicon))
  }
}

#[derive(Debug, PartialEq)]
enum Rhs {
  Word(String),
  Symbols(Vec<Label>),
}

#[derive(Debug, PartialEq)]
struct RuleDecl {
  parent: Label,
  rhs: Rhs,
  score: f64,
}

/// A name with optional `^ancestor` decoration. `@` is reserved for synthetic symbols.
fn parse_label(s: &str) -> ParseResult<'_, Label> {
  regex_static!(LABEL, r#"[^\s@^";:]+(\^[^\s@^";:]+)*"#);
  let (name, rest) = needed_re(&LABEL, s).map_err(|e| -> Err { format!("symbol: {}", e).into() })?;
  if name == "->" {
    return Err(format!("symbol: expected a symbol, found arrow at {}", preview(s)).into());
  }
  Ok((Label::from(name), rest))
}

fn parse_word(s: &str) -> ParseResult<'_, String> {
  regex_static!(QUOTED, r#""[^"\n]*""#);
  let (quoted, rest) = needed_re(&QUOTED, s).map_err(|e| -> Err { format!("word: {}", e).into() })?;
  let word = &quoted[1..quoted.len() - 1];
  if word.is_empty() {
    return Err(format!("word: empty word at {}", preview(s)).into());
  }
  Ok((word.to_string(), rest))
}

/// `: <number>`, defaulting to 1
fn parse_score(s: &str) -> ParseResult<'_, f64> {
  regex_static!(NUMBER, r"[0-9]*\.?[0-9]+([eE][-+]?[0-9]+)?");
  if let (Some(_), s) = optional_char(':', s) {
    let s = skip_whitespace(s);
    let (number, s) = needed_re(&NUMBER, s).map_err(|e| -> Err { format!("score: {}", e).into() })?;
    let score = number
      .parse::<f64>()
      .map_err(|e| -> Err { format!("score {}: {}", number, e).into() })?;
    Ok((score, s))
  } else {
    Ok((1.0, s))
  }
}

/// Parent, arrow, right-hand side, optional score, terminated by `;`
fn parse_rule(s: &str) -> ParseResult<'_, RuleDecl> {
  #![allow(clippy::trivial_regex)]
  regex_static!(ARROW, "->");

  let (parent, s) = parse_label(s).map_err(|e| -> Err { format!("rule parent: {}", e).into() })?;
  let s = skip_whitespace(s);
  let (_, s) = needed_re(&ARROW, s).map_err(|e| -> Err { format!("rule arrow: {}", e).into() })?;
  let s = skip_whitespace(s);

  let (rhs, s) = if s.starts_with('"') {
    let (word, s) = parse_word(s)?;
    (Rhs::Word(word), skip_whitespace(s))
  } else {
    let mut children = Vec::new();
    let mut rem = s;
    loop {
      rem = skip_whitespace(rem);
      if rem.starts_with(';') || rem.starts_with(':') || rem.is_empty() {
        break;
      }
      if rem.starts_with('"') {
        return Err(format!("rule {}: words cannot be mixed with symbols at {}", parent, preview(rem)).into());
      }
      let (child, s) = parse_label(rem).map_err(|e| -> Err { format!("rule {}: {}", parent, e).into() })?;
      children.push(child);
      rem = s;
    }
    if children.is_empty() {
      return Err(format!("rule {} has an empty right-hand side", parent).into());
    }
    (Rhs::Symbols(children), rem)
  };

  let (score, s) = parse_score(s).map_err(|e| -> Err { format!("rule {}: {}", parent, e).into() })?;
  let s = skip_whitespace(s);
  let (_, s) = needed_char(';', s).map_err(|e| -> Err { format!("rule {}: {}", parent, e).into() })?;

  Ok((RuleDecl { parent, rhs, score }, s))
}

fn parse_rules(s: &str) -> ParseResult<'_, Vec<RuleDecl>> {
  let mut rules = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if rem.is_empty() {
      return Ok((rules, rem));
    }
    let (rule, s) = parse_rule(rem)?;
    rules.push(rule);
    rem = s;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexicon::Lexicon;

  macro_rules! grammar_file {
    ($filename:expr) => {
      ($filename, include_str!(concat!("../grammars/", $filename)))
    };
  }

  #[test]
  fn smoke_test_grammar_files() {
    let files = [grammar_file!("toy.pcfg"), grammar_file!("flat.pcfg")];

    for (filename, src) in files {
      assert!(src.parse::<Pcfg>().is_ok(), "failed to parse {filename}");
    }
  }

  #[test]
  fn test_parse_rule() {
    let (rule, rest) = parse_rule("S -> NP VP : 0.25; tail").unwrap();
    assert_eq!(rest, " tail");
    assert_eq!(
      rule,
      RuleDecl {
        parent: Label::new("S"),
        rhs: Rhs::Symbols(vec![Label::new("NP"), Label::new("VP")]),
        score: 0.25,
      }
    );

    let (rule, _) = parse_rule("Det -> \"the\";").unwrap();
    assert_eq!(rule.rhs, Rhs::Word("the".to_string()));
    assert_eq!(rule.score, 1.0);

    let (rule, _) = parse_rule("NP^S -> N^NP : 1e-3;").unwrap();
    assert_eq!(rule.parent.ancestors, vec!["S"]);
    assert_eq!(rule.score, 0.001);
  }

  #[test]
  fn test_malformed_rules() {
    assert!(parse_rule("S NP VP;").is_err());
    assert!(parse_rule("S -> ;").is_err());
    assert!(parse_rule("S -> NP VP").is_err());
    assert!(parse_rule("S -> NP \"word\";").is_err());
    assert!(parse_rule("S -> NP : x;").is_err());
    assert!(parse_rule("@S -> NP;").is_err());
    assert!(parse_rule("Det -> \"\";").is_err());
    assert!("".parse::<Pcfg>().is_err());
    assert!("// nothing here\n".parse::<Pcfg>().is_err());
    assert!("S -> A; A -> \"a\"; trailing".parse::<Pcfg>().is_err());
    assert!("S -> A; A -> \"a\"; )".parse::<Pcfg>().is_err());
  }

  #[test]
  fn test_pcfg_from_str() {
    let pcfg: Pcfg = r#"
      S -> NP VP;
      NP -> Det N : 0.7;
      NP -> N : 0.3;
      VP -> V;
      Det -> "the";
      N -> "dog" : 0.5;
      N -> "cat" : 0.5;
      V -> "barks";
    "#
    .parse()
    .unwrap();

    let g = &pcfg.grammar;
    assert_eq!(g.symbol(g.start()), &Symbol::original("S"));
    assert_eq!(g.rules().count(), 4);

    let n = g.id(&Symbol::original("N")).unwrap();
    assert_eq!(pcfg.lexicon.tags().len(), 3);
    assert_eq!(pcfg.lexicon.score_tagging("cat", n), 0.5);
    assert_eq!(pcfg.lexicon.score_tagging("barks", n), 0.0);
  }
}
