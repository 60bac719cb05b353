/// Decomposition of update expression text into per-keyword operand lists
///
/// `SET #a = :a, #b = list_append(#b, :b) REMOVE #c` becomes
/// `SET -> ["#a = :a", "#b = list_append(#b, :b)"]`, `REMOVE -> ["#c"]`.
/// Keywords and commas only count at parenthesis depth zero, and a keyword
/// must stand alone as a word, so `#SET` or `SETTINGS` never start a clause.

use super::update::stringify;
use super::ActionKeyword;
use crate::{Error, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedUpdateExpression {
    clauses: HashMap<ActionKeyword, Vec<String>>,
}

impl ParsedUpdateExpression {
    /// Raw operand substrings for `keyword`; empty if the keyword is absent
    pub fn operands(&self, keyword: ActionKeyword) -> &[String] {
        self.clauses.get(&keyword).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, keyword: ActionKeyword) -> bool {
        self.clauses.contains_key(&keyword)
    }

    /// Re-render in canonical clause order
    pub fn statement(&self) -> String {
        stringify(ActionKeyword::ALL.into_iter().map(|k| (k, self.operands(k))))
    }
}

/// Parse update expression text
pub fn parse_update_expression(input: &str) -> Result<ParsedUpdateExpression> {
    Scanner::new(input).run()
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

struct Scanner {
    input: Vec<char>,
    pos: usize,
    depth: usize,
    keyword: Option<ActionKeyword>,
    operand: String,
    parsed: ParsedUpdateExpression,
}

impl Scanner {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            depth: 0,
            keyword: None,
            operand: String::new(),
            parsed: ParsedUpdateExpression::default(),
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn previous(&self) -> Option<char> {
        self.pos.checked_sub(1).and_then(|i| self.input.get(i).copied())
    }

    fn read_word(&mut self) -> String {
        let start = self.pos;
        while let Some(ch) = self.current() {
            if is_word_char(ch) {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.input[start..self.pos].iter().collect()
    }

    fn run(mut self) -> Result<ParsedUpdateExpression> {
        while let Some(ch) = self.current() {
            match ch {
                '(' => {
                    self.depth += 1;
                    self.push_char(ch)?;
                    self.pos += 1;
                }
                ')' => {
                    if self.depth == 0 {
                        return Err(Error::InvalidExpression(format!(
                            "unbalanced ')' at position {}",
                            self.pos
                        )));
                    }
                    self.depth -= 1;
                    self.push_char(ch)?;
                    self.pos += 1;
                }
                ',' if self.depth == 0 => {
                    self.finish_operand()?;
                    self.pos += 1;
                }
                c if is_word_char(c) => {
                    // A word glued to a placeholder sigil or path separator is never a keyword
                    let standalone = !matches!(self.previous(), Some(p) if is_word_char(p) || p == '#' || p == ':' || p == '.');
                    let word = self.read_word();

                    match ActionKeyword::from_word(&word) {
                        Some(keyword) if standalone && self.depth == 0 => self.start_clause(keyword)?,
                        _ => self.push_str(&word)?,
                    }
                }
                _ => {
                    self.push_char(ch)?;
                    self.pos += 1;
                }
            }
        }

        if self.depth > 0 {
            return Err(Error::InvalidExpression(
                "unbalanced '(' in update expression".into(),
            ));
        }
        self.end_clause()?;

        Ok(self.parsed)
    }

    fn push_char(&mut self, ch: char) -> Result<()> {
        if self.keyword.is_none() {
            if ch.is_whitespace() {
                return Ok(());
            }
            return Err(Error::InvalidExpression(format!(
                "unexpected '{}' before the first action keyword",
                ch
            )));
        }
        self.operand.push(ch);
        Ok(())
    }

    fn push_str(&mut self, s: &str) -> Result<()> {
        if self.keyword.is_none() {
            return Err(Error::InvalidExpression(format!(
                "unexpected '{}' before the first action keyword",
                s
            )));
        }
        self.operand.push_str(s);
        Ok(())
    }

    fn finish_operand(&mut self) -> Result<()> {
        let keyword = self.keyword.ok_or_else(|| {
            Error::InvalidExpression("',' before the first action keyword".into())
        })?;

        let operand = self.operand.trim();
        if operand.is_empty() {
            return Err(Error::InvalidExpression(format!(
                "empty operand in {} clause",
                keyword
            )));
        }

        self.parsed
            .clauses
            .entry(keyword)
            .or_default()
            .push(operand.to_string());
        self.operand.clear();
        Ok(())
    }

    fn start_clause(&mut self, keyword: ActionKeyword) -> Result<()> {
        self.end_clause()?;
        self.keyword = Some(keyword);
        Ok(())
    }

    fn end_clause(&mut self) -> Result<()> {
        if self.keyword.is_some() {
            self.finish_operand()?;
        }
        Ok(())
    }
}
