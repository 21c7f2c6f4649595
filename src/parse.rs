//! Strict parsing of criterion and rule scripts
//!
//! Criterion values are read with a small grammar and never evaluated:
//!
//! ```text
//! criterion := NAME ws op ws value
//! op        := "=" | ">" | ">=" | "<" | "<=" | "in" | "not in"
//! value     := number                        (comparison operators)
//!            | open item ("," item)* ","? close   (in / not in)
//! open      := "[" | "(" | "{"
//! item      := 'text' | "text" | bare
//! ```
//!
//! Rule scripts chain criteria with `<and>`, separate the conclusion with
//! `<thn>` and terminate each rule with `<eor>`:
//!
//! ```text
//! AGE >= 18 <and> CITY in ['HN', 'HCM'] <thn> RISK = LOW <eor>
//! ```

use crate::error::{Error, Result};
use crate::model::{Criterion, CriterionValue, Operator};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Conjunction token
pub const AND_TOKEN: &str = "<and>";
/// Conclusion token
pub const THN_TOKEN: &str = "<thn>";
/// End-of-rule token
pub const EOR_TOKEN: &str = "<eor>";

const FORBIDDEN_TOKENS: [&str; 2] = ["<or>", "<else>"];

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9_]+$").expect("name pattern is valid"));

/// Variable / output names are upper snake case
pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// Split `VAR op value` into its three parts
pub fn split_criterion(text: &str) -> Result<(&str, Operator, &str)> {
    let text = text.trim();
    let name_end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    let (name, rest) = text.split_at(name_end);
    if name.is_empty() {
        return Err(Error::Parse(format!("missing variable name in \"{}\"", text)));
    }
    let rest = rest.trim_start();

    let (op, value) = if let Some(after) = strip_word(rest, "not") {
        let after = after.trim_start();
        match strip_word(after, "in") {
            Some(value) => (Operator::NotIn, value),
            None => {
                return Err(Error::Parse(format!(
                    "expected `not in` in \"{}\"",
                    text
                )))
            }
        }
    } else if let Some(value) = strip_word(rest, "in") {
        (Operator::In, value)
    } else {
        let sym_end = rest
            .find(|c: char| !matches!(c, '<' | '>' | '='))
            .unwrap_or(rest.len());
        let (sym, value) = rest.split_at(sym_end);
        let op = Operator::from_symbol(sym).ok_or_else(|| {
            Error::Parse(format!(
                "operator must be one of [\"=\", \">\", \"<\", \">=\", \"<=\", \"in\", \"not in\"], got \"{}\"",
                sym
            ))
        })?;
        (op, value)
    };

    Ok((name, op, value.trim()))
}

/// Strip a keyword followed by whitespace, a bracket, or the end of input
fn strip_word<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(word)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || matches!(c, '[' | '(' | '{') => Some(rest),
        Some(_) => None,
    }
}

/// Parse a criterion value for the given operator
pub fn parse_value(op: Operator, text: &str) -> Result<CriterionValue> {
    let text = text.trim();
    if op.is_membership() {
        parse_list(text).map(CriterionValue::Options)
    } else {
        parse_number(text).map(CriterionValue::Number)
    }
}

/// Parse a finite float literal
pub fn parse_number(text: &str) -> Result<f64> {
    let text = text.trim();
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(Error::Parse(format!(
            "operators \"=\", \">\", \"<\", \">=\", \"<=\" must go with a numerical value, got \"{}\"",
            text
        ))),
    }
}

/// Parse a bracketed list of quoted or bare items
pub fn parse_list(text: &str) -> Result<BTreeSet<String>> {
    ListParser::new(text.trim()).parse()
}

struct ListParser<'a> {
    src: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> ListParser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    fn error(&self, what: &str) -> Error {
        Error::Parse(format!(
            "operators \"in\", \"not in\" must go with a list of values ({}): \"{}\"",
            what, self.src
        ))
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn parse(mut self) -> Result<BTreeSet<String>> {
        let close = match self.chars.next() {
            Some((_, '[')) => ']',
            Some((_, '(')) => ')',
            Some((_, '{')) => '}',
            _ => return Err(self.error("expected an opening bracket")),
        };

        let mut items = BTreeSet::new();
        loop {
            self.skip_ws();
            match self.chars.peek() {
                Some((_, c)) if *c == close => {
                    self.chars.next();
                    break;
                }
                None => return Err(self.error("unterminated list")),
                _ => {}
            }

            items.insert(self.item(close)?);

            self.skip_ws();
            match self.chars.next() {
                Some((_, ',')) => continue,
                Some((_, c)) if c == close => break,
                _ => return Err(self.error("expected `,` between items")),
            }
        }

        self.skip_ws();
        if self.chars.next().is_some() {
            return Err(self.error("trailing input after list"));
        }
        Ok(items)
    }

    fn item(&mut self, close: char) -> Result<String> {
        match self.chars.peek().copied() {
            Some((_, quote)) if quote == '\'' || quote == '"' => {
                self.chars.next();
                let mut out = String::new();
                loop {
                    match self.chars.next() {
                        Some((_, '\\')) => match self.chars.next() {
                            Some((_, c)) => out.push(c),
                            None => return Err(self.error("dangling escape")),
                        },
                        Some((_, c)) if c == quote => return Ok(out),
                        Some((_, c)) => out.push(c),
                        None => return Err(self.error("unterminated string")),
                    }
                }
            }
            Some((start, _)) => {
                let mut end = start;
                while let Some((i, c)) = self.chars.peek().copied() {
                    if c == ',' || c == close || c.is_whitespace() {
                        break;
                    }
                    if !(c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '+')) {
                        return Err(self.error("unexpected character in bare item"));
                    }
                    end = i + c.len_utf8();
                    self.chars.next();
                }
                if end == start {
                    return Err(self.error("empty item"));
                }
                Ok(self.src[start..end].to_string())
            }
            None => Err(self.error("unterminated list")),
        }
    }
}

/// Parse `VAR op value` into a typed criterion
pub fn parse_criterion(id: impl Into<String>, text: &str) -> Result<Criterion> {
    let (name, op, value) = split_criterion(text)?;
    if !is_valid_name(name) {
        return Err(Error::Parse(format!(
            "variable format incorrect \"{}\"",
            name
        )));
    }
    let value = parse_value(op, value)?;
    Ok(Criterion::new(id, name, op, value))
}

/// A rule read from a rule script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScriptRule {
    pub criteria: Vec<Criterion>,
    pub output_name: String,
    pub output_value: String,
}

/// Validate a rule script and return its rules
pub fn check_rules(script: &str) -> Result<Vec<ScriptRule>> {
    if !script.contains(EOR_TOKEN) {
        return Err(Error::RuleFormat(format!(
            "missing {} to signify the end of a rule",
            EOR_TOKEN
        )));
    }

    let mut rules = Vec::new();
    for (idx, raw) in script.trim().split(EOR_TOKEN).enumerate() {
        let rule = raw.trim();
        if rule.is_empty() {
            continue;
        }
        rules.push(check_rule(idx, rule)?);
    }
    Ok(rules)
}

fn check_rule(idx: usize, rule: &str) -> Result<ScriptRule> {
    let fail = |msg: String| Error::RuleFormat(format!("in rule \"{}\": {}", rule, msg));

    for token in FORBIDDEN_TOKENS {
        if rule.contains(token) {
            return Err(fail(format!(
                "invalid token {}, special tokens are {}, {}, {}",
                token, AND_TOKEN, THN_TOKEN, EOR_TOKEN
            )));
        }
    }

    let Some((conditions, conclusion)) = rule.split_once(THN_TOKEN) else {
        return Err(fail(format!(
            "missing {} to mark the conclusion of conditions",
            THN_TOKEN
        )));
    };
    let conclusion = conclusion.trim();
    if conclusion.contains(THN_TOKEN) {
        return Err(fail(format!("more than one {}", THN_TOKEN)));
    }

    let (output_name, output_value) = parse_conclusion(conclusion).map_err(|e| {
        fail(format!("conclusion part \"{}\": {}", conclusion, e))
    })?;

    let mut criteria = Vec::new();
    for (c_idx, condition) in conditions.split(AND_TOKEN).enumerate() {
        let condition = condition.trim();
        let id = format!("S{}#{}", idx, c_idx);
        let criterion = parse_criterion(id, condition)
            .map_err(|e| fail(format!("condition \"{}\": {}", condition, e)))?;
        criteria.push(criterion);
    }

    Ok(ScriptRule {
        criteria,
        output_name,
        output_value,
    })
}

fn parse_conclusion(conclusion: &str) -> Result<(String, String)> {
    let (name, op, value) = split_criterion(conclusion)?;
    if op != Operator::Eq {
        return Err(Error::Parse("the output must use operator \"=\"".into()));
    }
    if !is_valid_name(name) {
        return Err(Error::Parse(format!(
            "the output variable format \"{}\" is incorrect",
            name
        )));
    }
    if value.is_empty() || value.contains(AND_TOKEN) {
        return Err(Error::Parse(format!(
            "the output value format \"{}\" is incorrect, output value must be a formula or a value",
            value
        )));
    }
    Ok((name.to_string(), value.to_string()))
}
