use crate::foundation::error::{SceneError, SceneResult};
use crate::script::command::{Command, ScriptLine};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Number(&'static str),
    Rest(&'static str),
}

#[derive(Clone, Copy)]
struct Rule {
    keyword: &'static str,
    fields: &'static [Field],
    build: fn(&Values<'_>) -> Command,
}

#[derive(Clone, Debug, PartialEq)]
enum Value<'a> {
    Number(f64),
    Rest(&'a str),
}

/// Field values captured by a matched rule, in grammar order.
struct Values<'a>(Vec<Value<'a>>);

impl Values<'_> {
    fn num(&self, i: usize) -> f64 {
        match self.0.get(i) {
            Some(Value::Number(v)) => *v,
            _ => f64::NAN,
        }
    }

    fn text(&self, i: usize) -> String {
        match self.0.get(i) {
            Some(Value::Rest(s)) => (*s).to_string(),
            _ => String::new(),
        }
    }
}

/// Ordered grammar. Matching is first-match-wins.
const GRAMMAR: &[Rule] = &[
    Rule {
        keyword: "voice",
        fields: &[Field::Number("pan"), Field::Rest("phrase")],
        build: |v| Command::Voice {
            pan: v.num(0),
            phrase: v.text(1),
        },
    },
    Rule {
        keyword: "sound",
        fields: &[
            Field::Number("pan"),
            Field::Number("duration"),
            Field::Rest("description"),
        ],
        build: |v| Command::Sound {
            pan: v.num(0),
            duration_secs: v.num(1),
            description: v.text(2),
        },
    },
    Rule {
        keyword: "bgstart",
        fields: &[Field::Number("pan"), Field::Rest("description")],
        build: |v| Command::BackgroundStart {
            pan: v.num(0),
            description: v.text(1),
        },
    },
    Rule {
        keyword: "bgstop",
        fields: &[Field::Rest("description")],
        build: |v| Command::BackgroundStop {
            description: v.text(0),
        },
    },
    Rule {
        keyword: "wait",
        fields: &[Field::Number("duration")],
        build: |v| Command::Wait { secs: v.num(0) },
    },
];

/// Parse a whole scene script into line-numbered commands.
///
/// Blank (whitespace-only) lines are skipped; every other line must match the grammar and pass
/// [`Command::validate`], otherwise the whole parse fails naming the 1-based line.
pub fn parse_script(text: &str) -> SceneResult<Vec<ScriptLine>> {
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let command = parse_line(line, line_no)?;
        command.validate(line_no)?;
        out.push(ScriptLine::new(line_no, command));
    }
    Ok(out)
}

/// Match a single non-blank line against the grammar.
pub fn parse_line(line: &str, line_no: usize) -> SceneResult<Command> {
    let mut last_reason = None;
    for rule in GRAMMAR {
        match match_rule(rule, line) {
            Ok(values) => return Ok((rule.build)(&values)),
            Err(Mismatch::Keyword) => {}
            Err(Mismatch::Field(reason)) => {
                last_reason.get_or_insert(reason);
            }
        }
    }

    let reason = last_reason.unwrap_or_else(|| {
        let word = line.split_whitespace().next().unwrap_or_default();
        format!("unknown command '{word}'")
    });
    Err(SceneError::malformed(line_no, reason, line))
}

enum Mismatch {
    Keyword,
    Field(String),
}

fn match_rule<'a>(rule: &Rule, line: &'a str) -> Result<Values<'a>, Mismatch> {
    let mut cur = Cursor::new(line);
    if cur.word() != Some(rule.keyword) {
        return Err(Mismatch::Keyword);
    }

    let mut values = Vec::with_capacity(rule.fields.len());
    for field in rule.fields {
        match *field {
            Field::Number(name) => {
                let Some(word) = cur.word() else {
                    return Err(Mismatch::Field(format!(
                        "{} expects <{name}:number>",
                        rule.keyword
                    )));
                };
                let Some(v) = parse_number(word) else {
                    return Err(Mismatch::Field(format!(
                        "{} expects <{name}:number>, got '{word}'",
                        rule.keyword
                    )));
                };
                values.push(Value::Number(v));
            }
            Field::Rest(name) => {
                let Some(rest) = cur.rest() else {
                    return Err(Mismatch::Field(format!(
                        "{} expects <{name}:text>",
                        rule.keyword
                    )));
                };
                values.push(Value::Rest(rest));
            }
        }
    }

    if let Some(extra) = cur.rest() {
        return Err(Mismatch::Field(format!(
            "{} has unexpected trailing text '{extra}'",
            rule.keyword
        )));
    }
    Ok(Values(values))
}

/// `[+-]?[0-9]*(\.[0-9]*)?` with at least one digit overall.
fn parse_number(word: &str) -> Option<f64> {
    let bytes = word.as_bytes();
    let mut i = 0usize;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let mut digits = 0usize;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }

    if digits == 0 || i != bytes.len() {
        return None;
    }
    word.parse::<f64>().ok()
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }

    fn word(&mut self) -> Option<&'a str> {
        let s = self.rest.trim_start();
        if s.is_empty() {
            self.rest = s;
            return None;
        }
        let end = s.find(char::is_whitespace).unwrap_or(s.len());
        let (word, tail) = s.split_at(end);
        self.rest = tail;
        Some(word)
    }

    fn rest(&mut self) -> Option<&'a str> {
        let s = self.rest.trim_start();
        self.rest = "";
        if s.is_empty() { None } else { Some(s) }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/script/parser.rs"]
mod tests;
