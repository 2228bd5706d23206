//! Safe expression interpreter
//!
//! The default backend: a lexer, a precedence-climbing parser, and a
//! tree-walking evaluator over a strict whitelisted grammar — literals,
//! identifiers, member access and indexing, arithmetic, comparison, and
//! boolean operators. Anything outside the whitelist is a compile error;
//! unknown identifiers are a run error.

use std::sync::Arc;

use serde_json::{Number, Value};

use crate::error::{JsonPathError, JsonPathResult};

use super::{CompiledScript, ExpressionEngine, ScriptBindings};

/// Truthiness for filter predicates
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    And,
    Or,
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Ident(String),
    Member {
        target: Box<Expr>,
        name: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

fn lex(source: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '[' => {
                toks.push(Tok::LBracket);
                i += 1;
            }
            ']' => {
                toks.push(Tok::RBracket);
                i += 1;
            }
            '.' => {
                toks.push(Tok::Dot);
                i += 1;
            }
            '+' => {
                toks.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                toks.push(Tok::Minus);
                i += 1;
            }
            '*' => {
                toks.push(Tok::Star);
                i += 1;
            }
            '/' => {
                toks.push(Tok::Slash);
                i += 1;
            }
            '%' => {
                toks.push(Tok::Percent);
                i += 1;
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Le);
                    i += 2;
                } else {
                    toks.push(Tok::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Ge);
                    i += 2;
                } else {
                    toks.push(Tok::Gt);
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') && chars.get(i + 2) == Some(&'=') {
                    toks.push(Tok::StrictEq);
                    i += 3;
                } else if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Eq);
                    i += 2;
                } else {
                    return Err("assignment is not allowed".to_string());
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') && chars.get(i + 2) == Some(&'=') {
                    toks.push(Tok::StrictNe);
                    i += 3;
                } else if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Ne);
                    i += 2;
                } else {
                    toks.push(Tok::Not);
                    i += 1;
                }
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    toks.push(Tok::And);
                    i += 2;
                } else {
                    return Err("bitwise '&' is not allowed".to_string());
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    toks.push(Tok::Or);
                    i += 2;
                } else {
                    return Err("bitwise '|' is not allowed".to_string());
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut out = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&'\\') => {
                            i += 1;
                            match chars.get(i) {
                                Some(&'n') => out.push('\n'),
                                Some(&'t') => out.push('\t'),
                                Some(&esc) => out.push(esc),
                                None => return Err("unterminated escape".to_string()),
                            }
                            i += 1;
                        }
                        Some(&ch) => {
                            out.push(ch);
                            i += 1;
                        }
                    }
                }
                toks.push(Tok::Str(out));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    // a dot not followed by a digit is member access, not a fraction
                    if chars[i] == '.'
                        && !chars.get(i + 1).map(char::is_ascii_digit).unwrap_or(false)
                    {
                        break;
                    }
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let num = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number literal '{text}'"))?;
                toks.push(Tok::Num(num));
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                toks.push(match word.as_str() {
                    "true" => Tok::True,
                    "false" => Tok::False,
                    "null" => Tok::Null,
                    _ => Tok::Ident(word),
                });
            }
            other => return Err(format!("character '{other}' is not allowed")),
        }
    }

    Ok(toks)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), String> {
        match self.next() {
            Some(found) if found == *tok => Ok(()),
            Some(found) => Err(format!("expected {tok:?}, found {found:?}")),
            None => Err(format!("expected {tok:?}, found end of input")),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, String> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Tok::Or) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_equality()?;
        while self.peek() == Some(&Tok::And) {
            self.next();
            let right = self.parse_equality()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Eq) => BinaryOp::Eq,
                Some(Tok::StrictEq) => BinaryOp::StrictEq,
                Some(Tok::Ne) => BinaryOp::Ne,
                Some(Tok::StrictNe) => BinaryOp::StrictNe,
                _ => break,
            };
            self.next();
            let right = self.parse_relational()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Lt) => BinaryOp::Lt,
                Some(Tok::Le) => BinaryOp::Le,
                Some(Tok::Gt) => BinaryOp::Gt,
                Some(Tok::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.next();
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinaryOp::Add,
                Some(Tok::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.next();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinaryOp::Mul,
                Some(Tok::Slash) => BinaryOp::Div,
                Some(Tok::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.next();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some(Tok::Not) => {
                self.next();
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(self.parse_unary()?),
                })
            }
            Some(Tok::Minus) => {
                self.next();
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(self.parse_unary()?),
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Tok::Dot) => {
                    self.next();
                    match self.next() {
                        Some(Tok::Ident(name)) => {
                            expr = Expr::Member {
                                target: Box::new(expr),
                                name,
                            };
                        }
                        other => return Err(format!("expected property name, found {other:?}")),
                    }
                }
                Some(Tok::LBracket) => {
                    self.next();
                    let index = self.parse_expression()?;
                    self.expect(&Tok::RBracket)?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Tok::Num(n)) => Ok(Expr::Literal(number_value(n)?)),
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Tok::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Tok::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Tok::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Tok::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Tok::LParen) => {
                let expr = self.parse_expression()?;
                self.expect(&Tok::RParen)?;
                Ok(expr)
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

fn number_value(n: f64) -> Result<Value, String> {
    if !n.is_finite() {
        return Err("non-finite arithmetic result".to_string());
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Ok(Value::Number(Number::from(n as i64)));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| "non-finite arithmetic result".to_string())
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

fn to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null, Value::Null) => true,
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            left == right
        }
        _ => match (to_number(left), to_number(right)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => {
            std::mem::discriminant(left) == std::mem::discriminant(right) && left == right
        }
    }
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Some(a.cmp(b));
    }
    let (a, b) = (to_number(left)?, to_number(right)?);
    a.partial_cmp(&b)
}

fn eval(expr: &Expr, bindings: &ScriptBindings) -> Result<Value, String> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => bindings
            .get(name)
            .cloned()
            .ok_or_else(|| format!("unknown identifier '{name}'")),
        Expr::Member { target, name } => {
            let target = eval(target, bindings)?;
            Ok(member(&target, name))
        }
        Expr::Index { target, index } => {
            let target = eval(target, bindings)?;
            let index = eval(index, bindings)?;
            Ok(index_value(&target, &index))
        }
        Expr::Unary { op, operand } => {
            let operand = eval(operand, bindings)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!is_truthy(&operand))),
                UnaryOp::Neg => {
                    let n = to_number(&operand)
                        .ok_or_else(|| "cannot negate non-numeric value".to_string())?;
                    number_value(-n)
                }
            }
        }
        Expr::Binary { op, left, right } => {
            // JS-style value-returning short circuit for && and ||
            if *op == BinaryOp::And {
                let lhs = eval(left, bindings)?;
                return if is_truthy(&lhs) {
                    eval(right, bindings)
                } else {
                    Ok(lhs)
                };
            }
            if *op == BinaryOp::Or {
                let lhs = eval(left, bindings)?;
                return if is_truthy(&lhs) {
                    Ok(lhs)
                } else {
                    eval(right, bindings)
                };
            }

            let lhs = eval(left, bindings)?;
            let rhs = eval(right, bindings)?;
            match op {
                BinaryOp::Add => {
                    if matches!(lhs, Value::String(_)) || matches!(rhs, Value::String(_)) {
                        Ok(Value::String(format!(
                            "{}{}",
                            to_display(&lhs),
                            to_display(&rhs)
                        )))
                    } else {
                        let (a, b) = numeric_operands(&lhs, &rhs, "+")?;
                        number_value(a + b)
                    }
                }
                BinaryOp::Sub => {
                    let (a, b) = numeric_operands(&lhs, &rhs, "-")?;
                    number_value(a - b)
                }
                BinaryOp::Mul => {
                    let (a, b) = numeric_operands(&lhs, &rhs, "*")?;
                    number_value(a * b)
                }
                BinaryOp::Div => {
                    let (a, b) = numeric_operands(&lhs, &rhs, "/")?;
                    number_value(a / b)
                }
                BinaryOp::Rem => {
                    let (a, b) = numeric_operands(&lhs, &rhs, "%")?;
                    number_value(a % b)
                }
                BinaryOp::Lt => Ok(Value::Bool(matches!(
                    compare(&lhs, &rhs),
                    Some(std::cmp::Ordering::Less)
                ))),
                BinaryOp::Le => Ok(Value::Bool(matches!(
                    compare(&lhs, &rhs),
                    Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
                ))),
                BinaryOp::Gt => Ok(Value::Bool(matches!(
                    compare(&lhs, &rhs),
                    Some(std::cmp::Ordering::Greater)
                ))),
                BinaryOp::Ge => Ok(Value::Bool(matches!(
                    compare(&lhs, &rhs),
                    Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
                ))),
                BinaryOp::Eq => Ok(Value::Bool(loose_eq(&lhs, &rhs))),
                BinaryOp::Ne => Ok(Value::Bool(!loose_eq(&lhs, &rhs))),
                BinaryOp::StrictEq => Ok(Value::Bool(strict_eq(&lhs, &rhs))),
                BinaryOp::StrictNe => Ok(Value::Bool(!strict_eq(&lhs, &rhs))),
                BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
            }
        }
    }
}

fn numeric_operands(lhs: &Value, rhs: &Value, op: &str) -> Result<(f64, f64), String> {
    match (to_number(lhs), to_number(rhs)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(format!("invalid operands for '{op}'")),
    }
}

fn member(target: &Value, name: &str) -> Value {
    match target {
        Value::Object(obj) => obj.get(name).cloned().unwrap_or(Value::Null),
        Value::Array(arr) if name == "length" => Value::Number(Number::from(arr.len())),
        Value::String(s) if name == "length" => {
            Value::Number(Number::from(s.chars().count()))
        }
        _ => Value::Null,
    }
}

fn index_value(target: &Value, index: &Value) -> Value {
    match (target, index) {
        (Value::Array(arr), Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0)
            .and_then(|f| arr.get(f as usize))
            .cloned()
            .unwrap_or(Value::Null),
        (Value::Object(obj), Value::String(key)) => {
            obj.get(key).cloned().unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

/// A compiled safe-interpreter program
pub struct SafeScript {
    source: String,
    expr: Expr,
}

impl CompiledScript for SafeScript {
    fn run(&self, bindings: &ScriptBindings) -> JsonPathResult<Value> {
        eval(&self.expr, bindings)
            .map_err(|msg| JsonPathError::expression(msg, &self.source))
    }
}

/// The default compile-once-run-many safe backend
pub struct SafeEngine;

impl ExpressionEngine for SafeEngine {
    fn compile(&self, source: &str) -> JsonPathResult<Arc<dyn CompiledScript>> {
        let toks = lex(source).map_err(|msg| JsonPathError::expression(msg, source))?;
        let mut parser = Parser { toks, pos: 0 };
        let expr = parser
            .parse_expression()
            .map_err(|msg| JsonPathError::expression(msg, source))?;
        if parser.peek().is_some() {
            return Err(JsonPathError::expression(
                "trailing tokens after expression",
                source,
            ));
        }
        Ok(Arc::new(SafeScript {
            source: source.to_string(),
            expr,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(source: &str, bindings: &ScriptBindings) -> JsonPathResult<Value> {
        SafeEngine.compile(source)?.run(bindings)
    }

    fn bindings_with(value: Value) -> ScriptBindings {
        let mut bindings = ScriptBindings::new();
        bindings.insert("_$_v".to_string(), value);
        bindings
    }

    #[test]
    fn evaluates_comparisons_and_arithmetic() {
        let bindings = bindings_with(json!({"n": 2}));
        assert_eq!(run("_$_v.n>1", &bindings).expect("eval"), json!(true));
        assert_eq!(run("_$_v.n*3", &bindings).expect("eval"), json!(6));
        assert_eq!(run("(_$_v.n+1)%2", &bindings).expect("eval"), json!(1));
    }

    #[test]
    fn member_length_and_indexing() {
        let bindings = bindings_with(json!({"items": [10, 20, 30], "name": "ab"}));
        assert_eq!(
            run("_$_v.items.length-1", &bindings).expect("eval"),
            json!(2)
        );
        assert_eq!(run("_$_v.items[1]", &bindings).expect("eval"), json!(20));
        assert_eq!(run("_$_v.name.length", &bindings).expect("eval"), json!(2));
    }

    #[test]
    fn logical_ops_return_values() {
        let bindings = bindings_with(json!({"a": 0, "b": "x"}));
        assert_eq!(run("_$_v.a||_$_v.b", &bindings).expect("eval"), json!("x"));
        assert_eq!(run("_$_v.b&&_$_v.a", &bindings).expect("eval"), json!(0));
        assert_eq!(run("!_$_v.a", &bindings).expect("eval"), json!(true));
    }

    #[test]
    fn loose_and_strict_equality_differ() {
        let bindings = bindings_with(json!({"n": "2"}));
        assert_eq!(run("_$_v.n==2", &bindings).expect("eval"), json!(true));
        assert_eq!(run("_$_v.n===2", &bindings).expect("eval"), json!(false));
    }

    #[test]
    fn refuses_disallowed_syntax() {
        let bindings = ScriptBindings::new();
        assert!(run("x = 1", &bindings).is_err(), "assignment must be refused");
        assert!(run("a; b", &bindings).is_err(), "statements must be refused");
        assert!(
            run("missing", &bindings).is_err(),
            "unknown identifiers must be refused"
        );
    }

    #[test]
    fn missing_members_compare_as_null() {
        let bindings = bindings_with(json!({}));
        assert_eq!(run("_$_v.gone==null", &bindings).expect("eval"), json!(true));
    }
}
