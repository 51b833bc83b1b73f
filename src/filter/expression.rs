//! Boolean expressions over a record's fields.
//!
//! A small, closed grammar: literals, the record variables, indexing,
//! arithmetic, comparisons, membership and boolean connectives. Nothing can
//! be called and nothing outside the record is reachable.
//!
//! Variables: `seqid source type start end score strand phase attributes`.
//! `start` is 1-based, `phase` is a string (`"."` when absent), `score` is
//! `None` when absent and `attributes` is indexed with a string key.
//!
//! ```
//! use gfftool::filter::expression::Expression;
//!
//! let e = Expression::parse("type == 'exon' and (end - start) >= 100").unwrap();
//! # let _ = e;
//! ```

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

use crate::annotation::Attributes;
use crate::filter::{Filter, FilterError, FilterParam};
use crate::model::Feature;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("unexpected character '{ch}' at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string starting at offset {pos}")]
    UnterminatedString { pos: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unexpected {found} at offset {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),
}

// -------------------- lexer --------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    True,
    False,
    NoneLit,
    And,
    Or,
    Not,
    In,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "number {n}"),
            Token::Str(s) => write!(f, "string {s:?}"),
            Token::Ident(s) => write!(f, "name '{s}'"),
            Token::True => f.write_str("'True'"),
            Token::False => f.write_str("'False'"),
            Token::NoneLit => f.write_str("'None'"),
            Token::And => f.write_str("'and'"),
            Token::Or => f.write_str("'or'"),
            Token::Not => f.write_str("'not'"),
            Token::In => f.write_str("'in'"),
            Token::Eq => f.write_str("'=='"),
            Token::Ne => f.write_str("'!='"),
            Token::Lt => f.write_str("'<'"),
            Token::Le => f.write_str("'<='"),
            Token::Gt => f.write_str("'>'"),
            Token::Ge => f.write_str("'>='"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::Percent => f.write_str("'%'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<(Token, usize)>, ExpressionError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut out = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) {
            let begin = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            // exponent, e.g. 1e-5
            if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j].1, '+' | '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].1.is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].1.is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[begin..i].iter().map(|&(_, c)| c).collect();
            let n = text
                .parse::<f64>()
                .map_err(|_| ExpressionError::InvalidNumber(text.clone()))?;
            out.push((Token::Num(n), pos));
            continue;
        }

        if c == '\'' || c == '"' {
            let quote = c;
            let mut s = String::new();
            i += 1;
            loop {
                let Some(&(_, ch)) = chars.get(i) else {
                    return Err(ExpressionError::UnterminatedString { pos });
                };
                i += 1;
                match ch {
                    '\\' => {
                        let Some(&(_, esc)) = chars.get(i) else {
                            return Err(ExpressionError::UnterminatedString { pos });
                        };
                        i += 1;
                        s.push(match esc {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                    }
                    ch if ch == quote => break,
                    ch => s.push(ch),
                }
            }
            out.push((Token::Str(s), pos));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let begin = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let word: String = chars[begin..i].iter().map(|&(_, c)| c).collect();
            let tok = match word.as_str() {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                "in" => Token::In,
                "True" => Token::True,
                "False" => Token::False,
                "None" => Token::NoneLit,
                _ => Token::Ident(word),
            };
            out.push((tok, pos));
            continue;
        }

        let two = next.map(|n| [c, n]);
        let (tok, width) = match two {
            Some(['=', '=']) => (Token::Eq, 2),
            Some(['!', '=']) => (Token::Ne, 2),
            Some(['<', '=']) => (Token::Le, 2),
            Some(['>', '=']) => (Token::Ge, 2),
            Some(['&', '&']) => (Token::And, 2),
            Some(['|', '|']) => (Token::Or, 2),
            _ => match c {
                '<' => (Token::Lt, 1),
                '>' => (Token::Gt, 1),
                '!' => (Token::Not, 1),
                '+' => (Token::Plus, 1),
                '-' => (Token::Minus, 1),
                '*' => (Token::Star, 1),
                '/' => (Token::Slash, 1),
                '%' => (Token::Percent, 1),
                '(' => (Token::LParen, 1),
                ')' => (Token::RParen, 1),
                '[' => (Token::LBracket, 1),
                ']' => (Token::RBracket, 1),
                ',' => (Token::Comma, 1),
                _ => return Err(ExpressionError::UnexpectedChar { ch: c, pos }),
            },
        };
        out.push((tok, pos));
        i += width;
    }

    Ok(out)
}

// -------------------- syntax tree --------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Var {
    SeqId,
    Source,
    Type,
    Start,
    End,
    Score,
    Strand,
    Phase,
    Attributes,
}

impl Var {
    fn lookup(name: &str) -> Option<Var> {
        Some(match name {
            "seqid" => Var::SeqId,
            "source" => Var::Source,
            "type" => Var::Type,
            "start" => Var::Start,
            "end" => Var::End,
            "score" => Var::Score,
            "strand" => Var::Strand,
            "phase" => Var::Phase,
            "attributes" => Var::Attributes,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Str(String),
    Bool(bool),
    None,
    Var(Var),
    List(Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `a < b <= c` style chains, each link compared pairwise.
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

// -------------------- parser --------------------

/// Deepest syntax tree the parser will build. Nesting and operator chains
/// both count.
pub const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> ExpressionError {
        match self.tokens.get(self.pos) {
            Some((tok, pos)) => ExpressionError::UnexpectedToken {
                found: tok.to_string(),
                pos: *pos,
            },
            None => ExpressionError::UnexpectedEnd,
        }
    }

    fn enter(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn expect(&mut self, tok: &Token) -> Result<(), ExpressionError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_and()?;
        let mut levels = 0;
        while self.eat(&Token::Or) {
            self.enter()?;
            levels += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        self.leave(levels);
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_not()?;
        let mut levels = 0;
        while self.eat(&Token::And) {
            self.enter()?;
            levels += 1;
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        self.leave(levels);
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Not) {
            self.enter()?;
            let inner = self.parse_not()?;
            self.leave(1);
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let first = self.parse_additive()?;
        let mut links = Vec::new();
        loop {
            let (op, width) = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Eq), _) => (CmpOp::Eq, 1),
                (Some(Token::Ne), _) => (CmpOp::Ne, 1),
                (Some(Token::Lt), _) => (CmpOp::Lt, 1),
                (Some(Token::Le), _) => (CmpOp::Le, 1),
                (Some(Token::Gt), _) => (CmpOp::Gt, 1),
                (Some(Token::Ge), _) => (CmpOp::Ge, 1),
                (Some(Token::In), _) => (CmpOp::In, 1),
                (Some(Token::Not), Some(Token::In)) => (CmpOp::NotIn, 2),
                _ => break,
            };
            self.pos += width;
            links.push((op, self.parse_additive()?));
        }
        if links.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), links))
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_multiplicative()?;
        let mut levels = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => {
                    self.leave(levels);
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.enter()?;
            levels += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.parse_unary()?;
        let mut levels = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => {
                    self.leave(levels);
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.enter()?;
            levels += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Minus) {
            self.enter()?;
            let inner = self.parse_unary()?;
            self.leave(1);
            return Ok(Expr::Neg(Box::new(inner)));
        }
        if self.eat(&Token::Plus) {
            self.enter()?;
            let inner = self.parse_unary()?;
            self.leave(1);
            return Ok(inner);
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.parse_atom()?;
        let mut levels = 0;
        while self.eat(&Token::LBracket) {
            self.enter()?;
            levels += 1;
            let index = self.parse_or()?;
            self.expect(&Token::RBracket)?;
            expr = Expr::Index(Box::new(expr), Box::new(index));
        }
        self.leave(levels);
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expr, ExpressionError> {
        let err = self.unexpected();
        let Some(tok) = self.bump() else {
            return Err(err);
        };
        match tok {
            Token::Num(n) => Ok(Expr::Num(n)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::NoneLit => Ok(Expr::None),
            Token::Ident(name) => Var::lookup(&name)
                .map(Expr::Var)
                .ok_or(ExpressionError::UnknownVariable(name)),
            Token::LParen => {
                self.enter()?;
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                self.leave(1);
                Ok(inner)
            }
            Token::LBracket => {
                self.enter()?;
                let mut items = Vec::new();
                while !self.eat(&Token::RBracket) {
                    items.push(self.parse_or()?);
                    if !self.eat(&Token::Comma) {
                        self.expect(&Token::RBracket)?;
                        break;
                    }
                }
                self.leave(1);
                Ok(Expr::List(items))
            }
            _ => Err(err),
        }
    }
}

// -------------------- evaluation --------------------

#[derive(Debug, Clone, PartialEq)]
enum Value<'a> {
    None,
    Bool(bool),
    Num(f64),
    Str(Cow<'a, str>),
    List(Vec<Value<'a>>),
    Attrs(&'a Attributes),
}

impl Value<'_> {
    fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(v) => !v.is_empty(),
            Value::Attrs(m) => !m.is_empty(),
        }
    }

    fn order(&self, other: &Value<'_>) -> Option<Ordering> {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.as_ref().cmp(b.as_ref())),
            _ => None,
        }
    }

    /// `needle in self`; `None` when `self` is not a container of that kind.
    fn contains(&self, needle: &Value<'_>) -> Option<bool> {
        match (self, needle) {
            (Value::Str(hay), Value::Str(n)) => Some(hay.contains(n.as_ref())),
            (Value::List(items), n) => Some(items.iter().any(|v| v == n)),
            (Value::Attrs(m), Value::Str(k)) => Some(m.contains_key(k.as_ref())),
            _ => None,
        }
    }
}

fn arith<'a>(op: BinOp, lhs: Value<'a>, rhs: Value<'a>) -> Value<'a> {
    match (op, lhs, rhs) {
        (BinOp::Add, Value::Num(a), Value::Num(b)) => Value::Num(a + b),
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Value::Str(Cow::Owned(format!("{a}{b}"))),
        (BinOp::Add, Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Value::List(a)
        }
        (BinOp::Sub, Value::Num(a), Value::Num(b)) => Value::Num(a - b),
        (BinOp::Mul, Value::Num(a), Value::Num(b)) => Value::Num(a * b),
        (BinOp::Div, Value::Num(a), Value::Num(b)) if b != 0.0 => Value::Num(a / b),
        // sign follows the divisor
        (BinOp::Mod, Value::Num(a), Value::Num(b)) if b != 0.0 => Value::Num(((a % b) + b) % b),
        _ => Value::None,
    }
}

fn index<'a>(target: Value<'a>, key: Value<'a>) -> Value<'a> {
    match (target, key) {
        (Value::Attrs(m), Value::Str(k)) => m
            .get(k.as_ref())
            .map(|v| Value::Str(Cow::Borrowed(v.as_str())))
            .unwrap_or(Value::None),
        (Value::List(items), Value::Num(n)) => position(n, items.len())
            .and_then(|i| items.into_iter().nth(i))
            .unwrap_or(Value::None),
        (Value::Str(s), Value::Num(n)) => {
            let count = s.chars().count();
            position(n, count)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::Str(Cow::Owned(c.to_string())))
                .unwrap_or(Value::None)
        }
        _ => Value::None,
    }
}

/// Integral, possibly negative, index into a sequence of length `len`.
fn position(n: f64, len: usize) -> Option<usize> {
    if n.fract() != 0.0 {
        return None;
    }
    let i = if n < 0.0 { len as f64 + n } else { n };
    (i >= 0.0 && i < len as f64).then_some(i as usize)
}

fn compare(op: CmpOp, lhs: &Value<'_>, rhs: &Value<'_>) -> bool {
    match op {
        CmpOp::Eq => lhs == rhs,
        CmpOp::Ne => lhs != rhs,
        CmpOp::Lt => lhs.order(rhs) == Some(Ordering::Less),
        CmpOp::Le => matches!(lhs.order(rhs), Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => lhs.order(rhs) == Some(Ordering::Greater),
        CmpOp::Ge => matches!(lhs.order(rhs), Some(Ordering::Greater | Ordering::Equal)),
        CmpOp::In => rhs.contains(lhs).unwrap_or(false),
        CmpOp::NotIn => rhs.contains(lhs).map(|b| !b).unwrap_or(false),
    }
}

fn variable(var: Var, feature: &Feature) -> Value<'_> {
    match var {
        Var::SeqId => Value::Str(Cow::Borrowed(feature.seqname())),
        Var::Source => Value::Str(Cow::Borrowed(feature.source.as_str())),
        Var::Type => Value::Str(Cow::Borrowed(feature.feature_type.as_str())),
        Var::Start => Value::Num((feature.interval.start + 1) as f64),
        Var::End => Value::Num(feature.interval.end as f64),
        Var::Score => feature.score.map(Value::Num).unwrap_or(Value::None),
        Var::Strand => Value::Str(Cow::Borrowed(feature.strand().as_str())),
        Var::Phase => Value::Str(Cow::Owned(feature.phase_str())),
        Var::Attributes => Value::Attrs(&feature.attributes),
    }
}

fn eval<'a>(expr: &'a Expr, feature: &'a Feature) -> Value<'a> {
    match expr {
        Expr::Num(n) => Value::Num(*n),
        Expr::Str(s) => Value::Str(Cow::Borrowed(s.as_str())),
        Expr::Bool(b) => Value::Bool(*b),
        Expr::None => Value::None,
        Expr::Var(v) => variable(*v, feature),
        Expr::List(items) => Value::List(items.iter().map(|e| eval(e, feature)).collect()),
        Expr::Index(target, key) => index(eval(target, feature), eval(key, feature)),
        Expr::Neg(inner) => match eval(inner, feature) {
            Value::Num(n) => Value::Num(-n),
            _ => Value::None,
        },
        Expr::Not(inner) => Value::Bool(!eval(inner, feature).truthy()),
        Expr::Binary(op, l, r) => arith(*op, eval(l, feature), eval(r, feature)),
        Expr::Compare(first, links) => {
            let mut lhs = eval(first, feature);
            for (op, next) in links {
                let rhs = eval(next, feature);
                if !compare(*op, &lhs, &rhs) {
                    return Value::Bool(false);
                }
                lhs = rhs;
            }
            Value::Bool(true)
        }
        // operand values come back, as with Python's `and`/`or`
        Expr::And(l, r) => {
            let lhs = eval(l, feature);
            if lhs.truthy() {
                eval(r, feature)
            } else {
                lhs
            }
        }
        Expr::Or(l, r) => {
            let lhs = eval(l, feature);
            if lhs.truthy() {
                lhs
            } else {
                eval(r, feature)
            }
        }
    }
}

/// A parsed expression, ready to be evaluated against records.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Expr,
}

impl Expression {
    /// Parse and resolve variable names.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let root = parser.parse_or()?;
        if parser.peek().is_some() {
            return Err(parser.unexpected());
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Truthiness of the expression for this record.
    pub fn eval(&self, feature: &Feature) -> bool {
        eval(&self.root, feature).truthy()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Pass records for which every configured expression is truthy.
#[derive(Debug, Clone, Default)]
pub struct ExpressionFilter {
    expressions: Vec<Expression>,
}

impl ExpressionFilter {
    pub fn new(param: &FilterParam) -> Result<Self, FilterError> {
        let expressions = param
            .values()
            .into_iter()
            .map(|text| {
                Expression::parse(text).map_err(|source| FilterError::InvalidExpression {
                    expression: text.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { expressions })
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }
}

impl Filter for ExpressionFilter {
    fn name(&self) -> &'static str {
        "expression"
    }

    fn matches(&self, feature: &Feature) -> bool {
        self.expressions.iter().all(|e| e.eval(feature))
    }
}
