//! Sum/difference formulas such as `wages + interest + dividends` or `gross - deductions`.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::domain::FormFields;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(char),
    #[error("invalid token '{0}'")]
    InvalidToken(String),
    #[error("operator at position {0} has no operand")]
    DanglingOperator(usize),
    #[error("missing operator before '{0}'")]
    MissingOperator(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("result exceeds the supported amount range")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Field(String),
    Literal(Decimal),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub sign: Sign,
    pub operand: Operand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    terms: Vec<Term>,
}

enum Token {
    Operator(Sign, usize),
    Operand(Operand, String),
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn classify_word(word: &str) -> Result<Operand, FormulaError> {
    let first = word.chars().next().unwrap_or('.');
    if first.is_ascii_digit() || first == '.' {
        return Decimal::from_str(word)
            .map(Operand::Literal)
            .map_err(|_| FormulaError::InvalidToken(word.to_string()));
    }
    if word.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(Operand::Field(word.to_string()))
    } else {
        Err(FormulaError::InvalidToken(word.to_string()))
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '+' => tokens.push(Token::Operator(Sign::Plus, position)),
            '-' => tokens.push(Token::Operator(Sign::Minus, position)),
            '*' | '/' | '%' | '^' | '(' | ')' | '=' | '<' | '>' => {
                return Err(FormulaError::UnsupportedOperator(c))
            }
            c if is_word_char(c) => {
                let mut word = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if !is_word_char(next) {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                let operand = classify_word(&word)?;
                tokens.push(Token::Operand(operand, word));
            }
            other => return Err(FormulaError::InvalidToken(other.to_string())),
        }
    }

    Ok(tokens)
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let mut terms = Vec::new();
        let mut pending: Option<(Sign, usize)> = None;
        let mut expect_operand = true;

        for token in tokenize(source)? {
            match token {
                Token::Operator(sign, position) => {
                    if !expect_operand {
                        pending = Some((sign, position));
                        expect_operand = true;
                    } else if terms.is_empty() && pending.is_none() {
                        // leading unary sign
                        pending = Some((sign, position));
                    } else {
                        return Err(FormulaError::DanglingOperator(position));
                    }
                }
                Token::Operand(operand, text) => {
                    if !expect_operand {
                        return Err(FormulaError::MissingOperator(text));
                    }
                    let sign = pending.take().map(|(sign, _)| sign).unwrap_or(Sign::Plus);
                    terms.push(Term { sign, operand });
                    expect_operand = false;
                }
            }
        }

        if let Some((_, position)) = pending {
            return Err(FormulaError::DanglingOperator(position));
        }
        if terms.is_empty() {
            return Err(FormulaError::Empty);
        }

        Ok(Self { terms })
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Field names referenced by the formula, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(|term| match &term.operand {
            Operand::Field(name) => Some(name.as_str()),
            Operand::Literal(_) => None,
        })
    }

    /// Evaluate against extracted fields; missing or non-numeric operands count as zero.
    pub fn evaluate(&self, fields: &FormFields) -> Result<Decimal, FormulaError> {
        self.terms.iter().try_fold(Decimal::ZERO, |total, term| {
            let value = match &term.operand {
                Operand::Field(name) => fields.number_or_zero(name),
                Operand::Literal(value) => *value,
            };
            match term.sign {
                Sign::Plus => total.checked_add(value),
                Sign::Minus => total.checked_sub(value),
            }
            .ok_or(FormulaError::Overflow)
        })
    }
}
