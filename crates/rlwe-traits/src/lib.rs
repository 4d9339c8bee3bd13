#![crate_name = "rlwe_traits"]
#![crate_type = "lib"]
#![warn(missing_docs, unused_imports)]

//! Serialization traits for the rlwe.rs library.

use std::fmt::{Display, Formatter};
use std::io::{Read, Write};
use std::str::FromStr;
use std::sync::Arc;

/// Binary serialization into a byte stream.
pub trait WriteBinary {
    /// Write the binary representation of `self` into `writer`.
    fn write_binary<W: Write>(&self, writer: &mut W) -> std::io::Result<()>;

    /// Serialize `self` into a vector of bytes.
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        // Writing into a vector of bytes never fails.
        let _ = self.write_binary(&mut out);
        out
    }
}

/// Binary deserialization using the specified parameters.
pub trait ReadBinary
where
    Self: Sized,
{
    /// The type of error returned.
    type Error: From<std::io::Error>;

    /// The type of the parameters used to deserialize.
    type Parameters;

    /// Attempt to read `Self` from `reader`.
    fn read_binary<R: Read>(reader: &mut R, par: &Arc<Self::Parameters>)
        -> Result<Self, Self::Error>;

    /// Attempt to deserialize from a slice of bytes.
    fn from_bytes(bytes: &[u8], par: &Arc<Self::Parameters>) -> Result<Self, Self::Error> {
        let mut reader = bytes;
        Self::read_binary(&mut reader, par)
    }
}

/// Text serialization as bracket-delimited, whitespace-separated tokens.
pub trait WriteText {
    /// Append the text representation of `self` to `out`.
    fn write_text(&self, out: &mut String);

    /// Serialize `self` into a string.
    fn to_text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out);
        out
    }
}

/// Text deserialization using the specified parameters.
pub trait ReadText
where
    Self: Sized,
{
    /// The type of error returned.
    type Error: From<ParseError>;

    /// The type of the parameters used to deserialize.
    type Parameters;

    /// Attempt to read `Self` from the token stream.
    fn read_text(tokens: &mut TextReader<'_>, par: &Arc<Self::Parameters>)
        -> Result<Self, Self::Error>;

    /// Attempt to deserialize from a string.
    fn from_text(text: &str, par: &Arc<Self::Parameters>) -> Result<Self, Self::Error> {
        Self::read_text(&mut TextReader::new(text), par)
    }
}

/// Error raised while reading a text representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub String);

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.0)
    }
}

impl std::error::Error for ParseError {}

/// Tokenizer over a text representation. Brackets are tokens on their own,
/// any other token is a maximal run of non-whitespace, non-bracket characters.
#[derive(Debug, Clone)]
pub struct TextReader<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> TextReader<'a> {
    /// Create a reader over the input string.
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.input[self.position..];
        self.position += rest.len() - rest.trim_start().len();
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Option<&'a str> {
        self.skip_whitespace();
        let input: &'a str = self.input;
        let rest = &input[self.position..];
        let first = rest.chars().next()?;
        if first == '[' || first == ']' {
            return Some(&rest[..1]);
        }
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '[' || c == ']')
            .unwrap_or(rest.len());
        Some(&rest[..end])
    }

    /// Consume and return the next token.
    pub fn next_token(&mut self) -> Result<&'a str, ParseError> {
        let token = self
            .peek()
            .ok_or_else(|| ParseError("unexpected end of input".to_string()))?;
        self.position += token.len();
        Ok(token)
    }

    /// Consume the next token, which must be equal to `expected`.
    pub fn expect(&mut self, expected: &str) -> Result<(), ParseError> {
        let token = self.next_token()?;
        if token == expected {
            Ok(())
        } else {
            Err(ParseError(format!("expected `{expected}`, found `{token}`")))
        }
    }

    /// Consume an opening bracket.
    pub fn open(&mut self) -> Result<(), ParseError> {
        self.expect("[")
    }

    /// Consume a closing bracket.
    pub fn close(&mut self) -> Result<(), ParseError> {
        self.expect("]")
    }

    /// Returns whether the next token is a closing bracket.
    pub fn at_close(&mut self) -> bool {
        self.peek() == Some("]")
    }

    /// Consume the next token and parse it.
    pub fn parse<T: FromStr>(&mut self) -> Result<T, ParseError> {
        let token = self.next_token()?;
        token
            .parse::<T>()
            .map_err(|_| ParseError(format!("cannot parse `{token}`")))
    }

    /// Parse a bracketed list of values.
    pub fn parse_list<T: FromStr>(&mut self) -> Result<Vec<T>, ParseError> {
        self.open()?;
        let mut out = vec![];
        while !self.at_close() {
            out.push(self.parse()?);
        }
        self.close()?;
        Ok(out)
    }
}

/// Append a bracketed list of values to `out`.
pub fn write_list<T: Display>(out: &mut String, values: &[T]) {
    out.push('[');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
}
