//--> Imports <--

use std::{
	fmt,
	ops::Range,
};

use logos::{
	Lexer,
	Logos,
};

use crate::{
	Error,
	ErrorList,
	SourceFile,
	field::{
		Modifiers,
		Radix,
		Value,
	},
};

//--> Type Aliases <--

pub type TokenStream = Vec<Token>;

pub(crate) type Result = std::result::Result<TokenStream, ErrorList>;

//--> Structs <--

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
	pub inner: TokenInner,
	pub line: usize,
	pub span: Range<usize>,
	pub source: String,
}

// Everything written in a variable field declaration such as `8V*X` or `4VH#A`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarSpec {
	pub width: u32,
	pub modifiers: Modifiers,
	pub dont_care: bool,
	pub radix: Option<Radix>,
	pub default: Option<Value>,
}

//--> Enums <--

#[derive(Clone, Debug, Logos, PartialEq)]
pub enum TokenInner {
	#[regex(r"[0-9]+[xX]", TokenInner::wildcard)]
	Wildcard(u32),

	#[regex(r"[0-9]+[vV][*\-:%$]*[xX]?([0-9]*[bBqQdDhH]#[0-9a-fA-F]*[*\-:%$]*)?", VarSpec::new)]
	Variable(VarSpec),

	#[regex(r"[0-9]*[bBqQdDhH]#[0-9a-fA-F]+[*\-:%$]*", TokenInner::literal)]
	Literal(Value),

	#[regex(r"[0-9][0-9a-fA-F]*", |l| String::from(l.slice()))]
	Number(String),

	#[regex(r"[_a-zA-Z][_0-9a-zA-Z]*", Word::new)]
	Word(Word),

	#[token("$")]
	Location,

	#[token(",")]
	Comma,

	#[token(":")]
	Colon,

	#[token("&")]
	Ampersand,

	#[token("+")]
	Plus,

	Newline,

	#[error]
	#[regex(r"[ \t\r\f]+", logos::skip)]
	#[regex(r";[^\n]*", logos::skip)]
	Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Word {
	Keyword(Kw),
	Identifier(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kw {
	Title,
	WordSize,
	Equate,
	Define,
	Subfield,
	End,
	Origin,
	Align,
	Reserve,
	FreeForm,
}

//--> Functions <--

pub(crate) fn lex(file: &SourceFile) -> Result {
	let mut tokens: TokenStream = Vec::new();
	let mut errs: ErrorList = Vec::new();

	tracing::debug!("{}: lexing file", file.path.display());

	for (line_num, line_text) in file.text.lines().enumerate() {
		let line_num = line_num + 1;

		// A title is free text, so only the keyword gets lexed.
		let trimmed = line_text.trim_start();
		if let Some(head) = trimmed.get(..5) {
			if head.eq_ignore_ascii_case("title") && trimmed[5..].chars().next().map_or(true, char::is_whitespace) {
				let start = line_text.len() - trimmed.len();
				tokens.push(Token::new(TokenInner::Word(Word::Keyword(Kw::Title)), line_num, start..start + 5, head));
				tokens.push(Token::new(TokenInner::Newline, line_num, line_text.len()..line_text.len(), "\n"));
				continue;
			}
		}

		for (token, span) in TokenInner::lexer(line_text).spanned() {
			if let TokenInner::Error = token {
				errs.push(Error::new(false, file.path.clone(), Some(line_num), Some(span.clone()), format!("Couldn't lex this text: {}", &line_text[span])));
			} else {
				tracing::trace!("{}: {}: {}..{}: got token {}", file.path.display(), line_num, span.start, span.end, &line_text[span.clone()]);
				tokens.push(Token::new(token, line_num, span.clone(), &line_text[span]));
			}
		}

		tokens.push(Token::new(TokenInner::Newline, line_num, line_text.len()..line_text.len(), "\n"));
	}

	if errs.is_empty() { Ok(tokens) } else { Err(errs) }
}

// Splits `2H#1F*` into its count prefix, radix, digits and modifier suffix.
fn split_literal(s: &str) -> Option<(Option<u32>, Radix, &str, Modifiers)> {
	let hash = s.find('#')?;
	let (head, tail) = (&s[..hash - 1], &s[hash + 1..]);
	let radix = Radix::from_letter(s[hash - 1..hash].chars().next()?)?;

	let digits = if head.is_empty() { None } else { Some(head.parse::<u32>().ok()?) };

	let end = tail.find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(tail.len());
	let modifiers = Modifiers::from_suffix(&tail[end..])?;

	Some((digits, radix, &tail[..end], modifiers))
}

impl Token {
	pub fn new(inner: TokenInner, line: usize, span: Range<usize>, slice: &str) -> Token {
		Token { inner, line, span, source: String::from(slice) }
	}
}

impl fmt::Display for Token {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match &self.inner {
			TokenInner::Wildcard(w) => write!(f, "a {} bit don't care field", w),
			TokenInner::Variable(v) => write!(f, "a {} bit variable field", v.width),
			TokenInner::Literal(v) => write!(f, "a constant {}", v),
			TokenInner::Number(n) => write!(f, "a number {}", n),
			TokenInner::Word(Word::Keyword(kw)) => write!(f, "the keyword {}", kw),
			TokenInner::Word(Word::Identifier(id)) => write!(f, "the name '{}'", id),
			TokenInner::Location => write!(f, "the location pointer"),
			TokenInner::Comma => write!(f, "a comma"),
			TokenInner::Colon => write!(f, "a colon"),
			TokenInner::Ampersand => write!(f, "an ampersand"),
			TokenInner::Plus => write!(f, "a plus sign"),
			TokenInner::Newline => write!(f, "the end of the line"),
			TokenInner::Error => write!(f, "invalid text"),
		}
	}
}

impl TokenInner {
	fn wildcard(l: &mut Lexer<TokenInner>) -> Option<u32> {
		let s = l.slice();

		s[..s.len() - 1].parse().ok()
	}

	fn literal(l: &mut Lexer<TokenInner>) -> Option<Value> {
		let (digits, radix, text, modifiers) = split_literal(l.slice())?;

		Value::from_literal(digits, radix, text, modifiers)
	}
}

impl VarSpec {
	pub fn new(l: &mut Lexer<TokenInner>) -> Option<VarSpec> {
		let s = l.slice();
		let v = s.find(|c: char| c == 'v' || c == 'V')?;
		let width = s[..v].parse::<u32>().ok()?;

		let mut rest = &s[v + 1..];
		let mods_end = rest.find(|c: char| !"*-:%$".contains(c)).unwrap_or(rest.len());
		let modifiers = Modifiers::from_suffix(&rest[..mods_end])?;
		rest = &rest[mods_end..];

		let dont_care = rest.starts_with(|c: char| c == 'x' || c == 'X');
		if dont_care { rest = &rest[1..]; }

		let (radix, default) = if rest.is_empty() {
			(None, None)
		} else {
			let (digits, radix, text, mods) = split_literal(rest)?;

			// A bare `H#` only declares the base.
			if text.is_empty() { (Some(radix), None) } else { (Some(radix), Some(Value::from_literal(digits, radix, text, mods)?)) }
		};

		Some(VarSpec { width, modifiers, dont_care, radix, default })
	}
}

impl Word {
	pub fn new(l: &mut Lexer<TokenInner>) -> Option<Word> {
		let s = String::from(l.slice());

		Some(match s.to_lowercase().as_str() {
			"title" => Word::Keyword(Kw::Title),
			"word" => Word::Keyword(Kw::WordSize),
			"equ" => Word::Keyword(Kw::Equate),
			"def" => Word::Keyword(Kw::Define),
			"sub" => Word::Keyword(Kw::Subfield),
			"end" => Word::Keyword(Kw::End),
			"org" => Word::Keyword(Kw::Origin),
			"align" => Word::Keyword(Kw::Align),
			"res" => Word::Keyword(Kw::Reserve),
			"ff" => Word::Keyword(Kw::FreeForm),
			_ => Word::Identifier(s)
		})
	}

	// The text as written, which is what a keyword means when it shows up as a bare hex argument.
	pub fn text(&self) -> String {
		match self {
			Word::Keyword(kw) => kw.to_string(),
			Word::Identifier(id) => id.clone(),
		}
	}
}

impl fmt::Display for Kw {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Kw::Title => write!(f, "TITLE"),
			Kw::WordSize => write!(f, "WORD"),
			Kw::Equate => write!(f, "EQU"),
			Kw::Define => write!(f, "DEF"),
			Kw::Subfield => write!(f, "SUB"),
			Kw::End => write!(f, "END"),
			Kw::Origin => write!(f, "ORG"),
			Kw::Align => write!(f, "ALIGN"),
			Kw::Reserve => write!(f, "RES"),
			Kw::FreeForm => write!(f, "FF"),
		}
	}
}

//--> Tests <--
