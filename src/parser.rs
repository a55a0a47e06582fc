//--> Imports <--

use std::ops::Range;

use crate::{
	Error,
	ErrorList,
	SourceFile,
	context::{
		CompilationContext,
		Pass,
	},
	error::{
		AsmError,
		AsmResult,
	},
	field::{
		Field,
		Value,
		Variable,
	},
	lexer::{
		Kw,
		Token,
		TokenInner,
		TokenStream,
		VarSpec,
		Word,
	},
	symbol::{
		Constant,
		Fragment,
		Symbol,
		SymbolTable,
		Template,
	},
};

//--> Type Aliases <--

type StatementResult = Result<Flow, Fault>;

//--> Structs <--

// The tokens of one statement. A line ending in a comma continues on the next one.
struct Statement<'a> {
	tokens: Vec<&'a Token>,
	pos: usize,
}

struct Fault {
	error: AsmError,
	line: usize,
	span: Option<Range<usize>>,
}

//--> Enums <--

enum Flow {
	Continue,
	End,
}

// A declaration under construction.
enum Target {
	Sub(Fragment),
	Def(Template),
}

//--> Functions <--

/// Feeds every statement of a file to the context, according to its current pass.
///
/// A statement that fails is dropped and reported; the rest of the file is still read.
pub(crate) fn run(ctx: &mut CompilationContext, file: &SourceFile, tokens: &TokenStream) -> ErrorList {
	let mut errs: ErrorList = Vec::new();
	let mut ended = false;

	for mut stmt in statements(tokens) {
		let result = match ctx.pass() {
			Pass::Definition => definition(ctx, file, &mut stmt),
			Pass::Address | Pass::Emit => source(ctx, file, &mut stmt),
		};

		match result {
			Ok(Flow::Continue) => {},
			Ok(Flow::End) => { ended = true; break; },
			Err(fault) => errs.push(Error::new(false, file.path.clone(), Some(fault.line), fault.span, fault.error.to_string())),
		}
	}

	// The source file is read twice, so only warn once.
	if !ended && ctx.pass() != Pass::Address {
		errs.push(Error::new(true, file.path.clone(), None, None, String::from("Missing END statement")));
	}

	errs
}

fn statements(tokens: &TokenStream) -> Vec<Statement> {
	let mut stmts = Vec::new();
	let mut current: Vec<&Token> = Vec::new();

	for token in tokens {
		if let TokenInner::Newline = token.inner {
			if let Some(TokenInner::Comma) = current.last().map(|t| &t.inner) { continue; }

			if !current.is_empty() {
				stmts.push(Statement { tokens: current, pos: 0 });
				current = Vec::new();
			}
		} else { current.push(token); }
	}

	if !current.is_empty() { stmts.push(Statement { tokens: current, pos: 0 }); }

	stmts
}

fn rest_of_line<'a>(file: &'a SourceFile, token: &Token) -> &'a str {
	file.text.lines().nth(token.line - 1).and_then(|l| l.get(token.span.end..)).unwrap_or("")
}

//--> Definition File <--

fn definition(ctx: &mut CompilationContext, file: &SourceFile, stmt: &mut Statement) -> StatementResult {
	let first = stmt.advance_or("Expected a statement")?;

	match &first.inner {
		TokenInner::Word(Word::Keyword(Kw::Title)) => {
			ctx.set_title(rest_of_line(file, first));
			Ok(Flow::Continue)
		},
		TokenInner::Word(Word::Keyword(Kw::WordSize)) => {
			let w = stmt.number(ctx)?;
			stmt.expect_end()?;
			ctx.set_word_size(w).map_err(|e| Fault::at(e, first))?;
			Ok(Flow::Continue)
		},
		TokenInner::Word(Word::Keyword(Kw::End)) => {
			stmt.expect_end()?;
			Ok(Flow::End)
		},
		TokenInner::Word(Word::Identifier(name)) => {
			stmt.expect_colon()?;
			let kind = stmt.advance_or("Expected EQU, DEF, or SUB")?;

			let symbol = match &kind.inner {
				TokenInner::Word(Word::Keyword(Kw::Equate)) => {
					let value = stmt.term(ctx)?;
					stmt.expect_end()?;
					Symbol::Constant(Constant::new(name, value))
				},
				TokenInner::Word(Word::Keyword(Kw::Define)) => {
					let mut target = Target::Def(Template::new(name));
					stmt.fields(ctx.definitions(), &mut target)?;
					target.into_symbol()
				},
				TokenInner::Word(Word::Keyword(Kw::Subfield)) => {
					let mut target = Target::Sub(Fragment::new(name));
					stmt.fields(ctx.definitions(), &mut target)?;
					target.into_symbol()
				},
				_ => return Err(Fault::at(AsmError::Syntax(format!("Expected EQU, DEF, or SUB, found {}", kind)), kind))
			};

			ctx.declare(symbol).map_err(|e| Fault::at(e, first))?;
			Ok(Flow::Continue)
		},
		_ => Err(Fault::at(AsmError::Syntax(format!("Unexpected {} at the start of a definition", first)), first))
	}
}

//--> Source File <--

fn source(ctx: &mut CompilationContext, file: &SourceFile, stmt: &mut Statement) -> StatementResult {
	if let Some(label) = stmt.label() {
		let entry = stmt.skip_if(|t| matches!(t, TokenInner::Colon));

		if let TokenInner::Word(Word::Identifier(name)) = &label.inner {
			ctx.declare_label(name, entry).map_err(|e| Fault::at(e, label))?;
		}
	}

	let first = match stmt.advance() {
		Some(token) => token,
		None => return Ok(Flow::Continue),
	};

	match &first.inner {
		TokenInner::Word(Word::Keyword(Kw::Title)) => {
			ctx.set_title(rest_of_line(file, first));
		},
		TokenInner::Word(Word::Keyword(Kw::Origin)) => {
			let p = stmt.number(ctx)?;
			stmt.expect_end()?;
			ctx.set_location(p).map_err(|e| Fault::at(e, first))?;
		},
		TokenInner::Word(Word::Keyword(Kw::Align)) => {
			let boundary = stmt.number(ctx)?;
			stmt.expect_end()?;
			ctx.align_location(boundary).map_err(|e| Fault::at(e, first))?;
		},
		TokenInner::Word(Word::Keyword(Kw::Reserve)) => {
			let n = stmt.number(ctx)?;
			stmt.expect_end()?;
			ctx.advance_location(n).map_err(|e| Fault::at(e, first))?;
		},
		TokenInner::Word(Word::Keyword(Kw::End)) => {
			stmt.expect_end()?;
			return Ok(Flow::End)
		},
		TokenInner::Word(Word::Keyword(Kw::FreeForm)) => emit_word(ctx, first, |ctx| free_form(ctx, stmt, first))?,
		TokenInner::Word(Word::Identifier(_)) => emit_word(ctx, first, |ctx| instruction(ctx, stmt, first))?,
		_ => return Err(Fault::at(AsmError::Syntax(format!("Unexpected {} at the start of a statement", first)), first))
	}

	Ok(Flow::Continue)
}

// Every word statement takes one address, whether or not its body assembled.
fn emit_word<F>(ctx: &mut CompilationContext, first: &Token, body: F) -> Result<(), Fault>
where F: FnOnce(&mut CompilationContext) -> Result<(), Fault> {
	if ctx.pass() == Pass::Address {
		return ctx.advance_location(1).map_err(|e| Fault::at(e, first))
	}

	ctx.new_line().map_err(|e| Fault::at(e, first))?;
	let result = body(ctx);
	let advanced = ctx.advance_location(1).map_err(|e| Fault::at(e, first));

	result.and(advanced)
}

fn instruction(ctx: &mut CompilationContext, stmt: &mut Statement, first: &Token) -> Result<(), Fault> {
	let mut format = first;

	loop {
		match &format.inner {
			TokenInner::Word(Word::Identifier(name)) => ctx.select_format(name).map_err(|e| Fault::at(e, format))?,
			_ => return Err(Fault::at(AsmError::Syntax(format!("Expected a format name, found {}", format)), format))
		}

		stmt.arguments(ctx)?;

		match stmt.advance() {
			None => return Ok(()),
			Some(token) if token.inner == TokenInner::Ampersand => {
				format = stmt.advance_or("Expected a format name after '&'")?;
			},
			Some(token) => return Err(Fault::at(AsmError::Syntax(format!("Unexpected {}", token)), token))
		}
	}
}

fn free_form(ctx: &mut CompilationContext, stmt: &mut Statement, first: &Token) -> Result<(), Fault> {
	let mut target = Target::Def(Template::new("FF"));
	stmt.fields(ctx.definitions(), &mut target)?;

	for field in target.fields().to_vec() {
		ctx.substitute_field(&field).map_err(|e| Fault::at(e, first))?;
	}

	Ok(())
}

fn variable_field(decl: &VarSpec, token: &Token) -> Result<Field, Fault> {
	if decl.width == 0 {
		return Err(Fault::at(AsmError::Syntax(String::from("A field must be at least one bit wide")), token))
	}

	Ok(Field::variable(decl.width, Variable {
		modifiers: decl.modifiers,
		radix: decl.radix,
		default: decl.default,
		dont_care: decl.dont_care,
	}))
}

impl Fault {
	fn at(error: AsmError, token: &Token) -> Fault {
		Fault { error, line: token.line, span: Some(token.span.clone()) }
	}
}

impl Target {
	fn append(&mut self, field: Field) -> AsmResult<()> {
		match self {
			Target::Sub(s) => s.append_field(field),
			Target::Def(d) => d.append_field(field),
		}
	}

	fn include(&mut self, name: &str, table: &SymbolTable) -> AsmResult<()> {
		match self {
			Target::Sub(s) => s.include(name, table),
			Target::Def(d) => d.include(name, table),
		}
	}

	fn fields(&self) -> &[Field] {
		match self {
			Target::Sub(s) => s.fields(),
			Target::Def(d) => d.fields(),
		}
	}

	fn into_symbol(self) -> Symbol {
		match self {
			Target::Sub(s) => Symbol::Fragment(s),
			Target::Def(d) => Symbol::Template(d),
		}
	}
}

impl<'a> Statement<'a> {
	fn peek(&self) -> Option<&'a Token> { self.tokens.get(self.pos).copied() }

	fn advance(&mut self) -> Option<&'a Token> {
		let token = self.peek();
		if token.is_some() { self.pos += 1; }
		token
	}

	fn advance_or(&mut self, message: &str) -> Result<&'a Token, Fault> {
		self.advance().ok_or_else(|| self.fault_at_end(message))
	}

	fn skip_if<P: Fn(&TokenInner) -> bool>(&mut self, pred: P) -> bool {
		match self.peek() {
			Some(token) if pred(&token.inner) => { self.pos += 1; true },
			_ => false
		}
	}

	fn fault_at_end(&self, message: &str) -> Fault {
		match self.tokens.last() {
			Some(token) => Fault { error: AsmError::Syntax(String::from(message)), line: token.line, span: Some(token.span.end..token.span.end) },
			None => Fault { error: AsmError::Syntax(String::from(message)), line: 0, span: None },
		}
	}

	fn expect_end(&self) -> Result<(), Fault> {
		match self.peek() {
			None => Ok(()),
			Some(token) => Err(Fault::at(AsmError::Syntax(format!("Unexpected {}", token)), token)),
		}
	}

	fn expect_colon(&mut self) -> Result<(), Fault> {
		if self.skip_if(|t| matches!(t, TokenInner::Colon)) { Ok(()) } else { Err(self.fault_at_end("Expected ':' after the name")) }
	}

	// `name:` at the start of a statement.
	fn label(&mut self) -> Option<&'a Token> {
		match (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)) {
			(Some(name), Some(colon)) if matches!(name.inner, TokenInner::Word(Word::Identifier(_))) && colon.inner == TokenInner::Colon => {
				self.pos += 2;
				Some(name)
			},
			_ => None
		}
	}

	fn at_group_end(&self) -> bool {
		matches!(self.peek().map(|t| &t.inner), None | Some(TokenInner::Ampersand))
	}

	/// A single value: literal, decimal number, `$`, or a label or EQU name.
	fn term(&mut self, ctx: &CompilationContext) -> Result<Value, Fault> {
		let token = self.advance_or("Expected a value")?;

		match &token.inner {
			TokenInner::Literal(v) => Ok(*v),
			TokenInner::Number(text) => text.parse::<i64>()
				.map(Value::decimal)
				.map_err(|_| Fault::at(AsmError::InvalidNumber(text.clone(), 10), token)),
			TokenInner::Location => ctx.location()
				.map(|l| Value::decimal(l as i64))
				.map_err(|e| Fault::at(e, token)),
			TokenInner::Word(Word::Identifier(name)) => ctx.value_of(name).map_err(|e| Fault::at(e, token)),
			_ => Err(Fault::at(AsmError::Syntax(format!("Expected a value, found {}", token)), token))
		}
	}

	// Terms joined by `+`, as a plain non-negative number.
	fn number(&mut self, ctx: &CompilationContext) -> Result<u32, Fault> {
		let start = self.peek();
		let mut total = Some(self.term(ctx)?.value);

		while self.skip_if(|t| matches!(t, TokenInner::Plus)) {
			let term = self.term(ctx)?.value;
			total = total.and_then(|t| t.checked_add(term));
		}

		total.and_then(|t| u32::try_from(t).ok()).ok_or_else(|| match start {
			Some(token) => Fault::at(AsmError::Syntax(String::from("Value is out of range")), token),
			None => self.fault_at_end("Expected a value"),
		})
	}

	/// The comma separated items of a DEF, SUB, or FF.
	fn fields(&mut self, table: &SymbolTable, target: &mut Target) -> Result<(), Fault> {
		loop {
			let token = self.advance_or("Expected a field")?;

			let appended = match &token.inner {
				TokenInner::Wildcard(0) => Err(AsmError::Syntax(String::from("A field must be at least one bit wide"))),
				TokenInner::Wildcard(w) => target.append(Field::wildcard(*w)),
				TokenInner::Literal(v) => target.append(Field::constant(v.width, *v)),
				TokenInner::Variable(decl) => target.append(variable_field(decl, token)?),
				TokenInner::Word(Word::Identifier(name)) => target.include(name, table),
				_ => Err(AsmError::Syntax(format!("Expected a field, found {}", token)))
			};
			appended.map_err(|e| Fault::at(e, token))?;

			match self.advance() {
				None => return Ok(()),
				Some(t) if t.inner == TokenInner::Comma => continue,
				Some(t) => return Err(Fault::at(AsmError::Syntax(format!("Expected a comma, found {}", t)), t))
			}
		}
	}

	/// Arguments for the format just selected, up to the next `&`.
	///
	/// A position left empty keeps the field's default.
	fn arguments(&mut self, ctx: &mut CompilationContext) -> Result<(), Fault> {
		if self.at_group_end() { return Ok(()) }

		loop {
			match self.peek() {
				Some(token) if token.inner == TokenInner::Comma => ctx.skip_argument().map_err(|e| Fault::at(e, token))?,
				None => ctx.skip_argument().map_err(|e| self.fault_at(e))?,
				Some(token) if token.inner == TokenInner::Ampersand => ctx.skip_argument().map_err(|e| Fault::at(e, token))?,
				Some(_) => self.argument(ctx)?,
			}

			if !self.skip_if(|t| matches!(t, TokenInner::Comma)) { return Ok(()) }
		}
	}

	fn argument(&mut self, ctx: &mut CompilationContext) -> Result<(), Fault> {
		let token = self.advance_or("Expected an argument")?;

		let value = match &token.inner {
			TokenInner::Literal(v) => Ok(*v),
			TokenInner::Location => ctx.location().map(|l| Value::decimal(l as i64)),
			TokenInner::Number(text) => ctx.resolve_name_argument(text),
			TokenInner::Word(word) => ctx.resolve_name_argument(&word.text()),
			_ => Err(AsmError::Syntax(format!("Expected an argument, found {}", token)))
		}.map_err(|e| Fault::at(e, token))?;

		ctx.substitute_argument(&value).map_err(|e| Fault::at(e, token))
	}

	fn fault_at(&self, error: AsmError) -> Fault {
		let mut fault = self.fault_at_end("");
		fault.error = error;
		fault
	}
}

//--> Tests <--
