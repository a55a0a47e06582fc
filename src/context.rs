//--> Imports <--

use std::fmt;

use crate::{
	error::{
		AsmError,
		AsmResult,
	},
	field::{
		Field,
		Value,
		bit_width,
		render,
	},
	line::OutputLine,
	symbol::{
		Label,
		Symbol,
		SymbolTable,
		Template,
	},
};

//--> Constants <--

pub const MAX_WORD_SIZE: u32 = 128;

//--> Structs <--

/// All state of one compilation run: word size, pass, location pointer, both symbol tables and the emitted lines.
#[derive(Debug)]
pub struct CompilationContext {
	word_size: Option<u32>,
	pass: Pass,
	location: u32,
	title: Option<String>,
	definitions: SymbolTable,
	labels: SymbolTable,
	lines: Vec<OutputLine>,
}

//--> Enums <--

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Pass {
	// Reads the definition file and fills the definition table.
	Definition,
	// Reads the source file to find label addresses. Nothing is emitted.
	Address,
	// Reads the source file again and emits lines.
	Emit,
}

//--> Functions <--

impl fmt::Display for Pass {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Pass::Definition => write!(f, "1"),
			Pass::Address => write!(f, "2a"),
			Pass::Emit => write!(f, "2b"),
		}
	}
}

impl Default for CompilationContext {
	fn default() -> Self { CompilationContext::new() }
}

impl CompilationContext {
	pub fn new() -> CompilationContext {
		CompilationContext {
			word_size: None,
			pass: Pass::Definition,
			location: 0,
			title: None,
			definitions: SymbolTable::new(),
			labels: SymbolTable::new(),
			lines: Vec::new(),
		}
	}

	pub fn pass(&self) -> Pass { self.pass }

	/// Moves on to the following pass and rewinds the location pointer. Returns `None` after the emit pass.
	pub fn next_pass(&mut self) -> Option<Pass> {
		self.pass = match self.pass {
			Pass::Definition => Pass::Address,
			Pass::Address => Pass::Emit,
			Pass::Emit => return None,
		};
		self.location = 0;

		tracing::debug!("entering pass {}", self.pass);
		Some(self.pass)
	}

	pub fn title(&self) -> Option<&str> { self.title.as_deref() }

	pub fn set_title(&mut self, title: &str) { self.title = Some(String::from(title.trim())); }

	pub fn definitions(&self) -> &SymbolTable { &self.definitions }

	pub fn labels(&self) -> &SymbolTable { &self.labels }

	//--> Word Size <--

	pub fn set_word_size(&mut self, w: u32) -> AsmResult<()> {
		if self.word_size.is_some() {
			Err(AsmError::Redeclaration)
		} else if !(1..=MAX_WORD_SIZE).contains(&w) {
			Err(AsmError::Range(w))
		} else {
			self.word_size = Some(w);
			Ok(())
		}
	}

	pub fn word_size(&self) -> AsmResult<u32> {
		self.word_size.ok_or(AsmError::Unconfigured)
	}

	//--> Location Pointer <--

	/// Reads `$`. There is no meaningful address while definitions are being read.
	pub fn location(&self) -> AsmResult<u32> {
		match self.pass {
			Pass::Definition => Err(AsmError::PassError("May not use $ in phase 1")),
			_ => Ok(self.location),
		}
	}

	pub fn set_location(&mut self, p: u32) -> AsmResult<()> {
		if p < self.location {
			return Err(AsmError::Monotonicity { current: self.location, requested: p })
		}

		self.location = p;
		Ok(())
	}

	pub fn advance_location(&mut self, n: u32) -> AsmResult<()> {
		self.location = self.location.checked_add(n).ok_or(AsmError::LocationOverflow(self.location))?;
		Ok(())
	}

	/// Moves to the next multiple of `boundary` strictly past the current block.
	pub fn align_location(&mut self, boundary: u32) -> AsmResult<()> {
		match boundary {
			2 | 4 | 8 | 16 => {
				let block = self.location - self.location % boundary;
				self.location = block.checked_add(boundary).ok_or(AsmError::LocationOverflow(self.location))?;
				Ok(())
			},
			_ => Err(AsmError::InvalidAlignment(boundary))
		}
	}

	//--> Declarations <--

	pub fn declare(&mut self, symbol: Symbol) -> AsmResult<()> {
		tracing::debug!("{}", symbol);
		self.definitions.declare(symbol)
	}

	/// Binds a label to the current location.
	///
	/// Labels are collected while addresses are discovered; the emit pass only checks that nothing moved.
	pub fn declare_label(&mut self, name: &str, entry: bool) -> AsmResult<()> {
		match self.pass {
			Pass::Definition => Err(AsmError::PassError("Labels are not allowed in definitions")),
			Pass::Address => {
				let label = Label::new(name, self.location, entry);
				tracing::debug!("label {} = {:04X}", name, self.location);
				self.labels.declare(Symbol::Label(label))
			},
			Pass::Emit => match self.labels.lookup(name) {
				Some(Symbol::Label(label)) if label.address() == self.location => Ok(()),
				Some(_) => Err(AsmError::PassError("Label address differs between passes")),
				None => Err(AsmError::UndeclaredName(String::from(name))),
			},
		}
	}

	/// Value of a label or, failing that, an EQU.
	pub fn value_of(&self, name: &str) -> AsmResult<Value> {
		match self.labels.lookup(name) {
			Some(symbol) => symbol.value().ok_or_else(|| AsmError::NotAConstant(String::from(name))),
			None => self.definitions.lookup_value(name),
		}
	}

	//--> Line Assembly <--

	fn current_line(lines: &mut [OutputLine]) -> AsmResult<&mut OutputLine> {
		lines.last_mut().ok_or(AsmError::PassError("No output line has been started"))
	}

	fn template<'a>(definitions: &'a SymbolTable, name: &str) -> AsmResult<&'a Template> {
		match definitions.lookup(name) {
			Some(Symbol::Template(template)) => Ok(template),
			_ => Err(AsmError::UnknownTemplate(String::from(name))),
		}
	}

	/// Starts a new word at the current location, every bit open.
	pub fn new_line(&mut self) -> AsmResult<()> {
		let line = OutputLine::new(self.location, self.word_size()?);
		tracing::trace!("new line at {:04X}", line.address());
		self.lines.push(line);
		Ok(())
	}

	/// Makes a DEF the active format of the current line and writes its constants and defaults.
	pub fn select_format(&mut self, name: &str) -> AsmResult<()> {
		let template = CompilationContext::template(&self.definitions, name)?;
		let line = CompilationContext::current_line(&mut self.lines)?;

		tracing::trace!("new format {}: {}", template.name(), template);
		line.bind(template.name());
		template.initialize(line.cells_mut())?;
		tracing::trace!("map is now {}", line.map());

		Ok(())
	}

	/// Overlays a directly placed field onto the current line.
	pub fn substitute_field(&mut self, field: &Field) -> AsmResult<()> {
		let word_size = self.word_size()?;
		if field.offset().checked_add(field.width()).map_or(true, |end| end > word_size) {
			return Err(AsmError::OutOfRange { offset: field.offset(), width: field.width(), word_size })
		}

		let line = CompilationContext::current_line(&mut self.lines)?;
		tracing::trace!("field {} at {}", field, field.offset());
		field.initialize(line.cells_mut())
	}

	/// Puts a value into the next variable field of the active format.
	pub fn substitute_argument(&mut self, value: &Value) -> AsmResult<()> {
		let line = CompilationContext::current_line(&mut self.lines)?;
		let format = line.format().ok_or(AsmError::NoActiveTemplate)?;
		let template = CompilationContext::template(&self.definitions, format)?;

		let cursor = line.cursor();
		line.advance_cursor();

		let field = template.nth_variable_field(cursor)?;
		tracing::trace!("argument {} = {} at {}({})", cursor, value, field.offset(), field.width());
		field.substitute(line.cells_mut(), value)?;

		let start = field.offset() as usize;
		tracing::trace!("field now {}", render(&line.cells()[start..start + field.width() as usize]));
		Ok(())
	}

	/// Leaves the next variable field at its default.
	pub fn skip_argument(&mut self) -> AsmResult<()> {
		let line = CompilationContext::current_line(&mut self.lines)?;
		if line.format().is_none() { return Err(AsmError::NoActiveTemplate) }

		line.advance_cursor();
		tracing::trace!("argument {} skipped", line.cursor() - 1);
		Ok(())
	}

	/// Turns a bare name or number in argument position into a value.
	///
	/// Labels win over constants of the same name. Anything unknown is read as a number
	/// in the base declared by the variable field it is about to fill.
	pub fn resolve_name_argument(&self, token: &str) -> AsmResult<Value> {
		if let Some(symbol) = self.labels.lookup(token).or_else(|| self.definitions.lookup(token)) {
			return symbol.value().ok_or_else(|| AsmError::NotAConstant(String::from(token)))
		}

		let line = self.lines.last().ok_or_else(|| AsmError::InvalidContext(String::from(token)))?;
		let format = line.format().ok_or_else(|| AsmError::InvalidContext(String::from(token)))?;
		let template = CompilationContext::template(&self.definitions, format)?;
		let field = template.nth_variable_field(line.cursor()).map_err(|_| AsmError::InvalidContext(String::from(token)))?;

		let radix = field.radix().ok_or_else(|| AsmError::InvalidBase(String::from(token)))?;
		let value = i64::from_str_radix(token, radix.base()).map_err(|_| AsmError::InvalidNumber(String::from(token), radix.base()))?;

		Ok(Value::new(radix, bit_width(token, value, radix), value))
	}

	/// The emitted lines in ascending address order.
	pub fn finalize_sequence(&mut self) -> &[OutputLine] {
		self.lines.sort_by_key(|line| line.address());
		&self.lines
	}

	pub fn lines(&self) -> &[OutputLine] { &self.lines }
}

//--> Tests <--
