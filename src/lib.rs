//--> Imports <--

// The bit-level model: don't care bits, overlay merging and the three field kinds.
pub mod field;

// SUB, DEF, EQU and label declarations and the tables holding them.
pub mod symbol;

// One output word.
pub mod line;

// Word size, passes, location pointer, and line assembly.
pub mod context;

pub mod error;

pub mod lexer;

// Drives the context from the token stream of a definition or source file.
pub mod parser;

// Dump formats for the finished words.
pub mod output;

use std::{
	fmt,
	fs,
	io::ErrorKind,
	ops::Range,
	path::{
		Path,
		PathBuf,
	},
};

pub use context::{
	CompilationContext,
	Pass,
};
pub use error::AsmError;
pub use line::OutputLine;
pub use output::OutputFormat;

//--> Type Aliases <--

pub type ErrorList = Vec<Error>;

// On success, the finished context and any warnings. On failure, everything reported up to the failing pass.
pub type AssembleResult = Result<(CompilationContext, ErrorList), ErrorList>;

//--> Structs <--

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
	pub is_warning: bool,
	pub file: PathBuf,
	pub line: Option<usize>,
	pub span: Option<Range<usize>>,
	pub message: String,
}

#[derive(Clone, Debug)]
pub struct SourceFile {
	pub path: PathBuf,
	pub text: String,
}

//--> Functions <--

/// Runs all three passes: definitions, address discovery, and emission.
///
/// A pass that reports an error stops the run; later passes never see a half-built state.
pub fn assemble(definitions: &SourceFile, source: &SourceFile) -> AssembleResult {
	let mut ctx = CompilationContext::new();
	let mut warnings: ErrorList = Vec::new();

	let def_tokens = lexer::lex(definitions)?;
	run_pass(&mut ctx, definitions, &def_tokens, &mut warnings)?;

	if ctx.word_size().is_err() {
		return Err(vec![Error::new(false, definitions.path.clone(), None, None, format!("{}. Can't continue", AsmError::Unconfigured))])
	}

	let src_tokens = lexer::lex(source)?;

	while ctx.next_pass().is_some() {
		run_pass(&mut ctx, source, &src_tokens, &mut warnings)?;
	}

	let count = ctx.finalize_sequence().len();
	tracing::debug!("finished: {} words emitted, {} warnings", count, warnings.len());

	Ok((ctx, warnings))
}

fn run_pass(ctx: &mut CompilationContext, file: &SourceFile, tokens: &lexer::TokenStream, warnings: &mut ErrorList) -> Result<(), ErrorList> {
	tracing::debug!("parsing {} (phase {})", file.path.display(), ctx.pass());

	let errs = parser::run(ctx, file, tokens);
	let error_count = errs.iter().filter(|e| !e.is_warning).count();

	if error_count > 0 {
		tracing::debug!("failed to parse {}: {} error(s)", file.path.display(), error_count);
		return Err(errs)
	}

	warnings.extend(errs);
	Ok(())
}

impl Error {
	pub fn new(is_warning: bool, file: PathBuf, line: Option<usize>, span: Option<Range<usize>>, message: String) -> Error {
		Error { is_warning, file, line, span, message }
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let start = if self.is_warning { "WARN" } else { "ERR" };

		match self.line {
			Some(l) => match &self.span {
				Some(s) => write!(f, "{}: {}: {}: {}..{}: {}", start, self.file.display(), l, s.start, s.end, self.message),
				None => write!(f, "{}: {}: {}: {}", start, self.file.display(), l, self.message)
			},
			None => write!(f, "{}: {}: {}", start, self.file.display(), self.message)
		}
	}
}

impl SourceFile {
	pub fn new(path: impl Into<PathBuf>, text: &str) -> SourceFile {
		SourceFile { path: path.into(), text: String::from(text) }
	}

	pub fn read(path: &Path) -> Result<SourceFile, Error> {
		match fs::read_to_string(path) {
			Ok(text) if text.is_empty() => Err(Error::new(false, path.to_path_buf(), None, None, String::from("The file is empty."))),
			Ok(text) => Ok(SourceFile { path: path.to_path_buf(), text }),
			Err(err) => Err(Error::new(false, path.to_path_buf(), None, None, match err.kind() {
				ErrorKind::NotFound => String::from("Couldn't find the file."),
				ErrorKind::PermissionDenied => String::from("Wasn't allowed to open the file. (insufficient permissions)"),
				ErrorKind::InvalidData => String::from("The file contained invalid data. (likely not UTF-8 text)"),
				_ => format!("Encountered unexpected I/O error while trying to read the file: {}", err.kind())
			}))
		}
	}
}

//--> Tests <--

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn error_display_includes_position() {
		let e = Error::new(false, PathBuf::from("a.src"), Some(3), Some(4..7), String::from("Field is already set"));
		assert_eq!(e.to_string(), "ERR: a.src: 3: 4..7: Field is already set");

		let w = Error::new(true, PathBuf::from("a.def"), None, None, String::from("Missing END"));
		assert_eq!(w.to_string(), "WARN: a.def: Missing END");
	}

	#[test]
	fn missing_word_size_stops_the_run() {
		let defs = SourceFile::new("t.def", "A: DEF 4X\nEND\n");
		let src = SourceFile::new("t.src", "A\nEND\n");
		let errs = assemble(&defs, &src).unwrap_err();
		assert_eq!(errs.len(), 1);
		assert!(errs[0].message.starts_with("WORD size not declared"));
	}
}
