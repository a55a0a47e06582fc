//--> Imports <--

use thiserror::Error;

//--> Type Aliases <--

pub type AsmResult<T> = Result<T, AsmError>;

//--> Enums <--

// Everything the engine can reject. None of these stop the process; the driver attaches a position and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
	#[error("Field is already set")]
	Conflict,

	#[error("Too many fields in {0} declaration (at most {1})")]
	Capacity(String, usize),

	#[error("Duplicate declaration of '{0}'")]
	DuplicateName(String),

	#[error("Name '{0}' is not declared")]
	UndeclaredName(String),

	#[error("Name '{0}' is not a constant value")]
	NotAConstant(String),

	#[error("May not include DEF '{0}' in a definition")]
	Structure(String),

	#[error("May only increase the location pointer (it is {current}, {requested} was requested)")]
	Monotonicity { current: u32, requested: u32 },

	#[error("Location pointer overflows past {0}")]
	LocationOverflow(u32),

	#[error("Field width {0} exceeds the largest word size")]
	FieldWidth(u32),

	#[error("ALIGN must be 2, 4, 8, or 16, not {0}")]
	InvalidAlignment(u32),

	#[error("Invalid WORD size {0}, it must be between 1 and 128")]
	Range(u32),

	#[error("Multiple setting of WORD size")]
	Redeclaration,

	#[error("WORD size not declared")]
	Unconfigured,

	#[error("{0}")]
	PassError(&'static str),

	#[error("Unknown definition '{0}'")]
	UnknownTemplate(String),

	#[error("Field at offset {offset} with width {width} does not fit into a {word_size} bit word")]
	OutOfRange { offset: u32, width: u32, word_size: u32 },

	#[error("No format selected for this line")]
	NoActiveTemplate,

	#[error("Too many arguments for format '{0}'")]
	TooManyArguments(String),

	#[error("Untyped constant '{0}' is not allowed here")]
	InvalidContext(String),

	#[error("Invalid substitution of '{0}', the field has no default base")]
	InvalidBase(String),

	#[error("'{0}' is not a valid number in base {1}")]
	InvalidNumber(String, u32),

	#[error("{0}")]
	Syntax(String),
}
