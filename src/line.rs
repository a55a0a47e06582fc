//--> Imports <--

use std::fmt;

use crate::field::{
	Bit,
	Cell,
	render,
};

//--> Structs <--

/// One emitted microcode word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLine {
	address: u32,
	cells: Vec<Cell>,
	format: Option<String>,
	cursor: usize,
}

//--> Functions <--

impl OutputLine {
	pub fn new(address: u32, word_size: u32) -> OutputLine {
		OutputLine { address, cells: vec![Cell::OPEN; word_size as usize], format: None, cursor: 0 }
	}

	pub fn address(&self) -> u32 { self.address }

	pub fn cells(&self) -> &[Cell] { &self.cells }

	pub(crate) fn cells_mut(&mut self) -> &mut [Cell] { &mut self.cells }

	pub fn bits(&self) -> impl Iterator<Item = Bit> + '_ { self.cells.iter().map(|c| c.bit) }

	/// Name of the format selected last, if any.
	pub fn format(&self) -> Option<&str> { self.format.as_deref() }

	/// Index of the next variable field an argument will go to.
	pub fn cursor(&self) -> usize { self.cursor }

	pub(crate) fn bind(&mut self, format: &str) {
		self.format = Some(String::from(format));
		self.cursor = 0;
	}

	pub(crate) fn advance_cursor(&mut self) { self.cursor += 1; }

	/// Bits with every don't-care replaced, most significant first.
	pub fn resolved(&self, replacement: bool) -> impl Iterator<Item = bool> + '_ {
		self.bits().map(move |bit| match bit {
			Bit::One => true,
			Bit::Zero => false,
			Bit::DontCare => replacement,
		})
	}

	/// The `0/1/X` map of the word.
	pub fn map(&self) -> String { render(&self.cells) }
}

impl fmt::Display for OutputLine {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:04X} {}", self.address, self.map())
	}
}

//--> Tests <--
