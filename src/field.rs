//--> Imports <--

use std::fmt;

use crate::error::{
	AsmError,
	AsmResult,
};

//--> Constants <--

// Constants and arguments are expanded into at least this many bits before being cut down to the field width.
pub const SCRATCH_BITS: u32 = 16;

//--> Structs <--

/// One bit of a line buffer or field pattern, together with whether a later concrete write may replace it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
	pub bit: Bit,
	pub overlay: bool,
}

/// The set of modifier flags that can follow a `V` or a literal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
	pub invert: bool,
	pub negate: bool,
	pub truncate: bool,
	pub right_justify: bool,
	pub paged: bool,
}

/// A typed number: what a literal, an EQU or a label resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Value {
	pub radix: Radix,
	pub width: u32,
	pub value: i64,
	pub modifiers: Modifiers,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
	pub modifiers: Modifiers,
	pub radix: Option<Radix>,
	pub default: Option<Value>,
	pub dont_care: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
	width: u32,
	offset: u32,
	kind: FieldKind,
}

/// A borrowed view of a field that is known to be a variable.
#[derive(Clone, Copy, Debug)]
pub struct VariableField<'a> {
	field: &'a Field,
	variable: &'a Variable,
}

//--> Enums <--

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bit {
	Zero,
	One,
	DontCare,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Radix {
	Binary,
	Octal,
	Decimal,
	Hexadecimal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
	Wildcard,
	Constant(Value),
	Variable(Variable),
}

//--> Functions <--

/// Natural width of a decimal value: the position of its highest set bit plus one, never less than one.
pub fn dec_bitsize(value: i64) -> u32 {
	if value == 0 { return 1 }

	// Negative numbers fill the whole scratch area.
	if value < 0 { return SCRATCH_BITS }

	64 - value.leading_zeros()
}

/// Natural width of a literal as written: digit count times bits per digit, or the decimal rule.
pub fn bit_width(text: &str, value: i64, radix: Radix) -> u32 {
	match radix.digit_bits() {
		Some(bits) => (text.len() as u32).saturating_mul(bits),
		None => dec_bitsize(value),
	}
}

/// Turns a number into a pattern, least significant bit first.
///
/// Field modifiers go first, then use modifiers; within each set inversion comes before negation.
pub fn expand(value: i64, field: Modifiers, usage: Modifiers, width: u32, overlay: bool) -> Vec<Cell> {
	let mut v = value;

	if field.invert { v = !v; }
	if field.negate { v = v.wrapping_neg(); }
	if usage.invert { v = !v; }
	if usage.negate { v = v.wrapping_neg(); }

	(0..width.max(SCRATCH_BITS)).map(|i| {
		let bit = if (v >> i.min(63)) & 1 == 1 { Bit::One } else { Bit::Zero };
		Cell { bit, overlay }
	}).collect()
}

/// Writes `width` bits of an LSB-first pattern into `buffer[offset..offset + width]`, most significant bit first.
pub fn merge_reversed(buffer: &mut [Cell], offset: u32, width: u32, pattern: &[Cell]) -> AsmResult<()> {
	check_bounds(buffer, offset, width)?;

	for i in 0..width as usize {
		buffer[offset as usize + i].merge(pattern[width as usize - i - 1])?;
	}

	Ok(())
}

pub fn render(cells: &[Cell]) -> String {
	cells.iter().map(|c| c.bit.symbol()).collect()
}

fn check_bounds(buffer: &[Cell], offset: u32, width: u32) -> AsmResult<()> {
	if offset.checked_add(width).map_or(true, |end| end as usize > buffer.len()) {
		Err(AsmError::OutOfRange { offset, width, word_size: buffer.len() as u32 })
	} else { Ok(()) }
}

impl Bit {
	pub fn symbol(&self) -> char {
		match self {
			Bit::Zero => '0',
			Bit::One => '1',
			Bit::DontCare => 'X',
		}
	}
}

impl Cell {
	/// Fresh buffer state: unconstrained and open to any write.
	pub const OPEN: Cell = Cell { bit: Bit::DontCare, overlay: true };

	pub fn fixed(bit: Bit) -> Cell { Cell { bit, overlay: false } }

	pub fn overlayable(bit: Bit) -> Cell { Cell { bit, overlay: true } }

	/// Overlay-merge of one source bit into this destination bit.
	///
	/// An overlayable destination takes any concrete source. A fixed destination only
	/// accepts a don't-care or the same value; anything else means two drivers disagree.
	pub fn merge(&mut self, src: Cell) -> AsmResult<()> {
		if self.overlay || self.bit == src.bit || src.bit == Bit::DontCare {
			if src.bit != Bit::DontCare { *self = src; }
			Ok(())
		} else { Err(AsmError::Conflict) }
	}
}

impl Modifiers {
	pub const NONE: Modifiers = Modifiers {
		invert: false,
		negate: false,
		truncate: false,
		right_justify: false,
		paged: false,
	};

	/// Parses a run of `*-:%$` characters. Anything else is rejected.
	pub fn from_suffix(suffix: &str) -> Option<Modifiers> {
		let mut mods = Modifiers::NONE;

		for c in suffix.chars() {
			match c {
				'*' => mods.invert = true,
				'-' => mods.negate = true,
				':' => mods.truncate = true,
				'%' => mods.right_justify = true,
				'$' => mods.paged = true,
				_ => return None
			}
		}

		Some(mods)
	}

	pub fn union(self, other: Modifiers) -> Modifiers {
		Modifiers {
			invert: self.invert || other.invert,
			negate: self.negate || other.negate,
			truncate: self.truncate || other.truncate,
			right_justify: self.right_justify || other.right_justify,
			paged: self.paged || other.paged,
		}
	}
}

impl fmt::Display for Modifiers {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		if self.invert { write!(f, "*")?; }
		if self.negate { write!(f, "-")?; }
		if self.truncate { write!(f, ":")?; }
		if self.right_justify { write!(f, "%")?; }
		if self.paged { write!(f, "$")?; }
		Ok(())
	}
}

impl Radix {
	pub fn base(&self) -> u32 {
		match self {
			Radix::Binary => 2,
			Radix::Octal => 8,
			Radix::Decimal => 10,
			Radix::Hexadecimal => 16,
		}
	}

	pub fn from_letter(c: char) -> Option<Radix> {
		match c.to_ascii_uppercase() {
			'B' => Some(Radix::Binary),
			'Q' => Some(Radix::Octal),
			'D' => Some(Radix::Decimal),
			'H' => Some(Radix::Hexadecimal),
			_ => None
		}
	}

	pub fn letter(&self) -> char {
		match self {
			Radix::Binary => 'B',
			Radix::Octal => 'Q',
			Radix::Decimal => 'D',
			Radix::Hexadecimal => 'H',
		}
	}

	// Decimal digits don't map onto a whole number of bits.
	pub fn digit_bits(&self) -> Option<u32> {
		match self {
			Radix::Binary => Some(1),
			Radix::Octal => Some(3),
			Radix::Decimal => None,
			Radix::Hexadecimal => Some(4),
		}
	}
}

impl Value {
	pub fn new(radix: Radix, width: u32, value: i64) -> Value {
		Value { radix, width, value, modifiers: Modifiers::NONE }
	}

	/// A decimal value with its natural width.
	pub fn decimal(value: i64) -> Value {
		Value::new(Radix::Decimal, dec_bitsize(value), value)
	}

	/// Builds a value from the pieces of a literal such as `2H#1F*`.
	///
	/// `digits` is the count prefix; it is measured in digits of the radix, so `2H#` is eight bits wide.
	/// Decimal literals ignore it and always take their natural width.
	pub fn from_literal(digits: Option<u32>, radix: Radix, text: &str, modifiers: Modifiers) -> Option<Value> {
		let value = i64::from_str_radix(text, radix.base()).ok()?;

		let width = match (digits, radix.digit_bits()) {
			(Some(n), Some(bits)) if n > 0 => n.checked_mul(bits)?,
			_ => bit_width(text, value, radix),
		};

		Some(Value { radix, width, value, modifiers })
	}

	pub fn with_modifiers(mut self, modifiers: Modifiers) -> Value {
		self.modifiers = self.modifiers.union(modifiers);
		self
	}

	/// Replaces a missing width by the natural decimal width.
	pub fn fixed_width(mut self) -> Value {
		if self.width == 0 {
			self.width = dec_bitsize(self.value);
			self.radix = Radix::Decimal;
		}
		self
	}

	fn masked(&self) -> i64 {
		if self.width >= 63 { self.value } else { self.value & ((1i64 << self.width) - 1) }
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.radix {
			Radix::Binary => {
				write!(f, "B#")?;
				for i in (0..self.width.min(63)).rev() {
					write!(f, "{}", (self.value >> i) & 1)?;
				}
			},
			Radix::Octal => write!(f, "{}Q#{:o}", (self.width / 3).max(1), self.masked())?,
			Radix::Decimal => write!(f, "D#{}", self.value)?,
			Radix::Hexadecimal => write!(f, "{}H#{:X}", (self.width / 4).max(1), self.masked())?,
		}

		write!(f, "{}", self.modifiers)
	}
}

impl Field {
	/// Panics on a zero width: no declaration can legitimately produce one.
	fn new(width: u32, kind: FieldKind) -> Field {
		assert!(width > 0, "internal error: field constructed with zero width");
		Field { width, offset: 0, kind }
	}

	pub fn wildcard(width: u32) -> Field { Field::new(width, FieldKind::Wildcard) }

	pub fn constant(width: u32, value: Value) -> Field { Field::new(width, FieldKind::Constant(value)) }

	pub fn variable(width: u32, variable: Variable) -> Field { Field::new(width, FieldKind::Variable(variable)) }

	pub fn width(&self) -> u32 { self.width }

	pub fn offset(&self) -> u32 { self.offset }

	pub fn is_variable(&self) -> bool { matches!(self.kind, FieldKind::Variable(_)) }

	pub fn as_variable(&self) -> Option<VariableField> {
		match &self.kind {
			FieldKind::Variable(variable) => Some(VariableField { field: self, variable }),
			_ => None
		}
	}

	// Only called by the fragment that takes ownership of the field.
	pub(crate) fn place(&mut self, offset: u32) { self.offset = offset; }

	/// The stored pattern, least significant bit first.
	pub fn pattern(&self) -> Vec<Cell> {
		match &self.kind {
			FieldKind::Wildcard => vec![Cell::OPEN; self.width as usize],
			FieldKind::Constant(value) => expand(value.value, value.modifiers, Modifiers::NONE, self.width, false),
			FieldKind::Variable(variable) => match (&variable.default, variable.dont_care) {
				(Some(default), _) => expand(default.value, variable.modifiers, default.modifiers, self.width, true),
				(None, true) => vec![Cell::OPEN; self.width as usize],
				(None, false) => vec![Cell::overlayable(Bit::Zero); self.width as usize],
			},
		}
	}

	/// Writes this field's pattern into a line buffer.
	///
	/// Variable fields leave their whole range overlayable afterwards so that an argument can replace the default.
	pub fn initialize(&self, buffer: &mut [Cell]) -> AsmResult<()> {
		merge_reversed(buffer, self.offset, self.width, &self.pattern())?;

		if self.is_variable() {
			let start = self.offset as usize;
			for cell in &mut buffer[start..start + self.width as usize] {
				cell.overlay = true;
			}
		}

		Ok(())
	}
}

impl fmt::Display for Field {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match &self.kind {
			FieldKind::Wildcard => write!(f, "{}X", self.width),
			FieldKind::Constant(value) => write!(f, "{}:{}", self.width, value),
			FieldKind::Variable(variable) => {
				write!(f, "{}V{}", self.width, variable.modifiers)?;
				if variable.dont_care { write!(f, "X")?; }
				match (&variable.default, variable.radix) {
					(Some(default), _) => write!(f, "{}", default),
					(None, Some(radix)) => write!(f, "{}#", radix.letter()),
					(None, None) => Ok(()),
				}
			},
		}
	}
}

impl<'a> VariableField<'a> {
	pub fn width(&self) -> u32 { self.field.width }

	pub fn offset(&self) -> u32 { self.field.offset }

	/// Base used to read bare numbers given for this field, if it declared one.
	pub fn radix(&self) -> Option<Radix> {
		self.variable.radix.or(self.variable.default.map(|d| d.radix))
	}

	/// Merges an argument into the buffer.
	///
	/// The argument's modifiers are combined with the ones the field was declared with,
	/// including the modifiers attached to its default value.
	pub fn substitute(&self, buffer: &mut [Cell], argument: &Value) -> AsmResult<()> {
		let usage = match &self.variable.default {
			Some(default) => argument.modifiers.union(default.modifiers),
			None => argument.modifiers,
		};
		let pattern = expand(argument.value, self.variable.modifiers, usage, self.field.width, false);

		merge_reversed(buffer, self.field.offset, self.field.width, &pattern)
	}
}

//--> Tests <--

#[cfg(test)]
mod tests {
	use super::*;

	fn placed(mut field: Field, offset: u32) -> Field {
		field.place(offset);
		field
	}

	fn read_back(cells: &[Cell]) -> i64 {
		cells.iter().fold(0, |acc, c| (acc << 1) | if c.bit == Bit::One { 1 } else { 0 })
	}

	#[test]
	fn dec_bitsize_follows_highest_set_bit() {
		assert_eq!(dec_bitsize(0), 1);
		assert_eq!(dec_bitsize(1), 1);
		assert_eq!(dec_bitsize(2), 2);
		assert_eq!(dec_bitsize(5), 3);
		assert_eq!(dec_bitsize(255), 8);
		assert_eq!(dec_bitsize(256), 9);
		assert_eq!(dec_bitsize(65535), 16);
	}

	#[test]
	fn literal_width_depends_on_radix() {
		assert_eq!(bit_width("1010", 10, Radix::Binary), 4);
		assert_eq!(bit_width("17", 15, Radix::Octal), 6);
		assert_eq!(bit_width("1F", 31, Radix::Hexadecimal), 8);
		assert_eq!(bit_width("31", 31, Radix::Decimal), 5);
	}

	#[test]
	fn literal_digit_prefix_counts_digits() {
		let v = Value::from_literal(Some(2), Radix::Hexadecimal, "F", Modifiers::NONE).unwrap();
		assert_eq!(v.width, 8);
		assert_eq!(v.value, 15);

		let v = Value::from_literal(Some(4), Radix::Decimal, "3", Modifiers::NONE).unwrap();
		assert_eq!(v.width, 2);

		assert!(Value::from_literal(None, Radix::Binary, "102", Modifiers::NONE).is_none());
		assert!(Value::from_literal(Some(2_000_000_000), Radix::Hexadecimal, "1", Modifiers::NONE).is_none());
	}

	#[test]
	fn huge_offset_is_out_of_range() {
		let buf = vec![Cell::OPEN; 8];
		assert_eq!(check_bounds(&buf, u32::MAX, 2), Err(AsmError::OutOfRange { offset: u32::MAX, width: 2, word_size: 8 }));
	}

	#[test]
	fn merge_into_open_bit_takes_source() {
		let mut cell = Cell::OPEN;
		cell.merge(Cell::fixed(Bit::One)).unwrap();
		assert_eq!(cell, Cell::fixed(Bit::One));
	}

	#[test]
	fn dont_care_never_changes_destination() {
		for dst in [Cell::OPEN, Cell::fixed(Bit::Zero), Cell::fixed(Bit::One), Cell::overlayable(Bit::One)] {
			let mut cell = dst;
			cell.merge(Cell::fixed(Bit::DontCare)).unwrap();
			assert_eq!(cell, dst);
			cell.merge(Cell::OPEN).unwrap();
			assert_eq!(cell, dst);
		}
	}

	#[test]
	fn fixed_bit_rejects_other_value() {
		let mut cell = Cell::fixed(Bit::Zero);
		assert_eq!(cell.merge(Cell::fixed(Bit::One)), Err(AsmError::Conflict));
		assert_eq!(cell, Cell::fixed(Bit::Zero));

		let mut cell = Cell::fixed(Bit::One);
		assert_eq!(cell.merge(Cell::fixed(Bit::Zero)), Err(AsmError::Conflict));
	}

	#[test]
	fn fixed_bit_accepts_same_value() {
		let mut cell = Cell::fixed(Bit::One);
		cell.merge(Cell::fixed(Bit::One)).unwrap();
		assert_eq!(cell, Cell::fixed(Bit::One));
	}

	#[test]
	fn constant_is_written_msb_first() {
		let field = placed(Field::constant(3, Value::decimal(5)), 2);
		let mut buf = vec![Cell::OPEN; 8];
		field.initialize(&mut buf).unwrap();
		assert_eq!(render(&buf), "XX101XXX");
		assert!(!buf[2].overlay);
		assert!(buf[0].overlay);
	}

	#[test]
	fn constant_round_trips_low_bits() {
		let field = Field::constant(4, Value::new(Radix::Hexadecimal, 8, 0xA7));
		let mut buf = vec![Cell::OPEN; 4];
		field.initialize(&mut buf).unwrap();
		assert_eq!(read_back(&buf), 0x7);
	}

	#[test]
	fn constant_modifiers_apply_at_definition() {
		let mut value = Value::new(Radix::Binary, 4, 0b0011);
		value.modifiers.invert = true;
		let field = Field::constant(4, value);
		let mut buf = vec![Cell::OPEN; 4];
		field.initialize(&mut buf).unwrap();
		assert_eq!(render(&buf), "1100");

		let mut value = Value::new(Radix::Decimal, 4, 1);
		value.modifiers.negate = true;
		let field = Field::constant(4, value);
		let mut buf = vec![Cell::OPEN; 4];
		field.initialize(&mut buf).unwrap();
		assert_eq!(render(&buf), "1111");
	}

	#[test]
	fn two_constants_on_the_same_bits_conflict() {
		let a = Field::constant(4, Value::new(Radix::Binary, 4, 0b1010));
		let b = Field::constant(4, Value::new(Radix::Binary, 4, 0b1011));
		let mut buf = vec![Cell::OPEN; 4];
		a.initialize(&mut buf).unwrap();
		assert_eq!(b.initialize(&mut buf), Err(AsmError::Conflict));
	}

	#[test]
	fn wildcard_leaves_buffer_alone() {
		let mut buf = vec![Cell::fixed(Bit::One); 4];
		Field::wildcard(4).initialize(&mut buf).unwrap();
		assert_eq!(buf, vec![Cell::fixed(Bit::One); 4]);
	}

	#[test]
	fn field_outside_buffer_is_out_of_range() {
		let field = placed(Field::wildcard(4), 6);
		let mut buf = vec![Cell::OPEN; 8];
		assert_eq!(field.initialize(&mut buf), Err(AsmError::OutOfRange { offset: 6, width: 4, word_size: 8 }));
	}

	#[test]
	#[should_panic]
	fn zero_width_field_is_fatal() {
		Field::wildcard(0);
	}

	#[test]
	fn variable_without_default_starts_as_open_zeros() {
		let field = Field::variable(3, Variable { modifiers: Modifiers::NONE, radix: None, default: None, dont_care: false });
		let mut buf = vec![Cell::OPEN; 3];
		field.initialize(&mut buf).unwrap();
		assert_eq!(render(&buf), "000");
		assert!(buf.iter().all(|c| c.overlay));
	}

	#[test]
	fn variable_default_can_be_overridden() {
		let default = Value::new(Radix::Hexadecimal, 4, 0xF);
		let field = Field::variable(4, Variable { modifiers: Modifiers::NONE, radix: None, default: Some(default), dont_care: false });
		let mut buf = vec![Cell::OPEN; 4];
		field.initialize(&mut buf).unwrap();
		assert_eq!(render(&buf), "1111");

		let var = field.as_variable().unwrap();
		assert_eq!(var.radix(), Some(Radix::Hexadecimal));
		var.substitute(&mut buf, &Value::new(Radix::Hexadecimal, 4, 0x5)).unwrap();
		assert_eq!(render(&buf), "0101");
		assert!(buf.iter().all(|c| !c.overlay));
	}

	#[test]
	fn substitution_combines_field_and_use_modifiers() {
		let field = Field::variable(4, Variable {
			modifiers: Modifiers { invert: true, ..Modifiers::NONE },
			radix: Some(Radix::Binary),
			default: None,
			dont_care: true,
		});
		let var = field.as_variable().unwrap();

		let mut buf = vec![Cell::OPEN; 4];
		var.substitute(&mut buf, &Value::new(Radix::Binary, 4, 0b0001)).unwrap();
		assert_eq!(render(&buf), "1110");

		// ~1 = -2, then negated = 2
		let mut buf = vec![Cell::OPEN; 4];
		let arg = Value::new(Radix::Binary, 4, 0b0001).with_modifiers(Modifiers { negate: true, ..Modifiers::NONE });
		var.substitute(&mut buf, &arg).unwrap();
		assert_eq!(render(&buf), "0010");
	}

	#[test]
	fn value_display_uses_literal_notation() {
		assert_eq!(Value::new(Radix::Binary, 4, 5).to_string(), "B#0101");
		assert_eq!(Value::new(Radix::Hexadecimal, 8, 0x1F).to_string(), "2H#1F");
		assert_eq!(Value::new(Radix::Octal, 6, 0o17).to_string(), "2Q#17");
		let v = Value::decimal(12).with_modifiers(Modifiers { invert: true, ..Modifiers::NONE });
		assert_eq!(v.to_string(), "D#12*");
	}
}
