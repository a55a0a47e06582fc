//--> Imports <--

use std::{
	collections::BTreeMap,
	fmt,
};

use crate::{
	context::MAX_WORD_SIZE,
	error::{
		AsmError,
		AsmResult,
	},
	field::{
		Cell,
		Field,
		Modifiers,
		Radix,
		Value,
		VariableField,
		dec_bitsize,
	},
};

//--> Constants <--

pub const MAX_FRAGMENT_FIELDS: usize = 10;

pub const MAX_TEMPLATE_FIELDS: usize = 30;

//--> Structs <--

// A SUB: an ordered group of fields that can be pulled into other definitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
	name: String,
	fields: Vec<Field>,
	capacity: usize,
	size: u32,
}

// A DEF: a fragment that can be selected as the format of an output line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
	layout: Fragment,
}

// An EQU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constant {
	name: String,
	value: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label {
	name: String,
	address: u32,
	entry: bool,
}

/// Case-insensitive name to symbol mapping.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
	symbols: BTreeMap<String, Symbol>,
}

//--> Enums <--

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Symbol {
	Fragment(Fragment),
	Template(Template),
	Constant(Constant),
	Label(Label),
}

//--> Functions <--

impl Fragment {
	pub fn new(name: &str) -> Fragment { Fragment::with_capacity(name, MAX_FRAGMENT_FIELDS) }

	pub fn with_capacity(name: &str, capacity: usize) -> Fragment {
		Fragment { name: String::from(name), fields: Vec::new(), capacity, size: 0 }
	}

	pub fn name(&self) -> &str { &self.name }

	pub fn fields(&self) -> &[Field] { &self.fields }

	/// Cumulative width of all fields so far.
	pub fn size(&self) -> u32 { self.size }

	pub fn append_field(&mut self, mut field: Field) -> AsmResult<()> {
		if self.fields.len() >= self.capacity {
			return Err(AsmError::Capacity(self.name.clone(), self.capacity))
		}

		if field.width() > MAX_WORD_SIZE {
			return Err(AsmError::FieldWidth(field.width()))
		}

		field.place(self.size);
		self.size = self.size.checked_add(field.width()).ok_or(AsmError::FieldWidth(field.width()))?;
		self.fields.push(field);

		Ok(())
	}

	/// Appends copies of the fields of a previously declared SUB, or a constant field for an EQU.
	pub fn include(&mut self, name: &str, table: &SymbolTable) -> AsmResult<()> {
		match table.lookup(name) {
			None => Err(AsmError::UndeclaredName(String::from(name))),
			Some(Symbol::Template(_)) | Some(Symbol::Label(_)) => Err(AsmError::Structure(String::from(name))),
			Some(Symbol::Constant(constant)) => self.append_field(Field::constant(constant.value.width, constant.value)),
			Some(Symbol::Fragment(fragment)) => {
				for field in fragment.fields.iter() {
					self.append_field(field.clone())?;
				}
				Ok(())
			},
		}
	}
}

impl fmt::Display for Fragment {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for (i, field) in self.fields.iter().enumerate() {
			if i > 0 { write!(f, ", ")?; }
			write!(f, "{}", field)?;
		}

		write!(f, " (size {})", self.size)
	}
}

impl Template {
	pub fn new(name: &str) -> Template {
		Template { layout: Fragment::with_capacity(name, MAX_TEMPLATE_FIELDS) }
	}

	pub fn name(&self) -> &str { self.layout.name() }

	pub fn fields(&self) -> &[Field] { self.layout.fields() }

	pub fn size(&self) -> u32 { self.layout.size() }

	pub fn append_field(&mut self, field: Field) -> AsmResult<()> { self.layout.append_field(field) }

	pub fn include(&mut self, name: &str, table: &SymbolTable) -> AsmResult<()> { self.layout.include(name, table) }

	/// Writes every field into the buffer in declaration order, defaults included.
	pub fn initialize(&self, buffer: &mut [Cell]) -> AsmResult<()> {
		for field in self.layout.fields.iter() {
			field.initialize(buffer)?;
		}

		Ok(())
	}

	pub fn variable_count(&self) -> usize {
		self.layout.fields.iter().filter(|f| f.is_variable()).count()
	}

	pub fn nth_variable_field(&self, n: usize) -> AsmResult<VariableField> {
		self.layout.fields.iter()
			.filter_map(|f| f.as_variable())
			.nth(n)
			.ok_or_else(|| AsmError::TooManyArguments(self.layout.name.clone()))
	}
}

impl fmt::Display for Template {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.layout) }
}

impl Constant {
	// An EQU without an explicit width takes the natural decimal width.
	pub fn new(name: &str, value: Value) -> Constant {
		Constant { name: String::from(name), value: value.fixed_width() }
	}

	pub fn name(&self) -> &str { &self.name }

	pub fn value(&self) -> Value { self.value }
}

impl Label {
	pub fn new(name: &str, address: u32, entry: bool) -> Label {
		Label { name: String::from(name), address, entry }
	}

	pub fn name(&self) -> &str { &self.name }

	pub fn address(&self) -> u32 { self.address }

	pub fn is_entry(&self) -> bool { self.entry }

	/// Labels substitute as paged decimal numbers of their natural width.
	pub fn value(&self) -> Value {
		Value {
			radix: Radix::Decimal,
			width: dec_bitsize(self.address as i64),
			value: self.address as i64,
			modifiers: Modifiers { paged: true, ..Modifiers::NONE },
		}
	}
}

impl Symbol {
	pub fn name(&self) -> &str {
		match self {
			Symbol::Fragment(f) => f.name(),
			Symbol::Template(t) => t.name(),
			Symbol::Constant(c) => c.name(),
			Symbol::Label(l) => l.name(),
		}
	}

	/// Only constants and labels stand for a number.
	pub fn value(&self) -> Option<Value> {
		match self {
			Symbol::Constant(c) => Some(c.value()),
			Symbol::Label(l) => Some(l.value()),
			Symbol::Fragment(_) | Symbol::Template(_) => None,
		}
	}
}

impl fmt::Display for Symbol {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Symbol::Fragment(s) => write!(f, "{}: SUB {}", s.name(), s),
			Symbol::Template(d) => write!(f, "{}: DEF {}", d.name(), d),
			Symbol::Constant(c) => write!(f, "{}: EQU {} (width {})", c.name(), c.value, c.value.width),
			Symbol::Label(l) => write!(f, "{}: {:04X}{}", l.name(), l.address, if l.entry { " (entry)" } else { "" }),
		}
	}
}

impl SymbolTable {
	pub fn new() -> SymbolTable { SymbolTable { symbols: BTreeMap::new() } }

	fn key(name: &str) -> String { name.to_ascii_lowercase() }

	pub fn declare(&mut self, symbol: Symbol) -> AsmResult<()> {
		let key = SymbolTable::key(symbol.name());

		if self.symbols.contains_key(&key) {
			return Err(AsmError::DuplicateName(String::from(symbol.name())))
		}

		self.symbols.insert(key, symbol);
		Ok(())
	}

	pub fn lookup(&self, name: &str) -> Option<&Symbol> {
		self.symbols.get(&SymbolTable::key(name))
	}

	pub fn lookup_value(&self, name: &str) -> AsmResult<Value> {
		match self.lookup(name) {
			Some(symbol) => symbol.value().ok_or_else(|| AsmError::NotAConstant(String::from(name))),
			None => Err(AsmError::UndeclaredName(String::from(name))),
		}
	}

	// Ordered by lower-cased name.
	pub fn iter(&self) -> impl Iterator<Item = &Symbol> { self.symbols.values() }
}

//--> Tests <--

#[cfg(test)]
mod tests {
	use super::*;
	use crate::field::{
		Variable,
		render,
	};

	fn variable(width: u32, radix: Option<Radix>) -> Field {
		Field::variable(width, Variable { modifiers: Modifiers::NONE, radix, default: None, dont_care: true })
	}

	#[test]
	fn append_field_assigns_offsets() {
		let mut sub = Fragment::new("S");
		sub.append_field(Field::wildcard(4)).unwrap();
		sub.append_field(Field::wildcard(3)).unwrap();
		assert_eq!(sub.size(), 7);
		assert_eq!(sub.fields()[0].offset(), 0);
		assert_eq!(sub.fields()[1].offset(), 4);
	}

	#[test]
	fn oversized_field_is_rejected() {
		let mut sub = Fragment::new("S");
		assert_eq!(sub.append_field(Field::wildcard(4_000_000_000)), Err(AsmError::FieldWidth(4_000_000_000)));
		sub.append_field(Field::wildcard(128)).unwrap();
		assert_eq!(sub.size(), 128);
		assert_eq!(sub.fields().len(), 1);
	}

	#[test]
	fn fragment_capacity_is_enforced() {
		let mut sub = Fragment::new("S");
		for _ in 0..MAX_FRAGMENT_FIELDS {
			sub.append_field(Field::wildcard(1)).unwrap();
		}
		assert_eq!(sub.append_field(Field::wildcard(1)), Err(AsmError::Capacity(String::from("S"), MAX_FRAGMENT_FIELDS)));

		let mut def = Template::new("D");
		for _ in 0..MAX_TEMPLATE_FIELDS {
			def.append_field(Field::wildcard(1)).unwrap();
		}
		assert!(def.append_field(Field::wildcard(1)).is_err());
	}

	#[test]
	fn include_appends_after_current_size() {
		let mut table = SymbolTable::new();
		let mut inner = Fragment::new("Inner");
		inner.append_field(Field::wildcard(2)).unwrap();
		inner.append_field(variable(6, Some(Radix::Hexadecimal))).unwrap();
		table.declare(Symbol::Fragment(inner)).unwrap();

		let mut outer = Template::new("Outer");
		outer.append_field(Field::wildcard(5)).unwrap();
		outer.include("INNER", &table).unwrap();

		assert_eq!(outer.size(), 13);
		assert_eq!(outer.fields()[1].offset(), 5);
		assert_eq!(outer.fields()[2].offset(), 7);
		assert_eq!(outer.fields()[2].width(), 6);
		assert_eq!(outer.variable_count(), 1);
	}

	#[test]
	fn include_rejects_templates_and_unknown_names() {
		let mut table = SymbolTable::new();
		table.declare(Symbol::Template(Template::new("T"))).unwrap();

		let mut other = Template::new("U");
		assert_eq!(other.include("t", &table), Err(AsmError::Structure(String::from("t"))));
		assert_eq!(other.include("nope", &table), Err(AsmError::UndeclaredName(String::from("nope"))));
	}

	#[test]
	fn include_of_constant_adds_constant_field() {
		let mut table = SymbolTable::new();
		table.declare(Symbol::Constant(Constant::new("K", Value::new(Radix::Binary, 3, 0b110)))).unwrap();

		let mut def = Template::new("D");
		def.include("K", &table).unwrap();
		let mut buf = vec![Cell::OPEN; 3];
		def.initialize(&mut buf).unwrap();
		assert_eq!(render(&buf), "110");
	}

	#[test]
	fn nth_variable_field_skips_other_kinds() {
		let mut def = Template::new("D");
		def.append_field(variable(2, None)).unwrap();
		def.append_field(Field::wildcard(3)).unwrap();
		def.append_field(variable(4, Some(Radix::Octal))).unwrap();

		let second = def.nth_variable_field(1).unwrap();
		assert_eq!(second.offset(), 5);
		assert_eq!(second.radix(), Some(Radix::Octal));
		assert_eq!(def.nth_variable_field(2).unwrap_err(), AsmError::TooManyArguments(String::from("D")));
	}

	#[test]
	fn names_are_case_insensitive() {
		let mut table = SymbolTable::new();
		table.declare(Symbol::Constant(Constant::new("Mask", Value::decimal(7)))).unwrap();

		assert!(table.lookup("MASK").is_some());
		assert_eq!(table.declare(Symbol::Constant(Constant::new("mask", Value::decimal(1)))), Err(AsmError::DuplicateName(String::from("mask"))));
		assert_eq!(table.lookup_value("mAsK").unwrap().value, 7);
	}

	#[test]
	fn only_constants_and_labels_have_values() {
		let mut table = SymbolTable::new();
		table.declare(Symbol::Fragment(Fragment::new("S"))).unwrap();
		table.declare(Symbol::Label(Label::new("L", 0x12, false))).unwrap();

		assert_eq!(table.lookup_value("S"), Err(AsmError::NotAConstant(String::from("S"))));
		assert_eq!(table.lookup_value("X"), Err(AsmError::UndeclaredName(String::from("X"))));

		let label = table.lookup_value("L").unwrap();
		assert_eq!(label.value, 0x12);
		assert_eq!(label.width, 5);
		assert!(label.modifiers.paged);
	}

	#[test]
	fn constant_without_width_gets_natural_width() {
		let c = Constant::new("C", Value::new(Radix::Hexadecimal, 0, 9));
		assert_eq!(c.value().width, 4);
		assert_eq!(c.value().radix, Radix::Decimal);
	}
}
