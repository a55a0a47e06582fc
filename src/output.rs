//--> Imports <--

use std::{
	fmt,
	io::{
		self,
		Write,
	},
	str::FromStr,
};

use clap::{
	PossibleValue,
	ValueEnum,
};

use crate::{
	line::OutputLine,
	symbol::{
		Label,
		Symbol,
		SymbolTable,
	},
};

//--> Enums <--

/// Every dump format a finished program can be written in.
///
/// The digit suffix says what a don't-care bit becomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputFormat {
	BpnfP,
	BpnfN,
	HexBytes0,
	HexBytes1,
	OctBytes0,
	OctBytes1,
	Map,
	VerilogBin0,
	VerilogBin1,
	VerilogHex0,
	VerilogHex1,
	Symbols,
}

// How a byte dump is laid out.
#[derive(Clone, Copy)]
struct ByteLayout {
	address: bool,
	spaced: bool,
	hex: bool,
	replacement: bool,
}

//--> Functions <--

fn address(out: &mut impl Write, addr: u32, hex: bool) -> io::Result<()> {
	if hex { write!(out, "{:04X} ", addr) } else { write!(out, "{:06o} ", addr) }
}

fn pack(bits: &[bool]) -> u32 {
	bits.iter().fold(0, |acc, &b| (acc << 1) | b as u32)
}

fn byte_line(out: &mut impl Write, line: &OutputLine, layout: ByteLayout) -> io::Result<()> {
	if layout.address { address(out, line.address(), layout.hex)?; }

	let bits: Vec<bool> = line.resolved(layout.replacement).collect();
	let lead = bits.len() % 8;

	let groups = (lead > 0).then(|| &bits[..lead]).into_iter().chain(bits[lead..].chunks(8));
	for group in groups {
		if layout.spaced { write!(out, " ")?; }
		if layout.hex { write!(out, "{:02X}", pack(group))?; } else { write!(out, "{:03o}", pack(group))?; }
	}

	writeln!(out)
}

fn bpnf_line(out: &mut impl Write, line: &OutputLine, hex: bool, replacement: char) -> io::Result<()> {
	address(out, line.address(), hex)?;

	let body: String = line.cells().iter().map(|c| match c.bit.symbol() {
		'1' => 'P',
		'0' => 'N',
		_ => replacement,
	}).collect();

	writeln!(out, "B{}F", body)
}

fn map_line(out: &mut impl Write, line: &OutputLine, hex: bool) -> io::Result<()> {
	address(out, line.address(), hex)?;

	let map = line.map();
	let groups: Vec<&str> = map.as_bytes().chunks(16).filter_map(|c| std::str::from_utf8(c).ok()).collect();

	writeln!(out, "{}", groups.join(" "))
}

fn label_list<'a>(labels: &'a SymbolTable, entries: bool) -> Vec<&'a Label> {
	labels.iter().filter_map(|s| match s {
		Symbol::Label(l) if l.is_entry() == entries => Some(l),
		_ => None
	}).collect()
}

fn symbols(out: &mut impl Write, labels: &SymbolTable, hex: bool) -> io::Result<()> {
	for (heading, entries) in [("ENTRY POINTS", true), ("SYMBOLS", false)] {
		writeln!(out, "{}", heading)?;

		let list = label_list(labels, entries);
		for label in &list {
			if hex { writeln!(out, "{:<8} {:04X}", label.name(), label.address())?; } else { writeln!(out, "{:<8} {:06o}", label.name(), label.address())?; }
		}

		if entries && !list.is_empty() { writeln!(out)?; }
	}

	Ok(())
}

impl OutputFormat {
	/// Writes the program in this format.
	///
	/// `hex` picks the address radix for the formats that don't fix one themselves.
	pub fn write<W: Write>(&self, out: &mut W, lines: &[OutputLine], labels: &SymbolTable, hex: bool) -> io::Result<()> {
		tracing::debug!("writing {} lines as {}", lines.len(), self);

		match self {
			OutputFormat::BpnfP | OutputFormat::BpnfN => {
				let replacement = if *self == OutputFormat::BpnfP { 'P' } else { 'N' };
				for line in lines { bpnf_line(out, line, hex, replacement)?; }
			},
			OutputFormat::Map => for line in lines { map_line(out, line, hex)?; },
			OutputFormat::VerilogBin0 | OutputFormat::VerilogBin1 => {
				let replacement = *self == OutputFormat::VerilogBin1;
				for line in lines {
					let bits: String = line.resolved(replacement).map(|b| if b { '1' } else { '0' }).collect();
					writeln!(out, "{}", bits)?;
				}
			},
			OutputFormat::Symbols => symbols(out, labels, hex)?,
			_ => {
				let layout = self.byte_layout();
				for line in lines { byte_line(out, line, layout)?; }
			},
		}

		out.flush()
	}

	fn byte_layout(&self) -> ByteLayout {
		let (address, hex, replacement) = match self {
			OutputFormat::HexBytes0 => (true, true, false),
			OutputFormat::HexBytes1 => (true, true, true),
			OutputFormat::OctBytes0 => (true, false, false),
			OutputFormat::OctBytes1 => (true, false, true),
			OutputFormat::VerilogHex0 => (false, true, false),
			_ => (false, true, true),
		};

		ByteLayout { address, spaced: address, hex, replacement }
	}
}

impl ValueEnum for OutputFormat {
	fn to_possible_value<'a>(&self) -> Option<PossibleValue<'a>> {
		match self {
			OutputFormat::BpnfP => Some(PossibleValue::new("bp").help("BPNF, don't care as P")),
			OutputFormat::BpnfN => Some(PossibleValue::new("bn").help("BPNF, don't care as N")),
			OutputFormat::HexBytes0 => Some(PossibleValue::new("h0").help("Hex bytes, don't care as 0")),
			OutputFormat::HexBytes1 => Some(PossibleValue::new("h1").help("Hex bytes, don't care as 1")),
			OutputFormat::OctBytes0 => Some(PossibleValue::new("q0").help("Octal bytes, don't care as 0")),
			OutputFormat::OctBytes1 => Some(PossibleValue::new("q1").help("Octal bytes, don't care as 1")),
			OutputFormat::Map => Some(PossibleValue::new("m").help("Raw 0/1/X map")),
			OutputFormat::VerilogBin0 => Some(PossibleValue::new("vb0").help("Verilog $readmemb, don't care as 0")),
			OutputFormat::VerilogBin1 => Some(PossibleValue::new("vb1").help("Verilog $readmemb, don't care as 1")),
			OutputFormat::VerilogHex0 => Some(PossibleValue::new("vh0").help("Verilog $readmemh, don't care as 0")),
			OutputFormat::VerilogHex1 => Some(PossibleValue::new("vh1").help("Verilog $readmemh, don't care as 1")),
			OutputFormat::Symbols => Some(PossibleValue::new("sym").help("Label table")),
		}
	}

	fn value_variants<'a>() -> &'a [Self] {
		&[
			OutputFormat::BpnfP,
			OutputFormat::BpnfN,
			OutputFormat::HexBytes0,
			OutputFormat::HexBytes1,
			OutputFormat::OctBytes0,
			OutputFormat::OctBytes1,
			OutputFormat::Map,
			OutputFormat::VerilogBin0,
			OutputFormat::VerilogBin1,
			OutputFormat::VerilogHex0,
			OutputFormat::VerilogHex1,
			OutputFormat::Symbols,
		]
	}
}

impl FromStr for OutputFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		<OutputFormat as ValueEnum>::from_str(s, true).map_err(|_| format!("Unknown output format '{}'", s))
	}
}

impl fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.to_possible_value() {
			Some(v) => write!(f, "{}", v.get_name()),
			None => Ok(()),
		}
	}
}

//--> Tests <--
