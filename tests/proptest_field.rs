//! Property tests for the bit-level field model and the location pointer.

use mcasm::{
	AsmError,
	CompilationContext,
	field::{
		Bit,
		Cell,
		Field,
		Modifiers,
		Value,
		dec_bitsize,
		expand,
		merge_reversed,
	},
	symbol::{
		Fragment,
		Symbol,
		SymbolTable,
		Template,
	},
};
use proptest::prelude::*;

fn bit() -> impl Strategy<Value = Bit> {
	prop_oneof![Just(Bit::Zero), Just(Bit::One), Just(Bit::DontCare)]
}

fn cell() -> impl Strategy<Value = Cell> {
	(bit(), any::<bool>()).prop_map(|(bit, overlay)| Cell { bit, overlay })
}

fn concrete() -> impl Strategy<Value = Bit> {
	prop_oneof![Just(Bit::Zero), Just(Bit::One)]
}

fn read_back(cells: &[Cell]) -> i64 {
	cells.iter().fold(0, |acc, c| (acc << 1) | (c.bit == Bit::One) as i64)
}

proptest! {
	/// A don't-care source never changes the destination.
	#[test]
	fn prop_dont_care_is_a_no_op(dst in cell(), overlay in any::<bool>()) {
		let mut merged = dst;
		merged.merge(Cell { bit: Bit::DontCare, overlay }).unwrap();
		prop_assert_eq!(merged, dst);
	}

	/// Merging a cell into itself succeeds and changes nothing.
	#[test]
	fn prop_merge_is_idempotent(dst in cell()) {
		let mut merged = dst;
		merged.merge(dst).unwrap();
		prop_assert_eq!(merged, dst);
	}

	/// Two fixed, different concrete bits conflict in either order.
	#[test]
	fn prop_fixed_disagreement_conflicts(a in concrete()) {
		let b = if a == Bit::One { Bit::Zero } else { Bit::One };

		prop_assert_eq!(Cell::fixed(a).merge(Cell::fixed(b)), Err(AsmError::Conflict));
		prop_assert_eq!(Cell::fixed(b).merge(Cell::fixed(a)), Err(AsmError::Conflict));
	}

	/// An overlayable destination takes any concrete source, flag included.
	#[test]
	fn prop_overlayable_takes_source(dst in concrete(), src in concrete(), overlay in any::<bool>()) {
		let mut merged = Cell::overlayable(dst);
		merged.merge(Cell { bit: src, overlay }).unwrap();
		prop_assert_eq!(merged, Cell { bit: src, overlay });
	}

	#[test]
	fn prop_dec_bitsize_is_highest_bit_plus_one(v in 1i64..=65535) {
		let w = dec_bitsize(v);
		prop_assert!(v >> (w - 1) == 1);
		prop_assert!(v < (1 << w));
	}

	/// A constant written into a word of its own width reads back as itself.
	#[test]
	fn prop_constant_round_trip(width in 1u32..=16, raw in any::<u16>()) {
		let v = (raw as i64) & ((1 << width) - 1);
		let mut buffer = vec![Cell::OPEN; width as usize];

		merge_reversed(&mut buffer, 0, width, &expand(v, Modifiers::NONE, Modifiers::NONE, width, false)).unwrap();

		prop_assert_eq!(read_back(&buffer), v);
		prop_assert!(buffer.iter().all(|c| !c.overlay));
	}

	/// ALIGN lands on a multiple of the boundary past the current location.
	#[test]
	fn prop_align_rounds_past_location(start in 0u32..10_000, shift in 1u32..=4) {
		let boundary = 1 << shift;
		let mut ctx = CompilationContext::new();
		ctx.next_pass();
		ctx.set_location(start).unwrap();
		ctx.align_location(boundary).unwrap();

		let p = ctx.location().unwrap();
		prop_assert_eq!(p % boundary, 0);
		prop_assert!(p > start);
		prop_assert!(p - start <= boundary);
	}

	/// Including a SUB appends its fields behind whatever came before.
	#[test]
	fn prop_include_offsets_follow_size(lead in 1u32..=8, widths in prop::collection::vec(1u32..=6, 1..=10)) {
		let mut sub = Fragment::new("S");
		for w in &widths {
			sub.append_field(Field::wildcard(*w)).unwrap();
		}

		let mut table = SymbolTable::new();
		table.declare(Symbol::Fragment(sub)).unwrap();

		let mut def = Template::new("D");
		def.append_field(Field::constant(lead, Value::decimal(0))).unwrap();
		def.include("s", &table).unwrap();

		let mut expected = lead;
		for (field, w) in def.fields()[1..].iter().zip(&widths) {
			prop_assert_eq!(field.offset(), expected);
			expected += w;
		}
		prop_assert_eq!(def.size(), expected);
	}
}
