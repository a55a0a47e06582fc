//--> Imports <--

use std::{
	fs::File,
	io::{
		self,
		BufWriter,
	},
	path::{
		Path,
		PathBuf,
	},
	process,
};

use clap::{
	Arg,
	ArgAction,
};

use mcasm::{
	ErrorList,
	OutputFormat,
	SourceFile,
};

use tracing::Level;

//--> Structs <--

#[derive(Clone, Debug)]
struct OutputRequest {
	format: OutputFormat,
	path: PathBuf,
}

//--> Functions <--

fn main() {
	let args = {
		clap::command!()
		.long_about(
			"mcasm is a meta assembler for horizontal microcode. \
			A definition file declares the word size and the formats (DEF), subfields (SUB), and constants (EQU) of the target. \
			The source file is then assembled against those definitions into one microword per statement.\n\n\
			By default, the definitions are read from '<PREFIX>.def' and the source from '<PREFIX>.src'."
		)
		.arg_required_else_help(true)
		.args([
			{
				Arg::new("verbose")
				.short('v')
				.long("verbose")
				.help("Logs every pass and every declaration while assembling, rather than just errors.")
			},
			{
				Arg::new("trace")
				.long("trace")
				.help("Logs every step of every line substitution. Implies --verbose.")
			},
			{
				Arg::new("octal")
				.short('q')
				.long("octal")
				.help("Prints addresses in octal rather than hex in the formats that don't fix a radix.")
			},
			{
				Arg::new("definitions")
				.short('D')
				.long("def")
				.value_name("DEFPATH")
				.value_parser(clap::value_parser!(PathBuf))
				.help("Reads the definitions from this file. '.def' is added when it has no extension.")
			},
			{
				Arg::new("source")
				.short('S')
				.long("src")
				.value_name("SRCPATH")
				.value_parser(clap::value_parser!(PathBuf))
				.help("Reads the source from this file. '.src' is added when it has no extension.")
			},
			{
				Arg::new("output")
				.short('o')
				.long("out")
				.value_name("FORMAT=PATH")
				.value_parser(output_request)
				.action(ArgAction::Append)
				.help("Writes the assembled program to PATH in FORMAT (bp, bn, h0, h1, q0, q1, m, vb0, vb1, vh0, vh1, sym). May be given more than once.")
			},
			{
				Arg::new("prefix")
				.value_name("PREFIX")
				.help("Common name of the definition and source files.")
			}
		])
		.get_matches()
	};

	let level = if args.contains_id("trace") {
		Level::TRACE
	} else if args.contains_id("verbose") {
		Level::DEBUG
	} else {
		Level::WARN
	};

	tracing_subscriber::fmt()
		.with_max_level(level)
		.with_writer(io::stderr)
		.init();

	let hex = !args.contains_id("octal");

	let prefix = args.get_one::<String>("prefix").map(|p| match p.split_once('.') {
		Some((head, _)) => String::from(head),
		None => p.clone(),
	});

	let def_path = input_path(args.get_one::<PathBuf>("definitions"), prefix.as_deref(), "def");
	let src_path = input_path(args.get_one::<PathBuf>("source"), prefix.as_deref(), "src");

	let (def_path, src_path) = match (def_path, src_path) {
		(Some(d), Some(s)) => (d, s),
		_ => {
			eprintln!("ERR: Give a PREFIX, or both a definition file (-D) and a source file (-S).");
			process::exit(2);
		}
	};

	let requests: Vec<OutputRequest> = args.get_many::<OutputRequest>("output").map(|r| r.cloned().collect()).unwrap_or_default();

	let (definitions, source) = match (SourceFile::read(&def_path), SourceFile::read(&src_path)) {
		(Ok(d), Ok(s)) => (d, s),
		(d, s) => {
			for err in [d.err(), s.err()].into_iter().flatten() {
				eprintln!("{}", err);
			}
			process::exit(2);
		}
	};

	match mcasm::assemble(&definitions, &source) {
		Ok((ctx, warns)) => {
			report(&warns);

			if let Some(title) = ctx.title() {
				println!("INFO: {}", title);
			}

			for request in &requests {
				let written = File::create(&request.path)
					.map(BufWriter::new)
					.and_then(|mut out| request.format.write(&mut out, ctx.lines(), ctx.labels(), hex));

				match written {
					Ok(()) => tracing::info!("wrote {} output to '{}'", request.format, request.path.display()),
					Err(err) => {
						eprintln!("ERR: {}: Couldn't write the output file: {}", request.path.display(), err);
						process::exit(2);
					}
				}
			}

			println!("INFO: Assembled {} words, with {} warnings.", ctx.lines().len(), warns.len());
		},
		Err(errs) => {
			let err_count = errs.iter().filter(|e| !e.is_warning).count();
			let warn_count = errs.iter().filter(|e| e.is_warning).count();

			report(&errs);

			eprintln!("ERR: Failed to assemble '{}', with {} errors and {} warnings.", source.path.display(), err_count, warn_count);
			process::exit(1);
		}
	}
}

fn report(errs: &ErrorList) {
	for err in errs {
		eprintln!("{}", err);
	}
}

// An explicit path wins over the prefix. A missing extension gets the default one.
fn input_path(explicit: Option<&PathBuf>, prefix: Option<&str>, extension: &str) -> Option<PathBuf> {
	match explicit {
		Some(path) if path.extension().is_none() => Some(path.with_extension(extension)),
		Some(path) => Some(path.clone()),
		None => prefix.map(|p| Path::new(p).with_extension(extension)),
	}
}

fn output_request(arg: &str) -> Result<OutputRequest, String> {
	let (format, path) = arg.split_once('=').ok_or_else(|| format!("Expected FORMAT=PATH, got '{}'", arg))?;

	if path.is_empty() {
		return Err(format!("No output path given for format '{}'", format))
	}

	Ok(OutputRequest { format: format.parse()?, path: PathBuf::from(path) })
}
