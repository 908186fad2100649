// Copyright 2025 Irreducible Inc.
use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::{SeedableRng, rngs::StdRng};
use stratum_core::{LayeredCircuit, NoCustomGates, Witness};
use stratum_field::{Bn254, Field, FieldId, Gf2, M31};
use stratum_frontend::{CircuitStat, CompileOptions, IrStat, compile, ir::RootCircuit};
use stratum_utils::serialization::{DeserializeBytes, SerializeBytes};
use tracing_subscriber::EnvFilter;

/// Layered circuit compiler.
#[derive(Debug, Parser)]
#[command(name = "stratum", version, about = "Compile and inspect layered arithmetic circuits")]
struct Args {
	/// Field the circuits are defined over
	#[arg(short, long, global = true, env = "STRATUM_FIELD", default_value = "m31")]
	field: FieldId,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Compile an IR file into a layered circuit file
	Compile {
		/// Path to the IR binary
		ir: PathBuf,

		/// Path to write the layered circuit binary
		#[arg(short, long)]
		output: PathBuf,

		/// Skip the structural validation of the compiled circuit
		#[arg(long)]
		skip_validation: bool,

		/// Keep the layered circuit exactly as the layering produced it
		#[arg(long)]
		no_optimize: bool,
	},

	/// Display layered circuit statistics
	Stat {
		/// Path to the layered circuit binary
		circuit: PathBuf,
	},

	/// Evaluate a layered circuit on every assignment of a witness file
	Check {
		/// Path to the layered circuit binary
		circuit: PathBuf,

		/// Path to the witness binary
		witness: PathBuf,

		/// Seed for the random coefficients
		#[arg(long, default_value_t = 0)]
		seed: u64,
	},

	/// Structurally validate a layered circuit
	Validate {
		/// Path to the layered circuit binary
		circuit: PathBuf,
	},
}

fn read_file(path: &PathBuf) -> Result<Vec<u8>> {
	fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_deserialized<T: DeserializeBytes>(path: &PathBuf, what: &str) -> Result<T> {
	let bytes = read_file(path)?;
	T::deserialize(bytes.as_slice())
		.with_context(|| format!("Failed to deserialize {what} from {}", path.display()))
}

fn write_serialized<T: SerializeBytes>(value: &T, path: &PathBuf) -> Result<()> {
	if let Some(parent) = path.parent()
		&& !parent.as_os_str().is_empty()
	{
		fs::create_dir_all(parent)
			.with_context(|| format!("Failed to create directory {}", parent.display()))?;
	}
	let mut buf = Vec::new();
	value.serialize(&mut buf)?;
	fs::write(path, &buf).with_context(|| format!("Failed to write {}", path.display()))
}

fn run<F: Field>(command: Commands) -> Result<()> {
	match command {
		Commands::Compile {
			ir,
			output,
			skip_validation,
			no_optimize,
		} => {
			let rc = RootCircuit::<F>::from_bytes(&read_file(&ir)?)
				.with_context(|| format!("Failed to decode IR from {}", ir.display()))?;
			print!("{}", IrStat::collect(&rc));
			println!();
			let opts = CompileOptions {
				validate_layered: !skip_validation,
				optimize_layered: !no_optimize,
				..CompileOptions::default()
			};
			let result = compile(&rc, &opts).context("Compilation failed")?;
			print!("{}", CircuitStat::collect(&result.layered));
			write_serialized(&result.layered, &output)?;
			tracing::info!(path = %output.display(), "wrote layered circuit");
		}
		Commands::Stat { circuit } => {
			let circuit = read_deserialized::<LayeredCircuit<F>>(&circuit, "layered circuit")?;
			circuit.validate().context("Invalid layered circuit")?;
			print!("{}", CircuitStat::collect(&circuit));
		}
		Commands::Check {
			circuit,
			witness,
			seed,
		} => {
			let circuit = read_deserialized::<LayeredCircuit<F>>(&circuit, "layered circuit")?;
			circuit.validate().context("Invalid layered circuit")?;
			let witness = read_deserialized::<Witness<F>>(&witness, "witness")?;
			let mut rng = StdRng::seed_from_u64(seed);
			let results = circuit
				.run(&witness, &mut rng, &NoCustomGates)
				.context("Evaluation failed")?;
			let failed = results.iter().filter(|&&ok| !ok).count();
			for (i, ok) in results.iter().enumerate() {
				println!("Witness {}: {}", i, if *ok { "satisfied" } else { "NOT satisfied" });
			}
			if failed > 0 {
				bail!("{failed} of {} witnesses are not satisfied", results.len());
			}
		}
		Commands::Validate { circuit } => {
			let circuit = read_deserialized::<LayeredCircuit<F>>(&circuit, "layered circuit")?;
			circuit.validate().context("Invalid layered circuit")?;
			println!(
				"valid: {} layers, {} inputs, {} outputs",
				circuit.depth(),
				circuit.input_len(),
				circuit.output_len()
			);
		}
	}
	Ok(())
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_writer(std::io::stderr)
		.init();
	let args = Args::parse();
	tracing::debug!(field = %args.field, "starting");

	match args.field {
		FieldId::M31 => run::<M31>(args.command),
		FieldId::Bn254 => run::<Bn254>(args.command),
		FieldId::Gf2 => run::<Gf2>(args.command),
	}
}
