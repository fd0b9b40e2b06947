//! Command dispatch.

pub mod name;
pub mod simulate;

use serde::Serialize;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use crate::output::{self, DiagnosticLevel, OutputFormat, ResultBuilder};

pub async fn dispatch(cli: Cli, format: OutputFormat) -> Result<()> {
	match cli.command {
		Commands::Simulate(args) => {
			let data = simulate::run(args).await?;
			let mut result = ResultBuilder::new("simulate");
			if data.child_props.is_none() {
				result = result.diagnostic(DiagnosticLevel::Info, "no child attached; the host closed before any handshake");
			}
			output::print_result(&result.data(data).build(), format);
		}
		Commands::EncodeName(args) => emit("encode-name", name::encode(args)?, format),
		Commands::DecodeName { name: window_name } => emit("decode-name", name::decode(&window_name)?, format),
	}
	Ok(())
}

fn emit<T: Serialize>(command: &str, data: T, format: OutputFormat) {
	let result = ResultBuilder::new(command).data(data).build();
	output::print_result(&result, format);
}
