use clap::Parser;
use xframe_cli::{
	cli::Cli,
	commands,
	error::CliError,
	logging,
	output::{self, OutputFormat, ResultBuilder},
};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	let command = command_name(&cli);

	if let Err(err) = commands::dispatch(cli, format).await {
		handle_error(command, err, format);
		std::process::exit(1);
	}
}

fn command_name(cli: &Cli) -> &'static str {
	use xframe_cli::cli::Commands;
	match cli.command {
		Commands::Simulate(_) => "simulate",
		Commands::EncodeName(_) => "encode-name",
		Commands::DecodeName { .. } => "decode-name",
	}
}

fn handle_error(command: &str, err: CliError, format: OutputFormat) {
	let cmd_error = err.to_command_error();

	// Humans read stderr; scripts read the envelope on stdout.
	output::print_error_stderr(&cmd_error);
	if format != OutputFormat::Text {
		let result: output::CommandResult<()> = ResultBuilder::new(command).error(cmd_error).build();
		output::print_result(&result, format);
	}
}
