use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use xframe::{ContextType, ParentRef};

use crate::args::{parse_parent, parse_prop};
use crate::output::OutputFormat;

/// Cargo-like help colors.
fn cli_styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
		.valid(AnsiColor::Cyan.on_default())
}

#[derive(Parser, Debug)]
#[command(name = "xframe")]
#[command(about = "Simulate cross-window component sessions and inspect xframe window names")]
#[command(version)]
#[command(styles = cli_styles())]
pub struct Cli {
	/// Increase verbosity (-v lifecycle, -vv wire traffic)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short = 'f', long, global = true, value_enum, default_value = "json")]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run a host and a child against the in-memory browser and report the exchange
	Simulate(SimulateArgs),

	/// Build the window name a host would give a surface
	EncodeName(EncodeNameArgs),

	/// Decode the identity carried in a window name
	DecodeName {
		/// The window name to decode
		name: String,
	},
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
	/// Component definition as JSON; a built-in demo component when omitted
	#[arg(short, long, value_name = "FILE")]
	pub definition: Option<PathBuf>,

	/// Context to render into (defaults to the component's default)
	#[arg(short, long)]
	pub context: Option<ContextType>,

	/// Initial prop, repeatable (`key=value`, value parsed as JSON when possible)
	#[arg(short, long = "prop", value_name = "KEY=VALUE", value_parser = parse_prop)]
	pub props: Vec<(String, Value)>,

	/// Prop update sent after the handshake, repeatable
	#[arg(short, long = "update", value_name = "KEY=VALUE", value_parser = parse_prop)]
	pub updates: Vec<(String, Value)>,

	/// Render a same-origin placeholder until the child initializes
	#[arg(long)]
	pub prerender: bool,

	/// Render without attaching a child, leaving the host waiting
	#[arg(long)]
	pub no_child: bool,

	/// Have the child report this message to the host as an integration error
	#[arg(long, value_name = "MESSAGE")]
	pub report_error: Option<String>,

	/// Which side ends the session
	#[arg(long, value_enum, default_value = "host")]
	pub close_by: CloseBy,

	/// How long to wait for the handshake and for teardown
	#[arg(long, value_name = "MS", default_value_t = 2000)]
	pub timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CloseBy {
	/// The host calls close()
	#[default]
	Host,
	/// The child calls close()
	Child,
	/// The host window itself goes away
	HostWindow,
}

#[derive(Args, Debug)]
pub struct EncodeNameArgs {
	/// Component tag
	#[arg(short, long)]
	pub tag: String,

	/// Surface context
	#[arg(short, long, default_value = "iframe")]
	pub context: ContextType,

	/// Parent reference: opener, parent[:N] or uid:<id> (defaults by context)
	#[arg(short, long, value_parser = parse_parent)]
	pub parent: Option<ParentRef>,

	/// Pre-render id to embed
	#[arg(long)]
	pub prerender_id: Option<String>,
}

#[cfg(test)]
mod tests {
	use clap::CommandFactory;

	use super::*;

	#[test]
	fn command_definition_is_consistent() {
		Cli::command().debug_assert();
	}

	#[test]
	fn simulate_collects_repeated_props() {
		let cli = Cli::try_parse_from([
			"xframe", "simulate", "-p", "amount=25", "-p", "name=ada", "-u", "amount=30", "--close-by", "child",
		])
		.unwrap();
		let Commands::Simulate(args) = cli.command else {
			panic!("expected simulate");
		};
		assert_eq!(args.props.len(), 2);
		assert_eq!(args.updates, [("amount".to_string(), serde_json::json!(30))]);
		assert_eq!(args.close_by, CloseBy::Child);
		assert_eq!(cli.format, OutputFormat::Json);
	}

	#[test]
	fn encode_name_parses_context_and_parent() {
		let cli = Cli::try_parse_from([
			"xframe", "-f", "text", "encode-name", "--tag", "foo", "--context", "popup", "--parent", "uid:w3",
		])
		.unwrap();
		let Commands::EncodeName(args) = cli.command else {
			panic!("expected encode-name");
		};
		assert_eq!(args.context, ContextType::Popup);
		assert_eq!(args.parent, Some(ParentRef::Uid { uid: "w3".into() }));
		assert_eq!(cli.format, OutputFormat::Text);
	}

	#[test]
	fn bad_context_is_rejected() {
		assert!(Cli::try_parse_from(["xframe", "encode-name", "--tag", "foo", "--context", "tab"]).is_err());
	}
}
