use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Installs the stderr subscriber.
///
/// `RUST_LOG` wins over the verbosity flags when set.
pub fn init_logging(verbosity: u8) {
	// 0 = errors only, protocol chatter off
	// 1 (-v) = lifecycle events from the library, warnings from the runtime
	// 2+ (-vv) = every message on the wire
	let filter = match verbosity {
		0 => "error,xframe_runtime=off",
		1 => "info,xframe_runtime=warn",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
