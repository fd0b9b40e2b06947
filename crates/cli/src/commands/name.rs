use xframe::{ContextType, ParentRef, WindowIdentity, window_name};

use crate::cli::EncodeNameArgs;
use crate::error::{CliError, Result};
use crate::output::IdentityData;

pub fn encode(args: EncodeNameArgs) -> Result<String> {
	let parent = args.parent.unwrap_or(match args.context {
		ContextType::Iframe => ParentRef::Parent { distance: 1 },
		ContextType::Popup => ParentRef::Opener,
	});
	let identity = WindowIdentity::new(args.tag, args.context, parent)?.with_prerender_id(args.prerender_id);
	Ok(identity.encode())
}

pub fn decode(name: &str) -> Result<IdentityData> {
	if !window_name::is_xframe_name(name) {
		return Err(CliError::InvalidInput(format!("'{name}' is not an xframe window name")));
	}
	let identity = WindowIdentity::decode(name)?;
	Ok(IdentityData {
		tag: identity.tag().to_string(),
		context: identity.context(),
		parent: identity.parent().clone(),
		prerender_id: identity.prerender_id().map(str::to_string),
	})
}
