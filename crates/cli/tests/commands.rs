//! End-to-end runs of the `xframe` binary.

use std::process::Command;

use serde_json::Value;

fn xframe(args: &[&str]) -> (Value, String, bool) {
	let output = Command::new(env!("CARGO_BIN_EXE_xframe"))
		.args(["-f", "json"])
		.args(args)
		.env_remove("RUST_LOG")
		.output()
		.expect("failed to execute xframe");

	let stdout = String::from_utf8_lossy(&output.stdout);
	let stderr = String::from_utf8_lossy(&output.stderr).to_string();
	let json = serde_json::from_str(&stdout)
		.unwrap_or_else(|e| panic!("stdout is not a JSON envelope ({e}): {stdout}\nstderr: {stderr}"));
	(json, stderr, output.status.success())
}

#[test]
fn encoded_name_round_trips_through_decode() {
	let (encoded, _, ok) = xframe(&["encode-name", "--tag", "checkout", "--context", "popup", "--prerender-id", "p-1"]);
	assert!(ok, "encode-name should succeed: {encoded}");
	assert_eq!(encoded["command"], "encode-name");
	let name = encoded["data"].as_str().expect("data should be the name");
	assert!(name.starts_with("xframe__checkout__popup__"), "unexpected name: {name}");

	let (decoded, _, ok) = xframe(&["decode-name", name]);
	assert!(ok, "decode-name should succeed: {decoded}");
	assert_eq!(decoded["data"]["tag"], "checkout");
	assert_eq!(decoded["data"]["context"], "popup");
	assert_eq!(decoded["data"]["parent"]["type"], "opener");
	assert_eq!(decoded["data"]["prerenderId"], "p-1");
}

#[test]
fn foreign_window_names_are_rejected() {
	let (json, stderr, ok) = xframe(&["decode-name", "ad-slot-3"]);
	assert!(!ok, "decoding a foreign name should fail");
	assert_eq!(json["ok"], false);
	assert_eq!(json["error"]["code"], "INVALID_INPUT");
	assert!(stderr.contains("not an xframe window name"), "stderr should explain the failure: {stderr}");
}

#[test]
fn simulate_reports_the_wire_exchange() {
	let (json, _, ok) = xframe(&["simulate", "-p", "label=pay", "-u", "x=5"]);
	assert!(ok, "simulate should succeed: {json}");

	let data = &json["data"];
	assert_eq!(data["tag"], "demo");
	assert_eq!(data["context"], "iframe");
	assert_eq!(data["childProps"]["x"], 5);
	assert_eq!(data["childProps"]["label"], "pay");

	let names: Vec<&str> = data["messages"]
		.as_array()
		.expect("messages should be an array")
		.iter()
		.filter_map(|m| m["name"].as_str())
		.collect();
	assert_eq!(names, ["xframe_init", "xframe_props", "xframe_close"]);
}

#[test]
fn simulate_with_a_bad_prop_is_a_configuration_error() {
	let (json, _, ok) = xframe(&["simulate", "-p", "x=not-a-number"]);
	assert!(!ok);
	assert_eq!(json["command"], "simulate");
	assert_eq!(json["error"]["code"], "CONFIGURATION_ERROR");
}
