use std::io::Write;
use std::process::{Command, Output, Stdio};

use serde_json::Value;

const COMPLETION: &str = "(entity<||>product<||>iPhone<||>10<||>15<||>0.92##(entity<||>price<||>20000<||>30<||>35<||>0.4##(entity<||>brand<||>Apple<||>3<||>8<||>0.88##(missing<||>brand##<|COMPLETE|>";

fn run_nlu(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_nlu"))
        .args(args)
        .env("RUST_LOG", "off")
        .env_remove("NLU_ENTITY")
        .env_remove("NLU_INTENT")
        .env_remove("NLU_REQUIRED_ASK_PRICE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn nlu binary");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin.as_bytes())
        .expect("failed to write stdin");
    child.wait_with_output().expect("failed to wait for nlu")
}

fn parse_payload(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn config_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[required_keys]").unwrap();
    writeln!(file, "ask_price = [\"product\", \"price\", \"brand\"]").unwrap();
    file
}

#[test]
fn missing_reports_computed_and_self_reported_keys() {
    let config = config_file();
    let path = config.path().to_str().unwrap();
    let output = run_nlu(&["--config", path, "missing", "--intent", "ask-price"], COMPLETION);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let payload = parse_payload(&output);
    assert_eq!(payload["intent"], "ask-price");
    assert_eq!(payload["required"], serde_json::json!(["product", "price", "brand"]));
    assert_eq!(payload["missing"], serde_json::json!(["price"]));
    assert_eq!(payload["self_reported"], serde_json::json!(["brand"]));
    assert_eq!(payload["conflicts"], serde_json::json!(["brand"]));
}

#[test]
fn missing_for_unconfigured_intent_is_empty() {
    let output = run_nlu(&["missing", "--intent", "greet"], COMPLETION);
    assert!(output.status.success());

    let payload = parse_payload(&output);
    assert_eq!(payload["required"], serde_json::json!([]));
    assert_eq!(payload["missing"], serde_json::json!([]));
}

#[test]
fn parse_entity_with_report() {
    let output = run_nlu(&["parse-entity", "--report"], "(foo<||>bar##(entity<||>color<||>red");
    assert!(output.status.success());

    let payload = parse_payload(&output);
    assert_eq!(payload["output"]["entities"], serde_json::json!([]));
    assert_eq!(payload["report"]["records_seen"], 2);
    assert_eq!(payload["report"]["records_dropped"], 2);
    assert_eq!(payload["report"]["unknown_tags"], serde_json::json!(["(foo"]));
}

#[test]
fn missing_config_file_fails() {
    let output = run_nlu(&["--config", "/nonexistent/nlu.toml", "missing", "--intent", "x"], "");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load configuration"));
}
