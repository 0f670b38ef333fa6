//! Tests for the CLI
//!
//! Miri is globally disabled for these tests because they mostly involve
//! calling the CLI binary, which Miri doesn't support.
#![cfg(all(test, not(miri)))]

use std::sync::Arc;

use assert_cmd::Command;
use assert_fs::{NamedTempFile, fixture::FileWriteStr};
use bigraph_cli::validate::VALID_PRINT;
use bigraph_core::{
    Bigraph, BigraphBuilder, BigraphView, InstantiationMap, Port, RewritingRule, Signature,
    SignatureBuilder,
};
use predicates::{prelude::*, str::contains};
use rstest::{fixture, rstest};

#[fixture]
fn cmd() -> Command {
    Command::cargo_bin("bigraph").unwrap()
}

#[fixture]
fn signature() -> Arc<Signature> {
    let mut sb = SignatureBuilder::new();
    sb.add_control("router", 2)
        .unwrap()
        .add_control("lan", 1)
        .unwrap()
        .add_passive_control("ip", 1)
        .unwrap();
    Arc::new(sb.make_signature(Some("net")))
}

/// A router linked to a lan holding an ip.
#[fixture]
fn agent(signature: Arc<Signature>) -> Bigraph {
    let mut b = BigraphBuilder::new(signature);
    let root = b.add_root();
    let router = b.add_node("router", root).unwrap();
    let edge = b.handle(Port::new(router, 0));
    let lan = b.add_node_with_handles("lan", root, &[edge]).unwrap();
    b.add_node("ip", lan).unwrap();
    b.make_bigraph()
}

fn lan(signature: &Arc<Signature>, wrapped: bool) -> Bigraph {
    let mut b = BigraphBuilder::new(signature.clone());
    let root = b.add_root();
    let x = b.add_outer_name("x").unwrap();
    let mut lan = b.add_node_with_handles("lan", root, &[x.into()]).unwrap();
    if wrapped {
        lan = b.add_node("lan", lan).unwrap();
    }
    b.add_site(lan).unwrap();
    b.make_bigraph()
}

fn write_json(name: &str, value: &impl serde::Serialize) -> NamedTempFile {
    let file = NamedTempFile::new(name).unwrap();
    file.write_str(&serde_json::to_string(value).unwrap())
        .unwrap();
    file
}

#[fixture]
fn agent_file(agent: Bigraph) -> NamedTempFile {
    write_json("agent.json", &agent)
}

#[rstest]
fn doesnt_exist(mut cmd: Command) {
    cmd.args(["validate", "foobar"]);
    cmd.assert()
        .failure()
        .stderr(contains("No such file or directory"));
}

#[rstest]
fn validate(agent_file: NamedTempFile, mut cmd: Command) {
    cmd.arg("validate").arg(agent_file.path());
    cmd.assert().success().stderr(contains(VALID_PRINT));
}

#[rstest]
fn validate_stdin(agent: Bigraph, mut cmd: Command) {
    cmd.args(["validate", "-"]);
    cmd.write_stdin(serde_json::to_string(&agent).unwrap());
    cmd.assert().success().stderr(contains(VALID_PRINT));
}

#[rstest]
fn validate_silent(agent: Bigraph, mut cmd: Command) {
    cmd.args(["validate", "-", "-q"]);
    cmd.write_stdin(serde_json::to_string(&agent).unwrap());
    cmd.assert()
        .success()
        .stderr(contains(VALID_PRINT).not());
}

#[rstest]
fn validate_broken(mut cmd: Command) {
    // The node's parent is not declared.
    let json = r#"{
        "version": "v1",
        "signature": {"id": "s", "controls": []},
        "roots": [],
        "nodes": [{"id": 1, "control": "a", "parent": {"Root": 0}, "ports": []}]
    }"#;
    cmd.args(["validate", "-"]);
    cmd.write_stdin(json);
    cmd.assert().failure().stderr(contains("Error parsing input"));
}

#[rstest]
fn describe(agent_file: NamedTempFile, mut cmd: Command) {
    cmd.arg("describe").arg(agent_file.path());
    cmd.assert()
        .success()
        .stdout(contains("Bigraph over signature net"))
        .stdout(contains("Outer face: <1, {}>"))
        .stdout(contains("Contains 3 nodes and 3 edges"))
        .stdout(contains("router: 1"));
}

#[rstest]
fn describe_json(agent_file: NamedTempFile, mut cmd: Command) {
    cmd.arg("describe").arg(agent_file.path()).arg("--json");
    let output = cmd.assert().success().get_output().stdout.clone();
    let desc: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(desc["nodes"], 3);
    assert_eq!(desc["controls"]["lan"], 1);
}

#[rstest]
fn count_matches(signature: Arc<Signature>, agent_file: NamedTempFile, mut cmd: Command) {
    let redex = write_json("redex.json", &lan(&signature, false));
    cmd.arg("match")
        .arg(agent_file.path())
        .arg("--redex")
        .arg(redex.path());
    cmd.assert().success().stdout(contains("1 match"));
}

#[rstest]
fn rewrite(signature: Arc<Signature>, agent: Bigraph, mut cmd: Command) {
    let agent_file = write_json("agent.json", &agent);
    let rule = RewritingRule::new(
        lan(&signature, false),
        lan(&signature, true),
        InstantiationMap::identity(1),
    )
    .unwrap();
    let rule_file = write_json("rule.json", &rule);
    cmd.arg("rewrite")
        .arg(agent_file.path())
        .arg("--rule")
        .arg(rule_file.path());
    let output = cmd.assert().success().get_output().stdout.clone();
    let successors: Vec<Bigraph> = serde_json::from_slice(&output).unwrap();
    assert_eq!(successors.len(), 1);
    assert_eq!(successors[0].num_nodes(), agent.num_nodes() + 1);
}
