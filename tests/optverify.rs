use std::{error::Error, fs};

use pipesynth::compiler::{Compiler, CompilerOptions};

const PROGRAM: &str = "|StateAndPacket| program(|StateAndPacket| state_and_packet) {
    state_and_packet.state_group_0_state_0 = state_and_packet.state_group_0_state_0 + state_and_packet.pkt_0;
    state_and_packet.pkt_0 = state_and_packet.state_group_0_state_0;
    return state_and_packet;
}
";

const RAW_STATEFUL: &str = "type : stateful
state variables : {state_0}
packet fields : {pkt_0}
hole variables : {}
state_0 = state_0 + Mux2(pkt_0, C());
";

const SIMPLE_STATELESS: &str = "type : stateless
state variables : {}
packet fields : {pkt_0, pkt_1}
hole variables : {}
return arith_op(pkt_0, pkt_1);
";

// Runs alone in this binary: optverify writes its artifacts relative to
// the working directory, so the test moves into a scratch one.
#[test]
fn optverify_writes_sketch_and_side_channel() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    std::env::set_current_dir(dir.path())?;

    fs::write("simple.sk", PROGRAM)?;
    fs::write("raw.stateful_alu", RAW_STATEFUL)?;
    fs::write("simple.stateless_alu", SIMPLE_STATELESS)?;

    let compiler = Compiler::new(
        "simple.sk".as_ref(),
        "raw.stateful_alu".as_ref(),
        "simple.stateless_alu".as_ref(),
        2,
        2,
        "simple_raw_simple_2_2",
        CompilerOptions::default(),
    )?;

    compiler.optverify()?;

    let sketch = fs::read_to_string("simple_raw_simple_2_2_optverify.sk")?;
    assert!(sketch.contains("|StateAndPacket| pipeline(|StateAndPacket| state_and_packet, int "));
    assert!(!sketch.contains("harness"));

    let side_channel: serde_json::Value =
        serde_json::from_str(&fs::read_to_string("simple_raw_simple_2_2.json")?)?;
    assert!(side_channel["holes"]
        .as_object()
        .is_some_and(|holes| !holes.is_empty()));
    assert_eq!(side_channel["num_fields_in_prog"], 1);
    assert_eq!(side_channel["num_state_groups"], 1);
    assert_eq!(side_channel["num_state_slots"], 1);
    assert!(side_channel["constraints"]
        .as_array()
        .is_some_and(|constraints| !constraints.is_empty()));

    Ok(())
}
