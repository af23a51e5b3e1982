use std::{error::Error, fs};

use pipesynth::alu::{AluBody, AluTemplate, StateKind};

#[test]
fn parse_raw_stateful_alu() -> Result<(), Box<dyn Error>> {
    let text = fs::read_to_string("./example_alus/raw.stateful_alu")?;
    let template = AluTemplate::parse(&text, "raw.stateful_alu")?;

    assert_eq!(template.state_kind, StateKind::Stateful);
    assert_eq!(template.state_vars, vec!["state_0".to_string()]);
    assert!(matches!(template.body, AluBody::Update(_)));

    Ok(())
}

#[test]
fn parse_pred_raw_stateful_alu() -> Result<(), Box<dyn Error>> {
    let text = fs::read_to_string("./example_alus/pred_raw.stateful_alu")?;
    let template = AluTemplate::parse(&text, "pred_raw.stateful_alu")?;

    assert_eq!(template.state_kind, StateKind::Stateful);
    assert!(matches!(template.body, AluBody::Cascade { .. }));

    Ok(())
}

#[test]
fn parse_simple_stateless_alu() -> Result<(), Box<dyn Error>> {
    let text = fs::read_to_string("./example_alus/simple.stateless_alu")?;
    let template = AluTemplate::parse(&text, "simple.stateless_alu")?;

    assert_eq!(template.state_kind, StateKind::Stateless);
    assert!(template.state_vars.is_empty());
    assert_eq!(template.packet_fields.len(), 2);
    assert!(matches!(template.body, AluBody::Return(_)));

    Ok(())
}
