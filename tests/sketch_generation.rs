use std::{error::Error, fs};

use pipesynth::{
    alu::AluTemplate,
    codegen::CodegenOptions,
    program::ProgramInfo,
    sketch::{Mode, Refinements, SketchGenerator},
};

fn generator_from_files(
    stages: usize,
    alus_per_stage: usize,
) -> Result<(SketchGenerator, String), Box<dyn Error>> {
    let program = fs::read_to_string("./example_specs/simple.sk")?;
    let stateful = AluTemplate::parse(
        &fs::read_to_string("./example_alus/raw.stateful_alu")?,
        "raw.stateful_alu",
    )?;
    let stateless = AluTemplate::parse(
        &fs::read_to_string("./example_alus/simple.stateless_alu")?,
        "simple.stateless_alu",
    )?;
    let info = ProgramInfo::scan(&program)?;

    let generator = SketchGenerator::new(
        &format!("simple_raw_simple_{stages}_{alus_per_stage}"),
        stages,
        alus_per_stage,
        stateful,
        stateless,
        "raw",
        "simple",
        info,
        vec![0],
        CodegenOptions::default(),
    );

    Ok((generator, program))
}

#[test]
fn codegen_sketch_contains_grid_and_harness() -> Result<(), Box<dyn Error>> {
    let (generator, program) = generator_from_files(2, 2)?;

    let sketch = generator.generate(&program, &Mode::Codegen, &Refinements::default())?;

    // One stateless instance per (stage, column), one stateful per
    // (stage, group).
    for stage in 0..2 {
        for column in 0..2 {
            assert!(sketch.text.contains(&format!("int simple_{stage}_{column}(")));
        }
        assert!(sketch.text.contains(&format!("|StateGroup| raw_{stage}_0(")));
    }

    assert!(sketch.text.contains("harness void main("));
    assert!(sketch.text.contains("|StateAndPacket| pipeline("));
    assert!(sketch.text.contains("|StateAndPacket| program("));

    Ok(())
}

#[test]
fn every_hole_is_consumed_by_the_sketch() -> Result<(), Box<dyn Error>> {
    let (generator, program) = generator_from_files(2, 2)?;

    let sketch = generator.generate(&program, &Mode::Codegen, &Refinements::default())?;

    // A declared hole nothing reads would leave the configuration
    // under-constrained.
    for name in sketch.holes.keys() {
        let uses = sketch.text.matches(name.as_str()).count();
        assert!(uses >= 2, "hole {name} is declared but never used");
    }

    Ok(())
}

#[test]
fn total_hole_bits_matches_the_declared_widths() -> Result<(), Box<dyn Error>> {
    let (generator, program) = generator_from_files(2, 2)?;

    let sketch = generator.generate(&program, &Mode::Codegen, &Refinements::default())?;

    assert_eq!(
        sketch.total_hole_bits,
        sketch.holes.values().sum::<u32>()
    );
    assert!(sketch.total_hole_bits > 0);

    Ok(())
}
