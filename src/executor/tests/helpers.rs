//! Test helpers for executor tests
//!
//! Common utilities for parsing programs and building VMs

use crate::executor::{run_until_paused, Control, Val, VM};
use crate::parser::Program;
use crate::scope::Scope;

/// Parse source, validate, serialize/deserialize, and create a VM
///
/// This helper:
/// - Parses the program
/// - Validates it semantically (errors fail the test, warnings are fine)
/// - Serializes and deserializes it (to test round-trip compatibility)
/// - Wraps the body in a root block
pub fn parse_and_build_vm(source: &str) -> VM {
    let program = crate::parser::parse_program(source).expect("Parse failed");
    let errors = crate::parser::semantic_validator::validate_program(&program, source);
    let validation_errors: Vec<_> = errors.iter().filter(|e| e.is_error()).collect();
    assert!(
        validation_errors.is_empty(),
        "Validation failed: {:?}",
        validation_errors
    );
    let json = serde_json::to_string(&program).expect("Program serialization failed");
    let program: Program = serde_json::from_str(&json).expect("Program deserialization failed");
    VM::new(program.into_block())
}

/// Parse source WITHOUT validation, for testing runtime error behavior.
///
/// Use this for code the validator would refuse (e.g. `break` outside a
/// loop) to check the runtime still handles it.
pub fn parse_without_validation(source: &str) -> VM {
    let program = crate::parser::parse_program(source).expect("Parse failed");
    VM::new(program.into_block())
}

/// Run source in a fresh scope until it completes or pauses
pub fn run(source: &str) -> (VM, Scope) {
    let mut scope = Scope::new();
    let vm = run_in(source, &mut scope);
    (vm, scope)
}

/// Run source in the given scope until it completes or pauses
pub fn run_in(source: &str, scope: &mut Scope) -> VM {
    let mut vm = parse_and_build_vm(source);
    run_until_paused(&mut vm, scope);
    vm
}

/// Value of a completed `return`, panicking otherwise
pub fn returned(vm: &VM) -> &Val {
    match &vm.control {
        Control::Return(v) => v,
        other => panic!("Expected Control::Return, got {:?}", other),
    }
}

/// Error code of an uncaught throw, panicking otherwise
pub fn thrown_code(vm: &VM) -> &str {
    match &vm.control {
        Control::Throw(Val::Error(e)) => &e.code,
        other => panic!("Expected Control::Throw(Val::Error(_)), got {:?}", other),
    }
}

/// Shorthand for a number value
pub fn num(n: f64) -> Val {
    Val::Num(n)
}
