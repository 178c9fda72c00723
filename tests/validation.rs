// tests/validation.rs

use std::io::Write;

use planrun::errors::PlanrunError;
use planrun::plan::load_and_validate;
use tempfile::NamedTempFile;

fn plan_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_cycle_returns_structured_error() {
    let file = plan_file(
        r#"
[action.A]
command = "echo A"
after = ["B"]

[action.B]
command = "echo B"
after = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(PlanrunError::CyclicDependency(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains("A") || msg.contains("B"));
        }
        Err(e) => panic!("Expected CyclicDependency, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let file = plan_file(
        r#"
[action.loop]
command = "true"
after = ["loop"]
"#,
    );

    let result = load_and_validate(file.path());
    assert!(matches!(result, Err(PlanrunError::CyclicDependency(_))));
}

#[test]
fn test_unknown_dependency_names_both_actions() {
    let file = plan_file(
        r#"
[action.A]
command = "echo A"
after = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(PlanrunError::UnknownDependency { action, dependency }) => {
            assert_eq!(action, "A");
            assert_eq!(dependency, "NonExistent");
        }
        Err(e) => panic!("Expected UnknownDependency, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_mixed_action_kinds_are_rejected() {
    let file = plan_file(
        r#"
[action.confused]
command = "echo hi"
prompt = "Did it print?"
"#,
    );

    match load_and_validate(file.path()) {
        Err(PlanrunError::InvalidPlan(msg)) => {
            assert!(msg.contains("confused"));
            assert!(msg.contains("mixes keys"));
        }
        Err(e) => panic!("Expected InvalidPlan, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_undeclared_variable_is_rejected() {
    let file = plan_file(
        r#"
[action.deploy]
command = "deploy --to ${target}"
"#,
    );

    match load_and_validate(file.path()) {
        Err(PlanrunError::InvalidPlan(msg)) => assert!(msg.contains("target")),
        Err(e) => panic!("Expected InvalidPlan, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_empty_plan_is_rejected() {
    let file = plan_file("[settings]\ntitle = \"nothing to do\"\n");

    let result = load_and_validate(file.path());
    assert!(matches!(result, Err(PlanrunError::InvalidPlan(_))));
}

#[test]
fn test_bad_timeout_is_rejected() {
    let file = plan_file(
        r#"
[action.slow]
command = "sleep 1"
timeout = "soon"
"#,
    );

    match load_and_validate(file.path()) {
        Err(PlanrunError::InvalidPlan(msg)) => assert!(msg.contains("slow")),
        Err(e) => panic!("Expected InvalidPlan, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_malformed_toml_is_a_validation_error() {
    let file = plan_file("[action.A\ncommand = ");

    match load_and_validate(file.path()) {
        Err(e @ PlanrunError::Toml(_)) => assert!(e.is_validation()),
        Err(e) => panic!("Expected Toml error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_validation_errors_exit_with_code_three() {
    let file = plan_file(
        r#"
[action.A]
after = ["B"]

[action.B]
after = ["A"]
"#,
    );

    let err = load_and_validate(file.path()).unwrap_err();
    assert_eq!(planrun::error_exit_code(&err), 3);
    assert_eq!(
        planrun::error_exit_code(&PlanrunError::Io(std::io::Error::other("disk gone"))),
        1
    );
}
