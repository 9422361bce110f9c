//! Integration tests for the retrace VM.
//!
//! Organized by instruction group, then the driver's state machine, then
//! the reversal guarantees.

use proptest::prelude::*;
use retrace_common::{Builtin, Instruction, Label, NodeId, Program, Value, TERMINATE_LABEL};
use retrace_vm::{ConfigError, Machine, RuntimeError, Status};

// ============================================================
// Helper functions
// ============================================================

fn num(n: f64) -> Value {
    Value::Number(n)
}

fn push(n: f64) -> Instruction {
    Instruction::PushValue(num(n))
}

fn builtin(b: Builtin) -> Instruction {
    Instruction::CallBuiltin(b)
}

fn global(name: &str) -> Label {
    Label::global(name)
}

/// Build a machine from instructions plus `(label, index)` declarations.
fn machine(instructions: Vec<Instruction>, labels: &[(&str, usize)]) -> Machine {
    let mut program = Program::new(instructions);
    for (name, at) in labels {
        program.labels.push((global(name), *at));
    }
    Machine::from_program(program).unwrap()
}

/// Run to completion and return the top frame's operands.
fn run_operands(instructions: Vec<Instruction>) -> Vec<Value> {
    let mut m = machine(instructions, &[]);
    m.run().unwrap();
    m.stack().top().unwrap().operands.clone()
}

/// Run until the first error and return it.
fn run_err(instructions: Vec<Instruction>) -> RuntimeError {
    let mut m = machine(instructions, &[]);
    m.run().unwrap_err()
}

// ============================================================
// Operand stack
// ============================================================

#[test]
fn push_pop_dup() {
    let operands = run_operands(vec![
        Instruction::PushStackFrame,
        push(1.0),
        push(2.0),
        Instruction::PopValue,
        Instruction::DuplicateTop,
        Instruction::Terminate,
    ]);
    assert_eq!(operands, vec![num(1.0), num(1.0)]);
}

#[test]
fn push_without_frame_fails() {
    assert_eq!(
        run_err(vec![push(1.0), Instruction::Terminate]),
        RuntimeError::NoFrame { at: 0 }
    );
}

#[test]
fn pop_on_empty_operand_stack_fails() {
    assert_eq!(
        run_err(vec![Instruction::PushStackFrame, Instruction::PopValue]),
        RuntimeError::OperandUnderflow {
            at: 1,
            needed: 1,
            available: 0
        }
    );
}

#[test]
fn builtin_uses_stack_order() {
    let operands = run_operands(vec![
        Instruction::PushStackFrame,
        push(10.0),
        push(4.0),
        builtin(Builtin::Sub),
        Instruction::Terminate,
    ]);
    assert_eq!(operands, vec![num(6.0)]);
}

#[test]
fn builtin_underflow_leaves_operands_untouched() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            push(4.0),
            builtin(Builtin::Mul),
            Instruction::Terminate,
        ],
        &[],
    );
    let err = m.run().unwrap_err();
    assert_eq!(
        err,
        RuntimeError::OperandUnderflow {
            at: 2,
            needed: 2,
            available: 1
        }
    );
    assert_eq!(m.stack().top().unwrap().operands, vec![num(4.0)]);
    assert_eq!(m.current_instruction_pointer(), 2);
    assert_eq!(m.instruction_count(), 2);
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let err = run_err(vec![
        Instruction::PushStackFrame,
        push(1.0),
        push(0.0),
        builtin(Builtin::Div),
        Instruction::Terminate,
    ]);
    assert!(matches!(err, RuntimeError::Builtin { at: 3, .. }));
}

#[test]
fn operands_are_per_frame() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            push(1.0),
            Instruction::PushStackFrame,
            Instruction::PopValue,
        ],
        &[],
    );
    let err = m.run().unwrap_err();
    assert!(matches!(err, RuntimeError::OperandUnderflow { at: 3, .. }));
    assert_eq!(m.stack().get(0).unwrap().operands, vec![num(1.0)]);
}

// ============================================================
// Frames
// ============================================================

#[test]
fn push_and_pop_frames() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            Instruction::PushStackFrame,
            push(9.0),
            Instruction::PopStackFrame,
            Instruction::Terminate,
        ],
        &[],
    );
    m.run().unwrap();
    assert_eq!(m.stack().depth(), 1);
    assert!(m.stack().top().unwrap().operands.is_empty());
}

#[test]
fn pop_frame_on_empty_stack_fails() {
    assert_eq!(
        run_err(vec![Instruction::PopStackFrame]),
        RuntimeError::NoFrame { at: 0 }
    );
}

// ============================================================
// Jumps
// ============================================================

#[test]
fn goto_skips_instructions() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            Instruction::Goto(global("skip")),
            push(1.0),
            push(2.0),
            Instruction::Terminate,
        ],
        &[("skip", 3)],
    );
    m.run().unwrap();
    assert_eq!(m.stack().top().unwrap().operands, vec![num(2.0)]);
    assert_eq!(m.instruction_count(), 3);
}

#[test]
fn if_goto_pops_and_tests_truthiness() {
    for (condition, expected) in [
        (Value::Bool(true), vec![num(2.0)]),
        (Value::Number(0.0), vec![num(1.0), num(2.0)]),
        (Value::Text(String::new()), vec![num(1.0), num(2.0)]),
        (Value::from("yes"), vec![num(2.0)]),
    ] {
        let mut m = machine(
            vec![
                Instruction::PushStackFrame,
                Instruction::PushValue(condition),
                Instruction::IfGoto(global("taken")),
                push(1.0),
                push(2.0),
                Instruction::Terminate,
            ],
            &[("taken", 4)],
        );
        m.run().unwrap();
        assert_eq!(m.stack().top().unwrap().operands, expected);
    }
}

#[test]
fn backward_jump_loops() {
    // counter = 3; do { counter = counter - 1 } while counter
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            push(3.0),
            Instruction::SetVariable("counter".into()),
            Instruction::GetVariable("counter".into()),
            push(1.0),
            builtin(Builtin::Sub),
            Instruction::DuplicateTop,
            Instruction::SetVariable("counter".into()),
            Instruction::IfGoto(global("again")),
            Instruction::Terminate,
        ],
        &[("again", 3)],
    );
    m.run().unwrap();
    assert_eq!(m.lookup("counter"), num(0.0));
    assert!(m.stack().top().unwrap().operands.is_empty());
    // 3 setup steps, then 6 per iteration.
    assert_eq!(m.instruction_count(), 3 + 6 * 3);
}

#[test]
fn jump_past_end_halts() {
    let mut m = machine(
        vec![Instruction::PushStackFrame, Instruction::Goto(global("end"))],
        &[("end", 2)],
    );
    m.run().unwrap();
    assert_eq!(m.current_instruction_pointer(), 2);
    assert_eq!(m.status(), Status::Halted);
}

#[test]
fn label_markers_declare_at_their_own_index() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            Instruction::Goto(global("here")),
            push(1.0),
            Instruction::Label(global("here")),
            push(2.0),
            Instruction::Terminate,
        ],
        &[],
    );
    m.run().unwrap();
    assert_eq!(m.stack().top().unwrap().operands, vec![num(2.0)]);
    assert_eq!(m.labels().global("here"), Some(3));
}

// ============================================================
// Label resolution
// ============================================================

#[test]
fn unresolved_label_rejected_before_execution() {
    let program = Program::new(vec![
        Instruction::PushStackFrame,
        Instruction::Goto(Label::local(NodeId(7), "end")),
        Instruction::Terminate,
    ]);
    assert_eq!(
        Machine::from_program(program).unwrap_err(),
        ConfigError::UnresolvedLabel {
            label: Label::local(NodeId(7), "end"),
            at: 1
        }
    );
}

#[test]
fn unresolved_call_target_rejected() {
    let program = Program::new(vec![
        Instruction::PushStackFrame,
        Instruction::MethodCall {
            target: global("missing"),
            arity: 0,
        },
    ]);
    assert!(matches!(
        Machine::from_program(program),
        Err(ConfigError::UnresolvedLabel { at: 1, .. })
    ));
}

// ============================================================
// Variables
// ============================================================

#[test]
fn set_creates_in_top_frame_and_get_reads_back() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            push(5.0),
            Instruction::SetVariable("x".into()),
            Instruction::GetVariable("x".into()),
            Instruction::GetVariable("y".into()),
            Instruction::Terminate,
        ],
        &[],
    );
    m.run().unwrap();
    let top = m.stack().top().unwrap();
    assert_eq!(top.operands, vec![num(5.0), Value::Undefined]);
    assert_eq!(top.env.get("x"), Some(&num(5.0)));
}

#[test]
fn lookup_falls_back_through_frames() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            push(1.0),
            Instruction::SetVariable("x".into()),
            Instruction::PushStackFrame,
            push(2.0),
            Instruction::SetVariable("x".into()),
            push(3.0),
            Instruction::SetVariable("y".into()),
            Instruction::GetVariable("x".into()),
            Instruction::Terminate,
        ],
        &[],
    );
    m.run().unwrap();
    let outer = m.stack().get(0).unwrap();
    let inner = m.stack().get(1).unwrap();
    // The outer binding is found and updated rather than shadowed.
    assert_eq!(outer.env.get("x"), Some(&num(2.0)));
    assert!(!inner.env.contains("x"));
    assert_eq!(inner.env.get("y"), Some(&num(3.0)));
    assert_eq!(inner.operands, vec![num(2.0)]);
}

#[test]
fn globals_are_read_and_updated_when_no_frame_binds() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            Instruction::GetVariable("limit".into()),
            push(1.0),
            builtin(Builtin::Add),
            Instruction::SetVariable("limit".into()),
            Instruction::Terminate,
        ],
        &[],
    );
    m.define_global("limit", num(10.0)).unwrap();
    m.run().unwrap();
    assert_eq!(m.globals().get("limit"), Some(&num(11.0)));
    assert!(m.stack().top().unwrap().env.is_empty());
}

#[test]
fn globals_cannot_be_seeded_once_stepping_started() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            push(2.0),
            Instruction::SetVariable("g".into()),
            Instruction::Terminate,
        ],
        &[],
    );
    m.define_global("g", num(1.0)).unwrap();
    m.run().unwrap();

    assert_eq!(
        m.define_global("g", num(9.0)),
        Err(RuntimeError::HistoryNotEmpty {
            key: "g".into(),
            steps: 3
        })
    );
    assert_eq!(m.globals().get("g"), Some(&num(2.0)));

    // The recorded edit still matches, so the run reverses cleanly.
    assert_eq!(m.rewind(), Ok(3));
    assert_eq!(m.globals().get("g"), Some(&num(1.0)));

    // Back at the start, seeding is allowed again.
    m.define_global("g", num(9.0)).unwrap();
    m.run().unwrap();
    m.step_backward().unwrap();
    assert_eq!(m.globals().get("g"), Some(&num(9.0)));
}

#[test]
fn assigning_undefined_removes_the_binding() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            push(1.0),
            Instruction::SetVariable("x".into()),
            Instruction::PushValue(Value::Undefined),
            Instruction::SetVariable("x".into()),
            Instruction::Terminate,
        ],
        &[],
    );
    m.run().unwrap();
    assert!(!m.stack().top().unwrap().env.contains("x"));
}

// ============================================================
// Calls and returns
// ============================================================

/// main: push 6, push 7, call mul2, halt
/// mul2: bind a b; get a; get b; mul; ret.value
fn call_program() -> Machine {
    machine(
        vec![
            Instruction::PushStackFrame,
            push(6.0),
            push(7.0),
            Instruction::MethodCall {
                target: global("mul2"),
                arity: 2,
            },
            Instruction::Terminate,
            Instruction::BindArgs(vec!["a".into(), "b".into()]),
            Instruction::GetVariable("a".into()),
            Instruction::GetVariable("b".into()),
            builtin(Builtin::Mul),
            Instruction::Return { has_value: true },
        ],
        &[("mul2", 5), (TERMINATE_LABEL, 4)],
    )
}

#[test]
fn call_moves_arguments_into_new_frame() {
    let mut m = call_program();
    for _ in 0..4 {
        m.step_forward().unwrap();
    }
    assert_eq!(m.current_instruction_pointer(), 5);
    assert_eq!(m.stack().depth(), 2);
    let caller = m.stack().get(0).unwrap();
    let callee = m.stack().get(1).unwrap();
    assert!(caller.operands.is_empty());
    assert_eq!(caller.return_address, Some(3));
    assert_eq!(callee.args, vec![num(6.0), num(7.0)]);
    assert_eq!(callee.return_address, None);

    m.step_forward().unwrap();
    let callee = m.stack().top().unwrap();
    assert_eq!(callee.env.get("a"), Some(&num(6.0)));
    assert_eq!(callee.env.get("b"), Some(&num(7.0)));
}

#[test]
fn return_resumes_after_call_site_with_value() {
    let mut m = call_program();
    m.run().unwrap();
    assert_eq!(m.stack().depth(), 1);
    assert_eq!(m.stack().top().unwrap().operands, vec![num(42.0)]);
    assert_eq!(m.current_instruction_pointer(), 4);
    assert_eq!(m.status(), Status::Halted);
}

#[test]
fn top_level_return_jumps_to_terminate() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            Instruction::Return { has_value: false },
            push(1.0),
            Instruction::Terminate,
        ],
        &[(TERMINATE_LABEL, 3)],
    );
    m.run().unwrap();
    assert!(m.stack().is_empty());
    assert_eq!(m.current_instruction_pointer(), 3);
}

#[test]
fn top_level_return_without_terminate_label_fails() {
    assert_eq!(
        run_err(vec![
            Instruction::PushStackFrame,
            Instruction::Return { has_value: false },
        ]),
        RuntimeError::NoTerminateLabel { at: 1 }
    );
}

#[test]
fn return_without_any_frame_underflows() {
    let mut m = machine(vec![Instruction::Return { has_value: false }], &[]);
    assert_eq!(m.step_forward().unwrap_err(), RuntimeError::NoFrame { at: 0 });
    assert_eq!(m.current_instruction_pointer(), 0);
    assert!(!m.can_reverse());
}

#[test]
fn return_value_from_empty_operand_stack_fails() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            Instruction::MethodCall {
                target: global("f"),
                arity: 0,
            },
            Instruction::Terminate,
            Instruction::Return { has_value: true },
        ],
        &[("f", 3)],
    );
    assert!(matches!(
        m.run(),
        Err(RuntimeError::OperandUnderflow { at: 3, .. })
    ));
    assert_eq!(m.stack().depth(), 2);
}

#[test]
fn return_into_frame_without_call_site_fails() {
    assert_eq!(
        run_err(vec![
            Instruction::PushStackFrame,
            Instruction::PushStackFrame,
            Instruction::Return { has_value: false },
        ]),
        RuntimeError::MissingReturnAddress { at: 2 }
    );
}

#[test]
fn bind_args_with_missing_arguments_binds_nothing() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            push(1.0),
            Instruction::MethodCall {
                target: global("f"),
                arity: 1,
            },
            Instruction::Terminate,
            Instruction::BindArgs(vec!["a".into(), "b".into()]),
            Instruction::Terminate,
        ],
        &[("f", 4)],
    );
    m.run().unwrap();
    let callee = m.stack().top().unwrap();
    assert_eq!(callee.env.get("a"), Some(&num(1.0)));
    assert!(!callee.env.contains("b"));
}

// ============================================================
// Console
// ============================================================

#[test]
fn console_write_and_read() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            Instruction::PushValue(Value::from("name? ")),
            Instruction::ConsoleWrite { newline: false },
            Instruction::ConsoleRead,
            Instruction::ConsoleWrite { newline: true },
            push(3.0),
            Instruction::ConsoleWrite { newline: true },
            Instruction::Terminate,
        ],
        &[],
    );
    m.push_input("ada");
    m.run().unwrap();
    assert_eq!(m.console_text(), "name? ada\n3\n");
    assert_eq!(m.console().next_input(), None);
}

#[test]
fn console_read_without_input_fails() {
    assert_eq!(
        run_err(vec![Instruction::PushStackFrame, Instruction::ConsoleRead]),
        RuntimeError::InputExhausted { at: 1 }
    );
}

#[test]
fn stepping_back_over_read_returns_the_line() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            Instruction::ConsoleRead,
            Instruction::ConsoleWrite { newline: false },
            Instruction::Terminate,
        ],
        &[],
    );
    m.push_input("x");
    m.push_input("y");
    m.run().unwrap();
    assert_eq!(m.console_text(), "x");
    m.step_backward().unwrap();
    m.step_backward().unwrap();
    assert_eq!(m.console_text(), "");
    assert_eq!(m.console().pending_input().collect::<Vec<_>>(), vec!["x", "y"]);
    m.run().unwrap();
    assert_eq!(m.console_text(), "x");
}

// ============================================================
// Driver state machine
// ============================================================

#[test]
fn status_transitions() {
    let mut m = machine(
        vec![Instruction::PushStackFrame, push(1.0), Instruction::Terminate],
        &[],
    );
    assert_eq!(m.status(), Status::Ready);
    assert!(m.can_continue());
    assert!(!m.can_reverse());

    m.step_forward().unwrap();
    assert_eq!(m.status(), Status::Running);
    m.step_forward().unwrap();
    assert_eq!(m.status(), Status::Halted);
    assert!(!m.can_continue());

    assert_eq!(m.step_forward().unwrap_err(), RuntimeError::Halted { at: 2 });

    m.rewind().unwrap();
    assert_eq!(m.status(), Status::Ready);
}

#[test]
fn empty_program_is_halted() {
    let mut m = machine(vec![], &[]);
    assert_eq!(m.status(), Status::Halted);
    assert_eq!(m.run(), Ok(0));
}

#[test]
fn step_backward_with_empty_history_fails() {
    let mut m = machine(vec![Instruction::Terminate], &[]);
    assert_eq!(m.step_backward().unwrap_err(), RuntimeError::NothingToReverse);
}

#[test]
fn step_counter_tracks_both_directions() {
    let mut m = call_program();
    assert_eq!(m.run(), Ok(9));
    assert_eq!(m.instruction_count(), 9);
    m.step_backward().unwrap();
    m.step_backward().unwrap();
    assert_eq!(m.instruction_count(), 7);
    assert_eq!(m.history().len(), 7);
}

#[test]
fn listing_annotates_labels() {
    let m = call_program();
    let annotated: Vec<(usize, Vec<String>)> = m
        .listing()
        .filter(|(_, _, labels)| !labels.is_empty())
        .map(|(i, _, labels)| (i, labels.iter().map(|l| l.to_string()).collect()))
        .collect();
    assert_eq!(
        annotated,
        vec![
            (4, vec![TERMINATE_LABEL.to_string()]),
            (5, vec!["mul2".to_string()]),
        ]
    );
}

// ============================================================
// Reversal
// ============================================================

#[test]
fn call_and_return_reverse_exactly() {
    let mut m = call_program();
    let mut states = vec![m.state().clone()];
    while m.can_continue() {
        m.step_forward().unwrap();
        states.push(m.state().clone());
    }
    while m.can_reverse() {
        states.pop();
        m.step_backward().unwrap();
        assert_eq!(m.state(), states.last().unwrap());
    }
    assert_eq!(m.status(), Status::Ready);
}

#[test]
fn failed_step_can_still_be_reversed_past() {
    let mut m = machine(
        vec![
            Instruction::PushStackFrame,
            push(1.0),
            push(0.0),
            builtin(Builtin::Div),
        ],
        &[],
    );
    assert!(m.run().is_err());
    assert_eq!(m.rewind(), Ok(3));
    assert_eq!(m.state(), &retrace_vm::State::default());
}

// ============================================================
// Property tests
// ============================================================

const KEYS: [&str; 2] = ["a", "b"];
const TARGETS: [&str; 3] = ["l0", "l1", "l2"];

fn arb_instruction() -> impl Strategy<Value = Instruction> {
    let key = prop::sample::select(&KEYS[..]).prop_map(String::from);
    let target = prop::sample::select(&TARGETS[..]).prop_map(global);
    prop_oneof![
        4 => (-5i32..5).prop_map(|n| push(n as f64)),
        1 => Just(Instruction::PushValue(Value::from("s"))),
        2 => Just(Instruction::PopValue),
        2 => Just(Instruction::DuplicateTop),
        1 => Just(Instruction::PushStackFrame),
        1 => Just(Instruction::PopStackFrame),
        3 => prop::sample::select(
            &[
                Builtin::Add,
                Builtin::Sub,
                Builtin::Mul,
                Builtin::Not,
                Builtin::Lt,
            ][..]
        )
        .prop_map(Instruction::CallBuiltin),
        2 => key.clone().prop_map(Instruction::SetVariable),
        2 => key.prop_map(Instruction::GetVariable),
        1 => Just(Instruction::BindArgs(vec!["a".into(), "b".into()])),
        1 => target.clone().prop_map(Instruction::Goto),
        2 => target.clone().prop_map(Instruction::IfGoto),
        1 => (target, 0usize..3)
            .prop_map(|(target, arity)| Instruction::MethodCall { target, arity }),
        1 => any::<bool>().prop_map(|has_value| Instruction::Return { has_value }),
        1 => any::<bool>().prop_map(|newline| Instruction::ConsoleWrite { newline }),
        1 => Just(Instruction::ConsoleRead),
    ]
}

/// A random program: a frame push, a random body with three labels spread
/// over it, and a terminate sentinel.
fn arb_machine() -> impl Strategy<Value = Machine> {
    prop::collection::vec(arb_instruction(), 1..40).prop_flat_map(|body| {
        let len = body.len();
        (Just(body), prop::collection::vec(0..=len, 3))
    })
    .prop_map(|(body, positions)| {
        let mut instructions = vec![Instruction::PushStackFrame];
        instructions.extend(body);
        let terminate = instructions.len();
        instructions.push(Instruction::Terminate);
        let mut program = Program::new(instructions);
        for (name, at) in TARGETS.iter().zip(positions) {
            program.labels.push((global(name), at + 1));
        }
        program.labels.push((global(TERMINATE_LABEL), terminate));
        let mut m = Machine::from_program(program).unwrap();
        m.push_input("in1");
        m.push_input("in2");
        m
    })
}

/// Step forward at most `budget` times, stopping at halt or the first error.
fn drive(m: &mut Machine, budget: usize) -> Vec<retrace_vm::State> {
    let mut states = vec![m.state().clone()];
    for _ in 0..budget {
        if !m.can_continue() || m.step_forward().is_err() {
            break;
        }
        states.push(m.state().clone());
    }
    states
}

proptest! {
    /// N forward steps followed by N backward steps restore every
    /// intermediate state exactly.
    #[test]
    fn forward_then_backward_restores_every_state(mut m in arb_machine(), budget in 0usize..200) {
        let states = drive(&mut m, budget);
        prop_assert_eq!(m.instruction_count(), states.len() - 1);
        for expected in states.iter().rev().skip(1) {
            m.step_backward().unwrap();
            prop_assert_eq!(m.state(), expected);
        }
        prop_assert!(!m.can_reverse());
        prop_assert_eq!(m.instruction_count(), 0);
    }

    /// Replaying after a full rewind reproduces the same execution.
    #[test]
    fn execution_is_deterministic(mut m in arb_machine(), budget in 0usize..200) {
        let mut replica = m.clone();
        let first = drive(&mut m, budget);
        let second = drive(&mut replica, budget);
        prop_assert_eq!(&first, &second);

        m.rewind().unwrap();
        let third = drive(&mut m, budget);
        prop_assert_eq!(&first, &third);
    }
}
