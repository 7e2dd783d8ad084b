//! Operations and built-ins exercised through entry blocks.

mod common;

use common::{add, module_with, on_action};
use tame::config::EngineConfig;
use tame::module::{ActionType, Builtin, ElementDef, Operation as Op, TriggerKey};
use tame::runtime::{CueKind, Response};
use tame::value::ArithmeticOp;
use tame::{handle_init, handle_request, ModuleContext};

fn lab(ops: Vec<Op>, config: EngineConfig) -> (ModuleContext, Response) {
    let world = ElementDef::world()
        .on(
            TriggerKey::Start,
            vec![
                Op::element("hero"),
                Op::SetPlayer,
                Op::element("r1"),
                Op::SetRoom,
                Op::element("r1"),
                Op::element("gem"),
                Op::GiveObject,
            ],
        )
        .on(on_action("a_run"), ops);
    let module = module_with(
        world,
        vec![
            ElementDef::player("hero"),
            ElementDef::room("r1"),
            ElementDef::room("r2"),
            ElementDef::object("o_base").archetype().function(
                "shine",
                &["times"],
                vec![
                    Op::Load("times".into()),
                    Op::push(2i64),
                    Op::Arithmetic(ArithmeticOp::Multiply),
                    Op::Return,
                ],
            ),
            ElementDef::object("gem")
                .parent("o_base")
                .names(&["gem"])
                .determiners(&["a"])
                .on(
                    on_action("a_poke"),
                    vec![Op::push("poked "), Op::PushThis, Op::Identity, add(), Op::TextLn],
                ),
            ElementDef::action("a_run", ActionType::General, &["run"]),
            ElementDef::action("a_poke", ActionType::Transitive, &["poke"]),
        ],
    );
    let mut ctx = ModuleContext::with_config(module, config);
    handle_init(&mut ctx);
    let response = handle_request(&mut ctx, "run");
    (ctx, response)
}

fn run(ops: Vec<Op>) -> Response {
    lab(ops, EngineConfig::default()).1
}

fn b(builtin: Builtin) -> Op {
    Op::Builtin(builtin)
}

fn lines(response: &Response) -> Vec<String> {
    assert!(!response.has_fatal(), "{:?}", response.cues());
    response.text().lines().map(str::to_string).collect()
}

#[test]
fn string_builtins() {
    let response = run(vec![
        Op::push("Hello World"),
        b(Builtin::StrUpper),
        Op::TextLn,
        Op::push("abcdef"),
        Op::push(1i64),
        Op::push(4i64),
        b(Builtin::StrSubstring),
        Op::TextLn,
        Op::push("a,b,,c"),
        Op::push(","),
        b(Builtin::StrSplit),
        b(Builtin::Length),
        Op::TextLn,
        Op::push("a,b"),
        Op::push(","),
        b(Builtin::StrSplit),
        Op::push("-"),
        b(Builtin::StrJoin),
        Op::TextLn,
        Op::push("banana"),
        Op::push("nan"),
        b(Builtin::StrIndexOf),
        Op::TextLn,
        Op::push("  x "),
        b(Builtin::StrTrim),
        Op::TextLn,
        Op::push("héllo"),
        Op::push(1i64),
        b(Builtin::StrChar),
        Op::TextLn,
        Op::push("x"),
        Op::push(2.5),
        add(),
        Op::TextLn,
    ]);
    assert_eq!(
        lines(&response),
        vec!["HELLO WORLD", "bcd", "4", "a-b", "2", "x", "é", "x2.5"]
    );
}

#[test]
fn regex_builtins_and_bad_patterns() {
    let response = run(vec![
        Op::push("[0-9]+"),
        Op::push("abc 123 def 45"),
        b(Builtin::RegexFindAll),
        Op::push(","),
        b(Builtin::StrJoin),
        Op::TextLn,
        Op::push("^a"),
        Op::push("abc"),
        b(Builtin::RegexMatches),
        Op::TextLn,
        Op::push("b+"),
        Op::push("abbbc"),
        b(Builtin::RegexFind),
        Op::TextLn,
        Op::push("o"),
        Op::push("foo"),
        Op::push("0"),
        b(Builtin::RegexReplace),
        Op::TextLn,
        Op::push("x("),
        Op::push("abc"),
        b(Builtin::RegexMatches),
        Op::TextLn,
    ]);
    assert_eq!(response.count(CueKind::Error), 1);
    assert_eq!(lines(&response), vec!["123,45", "true", "bbb", "f00", "false"]);
}

#[test]
fn list_builtins_share_and_copy() {
    let l = || Op::Load("l".into());
    let c = || Op::Load("c".into());
    let response = run(vec![
        Op::PushList,
        Op::Local("l".into()),
        l(),
        Op::push(1i64),
        b(Builtin::ListAdd),
        Op::Pop,
        l(),
        Op::push(2i64),
        b(Builtin::ListAdd),
        Op::Pop,
        l(),
        Op::push(0i64),
        Op::push(0i64),
        b(Builtin::ListAddAt),
        Op::Pop,
        l(),
        Op::TextLn,
        l(),
        Op::push(5i64),
        b(Builtin::ListGet),
        Op::TextLn,
        l(),
        Op::push(1i64),
        b(Builtin::ListRemoveAt),
        Op::TextLn,
        l(),
        b(Builtin::ListCopy),
        Op::Local("c".into()),
        c(),
        Op::push(9i64),
        b(Builtin::ListAdd),
        Op::Pop,
        l(),
        Op::TextLn,
        c(),
        Op::TextLn,
        l(),
        c(),
        b(Builtin::ListConcat),
        Op::TextLn,
        c(),
        Op::push(9i64),
        b(Builtin::ListIndexOf),
        Op::TextLn,
    ]);
    assert_eq!(
        lines(&response),
        vec!["[0, 1, 2]", "false", "1", "[0, 2]", "[0, 2, 9]", "[0, 2, 0, 2, 9]", "2"]
    );
}

#[test]
fn math_builtins() {
    let response = run(vec![
        Op::push(3i64),
        Op::push(7.5),
        b(Builtin::Min),
        Op::TextLn,
        Op::push(3i64),
        Op::push(7i64),
        b(Builtin::Max),
        Op::TextLn,
        Op::push(15i64),
        Op::push(0i64),
        Op::push(10i64),
        b(Builtin::Clamp),
        Op::TextLn,
        Op::push(2.5),
        b(Builtin::Floor),
        Op::TextLn,
        Op::push(2.5),
        b(Builtin::Round),
        Op::TextLn,
        Op::push(16i64),
        b(Builtin::Sqrt),
        Op::TextLn,
        Op::push(7i64),
        Op::push(2i64),
        Op::Arithmetic(ArithmeticOp::Divide),
        Op::TextLn,
    ]);
    assert_eq!(lines(&response), vec!["3.0", "7", "10", "2.0", "3.0", "4.0", "3"]);
}

#[test]
fn seeded_random_is_repeatable() {
    let ops = || {
        let mut ops = Vec::new();
        for _ in 0..5 {
            ops.extend([Op::push(100i64), b(Builtin::RandomInt), Op::TextLn]);
        }
        ops
    };
    let seeded = || EngineConfig {
        random_seed: Some(42),
        ..EngineConfig::default()
    };
    let first = lines(&lab(ops(), seeded()).1);
    let second = lines(&lab(ops(), seeded()).1);
    assert_eq!(first, second);
    for line in &first {
        let n: i64 = line.parse().unwrap();
        assert!((0..100).contains(&n));
    }
}

#[test]
fn ownership_and_overlay_operations() {
    let response = run(vec![
        Op::element("gem"),
        Op::OwnerOf,
        Op::TextLn,
        Op::element("hero"),
        Op::element("gem"),
        Op::GiveObject,
        Op::element("hero"),
        Op::ObjectCount,
        Op::TextLn,
        Op::element("r1"),
        Op::element("gem"),
        Op::HasObject,
        Op::TextLn,
        Op::element("hero"),
        Op::ObjectsOf,
        Op::TextLn,
        Op::element("gem"),
        Op::push("shiny"),
        Op::AddObjectTag,
        Op::element("gem"),
        Op::push("shiny"),
        Op::HasObjectTag,
        Op::TextLn,
        Op::element("gem"),
        Op::push("Jewel"),
        Op::AddObjectName,
        Op::element("gem"),
        Op::push("a jewel"),
        Op::HasObjectName,
        Op::TextLn,
        Op::element("gem"),
        Op::RemoveObject,
        Op::element("gem"),
        Op::ObjectHasNoOwner,
        Op::TextLn,
    ]);
    assert_eq!(
        lines(&response),
        vec!["r1", "1", "false", "[gem]", "true", "true", "true"]
    );
}

#[test]
fn room_stack_operations() {
    let response = run(vec![
        Op::element("r2"),
        Op::PushRoom,
        Op::PushCurrentRoom,
        Op::TextLn,
        Op::element("hero"),
        Op::element("r1"),
        Op::PlayerIsInRoom,
        Op::TextLn,
        Op::PopRoom,
        Op::PushCurrentRoom,
        Op::TextLn,
        Op::element("r2"),
        Op::SwapRoom,
        Op::element("r2"),
        Op::CurrentRoomIs,
        Op::TextLn,
        Op::PopRoom,
        Op::NoCurrentRoom,
        Op::TextLn,
        Op::PopRoom,
        Op::ClearPlayer,
        Op::NoCurrentPlayer,
        Op::TextLn,
        Op::element("r1"),
        Op::SetRoom,
    ]);
    assert_eq!(response.count(CueKind::Error), 2);
    assert_eq!(lines(&response), vec!["r2", "true", "r1", "true", "true", "true"]);
}

#[test]
fn queued_actions_run_after_the_command() {
    let response = run(vec![
        Op::element("a_poke"),
        Op::element("gem"),
        Op::QueueActionObject,
        Op::push("first"),
        Op::TextLn,
    ]);
    assert_eq!(lines(&response), vec!["first", "poked gem"]);
}

#[test]
fn element_queries_and_cross_element_variables() {
    let response = run(vec![
        Op::Header("title".into()),
        Op::TextLn,
        Op::element("gem"),
        Op::element("o_base"),
        Op::InstanceOf,
        Op::TextLn,
        Op::element("r1"),
        Op::element("o_base"),
        Op::InstanceOf,
        Op::TextLn,
        Op::element("hero"),
        Op::push(5i64),
        Op::StoreTo("hp".into()),
        Op::element("hero"),
        Op::LoadFrom("hp".into()),
        Op::TextLn,
        Op::push(4i64),
        Op::element("gem"),
        Op::CallOn("shine".into()),
        Op::TextLn,
    ]);
    assert_eq!(lines(&response), vec!["", "true", "false", "5", "8"]);
}

#[test]
fn cue_operations_and_trace() {
    let ops = vec![
        Op::push("*bold*"),
        Op::TextF,
        Op::push(250i64),
        Op::Wait,
        Op::push("try looking"),
        Op::Tip,
        Op::push("saved"),
        Op::Info,
        Op::push("oops"),
        Op::Error,
        Op::push("note"),
        Op::Trace,
    ];
    let quiet = run(ops.clone());
    let kinds: Vec<CueKind> = quiet.cues().iter().map(|c| c.kind()).collect();
    assert_eq!(
        kinds,
        vec![CueKind::TextF, CueKind::Wait, CueKind::Tip, CueKind::Info, CueKind::Error]
    );
    assert_eq!(quiet.cues()[1].content(), "250");

    let traced = lab(
        ops,
        EngineConfig {
            trace: true,
            ..EngineConfig::default()
        },
    )
    .1;
    assert!(traced
        .cues()
        .iter()
        .any(|c| c.kind() == CueKind::Trace && c.content() == "note"));
    assert!(traced.count(CueKind::Trace) > 1);
}
