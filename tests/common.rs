//! Test utilities & fixtures.
//! Provides a small adventure module that reaches every dispatch path.
#![allow(dead_code)] // each test binary uses a different subset

use std::sync::Arc;

use tame::config::EngineConfig;
use tame::module::{
    ActionType, Block, ElementDef, ElementId, Module, ModuleBuilder, Operation as Op, TriggerKey,
};
use tame::value::ArithmeticOp;
use tame::{handle_init, ModuleContext, Response};

pub fn add() -> Op {
    Op::Arithmetic(ArithmeticOp::Add)
}

pub fn say(text: &str) -> Vec<Op> {
    vec![Op::push(text), Op::TextLn]
}

pub fn on_action(action: &str) -> TriggerKey {
    TriggerKey::OnAction(action.to_string())
}

fn world() -> ElementDef {
    ElementDef::world()
        .on(TriggerKey::Init, vec![Op::push(0i64), Op::Store("turns".into())])
        .on(
            TriggerKey::Start,
            vec![
                Op::element("hero"),
                Op::SetPlayer,
                Op::element("hall"),
                Op::SetRoom,
                Op::element("hero"),
                Op::element("coin"),
                Op::GiveObject,
                Op::element("hall"),
                Op::element("lamp"),
                Op::GiveObject,
                Op::element("hall"),
                Op::element("chest"),
                Op::GiveObject,
                Op::push("Welcome to the cellar."),
                Op::TextLn,
            ],
        )
        .on(on_action("a_quit"), vec![Op::push("Goodbye."), Op::TextLn, Op::Quit])
        .on(
            on_action("a_say"),
            vec![Op::push("You say: "), Op::Load("text".into()), add(), Op::TextLn],
        )
        .on(
            on_action("a_spin"),
            vec![Op::While {
                condition: Block::new(vec![Op::push(true)]),
                body: Block::new(vec![Op::Noop]),
            }],
        )
        .on(
            on_action("a_count"),
            vec![Op::push(21i64), Op::Call("double".into()), Op::TextLn],
        )
        .on(
            on_action("a_wait"),
            vec![
                Op::push("one"),
                Op::TextLn,
                Op::Pause,
                Op::push("two"),
                Op::TextLn,
            ],
        )
        .on(TriggerKey::OnUnknownCommand, say("I don't know that word."))
        .on(
            TriggerKey::AfterSuccessfulCommand,
            vec![Op::push("ok"), Op::Store("last".into())],
        )
        .on(
            TriggerKey::AfterFailedCommand,
            vec![Op::push("failed"), Op::Store("last".into())],
        )
        .on(
            TriggerKey::AfterEveryCommand,
            vec![
                Op::Load("turns".into()),
                Op::push(1i64),
                add(),
                Op::Store("turns".into()),
            ],
        )
        .function(
            "double",
            &["x"],
            vec![
                Op::Load("x".into()),
                Op::push(2i64),
                Op::Arithmetic(ArithmeticOp::Multiply),
                Op::Return,
            ],
        )
}

/// The cellar: a hall and a cellar room, a lamp, a coin and a chest whose
/// contents live in the `chest_inside` container.
pub fn adventure() -> Module {
    ModuleBuilder::new()
        .header("title", "The Cellar")
        .header("author", "Test Suite")
        .element(world())
        .element(ElementDef::player("hero"))
        .element(
            ElementDef::room("hall")
                .on(
                    on_action("a_look"),
                    vec![Op::push("A dusty hall."), Op::TextLn, Op::PushThis, Op::Browse],
                )
                .on(
                    TriggerKey::OnModalAction {
                        action: "a_go".into(),
                        mode: "down".into(),
                    },
                    vec![Op::element("cellar"), Op::SetRoom, Op::push("You climb down."), Op::TextLn],
                ),
        )
        .element(
            ElementDef::room("cellar")
                .on(on_action("a_look"), say("It is dark."))
                .on(
                    TriggerKey::OnModalAction {
                        action: "a_go".into(),
                        mode: "up".into(),
                    },
                    vec![Op::element("hall"), Op::SetRoom, Op::push("You climb up."), Op::TextLn],
                ),
        )
        .element(
            ElementDef::object("o_item")
                .archetype()
                .on(
                    TriggerKey::OnRoomBrowse,
                    vec![Op::push("You see: "), Op::PushThis, Op::Identity, add(), Op::TextLn],
                )
                .on(
                    on_action("a_take"),
                    vec![
                        Op::PushCurrentPlayer,
                        Op::PushThis,
                        Op::GiveObject,
                        Op::push("Taken."),
                        Op::TextLn,
                    ],
                ),
        )
        .element(
            ElementDef::object("lamp")
                .parent("o_item")
                .names(&["lamp", "brass lamp"])
                .determiners(&["the"])
                .on(TriggerKey::OnActionWithOther("a_put".into()), say("That doesn't fit.")),
        )
        .element(
            ElementDef::object("coin")
                .parent("o_item")
                .names(&["coin"])
                .tags(&["shiny"])
                .on(
                    TriggerKey::OnActionWith {
                        action: "a_put".into(),
                        object: "chest".into(),
                    },
                    vec![
                        Op::element("chest_inside"),
                        Op::PushThis,
                        Op::GiveObject,
                        Op::push("The coin drops into the chest."),
                        Op::TextLn,
                    ],
                )
                .on(
                    TriggerKey::OnActionWithAncestor {
                        action: "a_put".into(),
                        object: "o_item".into(),
                    },
                    say("The coin clinks."),
                ),
        )
        .element(
            ElementDef::object("chest")
                .names(&["chest", "old chest"])
                .on(TriggerKey::OnRoomBrowse, say("An old chest sits in the corner.")),
        )
        .element(ElementDef::container("chest_inside"))
        .element(ElementDef::action("a_look", ActionType::General, &["look", "l"]))
        .element(ElementDef::action("a_take", ActionType::Transitive, &["take", "get"]))
        .element(ElementDef::action("a_put", ActionType::Ditransitive, &["put"]).conjunctions(&["in", "into"]))
        .element(ElementDef::action("a_go", ActionType::Modal, &["go"]).modes(&["down", "up"]))
        .element(ElementDef::action("a_say", ActionType::Open, &["say"]))
        .element(ElementDef::action("a_quit", ActionType::General, &["quit"]))
        .element(ElementDef::action("a_spin", ActionType::General, &["spin"]))
        .element(ElementDef::action("a_count", ActionType::General, &["count"]))
        .element(ElementDef::action("a_wait", ActionType::General, &["wait"]))
        .element(ElementDef::action("a_dance", ActionType::General, &["dance"]))
        .build()
        .expect("fixture module builds")
}

pub fn shared_adventure() -> Arc<Module> {
    Arc::new(adventure())
}

/// A fresh context that has already run init.
pub fn new_game() -> (ModuleContext, Response) {
    new_game_with(EngineConfig::default())
}

pub fn new_game_with(config: EngineConfig) -> (ModuleContext, Response) {
    let mut ctx = ModuleContext::with_config(shared_adventure(), config);
    let response = handle_init(&mut ctx);
    (ctx, response)
}

pub fn id(ctx: &ModuleContext, identity: &str) -> ElementId {
    ctx.find(identity)
        .unwrap_or_else(|| panic!("no element '{}'", identity))
}

/// Build a module from a world and extra elements, for one-off scripts.
pub fn module_with(world: ElementDef, extra: Vec<ElementDef>) -> Arc<Module> {
    let mut builder = ModuleBuilder::new().element(world);
    for element in extra {
        builder = builder.element(element);
    }
    Arc::new(builder.build().expect("module builds"))
}
