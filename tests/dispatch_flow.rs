mod common;

use common::{id, new_game};
use tame::runtime::CueKind;
use tame::{handle_request, ModuleContext, Value};

fn world_var(ctx: &ModuleContext, name: &str) -> Value {
    ctx.variable(ctx.module().world(), name).unwrap()
}

#[test]
fn init_runs_start_and_places_the_player() {
    let (ctx, response) = new_game();
    assert_eq!(response.text(), "Welcome to the cellar.\n");
    assert!(!response.has_fatal());
    assert_eq!(ctx.ownership().current_player(), Some(id(&ctx, "hero")));
    assert_eq!(ctx.ownership().current_room(), Some(id(&ctx, "hall")));
    assert_eq!(world_var(&ctx, "turns"), Value::Integer(0));
    // after hooks only follow player commands
    assert_eq!(world_var(&ctx, "last"), Value::Boolean(false));
}

#[test]
fn general_action_uses_room_block_and_browses() {
    let (mut ctx, _) = new_game();
    let response = handle_request(&mut ctx, "look");
    assert_eq!(
        response.text(),
        "A dusty hall.\nYou see: lamp\nAn old chest sits in the corner.\n"
    );
    assert_eq!(world_var(&ctx, "last"), Value::string("ok"));
    assert_eq!(world_var(&ctx, "turns"), Value::Integer(1));
}

#[test]
fn transitive_action_moves_ownership() {
    let (mut ctx, _) = new_game();
    let (hero, hall, lamp) = (id(&ctx, "hero"), id(&ctx, "hall"), id(&ctx, "lamp"));

    let response = handle_request(&mut ctx, "get the brass lamp");
    assert_eq!(response.text(), "Taken.\n");
    assert_eq!(ctx.ownership().owner_of(lamp), Some(hero));
    assert!(!ctx.ownership().element_has_object(hall, lamp));
    assert_eq!(ctx.ownership().object_count(hero), 2);
}

#[test]
fn ditransitive_resolution_order() {
    let (mut ctx, _) = new_game();
    let (coin, inside) = (id(&ctx, "coin"), id(&ctx, "chest_inside"));

    // specific second object wins
    let first = handle_request(&mut ctx, "put coin into lamp");
    assert_eq!(first.text(), "The coin clinks.\n");
    let other = handle_request(&mut ctx, "put lamp in chest");
    assert_eq!(other.text(), "That doesn't fit.\n");

    let response = handle_request(&mut ctx, "put coin in chest");
    assert_eq!(response.text(), "The coin drops into the chest.\n");
    assert_eq!(ctx.ownership().owner_of(coin), Some(inside));
    assert_eq!(ctx.ownership().objects_owned_by(inside), vec![coin]);
}

#[test]
fn modal_action_changes_room() {
    let (mut ctx, _) = new_game();
    let response = handle_request(&mut ctx, "go down");
    assert_eq!(response.text(), "You climb down.\n");
    assert_eq!(ctx.ownership().current_room(), Some(id(&ctx, "cellar")));
    assert_eq!(handle_request(&mut ctx, "l").text(), "It is dark.\n");

    let bad = handle_request(&mut ctx, "go sideways");
    assert_eq!(bad.count(CueKind::Error), 1);
    assert_eq!(world_var(&ctx, "last"), Value::string("failed"));
}

#[test]
fn open_action_binds_text_local() {
    let (mut ctx, _) = new_game();
    let response = handle_request(&mut ctx, "say Hello   World");
    assert_eq!(response.text(), "You say: hello world\n");
}

#[test]
fn function_call_returns_value() {
    let (mut ctx, _) = new_game();
    assert_eq!(handle_request(&mut ctx, "count").text(), "42\n");
}

#[test]
fn unknown_and_unhandled_commands() {
    let (mut ctx, _) = new_game();

    let unknown = handle_request(&mut ctx, "xyzzy");
    assert_eq!(unknown.text(), "I don't know that word.\n");
    assert_eq!(world_var(&ctx, "last"), Value::string("failed"));

    let unhandled = handle_request(&mut ctx, "dance");
    assert_eq!(unhandled.count(CueKind::Error), 1);
    assert!(unhandled.cues()[0].content().contains("a_dance"));

    let incomplete = handle_request(&mut ctx, "take");
    assert_eq!(incomplete.count(CueKind::Error), 1);

    assert_eq!(handle_request(&mut ctx, "look").count(CueKind::Error), 0);
    assert_eq!(world_var(&ctx, "last"), Value::string("ok"));
    assert_eq!(world_var(&ctx, "turns"), Value::Integer(4));
}

#[test]
fn quit_skips_after_hooks() {
    let (mut ctx, _) = new_game();
    let response = handle_request(&mut ctx, "quit");
    assert_eq!(response.text(), "Goodbye.\n");
    assert!(response.has_quit());
    assert_eq!(response.cues().last().map(|c| c.kind()), Some(CueKind::Quit));
    assert_eq!(world_var(&ctx, "turns"), Value::Integer(0));
}
