mod common;

use std::sync::Arc;

use common::shared_adventure;
use tame::{handle_init, handle_request, ModuleContext};

const SCRIPT: &[&str] = &["look", "take lamp", "go down", "look", "say hi", "go up", "put coin in chest"];

fn play(ctx: &mut ModuleContext) -> Vec<String> {
    let mut transcript = vec![handle_init(ctx).text()];
    for command in SCRIPT {
        transcript.push(handle_request(ctx, command).text());
    }
    transcript
}

#[tokio::test]
async fn contexts_on_one_module_are_independent() {
    let module = shared_adventure();
    let mut tasks = Vec::new();
    for _ in 0..4 {
        let module = Arc::clone(&module);
        tasks.push(tokio::task::spawn_blocking(move || {
            let mut ctx = ModuleContext::new(module);
            let transcript = play(&mut ctx);
            (transcript, ctx.save_state().expect("save"))
        }));
    }

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.expect("task completes"));
    }
    let (first_transcript, first_state) = &results[0];
    assert!(first_transcript[1].starts_with("A dusty hall."));
    for (transcript, state) in &results[1..] {
        assert_eq!(transcript, first_transcript);
        assert_eq!(state, first_state);
    }
    // every context dropped its handle; only ours remains
    assert_eq!(Arc::strong_count(&module), 1);
}

#[test]
fn one_context_does_not_see_anothers_moves() {
    let module = shared_adventure();
    let mut a = ModuleContext::new(Arc::clone(&module));
    let mut b = ModuleContext::new(Arc::clone(&module));
    handle_init(&mut a);
    handle_init(&mut b);

    assert_eq!(handle_request(&mut a, "take lamp").text(), "Taken.\n");
    let lamp = module.find("lamp").unwrap();
    let hall = module.find("hall").unwrap();
    assert!(b.ownership().element_has_object(hall, lamp));
    assert_eq!(handle_request(&mut b, "take lamp").text(), "Taken.\n");
}
