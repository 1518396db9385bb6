use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::future::IntoFuture;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use kotoba::{
    assistant, gen, param, repeat, system, user, wait, Action, Agent, AgentHandle,
    EvalResult, OutputValue, Params,
};

use super::counting_provider;

fn debater(prefix: &'static str, role: &str) -> AgentHandle {
    let template = vec![
        system!("You are a helpful assistant. Always answer as {}.", param("role")),
        repeat(
            "inputs",
            Action::from(vec![
                user!("{}", wait("question")),
                assistant!("{}", gen("answer")),
            ]),
        ),
    ];
    let mut params = Params::new();
    params.insert("role".to_string(), json!(role));
    Agent::new(template, counting_provider(prefix)).bind(params)
}

fn turns(handle: &AgentHandle, count: usize) -> Vec<(String, String)> {
    handle
        .outputs()
        .get_list("inputs")
        .unwrap_or_default()
        .iter()
        .take(count)
        .filter_map(OutputValue::as_tree)
        .map(|turn| {
            (
                turn.get_text("question").unwrap_or_default().to_string(),
                turn.get_text("answer").unwrap_or_default().to_string(),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_pull_driven_dialog() -> EvalResult<()> {
    let democrat = debater("d", "democrat");
    let republican = debater("r", "republican");

    let mut question = "What is your opinion?".to_string();
    for _ in 0..3 {
        republican.input("question", question.clone());
        let answer = republican.next_generated().await?.expect("republican answer");
        democrat.input("question", answer);
        question = democrat.next_generated().await?.expect("democrat answer");
    }

    assert_eq!(
        turns(&republican, 3),
        vec![
            ("What is your opinion?".to_string(), "r-1".to_string()),
            ("d-1".to_string(), "r-2".to_string()),
            ("d-2".to_string(), "r-3".to_string()),
        ]
    );
    assert_eq!(
        turns(&democrat, 3),
        vec![
            ("r-1".to_string(), "d-1".to_string()),
            ("r-2".to_string(), "d-2".to_string()),
            ("r-3".to_string(), "d-3".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_event_bridged_dialog() {
    let a = debater("a", "optimist");
    let b = debater("b", "pessimist");

    let to_b = b.input_sender();
    a.on("answer", move |event| to_b.send("question", event.value.to_text()));

    let to_a = a.input_sender();
    let answered = Arc::new(AtomicUsize::new(0));
    let b_answers = Arc::clone(&answered);
    b.on("answer", move |event| {
        if b_answers.fetch_add(1, Ordering::SeqCst) + 1 < 3 {
            to_a.send("question", event.value.to_text());
        }
    });

    let mut b_events = b.subscribe();
    let a_task = tokio::spawn(a.clone().into_future());
    let b_task = tokio::spawn(b.clone().into_future());

    a.input("question", "start");
    tokio::time::timeout(Duration::from_secs(5), async {
        for _ in 0..3 {
            b_events.recv_named("answer").await.expect("b answer");
        }
    })
    .await
    .expect("three round trips");

    a.close_loop("inputs");
    b.close_loop("inputs");
    a_task.abort();
    b_task.abort();

    assert_eq!(answered.load(Ordering::SeqCst), 3);
    assert_eq!(
        turns(&a, 3),
        vec![
            ("start".to_string(), "a-1".to_string()),
            ("b-1".to_string(), "a-2".to_string()),
            ("b-2".to_string(), "a-3".to_string()),
        ]
    );
    assert_eq!(
        turns(&b, 3),
        vec![
            ("a-1".to_string(), "b-1".to_string()),
            ("a-2".to_string(), "b-2".to_string()),
            ("a-3".to_string(), "b-3".to_string()),
        ]
    );
}
