use std::sync::Arc;

use futures::{stream, StreamExt, TryStreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;

use kotoba::{
    assistant, block, gen, gen_with, map, repeat, system, user, wait, Action, Agent,
    AgentConfig, BlockOptions, ChatMessage, EvalError, EvalResult, FnProvider, FragmentFilter,
    GenOptions, MockCompletionProvider, Params, PromptFragment, PromptView, ProviderError, Role,
    ScriptedProvider, Source, TranscriptError,
};

use super::chat_stub;

const QUESTIONS: [&str; 4] = [
    "Main elements with specific imagery details",
    "Next, describe the environment",
    "Now, provide the mood and atmosphere of the scene",
    "Finally, describe the photography style",
];

fn question_turns() -> Vec<Action> {
    QUESTIONS
        .iter()
        .map(|q| vec![user!("{}", *q), assistant!("{}", gen("answer"))].into())
        .collect()
}

#[tokio::test]
async fn test_map_scenario() -> EvalResult<()> {
    let template = vec![
        system!("Hello"),
        map(
            "qs",
            vec![
                vec![user!("Q1"), assistant!("{}", gen("a"))].into(),
                vec![user!("Q2"), assistant!("{}", gen("a"))].into(),
            ],
        ),
    ];
    let handle = Agent::new(template, chat_stub("X")).bind(Params::new());

    let outputs = handle.run().await?;

    assert_eq!(outputs.to_json(), json!({"qs": [{"a": "X"}, {"a": "X"}]}));
    let messages = handle
        .transcript()
        .to_chat_messages(&outputs)
        .expect("chat view");
    let roles: Vec<(Role, &str)> = messages
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        roles,
        vec![
            (Role::System, "Hello"),
            (Role::User, "Q1"),
            (Role::Assistant, "X"),
            (Role::User, "Q2"),
            (Role::Assistant, "X"),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_completion_simple_array() -> EvalResult<()> {
    let provider = Arc::new(ScriptedProvider::completion("davinci").with_default_reply("I hate coding autotests"));
    let template = vec![system!("Hello, world!"), question_turns().into()];

    let outputs = Agent::new(template, provider).bind(Params::new()).run().await?;

    assert_eq!(outputs.get_list("answer").map(<[_]>::len), Some(QUESTIONS.len()));
    Ok(())
}

#[tokio::test]
async fn test_chat_simple_map() -> EvalResult<()> {
    let template = vec![system!("Hello, world!"), map("items", question_turns())];

    let outputs = Agent::new(template, chat_stub("X")).bind(Params::new()).run().await?;

    let items = outputs.get_list("items").expect("items");
    assert_eq!(items.len(), QUESTIONS.len());
    assert_eq!(items[0].as_tree().and_then(|t| t.get_text("answer")), Some("X"));
    Ok(())
}

#[tokio::test]
async fn test_map_in_map() -> EvalResult<()> {
    let topics = ["dog", "cat", "bird", "fish", "horse"];
    let template = vec![
        system!("Hello, world!"),
        map(
            "topics",
            topics
                .iter()
                .map(|_| vec![assistant!("{}", gen("name")), map("items", question_turns())].into())
                .collect(),
        ),
    ];

    let outputs = Agent::new(template, chat_stub("X")).bind(Params::new()).run().await?;

    let json = outputs.to_json();
    assert_eq!(json["topics"].as_array().map(Vec::len), Some(topics.len()));
    assert_eq!(json["topics"][0]["name"], json!("X"));
    assert_eq!(json["topics"][0]["items"].as_array().map(Vec::len), Some(QUESTIONS.len()));
    assert_eq!(json["topics"][4]["items"][3]["answer"], json!("X"));
    Ok(())
}

#[tokio::test]
async fn test_block_without_and_with_array() -> EvalResult<()> {
    let single = vec![system!("Hello, world!"), block(vec![assistant!("{}", gen("answer"))], BlockOptions::default())];
    let outputs = Agent::new(single, chat_stub("X")).bind(Params::new()).run().await?;
    assert_eq!(outputs.get_text("answer"), Some("X"));

    let repeated: Vec<Action> = QUESTIONS.iter().map(|_| assistant!("{}", gen("answer"))).collect();
    let many = vec![system!("Hello, world!"), block(vec![Action::from(repeated)], BlockOptions::default())];
    let outputs = Agent::new(many, chat_stub("X")).bind(Params::new()).run().await?;
    assert_eq!(outputs.get_list("answer").map(<[_]>::len), Some(QUESTIONS.len()));
    Ok(())
}

#[tokio::test]
async fn test_hidden_block_is_excluded_from_prompt() -> EvalResult<()> {
    let provider = chat_stub("X");
    let template = vec![
        system!("Hello"),
        block(user!("secret"), BlockOptions::hidden()),
        user!("Question"),
        assistant!("{}", gen("a")),
    ];
    let handle = Agent::new(template, provider.clone()).bind(Params::new());

    let fragments: Vec<PromptFragment> = handle.stream(FragmentFilter::All).try_collect().await?;

    let secret = fragments.iter().find(|f| f.content == "secret").expect("raw stream keeps hidden fragments");
    assert!(secret.is_hidden(&handle.outputs()));
    assert_eq!(
        provider.requests()[0].prompt,
        PromptView::Chat(vec![
            ChatMessage {
                role: Role::System,
                content: "Hello".to_string()
            },
            ChatMessage {
                role: Role::User,
                content: "Question".to_string()
            },
        ])
    );
    Ok(())
}

#[tokio::test]
async fn test_conditional_block_hides_after_generation() -> EvalResult<()> {
    let template = vec![
        kotoba::block_when(user!("draft instructions"), |outputs| Ok(outputs.contains("a"))),
        assistant!("{}", gen("a")),
    ];
    let handle = Agent::new(template, chat_stub("X")).bind(Params::new());
    let outputs = handle.run().await?;

    let transcript = handle.transcript();
    assert_eq!(transcript.to_text(), "draft instructionsX");
    assert_eq!(transcript.to_visible_text(&outputs), "X");
    Ok(())
}

#[tokio::test]
async fn test_static_template_is_deterministic() -> EvalResult<()> {
    let agent = Agent::new(
        vec![system!("Hello"), map("items", question_turns())],
        chat_stub("X"),
    );

    let mut runs = Vec::new();
    for _ in 0..2 {
        let fragments: Vec<PromptFragment> = agent
            .bind(Params::new())
            .stream(FragmentFilter::All)
            .try_collect()
            .await?;
        runs.push(
            fragments
                .into_iter()
                .map(|f| (f.content, f.source, f.role))
                .collect::<Vec<_>>(),
        );
    }

    assert_eq!(runs[0], runs[1]);
    Ok(())
}

#[tokio::test]
async fn test_connector_failure_propagates() {
    let provider = Arc::new(ScriptedProvider::chat("empty").reply("never matches", "-"));
    let handle = Agent::new(vec![system!("Hello"), assistant!("{}", gen("a"))], provider).bind(Params::new());

    let mut fragments = handle.stream(FragmentFilter::All);
    assert_eq!(fragments.next().await.unwrap().unwrap().content, "Hello");
    assert!(matches!(
        fragments.next().await,
        Some(Err(EvalError::Provider(ProviderError::ApiError(_))))
    ));
}

#[tokio::test]
async fn test_mid_stream_failure_propagates() {
    let provider = Arc::new(FnProvider::new("flaky", true, |_| {
        stream::iter(vec![
            Ok((0, "partial".to_string())),
            Err(ProviderError::Stream("connection reset".to_string())),
        ])
        .boxed()
    }));
    let handle = Agent::new(vec![assistant!("{}", gen("a"))], provider).bind(Params::new());

    let result = handle.run().await;

    assert!(matches!(result, Err(EvalError::Provider(ProviderError::Stream(_)))));
    assert!(handle.outputs().is_empty());
}

#[tokio::test]
async fn test_none_role_fails_chat_prompt() {
    let handle = Agent::new(vec![kotoba::ai!("loose text"), assistant!("{}", gen("a"))], chat_stub("X"))
        .bind(Params::new());

    let result = handle.run().await;

    assert!(matches!(
        result,
        Err(EvalError::Transcript(TranscriptError::NoneRole { index: 0 }))
    ));
}

#[tokio::test]
async fn test_generation_outside_assistant_block_is_assistant_turn() -> EvalResult<()> {
    let provider = chat_stub("X");
    let template = vec![
        user!("Hi"),
        gen("a"),
        user!("again"),
        assistant!("{}", gen("b")),
    ];
    let handle = Agent::new(template, provider.clone()).bind(Params::new());

    let fragments: Vec<PromptFragment> = handle.stream(FragmentFilter::All).try_collect().await?;

    assert_eq!(fragments[1].role, Role::Assistant);
    assert_eq!(handle.outputs().to_json(), json!({"a": "X", "b": "X"}));
    assert_eq!(
        provider.requests()[1].prompt,
        PromptView::Chat(vec![
            ChatMessage {
                role: Role::User,
                content: "Hi".to_string()
            },
            ChatMessage {
                role: Role::Assistant,
                content: "X".to_string()
            },
            ChatMessage {
                role: Role::User,
                content: "again".to_string()
            },
        ])
    );
    Ok(())
}

#[tokio::test]
async fn test_multiple_samples_stream_only_first() -> EvalResult<()> {
    let provider = Arc::new(ScriptedProvider::chat("stub").with_default_reply("one two"));
    let template = vec![user!("Hi"), assistant!("{}", gen_with("a", GenOptions::default().n(3)))];
    let handle = Agent::new(template, provider)
        .with_config(AgentConfig::default().with_stream(true))
        .bind(Params::new());

    let generated: Vec<String> = handle
        .stream(FragmentFilter::Generated)
        .map_ok(|f| f.content)
        .try_collect()
        .await?;

    assert_eq!(generated, vec!["one", " two"]);
    assert_eq!(
        handle.outputs().to_json(),
        json!({"a": ["one two", "one two", "one two"]})
    );
    Ok(())
}

#[tokio::test]
async fn test_wait_saves_input_under_queue_name() -> EvalResult<()> {
    let template = vec![user!("{}", wait("question")), assistant!("{}", gen("a"))];
    let handle = Agent::new(template, chat_stub("X")).bind(Params::new());

    handle.input("question", "hi");
    let outputs = handle.run().await?;

    assert_eq!(outputs.to_json(), json!({"question": "hi", "a": "X"}));
    Ok(())
}

#[tokio::test]
async fn test_loop_closed_from_handle() -> EvalResult<()> {
    let template = vec![repeat(
        "inputs",
        vec![user!("{}", wait("question")), assistant!("{}", gen("answer"))],
    )];
    let handle = Agent::new(template, chat_stub("X")).bind(Params::new());

    handle.input("question", "q1");
    assert_eq!(handle.next_generated().await?, Some("X".to_string()));
    handle.close_loop("inputs");
    assert_eq!(handle.next_generated().await?, None);

    assert_eq!(
        handle.outputs().to_json(),
        json!({"inputs": [{"question": "q1", "answer": "X"}]})
    );
    Ok(())
}

#[tokio::test]
async fn test_mock_provider_tokens_concatenate() -> EvalResult<()> {
    let mut provider = MockCompletionProvider::new();
    provider.expect_name().return_const("mock".to_string());
    provider.expect_is_chat().return_const(false);
    provider.expect_complete().times(1).returning(|request| {
        assert_eq!(request.sampling.n, 1);
        Ok(stream::iter(vec![
            Ok((0, "Hel".to_string())),
            Ok((0, "lo".to_string())),
            Ok((7, "ignored".to_string())),
        ])
        .boxed())
    });

    let handle = Agent::new(vec![gen("greeting")], Arc::new(provider)).bind(Params::new());
    let fragments: Vec<PromptFragment> = handle.stream(FragmentFilter::All).try_collect().await?;

    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].source, Source::Generated);
    assert_eq!(handle.outputs().get_text("greeting"), Some("Hello"));
    Ok(())
}
