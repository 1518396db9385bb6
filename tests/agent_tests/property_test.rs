use proptest::prelude::*;

use kotoba::{OutputTree, PromptFragment, Role, Transcript};

fn role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::System), Just(Role::User), Just(Role::Assistant)]
}

fn fragments() -> impl Strategy<Value = Vec<(Role, String)>> {
    prop::collection::vec((role(), "[a-zA-Z0-9 \n]{1,12}"), 0..24)
}

fn transcript(fragments: &[(Role, String)]) -> Transcript {
    let mut transcript = Transcript::new();
    for (role, content) in fragments {
        transcript.push(PromptFragment::literal(content.clone(), *role));
    }
    transcript
}

proptest! {
    #[test]
    fn test_adjacent_groups_differ_in_role(input in fragments()) {
        let transcript = transcript(&input);
        let groups = transcript.groups();

        prop_assert!(groups.iter().all(|group| !group.is_empty()));
        prop_assert!(groups.iter().all(|group| group.iter().all(|f| f.role == group[0].role)));
        prop_assert!(groups.windows(2).all(|pair| pair[0][0].role != pair[1][0].role));
        prop_assert_eq!(transcript.len(), input.len());
    }

    #[test]
    fn test_flat_view_splits_back_into_fragments(input in fragments()) {
        let transcript = transcript(&input);
        let text = transcript.to_text();

        let mut rest = text.as_str();
        for fragment in transcript.fragments() {
            let (head, tail) = rest.split_at(fragment.content.len());
            prop_assert_eq!(head, fragment.content.as_str());
            rest = tail;
        }
        prop_assert!(rest.is_empty());
    }

    #[test]
    fn test_chat_view_has_one_message_per_group(input in fragments()) {
        let transcript = transcript(&input);
        let messages = transcript.to_chat_messages(&OutputTree::new()).unwrap();

        prop_assert_eq!(messages.len(), transcript.groups().len());
        let joined: String = messages.iter().map(|m| m.content.as_str()).collect();
        prop_assert_eq!(joined, transcript.to_text());
    }
}
