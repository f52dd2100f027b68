use super::*;

fn candidate(url: &str, content: &str) -> RetrievalCandidate {
    RetrievalCandidate {
        content: content.to_string(),
        source_url: url.to_string(),
        similarity: 0.9,
    }
}

fn composer() -> ContextComposer {
    ContextComposer::new("You only answer questions about A-Frame.")
}

#[test]
fn header_stays_within_budget() {
    let long = "x".repeat(900);
    let candidates = vec![
        candidate("A", &long),
        candidate("B", &long),
        candidate("C", &long),
    ];

    let composed = composer().compose(&candidates, "How do I add a box?", 2000);

    assert_eq!(composed.prompt_header.chars().count(), 2000);
    assert!(composed.prompt_header.starts_with("You only answer"));
}

#[test]
fn source_urls_are_unique_in_first_seen_order() {
    let candidates = vec![
        candidate("A", "first"),
        candidate("A", "second"),
        candidate("B", "third"),
    ];

    let composed = composer().compose(&candidates, "q", 2000);

    assert_eq!(composed.source_urls, vec!["A", "B"]);
}

#[test]
fn urls_survive_truncation_of_their_content() {
    let candidates = vec![candidate("A", "short"), candidate("B", &"y".repeat(5000))];

    let composed = composer().compose(&candidates, "q", 100);

    assert_eq!(composed.source_urls, vec!["A", "B"]);
    assert_eq!(composed.prompt_header.chars().count(), 100);
}

#[test]
fn empty_candidates_keep_preamble_and_question() {
    let composed = composer().compose(&[], "What is an entity?", 2000);

    assert_eq!(
        composed.prompt_header,
        "You only answer questions about A-Frame. Question: What is an entity?"
    );
    assert!(composed.source_urls.is_empty());
    assert!(!composed.is_grounded());
}

#[test]
fn content_newlines_are_flattened_in_order() {
    let candidates = vec![
        candidate("A", "Intro\nHello"),
        candidate("B", "Usage\nUse it"),
    ];

    let composed = composer().compose(&candidates, "q", 2000);

    assert!(
        composed
            .prompt_header
            .ends_with("Question: q Intro Hello Usage Use it")
    );
}

#[test]
fn truncation_counts_characters_not_bytes() {
    let composer = ContextComposer::new("");
    let candidates = vec![candidate("A", "ééééé")];

    let composed = composer.compose(&candidates, "ü", 14);

    assert_eq!(composed.prompt_header, "Question: ü éé");
}
