use std::time::Duration;

use mptools_engine::{DomTree, LiveDocument, SanitizeRules, Sanitizer};

const PAGE: &str = r#"
<div id="question" class="card question-blur">What is 2 + 2?</div>
<div class="cdk-overlay-container"><div class="modal">Upgrade now</div></div>
"#;

fn has_class(doc: &LiveDocument, id: &str, class: &str) -> bool {
    doc.read(|tree| {
        let element = tree.find_by_id(id).unwrap();
        tree.element(element).unwrap().has_class(class)
    })
}

fn insert(doc: &LiveDocument, html: &str) {
    doc.mutate(|m| {
        let body = m.tree().body().unwrap();
        m.append_html(body, html);
    });
}

fn insert_unobserved(doc: &LiveDocument, html: &str) {
    doc.mutate_unobserved(|m| {
        let body = m.tree().body().unwrap();
        m.append_html(body, html);
    });
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn enable_cleans_the_page_immediately() {
    engine_logging::initialize_for_tests();
    let doc = LiveDocument::parse(PAGE);
    let mut sanitizer = Sanitizer::new(&SanitizeRules::default()).unwrap();

    assert!(sanitizer.enable(&doc));
    assert!(!has_class(&doc, "question", "question-blur"));
    assert!(has_class(&doc, "question", "card"));
    assert!(doc.read(|tree| tree.find_by_id("question").is_some()));
    let overlays = doc.read(|tree| {
        tree.select(&mptools_engine::parse_selector(".cdk-overlay-container").unwrap())
            .len()
    });
    assert_eq!(overlays, 0);
}

#[tokio::test(start_paused = true)]
async fn observer_strips_inserted_blur_before_the_fallback_sweep() {
    engine_logging::initialize_for_tests();
    let doc = LiveDocument::parse(PAGE);
    let mut sanitizer = Sanitizer::new(&SanitizeRules::default()).unwrap();
    sanitizer.enable(&doc);

    insert(&doc, r#"<div id="late" class="question-blur">Next question</div>"#);
    sleep_ms(1).await;
    assert!(!has_class(&doc, "late", "question-blur"));

    doc.mutate(|m| {
        let question = m.tree().find_by_id("question").unwrap();
        m.add_class(question, "question-blur");
    });
    sleep_ms(1).await;
    assert!(!has_class(&doc, "question", "question-blur"));
}

#[tokio::test(start_paused = true)]
async fn fallback_sweep_catches_changes_the_observer_missed() {
    engine_logging::initialize_for_tests();
    let doc = LiveDocument::parse(PAGE);
    let mut sanitizer = Sanitizer::new(&SanitizeRules::default()).unwrap();
    sanitizer.enable(&doc);

    insert_unobserved(
        &doc,
        r#"<div id="hidden" class="question-blur red-stuff">Hidden</div>"#,
    );
    sleep_ms(100).await;
    assert!(has_class(&doc, "hidden", "question-blur"));

    sleep_ms(250).await;
    assert!(!has_class(&doc, "hidden", "question-blur"));
    assert!(!has_class(&doc, "hidden", "red-stuff"));
}

#[tokio::test(start_paused = true)]
async fn replaced_page_is_cleaned_by_the_observer() {
    engine_logging::initialize_for_tests();
    let doc = LiveDocument::parse("<p>loading</p>");
    let mut sanitizer = Sanitizer::new(&SanitizeRules::default()).unwrap();
    sanitizer.enable(&doc);

    doc.replace(DomTree::parse_document(PAGE));
    sleep_ms(1).await;
    assert!(!has_class(&doc, "question", "question-blur"));
}

#[tokio::test(start_paused = true)]
async fn disable_is_idempotent_and_stops_cleaning() {
    engine_logging::initialize_for_tests();
    let doc = LiveDocument::parse(PAGE);
    let mut sanitizer = Sanitizer::new(&SanitizeRules::default()).unwrap();

    assert!(sanitizer.enable(&doc));
    assert!(!sanitizer.enable(&doc));
    assert!(sanitizer.is_active());

    assert!(sanitizer.disable());
    assert!(!sanitizer.disable());
    assert!(!sanitizer.is_active());

    insert(&doc, r#"<div id="late" class="question-blur">Next</div>"#);
    sleep_ms(1000).await;
    assert!(has_class(&doc, "late", "question-blur"));
}
