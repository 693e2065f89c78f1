use std::time::Duration;

use mptools_engine::{
    find, Document, ElementFinder, FindError, FindFailure, LiveDocument, WatchRequest,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn init_logging() {
    engine_logging::initialize_for_tests();
}

fn append_later(doc: &LiveDocument, after: Duration, html: &'static str) {
    let doc = doc.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        doc.mutate(|m| {
            let body = m.tree().body().unwrap();
            m.append_html(body, html);
        });
    });
}

#[tokio::test(start_paused = true)]
async fn element_appearing_later_is_found_on_the_next_poll() {
    init_logging();
    let doc = LiveDocument::default();
    append_later(
        &doc,
        Duration::from_millis(500),
        r#"<div class="check-btn">  Check my answer </div>"#,
    );
    let request =
        WatchRequest::new(".check-btn", "Check my answer", Duration::from_millis(10_000)).unwrap();

    let started = Instant::now();
    let found = ElementFinder::default().find(&doc, &request).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(500), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(700), "{elapsed:?}");
    assert_eq!(
        doc.text_content(found).unwrap().trim(),
        "Check my answer"
    );
}

#[tokio::test(start_paused = true)]
async fn no_match_times_out_within_one_poll_of_the_budget() {
    init_logging();
    let doc = LiveDocument::parse(r#"<div class="check-btn">Something else</div>"#);
    let request =
        WatchRequest::new(".check-btn", "Check my answer", Duration::from_millis(1000)).unwrap();

    let started = Instant::now();
    let err = ElementFinder::default()
        .find(&doc, &request)
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(
        err,
        FindError::Timeout {
            text: "Check my answer".to_string()
        }
    );
    assert!(elapsed >= Duration::from_millis(1000), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(1200), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn first_exact_trimmed_match_in_document_order_wins() {
    init_logging();
    let doc = LiveDocument::parse(
        r#"
        <div class="btn">Check my answer please</div>
        <div class="btn">check my answer</div>
        <span class="other">Check my answer</span>
        <div class="btn" id="second">
            Check my answer
        </div>
        <div class="btn" id="third">Check my answer</div>
        "#,
    );
    let request = WatchRequest::new("div.btn", "Check my answer", Duration::from_secs(1)).unwrap();

    let found = ElementFinder::default().find(&doc, &request).await.unwrap();
    assert_eq!(Some(found), doc.find_by_id("second"));
}

#[tokio::test(start_paused = true)]
async fn cancellation_ends_the_wait_early() {
    init_logging();
    let doc = LiveDocument::default();
    let cancel = CancellationToken::new();
    let finder = ElementFinder::default().with_cancel(cancel.clone());
    let request =
        WatchRequest::new(".check-btn", "Check my answer", Duration::from_secs(10)).unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = finder.find(&doc, &request).await.unwrap_err();
    assert!(matches!(err, FindError::Cancelled { .. }));
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn one_shot_find_reports_bad_requests() {
    init_logging();
    let doc = LiveDocument::parse(r#"<p class="x">hi</p>"#);

    let err = find(&doc, "p >", "hi", Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, FindFailure::Request(_)));

    let found = find(&doc, "p.x", "hi", Duration::from_secs(1)).await.unwrap();
    assert_eq!(doc.text_content(found).as_deref(), Some("hi"));
}

#[tokio::test(start_paused = true)]
async fn structural_selectors_narrow_the_candidates() {
    init_logging();
    let doc = LiveDocument::parse(
        r#"
        <div class="bottom-bar disabled"><button>Complete question</button></div>
        <div class="bottom-bar"><button id="live">Complete question</button></div>
        "#,
    );

    let found = find(
        &doc,
        "div[class^=bottom]:not(.disabled) > button",
        "Complete question",
        Duration::from_secs(1),
    )
    .await
    .unwrap();
    assert_eq!(Some(found), doc.find_by_id("live"));

    let found = find(&doc, "div + div button", "Complete question", Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(Some(found), doc.find_by_id("live"));
}
