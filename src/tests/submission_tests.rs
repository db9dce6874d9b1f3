//! Submission retry loop tests

use crate::api::SubmitReply;
use crate::config::PollingConfig;
use crate::errors::OrchestratorError;
use crate::submission::submit_with_retry;
use crate::test_utils::{stage_context, CallJournal, ScriptedApi, ScriptedChain, TEST_GROUP};
use crate::timeline::{lines, EntryLines, LineStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_accepted_on_first_attempt() {
    let journal = CallJournal::new();
    let api = Arc::new(ScriptedApi::new(Arc::clone(&journal)));
    let chain = Arc::new(ScriptedChain::new(Arc::clone(&journal)));
    let (ctx, timeline) = stage_context(api, chain, PollingConfig::default());
    let start = Instant::now();

    let hash = submit_with_retry(&ctx, "signed", &EntryLines::for_entry(0, 1))
        .await
        .unwrap();
    ctx.updates.stop().await;

    assert_eq!(hash, "hash-submitted");
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(journal.count("submit"), 1);
    let timeline = timeline.read();
    let sent = timeline.group(TEST_GROUP).unwrap().line(lines::TX_SENT).unwrap();
    assert_eq!(sent.status, LineStatus::Waiting);
}

#[tokio::test(start_paused = true)]
async fn test_retries_with_linear_backoff() {
    let journal = CallJournal::new();
    let api = Arc::new(ScriptedApi::new(Arc::clone(&journal)));
    let chain = Arc::new(ScriptedChain::new(Arc::clone(&journal)));
    chain.submit.push_n(Ok(SubmitReply::rejected("nonce too low")), 3);
    let (ctx, timeline) = stage_context(api, chain.clone(), PollingConfig::default());

    let hash = submit_with_retry(&ctx, "signed", &EntryLines::for_entry(0, 1))
        .await
        .unwrap();
    ctx.updates.stop().await;

    assert_eq!(hash, "hash-submitted");
    assert_eq!(
        journal.gaps("submit"),
        vec![
            Duration::from_millis(5_000),
            Duration::from_millis(10_000),
            Duration::from_millis(15_000)
        ]
    );

    let timeline = timeline.read();
    let sent = timeline.group(TEST_GROUP).unwrap().line(lines::TX_SENT).unwrap();
    // Last retry message carries the reason and the attempt number
    assert!(sent.content.contains("nonce too low"));
    assert!(sent.content.contains("attempt 3"));
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_endpoint_ends_by_timeout() {
    let journal = CallJournal::new();
    let api = Arc::new(ScriptedApi::new(Arc::clone(&journal)));
    let chain = Arc::new(ScriptedChain::new(Arc::clone(&journal)));
    chain
        .submit
        .set_fallback(Err(OrchestratorError::Transport("503 Service Unavailable".to_string())));
    let polling = PollingConfig {
        submission_timeout_secs: 300,
        ..PollingConfig::default()
    };
    let (ctx, timeline) = stage_context(api, chain, polling);
    let start = Instant::now();

    let err = submit_with_retry(&ctx, "signed", &EntryLines::for_entry(0, 1))
        .await
        .unwrap_err();
    ctx.updates.stop().await;

    assert!(start.elapsed() <= Duration::from_secs(300));
    match err {
        OrchestratorError::SubmissionTimeout { attempts, reason, .. } => {
            // Probes at 0, 5, 15, 30, 50, 75, 105, 140, 180, 225, 275
            assert_eq!(attempts, 11);
            assert!(reason.contains("503"));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let gaps = journal.gaps("submit");
    assert!(gaps.windows(2).all(|pair| pair[0] <= pair[1]));

    let timeline = timeline.read();
    let sent = timeline.group(TEST_GROUP).unwrap().line(lines::TX_SENT).unwrap();
    assert_eq!(sent.status, LineStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn test_reply_without_hash_uses_status_as_reason() {
    let journal = CallJournal::new();
    let api = Arc::new(ScriptedApi::new(Arc::clone(&journal)));
    let chain = Arc::new(ScriptedChain::new(Arc::clone(&journal)));
    chain.submit.push(Ok(SubmitReply {
        hash: None,
        status: Some("rejected".to_string()),
        error: None,
    }));
    let (ctx, _timeline) = stage_context(api, chain, PollingConfig::default());

    let lines = EntryLines::for_entry(2, 3);
    let hash = submit_with_retry(&ctx, "signed", &lines).await.unwrap();
    assert_eq!(hash, "hash-submitted");
    assert_eq!(journal.count("submit"), 2);
    assert_eq!(SubmitReply::default().failure_reason(), "no transaction hash returned");
}
