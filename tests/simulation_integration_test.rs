//! End-to-end batches against the in-memory simulated backend
//!
//! Runs under a paused clock, so the default poll cadences cost nothing.

use nft_orchestrator::simulation::{SimulatedBackend, SimulationProfile};
use nft_orchestrator::timeline::{lines, LineStatus};
use nft_orchestrator::{
    ActionKey, ActionKind, ActionOrchestrator, BatchOutcome, Config, OrchestratorError, Statistics, TxParams,
};
use nonempty::NonEmpty;
use std::sync::Arc;
use std::time::Duration;

const SENDER: &str = "B62qsimulatedsender";
const COLLECTION: &str = "B62qsimcollection";

fn orchestrator(profile: SimulationProfile, config: Config) -> ActionOrchestrator {
    let backend = Arc::new(SimulatedBackend::new(profile));
    ActionOrchestrator::new(backend.clone(), backend.clone(), backend, config)
}

fn quiet_profile() -> SimulationProfile {
    SimulationProfile {
        latency: Duration::ZERO,
        submit_failure_rate: 0.0,
        ..SimulationProfile::default()
    }
}

fn mint(index: usize) -> TxParams {
    TxParams::Mint {
        sender: SENDER.to_string(),
        collection_address: COLLECTION.to_string(),
        nft_name: format!("Sim #{}", index),
        nft_address: None,
        price: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_mint_batch_confirms_every_transaction() {
    let orchestrator = orchestrator(quiet_profile(), Config::default());
    let key = ActionKey::new(COLLECTION, None, ActionKind::Mint);
    let batch = NonEmpty::from((mint(1), vec![mint(2), mint(3)]));

    let report = orchestrator.submit_batch(key, batch).await.unwrap();

    assert_eq!(report.outcome, BatchOutcome::Success);
    assert_eq!(
        report.statistics,
        Statistics {
            success: 3,
            error: 0,
            waiting: 0
        }
    );
    assert_eq!(report.confirmations().count(), 3);
    // Three job polls plus three inclusion polls, ten seconds apart
    assert!(report.elapsed >= Duration::from_secs(60));

    for index in 1..=3 {
        let group = report.timeline.group(&format!("mint-{}", index)).unwrap();
        assert_eq!(group.status, LineStatus::Success);
        assert_eq!(
            group.line(lines::MINTED).map(|line| line.status),
            Some(LineStatus::Success)
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_service_submitted_launch_with_verification() {
    let profile = SimulationProfile {
        service_submits: true,
        ..quiet_profile()
    };
    let mut config = Config::default();
    config.batch.verify_contract_state = true;
    let orchestrator = orchestrator(profile, config);

    let launch = TxParams::Launch {
        sender: SENDER.to_string(),
        collection_name: "Simulated".to_string(),
        symbol: "SIM".to_string(),
        collection_address: None,
        metadata_url: None,
    };
    let key = ActionKey::new("pending-collection", None, ActionKind::Launch);
    let report = orchestrator.submit(key, launch).await.unwrap();

    assert!(report.is_success());
    let group = report.timeline.group("launch-1").unwrap();
    assert_eq!(
        group.line(lines::CONTRACT_VERIFIED).map(|line| line.status),
        Some(LineStatus::Success)
    );
    assert!(report.confirmations().all(|c| c.hash.starts_with("5J")));
}

#[tokio::test(start_paused = true)]
async fn test_congested_mempool_times_out_submission() {
    let profile = SimulationProfile {
        submit_failure_rate: 1.0,
        ..quiet_profile()
    };
    let mut config = Config::default();
    config.polling.submission_timeout_secs = 60;
    let orchestrator = orchestrator(profile, config);

    let key = ActionKey::new(COLLECTION, None, ActionKind::Mint);
    let report = orchestrator.submit(key, mint(1)).await.unwrap();

    assert_eq!(report.outcome, BatchOutcome::Error);
    let (group_id, err) = report.errors().next().unwrap();
    assert_eq!(group_id, "mint-1");
    match err {
        OrchestratorError::SubmissionTimeout { reason, .. } => {
            assert_eq!(reason, "simulated mempool congestion")
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let group = report.timeline.group(group_id).unwrap();
    assert_eq!(
        group.line(lines::TX_SENT).map(|line| line.status),
        Some(LineStatus::Error)
    );
    let summary = report.timeline.group(lines::BATCH_GROUP).unwrap();
    assert_eq!(summary.status, LineStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn test_sender_must_match_wallet_account() {
    let orchestrator = orchestrator(quiet_profile(), Config::default());
    let key = ActionKey::new(COLLECTION, Some("B62qnft".to_string()), ActionKind::Transfer);
    let transfer = TxParams::Transfer {
        sender: "B62qsomebodyelse".to_string(),
        collection_address: COLLECTION.to_string(),
        nft_address: "B62qnft".to_string(),
        to: SENDER.to_string(),
    };

    let report = orchestrator.submit(key, transfer).await.unwrap();

    let (_, err) = report.errors().next().unwrap();
    assert!(matches!(err, OrchestratorError::WalletUnavailable(_)));
    assert_eq!(report.statistics.error, 1);
}
