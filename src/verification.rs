//! Post-confirmation contract-state check, bounded by an attempt ceiling

use crate::api::ContractRef;
use crate::errors::{OrchestratorError, OrchestratorResult};
use crate::metrics::metrics;
use crate::poll::{BoundedPoll, IntervalPolicy, PollBudget, Probe};
use crate::stage::StageContext;
use crate::timeline::lines;

pub async fn verify_contract_state(ctx: &StageContext, contract: &ContractRef) -> OrchestratorResult<()> {
    ctx.waiting(lines::CONTRACT_VERIFIED, "Verifying contract state");

    let max_attempts = ctx.polling.verification_max_attempts;
    let poll = BoundedPoll::new(
        "contract-state",
        IntervalPolicy::Fixed(ctx.polling.verification_interval()),
        PollBudget::Attempts(max_attempts),
    )
    .sleep_first(true);

    let outcome = poll
        .run(|_| async move {
            metrics().verification_polls.inc();
            match ctx.api.get_contract_state(contract).await {
                Ok(reply) if reply.success => Probe::Ready(()),
                Ok(_) => Probe::Pending,
                Err(err) => Probe::Failed(err.to_string()),
            }
        })
        .await;

    match outcome {
        Ok(()) => {
            ctx.success(lines::CONTRACT_VERIFIED, "Contract state verified");
            Ok(())
        }
        Err(exhausted) => {
            let err = OrchestratorError::VerificationExhausted {
                attempts: exhausted.attempts,
            };
            ctx.error(lines::CONTRACT_VERIFIED, err.user_message());
            Err(err)
        }
    }
}
