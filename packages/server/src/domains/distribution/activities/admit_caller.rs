//! Caller admission: wait for the caller to reach the holding conference

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::domains::distribution::models::CallStatus;
use crate::domains::distribution::types::DistributionOutcome;
use crate::kernel::{poll_until, PollOutcome, PollSchedule, ServerDeps};

enum Admission {
    Joined,
    Left,
}

/// Make sure a call record exists, then wait for it to become `connected`.
///
/// Returns `None` when the caller is in the conference and dialing may begin,
/// or the outcome that ends the run before any agent is dialed.
pub async fn admit_caller(
    account_id: &str,
    call_sid: &str,
    deps: &ServerDeps,
) -> Result<Option<DistributionOutcome>> {
    if deps
        .store
        .create_call_if_absent(account_id, call_sid, CallStatus::Waiting)
        .await?
    {
        info!(account_id, call_sid, "Created call record in waiting state");
    } else {
        debug!(account_id, call_sid, "Call record already exists");
    }

    let store = deps.store.as_ref();
    let schedule = PollSchedule::new(
        deps.settings.poll_interval,
        deps.settings.caller_join_timeout,
    );

    let admission = poll_until(schedule, &deps.shutdown, move || async move {
        let call = store.find_call(account_id, call_sid).await?;
        Ok(call.and_then(|call| match call.status {
            CallStatus::Connected => Some(Admission::Joined),
            CallStatus::CallerLeft => Some(Admission::Left),
            CallStatus::Waiting | CallStatus::Initiated => None,
        }))
    })
    .await?;

    match admission {
        PollOutcome::Ready(Admission::Joined) => {
            info!(call_sid, "Caller is in the conference");
            Ok(None)
        }
        PollOutcome::Ready(Admission::Left) => {
            info!(call_sid, "Caller hung up before joining");
            Ok(Some(DistributionOutcome::CallerEnded))
        }
        PollOutcome::TimedOut => {
            warn!(
                call_sid,
                timeout_secs = deps.settings.caller_join_timeout.as_secs_f64(),
                "Caller did not join in time"
            );
            Ok(Some(DistributionOutcome::CallerDidNotJoin))
        }
        PollOutcome::Cancelled => Ok(Some(DistributionOutcome::Interrupted)),
    }
}
