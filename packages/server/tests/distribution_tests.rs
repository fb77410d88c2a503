//! Integration tests for round-robin distribution.
//!
//! The provider is simulated: tests feed the same events Twilio would post
//! (leg status, conference membership, agent keypress) while a distribution
//! run is in flight.

mod common;

use std::time::Duration;

use crate::common::*;
use roundrobin_core::config::DistributionSettings;
use roundrobin_core::domains::distribution::activities::{
    cancel_unanswered_attempts, confirm_agent, ingest_conference_event, ingest_leg_status,
    run_distribution, AgentConfirmation, AGENT_LEG_EVENTS, NO_AGENT_APOLOGY,
};
use roundrobin_core::domains::distribution::events::{
    ConferenceEvent, ConferenceEventKind, LegStatusEvent,
};
use roundrobin_core::domains::distribution::models::{
    Account, AttemptStatus, Availability, Call, CallStatus,
};
use roundrobin_core::domains::distribution::{DistributionError, DistributionOutcome};
use roundrobin_core::kernel::{fast_settings, BaseCallStore, MockTelephonyClient};
use tokio::task::JoinHandle;

/// Three agents, one round, with a longer ring so tests can act mid-ring
fn with_ring_wait(millis: u64) -> TestHarness {
    TestHarness::build(
        three_agent_store(Some(1)),
        MockTelephonyClient::new(),
        DistributionSettings {
            agent_ring_wait: Duration::from_millis(millis),
            ..fast_settings()
        },
    )
}

async fn connect_caller(h: &TestHarness) {
    h.store
        .create_call_if_absent(ACCOUNT_ID, CALLER_SID, CallStatus::Connected)
        .await
        .expect("Failed to create call");
}

fn spawn_distribution(
    h: &TestHarness,
    account: Account,
) -> JoinHandle<Result<DistributionOutcome, DistributionError>> {
    let deps = h.deps.clone();
    tokio::spawn(async move { run_distribution(&account, CALLER_SID, &deps).await })
}

fn caller_joined() -> ConferenceEvent {
    ConferenceEvent {
        account_id: ACCOUNT_ID.to_string(),
        call_sid: CALLER_SID.to_string(),
        kind: ConferenceEventKind::ParticipantJoin,
        participant_label: None,
    }
}

fn agent_joined(agent_id: &str) -> ConferenceEvent {
    ConferenceEvent {
        participant_label: Some(agent_id.to_string()),
        ..caller_joined()
    }
}

fn caller_hung_up() -> LegStatusEvent {
    LegStatusEvent {
        account_id: ACCOUNT_ID.to_string(),
        leg_sid: CALLER_SID.to_string(),
        status: "completed".to_string(),
        agent_id: None,
        parent_call_sid: None,
    }
}

fn agent_leg(leg_sid: &str, agent_id: &str, status: &str) -> LegStatusEvent {
    LegStatusEvent {
        account_id: ACCOUNT_ID.to_string(),
        leg_sid: leg_sid.to_string(),
        status: status.to_string(),
        agent_id: Some(agent_id.to_string()),
        parent_call_sid: Some(CALLER_SID.to_string()),
    }
}

fn accept(agent_id: &str) -> AgentConfirmation {
    AgentConfirmation {
        room: Some(Call::room_for(CALLER_SID)),
        agent_id: Some(agent_id.to_string()),
        account_id: Some(ACCOUNT_ID.to_string()),
        retry: 0,
        digits: Some("1".to_string()),
        from: Some(LINE_NUMBER.to_string()),
    }
}

// =============================================================================
// Round robin
// =============================================================================

#[tokio::test]
async fn no_answer_dials_each_agent_once_then_apologizes() {
    let h = TestHarness::new();
    connect_caller(&h).await;

    let outcome = run_distribution(&h.account().await, CALLER_SID, &h.deps)
        .await
        .expect("distribution failed");

    assert_eq!(outcome, DistributionOutcome::NoAgentAvailable);
    assert_eq!(
        h.telephony.dialed_numbers(),
        vec![AGENT_1_PHONE, AGENT_2_PHONE, AGENT_3_PHONE]
    );

    let pushed = h.telephony.pushed();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].0, CALLER_SID);
    assert!(pushed[0].1.contains(NO_AGENT_APOLOGY));

    let attempts = h.store.attempts(ACCOUNT_ID, CALLER_SID);
    assert_eq!(attempts.len(), 3);
    assert!(attempts.iter().all(|a| a.status == AttemptStatus::Canceled));
}

#[tokio::test]
async fn max_retries_repeats_the_roster_in_priority_order() {
    let h = TestHarness::with_store(three_agent_store(Some(2)));
    connect_caller(&h).await;

    let outcome = run_distribution(&h.account().await, CALLER_SID, &h.deps)
        .await
        .expect("distribution failed");

    assert_eq!(outcome, DistributionOutcome::NoAgentAvailable);
    assert_eq!(
        h.telephony.dialed_numbers(),
        vec![
            AGENT_1_PHONE,
            AGENT_2_PHONE,
            AGENT_3_PHONE,
            AGENT_1_PHONE,
            AGENT_2_PHONE,
            AGENT_3_PHONE
        ]
    );
}

#[tokio::test]
async fn dial_request_carries_correlation_for_callbacks() {
    let h = TestHarness::with_store(single_agent_store());
    connect_caller(&h).await;

    run_distribution(&h.account().await, CALLER_SID, &h.deps)
        .await
        .expect("distribution failed");

    let dials = h.telephony.dials();
    assert_eq!(dials.len(), 1);
    let (leg_sid, request) = &dials[0];

    assert_eq!(request.from, LINE_NUMBER);
    assert!(request.answer_url.starts_with("https://voice.test/voice/agent/prompt?"));
    assert!(request.answer_url.contains("room=conf-CA-caller"));
    assert!(request.answer_url.contains("user_id=agent-1"));
    assert!(request.answer_url.contains("retry=0"));
    assert!(request.status_callback_url.contains("call_sid=CA-caller"));
    assert_eq!(request.events, AGENT_LEG_EVENTS.to_vec());

    let attempt = h
        .store
        .find_attempt(ACCOUNT_ID, CALLER_SID, leg_sid)
        .await
        .expect("store read failed")
        .expect("attempt recorded");
    assert_eq!(attempt.agent_id, AGENT_1);
    assert_eq!(attempt.to_number, AGENT_1_PHONE);
}

#[tokio::test]
async fn agent_two_accepts_on_first_ring() {
    let h = with_ring_wait(400);
    connect_caller(&h).await;
    let task = spawn_distribution(&h, h.account().await);

    wait_until("agent 2 to be dialed", || h.telephony.dials().len() == 2).await;

    let document = confirm_agent(&accept(AGENT_2), &h.deps)
        .await
        .expect("confirmation failed")
        .to_xml()
        .expect("renders");
    assert!(document.contains("participantLabel=\"agent-2\""));
    assert!(document.contains(">conf-CA-caller</Conference>"));

    ingest_conference_event(&agent_joined(AGENT_2), &h.deps)
        .await
        .expect("ingest failed");

    let outcome = task.await.expect("task panicked").expect("distribution failed");
    assert_eq!(outcome, DistributionOutcome::AgentJoined);
    assert_eq!(h.telephony.dialed_numbers(), vec![AGENT_1_PHONE, AGENT_2_PHONE]);

    let call = h.store.call(ACCOUNT_ID, CALLER_SID).expect("call exists");
    assert!(call.agent_joined);
    assert_eq!(call.joined_agent_id.as_deref(), Some(AGENT_2));
    assert_eq!(
        h.store.agent(ACCOUNT_ID, AGENT_2).map(|a| a.status),
        Some(Availability::InConference)
    );

    // Agent 1's unanswered leg is stopped, the winner's is left alone
    let legs = h.telephony.dials();
    assert!(h.telephony.canceled().contains(&legs[0].0));
    assert!(!h.telephony.canceled().contains(&legs[1].0));
    assert!(h.telephony.pushed().is_empty());
}

#[tokio::test]
async fn caller_hangup_while_agent_rings_stops_everything() {
    let h = with_ring_wait(1_000);
    connect_caller(&h).await;
    let task = spawn_distribution(&h, h.account().await);

    wait_until("agent 1 to be dialed", || h.telephony.dials().len() == 1).await;
    ingest_leg_status(&caller_hung_up(), &h.deps)
        .await
        .expect("ingest failed");

    let outcome = task.await.expect("task panicked").expect("distribution failed");
    assert_eq!(outcome, DistributionOutcome::CallerEnded);
    assert_eq!(h.telephony.dialed_numbers(), vec![AGENT_1_PHONE]);

    let call = h.store.call(ACCOUNT_ID, CALLER_SID).expect("call exists");
    assert_eq!(call.status, CallStatus::CallerLeft);

    let leg_1 = h.telephony.dials()[0].0.clone();
    assert!(h.telephony.canceled().contains(&leg_1));
    let attempts = h.store.attempts(ACCOUNT_ID, CALLER_SID);
    assert_eq!(attempts[0].status, AttemptStatus::Canceled);
}

#[tokio::test]
async fn busy_agent_is_skipped() {
    let h = TestHarness::new();
    h.store
        .set_agent_availability(ACCOUNT_ID, AGENT_1, Availability::InConference)
        .await
        .expect("store write failed");
    connect_caller(&h).await;

    let outcome = run_distribution(&h.account().await, CALLER_SID, &h.deps)
        .await
        .expect("distribution failed");

    assert_eq!(outcome, DistributionOutcome::NoAgentAvailable);
    assert_eq!(h.telephony.dialed_numbers(), vec![AGENT_2_PHONE, AGENT_3_PHONE]);
}

#[tokio::test]
async fn availability_is_reread_before_each_dial() {
    let h = with_ring_wait(300);
    connect_caller(&h).await;
    let task = spawn_distribution(&h, h.account().await);

    wait_until("agent 1 to be dialed", || h.telephony.dials().len() == 1).await;
    h.store
        .set_agent_availability(ACCOUNT_ID, AGENT_2, Availability::InConference)
        .await
        .expect("store write failed");

    let outcome = task.await.expect("task panicked").expect("distribution failed");
    assert_eq!(outcome, DistributionOutcome::NoAgentAvailable);
    assert_eq!(h.telephony.dialed_numbers(), vec![AGENT_1_PHONE, AGENT_3_PHONE]);
}

#[tokio::test]
async fn failed_dial_moves_on_to_the_next_agent() {
    let h = TestHarness::build(
        three_agent_store(Some(1)),
        MockTelephonyClient::new().fail_dials_to(AGENT_1_PHONE),
        fast_settings(),
    );
    connect_caller(&h).await;

    let outcome = run_distribution(&h.account().await, CALLER_SID, &h.deps)
        .await
        .expect("distribution failed");

    assert_eq!(outcome, DistributionOutcome::NoAgentAvailable);
    assert_eq!(h.telephony.dialed_numbers(), vec![AGENT_2_PHONE, AGENT_3_PHONE]);
    assert_eq!(h.store.attempts(ACCOUNT_ID, CALLER_SID).len(), 2);
}

#[tokio::test]
async fn failed_cancels_are_swallowed() {
    let h = TestHarness::build(
        three_agent_store(Some(1)),
        MockTelephonyClient::new().fail_cancels(),
        fast_settings(),
    );
    connect_caller(&h).await;

    let outcome = run_distribution(&h.account().await, CALLER_SID, &h.deps)
        .await
        .expect("distribution failed");

    assert_eq!(outcome, DistributionOutcome::NoAgentAvailable);
    // Records stay as they were; the provider's own callbacks will settle them
    let attempts = h.store.attempts(ACCOUNT_ID, CALLER_SID);
    assert!(attempts.iter().all(|a| a.status == AttemptStatus::Initiated));
    assert_eq!(h.telephony.pushed().len(), 1);
}

#[tokio::test]
async fn store_failure_mid_ring_cancels_the_ringing_leg() {
    let h = with_ring_wait(1_000);
    connect_caller(&h).await;
    let task = spawn_distribution(&h, h.account().await);

    wait_until("agent 1 to be dialed", || h.telephony.dials().len() == 1).await;
    h.store.fail_call_reads(true);

    let result = task.await.expect("task panicked");
    assert!(matches!(result, Err(DistributionError::Internal(_))));

    let leg_1 = h.telephony.dials()[0].0.clone();
    assert_eq!(h.telephony.canceled(), vec![leg_1]);
    let attempts = h.store.attempts(ACCOUNT_ID, CALLER_SID);
    assert_eq!(attempts[0].status, AttemptStatus::Canceled);
    assert_eq!(h.telephony.dials().len(), 1);
}

#[tokio::test]
async fn abort_cleanup_leaves_answered_legs_alone() {
    let h = TestHarness::new();
    connect_caller(&h).await;
    seed_attempt(&h.store, "CA-leg-a", AGENT_1, AttemptStatus::Answered).await;
    seed_attempt(&h.store, "CA-leg-b", AGENT_2, AttemptStatus::Ringing).await;

    let canceled = cancel_unanswered_attempts(ACCOUNT_ID, CALLER_SID, &h.deps)
        .await
        .expect("cleanup failed");

    assert_eq!(canceled, 1);
    assert_eq!(h.telephony.canceled(), vec!["CA-leg-b"]);
    assert!(h.telephony.hung_up().is_empty());
}

#[tokio::test]
async fn empty_roster_ends_with_apology() {
    let h = TestHarness::with_store(empty_roster_store());
    connect_caller(&h).await;

    let outcome = run_distribution(&h.account().await, CALLER_SID, &h.deps)
        .await
        .expect("distribution failed");

    assert_eq!(outcome, DistributionOutcome::NoAgentAvailable);
    assert!(h.telephony.dials().is_empty());
    assert_eq!(h.telephony.pushed().len(), 1);
}

#[tokio::test]
async fn shutdown_interrupts_a_running_distribution() {
    let h = with_ring_wait(5_000);
    connect_caller(&h).await;
    let task = spawn_distribution(&h, h.account().await);

    wait_until("agent 1 to be dialed", || h.telephony.dials().len() == 1).await;
    h.deps.shutdown.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("distribution did not stop")
        .expect("task panicked")
        .expect("distribution failed");
    assert_eq!(outcome, DistributionOutcome::Interrupted);
    assert!(h.telephony.pushed().is_empty());
}

#[tokio::test]
async fn second_run_for_the_same_call_is_refused() {
    let h = with_ring_wait(1_000);
    connect_caller(&h).await;
    let task = spawn_distribution(&h, h.account().await);

    wait_until("agent 1 to be dialed", || h.telephony.dials().len() == 1).await;
    let second = run_distribution(&h.account().await, CALLER_SID, &h.deps).await;
    assert!(matches!(second, Err(DistributionError::AlreadyRunning(_))));

    h.shutdown().await;
    task.await.expect("task panicked").expect("distribution failed");
}

// =============================================================================
// Admission
// =============================================================================

#[tokio::test]
async fn caller_who_never_joins_is_not_distributed() {
    let h = TestHarness::new();

    let outcome = run_distribution(&h.account().await, CALLER_SID, &h.deps)
        .await
        .expect("distribution failed");

    assert_eq!(outcome, DistributionOutcome::CallerDidNotJoin);
    assert!(h.telephony.dials().is_empty());
    let call = h.store.call(ACCOUNT_ID, CALLER_SID).expect("call created");
    assert_eq!(call.status, CallStatus::Waiting);
}

#[tokio::test]
async fn caller_leaving_during_admission_ends_the_run() {
    let h = TestHarness::new();
    let task = spawn_distribution(&h, h.account().await);

    wait_until("call record", || h.store.call(ACCOUNT_ID, CALLER_SID).is_some()).await;
    ingest_leg_status(&caller_hung_up(), &h.deps)
        .await
        .expect("ingest failed");

    let outcome = task.await.expect("task panicked").expect("distribution failed");
    assert_eq!(outcome, DistributionOutcome::CallerEnded);
    assert!(h.telephony.dials().is_empty());
}

#[tokio::test]
async fn caller_joining_during_admission_starts_dialing() {
    let h = TestHarness::new();
    let task = spawn_distribution(&h, h.account().await);

    wait_until("call record", || h.store.call(ACCOUNT_ID, CALLER_SID).is_some()).await;
    ingest_conference_event(&caller_joined(), &h.deps)
        .await
        .expect("ingest failed");

    let outcome = task.await.expect("task panicked").expect("distribution failed");
    assert_eq!(outcome, DistributionOutcome::NoAgentAvailable);
    // The join-triggered run found this one already in charge
    assert_eq!(h.telephony.dials().len(), 3);
    h.shutdown().await;
}

// =============================================================================
// Event ingestion
// =============================================================================

#[tokio::test]
async fn caller_join_starts_distribution_exactly_once() {
    let h = with_ring_wait(1_000);
    h.store
        .create_call_if_absent(ACCOUNT_ID, CALLER_SID, CallStatus::Initiated)
        .await
        .expect("store write failed");

    ingest_conference_event(&caller_joined(), &h.deps)
        .await
        .expect("ingest failed");
    ingest_conference_event(&caller_joined(), &h.deps)
        .await
        .expect("ingest failed");

    wait_until("agent 1 to be dialed", || h.telephony.dials().len() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.telephony.dials().len(), 1);
    assert_eq!(h.deps.tasks.len(), 1);

    h.shutdown().await;
}

#[tokio::test]
async fn only_the_first_agent_to_join_wins() {
    let h = TestHarness::new();
    connect_caller(&h).await;
    seed_attempt(&h.store, "CA-leg-a", AGENT_1, AttemptStatus::Answered).await;
    seed_attempt(&h.store, "CA-leg-b", AGENT_2, AttemptStatus::Answered).await;

    ingest_conference_event(&agent_joined(AGENT_1), &h.deps)
        .await
        .expect("ingest failed");

    // Agent 2's answered leg is hung up, not canceled
    assert_eq!(h.telephony.hung_up(), vec!["CA-leg-b"]);

    let rejected = confirm_agent(&accept(AGENT_2), &h.deps)
        .await
        .expect("confirmation failed")
        .to_xml()
        .expect("renders");
    assert!(rejected.contains("This call has already been answered. Goodbye."));
    assert!(!rejected.contains("<Conference"));

    ingest_conference_event(&agent_joined(AGENT_2), &h.deps)
        .await
        .expect("ingest failed");

    let call = h.store.call(ACCOUNT_ID, CALLER_SID).expect("call exists");
    assert_eq!(call.joined_agent_id.as_deref(), Some(AGENT_1));
}

#[tokio::test]
async fn late_joiner_has_their_leg_ended() {
    let h = TestHarness::new();
    connect_caller(&h).await;
    h.store
        .claim_agent_joined(ACCOUNT_ID, CALLER_SID, AGENT_1)
        .await
        .expect("store write failed");
    seed_attempt(&h.store, "CA-leg-b", AGENT_2, AttemptStatus::Answered).await;

    ingest_conference_event(&agent_joined(AGENT_2), &h.deps)
        .await
        .expect("ingest failed");

    assert_eq!(h.telephony.hung_up(), vec!["CA-leg-b"]);
    let attempts = h.store.attempts(ACCOUNT_ID, CALLER_SID);
    assert_eq!(attempts[0].status, AttemptStatus::Canceled);
    let call = h.store.call(ACCOUNT_ID, CALLER_SID).expect("call exists");
    assert_eq!(call.joined_agent_id.as_deref(), Some(AGENT_1));
}

#[tokio::test]
async fn ringing_callback_after_caller_left_cancels_the_leg() {
    let h = TestHarness::new();
    h.store
        .create_call_if_absent(ACCOUNT_ID, CALLER_SID, CallStatus::CallerLeft)
        .await
        .expect("store write failed");
    seed_attempt(&h.store, "CA-leg-a", AGENT_1, AttemptStatus::Initiated).await;

    ingest_leg_status(&agent_leg("CA-leg-a", AGENT_1, "ringing"), &h.deps)
        .await
        .expect("ingest failed");

    assert_eq!(h.telephony.canceled(), vec!["CA-leg-a"]);
    let attempts = h.store.attempts(ACCOUNT_ID, CALLER_SID);
    assert_eq!(attempts[0].status, AttemptStatus::Canceled);
}

#[tokio::test]
async fn rejected_cancel_after_caller_left_keeps_the_real_status() {
    let h = TestHarness::build(
        single_agent_store(),
        MockTelephonyClient::new().fail_cancels(),
        fast_settings(),
    );
    h.store
        .create_call_if_absent(ACCOUNT_ID, CALLER_SID, CallStatus::CallerLeft)
        .await
        .expect("store write failed");
    seed_attempt(&h.store, "CA-leg-a", AGENT_1, AttemptStatus::Initiated).await;

    ingest_leg_status(&agent_leg("CA-leg-a", AGENT_1, "ringing"), &h.deps)
        .await
        .expect("ingest failed");

    assert!(h.telephony.canceled().is_empty());
    let attempts = h.store.attempts(ACCOUNT_ID, CALLER_SID);
    assert_eq!(attempts[0].status, AttemptStatus::Ringing);

    // The leg's own final status still lands
    ingest_leg_status(&agent_leg("CA-leg-a", AGENT_1, "completed"), &h.deps)
        .await
        .expect("ingest failed");
    let attempts = h.store.attempts(ACCOUNT_ID, CALLER_SID);
    assert_eq!(attempts[0].status, AttemptStatus::Completed);
}

#[tokio::test]
async fn answered_leg_after_caller_left_is_hung_up() {
    let h = TestHarness::new();
    h.store
        .create_call_if_absent(ACCOUNT_ID, CALLER_SID, CallStatus::CallerLeft)
        .await
        .expect("store write failed");
    seed_attempt(&h.store, "CA-leg-a", AGENT_1, AttemptStatus::Ringing).await;

    ingest_leg_status(&agent_leg("CA-leg-a", AGENT_1, "in-progress"), &h.deps)
        .await
        .expect("ingest failed");

    assert_eq!(h.telephony.hung_up(), vec!["CA-leg-a"]);
    assert!(h.telephony.canceled().is_empty());
    let attempts = h.store.attempts(ACCOUNT_ID, CALLER_SID);
    assert_eq!(attempts[0].status, AttemptStatus::Canceled);
}

#[tokio::test]
async fn unrecorded_leg_after_caller_left_is_still_stopped() {
    let h = TestHarness::new();
    h.store
        .create_call_if_absent(ACCOUNT_ID, CALLER_SID, CallStatus::CallerLeft)
        .await
        .expect("store write failed");

    ingest_leg_status(&agent_leg("CA-leg-z", AGENT_1, "ringing"), &h.deps)
        .await
        .expect("ingest failed");

    assert_eq!(h.telephony.canceled(), vec!["CA-leg-z"]);
    assert!(h.store.attempts(ACCOUNT_ID, CALLER_SID).is_empty());
}

#[tokio::test]
async fn terminal_agent_status_frees_the_agent_and_is_mirrored() {
    let h = TestHarness::new();
    connect_caller(&h).await;
    h.store
        .set_agent_availability(ACCOUNT_ID, AGENT_1, Availability::InConference)
        .await
        .expect("store write failed");
    seed_attempt(&h.store, "CA-leg-a", AGENT_1, AttemptStatus::Answered).await;

    ingest_leg_status(&agent_leg("CA-leg-a", AGENT_1, "completed"), &h.deps)
        .await
        .expect("ingest failed");

    assert_eq!(
        h.store.agent(ACCOUNT_ID, AGENT_1).map(|a| a.status),
        Some(Availability::Available)
    );
    let attempts = h.store.attempts(ACCOUNT_ID, CALLER_SID);
    assert_eq!(attempts[0].status, AttemptStatus::Completed);
}

#[tokio::test]
async fn repeated_status_callbacks_are_idempotent() {
    let h = TestHarness::new();
    connect_caller(&h).await;
    seed_attempt(&h.store, "CA-leg-a", AGENT_1, AttemptStatus::Initiated).await;

    for status in ["ringing", "ringing", "no-answer", "ringing", "no-answer"] {
        ingest_leg_status(&agent_leg("CA-leg-a", AGENT_1, status), &h.deps)
            .await
            .expect("ingest failed");
    }

    let attempts = h.store.attempts(ACCOUNT_ID, CALLER_SID);
    assert_eq!(attempts[0].status, AttemptStatus::NoAnswer);
    assert!(h.telephony.canceled().is_empty());

    ingest_leg_status(&caller_hung_up(), &h.deps)
        .await
        .expect("ingest failed");
    ingest_leg_status(&caller_hung_up(), &h.deps)
        .await
        .expect("ingest failed");
    let call = h.store.call(ACCOUNT_ID, CALLER_SID).expect("call exists");
    assert_eq!(call.status, CallStatus::CallerLeft);
}
