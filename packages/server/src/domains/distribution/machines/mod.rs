//! Distribution decisions as pure functions of (current record, incoming event).
//!
//! Nothing here performs I/O; activities read the records, ask the machine
//! what to do, and apply the returned commands.

use crate::domains::distribution::commands::DistributionCommand;
use crate::domains::distribution::events::{ConferenceEvent, ConferenceEventKind, LegStatusEvent};
use crate::domains::distribution::models::{Agent, AttemptStatus, Call};
use crate::domains::distribution::types::DistributionOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialDecision {
    Stop(DistributionOutcome),
    Skip,
    Dial,
}

/// Whether a running distribution has to stop, given the latest call record
pub fn check_progress(call: Option<&Call>) -> Option<DistributionOutcome> {
    let call = call?;
    if call.caller_left() {
        Some(DistributionOutcome::CallerEnded)
    } else if call.agent_joined {
        Some(DistributionOutcome::AgentJoined)
    } else {
        None
    }
}

/// Decide what to do with the next agent in the roster
pub fn decide_dial(call: Option<&Call>, agent: &Agent) -> DialDecision {
    if let Some(outcome) = check_progress(call) {
        return DialDecision::Stop(outcome);
    }
    if !agent.is_available() {
        return DialDecision::Skip;
    }
    DialDecision::Dial
}

/// Leg status callback.
///
/// `call` is the caller's record: the parent call for agent legs, the leg's
/// own call for the caller leg.
pub fn decide_leg_status(event: &LegStatusEvent, call: Option<&Call>) -> Vec<DistributionCommand> {
    let status = AttemptStatus::from_provider(&event.status);

    match (&event.agent_id, &event.parent_call_sid) {
        (Some(agent_id), parent) => {
            let still_live = status.map_or(true, |s| !s.is_terminal());

            // Late callback for a leg whose caller is already gone
            if let (Some(parent_sid), true) = (parent, still_live) {
                if call.is_some_and(Call::caller_left) {
                    let mut commands = Vec::new();
                    if let Some(status) = status {
                        commands.push(DistributionCommand::MirrorAttemptStatus {
                            call_sid: parent_sid.clone(),
                            leg_sid: event.leg_sid.clone(),
                            status,
                        });
                    }
                    commands.push(DistributionCommand::StopLeg {
                        call_sid: parent_sid.clone(),
                        leg_sid: event.leg_sid.clone(),
                        answered: status == Some(AttemptStatus::Answered),
                    });
                    return commands;
                }
            }

            let Some(status) = status else {
                return Vec::new();
            };

            let mut commands = Vec::new();
            if status.is_terminal() {
                commands.push(DistributionCommand::MarkAgentAvailable {
                    agent_id: agent_id.clone(),
                });
            }
            if let Some(parent_sid) = parent {
                commands.push(DistributionCommand::MirrorAttemptStatus {
                    call_sid: parent_sid.clone(),
                    leg_sid: event.leg_sid.clone(),
                    status,
                });
            }
            commands
        }

        // Caller hung up
        (None, _) if status == Some(AttemptStatus::Completed) => match call {
            Some(call) => vec![
                DistributionCommand::MarkCallerLeft {
                    call_sid: call.id.clone(),
                },
                DistributionCommand::CancelPendingAttempts {
                    call_sid: call.id.clone(),
                    except_agent: call.joined_agent_id.clone(),
                },
            ],
            None => Vec::new(),
        },

        (None, _) => Vec::new(),
    }
}

/// Conference membership callback for the caller's holding conference
pub fn decide_conference_event(
    event: &ConferenceEvent,
    call: Option<&Call>,
) -> Vec<DistributionCommand> {
    match (&event.kind, &event.participant_label, call) {
        (ConferenceEventKind::ParticipantLeave, Some(agent_id), _) => {
            vec![DistributionCommand::MarkAgentAvailable {
                agent_id: agent_id.clone(),
            }]
        }
        (_, _, None) => Vec::new(),
        (ConferenceEventKind::ParticipantJoin, Some(agent_id), Some(call)) => {
            vec![DistributionCommand::ClaimAgentJoined {
                call_sid: call.id.clone(),
                agent_id: agent_id.clone(),
            }]
        }
        (ConferenceEventKind::ParticipantJoin, None, Some(call)) => {
            vec![DistributionCommand::MarkCallConnected {
                call_sid: call.id.clone(),
            }]
        }
        (ConferenceEventKind::ConferenceEnd, _, Some(call)) => vec![
            DistributionCommand::MarkCallerLeft {
                call_sid: call.id.clone(),
            },
            DistributionCommand::CancelPendingAttempts {
                call_sid: call.id.clone(),
                except_agent: call.joined_agent_id.clone(),
            },
        ],
        _ => Vec::new(),
    }
}
