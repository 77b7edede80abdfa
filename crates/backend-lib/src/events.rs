// ============================
// crates/backend-lib/src/events.rs
// ============================
//! Webhook event to state transition mapping.
use std::sync::Arc;

use metrics::counter;
use rollcall_common::{EventType, Participant, WebhookEnvelope};
use tracing::debug;

use crate::meetings::{MeetingStore, RosterChange, TenantView};
use crate::metrics as keys;

/// A decoded webhook event the store knows how to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    ParticipantJoined {
        meeting_id: String,
        topic: String,
        participant_key: String,
        display_name: String,
    },
    ParticipantLeft {
        meeting_id: String,
        participant_key: String,
    },
    MeetingEnded {
        meeting_id: String,
    },
    /// Carries the event type string for logging
    Unsupported(String),
}

impl WebhookEvent {
    pub fn from_envelope(envelope: &WebhookEnvelope) -> Self {
        let object = &envelope.payload.object;
        match envelope.event_type() {
            EventType::ParticipantJoined => Self::joined(&object.uuid, &object.topic, &object.participant),
            EventType::ParticipantLeft => Self::ParticipantLeft {
                meeting_id: object.uuid.clone(),
                participant_key: object.participant.key().to_string(),
            },
            EventType::MeetingEnded => Self::MeetingEnded {
                meeting_id: object.uuid.clone(),
            },
            EventType::UrlValidation | EventType::Other(_) => Self::Unsupported(envelope.event.clone()),
        }
    }

    fn joined(meeting_id: &str, topic: &str, participant: &Participant) -> Self {
        Self::ParticipantJoined {
            meeting_id: meeting_id.to_string(),
            topic: topic.to_string(),
            participant_key: participant.key().to_string(),
            display_name: participant.user_name.clone(),
        }
    }

    fn label(&self) -> &str {
        match self {
            Self::ParticipantJoined { .. } => "participant_joined",
            Self::ParticipantLeft { .. } => "participant_left",
            Self::MeetingEnded { .. } => "meeting_ended",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

/// What viewers need to hear about after an event was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeDescription {
    Joined { name: String },
    Left { name: String },
    /// Viewers must reload the full list
    Reset,
    NoOp,
}

/// Applies webhook events to the [`MeetingStore`]
#[derive(Clone)]
pub struct EventProcessor {
    store: Arc<MeetingStore>,
}

impl EventProcessor {
    pub fn new(store: Arc<MeetingStore>) -> Self {
        Self { store }
    }

    /// Apply `event` for `tenant` and describe the visible change.
    ///
    /// Events are applied in call order; out-of-order delivery by the
    /// provider results in last-applied-wins.
    pub fn process(&self, tenant: &str, event: &WebhookEvent) -> ChangeDescription {
        self.process_then(tenant, event, |_, _| ()).0
    }

    /// Apply `event` and run `publish` before the tenant's write lock is
    /// released.
    ///
    /// Publishes for one tenant therefore happen in exactly the order the
    /// changes were applied. `publish` must not call back into the store for
    /// the same tenant; it reads the post-change state through the view.
    /// Unsupported events never take the lock and yield `R::default()`.
    pub fn process_then<R: Default>(
        &self,
        tenant: &str,
        event: &WebhookEvent,
        publish: impl FnOnce(&ChangeDescription, &TenantView<'_>) -> R,
    ) -> (ChangeDescription, R) {
        counter!(keys::WEBHOOK_RECEIVED, "event" => event.label().to_string()).increment(1);

        if let WebhookEvent::Unsupported(event_type) = event {
            debug!(tenant, event_type = %event_type, "ignoring unsupported event");
            counter!(keys::WEBHOOK_IGNORED).increment(1);
            return (ChangeDescription::NoOp, R::default());
        }

        self.store.ensure_tenant(tenant);

        self.store.with_tenant_mut(tenant, |view| {
            let change = apply_event(view, event);
            debug!(tenant, event = event.label(), ?change, "applied webhook event");
            let published = publish(&change, view);
            (change, published)
        })
    }
}

fn apply_event(view: &mut TenantView<'_>, event: &WebhookEvent) -> ChangeDescription {
    match event {
        WebhookEvent::ParticipantJoined {
            meeting_id,
            topic,
            participant_key,
            display_name,
        } => {
            let change = view.join(meeting_id, participant_key, display_name, topic);
            delta(change, |name| ChangeDescription::Joined { name })
        },
        WebhookEvent::ParticipantLeft {
            meeting_id,
            participant_key,
        } => match view.leave(meeting_id, participant_key) {
            Some(change) => delta(change, |name| ChangeDescription::Left { name }),
            None => ChangeDescription::NoOp,
        },
        WebhookEvent::MeetingEnded { meeting_id } => {
            if view.end(meeting_id) {
                ChangeDescription::Reset
            } else {
                ChangeDescription::NoOp
            }
        },
        WebhookEvent::Unsupported(_) => ChangeDescription::NoOp,
    }
}

// A delta only makes sense against the roster viewers currently show. A
// rejoin replaces a name they already list, so it needs the full list too.
fn delta(change: RosterChange, make: impl FnOnce(String) -> ChangeDescription) -> ChangeDescription {
    if change.switched_meeting || change.rejoined {
        ChangeDescription::Reset
    } else {
        make(change.display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_common::{MeetingObject, WebhookPayload};

    fn envelope(event: &str, uuid: &str, user_id: &str, user_name: &str) -> WebhookEnvelope {
        WebhookEnvelope {
            event: event.to_string(),
            payload: WebhookPayload {
                account_id: "T1".to_string(),
                object: MeetingObject {
                    id: "1".to_string(),
                    uuid: uuid.to_string(),
                    topic: "Topic".to_string(),
                    participant: Participant {
                        user_id: user_id.to_string(),
                        user_name: user_name.to_string(),
                        email: String::new(),
                    },
                },
                plain_token: None,
            },
        }
    }

    fn setup() -> (EventProcessor, Arc<MeetingStore>) {
        let store = Arc::new(MeetingStore::new());
        (EventProcessor::new(Arc::clone(&store)), store)
    }

    fn apply(processor: &EventProcessor, event: &str, uuid: &str, user_id: &str, user_name: &str) -> ChangeDescription {
        let event = WebhookEvent::from_envelope(&envelope(event, uuid, user_id, user_name));
        processor.process("T1", &event)
    }

    #[test]
    fn test_from_envelope_uses_instance_uuid() {
        let event = WebhookEvent::from_envelope(&envelope("meeting.participant_joined", "abc==", "7", "Ann"));
        assert_eq!(
            event,
            WebhookEvent::ParticipantJoined {
                meeting_id: "abc==".to_string(),
                topic: "Topic".to_string(),
                participant_key: "7".to_string(),
                display_name: "Ann".to_string(),
            }
        );
    }

    #[test]
    fn test_url_validation_is_not_a_state_event() {
        let event = WebhookEvent::from_envelope(&envelope("endpoint.url_validation", "", "", ""));
        assert!(matches!(event, WebhookEvent::Unsupported(_)));
    }

    #[test]
    fn test_join_and_leave_produce_deltas() {
        let (processor, _store) = setup();

        let joined = apply(&processor, "meeting.participant_joined", "M1", "7", "Ann");
        assert_eq!(joined, ChangeDescription::Joined { name: "Ann".to_string() });

        let left = apply(&processor, "meeting.participant_left", "M1", "7", "Ann");
        assert_eq!(left, ChangeDescription::Left { name: "Ann".to_string() });
    }

    #[test]
    fn test_leave_for_unknown_participant_is_noop() {
        let (processor, store) = setup();
        let change = apply(&processor, "meeting.participant_left", "M1", "99", "Ghost");

        assert_eq!(change, ChangeDescription::NoOp);
        assert!(store.snapshot_latest_meeting("T1").is_none());
    }

    #[test]
    fn test_meeting_ended_resets() {
        let (processor, store) = setup();
        apply(&processor, "meeting.participant_joined", "M1", "7", "Ann");

        assert_eq!(apply(&processor, "meeting.ended", "M1", "", ""), ChangeDescription::Reset);
        assert!(store.snapshot_latest_meeting("T1").unwrap().participants.is_empty());

        assert_eq!(apply(&processor, "meeting.ended", "unknown", "", ""), ChangeDescription::NoOp);
    }

    #[test]
    fn test_unknown_event_type_does_not_touch_state() {
        let (processor, store) = setup();
        let change = apply(&processor, "meeting.sharing_started", "M1", "7", "Ann");

        assert_eq!(change, ChangeDescription::NoOp);
        assert_eq!(store.tenant_count(), 0);
    }

    #[test]
    fn test_first_event_initializes_tenant() {
        let (processor, store) = setup();
        assert_eq!(store.tenant_count(), 0);

        apply(&processor, "meeting.participant_joined", "M1", "7", "Ann");
        assert_eq!(store.tenant_count(), 1);
    }

    #[test]
    fn test_switching_meeting_resets_viewers() {
        let (processor, _store) = setup();
        apply(&processor, "meeting.participant_joined", "M1", "7", "Ann");

        let change = apply(&processor, "meeting.participant_joined", "M2", "8", "Bob");
        assert_eq!(change, ChangeDescription::Reset);
    }

    #[test]
    fn test_anonymous_join_named_placeholder() {
        let (processor, _store) = setup();
        let change = apply(&processor, "meeting.participant_joined", "M1", "", "");
        assert_eq!(change, ChangeDescription::Joined { name: "Anonymous".to_string() });
    }

    #[test]
    fn test_publish_sees_post_change_state() {
        let (processor, _store) = setup();
        let event = WebhookEvent::from_envelope(&envelope("meeting.participant_joined", "M1", "7", "Ann"));

        let (change, seen) = processor.process_then("T1", &event, |change, view| {
            assert_eq!(change, &ChangeDescription::Joined { name: "Ann".to_string() });
            view.latest_snapshot().map(|snapshot| snapshot.participants)
        });

        assert_eq!(change, ChangeDescription::Joined { name: "Ann".to_string() });
        assert_eq!(seen, Some(vec!["Ann".to_string()]));
    }

    #[test]
    fn test_unsupported_event_skips_publish() {
        let (processor, _store) = setup();
        let event = WebhookEvent::Unsupported("meeting.sharing_started".to_string());

        let (change, called) = processor.process_then("T1", &event, |_, _| true);
        assert_eq!(change, ChangeDescription::NoOp);
        assert!(!called);
    }

    #[test]
    fn test_rejoin_without_leave_resets() {
        let (processor, _store) = setup();
        apply(&processor, "meeting.participant_joined", "M1", "7", "Ann");

        let change = apply(&processor, "meeting.participant_joined", "M1", "7", "Ann (phone)");
        assert_eq!(change, ChangeDescription::Reset);
    }
}
