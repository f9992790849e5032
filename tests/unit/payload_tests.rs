//! Unit tests for inbound payload parsing and classification.

use serde_json::json;

use excels_autobot::models::payload::{
    ActionKind, BlockAction, EventEnvelope, InteractionPayload, OptionsRequest,
};
use excels_autobot::models::record::ScoreField;
use excels_autobot::week::WeekId;

fn week(raw: &str) -> WeekId {
    raw.parse().expect("week")
}

fn block_action(payload: serde_json::Value) -> BlockAction {
    match InteractionPayload::parse(&payload.to_string()).expect("parse") {
        InteractionPayload::BlockActions(actions) => actions.action().expect("action"),
        InteractionPayload::ViewSubmission(_) => panic!("expected block_actions"),
    }
}

fn block_action_err(payload: serde_json::Value) -> excels_autobot::AppError {
    match InteractionPayload::parse(&payload.to_string()).expect("parse") {
        InteractionPayload::BlockActions(actions) => actions.action().expect_err("must fail"),
        InteractionPayload::ViewSubmission(_) => panic!("expected block_actions"),
    }
}

#[test]
fn action_kinds_round_trip_their_wire_names() {
    for kind in [
        ActionKind::SelectEmployee,
        ActionKind::Unlink,
        ActionKind::SubmitScores,
        ActionKind::OpenNotes,
        ActionKind::PickScore,
    ] {
        assert_eq!(ActionKind::parse(kind.as_str()).expect("known"), kind);
    }
    assert_eq!(
        ActionKind::parse("dance").expect_err("unknown").kind(),
        "UnknownAction"
    );
}

#[test]
fn select_employee_decodes_the_option_value() {
    let action = block_action(json!({
        "type": "block_actions",
        "user": { "id": "U1" },
        "actions": [{
            "action_id": "select_employee",
            "selected_option": { "value": "{\"employeeId\":\"usrA\",\"employeeDisplayName\":\"Ana\"}" }
        }],
        "view": { "type": "home" }
    }));

    match action {
        BlockAction::SelectEmployee(identity) => {
            assert_eq!(identity.employee_id, "usrA");
            assert_eq!(identity.employee_display_name, "Ana");
        }
        other => panic!("unexpected action: {other:?}"),
    }
}

#[test]
fn submit_scores_carries_the_button_value() {
    let action = block_action(json!({
        "type": "block_actions",
        "user": { "id": "U1" },
        "actions": [{ "action_id": "submit_scores", "value": "U2" }]
    }));
    assert_eq!(
        action,
        BlockAction::SubmitScores {
            target_user: Some("U2".into())
        }
    );

    let action = block_action(json!({
        "type": "block_actions",
        "user": { "id": "U1" },
        "actions": [{ "action_id": "submit_scores", "value": "" }]
    }));
    assert_eq!(action, BlockAction::SubmitScores { target_user: None });
}

#[test]
fn open_notes_reads_week_from_block_id() {
    let action = block_action(json!({
        "type": "block_actions",
        "user": { "id": "U1" },
        "trigger_id": "trig",
        "actions": [{ "action_id": "open_notes", "block_id": "week:202642:Notes" }]
    }));
    assert_eq!(
        action,
        BlockAction::OpenNotes {
            week: week("202642")
        }
    );
}

#[test]
fn pick_score_collects_every_selected_field() {
    let action = block_action(json!({
        "type": "block_actions",
        "user": { "id": "U1" },
        "actions": [{ "action_id": "pick_score", "block_id": "week:202642:Team" }],
        "state": { "values": {
            "week:202642:Performance": { "pick_score": { "selected_option": { "value": "3" } } },
            "week:202642:Team": { "pick_score": { "selected_option": { "value": "4" } } },
            "week:202642:Environment": { "pick_score": { "selected_option": null } },
            "week:202642:Growth": { "pick_score": {} }
        } }
    }));

    let BlockAction::PickScore { week: picked, patch } = action else {
        panic!("expected pick_score");
    };
    assert_eq!(picked, week("202642"));
    assert_eq!(patch.scores.len(), 2);
    assert_eq!(patch.scores.get(&ScoreField::Performance).map(String::as_str), Some("3"));
    assert_eq!(patch.scores.get(&ScoreField::Team).map(String::as_str), Some("4"));
    assert!(patch.notes.is_none());
}

#[test]
fn pick_score_falls_back_to_view_state() {
    let action = block_action(json!({
        "type": "block_actions",
        "user": { "id": "U1" },
        "actions": [{ "action_id": "pick_score" }],
        "view": { "type": "home", "state": { "values": {
            "week:202641:Growth": { "pick_score": { "selected_option": { "value": "1" } } }
        } } }
    }));

    let BlockAction::PickScore { week: picked, patch } = action else {
        panic!("expected pick_score");
    };
    assert_eq!(picked, week("202641"));
    assert_eq!(patch.scores.get(&ScoreField::Growth).map(String::as_str), Some("1"));
}

#[test]
fn pick_score_rejects_out_of_range_values() {
    let err = block_action_err(json!({
        "type": "block_actions",
        "user": { "id": "U1" },
        "actions": [{ "action_id": "pick_score" }],
        "state": { "values": {
            "week:202642:Growth": { "pick_score": { "selected_option": { "value": "4" } } }
        } }
    }));
    assert_eq!(err.kind(), "PayloadError");
}

#[test]
fn pick_score_rejects_foreign_block_ids() {
    let err = block_action_err(json!({
        "type": "block_actions",
        "user": { "id": "U1" },
        "actions": [{ "action_id": "pick_score" }],
        "state": { "values": {
            "somethingElse": { "pick_score": { "selected_option": { "value": "1" } } }
        } }
    }));
    assert_eq!(err.kind(), "PayloadError");
}

#[test]
fn unknown_action_id_is_reported_as_such() {
    let err = block_action_err(json!({
        "type": "block_actions",
        "user": { "id": "U1" },
        "actions": [{ "action_id": "dance" }]
    }));
    assert_eq!(err.kind(), "UnknownAction");
}

#[test]
fn view_submission_yields_week_and_notes() {
    let payload = InteractionPayload::parse(
        &json!({
            "type": "view_submission",
            "user": { "id": "U1" },
            "view": {
                "type": "modal",
                "blocks": [{ "block_id": "week:202642:Notes" }],
                "state": { "values": {
                    "week:202642:Notes": { "notes_input": { "value": "shipped it" } }
                } }
            }
        })
        .to_string(),
    )
    .expect("parse");

    assert_eq!(payload.user_id(), "U1");
    assert!(!payload.is_from_home());
    let InteractionPayload::ViewSubmission(submission) = payload else {
        panic!("expected view_submission");
    };
    let (picked, notes) = submission.notes().expect("notes");
    assert_eq!(picked, week("202642"));
    assert_eq!(notes, "shipped it");
}

#[test]
fn cleared_notes_become_an_empty_string() {
    let payload = InteractionPayload::parse(
        &json!({
            "type": "view_submission",
            "user": { "id": "U1" },
            "view": {
                "type": "modal",
                "blocks": [{ "block_id": "week:202642:Notes" }],
                "state": { "values": { "week:202642:Notes": { "notes_input": { "value": null } } } }
            }
        })
        .to_string(),
    )
    .expect("parse");
    let InteractionPayload::ViewSubmission(submission) = payload else {
        panic!("expected view_submission");
    };
    assert_eq!(submission.notes().expect("notes").1, "");
}

#[test]
fn home_interactions_are_detected() {
    let payload = InteractionPayload::parse(
        &json!({
            "type": "block_actions",
            "user": { "id": "U1" },
            "actions": [{ "action_id": "unlink" }],
            "view": { "type": "home" }
        })
        .to_string(),
    )
    .expect("parse");
    assert!(payload.is_from_home());
}

#[test]
fn unknown_interaction_type_is_a_payload_error() {
    let err = InteractionPayload::parse(r#"{"type":"shortcut","user":{"id":"U1"}}"#)
        .expect_err("must fail");
    assert_eq!(err.kind(), "PayloadError");
}

#[test]
fn url_verification_keeps_the_challenge() {
    let envelope =
        EventEnvelope::parse(br#"{"type":"url_verification","challenge":"abc123"}"#).expect("parse");
    assert_eq!(
        envelope,
        EventEnvelope::UrlVerification {
            challenge: "abc123".into()
        }
    );
}

#[test]
fn app_home_opened_names_the_user() {
    let envelope = EventEnvelope::parse(
        br#"{"type":"event_callback","event":{"type":"app_home_opened","user":"U9","tab":"home"}}"#,
    )
    .expect("parse");
    assert_eq!(envelope, EventEnvelope::AppHomeOpened { user: "U9".into() });
}

#[test]
fn other_events_are_unrecognized() {
    let err = EventEnvelope::parse(
        br#"{"type":"event_callback","event":{"type":"message","user":"U9"}}"#,
    )
    .expect_err("must fail");
    assert_eq!(err.kind(), "UnrecognizedEvent");

    let err = EventEnvelope::parse(br#"{"type":"app_rate_limited"}"#).expect_err("must fail");
    assert_eq!(err.kind(), "UnrecognizedEvent");
}

#[test]
fn malformed_event_body_is_a_payload_error() {
    let err = EventEnvelope::parse(b"not json").expect_err("must fail");
    assert_eq!(err.kind(), "PayloadError");
}

#[test]
fn options_request_defaults_empty_query() {
    let request = OptionsRequest::parse(r#"{"action_id":"select_employee"}"#).expect("parse");
    assert_eq!(request.action_id, "select_employee");
    assert_eq!(request.value, "");
}
