mod common;

use axum::http::StatusCode;
use common::{
    file_count, spawn_app, wav_bytes, Script, Transcript, MENTEE_HINDI, MENTEE_NO_PREFERENCE,
    MENTOR_AWAY, MENTOR_MEERA, MENTOR_RAVI,
};
use mentorline_types::TRANSCRIPT_NOT_FOUND;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn health_reports_version() {
    let app = spawn_app(Script::default());
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn languages_are_listed_in_catalogue_order() {
    let app = spawn_app(Script::default());
    let (status, body) = app.get("/api/languages").await;
    assert_eq!(status, StatusCode::OK);
    let languages = body.as_array().unwrap();
    assert_eq!(languages.len(), 11);
    assert_eq!(languages[0]["code"], "en-IN");
    assert_eq!(languages[1]["code"], "hi-IN");
}

#[tokio::test]
async fn matched_query_fans_out_to_available_mentors() {
    let app = spawn_app(Script::default());
    let mentee = MENTEE_HINDI.to_string();

    let (status, body) = app
        .post_multipart(
            "/api/query",
            &[("mentee_id", &mentee), ("language_id", "2")],
            Some(("question.wav", &wav_bytes())),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["career"], "JEE");
    assert_eq!(body["transcription"], "How do I prepare for JEE physics?");

    let mut matched: Vec<i64> = body["matchedMentors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    matched.sort();
    assert_eq!(matched, vec![MENTOR_RAVI, MENTOR_MEERA]);

    assert_eq!(
        app.classifier.inputs(),
        vec!["How do I prepare for JEE physics?".to_string()]
    );

    let query_id = body["query_id"].as_i64().unwrap();
    let (status, pending) = app
        .get(&format!("/api/requests/mentor/{MENTOR_RAVI}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        pending,
        json!([{
            "id": query_id,
            "career": "JEE",
            "menteeName": "Asha",
            "transcription": "How do I prepare for JEE physics?"
        }])
    );

    let (_, away) = app
        .get(&format!("/api/requests/mentor/{MENTOR_AWAY}"))
        .await;
    assert_eq!(away, json!([]));
}

#[tokio::test]
async fn unmatched_query_goes_to_the_chatbot() {
    let app = spawn_app(Script {
        label: "UPSC".to_string(),
        ..Script::default()
    });
    let mentee = MENTEE_NO_PREFERENCE.to_string();

    let (status, body) = app
        .post_multipart(
            "/api/query",
            &[("mentee_id", &mentee)],
            Some(("question.webm", b"webm-bytes")),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["status"], "chatbot");
    assert_eq!(body["matchedMentors"], json!([]));

    let (_, pending) = app
        .get(&format!("/api/requests/mentor/{MENTOR_RAVI}"))
        .await;
    assert_eq!(pending, json!([]));
}

#[tokio::test]
async fn silence_is_classified_as_the_not_found_sentinel() {
    let app = spawn_app(Script {
        transcript: Transcript::Silent,
        label: "General".to_string(),
        ..Script::default()
    });
    let mentee = MENTEE_HINDI.to_string();

    let (status, body) = app
        .post_multipart(
            "/api/query",
            &[("mentee_id", &mentee)],
            Some(("quiet.wav", &wav_bytes())),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["transcription"], TRANSCRIPT_NOT_FOUND);
    assert_eq!(app.classifier.inputs(), vec![TRANSCRIPT_NOT_FOUND.to_string()]);
}

#[tokio::test]
async fn unknown_mentee_is_rejected_before_upstream_calls() {
    let app = spawn_app(Script::default());

    let (status, body) = app
        .post_multipart(
            "/api/query",
            &[("mentee_id", "999")],
            Some(("question.wav", &wav_bytes())),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
    assert!(app.classifier.inputs().is_empty());
}

#[tokio::test]
async fn malformed_uploads_are_bad_requests() {
    let app = spawn_app(Script::default());

    let (status, body) = app
        .post_multipart("/api/query", &[("mentee_id", "1")], None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "bad_request");

    let (status, _) = app
        .post_multipart("/api/query", &[], Some(("q.wav", &wav_bytes())))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_multipart(
            "/api/query",
            &[("mentee_id", "asha")],
            Some(("q.wav", &wav_bytes())),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_multipart("/api/query", &[("mentee_id", "1")], Some(("q.wav", b"")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upstream_failures_map_to_gateway_errors() {
    let app = spawn_app(Script {
        transcript: Transcript::Unavailable,
        ..Script::default()
    });
    let (status, body) = app
        .post_multipart(
            "/api/query",
            &[("mentee_id", "1")],
            Some(("q.wav", &wav_bytes())),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "upstream_unavailable");

    let app = spawn_app(Script {
        transcript: Transcript::Timeout,
        ..Script::default()
    });
    let (status, body) = app
        .post_multipart(
            "/api/query",
            &[("mentee_id", "1")],
            Some(("q.wav", &wav_bytes())),
        )
        .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["kind"], "upstream_timeout");
}

#[tokio::test]
async fn spooled_query_audio_is_removed() {
    let app = spawn_app(Script::default());
    let (status, _) = app
        .post_multipart(
            "/api/query",
            &[("mentee_id", "1")],
            Some(("q.wav", &wav_bytes())),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..100 {
        if file_count(&app.spool_dir()) == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(file_count(&app.spool_dir()), 0);
}

#[tokio::test]
async fn first_accept_wins_and_is_assigned() {
    let app = spawn_app(Script::default());
    let (_, submitted) = app
        .post_multipart(
            "/api/query",
            &[("mentee_id", "1")],
            Some(("q.wav", &wav_bytes())),
        )
        .await;
    let query_id = submitted["query_id"].as_i64().unwrap();

    let (status, assignment) = app
        .get(&format!("/api/assigned-mentor/{MENTEE_HINDI}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assignment, json!({"status": "pending", "query_id": query_id}));

    let (status, body) = app
        .post_json(
            "/api/respond",
            json!({"queryId": query_id, "mentorId": MENTOR_RAVI, "action": "accept"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "outcome": "accepted"}));

    // Losing the race is a normal response, not an error status.
    let (status, body) = app
        .post_json(
            "/api/respond",
            json!({"queryId": query_id, "mentorId": MENTOR_MEERA, "action": "accept"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": false, "outcome": "superseded"}));

    let (_, body) = app
        .post_json(
            "/api/respond",
            json!({"queryId": query_id, "mentorId": MENTOR_RAVI, "action": "accept"}),
        )
        .await;
    assert_eq!(body, json!({"success": true, "outcome": "already_accepted"}));

    let (_, body) = app
        .post_json(
            "/api/respond",
            json!({"queryId": query_id, "mentorId": MENTOR_RAVI, "action": "reject"}),
        )
        .await;
    assert_eq!(body, json!({"success": false, "outcome": "locked"}));

    let (_, assignment) = app
        .get(&format!("/api/assigned-mentor/{MENTEE_HINDI}"))
        .await;
    assert_eq!(
        assignment,
        json!({
            "status": "assigned",
            "query_id": query_id,
            "room_id": format!("query-{query_id}"),
            "mentor": {"id": MENTOR_RAVI, "name": "Ravi"}
        })
    );

    let (_, pending) = app
        .get(&format!("/api/requests/mentor/{MENTOR_MEERA}"))
        .await;
    assert_eq!(pending, json!([]));
}

#[tokio::test]
async fn reject_keeps_the_query_open() {
    let app = spawn_app(Script::default());
    let (_, submitted) = app
        .post_multipart(
            "/api/query",
            &[("mentee_id", "1")],
            Some(("q.wav", &wav_bytes())),
        )
        .await;
    let query_id = submitted["query_id"].as_i64().unwrap();

    let (_, body) = app
        .post_json(
            "/api/respond",
            json!({"queryId": query_id, "mentorId": MENTOR_MEERA, "action": "reject"}),
        )
        .await;
    assert_eq!(body, json!({"success": true, "outcome": "rejected"}));

    let (_, pending) = app
        .get(&format!("/api/requests/mentor/{MENTOR_MEERA}"))
        .await;
    assert_eq!(pending, json!([]));

    let (_, assignment) = app
        .get(&format!("/api/assigned-mentor/{MENTEE_HINDI}"))
        .await;
    assert_eq!(assignment["status"], "pending");
}

#[tokio::test]
async fn respond_validates_its_input() {
    let app = spawn_app(Script::default());

    let (status, body) = app
        .post_json(
            "/api/respond",
            json!({"queryId": 1, "mentorId": MENTOR_RAVI, "action": "maybe"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "bad_request");

    let (status, _) = app.post_raw_json("/api/respond", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post_json(
            "/api/respond",
            json!({"queryId": 4242, "mentorId": MENTOR_RAVI, "action": "accept"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn assignment_for_mentee_without_queries_is_not_found() {
    let app = spawn_app(Script::default());
    let (status, body) = app
        .get(&format!("/api/assigned-mentor/{MENTEE_NO_PREFERENCE}"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
    assert!(body["error"]["message"].is_string());
}
