//! Verify endpoint methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes an operation call, the full sequence of
//! requests it must emit (method, path, parameter pairs, file parts), any
//! simulated responses to replay, and the expected result or error. Files
//! are grouped by endpoint family: users, topics, admin, misc.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use discourse_core::{ApiError, DiscourseClient, HttpRequest, HttpResponse, Transport};
use serde_json::Value;

const BASE_URL: &str = "http://testhost";

/// Records every request and replays queued responses, defaulting to an
/// empty JSON object.
#[derive(Default)]
struct RecordingTransport {
    requests: Mutex<Vec<HttpRequest>>,
    responses: Mutex<VecDeque<HttpResponse>>,
}

impl RecordingTransport {
    fn queue(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    fn recorded(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        let queued = self.responses.lock().unwrap().pop_front();
        Ok(queued.unwrap_or_else(|| HttpResponse {
            status: 200,
            headers: vec![(
                "content-type".to_string(),
                "application/json; charset=utf-8".to_string(),
            )],
            body: "{}".to_string(),
        }))
    }
}

fn string_pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .map(|pairs| {
            pairs
                .iter()
                .map(|pair| {
                    let pair = pair.as_array().unwrap();
                    (
                        pair[0].as_str().unwrap().to_string(),
                        pair[1].as_str().unwrap().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Dispatch one vector case to the named client method.
fn invoke(client: &DiscourseClient, case: &Value) -> Result<Value, ApiError> {
    let op = case["op"].as_str().unwrap();
    let args = &case["args"];
    let s = |key: &str| args[key].as_str().unwrap();
    let n = |key: &str| args[key].as_u64().unwrap();
    let fields = string_pairs(&args["fields"]);
    let field_refs: Vec<(&str, &str)> = fields
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();

    match op {
        "user" => client.user(s("username")),
        "user_by_id" => client.user_by_id(n("id")),
        "create_user" => {
            client.create_user(s("name"), s("username"), s("email"), s("password"), &field_refs)
        }
        "update_email" => client.update_email(s("username"), s("email")),
        "update_username" => client.update_username(s("username"), s("new_username")),
        "update_user" => client.update_user(s("username"), &field_refs),
        "update_avatar_from_url" => client.update_avatar_from_url(s("username"), s("avatar_url")),
        "update_avatar_image" => {
            client.update_avatar_image(s("username"), s("filename"), s("data").as_bytes().to_vec())
        }
        "toggle_gravatar" => {
            client.toggle_gravatar(s("username"), args["use_uploaded"].as_bool().unwrap())
        }
        "pick_avatar" => client.pick_avatar(s("username")),
        "set_preference" => client.set_preference(args["username"].as_str(), &field_refs),
        "hot_topics" => client.hot_topics(),
        "latest_topics" => client.latest_topics(),
        "new_topics" => client.new_topics(),
        "topic" => client.topic(s("slug"), n("id")),
        "topics_by" => client.topics_by(s("username")),
        "invite_user_to_topic" => client.invite_user_to_topic(s("email"), n("topic_id")),
        "private_messages" => client.private_messages(s("username")),
        "create_post" => client.create_post(s("content"), &field_refs),
        "latest_posts" => client.latest_posts(),
        "category_latest_topics" => client.category_latest_topics(s("slug")),
        "search" => client.search(s("term")),
        "categories" => client.categories(),
        "badges" => client.badges(),
        "user_badges" => client.user_badges(s("username")),
        "grant_badge_to" => client.grant_badge_to(s("username"), n("badge_id")),
        "site_settings" => client.site_settings(&field_refs).map(|()| Value::Null),
        "trust_level" => client.trust_level(s("username"), n("level") as u8),
        "suspend" => client.suspend(s("username"), n("duration") as u32, s("reason")),
        "unsuspend" => client.unsuspend(s("username")),
        "users" => client.users(),
        "list_users" => client.list_users(s("filter")),
        "log_out_user" => client.log_out_user(s("username")),
        "generate_api_key" => client.generate_api_key(s("username")),
        "anonymize_user" => client.anonymize_user(s("username")),
        "delete_user" => client.delete_user(s("username")),
        other => panic!("unknown op: {other}"),
    }
}

fn run_vectors(raw: &str) {
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let transport = Arc::new(RecordingTransport::default());
        let client = DiscourseClient::new(BASE_URL, "testuser", "testkey")
            .with_transport(transport.clone());

        if let Some(responses) = case["responses"].as_array() {
            for response in responses {
                transport.queue(HttpResponse {
                    status: response["status"].as_u64().unwrap() as u16,
                    headers: vec![(
                        "content-type".to_string(),
                        response["content_type"]
                            .as_str()
                            .unwrap_or("application/json; charset=utf-8")
                            .to_string(),
                    )],
                    body: response["body"].as_str().unwrap().to_string(),
                });
            }
        }

        let result = invoke(&client, case);

        // Verify the emitted request sequence.
        let recorded = transport.recorded();
        let expected = case["expected_requests"].as_array().unwrap();
        assert_eq!(recorded.len(), expected.len(), "{name}: request count");
        for (request, expectation) in recorded.iter().zip(expected) {
            assert_eq!(
                request.method.as_str(),
                expectation["method"].as_str().unwrap(),
                "{name}: method"
            );
            assert_eq!(
                request.url,
                format!("{BASE_URL}{}", expectation["path"].as_str().unwrap()),
                "{name}: path"
            );
            assert_eq!(request.header("Api-Key"), Some("testkey"), "{name}: api key");
            assert_eq!(
                request.header("Api-Username"),
                Some("testuser"),
                "{name}: api username"
            );
            assert_eq!(
                request.params,
                string_pairs(&expectation["params"]),
                "{name}: params"
            );
            if let Some(files) = expectation["files"].as_array() {
                assert_eq!(request.files.len(), files.len(), "{name}: file count");
                for (part, expected_part) in request.files.iter().zip(files) {
                    assert_eq!(
                        part.name,
                        expected_part["name"].as_str().unwrap(),
                        "{name}: file field name"
                    );
                    assert_eq!(
                        part.filename,
                        expected_part["filename"].as_str().unwrap(),
                        "{name}: filename"
                    );
                }
            }
        }

        // Verify the decoded result or the raised error.
        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            match expected_error["type"].as_str().unwrap() {
                "Http" => {
                    let status = expected_error["status"].as_u64().unwrap() as u16;
                    assert!(
                        matches!(err, ApiError::Http { status: got, .. } if got == status),
                        "{name}: expected HTTP {status}, got {err:?}"
                    );
                }
                "Deserialization" => {
                    assert!(
                        matches!(err, ApiError::Deserialization(_)),
                        "{name}: expected deserialization error, got {err:?}"
                    );
                }
                other => panic!("{name}: unknown expected_error: {other}"),
            }
        } else {
            let value = result.unwrap_or_else(|e| panic!("{name}: unexpected error {e}"));
            if let Some(expected_result) = case.get("expected_result") {
                assert_eq!(&value, expected_result, "{name}: result");
            }
        }
    }
}

#[test]
fn user_test_vectors() {
    run_vectors(include_str!("../../test-vectors/users.json"));
}

#[test]
fn topic_test_vectors() {
    run_vectors(include_str!("../../test-vectors/topics.json"));
}

#[test]
fn admin_test_vectors() {
    run_vectors(include_str!("../../test-vectors/admin.json"));
}

#[test]
fn misc_test_vectors() {
    run_vectors(include_str!("../../test-vectors/misc.json"));
}
