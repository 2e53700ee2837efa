//! Full client lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the client through
//! registration, lookups, preference changes, topics, search, and the admin
//! actions over real HTTP with the default ureq transport. Validates the
//! round trip end-to-end: URL building, auth headers, form and multipart
//! encoding, status interpretation, and JSON decoding.

use discourse_core::{ApiError, DiscourseClient};

fn start_mock_server() -> std::net::SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

#[test]
fn forum_lifecycle() {
    let addr = start_mock_server();
    let host = format!("http://{addr}");
    let client = DiscourseClient::new(&host, "admin", "integration-test-key");

    // Step 1: requests without credentials are refused by the server.
    let unauthenticated = DiscourseClient::new(&host, "admin", "");
    let err = unauthenticated.latest_topics().unwrap_err();
    assert!(matches!(err, ApiError::Http { status: 403, .. }));

    // Step 2: register the acting admin and a second user (honeypot GET +
    // registration POST each).
    let created = client
        .create_user("Admin", "admin", "admin@example.com", "notapassword", &[])
        .unwrap();
    assert_eq!(created["success"], true);

    let created = client
        .create_user("New User", "newuser", "new@example.com", "notapassword", &[])
        .unwrap();
    assert_eq!(created["success"], true);
    let user_id = created["user_id"].as_u64().unwrap();

    // Step 3: look the user up by username and by numeric id.
    let fetched = client.user("newuser").unwrap();
    assert_eq!(fetched["user"]["username"], "newuser");

    let by_id = client.user_by_id(user_id).unwrap();
    assert_eq!(by_id["username"], "newuser");

    // Step 4: preference updates, including the own-username default.
    client.update_email("newuser", "fresh@example.com").unwrap();
    let fetched = client.user("newuser").unwrap();
    assert_eq!(fetched["user"]["email"], "fresh@example.com");

    client
        .set_preference(None, &[("name", "Renamed Admin")])
        .unwrap();
    let own = client.user("admin").unwrap();
    assert_eq!(own["user"]["name"], "Renamed Admin");

    // Step 5: avatar endpoints — URL-sourced, multipart upload, toggle, pick.
    client
        .update_avatar_from_url("newuser", "http://example.com/cat.png")
        .unwrap();
    client
        .update_avatar_image("newuser", "cat.png", b"not-a-real-png".to_vec())
        .unwrap();
    let toggled = client.toggle_gravatar("newuser", true).unwrap();
    assert_eq!(toggled["use_uploaded_avatar"], true);
    client.pick_avatar("newuser").unwrap();

    // Step 6: start a topic and find it through every listing the client has.
    let post = client
        .create_post("First post body", &[("title", "Hello Forum World")])
        .unwrap();
    let topic_id = post["topic_id"].as_u64().unwrap();
    let slug = post["topic_slug"].as_str().unwrap().to_string();

    let latest = client.latest_topics().unwrap();
    assert_eq!(latest["topic_list"]["topics"].as_array().unwrap().len(), 1);

    let mine = client.topics_by("admin").unwrap();
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["title"], "Hello Forum World");

    let topic = client.topic(&slug, topic_id).unwrap();
    assert_eq!(topic["title"], "Hello Forum World");

    let found = client.search("forum").unwrap();
    assert_eq!(found["topics"].as_array().unwrap().len(), 1);

    let posts = client.latest_posts().unwrap();
    assert_eq!(posts["latest_posts"].as_array().unwrap().len(), 1);

    // Step 7: categories come back unwrapped to the inner array.
    let categories = client.categories().unwrap();
    assert!(categories.is_array());
    assert_eq!(categories[0]["slug"], "uncategorized");

    // Step 8: invite someone to the topic.
    client
        .invite_user_to_topic("guest@example.com", topic_id)
        .unwrap();

    // Step 9: badges.
    let badges = client.badges().unwrap();
    assert!(badges["badges"].as_array().unwrap().len() >= 2);

    client.grant_badge_to("newuser", 41).unwrap();
    let user_badges = client.user_badges("newuser").unwrap();
    assert_eq!(user_badges["user_badges"].as_array().unwrap().len(), 1);

    // Step 10: admin actions against the user.
    client.trust_level("newuser", 2).unwrap();
    let fetched = client.user("newuser").unwrap();
    assert_eq!(fetched["user"]["trust_level"], 2);

    client.suspend("newuser", 600, "because").unwrap();
    let suspended = client.list_users("suspended").unwrap();
    assert_eq!(suspended.as_array().unwrap().len(), 1);

    client.unsuspend("newuser").unwrap();
    let suspended = client.list_users("suspended").unwrap();
    assert!(suspended.as_array().unwrap().is_empty());

    let key = client.generate_api_key("newuser").unwrap();
    assert!(!key["api_key"]["key"].as_str().unwrap().is_empty());

    client.log_out_user("newuser").unwrap();

    let active = client.users().unwrap();
    assert_eq!(active.as_array().unwrap().len(), 2);

    // Step 11: anonymize, delete under the anonymous name, and the old
    // username lookup raises 404.
    let anonymized = client.anonymize_user("newuser").unwrap();
    let anonymous = anonymized["username"].as_str().unwrap().to_string();
    assert_ne!(anonymous, "newuser");

    client.delete_user(&anonymous).unwrap();
    let err = client.user("newuser").unwrap_err();
    assert!(matches!(err, ApiError::Http { status: 404, .. }));
}
