//! In-memory stand-in for the subset of the Discourse API the client
//! exercises: signup honeypot, user registration and preferences, topics and
//! posts, categories, search, and the admin user actions. Every route sits
//! behind an `Api-Key` / `Api-Username` header guard so tests can prove the
//! client authenticates each request.
//!
//! Discourse suffixes many paths with `.json` on the identifier segment
//! (`/users/someuser.json`); handlers strip that suffix from the captured
//! path parameter.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, RawForm, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Honeypot pair served by `/users/hp.json`. Registration must echo `value`
/// as `password_confirmation` and `challenge` reversed.
pub const HONEYPOT_VALUE: &str = "3d4c50bff0f2c9606e26";
pub const HONEYPOT_CHALLENGE: &str = "8b5f3dba92cf662015c6";

#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub name: String,
    pub email: String,
    pub active: bool,
    pub trust_level: u8,
    pub suspended: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct Topic {
    pub id: u64,
    pub slug: String,
    pub title: String,
    pub author: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Post {
    pub id: u64,
    pub topic_id: u64,
    pub raw: String,
    pub username: String,
}

#[derive(Deserialize)]
pub struct RegisterUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub challenge: String,
}

#[derive(Deserialize)]
struct EmailForm {
    email: String,
}

#[derive(Deserialize)]
struct UsernameForm {
    new_username: String,
}

#[derive(Deserialize)]
struct InviteForm {
    email: String,
    topic_id: String,
}

#[derive(Deserialize)]
struct CreatePostForm {
    raw: String,
    title: Option<String>,
    topic_id: Option<u64>,
}

#[derive(Deserialize)]
struct SearchQuery {
    term: String,
}

#[derive(Deserialize)]
struct TrustLevelForm {
    level: u8,
}

#[derive(Deserialize)]
struct SuspendForm {
    duration: u64,
    reason: String,
}

#[derive(Deserialize)]
struct GrantBadgeForm {
    username: String,
    badge_id: u64,
}

#[derive(Default)]
pub struct ForumState {
    users: HashMap<String, User>,
    topics: Vec<Topic>,
    posts: Vec<Post>,
    granted_badges: Vec<(String, u64)>,
    next_user_id: u64,
    next_topic_id: u64,
    next_post_id: u64,
}

pub type Db = Arc<RwLock<ForumState>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(ForumState {
        next_user_id: 1,
        next_topic_id: 1,
        next_post_id: 1,
        ..ForumState::default()
    }));
    Router::new()
        .route("/users/hp.json", get(honeypot))
        .route("/users", post(register_user))
        .route("/users/{username}", get(get_user).put(update_user))
        .route("/users/{username}/preferences/email", put(update_email))
        .route("/users/{username}/preferences/username", put(update_username))
        .route("/users/{username}/preferences/avatar", post(upload_avatar))
        .route("/users/{username}/preferences/avatar/toggle", put(toggle_avatar))
        .route("/users/{username}/preferences/avatar/pick", put(pick_avatar))
        .route("/latest.json", get(list_topics))
        .route("/hot.json", get(list_topics))
        .route("/new.json", get(list_topics))
        .route("/t/{slug}/invite.json", post(invite_to_topic))
        .route("/t/{slug}/{id}", get(get_topic))
        .route("/topics/created-by/{username}", get(topics_by))
        .route("/topics/private-messages/{username}", get(private_messages))
        .route("/posts", post(create_post))
        .route("/posts.json", get(latest_posts))
        .route("/c/{slug}/l/latest.json", get(list_topics))
        .route("/categories.json", get(categories))
        .route("/search.json", get(search))
        .route("/user_badges", post(grant_badge))
        .route("/user-badges/{username}", get(user_badges))
        .route("/admin/badges.json", get(badges))
        .route("/admin/users/list/{filter}", get(list_users))
        .route(
            "/admin/users/{username}",
            get(admin_user_by_id).delete(delete_user),
        )
        .route("/admin/users/{username}/trust_level", put(trust_level))
        .route("/admin/users/{username}/suspend", put(suspend_user))
        .route("/admin/users/{username}/unsuspend", put(unsuspend_user))
        .route("/admin/users/{username}/log_out", post(log_out_user))
        .route(
            "/admin/users/{username}/generate_api_key",
            post(generate_api_key),
        )
        .route("/admin/users/{username}/anonymize", put(anonymize_user))
        .layer(middleware::from_fn(
            |request: Request, next: Next| require_api_auth(request, next),
        ))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Reject any request missing the credential header pair.
async fn require_api_auth(
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let present = |name: &str| {
        request
            .headers()
            .get(name)
            .is_some_and(|value| !value.is_empty())
    };
    if !present("Api-Key") || !present("Api-Username") {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({
                "errors": ["You are not permitted to view the requested resource."],
                "error_type": "invalid_access"
            })),
        ));
    }
    drop(present);
    Ok(next.run(request).await)
}

/// Strip the `.json` suffix Discourse attaches to identifier segments.
fn bare(segment: &str) -> &str {
    segment.strip_suffix(".json").unwrap_or(segment)
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

// --- users ---

async fn honeypot() -> Json<Value> {
    Json(json!({"value": HONEYPOT_VALUE, "challenge": HONEYPOT_CHALLENGE}))
}

async fn register_user(State(db): State<Db>, Form(input): Form<RegisterUser>) -> Json<Value> {
    let expected_challenge: String = HONEYPOT_CHALLENGE.chars().rev().collect();
    if input.password_confirmation != HONEYPOT_VALUE
        || input.challenge != expected_challenge
        || input.password.is_empty()
    {
        return Json(json!({"success": false, "message": "Signup verification failed"}));
    }

    let mut state = db.write().await;
    let id = state.next_user_id;
    state.next_user_id += 1;
    let user = User {
        id,
        username: input.username.clone(),
        name: input.name,
        email: input.email,
        active: true,
        trust_level: 0,
        suspended: false,
    };
    state.users.insert(input.username, user);
    Json(json!({"success": true, "active": true, "user_id": id}))
}

async fn get_user(
    State(db): State<Db>,
    Path(username): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let state = db.read().await;
    state
        .users
        .get(bare(&username))
        .map(|user| Json(json!({"user": user})))
        .ok_or(StatusCode::NOT_FOUND)
}

/// PUT /users/{username} carries arbitrary preference fields, possibly none
/// at all, so the body is parsed leniently rather than through a typed form.
async fn update_user(
    State(db): State<Db>,
    Path(username): Path<String>,
    RawForm(body): RawForm,
) -> Result<Json<Value>, StatusCode> {
    let fields: HashMap<String, String> = url::form_urlencoded::parse(&body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut state = db.write().await;
    let user = state
        .users
        .get_mut(bare(&username))
        .ok_or(StatusCode::NOT_FOUND)?;
    if let Some(name) = fields.get("name") {
        user.name = name.clone();
    }
    if let Some(email) = fields.get("email") {
        user.email = email.clone();
    }
    Ok(Json(json!({"success": "OK"})))
}

async fn update_email(
    State(db): State<Db>,
    Path(username): Path<String>,
    Form(input): Form<EmailForm>,
) -> Result<Json<Value>, StatusCode> {
    let mut state = db.write().await;
    let user = state
        .users
        .get_mut(bare(&username))
        .ok_or(StatusCode::NOT_FOUND)?;
    user.email = input.email;
    Ok(Json(json!({"success": "OK"})))
}

async fn update_username(
    State(db): State<Db>,
    Path(username): Path<String>,
    Form(input): Form<UsernameForm>,
) -> Result<Json<Value>, StatusCode> {
    let mut state = db.write().await;
    let mut user = state
        .users
        .remove(bare(&username))
        .ok_or(StatusCode::NOT_FOUND)?;
    user.username = input.new_username.clone();
    state.users.insert(input.new_username.clone(), user);
    Ok(Json(json!({"success": "OK", "username": input.new_username})))
}

async fn upload_avatar(Path(_username): Path<String>) -> Json<Value> {
    Json(json!({"success": "OK"}))
}

async fn toggle_avatar(Path(_username): Path<String>, RawForm(body): RawForm) -> Json<Value> {
    let use_uploaded = url::form_urlencoded::parse(&body)
        .any(|(k, v)| k == "use_uploaded_avatar" && v == "true");
    Json(json!({"success": "OK", "use_uploaded_avatar": use_uploaded}))
}

async fn pick_avatar(Path(_username): Path<String>) -> Json<Value> {
    Json(json!({"success": "OK"}))
}

// --- topics & posts ---

async fn list_topics(State(db): State<Db>) -> Json<Value> {
    let state = db.read().await;
    Json(json!({"topic_list": {"topics": state.topics}}))
}

async fn get_topic(
    State(db): State<Db>,
    Path((slug, id)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let id: u64 = bare(&id).parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let state = db.read().await;
    state
        .topics
        .iter()
        .find(|topic| topic.id == id && topic.slug == slug)
        .map(|topic| {
            let posts: Vec<&Post> = state
                .posts
                .iter()
                .filter(|post| post.topic_id == id)
                .collect();
            Json(json!({
                "id": topic.id,
                "slug": topic.slug,
                "title": topic.title,
                "post_stream": {"posts": posts}
            }))
        })
        .ok_or(StatusCode::NOT_FOUND)
}

async fn invite_to_topic(
    Path(slug): Path<String>,
    Form(input): Form<InviteForm>,
) -> Result<Json<Value>, StatusCode> {
    // The topic id appears both in the path and the form; they must agree.
    if slug != input.topic_id {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(Json(json!({"success": "OK", "email": input.email})))
}

async fn topics_by(State(db): State<Db>, Path(username): Path<String>) -> Json<Value> {
    let state = db.read().await;
    let topics: Vec<&Topic> = state
        .topics
        .iter()
        .filter(|topic| topic.author == bare(&username))
        .collect();
    Json(json!({"topic_list": {"topics": topics}}))
}

async fn private_messages(Path(_username): Path<String>) -> Json<Value> {
    Json(json!({"topic_list": {"topics": []}}))
}

async fn create_post(
    State(db): State<Db>,
    headers: HeaderMap,
    Form(input): Form<CreatePostForm>,
) -> Result<Json<Value>, StatusCode> {
    // The auth guard guarantees the header is present; it names the actor.
    let username = headers
        .get("Api-Username")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let mut state = db.write().await;

    let topic_id = match (input.topic_id, &input.title) {
        (Some(id), _) => {
            if !state.topics.iter().any(|topic| topic.id == id) {
                return Err(StatusCode::NOT_FOUND);
            }
            id
        }
        (None, Some(title)) => {
            let id = state.next_topic_id;
            state.next_topic_id += 1;
            state.topics.push(Topic {
                id,
                slug: slugify(title),
                title: title.clone(),
                author: username.clone(),
            });
            id
        }
        (None, None) => return Err(StatusCode::UNPROCESSABLE_ENTITY),
    };

    let id = state.next_post_id;
    state.next_post_id += 1;
    let slug = state
        .topics
        .iter()
        .find(|topic| topic.id == topic_id)
        .map(|topic| topic.slug.clone())
        .unwrap_or_default();
    state.posts.push(Post {
        id,
        topic_id,
        raw: input.raw.clone(),
        username,
    });
    Ok(Json(json!({
        "id": id,
        "topic_id": topic_id,
        "topic_slug": slug,
        "raw": input.raw
    })))
}

async fn latest_posts(State(db): State<Db>) -> Json<Value> {
    let state = db.read().await;
    Json(json!({"latest_posts": state.posts}))
}

// --- search & categories ---

async fn categories() -> Json<Value> {
    Json(json!({
        "category_list": {
            "categories": [
                {"id": 1, "name": "Uncategorized", "slug": "uncategorized"},
                {"id": 2, "name": "Site Feedback", "slug": "site-feedback"}
            ]
        }
    }))
}

async fn search(State(db): State<Db>, Query(query): Query<SearchQuery>) -> Json<Value> {
    let state = db.read().await;
    let term = query.term.to_lowercase();
    let topics: Vec<&Topic> = state
        .topics
        .iter()
        .filter(|topic| topic.title.to_lowercase().contains(&term))
        .collect();
    Json(json!({"topics": topics}))
}

// --- badges ---

async fn badges() -> Json<Value> {
    Json(json!({
        "badges": [
            {"id": 41, "name": "First Like"},
            {"id": 42, "name": "First Share"}
        ]
    }))
}

async fn user_badges(State(db): State<Db>, Path(username): Path<String>) -> Json<Value> {
    let state = db.read().await;
    let badges: Vec<Value> = state
        .granted_badges
        .iter()
        .filter(|(granted_to, _)| granted_to == bare(&username))
        .map(|(_, badge_id)| json!({"badge_id": badge_id}))
        .collect();
    Json(json!({"user_badges": badges}))
}

async fn grant_badge(
    State(db): State<Db>,
    Form(input): Form<GrantBadgeForm>,
) -> Result<Json<Value>, StatusCode> {
    let mut state = db.write().await;
    if !state.users.contains_key(&input.username) {
        return Err(StatusCode::NOT_FOUND);
    }
    state.granted_badges.push((input.username, input.badge_id));
    Ok(Json(json!({"user_badge": {"badge_id": input.badge_id}})))
}

// --- admin ---

async fn list_users(State(db): State<Db>, Path(filter): Path<String>) -> Json<Value> {
    let state = db.read().await;
    let users: Vec<&User> = match bare(&filter) {
        "active" => state.users.values().filter(|user| user.active).collect(),
        "suspended" => state.users.values().filter(|user| user.suspended).collect(),
        _ => state.users.values().collect(),
    };
    Json(json!(users))
}

async fn admin_user_by_id(
    State(db): State<Db>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let id: u64 = bare(&id).parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let state = db.read().await;
    state
        .users
        .values()
        .find(|user| user.id == id)
        .map(|user| Json(json!(user)))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn trust_level(
    State(db): State<Db>,
    Path(username): Path<String>,
    Form(input): Form<TrustLevelForm>,
) -> Result<Json<Value>, StatusCode> {
    let mut state = db.write().await;
    let user = state
        .users
        .get_mut(bare(&username))
        .ok_or(StatusCode::NOT_FOUND)?;
    user.trust_level = input.level;
    Ok(Json(json!({"success": "OK", "trust_level": input.level})))
}

async fn suspend_user(
    State(db): State<Db>,
    Path(username): Path<String>,
    Form(input): Form<SuspendForm>,
) -> Result<Json<Value>, StatusCode> {
    let mut state = db.write().await;
    let user = state
        .users
        .get_mut(bare(&username))
        .ok_or(StatusCode::NOT_FOUND)?;
    user.suspended = true;
    Ok(Json(json!({
        "success": "OK",
        "duration": input.duration,
        "reason": input.reason
    })))
}

async fn unsuspend_user(
    State(db): State<Db>,
    Path(username): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let mut state = db.write().await;
    let user = state
        .users
        .get_mut(bare(&username))
        .ok_or(StatusCode::NOT_FOUND)?;
    user.suspended = false;
    Ok(Json(json!({"success": "OK"})))
}

async fn log_out_user(
    State(db): State<Db>,
    Path(username): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let state = db.read().await;
    if !state.users.contains_key(bare(&username)) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({"success": "OK"})))
}

async fn generate_api_key(
    State(db): State<Db>,
    Path(username): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let state = db.read().await;
    let user = state
        .users
        .get(bare(&username))
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({
        "api_key": {
            "id": user.id,
            "key": Uuid::new_v4().simple().to_string(),
            "username": user.username
        }
    })))
}

async fn anonymize_user(
    State(db): State<Db>,
    Path(username): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let mut state = db.write().await;
    let mut user = state
        .users
        .remove(bare(&username))
        .ok_or(StatusCode::NOT_FOUND)?;
    let anonymous = format!("anon{}", user.id);
    user.username = anonymous.clone();
    user.name = String::new();
    user.email = format!("{anonymous}@anonymized.invalid");
    state.users.insert(anonymous.clone(), user);
    Ok(Json(json!({"success": "OK", "username": anonymous})))
}

async fn delete_user(
    State(db): State<Db>,
    Path(username): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let mut state = db.write().await;
    state
        .users
        .remove(bare(&username))
        .map(|_| Json(json!({"deleted": true})))
        .ok_or(StatusCode::NOT_FOUND)
}
