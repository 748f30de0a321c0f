//! End-to-end tests against the assembled router.
//!
//! Every test builds a fresh SQLite database in a temp directory and
//! drives the API through in-process requests, the same way a client
//! would: register, obtain a token, exercise the endpoints.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use loquela::config::Config;
use loquela::db::Db;
use loquela::models::user;
use loquela::routes::{self, AppState};

// ==================== Test Helpers ====================

/// Build the router against a fresh temp-file database.
async fn test_app() -> (Router, Db, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("api.db");
    let url = format!("sqlite://{}", path.display());
    let db = Db::connect(&url).await.expect("Failed to open database");

    let config = Config {
        database_url: url,
        secret_key: "api-test-secret".to_string(),
        access_token_expire_minutes: 30,
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let app = routes::router(AppState {
        db: db.clone(),
        config,
    });
    (app, db, temp_dir)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(payload) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    app.clone()
        .oneshot(request)
        .await
        .expect("Failed to send request")
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Failed to parse body")
    }
}

async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = send(app, method, uri, token, body).await;
    let status = response.status();
    (status, read_json(response).await)
}

/// POST the OAuth2 password form. The `username` field carries the email.
async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "username={}&password={}",
            email, password
        )))
        .expect("Failed to build request");
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Failed to send request");
    let status = response.status();
    (status, read_json(response).await)
}

const PASSWORD: &str = "s3cret-pass";

async fn register(app: &Router, email: &str) -> Value {
    let (status, body) = request(
        app,
        Method::POST,
        "/user",
        None,
        Some(json!({
            "username": "tester",
            "email": email,
            "password": PASSWORD,
            "native_language": "en",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);
    body
}

async fn login_token(app: &Router, email: &str) -> String {
    let (status, body) = login(app, email, PASSWORD).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["access_token"]
        .as_str()
        .expect("Token should be a string")
        .to_string()
}

async fn user_token(app: &Router, email: &str) -> String {
    register(app, email).await;
    login_token(app, email).await
}

/// Register, promote through the model layer (the API never grants the
/// role) and log in.
async fn superuser_token(app: &Router, db: &Db, email: &str) -> String {
    register(app, email).await;
    let mut conn = db
        .pool()
        .acquire()
        .await
        .expect("Failed to acquire connection");
    user::promote(&mut conn, email)
        .await
        .expect("Failed to promote user")
        .expect("User should exist");
    login_token(app, email).await
}

async fn create_term(app: &Router, token: &str, term: &str, language: &str) {
    let (status, body) = request(
        app,
        Method::POST,
        "/term",
        Some(token),
        Some(json!({ "term": term, "origin_language": language })),
    )
    .await;
    assert!(
        status == StatusCode::CREATED || status == StatusCode::OK,
        "term creation failed: {}",
        body
    );
}

/// Create a definition plus its English translation, returning the
/// definition id.
async fn create_translated_definition(
    app: &Router,
    token: &str,
    term: &str,
    definition: &str,
    meaning: &str,
) -> i64 {
    let (status, body) = request(
        app,
        Method::POST,
        "/term/definition",
        Some(token),
        Some(json!({
            "term": term,
            "origin_language": "pt",
            "part_of_speech": "noun",
            "definition": definition,
            "level": "A1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "definition failed: {}", body);
    let definition_id = body["id"].as_i64().expect("Definition should have an id");

    let (status, body) = request(
        app,
        Method::POST,
        "/term/definition/translation",
        Some(token),
        Some(json!({
            "term_definition_id": definition_id,
            "language": "en",
            "translation": definition,
            "meaning": meaning,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "translation failed: {}", body);
    definition_id
}

async fn count_exercises(db: &Db, kind: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM exercises WHERE type = ?")
        .bind(kind)
        .fetch_one(db.pool())
        .await
        .expect("Failed to count exercises")
}

// ==================== Auth Tests ====================

#[tokio::test]
async fn test_register_login_and_refresh() {
    let (app, _db, _temp_dir) = test_app().await;

    let body = register(&app, "ana@example.com").await;
    assert_eq!(body["username"], "tester");
    assert_eq!(body["email"], "ana@example.com");
    assert_eq!(body["native_language"], "en");
    assert!(body["id"].is_i64());
    // No credential material in the public view.
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());

    let (status, body) = login(&app, "ana@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    let token = body["access_token"].as_str().expect("Should have a token");

    let (status, body) = request(&app, Method::POST, "/auth/refresh_token", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    assert!(body["access_token"].as_str().is_some());
}

#[tokio::test]
async fn test_register_rejects_invalid_email() {
    let (app, _db, _temp_dir) = test_app().await;

    for email in ["not-an-email", "missing@tld", "two@at@signs.com", "with space@x.com"] {
        let (status, _) = request(
            &app,
            Method::POST,
            "/user",
            None,
            Some(json!({
                "username": "tester",
                "email": email,
                "password": PASSWORD,
                "native_language": "en",
            })),
        )
        .await;
        assert_eq!(
            status,
            StatusCode::UNPROCESSABLE_ENTITY,
            "'{}' should be rejected",
            email
        );
    }
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let (app, _db, _temp_dir) = test_app().await;
    register(&app, "ana@example.com").await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/user",
        None,
        Some(json!({
            "username": "other",
            "email": "ana@example.com",
            "password": PASSWORD,
            "native_language": "pt",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "email already registered");
}

#[tokio::test]
async fn test_login_failures() {
    let (app, _db, _temp_dir) = test_app().await;
    register(&app, "ana@example.com").await;

    let (status, body) = login(&app, "nobody@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "incorrect email or password");

    let (status, body) = login(&app, "ana@example.com", "wrong-pass").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "incorrect email or password");
}

#[tokio::test]
async fn test_unauthorized_responses_carry_challenge_header() {
    let (app, _db, _temp_dir) = test_app().await;

    let response = send(
        &app,
        Method::GET,
        "/term/exercise?type=random&language=pt",
        None,
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .map(|v| v.to_str().unwrap_or_default()),
        Some("Bearer")
    );

    let (status, body) = request(
        &app,
        Method::GET,
        "/term/exercise?type=random&language=pt",
        Some("not.a.token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "could not validate credentials");
}

#[tokio::test]
async fn test_update_user_is_self_only() {
    let (app, _db, _temp_dir) = test_app().await;
    let ana = register(&app, "ana@example.com").await;
    let ana_token = login_token(&app, "ana@example.com").await;
    let bea = register(&app, "bea@example.com").await;

    let (status, _) = request(
        &app,
        Method::PATCH,
        &format!("/user/{}", bea["id"]),
        Some(&ana_token),
        Some(json!({ "username": "hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/user/{}", ana["id"]),
        Some(&ana_token),
        Some(json!({ "username": "ana maria", "password": "new-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "ana maria");

    // The old password no longer logs in, the new one does.
    let (status, _) = login(&app, "ana@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, "ana@example.com", "new-pass").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_linguistic_writes_require_superuser() {
    let (app, db, _temp_dir) = test_app().await;
    let plain = user_token(&app, "plain@example.com").await;

    let payload = json!({ "term": "casa", "origin_language": "pt" });
    let (status, _) = request(&app, Method::POST, "/term", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) =
        request(&app, Method::POST, "/term", Some(&plain), Some(payload.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "not enough permission");

    let admin = superuser_token(&app, &db, "admin@example.com").await;
    let (status, _) = request(&app, Method::POST, "/term", Some(&admin), Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
}

// ==================== Term Tests ====================

#[tokio::test]
async fn test_term_get_or_create_is_normalized() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/term",
        Some(&admin),
        Some(json!({ "term": "música", "origin_language": "pt" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["term"], "música");

    // Same term modulo case and accents: the existing row comes back.
    let (status, body) = request(
        &app,
        Method::POST,
        "/term",
        Some(&admin),
        Some(json!({ "term": "MUSICA", "origin_language": "pt" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["term"], "música");
    assert_eq!(count_exercises(&db, "speak-term").await, 1);

    let (status, body) = request(
        &app,
        Method::GET,
        "/term?term=musica&origin_language=pt",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["term"], "música");
    assert_eq!(body["origin_language"], "pt");

    let (status, body) = request(
        &app,
        Method::GET,
        "/term?term=ausente&origin_language=pt",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "term not found");
}

#[tokio::test]
async fn test_term_view_embeds() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;
    create_translated_definition(&app, &admin, "casa", "lugar onde se mora", "house").await;

    let (status, _) = request(
        &app,
        Method::POST,
        "/term/lexical",
        Some(&admin),
        Some(json!({
            "term": "casa",
            "origin_language": "pt",
            "value": "lar",
            "type": "synonym",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = request(
        &app,
        Method::POST,
        "/term/pronunciation",
        Some(&admin),
        Some(json!({
            "language": "pt",
            "phonetic": "ˈka.zɐ",
            "text": "casa",
            "term": "casa",
            "origin_language": "pt",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Bare lookup: no embeds.
    let (status, body) = request(
        &app,
        Method::GET,
        "/term?term=casa&origin_language=pt",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("meanings").is_none());
    assert!(body.get("lexical").is_none());
    assert!(body.get("pronunciations").is_none());

    let (status, body) = request(
        &app,
        Method::GET,
        "/term?term=casa&origin_language=pt&translation_language=en&lexical=true&pronunciation=true",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meanings"], json!(["house"]));
    assert_eq!(body["lexical"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["lexical"][0]["value"], "lar");
    assert_eq!(body["pronunciations"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["pronunciations"][0]["phonetic"], "ˈka.zɐ");
}

#[tokio::test]
async fn test_term_search() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;
    create_term(&app, &admin, "casamento", "pt").await;
    create_term(&app, &admin, "haus", "de").await;
    create_translated_definition(&app, &admin, "casa", "lugar onde se mora", "house").await;

    let (status, body) = request(
        &app,
        Method::GET,
        "/term/search?text=casa&origin_language=pt",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let found: Vec<&str> = body
        .as_array()
        .expect("Should be a list")
        .iter()
        .map(|t| t["term"].as_str().expect("Should have term text"))
        .collect();
    assert_eq!(found, vec!["casa", "casamento"]);

    let (status, body) = request(
        &app,
        Method::GET,
        "/term/search/meaning?text=hous&origin_language=pt&translation_language=en",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["term"], "casa");
}

// ==================== Lexical Tests ====================

#[tokio::test]
async fn test_lexical_create_list_and_antonym_rule() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "bom", "pt").await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/term/lexical",
        Some(&admin),
        Some(json!({
            "term": "ausente",
            "origin_language": "pt",
            "value": "x",
            "type": "synonym",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "term not found");

    for (index, antonym) in ["mau", "ruim", "péssimo"].iter().enumerate() {
        let (status, _) = request(
            &app,
            Method::POST,
            "/term/lexical",
            Some(&admin),
            Some(json!({
                "term": "bom",
                "origin_language": "pt",
                "value": antonym,
                "type": "antonym",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let expected = if index < 2 { 0 } else { 1 };
        assert_eq!(count_exercises(&db, "mchoice-term").await, expected);
    }

    let (status, body) = request(
        &app,
        Method::GET,
        "/term/lexical?term=bom&origin_language=pt&type=antonym",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(3));
    assert_eq!(body[0]["type"], "antonym");
}

// ==================== Definition Tests ====================

#[tokio::test]
async fn test_definition_get_or_create_and_update() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;

    let payload = json!({
        "term": "casa",
        "origin_language": "pt",
        "part_of_speech": "noun",
        "definition": "Lugar onde se mora",
        "level": "A1",
    });
    let (status, body) = request(
        &app,
        Method::POST,
        "/term/definition",
        Some(&admin),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let definition_id = body["id"].as_i64().expect("Should have an id");

    // Equivalent text modulo case and accents dedupes.
    let (status, body) = request(
        &app,
        Method::POST,
        "/term/definition",
        Some(&admin),
        Some(json!({
            "term": "casa",
            "origin_language": "pt",
            "part_of_speech": "noun",
            "definition": "lugar ônde se mora",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"].as_i64(), Some(definition_id));
    assert_eq!(body["definition"], "Lugar onde se mora");

    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/term/definition/{}", definition_id),
        Some(&admin),
        Some(json!({ "level": "B1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["level"], "B1");
    assert_eq!(body["definition"], "Lugar onde se mora");

    let (status, _) = request(
        &app,
        Method::PATCH,
        "/term/definition/9999",
        Some(&admin),
        Some(json!({ "level": "B1" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_definition_translation_flow() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;
    let definition_id =
        create_translated_definition(&app, &admin, "casa", "lugar onde se mora", "house").await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/term/definition/translation",
        Some(&admin),
        Some(json!({
            "term_definition_id": definition_id,
            "language": "en",
            "translation": "again",
            "meaning": "again",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "definition translation already exists");

    let (status, body) = request(
        &app,
        Method::GET,
        "/term/definition?term=casa&origin_language=pt&translation_language=en",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["id"].as_i64(), Some(definition_id));
    assert_eq!(body[0]["translation"]["meaning"], "house");

    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/term/definition/translation/{}/en", definition_id),
        Some(&admin),
        Some(json!({ "meaning": "house, household" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meaning"], "house, household");

    let (status, _) = request(
        &app,
        Method::PATCH,
        &format!("/term/definition/translation/{}/de", definition_id),
        Some(&admin),
        Some(json!({ "meaning": "haus" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ==================== Example Tests ====================

#[tokio::test]
async fn test_example_requires_highlight_markers() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;

    for example in ["eu moro nesta casa", "eu moro nesta *casa", "eu moro nesta ** casa"] {
        let (status, _) = request(
            &app,
            Method::POST,
            "/term/example",
            Some(&admin),
            Some(json!({
                "language": "pt",
                "example": example,
                "term": "casa",
                "origin_language": "pt",
            })),
        )
        .await;
        assert_eq!(
            status,
            StatusCode::UNPROCESSABLE_ENTITY,
            "'{}' should be rejected",
            example
        );
    }
}

#[tokio::test]
async fn test_example_link_flow() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;
    let definition_id =
        create_translated_definition(&app, &admin, "casa", "lugar onde se mora", "house").await;

    let payload = json!({
        "language": "pt",
        "example": "eu moro nesta *casa*",
        "level": "A1",
        "term": "casa",
        "origin_language": "pt",
    });
    let (status, body) = request(
        &app,
        Method::POST,
        "/term/example",
        Some(&admin),
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let example_id = body["id"].as_i64().expect("Should have an id");
    assert_eq!(body["example"], "eu moro nesta casa");
    assert_eq!(body["highlight"], json!([[14, 17]]));
    assert_eq!(count_exercises(&db, "speak-sentence").await, 1);

    let (status, body) = request(
        &app,
        Method::POST,
        "/term/example",
        Some(&admin),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "example link already exists");

    // Same sentence, different target: the row is reused, a link is added.
    let (status, body) = request(
        &app,
        Method::POST,
        "/term/example",
        Some(&admin),
        Some(json!({
            "language": "pt",
            "example": "eu moro nesta *casa*",
            "term_definition_id": definition_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"].as_i64(), Some(example_id));
    assert_eq!(count_exercises(&db, "speak-sentence").await, 1);

    let (status, body) = request(
        &app,
        Method::GET,
        "/term/example?term=casa&origin_language=pt",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["highlight"], json!([[14, 17]]));

    let (status, body) = request(
        &app,
        Method::GET,
        &format!("/term/example?term_definition_id={}", definition_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    // Unknown target 404s rather than returning an empty page.
    let (status, _) = request(
        &app,
        Method::GET,
        "/term/example?term=ausente&origin_language=pt",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // An example cannot be the target of an example link.
    let (status, _) = request(
        &app,
        Method::GET,
        &format!("/term/example?term_example_id={}", example_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_example_listing_paginates() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;

    for example in [
        "a *casa* é amarela",
        "minha *casa* fica longe",
        "eu moro nesta *casa*",
    ] {
        let (status, _) = request(
            &app,
            Method::POST,
            "/term/example",
            Some(&admin),
            Some(json!({
                "language": "pt",
                "example": example,
                "term": "casa",
                "origin_language": "pt",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = request(
        &app,
        Method::GET,
        "/term/example?term=casa&origin_language=pt&page=1&size=2",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["next_page"], 2);
    assert_eq!(body["previous_page"], Value::Null);

    let (status, body) = request(
        &app,
        Method::GET,
        "/term/example?term=casa&origin_language=pt&page=2&size=2",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["next_page"], Value::Null);
    assert_eq!(body["previous_page"], 1);
}

#[tokio::test]
async fn test_example_translation_flow() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;

    let (_, body) = request(
        &app,
        Method::POST,
        "/term/example",
        Some(&admin),
        Some(json!({
            "language": "pt",
            "example": "eu moro nesta *casa*",
            "term": "casa",
            "origin_language": "pt",
        })),
    )
    .await;
    let example_id = body["id"].as_i64().expect("Should have an id");

    // A second linked example that stays untranslated.
    let (_, body) = request(
        &app,
        Method::POST,
        "/term/example",
        Some(&admin),
        Some(json!({
            "language": "pt",
            "example": "a *casa* é amarela",
            "term": "casa",
            "origin_language": "pt",
        })),
    )
    .await;
    assert!(body["id"].is_i64());

    let (status, body) = request(
        &app,
        Method::POST,
        "/term/example/translation",
        Some(&admin),
        Some(json!({
            "term_example_id": example_id,
            "language": "en",
            "translation": "i live in this *house*",
            "term": "casa",
            "origin_language": "pt",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "translation failed: {}", body);
    assert_eq!(body["translation"], "i live in this house");
    assert_eq!(body["highlight"], json!([[15, 19]]));
    assert_eq!(count_exercises(&db, "order-sentence").await, 1);

    let (status, body) = request(
        &app,
        Method::POST,
        "/term/example/translation",
        Some(&admin),
        Some(json!({
            "term_example_id": example_id,
            "language": "en",
            "translation": "another *text*",
            "term": "casa",
            "origin_language": "pt",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "example translation already exists");

    // Translated listing embeds the translation and omits the
    // untranslated sentence.
    let (status, body) = request(
        &app,
        Method::GET,
        "/term/example?term=casa&origin_language=pt&translation_language=en",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    let item = &body["items"][0];
    assert_eq!(item["id"].as_i64(), Some(example_id));
    assert_eq!(item["translation"]["language"], "en");
    assert_eq!(item["translation"]["translation"], "i live in this house");
    assert_eq!(item["translation"]["highlight"], json!([[15, 19]]));
}

#[tokio::test]
async fn test_example_updates_rewrite_highlight() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;

    let (_, body) = request(
        &app,
        Method::POST,
        "/term/example",
        Some(&admin),
        Some(json!({
            "language": "pt",
            "example": "eu moro nesta *casa*",
            "term": "casa",
            "origin_language": "pt",
        })),
    )
    .await;
    let example_id = body["id"].as_i64().expect("Should have an id");
    let (_, _) = request(
        &app,
        Method::POST,
        "/term/example/translation",
        Some(&admin),
        Some(json!({
            "term_example_id": example_id,
            "language": "en",
            "translation": "i live in this *house*",
            "term": "casa",
            "origin_language": "pt",
        })),
    )
    .await;

    // Text without markers is rejected, nothing changes.
    let (status, _) = request(
        &app,
        Method::PATCH,
        &format!("/term/example/{}", example_id),
        Some(&admin),
        Some(json!({ "example": "texto sem marcador" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/term/example/{}", example_id),
        Some(&admin),
        Some(json!({ "example": "eu moro numa *casa* azul", "level": "A2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["example"], "eu moro numa casa azul");
    assert_eq!(body["level"], "A2");

    let (_, body) = request(
        &app,
        Method::GET,
        "/term/example?term=casa&origin_language=pt",
        None,
        None,
    )
    .await;
    assert_eq!(body["items"][0]["example"], "eu moro numa casa azul");
    assert_eq!(body["items"][0]["highlight"], json!([[13, 16]]));

    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/term/example/translation/{}/en", example_id),
        Some(&admin),
        Some(json!({ "translation": "i live in a blue *house*" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["translation"], "i live in a blue house");
    assert_eq!(body["highlight"], json!([[17, 21]]));

    let (_, body) = request(
        &app,
        Method::GET,
        "/term/example?term=casa&origin_language=pt&translation_language=en",
        None,
        None,
    )
    .await;
    assert_eq!(
        body["items"][0]["translation"]["highlight"],
        json!([[17, 21]])
    );

    let (status, _) = request(
        &app,
        Method::PATCH,
        "/term/example/9999",
        Some(&admin),
        Some(json!({ "level": "A2" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ==================== Pronunciation Tests ====================

#[tokio::test]
async fn test_pronunciation_audio_drives_listen_exercises() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/term/pronunciation",
        Some(&admin),
        Some(json!({
            "language": "pt",
            "phonetic": "ˈka.zɐ",
            "text": "casa",
            "audio_file": "https://cdn.example.com/casa.mp3",
            "term": "casa",
            "origin_language": "pt",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let pronunciation_id = body["id"].as_i64().expect("Should have an id");
    assert_eq!(count_exercises(&db, "listen-term").await, 1);

    let (status, body) = request(
        &app,
        Method::GET,
        "/term/pronunciation?term=casa&origin_language=pt",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["audio_file"], "https://cdn.example.com/casa.mp3");

    // Clearing the audio retracts the listen exercise.
    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/term/pronunciation/{}", pronunciation_id),
        Some(&admin),
        Some(json!({ "audio_file": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["audio_file"], Value::Null);
    assert_eq!(count_exercises(&db, "listen-term").await, 0);

    // An update that does not mention the audio leaves exercises alone.
    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/term/pronunciation/{}", pronunciation_id),
        Some(&admin),
        Some(json!({ "description": "colloquial" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "colloquial");
    assert_eq!(count_exercises(&db, "listen-term").await, 0);

    // Restoring audio replays the link rule.
    let (status, _) = request(
        &app,
        Method::PATCH,
        &format!("/term/pronunciation/{}", pronunciation_id),
        Some(&admin),
        Some(json!({ "audio_file": "https://cdn.example.com/casa-v2.mp3" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count_exercises(&db, "listen-term").await, 1);

    let (status, _) = request(
        &app,
        Method::PATCH,
        "/term/pronunciation/9999",
        Some(&admin),
        Some(json!({ "description": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pronunciation_target_validation() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;

    // Two targets at once.
    let (status, _) = request(
        &app,
        Method::POST,
        "/term/pronunciation",
        Some(&admin),
        Some(json!({
            "language": "pt",
            "phonetic": "x",
            "text": "x",
            "term": "casa",
            "origin_language": "pt",
            "term_lexical_id": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // No target at all.
    let (status, _) = request(
        &app,
        Method::GET,
        "/term/pronunciation",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Missing term.
    let (status, body) = request(
        &app,
        Method::GET,
        "/term/pronunciation?term=ausente&origin_language=pt",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "term not found");
}

// ==================== Exercise Tests ====================

#[tokio::test]
async fn test_exercise_listing_filters() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;
    create_term(&app, &admin, "haus", "de").await;
    let (_, _) = request(
        &app,
        Method::POST,
        "/term/example",
        Some(&admin),
        Some(json!({
            "language": "pt",
            "example": "eu moro nesta *casa*",
            "term": "casa",
            "origin_language": "pt",
        })),
    )
    .await;

    let (status, body) = request(
        &app,
        Method::GET,
        "/term/exercise?type=speak-term&language=pt",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["type"], "speak-term");
    assert_eq!(body[0]["term"], "casa");

    // `random` matches every type in the language.
    let (status, body) = request(
        &app,
        Method::GET,
        "/term/exercise?type=random&language=pt",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));

    let (status, body) = request(
        &app,
        Method::GET,
        "/term/exercise?type=random&language=pt&amount=1",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, _) = request(
        &app,
        Method::GET,
        "/term/exercise?type=bogus&language=pt",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_exercise_cardset_filter_is_owner_scoped() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    let other = user_token(&app, "other@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;
    create_term(&app, &admin, "música", "pt").await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/card/set",
        Some(&admin),
        Some(json!({ "name": "daily" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let cardset_id = body["id"].as_i64().expect("Should have an id");

    let (status, _) = request(
        &app,
        Method::POST,
        "/card",
        Some(&admin),
        Some(json!({
            "cardset_id": cardset_id,
            "term": "casa",
            "origin_language": "pt",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = request(
        &app,
        Method::GET,
        &format!("/term/exercise?type=random&language=pt&cardset_id={}", cardset_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().expect("Should be a list");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["term"], "casa");

    // Someone else's card set does not exist for the caller.
    let (status, body) = request(
        &app,
        Method::GET,
        &format!("/term/exercise?type=random&language=pt&cardset_id={}", cardset_id),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "card set not found");
}

#[tokio::test]
async fn test_exercise_history_flow() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/term/exercise/history",
        Some(&admin),
        Some(json!({ "exercise_id": 9999, "correct": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "exercise not found");

    let (_, body) = request(
        &app,
        Method::GET,
        "/term/exercise?type=speak-term&language=pt",
        Some(&admin),
        None,
    )
    .await;
    let exercise_id = body[0]["id"].as_i64().expect("Should have an id");

    let (status, _) = request(
        &app,
        Method::POST,
        "/term/exercise/history",
        Some(&admin),
        Some(json!({ "exercise_id": exercise_id, "correct": false })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = request(
        &app,
        Method::POST,
        "/term/exercise/history",
        Some(&admin),
        Some(json!({
            "exercise_id": exercise_id,
            "correct": true,
            "text_request": "casa",
            "text_response": "nice pronunciation",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["correct"], true);

    let (status, body) = request(
        &app,
        Method::GET,
        "/term/exercise/history",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let attempts = body.as_array().expect("Should be a list");
    assert_eq!(attempts.len(), 2);
    // Newest first.
    assert_eq!(attempts[0]["correct"], true);
    assert_eq!(attempts[0]["text_request"], "casa");
    assert_eq!(attempts[1]["correct"], false);

    // Another user sees an empty history.
    let other = user_token(&app, "other@example.com").await;
    let (_, body) = request(
        &app,
        Method::GET,
        "/term/exercise/history",
        Some(&other),
        None,
    )
    .await;
    assert_eq!(body.as_array().map(Vec::len), Some(0));
}

// ==================== Card Tests ====================

#[tokio::test]
async fn test_card_set_crud() {
    let (app, _db, _temp_dir) = test_app().await;
    let ana = user_token(&app, "ana@example.com").await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/card/set",
        Some(&ana),
        Some(json!({ "name": "portuguese basics", "language": "pt" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let cardset_id = body["id"].as_i64().expect("Should have an id");

    let (status, _) = request(
        &app,
        Method::POST,
        "/card/set",
        Some(&ana),
        Some(json!({ "name": "german basics" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = request(&app, Method::GET, "/card/set", Some(&ana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));

    let (status, body) = request(
        &app,
        Method::GET,
        "/card/set?name=portuguese",
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["name"], "portuguese basics");

    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/card/set/{}", cardset_id),
        Some(&ana),
        Some(json!({ "description": "every morning" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "every morning");
    assert_eq!(body["name"], "portuguese basics");

    let response = send(
        &app,
        Method::DELETE,
        &format!("/card/set/{}", cardset_id),
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = request(
        &app,
        Method::GET,
        &format!("/card/set/{}", cardset_id),
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_card_resolves_term_and_defaults_note() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;
    create_translated_definition(&app, &admin, "casa", "lugar onde se mora", "house").await;
    create_translated_definition(&app, &admin, "casa", "sede de uma empresa", "office").await;
    let (_, _) = request(
        &app,
        Method::POST,
        "/term/lexical",
        Some(&admin),
        Some(json!({
            "term": "casa",
            "origin_language": "pt",
            "value": "casinha",
            "type": "form",
        })),
    )
    .await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/card/set",
        Some(&admin),
        Some(json!({ "name": "daily", "language": "en" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let cardset_id = body["id"].as_i64().expect("Should have an id");

    // Normalized lookup, meanings joined as the default note.
    let (status, body) = request(
        &app,
        Method::POST,
        "/card",
        Some(&admin),
        Some(json!({
            "cardset_id": cardset_id,
            "term": "CASA",
            "origin_language": "pt",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["term"], "casa");
    assert_eq!(body["note"], "house, office");
    let card_id = body["id"].as_i64().expect("Should have an id");

    // A lexical form resolves to its base term; an explicit note wins.
    let (status, body) = request(
        &app,
        Method::POST,
        "/card",
        Some(&admin),
        Some(json!({
            "cardset_id": cardset_id,
            "term": "casinha",
            "origin_language": "pt",
            "note": "little house",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["term"], "casa");
    assert_eq!(body["note"], "little house");

    let (status, body) = request(
        &app,
        Method::POST,
        "/card",
        Some(&admin),
        Some(json!({
            "cardset_id": cardset_id,
            "term": "inexistente",
            "origin_language": "pt",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "term not found");

    let (status, body) = request(
        &app,
        Method::PATCH,
        &format!("/card/{}", card_id),
        Some(&admin),
        Some(json!({ "note": "my note" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["note"], "my note");

    let (status, body) = request(
        &app,
        Method::GET,
        &format!("/card?cardset_id={}&term=cas", cardset_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_cards_are_owner_scoped() {
    let (app, db, _temp_dir) = test_app().await;
    let admin = superuser_token(&app, &db, "admin@example.com").await;
    let ana = user_token(&app, "ana@example.com").await;
    let bea = user_token(&app, "bea@example.com").await;
    create_term(&app, &admin, "casa", "pt").await;

    let (_, body) = request(
        &app,
        Method::POST,
        "/card/set",
        Some(&ana),
        Some(json!({ "name": "daily" })),
    )
    .await;
    let cardset_id = body["id"].as_i64().expect("Should have an id");
    let (_, body) = request(
        &app,
        Method::POST,
        "/card",
        Some(&ana),
        Some(json!({
            "cardset_id": cardset_id,
            "term": "casa",
            "origin_language": "pt",
        })),
    )
    .await;
    let card_id = body["id"].as_i64().expect("Should have an id");

    // Another user cannot see, list into, modify or delete them.
    let (status, _) = request(
        &app,
        Method::GET,
        &format!("/card/set/{}", cardset_id),
        Some(&bea),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        &app,
        Method::POST,
        "/card",
        Some(&bea),
        Some(json!({
            "cardset_id": cardset_id,
            "term": "casa",
            "origin_language": "pt",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        &app,
        Method::GET,
        &format!("/card?cardset_id={}", cardset_id),
        Some(&bea),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        &app,
        Method::GET,
        &format!("/card/{}", card_id),
        Some(&bea),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        &app,
        Method::PATCH,
        &format!("/card/{}", card_id),
        Some(&bea),
        Some(json!({ "note": "hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Method::DELETE,
        &format!("/card/{}", card_id),
        Some(&bea),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The owner still can.
    let response = send(
        &app,
        Method::DELETE,
        &format!("/card/{}", card_id),
        Some(&ana),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
