// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rocket-jwt-policy project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::Algorithm;
use rocket::http::{Header, Status};
use rocket::local::asynchronous::Client;
use rocket::serde::json::Json;
use rocket::{get, post, routes};
use rocket_jwt_policy::auth::jwt::FixedClock;
use rocket_jwt_policy::auth::{
    AuthenticatedPrincipal, AuthenticationPolicy, EffectivePrincipals, JwtAuthenticationPolicy,
    JwtClaims, JwtPolicyFairing, TokenIssuer, AUTHENTICATED, EVERYONE,
};
use rocket_jwt_policy::{Audience, ClaimSet, Claims, KeyMaterial};
use serde_json::json;
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

// Setup logger for tests
fn setup() {
    INIT.call_once(|| {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

const SECRET: &str = "integration-test-secret";

fn issued_at() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

fn policy() -> JwtAuthenticationPolicy {
    JwtAuthenticationPolicy::new(Algorithm::HS512, &KeyMaterial::secret(SECRET)).unwrap()
}

fn policy_at(at: DateTime<Utc>) -> JwtAuthenticationPolicy {
    policy().with_clock(Arc::new(FixedClock(at)))
}

#[get("/whoami")]
fn whoami(principal: AuthenticatedPrincipal) -> String {
    principal.0
}

#[get("/claims")]
fn claims(claims: JwtClaims<'_>) -> Json<Claims> {
    Json(claims.0.clone())
}

#[get("/principals")]
fn principals(principals: EffectivePrincipals) -> Json<Vec<String>> {
    Json(principals.0)
}

#[post("/login/<user>")]
fn login(user: &str, issuer: TokenIssuer<'_>) -> Result<String, Status> {
    issuer
        .issue(user, None, None, ClaimSet::new().with("role", "admin"))
        .map_err(|_| Status::InternalServerError)
}

async fn client(policy: JwtAuthenticationPolicy) -> Client {
    setup();
    let rocket = rocket::build()
        .attach(JwtPolicyFairing::from_policy(policy))
        .mount("/", routes![whoami, claims, principals, login]);
    Client::tracked(rocket).await.expect("valid rocket instance")
}

/// Client without any managed policy, used to build bare requests
async fn bare_client() -> Client {
    setup();
    Client::tracked(rocket::build())
        .await
        .expect("valid rocket instance")
}

fn jwt(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("JWT {}", token))
}

#[rocket::async_test]
async fn test_issued_token_authenticates_its_principal() {
    let client = client(policy()).await;

    let response = client.post("/login/alice").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let token = response.into_string().await.expect("token body");

    let response = client.get("/whoami").header(jwt(&token)).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_string().await.as_deref(), Some("alice"));

    let response = client.get("/claims").header(jwt(&token)).dispatch().await;
    let claims: Claims = response.into_json().await.expect("claims body");
    assert_eq!(claims.principal(), Some("alice"));
    assert_eq!(claims.get("role"), Some(json!("admin")));
    assert!(claims.iat.is_some());
    assert_eq!(claims.exp, None);
}

#[rocket::async_test]
async fn test_principal_round_trip() {
    let policy = policy();
    let client = bare_client().await;

    for principal in ["alice", "bob@example.com", "user:42", "Ünïcödé"] {
        let token = policy.issue(principal, None, None, ClaimSet::new()).unwrap();
        let request = client.get("/").header(jwt(&token));
        assert_eq!(
            policy.principal_of(request.inner()).as_deref(),
            Some(principal)
        );
    }
}

#[rocket::async_test]
async fn test_unauthenticated_requests() {
    let client = client(policy()).await;
    let token = policy().issue("alice", None, None, ClaimSet::new()).unwrap();

    // No header at all
    let response = client.get("/whoami").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);

    // Wrong scheme
    let response = client
        .get("/whoami")
        .header(Header::new("Authorization", format!("Bearer {}", token)))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);

    // Garbage token
    let response = client
        .get("/whoami")
        .header(jwt("definitely.not.a-token"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);

    // The claims guard itself never fails
    let response = client.get("/claims").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let claims: Claims = response.into_json().await.expect("claims body");
    assert!(claims.is_empty());
}

#[rocket::async_test]
async fn test_tampered_signature_is_rejected() {
    let policy = policy();
    let client = bare_client().await;
    let token = policy.issue("alice", None, None, ClaimSet::new()).unwrap();

    let signature_start = token.rfind('.').unwrap() + 1;
    for position in signature_start..token.len() {
        let mut tampered = token.clone().into_bytes();
        tampered[position] = if tampered[position] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();

        let request = client.get("/").header(jwt(&tampered));
        assert!(
            policy.resolve_claims(request.inner()).is_empty(),
            "tampered position {} accepted",
            position
        );
    }
}

#[rocket::async_test]
async fn test_tampered_payload_is_rejected() {
    let policy = policy();
    let other = JwtAuthenticationPolicy::new(Algorithm::HS512, &KeyMaterial::secret("other"))
        .unwrap();
    let client = bare_client().await;

    // Payload of a token signed with another key, signature of ours
    let ours = policy.issue("alice", None, None, ClaimSet::new()).unwrap();
    let theirs = other.issue("mallory", None, None, ClaimSet::new()).unwrap();
    let ours: Vec<&str> = ours.split('.').collect();
    let theirs: Vec<&str> = theirs.split('.').collect();
    let forged = format!("{}.{}.{}", ours[0], theirs[1], ours[2]);

    let request = client.get("/").header(jwt(&forged));
    assert_eq!(policy.principal_of(request.inner()), None);
}

#[rocket::async_test]
async fn test_expiration_with_leeway() {
    let client = bare_client().await;
    let expiration = Duration::seconds(60);
    let leeway = Duration::seconds(5);

    let token = policy_at(issued_at())
        .with_expiration(expiration)
        .issue("alice", None, None, ClaimSet::new())
        .unwrap();

    let principal_at = |offset: i64| {
        let validator = policy_at(issued_at() + Duration::seconds(offset)).with_leeway(leeway);
        let request = client.get("/").header(jwt(&token));
        validator.principal_of(request.inner())
    };

    assert_eq!(principal_at(0).as_deref(), Some("alice"));
    assert_eq!(principal_at(59).as_deref(), Some("alice"));
    assert_eq!(principal_at(64).as_deref(), Some("alice"));
    assert_eq!(principal_at(65), None);
    assert_eq!(principal_at(86_400), None);
}

#[rocket::async_test]
async fn test_audience_mismatch() {
    let client = bare_client().await;
    let token = policy()
        .issue("alice", None, Some(Audience::from("svcA")), ClaimSet::new())
        .unwrap();

    let svc_a = policy().with_audience("svcA");
    let request = client.get("/").header(jwt(&token));
    assert_eq!(svc_a.principal_of(request.inner()).as_deref(), Some("alice"));

    let svc_b = policy().with_audience("svcB");
    let request = client.get("/").header(jwt(&token));
    assert_eq!(svc_b.principal_of(request.inner()), None);

    let both = policy().with_audience(["svcB", "svcA"].into_iter().collect::<Audience>());
    let request = client.get("/").header(jwt(&token));
    assert_eq!(both.principal_of(request.inner()).as_deref(), Some("alice"));
}

#[rocket::async_test]
async fn test_extra_claims_override_default_claims() {
    let policy = policy().with_default_claims(
        ClaimSet::new()
            .with("role", "guest")
            .with("tenant", "acme"),
    );
    let client = bare_client().await;

    let token = policy
        .issue(
            "alice",
            None,
            None,
            ClaimSet::new()
                .with("role", "admin")
                .with("sub", "mallory"),
        )
        .unwrap();

    let request = client.get("/").header(jwt(&token));
    let claims = policy.resolve_claims(request.inner());
    assert_eq!(claims.get("role"), Some(json!("admin")));
    assert_eq!(claims.get("tenant"), Some(json!("acme")));
    assert_eq!(claims.principal(), Some("alice"));
}

#[rocket::async_test]
async fn test_claims_are_resolved_once_per_request() {
    let policy = policy();
    let client = bare_client().await;
    let token = policy.issue("alice", None, None, ClaimSet::new()).unwrap();

    let request = client.get("/").header(jwt(&token));
    let first = policy.resolve_claims(request.inner());
    let second = policy.resolve_claims(request.inner());
    assert!(std::ptr::eq(first, second));
    assert_eq!(first.principal(), Some("alice"));
}

#[rocket::async_test]
async fn test_policies_sharing_a_request_keep_their_own_claims() {
    let client = bare_client().await;
    let svc_a = policy().with_audience("svcA");
    let svc_b = policy().with_audience("svcB");
    let token = svc_a.issue("alice", None, None, ClaimSet::new()).unwrap();

    let request = client.get("/").header(jwt(&token));
    assert_eq!(svc_a.principal_of(request.inner()).as_deref(), Some("alice"));
    assert_eq!(svc_b.principal_of(request.inner()), None);
    assert_eq!(svc_a.principal_of(request.inner()).as_deref(), Some("alice"));

    let request = client.get("/").header(jwt(&token));
    assert_eq!(svc_b.principal_of(request.inner()), None);
    assert_eq!(svc_a.principal_of(request.inner()).as_deref(), Some("alice"));

    let first = svc_b.resolve_claims(request.inner());
    let second = svc_b.resolve_claims(request.inner());
    assert!(std::ptr::eq(first, second));
}

#[rocket::async_test]
async fn test_named_header_contract() {
    let policy = policy().with_http_header("X-Api-Token");
    let client = bare_client().await;
    let token = policy.issue("alice", None, None, ClaimSet::new()).unwrap();

    let request = client
        .get("/")
        .header(Header::new("X-Api-Token", token.clone()));
    assert_eq!(policy.principal_of(request.inner()).as_deref(), Some("alice"));

    // The authorization header is ignored under a named contract
    let request = client.get("/").header(jwt(&token));
    assert_eq!(policy.principal_of(request.inner()), None);
}

#[rocket::async_test]
async fn test_custom_scheme() {
    let policy = policy().with_auth_type("Bearer");
    let client = bare_client().await;
    let token = policy.issue("alice", None, None, ClaimSet::new()).unwrap();

    let request = client
        .get("/")
        .header(Header::new("Authorization", format!("Bearer {}", token)));
    assert_eq!(policy.principal_of(request.inner()).as_deref(), Some("alice"));

    let request = client.get("/").header(jwt(&token));
    assert_eq!(policy.principal_of(request.inner()), None);
}

#[rocket::async_test]
async fn test_callback_groups() {
    let policy = policy().with_callback(|principal, _request| match principal {
        "alice" => Some(vec!["group:admins".to_string()]),
        "bob" => Some(Vec::new()),
        _ => None,
    });
    let alice = policy.issue("alice", None, None, ClaimSet::new()).unwrap();
    let bob = policy.issue("bob", None, None, ClaimSet::new()).unwrap();
    let eve = policy.issue("eve", None, None, ClaimSet::new()).unwrap();
    let client = client(policy).await;

    let response = client.get("/principals").header(jwt(&alice)).dispatch().await;
    let principals: Vec<String> = response.into_json().await.expect("principals");
    assert_eq!(
        principals,
        vec![EVERYONE, AUTHENTICATED, "alice", "group:admins"]
    );

    let response = client.get("/whoami").header(jwt(&bob)).dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    // Valid token, unknown principal
    let response = client.get("/whoami").header(jwt(&eve)).dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
    let response = client.get("/principals").header(jwt(&eve)).dispatch().await;
    let principals: Vec<String> = response.into_json().await.expect("principals");
    assert_eq!(principals, vec![EVERYONE]);
}

#[rocket::async_test]
async fn test_reserved_principals_are_refused() {
    let policy = policy();
    let client = bare_client().await;

    for reserved in [EVERYONE, AUTHENTICATED] {
        let token = policy.issue(reserved, None, None, ClaimSet::new()).unwrap();
        let request = client.get("/").header(jwt(&token));
        assert_eq!(policy.authenticated_principal(request.inner()), None);
        assert_eq!(policy.effective_principals(request.inner()), vec![EVERYONE]);
    }
}

#[rocket::async_test]
async fn test_remember_and_forget_are_no_ops() {
    let policy = policy();
    let client = bare_client().await;
    let request = client.get("/");

    assert!(policy.remember(request.inner(), "alice").is_empty());
    assert!(policy.forget(request.inner()).is_empty());
}

#[rocket::async_test]
async fn test_missing_policy_is_a_server_error() {
    setup();
    let rocket = rocket::build().mount("/", routes![whoami, claims]);
    let client = Client::tracked(rocket).await.expect("valid rocket instance");

    let response = client.get("/whoami").dispatch().await;
    assert_eq!(response.status(), Status::InternalServerError);
    let response = client.get("/claims").dispatch().await;
    assert_eq!(response.status(), Status::InternalServerError);
}
