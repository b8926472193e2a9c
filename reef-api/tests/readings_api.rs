//! Integration tests for the reading endpoints:
//! - range, recent, latest and names queries
//! - create, batch create, value edit, soft delete and restore
//! - session and role enforcement

use rocket::http::{ContentType, Cookie, Status};
use rocket::local::asynchronous::Client;
use rocket::tokio;
use serde_json::{Value, json};

use reef_api::orm::testing::test_rocket;

async fn login(client: &Client, email: &str, password: &str) -> Cookie<'static> {
    let response = client
        .post("/api/1/login")
        .json(&json!({ "email": email, "password": password }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    response
        .cookies()
        .get("session")
        .expect("session cookie should be set")
        .clone()
        .into_owned()
}

async fn keeper(client: &Client) -> Cookie<'static> {
    login(client, "keeper@reef.example", "keeperpass").await
}

async fn viewer(client: &Client) -> Cookie<'static> {
    login(client, "viewer@reef.example", "viewerpass").await
}

async fn create(client: &Client, cookie: &Cookie<'static>, body: Value) -> Value {
    let response = client
        .post("/api/1/readings")
        .cookie(cookie.clone())
        .json(&body)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    response.into_json().await.unwrap()
}

async fn get_json(client: &Client, cookie: &Cookie<'static>, uri: String) -> (Status, Value) {
    let response = client.get(uri).cookie(cookie.clone()).dispatch().await;
    let status = response.status();
    let body = response.into_json().await.unwrap_or(Value::Null);
    (status, body)
}

/// Seeds a small week of pH, Salinity and Temperature readings.
async fn seed(client: &Client, cookie: &Cookie<'static>) {
    let batch = json!([
        { "datetime": "2025-03-01T08:00:00Z", "name": "pH", "type": "pH", "value": 8.1 },
        { "datetime": "2025-03-02T08:00:00Z", "name": "pH", "type": "pH", "value": 8.2 },
        { "datetime": "2025-03-03T08:00:00Z", "name": "pH", "type": "pH", "value": 8.0 },
        { "datetime": "2025-03-01T09:00:00Z", "name": "Salinity", "type": "Salt", "value": 35.0 },
        { "datetime": "2025-03-02T09:00:00Z", "name": "Salinity", "type": "Salt", "value": 35.2 },
        { "datetime": "2025-03-02T10:00:00Z", "name": "Temperature", "type": "Tmp", "value": 25.5 }
    ]);
    let response = client
        .post("/api/1/readings/batch")
        .cookie(cookie.clone())
        .json(&batch)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let created: Vec<Value> = response.into_json().await.unwrap();
    assert_eq!(created.len(), 6);
}

#[tokio::test]
async fn test_create_and_get_reading() {
    let client = Client::untracked(test_rocket()).await.unwrap();
    let admin = keeper(&client).await;

    let created = create(
        &client,
        &admin,
        json!({ "datetime": "2025-03-01T10:00:00+02:00", "name": "Calcium", "type": "Ca", "value": 430.0 }),
    )
    .await;

    assert!(created["id"].is_number());
    assert_eq!(created["datetime"], "2025-03-01T08:00:00Z");
    assert_eq!(created["type"], "Ca");
    assert_eq!(created["deleted"], "active");
    assert_eq!(created["version"], 1);

    let (status, fetched) =
        get_json(&client, &admin, format!("/api/1/readings/{}", created["id"])).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(fetched, created);

    let (status, missing) = get_json(&client, &admin, "/api/1/readings/9999".to_string()).await;
    assert_eq!(status, Status::NotFound);
    assert!(missing["error"].as_str().unwrap().contains("9999"));
}

#[tokio::test]
async fn test_range_query_by_name_and_type() {
    let client = Client::untracked(test_rocket()).await.unwrap();
    let admin = keeper(&client).await;
    seed(&client, &admin).await;
    let user = viewer(&client).await;

    let (status, body) = get_json(
        &client,
        &user,
        "/api/1/readings?names=pH&names=Salinity&start=2025-03-01T00:00:00Z&end=2025-03-02T23:59:59Z"
            .to_string(),
    )
    .await;
    assert_eq!(status, Status::Ok);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 4);
    let times: Vec<&str> = rows.iter().map(|r| r["datetime"].as_str().unwrap()).collect();
    let mut sorted = times.clone();
    sorted.sort();
    assert_eq!(times, sorted);

    let (status, body) = get_json(
        &client,
        &user,
        "/api/1/readings?names=Tmp&start=2025-03-01T00:00:00Z&end=2025-03-31T00:00:00Z&field=type"
            .to_string(),
    )
    .await;
    assert_eq!(status, Status::Ok);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Temperature");
}

#[tokio::test]
async fn test_range_query_edge_cases() {
    let client = Client::untracked(test_rocket()).await.unwrap();
    let admin = keeper(&client).await;
    seed(&client, &admin).await;

    let (status, body) = get_json(
        &client,
        &admin,
        "/api/1/readings?names=pH&start=2025-03-05T00:00:00Z&end=2025-03-01T00:00:00Z".to_string(),
    )
    .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body, json!([]));

    let (status, body) = get_json(
        &client,
        &admin,
        "/api/1/readings?names=pH&start=last-week&end=2025-03-01T00:00:00Z".to_string(),
    )
    .await;
    assert_eq!(status, Status::UnprocessableEntity);
    assert!(body["error"].as_str().unwrap().contains("start"));
}

#[tokio::test]
async fn test_recent_readings_limit() {
    let client = Client::untracked(test_rocket()).await.unwrap();
    let admin = keeper(&client).await;
    seed(&client, &admin).await;

    let (status, body) =
        get_json(&client, &admin, "/api/1/readings/recent/pH?limit=2".to_string()).await;
    assert_eq!(status, Status::Ok);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["datetime"], "2025-03-03T08:00:00Z");
    assert_eq!(rows[1]["datetime"], "2025-03-02T08:00:00Z");
    assert!(rows.iter().all(|r| r["name"] == "pH"));

    let (_, body) = get_json(&client, &admin, "/api/1/readings/recent/pH".to_string()).await;
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (_, body) = get_json(&client, &admin, "/api/1/readings/recent/pH?limit=0".to_string()).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_latest_per_name_and_names() {
    let client = Client::untracked(test_rocket()).await.unwrap();
    let admin = keeper(&client).await;
    seed(&client, &admin).await;

    let (status, body) = get_json(
        &client,
        &admin,
        "/api/1/readings/latest?names=Salinity&names=Nitrate&names=pH".to_string(),
    )
    .await;
    assert_eq!(status, Status::Ok);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["name"], "Salinity");
    assert_eq!(entries[0]["reading"]["value"], 35.2);
    assert_eq!(entries[1]["name"], "Nitrate");
    assert!(entries[1]["reading"].is_null());
    assert_eq!(entries[2]["reading"]["datetime"], "2025-03-03T08:00:00Z");

    let (status, body) = get_json(&client, &admin, "/api/1/readings/names".to_string()).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body, json!(["Salinity", "Temperature", "pH"]));
}

#[tokio::test]
async fn test_value_edit_with_version_check() {
    let client = Client::untracked(test_rocket()).await.unwrap();
    let admin = keeper(&client).await;

    let created = create(
        &client,
        &admin,
        json!({ "datetime": "2025-03-01T08:00:00Z", "name": "Alkalinity", "type": "Alk", "value": 8.0 }),
    )
    .await;
    let uri = format!("/api/1/readings/{}", created["id"]);

    let response = client
        .put(uri.clone())
        .cookie(admin.clone())
        .json(&json!({ "value": 8.4, "version": 1 }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let updated: Value = response.into_json().await.unwrap();
    assert_eq!(updated["value"], 8.4);
    assert_eq!(updated["version"], 2);

    // A second editor still holding version 1 loses
    let response = client
        .put(uri.clone())
        .cookie(admin.clone())
        .json(&json!({ "value": 7.0, "version": 1 }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);

    let (_, current) = get_json(&client, &admin, uri).await;
    assert_eq!(current["value"], 8.4);
    assert_eq!(current["version"], 2);
}

#[tokio::test]
async fn test_soft_delete_hides_and_restore_returns() {
    let client = Client::untracked(test_rocket()).await.unwrap();
    let admin = keeper(&client).await;
    seed(&client, &admin).await;

    let (_, recent) = get_json(&client, &admin, "/api/1/readings/recent/pH?limit=1".to_string()).await;
    let newest = &recent[0];
    let id = newest["id"].as_i64().unwrap();

    let response = client
        .delete(format!("/api/1/readings/{}?version=1", id))
        .cookie(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let deleted: Value = response.into_json().await.unwrap();
    assert_eq!(deleted["deleted"], "deleted");
    assert_eq!(deleted["version"], 2);

    let (status, _) = get_json(&client, &admin, format!("/api/1/readings/{}", id)).await;
    assert_eq!(status, Status::NotFound);

    let (_, range) = get_json(
        &client,
        &admin,
        "/api/1/readings?names=pH&start=2025-03-01T00:00:00Z&end=2025-03-31T00:00:00Z".to_string(),
    )
    .await;
    assert!(range.as_array().unwrap().iter().all(|r| r["id"].as_i64() != Some(id)));

    let (_, latest) = get_json(&client, &admin, "/api/1/readings/latest?names=pH".to_string()).await;
    assert_eq!(latest[0]["reading"]["datetime"], "2025-03-02T08:00:00Z");

    let response = client
        .put(format!("/api/1/readings/{}", id))
        .cookie(admin.clone())
        .json(&json!({ "value": 1.0, "version": 2 }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);

    let response = client
        .post(format!("/api/1/readings/{}/restore?version=2", id))
        .cookie(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let restored: Value = response.into_json().await.unwrap();
    assert_eq!(restored["deleted"], "active");
    assert_eq!(restored["version"], 3);

    let (status, _) = get_json(&client, &admin, format!("/api/1/readings/{}", id)).await;
    assert_eq!(status, Status::Ok);
}

#[tokio::test]
async fn test_delete_with_stale_version_conflicts() {
    let client = Client::untracked(test_rocket()).await.unwrap();
    let admin = keeper(&client).await;

    let created = create(
        &client,
        &admin,
        json!({ "datetime": "2025-03-01T08:00:00Z", "name": "Nitrate", "type": "NO3", "value": 2.5 }),
    )
    .await;

    let response = client
        .delete(format!("/api/1/readings/{}?version=7", created["id"]))
        .cookie(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);

    let response = client
        .delete("/api/1/readings/4242?version=1")
        .cookie(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let client = Client::untracked(test_rocket()).await.unwrap();
    let admin = keeper(&client).await;

    let response = client
        .post("/api/1/readings")
        .cookie(admin)
        .header(ContentType::JSON)
        .body(r#"{ "datetime": "not a time", "name": "pH", "type": "pH", "value": 8.0 }"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
}

#[tokio::test]
async fn test_reads_require_session() {
    let client = Client::untracked(test_rocket()).await.unwrap();

    for uri in [
        "/api/1/readings?names=pH&start=2025-03-01T00:00:00Z&end=2025-03-02T00:00:00Z",
        "/api/1/readings/recent/pH",
        "/api/1/readings/latest?names=pH",
        "/api/1/readings/names",
        "/api/1/readings/1",
    ] {
        let response = client.get(uri).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized, "GET {}", uri);
    }
}

#[tokio::test]
async fn test_viewer_cannot_write() {
    let client = Client::untracked(test_rocket()).await.unwrap();
    let admin = keeper(&client).await;
    let created = create(
        &client,
        &admin,
        json!({ "datetime": "2025-03-01T08:00:00Z", "name": "pH", "type": "pH", "value": 8.1 }),
    )
    .await;
    let id = created["id"].as_i64().unwrap();
    let user = viewer(&client).await;
    let reading = json!({ "datetime": "2025-03-02T08:00:00Z", "name": "pH", "type": "pH", "value": 8.0 });

    let response = client
        .post("/api/1/readings")
        .cookie(user.clone())
        .json(&reading)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    let response = client
        .post("/api/1/readings/batch")
        .cookie(user.clone())
        .json(&json!([reading]))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    let response = client
        .put(format!("/api/1/readings/{}", id))
        .cookie(user.clone())
        .json(&json!({ "value": 9.0, "version": 1 }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    let response = client
        .delete(format!("/api/1/readings/{}?version=1", id))
        .cookie(user.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    let response = client
        .post(format!("/api/1/readings/{}/restore?version=1", id))
        .cookie(user.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    let (status, unchanged) = get_json(&client, &user, format!("/api/1/readings/{}", id)).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(unchanged["value"], 8.1);
    assert_eq!(unchanged["version"], 1);
}

#[tokio::test]
async fn test_writes_without_session_are_unauthorized() {
    let client = Client::untracked(test_rocket()).await.unwrap();

    let response = client
        .post("/api/1/readings")
        .json(&json!({ "datetime": "2025-03-01T08:00:00Z", "name": "pH", "type": "pH", "value": 8.1 }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);

    let response = client.delete("/api/1/readings/1?version=1").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
}
