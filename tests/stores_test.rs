//! Store behavior against a mocked backend

use marchehub::auth::User;
use marchehub::MarcheHub;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn hub_for(server: &MockServer) -> MarcheHub {
    MarcheHub::new(&server.uri(), "test-anon-key")
}

async fn signed_in_hub(server: &MockServer, user_id: &str) -> MarcheHub {
    let hub = hub_for(server);
    hub.auth()
        .set_user(User {
            id: user_id.to_string(),
            email: None,
        })
        .await;
    hub
}

fn contact_row(id: &str, tags: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "company": "Acme BTP",
        "name": "Jeanne Dupont",
        "email": "jeanne@acme-btp.fr",
        "tags": tags,
        "created_by": "u1",
        "created_at": "2024-03-12T09:30:00Z"
    })
}

fn devis_row(id: &str, with_join: bool) -> serde_json::Value {
    let mut row = json!({
        "id": id,
        "marche_id": "m1",
        "marche_title": "Rénovation école",
        "company": "Acme BTP",
        "status": "En attente",
        "total_ht": 12000.0,
        "tva": 2400.0,
        "total_ttc": 14400.0,
        "items": [{"label": "Gros œuvre", "amount": 12000}],
        "created_by": "u1",
        "sent_to": "u2",
        "created_at": "2024-03-12T09:30:00Z"
    });
    if with_join {
        row["marches"] = json!({"sector": "BTP", "end_date": "2024-06-30"});
    }
    row
}

#[tokio::test]
async fn no_user_means_empty_cache_and_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let hub = hub_for(&server);
    hub.auth().mark_ready();
    let store = hub.contacts();
    store.refresh().await;

    assert!(store.contacts().await.is_empty());
    assert!(!store.is_loading());
}

#[tokio::test]
async fn contacts_are_scoped_ordered_and_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/contacts"))
        .and(query_param("select", "*"))
        .and(query_param("created_by", "eq.u1"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            contact_row("c1", json!(["btp", 42, null, "urgent"])),
            contact_row("c2", json!(null)),
        ])))
        .mount(&server)
        .await;

    let hub = signed_in_hub(&server, "u1").await;
    let store = hub.contacts();
    store.refresh().await;

    let contacts = store.contacts().await;
    assert_eq!(contacts.len(), 2);
    assert_eq!(contacts[0].tags, vec!["btp", "urgent"]);
    assert!(contacts[1].tags.is_empty());
    assert!(!store.is_loading());
}

#[tokio::test]
async fn read_failure_is_swallowed_and_empties_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/contacts"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([contact_row("c1", json!([]))])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/contacts"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "backend down"})),
        )
        .mount(&server)
        .await;

    let hub = signed_in_hub(&server, "u1").await;
    let store = hub.contacts();

    store.refresh().await;
    assert_eq!(store.contacts().await.len(), 1);

    store.refresh().await;
    assert!(store.contacts().await.is_empty());
    assert!(!store.is_loading());
}

#[tokio::test]
async fn refetch_is_idempotent_without_backend_changes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            contact_row("c1", json!(["btp"])),
            contact_row("c2", json!([])),
        ])))
        .mount(&server)
        .await;

    let hub = signed_in_hub(&server, "u1").await;
    let store = hub.contacts();

    store.refresh().await;
    let first = store.contacts().await;
    store.refresh().await;
    let second = store.contacts().await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn delete_removes_the_contact_locally() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            contact_row("c1", json!([])),
            contact_row("c2", json!([])),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/contacts"))
        .and(query_param("id", "eq.c1"))
        .and(query_param("created_by", "eq.u1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let hub = signed_in_hub(&server, "u1").await;
    let store = hub.contacts();
    store.refresh().await;

    store.delete("c1").await.unwrap();

    let contacts = store.contacts().await;
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].id, "c2");
}

#[tokio::test]
async fn delete_failure_propagates_and_keeps_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/contacts"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([contact_row("c1", json!([]))])),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/contacts"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"message": "permission denied"})),
        )
        .mount(&server)
        .await;

    let hub = signed_in_hub(&server, "u1").await;
    let store = hub.contacts();
    store.refresh().await;

    let result = store.delete("c1").await;
    assert!(result.is_err());
    assert_eq!(store.contacts().await.len(), 1);
}

#[tokio::test]
async fn delete_without_user_is_an_error() {
    let server = MockServer::start().await;
    let hub = hub_for(&server);
    hub.auth().mark_ready();

    let store = hub.contacts();
    assert!(store.delete("c1").await.is_err());
}

#[tokio::test]
async fn devis_are_scoped_to_author_and_denormalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/devis"))
        .and(query_param("select", "*, marches(sector,end_date)"))
        .and(query_param("created_by", "eq.u1"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([devis_row("d1", true)])))
        .mount(&server)
        .await;

    let hub = signed_in_hub(&server, "u1").await;
    let store = hub.devis();
    store.refresh().await;

    let devis = store.devis().await;
    assert_eq!(devis.len(), 1);
    assert_eq!(devis[0].marche_sector.as_deref(), Some("BTP"));
    assert!(devis[0].marche_end_date.is_some());
    assert_eq!(devis[0].items.len(), 1);
}

#[tokio::test]
async fn received_devis_are_scoped_to_recipient_without_join() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/devis"))
        .and(query_param("select", "*"))
        .and(query_param("sent_to", "eq.u1"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([devis_row("d2", false)])))
        .mount(&server)
        .await;

    let hub = signed_in_hub(&server, "u1").await;
    let store = hub.received_devis();
    store.refresh().await;

    let devis = store.devis().await;
    assert_eq!(devis.len(), 1);
    assert!(devis[0].marche_sector.is_none());
    assert!(devis[0].marche_end_date.is_none());
}

#[tokio::test]
async fn project_metadata_groups_and_deduplicates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/marches"))
        .and(query_param("select", "project_id, sector, location"))
        .and(query_param("created_by", "eq.u1"))
        .and(query_param("project_id", "not.is.null"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"project_id": "p1", "sector": "IT", "location": "Paris"},
            {"project_id": "p1", "sector": "IT", "location": "Lyon"},
            {"project_id": "p2", "sector": "BTP", "location": null},
        ])))
        .mount(&server)
        .await;

    let hub = signed_in_hub(&server, "u1").await;
    let store = hub.projects_metadata();
    store.refresh().await;

    let projects = store.projects().await;
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].project_id, "p1");
    assert_eq!(projects[0].sectors, vec!["IT"]);
    assert_eq!(projects[0].locations, vec!["Paris", "Lyon"]);
    assert_eq!(projects[0].ao_count, 2);
    assert_eq!(projects[1].project_id, "p2");
    assert_eq!(projects[1].sectors, vec!["BTP"]);
    assert!(projects[1].locations.is_empty());
    assert_eq!(projects[1].ao_count, 1);
}

#[tokio::test]
async fn user_sign_out_empties_on_next_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/contacts"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([contact_row("c1", json!([]))])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let hub = signed_in_hub(&server, "u1").await;
    let store = hub.contacts();
    store.refresh().await;
    assert_eq!(store.contacts().await.len(), 1);

    hub.auth().clear().await;
    store.refresh().await;
    assert!(store.contacts().await.is_empty());
}
