//! Dispatch-level tests: every call goes through the real registry, guard
//! chain and validation, backed by the in-memory store.

use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth;
use crate::database::Store;
use crate::error::ApiError;
use crate::identity::{Identity, Role};
use crate::rpc::dispatch;
use crate::testing::MemStore;

fn setup() -> (Arc<MemStore>, Arc<dyn Store>) {
    let mem = Arc::new(MemStore::new());
    let store: Arc<dyn Store> = mem.clone();
    (mem, store)
}

async fn call(
    store: &Arc<dyn Store>,
    identity: &Identity,
    operation: &str,
    input: Value,
) -> Result<Value, ApiError> {
    dispatch(store.clone(), identity.clone(), operation, input).await
}

fn error_code(result: Result<Value, ApiError>) -> &'static str {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(e) => e.code(),
    }
}

// ── guard chain ───────────────────────────────────────────────────────

#[tokio::test]
async fn staff_operations_reject_anonymous_and_customers() {
    let (mem, store) = setup();
    let customer = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let customer_identity = MemStore::identity_of(&customer);

    let staff_ops = [
        ("createVisit", json!({ "customerId": customer.id, "note": "Weekly mow" })),
        ("listCustomers", json!({})),
        ("getRecentRequests", json!({})),
        ("getRecentFeedbacks", json!({})),
        ("visitsByCustomer", json!({ "customerId": customer.id })),
    ];

    for (op, input) in staff_ops {
        let result = call(&store, &Identity::Anonymous, op, input.clone()).await;
        assert_eq!(error_code(result), "UNAUTHORIZED", "{} anonymous", op);

        let result = call(&store, &customer_identity, op, input).await;
        assert_eq!(error_code(result), "FORBIDDEN", "{} as customer", op);
    }

    // no write happened
    let visits = store.visits_by_account(customer.id).await.unwrap();
    assert!(visits.is_empty());
}

#[tokio::test]
async fn admin_operations_reject_employees() {
    let (mem, store) = setup();
    let employee = mem.seed_account("Bob", "bob@company.com", Role::Employee);
    let employee_identity = MemStore::identity_of(&employee);

    let visit_id = Uuid::new_v4();
    let admin_ops = [
        ("updateVisit", json!({ "visitId": visit_id, "note": "Edited note" })),
        ("deleteVisit", json!({ "visitId": visit_id })),
        ("listAllUsers", json!({})),
        ("updateUser", json!({
            "userId": employee.id,
            "name": "Bob",
            "email": "bob@company.com",
            "role": "EMPLOYEE",
        })),
    ];

    for (op, input) in admin_ops {
        let result = call(&store, &employee_identity, op, input).await;
        assert_eq!(error_code(result), "FORBIDDEN", "{} as employee", op);
    }
}

#[tokio::test]
async fn guards_run_before_validation() {
    let (mem, store) = setup();
    let customer = mem.seed_account("Karan", "karan@example.com", Role::Customer);

    // note "x" is too short, but the customer must be rejected on role
    // before validation ever looks at the input
    let result = call(
        &store,
        &MemStore::identity_of(&customer),
        "createVisit",
        json!({ "customerId": customer.id, "note": "x" }),
    )
    .await;
    assert_eq!(error_code(result), "FORBIDDEN");
}

#[tokio::test]
async fn unknown_operation_is_not_found() {
    let (_mem, store) = setup();
    let result = call(&store, &Identity::Anonymous, "dropAllTables", json!({})).await;
    assert_eq!(error_code(result), "NOT_FOUND");
}

// ── validation ────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_input_reports_field_and_writes_nothing() {
    let (mem, store) = setup();
    let customer = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let employee = mem.seed_account("Bob", "bob@company.com", Role::Employee);

    let result = call(
        &store,
        &MemStore::identity_of(&employee),
        "createVisit",
        json!({ "customerId": customer.id, "note": "x" }),
    )
    .await;

    match result {
        Err(ApiError::Validation { fields, .. }) => {
            assert!(fields.contains_key("note"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    let visits = store.visits_by_account(customer.id).await.unwrap();
    assert!(visits.is_empty());
}

#[tokio::test]
async fn malformed_photo_url_is_rejected() {
    let (mem, store) = setup();
    let customer = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let employee = mem.seed_account("Bob", "bob@company.com", Role::Employee);

    let result = call(
        &store,
        &MemStore::identity_of(&employee),
        "createVisit",
        json!({
            "customerId": customer.id,
            "note": "Weekly mow",
            "photoUrls": ["not a url"],
        }),
    )
    .await;
    assert_eq!(error_code(result), "BAD_REQUEST");
}

// ── accounts ──────────────────────────────────────────────────────────

#[tokio::test]
async fn create_customer_conflicts_on_duplicate_email() {
    let (mem, store) = setup();
    let existing = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let employee = mem.seed_account("Bob", "bob@company.com", Role::Employee);

    let result = call(
        &store,
        &MemStore::identity_of(&employee),
        "createCustomer",
        json!({
            "name": "Impostor",
            "email": "karan@example.com",
            "password": "longenough",
        }),
    )
    .await;
    assert_eq!(error_code(result), "CONFLICT");

    // existing account unmodified
    let account = store.account_by_id(existing.id).await.unwrap().unwrap();
    assert_eq!(account.name, "Karan");
}

#[tokio::test]
async fn assigning_staff_roles_requires_admin() {
    let (mem, store) = setup();
    let employee = mem.seed_account("Bob", "bob@company.com", Role::Employee);
    let admin = mem.seed_account("Root", "root@company.com", Role::Admin);

    let input = json!({
        "name": "New Crew",
        "email": "crew@company.com",
        "password": "crewsecret",
        "role": "EMPLOYEE",
    });

    let result = call(&store, &MemStore::identity_of(&employee), "createCustomer", input.clone()).await;
    assert_eq!(error_code(result), "FORBIDDEN");

    let created = call(&store, &MemStore::identity_of(&admin), "createCustomer", input)
        .await
        .unwrap();
    assert_eq!(created["role"], "EMPLOYEE");

    // plain customer creation stays open to employees
    let created = call(
        &store,
        &MemStore::identity_of(&employee),
        "createCustomer",
        json!({
            "name": "Alice",
            "email": "alice@example.com",
            "password": "alicesecret",
        }),
    )
    .await
    .unwrap();
    assert_eq!(created["role"], "CUSTOMER");
}

#[tokio::test]
async fn update_user_preserves_hash_unless_password_supplied() {
    let (mem, store) = setup();
    let customer = mem.seed_account_with_password("Karan", "karan@example.com", Role::Customer, "originalpw");
    let admin = mem.seed_account("Root", "root@company.com", Role::Admin);
    let admin_identity = MemStore::identity_of(&admin);

    let original_hash = customer.password_hash.clone().unwrap();

    // name-only change, password omitted
    call(
        &store,
        &admin_identity,
        "updateUser",
        json!({
            "userId": customer.id,
            "name": "Karan S",
            "email": "karan@example.com",
            "role": "CUSTOMER",
        }),
    )
    .await
    .unwrap();

    let account = store.account_by_id(customer.id).await.unwrap().unwrap();
    assert_eq!(account.name, "Karan S");
    assert_eq!(account.password_hash.as_deref(), Some(original_hash.as_str()));

    // supplying a password replaces the hash
    call(
        &store,
        &admin_identity,
        "updateUser",
        json!({
            "userId": customer.id,
            "name": "Karan S",
            "email": "karan@example.com",
            "role": "CUSTOMER",
            "password": "brandnewpw",
        }),
    )
    .await
    .unwrap();

    let account = store.account_by_id(customer.id).await.unwrap().unwrap();
    let new_hash = account.password_hash.unwrap();
    assert_ne!(new_hash, original_hash);
    assert!(auth::verify_password("brandnewpw", &new_hash));
}

#[tokio::test]
async fn update_user_conflicts_on_foreign_email() {
    let (mem, store) = setup();
    let karan = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let alice = mem.seed_account("Alice", "alice@example.com", Role::Customer);
    let admin = mem.seed_account("Root", "root@company.com", Role::Admin);
    let admin_identity = MemStore::identity_of(&admin);

    // taking another account's email fails
    let result = call(
        &store,
        &admin_identity,
        "updateUser",
        json!({
            "userId": alice.id,
            "name": "Alice",
            "email": "karan@example.com",
            "role": "CUSTOMER",
        }),
    )
    .await;
    assert_eq!(error_code(result), "CONFLICT");

    // keeping your own email is not a conflict
    call(
        &store,
        &admin_identity,
        "updateUser",
        json!({
            "userId": karan.id,
            "name": "Karan",
            "email": "karan@example.com",
            "role": "CUSTOMER",
        }),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn update_user_missing_account_is_not_found() {
    let (mem, store) = setup();
    let admin = mem.seed_account("Root", "root@company.com", Role::Admin);

    let result = call(
        &store,
        &MemStore::identity_of(&admin),
        "updateUser",
        json!({
            "userId": Uuid::new_v4(),
            "name": "Ghost",
            "email": "ghost@example.com",
            "role": "CUSTOMER",
        }),
    )
    .await;
    assert_eq!(error_code(result), "NOT_FOUND");
}

#[tokio::test]
async fn invite_then_activate_account() {
    let (mem, store) = setup();
    let employee = mem.seed_account("Bob", "bob@company.com", Role::Employee);

    let invited = call(
        &store,
        &MemStore::identity_of(&employee),
        "inviteCustomer",
        json!({ "name": "Alice", "email": "alice@example.com" }),
    )
    .await
    .unwrap();

    let token = invited["activationToken"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    // token never stored raw, and no password yet
    let account = store
        .account_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(account.password_hash.is_none());
    assert_ne!(account.activation_token_digest.as_deref(), Some(token.as_str()));

    // bogus token finds nothing
    let result = call(
        &store,
        &Identity::Anonymous,
        "activateAccount",
        json!({ "token": "definitely-wrong", "password": "alicesecret" }),
    )
    .await;
    assert_eq!(error_code(result), "NOT_FOUND");

    // real token activates
    call(
        &store,
        &Identity::Anonymous,
        "activateAccount",
        json!({ "token": token, "password": "alicesecret" }),
    )
    .await
    .unwrap();

    let account = store
        .account_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(auth::verify_password("alicesecret", account.password_hash.as_deref().unwrap()));
    assert!(account.activation_token_digest.is_none());

    // the token is single-use
    let result = call(
        &store,
        &Identity::Anonymous,
        "activateAccount",
        json!({ "token": token, "password": "alicesecret" }),
    )
    .await;
    assert_eq!(error_code(result), "NOT_FOUND");
}

#[tokio::test]
async fn whoami_reflects_identity() {
    let (mem, store) = setup();
    let employee = mem.seed_account("Bob", "bob@company.com", Role::Employee);

    let me = call(&store, &MemStore::identity_of(&employee), "whoami", json!({}))
        .await
        .unwrap();
    assert_eq!(me["name"], "Bob");
    assert_eq!(me["role"], "EMPLOYEE");
    assert_eq!(me["accountId"], json!(employee.id));
}

// ── visits ────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_visit_attaches_photos_and_signer() {
    let (mem, store) = setup();
    let customer = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let employee = mem.seed_account("Bob", "bob@company.com", Role::Employee);

    let created = call(
        &store,
        &MemStore::identity_of(&employee),
        "createVisit",
        json!({
            "customerId": customer.id,
            "note": "Weekly grass cutting, hedge trim, edging",
            "photoUrls": ["https://cdn.example.com/before.jpg", "https://cdn.example.com/after.jpg"],
        }),
    )
    .await
    .unwrap();

    assert_eq!(created["signedBy"], "Bob");
    assert_eq!(created["photos"].as_array().unwrap().len(), 2);

    let visits = store.visits_by_account(customer.id).await.unwrap();
    assert_eq!(visits.len(), 1);
}

#[tokio::test]
async fn create_visit_unknown_customer_is_not_found() {
    let (mem, store) = setup();
    let employee = mem.seed_account("Bob", "bob@company.com", Role::Employee);

    let result = call(
        &store,
        &MemStore::identity_of(&employee),
        "createVisit",
        json!({ "customerId": Uuid::new_v4(), "note": "Weekly mow" }),
    )
    .await;
    assert_eq!(error_code(result), "NOT_FOUND");
}

#[tokio::test]
async fn update_visit_applies_photo_churn_and_resigns() {
    let (mem, store) = setup();
    let customer = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let admin = mem.seed_account("Root", "root@company.com", Role::Admin);
    let visit = mem.seed_visit(customer.id, "Original note");
    let old_photo = mem.seed_photo(visit.id, "https://cdn.example.com/old.jpg");
    let kept_photo = mem.seed_photo(visit.id, "https://cdn.example.com/kept.jpg");

    let updated = call(
        &store,
        &MemStore::identity_of(&admin),
        "updateVisit",
        json!({
            "visitId": visit.id,
            "note": "Reworked the back beds",
            "newPhotoUrls": ["https://cdn.example.com/a.jpg"],
            "photoIdsToDelete": [old_photo.id],
        }),
    )
    .await
    .unwrap();

    assert_eq!(updated["note"], "Reworked the back beds");
    assert_eq!(updated["signedBy"], "Root (Edited)");

    let detail = store.visit_detail(visit.id).await.unwrap().unwrap();
    let urls: Vec<&str> = detail.photos.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls, vec!["https://cdn.example.com/kept.jpg", "https://cdn.example.com/a.jpg"]);
    assert!(detail.photos.iter().all(|p| p.id != old_photo.id));
    assert!(detail.photos.iter().any(|p| p.id == kept_photo.id));
}

#[tokio::test]
async fn update_visit_ignores_foreign_photo_ids() {
    let (mem, store) = setup();
    let customer = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let admin = mem.seed_account("Root", "root@company.com", Role::Admin);
    let visit = mem.seed_visit(customer.id, "First visit");
    let other_visit = mem.seed_visit(customer.id, "Second visit");
    let other_photo = mem.seed_photo(other_visit.id, "https://cdn.example.com/other.jpg");

    call(
        &store,
        &MemStore::identity_of(&admin),
        "updateVisit",
        json!({
            "visitId": visit.id,
            "note": "Edited first visit",
            "photoIdsToDelete": [other_photo.id],
        }),
    )
    .await
    .unwrap();

    // the other visit's photo survives
    let detail = store.visit_detail(other_visit.id).await.unwrap().unwrap();
    assert_eq!(detail.photos.len(), 1);
}

#[tokio::test]
async fn update_visit_rolls_back_as_one_unit() {
    let (mem, store) = setup();
    let customer = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let admin = mem.seed_account("Root", "root@company.com", Role::Admin);
    let visit = mem.seed_visit(customer.id, "Original note");
    let photo = mem.seed_photo(visit.id, "https://cdn.example.com/old.jpg");

    mem.fail_photo_writes(true);
    let result = call(
        &store,
        &MemStore::identity_of(&admin),
        "updateVisit",
        json!({
            "visitId": visit.id,
            "note": "Never applied",
            "newPhotoUrls": ["https://cdn.example.com/a.jpg"],
            "photoIdsToDelete": [photo.id],
        }),
    )
    .await;
    mem.fail_photo_writes(false);

    assert!(result.is_err());

    // the delete step rolled back along with the failed create step
    let detail = store.visit_detail(visit.id).await.unwrap().unwrap();
    assert_eq!(detail.visit.note, "Original note");
    assert_eq!(detail.photos.len(), 1);
    assert_eq!(detail.photos[0].id, photo.id);
}

#[tokio::test]
async fn delete_visit_cascades_to_children() {
    let (mem, store) = setup();
    let customer = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let admin = mem.seed_account("Root", "root@company.com", Role::Admin);
    let visit = mem.seed_visit(customer.id, "To be deleted");
    mem.seed_photo(visit.id, "https://cdn.example.com/1.jpg");
    mem.seed_photo(visit.id, "https://cdn.example.com/2.jpg");
    mem.seed_feedback(visit.id, "Great work");

    call(
        &store,
        &MemStore::identity_of(&admin),
        "deleteVisit",
        json!({ "visitId": visit.id }),
    )
    .await
    .unwrap();

    assert!(store.visit_detail(visit.id).await.unwrap().is_none());

    let result = call(
        &store,
        &MemStore::identity_of(&admin),
        "getVisitById",
        json!({ "visitId": visit.id }),
    )
    .await;
    assert_eq!(error_code(result), "NOT_FOUND");
}

#[tokio::test]
async fn get_visits_is_scoped_to_caller_and_ordered() {
    let (mem, store) = setup();
    let karan = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let alice = mem.seed_account("Alice", "alice@example.com", Role::Customer);
    let first = mem.seed_visit(karan.id, "First");
    let second = mem.seed_visit(karan.id, "Second");
    mem.seed_visit(alice.id, "Alice only");

    let visits = call(&store, &MemStore::identity_of(&karan), "getVisits", json!({}))
        .await
        .unwrap();
    let visits = visits.as_array().unwrap();
    assert_eq!(visits.len(), 2);
    // most recent first
    assert_eq!(visits[0]["id"], json!(second.id));
    assert_eq!(visits[1]["id"], json!(first.id));
}

// ── feedback ──────────────────────────────────────────────────────────

#[tokio::test]
async fn submit_feedback_once_per_visit() {
    let (mem, store) = setup();
    let customer = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let identity = MemStore::identity_of(&customer);
    let visit = mem.seed_visit(customer.id, "Weekly mow");

    let input = json!({ "visitId": visit.id, "feedback": "Lawn looks great" });

    call(&store, &identity, "submitFeedback", input.clone())
        .await
        .unwrap();

    let result = call(&store, &identity, "submitFeedback", input).await;
    assert_eq!(error_code(result), "CONFLICT");

    // exactly one feedback row afterward
    let detail = store.visit_detail(visit.id).await.unwrap().unwrap();
    assert_eq!(detail.feedback.map(|f| f.body), Some("Lawn looks great".to_string()));
}

#[tokio::test]
async fn submit_feedback_requires_ownership() {
    let (mem, store) = setup();
    let karan = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let alice = mem.seed_account("Alice", "alice@example.com", Role::Customer);
    let visit = mem.seed_visit(karan.id, "Weekly mow");

    // someone else's visit is indistinguishable from a missing one
    let result = call(
        &store,
        &MemStore::identity_of(&alice),
        "submitFeedback",
        json!({ "visitId": visit.id, "feedback": "Not my lawn" }),
    )
    .await;
    assert_eq!(error_code(result), "NOT_FOUND");

    let detail = store.visit_detail(visit.id).await.unwrap().unwrap();
    assert!(detail.feedback.is_none());
}

// ── requests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn resolve_request_owner_staff_and_last_write_wins() {
    let (mem, store) = setup();
    let karan = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let alice = mem.seed_account("Alice", "alice@example.com", Role::Customer);
    let bob = mem.seed_account("Bob", "bob@company.com", Role::Employee);
    let request = mem.seed_request(karan.id, "Trim hedge");

    // a different, non-staff customer may not resolve it
    let result = call(
        &store,
        &MemStore::identity_of(&alice),
        "resolveRequest",
        json!({ "requestId": request.id }),
    )
    .await;
    assert_eq!(error_code(result), "FORBIDDEN");

    // staff resolves
    let resolved = call(
        &store,
        &MemStore::identity_of(&bob),
        "resolveRequest",
        json!({ "requestId": request.id }),
    )
    .await
    .unwrap();
    assert_eq!(resolved["resolvedBy"], "Bob");

    // the filing customer re-resolves; resolvedBy is overwritten
    let resolved = call(
        &store,
        &MemStore::identity_of(&karan),
        "resolveRequest",
        json!({ "requestId": request.id }),
    )
    .await
    .unwrap();
    assert_eq!(resolved["resolvedBy"], "Karan");
}

#[tokio::test]
async fn resolve_request_missing_is_not_found() {
    let (mem, store) = setup();
    let bob = mem.seed_account("Bob", "bob@company.com", Role::Employee);

    let result = call(
        &store,
        &MemStore::identity_of(&bob),
        "resolveRequest",
        json!({ "requestId": Uuid::new_v4() }),
    )
    .await;
    assert_eq!(error_code(result), "NOT_FOUND");
}

#[tokio::test]
async fn create_request_belongs_to_caller() {
    let (mem, store) = setup();
    let karan = mem.seed_account("Karan", "karan@example.com", Role::Customer);

    let created = call(
        &store,
        &MemStore::identity_of(&karan),
        "createRequest",
        json!({ "title": "Trim hedge", "description": "front yard only" }),
    )
    .await
    .unwrap();

    assert_eq!(created["accountId"], json!(karan.id));
    assert_eq!(created["resolvedBy"], Value::Null);

    let own = call(
        &store,
        &MemStore::identity_of(&karan),
        "getRequestsByCustomer",
        json!({}),
    )
    .await
    .unwrap();
    assert_eq!(own.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn recent_feeds_are_bounded_and_newest_first() {
    let (mem, store) = setup();
    let karan = mem.seed_account("Karan", "karan@example.com", Role::Customer);
    let bob = mem.seed_account("Bob", "bob@company.com", Role::Employee);

    for n in 0..12 {
        mem.seed_request(karan.id, &format!("Request {}", n));
    }

    let recent = call(&store, &MemStore::identity_of(&bob), "getRecentRequests", json!({}))
        .await
        .unwrap();
    let recent = recent.as_array().unwrap();
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[0]["title"], "Request 11");
    assert_eq!(recent[9]["title"], "Request 2");
}
