use matcode_core::model::supplier::Supplier;
use matcode_core::model::user::{Permission, Role, UserProfile};
use matcode_core::model::ValidationError;
use matcode_core::repo::supplier_repo::{SqliteSupplierRepository, SupplierListQuery};
use matcode_core::repo::user_repo::{SqliteUserRepository, UserListQuery};
use matcode_core::service::supplier_service::SupplierService;
use matcode_core::service::user_service::UserService;
use matcode_core::{open_db_in_memory, ServiceError};

#[test]
fn bootstrap_admin_only_once() {
    let conn = open_db_in_memory().unwrap();
    let users = UserService::new(SqliteUserRepository::try_new(&conn).unwrap());

    let admin = users.bootstrap_admin("  root ").unwrap();
    assert_eq!(admin.username, "root");
    assert_eq!(admin.role, Role::Admin);
    assert!(admin.is_active);
    assert!(admin.created_at > 0);

    let err = users.bootstrap_admin("second").unwrap_err();
    assert!(matches!(err, ServiceError::Conflict { entity: "admin", ref key } if key == "root"));
}

#[test]
fn user_management_requires_users_permission() {
    let conn = open_db_in_memory().unwrap();
    let users = UserService::new(SqliteUserRepository::try_new(&conn).unwrap());
    let admin = users.bootstrap_admin("admin").unwrap().actor();
    let approver = users
        .create(&admin, UserProfile::new("reviewer", Role::Approver))
        .unwrap();

    let err = users
        .create(&approver.actor(), UserProfile::new("mallory", Role::Admin))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::PermissionDenied {
            role: Role::Approver,
            permission: Permission::Users
        }
    ));
    assert!(users.list(&approver.actor(), &UserListQuery::default()).is_err());

    // own profile stays readable
    let own = users.get(&approver.actor(), approver.id).unwrap();
    assert_eq!(own.username, "reviewer");
}

#[test]
fn usernames_are_unique_and_emails_checked() {
    let conn = open_db_in_memory().unwrap();
    let users = UserService::new(SqliteUserRepository::try_new(&conn).unwrap());
    let admin = users.bootstrap_admin("admin").unwrap().actor();
    users
        .create(&admin, UserProfile::new("alice", Role::Applicant))
        .unwrap();

    let err = users
        .create(&admin, UserProfile::new("alice", Role::Approver))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict { .. }));

    let mut bad_email = UserProfile::new("carol", Role::Applicant);
    bad_email.email = Some("carol.example.com".to_string());
    let err = users.create(&admin, bad_email).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::InvalidEmail(_))
    ));

    let err = users
        .create(&admin, UserProfile::new("   ", Role::Applicant))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::BlankField(_))
    ));
}

#[test]
fn update_and_list_users() {
    let conn = open_db_in_memory().unwrap();
    let users = UserService::new(SqliteUserRepository::try_new(&conn).unwrap());
    let admin = users.bootstrap_admin("admin").unwrap().actor();
    let mut alice = users
        .create(&admin, UserProfile::new("alice", Role::Applicant))
        .unwrap();
    users
        .create(&admin, UserProfile::new("bob", Role::Applicant))
        .unwrap();

    alice.role = Role::Approver;
    alice.department = Some(" Purchasing ".to_string());
    let promoted = users.update(&admin, alice.clone()).unwrap();
    assert_eq!(promoted.role, Role::Approver);
    assert_eq!(promoted.department.as_deref(), Some("Purchasing"));

    let applicants = users
        .list(
            &admin,
            &UserListQuery {
                role: Some(Role::Applicant),
                ..UserListQuery::default()
            },
        )
        .unwrap();
    let names: Vec<_> = applicants.iter().map(|user| user.username.as_str()).collect();
    assert_eq!(names, vec!["bob"]);

    let searched = users
        .list(
            &admin,
            &UserListQuery {
                username: Some("LIC".to_string()),
                ..UserListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].id, alice.id);
}

#[test]
fn inactive_users_cannot_sign_in() {
    let conn = open_db_in_memory().unwrap();
    let users = UserService::new(SqliteUserRepository::try_new(&conn).unwrap());
    let admin = users.bootstrap_admin("admin").unwrap().actor();
    let alice = users
        .create(&admin, UserProfile::new("alice", Role::Applicant))
        .unwrap();

    let actor = users.sign_in("alice").unwrap();
    assert_eq!(actor.user_id, alice.id);
    assert_eq!(actor.role, Role::Applicant);
    assert!(users.get(&admin, alice.id).unwrap().last_login.is_some());

    let deactivated = users.set_active(&admin, alice.id, false).unwrap();
    assert!(!deactivated.is_active);
    assert!(matches!(
        users.sign_in("alice"),
        Err(ServiceError::NotFound { entity: "active user", .. })
    ));
    assert!(matches!(
        users.sign_in("nobody"),
        Err(ServiceError::NotFound { .. })
    ));

    assert!(matches!(
        users.set_active(&admin, admin.user_id, false),
        Err(ServiceError::Conflict { .. })
    ));
}

#[test]
fn supplier_codes_are_normalized_and_unique() {
    let conn = open_db_in_memory().unwrap();
    let users = UserService::new(SqliteUserRepository::try_new(&conn).unwrap());
    let admin = users.bootstrap_admin("admin").unwrap().actor();
    let suppliers = SupplierService::new(SqliteSupplierRepository::try_new(&conn).unwrap());

    let mut acme = Supplier::new(" sup001 ", "Acme Hardware");
    acme.email = Some("sales@acme.example".to_string());
    let acme = suppliers.create(&admin, acme).unwrap();
    assert_eq!(acme.code, "SUP001");
    assert!(acme.is_active);

    let err = suppliers
        .create(&admin, Supplier::new("SUP001", "Copycat"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict { .. }));

    let found = suppliers.find_by_code(&admin, "sup001").unwrap().unwrap();
    assert_eq!(found.id, acme.id);

    let err = suppliers
        .create(&admin, Supplier::new("", "Nameless"))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[test]
fn supplier_lifecycle() {
    let conn = open_db_in_memory().unwrap();
    let users = UserService::new(SqliteUserRepository::try_new(&conn).unwrap());
    let admin = users.bootstrap_admin("admin").unwrap().actor();
    let applicant = users
        .create(&admin, UserProfile::new("alice", Role::Applicant))
        .unwrap()
        .actor();
    let suppliers = SupplierService::new(SqliteSupplierRepository::try_new(&conn).unwrap());

    let beta = suppliers
        .create(&admin, Supplier::new("SUP002", "Beta Metals"))
        .unwrap();
    let alpha = suppliers
        .create(&admin, Supplier::new("SUP001", "Alpha Plastics"))
        .unwrap();

    assert!(matches!(
        suppliers.create(&applicant, Supplier::new("SUP003", "Gamma")),
        Err(ServiceError::PermissionDenied {
            permission: Permission::Settings,
            ..
        })
    ));

    let listed = suppliers
        .list(&applicant, &SupplierListQuery::default())
        .unwrap();
    let codes: Vec<_> = listed.iter().map(|supplier| supplier.code.as_str()).collect();
    assert_eq!(codes, vec!["SUP001", "SUP002"]);

    let mut renamed = beta.clone();
    renamed.name = "Beta Metals Ltd".to_string();
    renamed.country = Some("TW".to_string());
    let renamed = suppliers.update(&admin, renamed).unwrap();
    assert_eq!(renamed.name, "Beta Metals Ltd");

    suppliers.deactivate(&admin, beta.id).unwrap();
    let active = suppliers
        .list(&applicant, &SupplierListQuery::default())
        .unwrap();
    assert_eq!(active.len(), 1);
    let everything = suppliers
        .list(
            &admin,
            &SupplierListQuery {
                include_inactive: true,
                ..SupplierListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(everything.len(), 2);

    suppliers.delete(&admin, alpha.id).unwrap();
    assert!(matches!(
        suppliers.get(&admin, alpha.id),
        Err(ServiceError::NotFound { entity: "supplier", .. })
    ));
    assert!(matches!(
        suppliers.delete(&admin, alpha.id),
        Err(ServiceError::NotFound { .. })
    ));
}
