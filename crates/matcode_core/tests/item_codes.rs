use matcode_core::model::item_code::CounterKey;
use matcode_core::model::settings::SystemSettings;
use matcode_core::model::user::{Actor, Permission, Role, UserProfile};
use matcode_core::repo::counter_repo::{CounterRepository, SqliteCounterRepository};
use matcode_core::repo::settings_repo::SqliteSettingsRepository;
use matcode_core::repo::user_repo::SqliteUserRepository;
use matcode_core::service::settings_service::SettingsService;
use matcode_core::service::user_service::UserService;
use matcode_core::{open_db, open_db_in_memory, CodeService, ServiceError};
use rusqlite::Connection;
use std::collections::HashSet;
use std::thread;

fn admin_and_applicant(conn: &Connection) -> (Actor, Actor) {
    let users = UserService::new(SqliteUserRepository::try_new(conn).unwrap());
    let admin = users.bootstrap_admin("admin").unwrap().actor();
    let applicant = users
        .create(&admin, UserProfile::new("alice", Role::Applicant))
        .unwrap()
        .actor();
    (admin, applicant)
}

#[test]
fn preview_does_not_consume_serials() {
    let conn = open_db_in_memory().unwrap();
    let (_, alice) = admin_and_applicant(&conn);
    let codes = CodeService::new(&conn);

    assert_eq!(
        codes.preview_item_code("H", "01", "C").unwrap().to_string(),
        "H01.C.00001"
    );
    assert_eq!(
        codes.preview_item_code("H", "01", "C").unwrap().to_string(),
        "H01.C.00001"
    );

    let generated = codes.generate_item_code(&alice, "H", "01", "C").unwrap();
    assert_eq!(generated.to_string(), "H01.C.00001");
    assert_eq!(generated.serial(), 1);
    assert_eq!(
        codes.preview_item_code("H", "01", "C").unwrap().to_string(),
        "H01.C.00002"
    );
    assert_eq!(codes.current_serial(generated.key()).unwrap(), 1);
}

#[test]
fn serial_start_acts_as_floor() {
    let conn = open_db_in_memory().unwrap();
    let (admin, alice) = admin_and_applicant(&conn);
    SettingsService::new(SqliteSettingsRepository::try_new(&conn).unwrap())
        .save(
            &admin,
            &SystemSettings {
                serial_digits: 4,
                serial_start: 100,
                ..SystemSettings::default()
            },
        )
        .unwrap();
    let codes = CodeService::new(&conn);

    assert_eq!(
        codes.preview_item_code("F", "01", "H").unwrap().to_string(),
        "F01.H.0100"
    );
    let first = codes.generate_item_code(&alice, "F", "01", "H").unwrap();
    let second = codes.generate_item_code(&alice, "F", "01", "H").unwrap();
    assert_eq!(first.to_string(), "F01.H.0100");
    assert_eq!(second.to_string(), "F01.H.0101");

    // A counter already past the floor keeps counting from where it is.
    let key = CounterKey::new("F", "01", "H").unwrap();
    codes.reset_counter(&admin, &key, 500).unwrap();
    assert_eq!(
        codes.generate_item_code(&alice, "F", "01", "H").unwrap().serial(),
        501
    );
}

#[test]
fn exhausted_code_space_keeps_the_counter() {
    let conn = open_db_in_memory().unwrap();
    let (admin, alice) = admin_and_applicant(&conn);
    SettingsService::new(SqliteSettingsRepository::try_new(&conn).unwrap())
        .save(
            &admin,
            &SystemSettings {
                serial_digits: 4,
                ..SystemSettings::default()
            },
        )
        .unwrap();
    let codes = CodeService::new(&conn);
    let key = CounterKey::new("S", "01", "B").unwrap();
    codes.reset_counter(&admin, &key, 9_998).unwrap();

    let last = codes.generate_item_code(&alice, "S", "01", "B").unwrap();
    assert_eq!(last.to_string(), "S01.B.9999");

    let err = codes.generate_item_code(&alice, "S", "01", "B").unwrap_err();
    assert!(matches!(
        err,
        ServiceError::CodeSpaceExhausted { ref key, digits: 4 } if key.to_string() == "S01.B"
    ));
    assert_eq!(codes.current_serial(&key).unwrap(), 9_999);
}

#[test]
fn counter_reset_requires_settings_permission() {
    let conn = open_db_in_memory().unwrap();
    let (_, alice) = admin_and_applicant(&conn);
    let key = CounterKey::new("H", "01", "C").unwrap();

    let err = CodeService::new(&conn)
        .reset_counter(&alice, &key, 10)
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::PermissionDenied {
            role: Role::Applicant,
            permission: Permission::Settings
        }
    ));
}

#[test]
fn generation_validates_categories() {
    let conn = open_db_in_memory().unwrap();
    let (_, alice) = admin_and_applicant(&conn);
    let codes = CodeService::new(&conn);

    assert!(matches!(
        codes.generate_item_code(&alice, "H", "99", "C"),
        Err(ServiceError::InvalidCategory { .. })
    ));
    assert!(matches!(
        codes.preview_item_code("HH", "01", "C"),
        Err(ServiceError::Validation(_))
    ));
}

#[test]
fn counter_repository_starts_fresh_keys_at_start() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();
    let key = CounterKey::new("D", "01", "L").unwrap();

    assert_eq!(repo.get(&key).unwrap(), 0);
    assert_eq!(repo.get_and_increment(&key, None, 1).unwrap(), 1);
    assert_eq!(repo.get_and_increment(&key, None, 1).unwrap(), 2);
    assert_eq!(repo.get_and_increment(&key, None, 50).unwrap(), 50);
    repo.reset(&key, 0).unwrap();
    assert_eq!(repo.get_and_increment(&key, None, 1).unwrap(), 1);
}

#[test]
fn concurrent_generators_never_share_a_serial() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("matcode.db");
    let alice = {
        let conn = open_db(&path).unwrap();
        admin_and_applicant(&conn).1
    };

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            let alice = alice.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let codes = CodeService::new(&conn);
                (0..10)
                    .map(|_| codes.generate_item_code(&alice, "M", "02", "P").unwrap().serial())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let serials: Vec<u64> = workers
        .into_iter()
        .flat_map(|worker| worker.join().unwrap())
        .collect();
    let unique: HashSet<u64> = serials.iter().copied().collect();
    assert_eq!(serials.len(), 40);
    assert_eq!(unique.len(), 40);
    assert_eq!(unique.iter().max(), Some(&40));
}
