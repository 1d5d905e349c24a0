use matcode_core::model::settings::{SettingValue, SystemSettings};
use matcode_core::model::user::{Actor, Permission, Role, UserProfile};
use matcode_core::model::ValidationError;
use matcode_core::repo::settings_repo::SqliteSettingsRepository;
use matcode_core::repo::user_repo::SqliteUserRepository;
use matcode_core::service::settings_service::SettingsService;
use matcode_core::service::user_service::UserService;
use matcode_core::{open_db_in_memory, ServiceError};
use rusqlite::Connection;

fn admin_and_approver(conn: &Connection) -> (Actor, Actor) {
    let users = UserService::new(SqliteUserRepository::try_new(conn).unwrap());
    let admin = users.bootstrap_admin("admin").unwrap().actor();
    let approver = users
        .create(&admin, UserProfile::new("reviewer", Role::Approver))
        .unwrap()
        .actor();
    (admin, approver)
}

#[test]
fn seeded_settings_match_defaults() {
    let conn = open_db_in_memory().unwrap();
    let settings = SettingsService::new(SqliteSettingsRepository::try_new(&conn).unwrap());

    assert_eq!(settings.load().unwrap(), SystemSettings::default());
    let keys: Vec<_> = settings
        .entries()
        .unwrap()
        .into_iter()
        .map(|entry| entry.key)
        .collect();
    assert_eq!(
        keys,
        vec![
            "approval_level",
            "auto_approve",
            "email_notify",
            "serial_digits",
            "serial_start"
        ]
    );
}

#[test]
fn save_requires_settings_permission() {
    let conn = open_db_in_memory().unwrap();
    let (admin, approver) = admin_and_approver(&conn);
    let settings = SettingsService::new(SqliteSettingsRepository::try_new(&conn).unwrap());
    let wanted = SystemSettings {
        serial_digits: 6,
        auto_approve: true,
        approval_level: 2,
        ..SystemSettings::default()
    };

    assert!(matches!(
        settings.save(&approver, &wanted),
        Err(ServiceError::PermissionDenied {
            role: Role::Approver,
            permission: Permission::Settings
        })
    ));
    assert_eq!(settings.load().unwrap(), SystemSettings::default());

    assert_eq!(settings.save(&admin, &wanted).unwrap(), wanted);
    assert_eq!(settings.load().unwrap(), wanted);

    let invalid = SystemSettings {
        serial_digits: 3,
        ..SystemSettings::default()
    };
    assert!(matches!(
        settings.save(&admin, &invalid),
        Err(ServiceError::Validation(ValidationError::OutOfRange {
            field: "serial_digits",
            ..
        }))
    ));
    assert_eq!(settings.load().unwrap(), wanted);
}

#[test]
fn set_value_follows_the_stored_type() {
    let conn = open_db_in_memory().unwrap();
    let (admin, _) = admin_and_approver(&conn);
    let settings = SettingsService::new(SqliteSettingsRepository::try_new(&conn).unwrap());

    let entry = settings.set_value(&admin, "approval_level", "3").unwrap();
    assert_eq!(entry.value, SettingValue::Number(3.0));
    assert_eq!(settings.load().unwrap().approval_level, 3);

    let entry = settings.set_value(&admin, " auto_approve ", "true").unwrap();
    assert_eq!(entry.key, "auto_approve");
    assert_eq!(entry.value, SettingValue::Boolean(true));

    assert!(matches!(
        settings.set_value(&admin, "serial_digits", "abc"),
        Err(ServiceError::Validation(ValidationError::InvalidSettingValue { ref key, ref value }))
            if key == "serial_digits" && value == "abc"
    ));
    assert!(matches!(
        settings.set_value(&admin, "approval_level", "5"),
        Err(ServiceError::Validation(ValidationError::OutOfRange {
            field: "approval_level",
            value: 5,
            ..
        }))
    ));
    assert_eq!(settings.load().unwrap().approval_level, 3);
}

#[test]
fn fractional_values_for_whole_number_keys_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let (admin, _) = admin_and_approver(&conn);
    let settings = SettingsService::new(SqliteSettingsRepository::try_new(&conn).unwrap());
    let before = settings.load().unwrap();

    assert!(matches!(
        settings.set_value(&admin, "serial_digits", "4.5"),
        Err(ServiceError::Validation(ValidationError::InvalidSettingValue { ref key, ref value }))
            if key == "serial_digits" && value == "4.5"
    ));
    assert!(matches!(
        settings.set_value(&admin, "auto_approve", "yes"),
        Err(ServiceError::Validation(ValidationError::InvalidSettingValue { .. }))
    ));
    assert_eq!(settings.load().unwrap(), before);
    let stored = settings
        .entries()
        .unwrap()
        .into_iter()
        .find(|entry| entry.key == "serial_digits")
        .unwrap();
    assert_eq!(
        stored.value,
        SettingValue::Number(f64::from(before.serial_digits))
    );
}

#[test]
fn unknown_keys_are_stored_as_text() {
    let conn = open_db_in_memory().unwrap();
    let (admin, approver) = admin_and_approver(&conn);
    let settings = SettingsService::new(SqliteSettingsRepository::try_new(&conn).unwrap());

    let entry = settings
        .set_value(&admin, "company_name", "Acme Hardware")
        .unwrap();
    assert_eq!(entry.value, SettingValue::Text("Acme Hardware".to_string()));
    assert!(entry.updated_at > 0);
    assert_eq!(settings.entries().unwrap().len(), 6);

    assert!(matches!(
        settings.set_value(&approver, "company_name", "Other"),
        Err(ServiceError::PermissionDenied { .. })
    ));
}

#[test]
fn reset_restores_defaults() {
    let conn = open_db_in_memory().unwrap();
    let (admin, _) = admin_and_approver(&conn);
    let settings = SettingsService::new(SqliteSettingsRepository::try_new(&conn).unwrap());

    settings
        .save(
            &admin,
            &SystemSettings {
                serial_digits: 4,
                serial_start: 50,
                email_notify: false,
                ..SystemSettings::default()
            },
        )
        .unwrap();
    assert_eq!(settings.reset(&admin).unwrap(), SystemSettings::default());
    assert_eq!(settings.load().unwrap(), SystemSettings::default());
}
