use matcode_core::model::application::ApplicationDraft;
use matcode_core::model::export_log::ExportFormat;
use matcode_core::model::packaging::{PackagingSection, PackagingSelection};
use matcode_core::model::user::{Actor, Role, UserProfile};
use matcode_core::repo::export_log_repo::ExportLogQuery;
use matcode_core::repo::user_repo::SqliteUserRepository;
use matcode_core::service::user_service::UserService;
use matcode_core::{
    open_db_in_memory, ApplicationService, ApplicationStatus, ExportRequest, ExportService,
    ServiceError,
};
use rusqlite::Connection;

fn setup(conn: &Connection) -> (Actor, Actor) {
    let users = UserService::new(SqliteUserRepository::try_new(conn).unwrap());
    let admin = users.bootstrap_admin("admin").unwrap().actor();
    let alice = users
        .create(&admin, UserProfile::new("alice", Role::Applicant))
        .unwrap()
        .actor();
    (admin, alice)
}

fn submit(conn: &Connection, actor: &Actor, code: (&str, &str, &str), name: &str) {
    let (main, sub, spec) = code;
    ApplicationService::new(conn)
        .submit(
            actor,
            ApplicationDraft {
                main_category: main.into(),
                sub_category: sub.into(),
                spec_category: spec.into(),
                item_name_cn: name.into(),
                ..ApplicationDraft::default()
            },
        )
        .unwrap();
}

#[test]
fn export_defaults_to_approved_rows_grouped_by_main_category() {
    let conn = open_db_in_memory().unwrap();
    let (admin, alice) = setup(&conn);
    let applications = ApplicationService::new(&conn);

    submit(&conn, &alice, ("S", "01", "B"), "slide");
    submit(&conn, &alice, ("H", "01", "C"), "knob, chrome");
    submit(&conn, &alice, ("H", "01", "C"), "knob pending");
    let mut packaged = ApplicationDraft {
        main_category: "H".into(),
        sub_category: "01".into(),
        spec_category: "A".into(),
        item_name_cn: "knob \"alu\"".into(),
        ..ApplicationDraft::default()
    };
    packaged.packaging.insert(
        PackagingSection::Transport,
        PackagingSelection {
            options: vec!["pallet".into(), "stretch_film".into()],
            description: Some("max 1.2m".into()),
        },
    );
    applications.submit(&alice, packaged).unwrap();

    for code in ["S01.B.00001", "H01.C.00001", "H01.A.00001"] {
        let app = applications.find_by_item_code(&admin, code).unwrap();
        applications.approve(&admin, app.id, None).unwrap();
    }

    let output = ExportService::new(&conn)
        .export(&alice, &ExportRequest::default())
        .unwrap();

    let lines: Vec<_> = output
        .content
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("Item Code,Main Category,Sub Category,Spec Category,"));
    assert!(lines[1].starts_with("H01.A.00001,H,01,A,\"knob \"\"alu\"\"\","));
    assert!(lines[1].contains("\"[pallet, stretch_film] | max 1.2m\""));
    assert!(lines[2].starts_with("H01.C.00001,H,01,C,\"knob, chrome\","));
    assert!(lines[3].starts_with("S01.B.00001,S,01,B,slide,"));
    assert!(lines.iter().all(|line| !line.contains("knob pending")));

    assert_eq!(output.log.record_count, 3);
    assert_eq!(output.log.format, ExportFormat::Csv);
    assert_eq!(output.log.status.as_deref(), Some("APPROVED"));
    assert_eq!(output.log.exported_by_id, alice.user_id);
    assert_eq!(output.log.file_size, Some(output.content.len() as i64));
    assert!(output.log.file_name.starts_with("material_codes_"));
    assert!(output.log.file_name.ends_with(".csv"));
}

#[test]
fn export_filters_by_category_and_status() {
    let conn = open_db_in_memory().unwrap();
    let (_, alice) = setup(&conn);
    submit(&conn, &alice, ("H", "01", "C"), "knob");
    submit(&conn, &alice, ("M", "01", "D"), "drawer");

    let output = ExportService::new(&conn)
        .export(
            &alice,
            &ExportRequest {
                main_category: Some("M".into()),
                status: Some(ApplicationStatus::Pending),
                file_name: Some("drawers.csv".into()),
                file_path: Some("/exports/drawers.csv".into()),
                ..ExportRequest::default()
            },
        )
        .unwrap();

    assert_eq!(output.log.record_count, 1);
    assert_eq!(output.log.category.as_deref(), Some("M"));
    assert_eq!(output.log.file_name, "drawers.csv");
    assert_eq!(output.log.file_path.as_deref(), Some("/exports/drawers.csv"));
    assert!(output.content.contains("M01.D.00001"));
    assert!(!output.content.contains("H01.C.00001"));

    let everything = ExportService::new(&conn)
        .export(
            &alice,
            &ExportRequest {
                status: None,
                ..ExportRequest::default()
            },
        )
        .unwrap();
    assert_eq!(everything.log.record_count, 2);
    assert_eq!(everything.log.status, None);
}

#[test]
fn unsupported_formats_record_nothing() {
    let conn = open_db_in_memory().unwrap();
    let (admin, _) = setup(&conn);
    let exports = ExportService::new(&conn);

    for format in [ExportFormat::Xlsx, ExportFormat::Pdf] {
        let err = exports
            .export(
                &admin,
                &ExportRequest {
                    format,
                    ..ExportRequest::default()
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::UnsupportedExportFormat(name) if name == format.as_str()
        ));
    }
    assert!(exports
        .history(&admin, &ExportLogQuery::default())
        .unwrap()
        .is_empty());
}

#[test]
fn history_and_download_counter() {
    let conn = open_db_in_memory().unwrap();
    let (admin, alice) = setup(&conn);
    let exports = ExportService::new(&conn);

    let first = exports.export(&alice, &ExportRequest::default()).unwrap();
    let second = exports.export(&admin, &ExportRequest::default()).unwrap();
    assert_eq!(first.log.record_count, 0);
    assert_eq!(first.content.lines().count(), 1);

    let history: Vec<_> = exports
        .history(&admin, &ExportLogQuery::default())
        .unwrap()
        .into_iter()
        .map(|log| log.id)
        .collect();
    assert_eq!(history, vec![second.log.id, first.log.id]);

    let mine = exports
        .history(
            &admin,
            &ExportLogQuery {
                exported_by: Some(alice.user_id),
                ..ExportLogQuery::default()
            },
        )
        .unwrap();
    assert_eq!(mine.len(), 1);

    assert_eq!(exports.record_download(&alice, first.log.id).unwrap(), 1);
    assert_eq!(exports.record_download(&alice, first.log.id).unwrap(), 2);
    assert!(matches!(
        exports.record_download(&alice, uuid::Uuid::new_v4()),
        Err(ServiceError::NotFound { .. })
    ));
}

#[test]
fn failed_write_records_no_export() {
    let conn = open_db_in_memory().unwrap();
    let (admin, alice) = setup(&conn);
    submit(&conn, &alice, ("H", "01", "C"), "knob");
    let exports = ExportService::new(&conn);

    let err = exports
        .export_to(&admin, &ExportRequest { status: None, ..ExportRequest::default() }, |_| {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only export directory",
            ))
        })
        .unwrap_err();
    assert!(matches!(err, ServiceError::Storage(_)));
    assert!(exports
        .history(&admin, &ExportLogQuery::default())
        .unwrap()
        .is_empty());

    let mut written = String::new();
    let output = exports
        .export_to(&admin, &ExportRequest { status: None, ..ExportRequest::default() }, |content| {
            written.push_str(content);
            Ok(())
        })
        .unwrap();
    assert_eq!(written, output.content);
    assert_eq!(output.log.record_count, 1);
    assert_eq!(
        exports.history(&admin, &ExportLogQuery::default()).unwrap().len(),
        1
    );
}
