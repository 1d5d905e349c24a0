//! Subcommand handlers.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use matcode_core::model::application::ApplicationDraft;
use matcode_core::model::user::Actor;
use matcode_core::repo::application_repo::ApplicationListQuery;
use matcode_core::repo::category_repo::SqliteCategoryRepository;
use matcode_core::repo::option_repo::{OptionRepository, SqliteOptionRepository, SystemOption};
use matcode_core::repo::settings_repo::SqliteSettingsRepository;
use matcode_core::repo::user_repo::SqliteUserRepository;
use matcode_core::service::category_service::CategoryService;
use matcode_core::service::export_service::format_timestamp;
use matcode_core::service::settings_service::SettingsService;
use matcode_core::service::user_service::UserService;
use matcode_core::{
    ApplicationService, ApplicationStatus, CodeService, ExportRequest, ExportService,
};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

pub struct ListArgs<'a> {
    pub status: &'a str,
    pub item_code: Option<String>,
    pub applicant: Option<String>,
    pub main: Option<String>,
    pub limit: Option<u32>,
    pub json: bool,
}

pub fn start_logging(level: &str, log_dir: &Path) -> Result<()> {
    let log_dir = if log_dir.is_absolute() {
        log_dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(log_dir)
    };
    matcode_core::init_logging(level, &log_dir)?;
    Ok(())
}

pub fn init(conn: &Connection, admin: &str) -> Result<()> {
    let users = UserService::new(SqliteUserRepository::try_new(conn)?);
    let profile = users.bootstrap_admin(admin)?;
    println!("created admin `{}` ({})", profile.username, profile.id);
    Ok(())
}

pub fn categories(conn: &Connection, main: Option<&str>) -> Result<()> {
    let tree = CategoryService::new(SqliteCategoryRepository::try_new(conn)?).tree()?;
    for (code, branch) in &tree.branches {
        if main.is_some_and(|wanted| !wanted.eq_ignore_ascii_case(code)) {
            continue;
        }
        println!("{}", branch.main.label());
        for sub in branch.sub_categories.values() {
            println!("  sub  {}", sub.label());
        }
        for spec in branch.spec_categories.values() {
            println!("  spec {}", spec.label());
        }
    }
    Ok(())
}

pub fn options(conn: &Connection, module: &str, cate: Option<&str>) -> Result<()> {
    let repo = SqliteOptionRepository::try_new(conn)?;
    let dictionaries: BTreeMap<String, Vec<SystemOption>> = match cate {
        Some(cate) => [(cate.to_string(), repo.list_options(module, cate, None)?)]
            .into_iter()
            .collect(),
        None => repo.list_module_options(module)?,
    };
    for (cate, entries) in &dictionaries {
        println!("{cate}");
        for option in entries {
            println!(
                "  {:<4} {}",
                option.key,
                option.label.as_deref().unwrap_or(&option.value)
            );
        }
    }
    Ok(())
}

pub fn code_preview(conn: &Connection, main: &str, sub: &str, spec: &str) -> Result<()> {
    let code = CodeService::new(conn).preview_item_code(main, sub, spec)?;
    println!("{code}");
    Ok(())
}

pub fn submit(conn: &Connection, as_user: Option<&str>, file: &Path) -> Result<()> {
    let actor = sign_in(conn, as_user)?;
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read draft `{}`", file.display()))?;
    let draft: ApplicationDraft = serde_json::from_str(&raw)
        .with_context(|| format!("invalid draft JSON in `{}`", file.display()))?;
    let application = ApplicationService::new(conn).submit(&actor, draft)?;
    println!("{}", serde_json::to_string_pretty(&application)?);
    Ok(())
}

pub fn list(conn: &Connection, as_user: Option<&str>, args: ListArgs<'_>) -> Result<()> {
    let actor = sign_in(conn, as_user)?;
    let query = ApplicationListQuery {
        status: parse_status(args.status)?,
        item_code: args.item_code,
        applicant: args.applicant,
        main_category: args.main,
        limit: args.limit,
        ..ApplicationListQuery::default()
    };
    let applications = ApplicationService::new(conn).search(&actor, &query)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&applications)?);
        return Ok(());
    }
    for application in &applications {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            application.id,
            application.item_code,
            application.status,
            application.applicant_name,
            format_timestamp(application.submit_date),
            application.item_name_cn
        );
    }
    println!("{} application(s)", applications.len());
    Ok(())
}

pub fn approve(
    conn: &Connection,
    as_user: Option<&str>,
    id: Uuid,
    comment: Option<&str>,
) -> Result<()> {
    let actor = sign_in(conn, as_user)?;
    let application = ApplicationService::new(conn).approve(&actor, id, comment)?;
    println!(
        "{} {} level={}",
        application.item_code,
        application.approval_status.as_str(),
        application.approval_level
    );
    Ok(())
}

pub fn reject(
    conn: &Connection,
    as_user: Option<&str>,
    id: Uuid,
    reason: &str,
    comment: Option<&str>,
) -> Result<()> {
    let actor = sign_in(conn, as_user)?;
    let application = ApplicationService::new(conn).reject(&actor, id, reason, comment)?;
    println!("{} {}", application.item_code, application.status);
    Ok(())
}

pub fn export(
    conn: &Connection,
    as_user: Option<&str>,
    output: &Path,
    main: Option<String>,
    status: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let actor = sign_in(conn, as_user)?;
    let request = ExportRequest {
        main_category: main,
        status: parse_status(status)?,
        date_from: from.map(|value| day_bound(value, NaiveTime::MIN)).transpose()?,
        date_to: to
            .map(|value| day_bound(value, end_of_day()))
            .transpose()?,
        file_name: output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        file_path: Some(output.display().to_string()),
        ..ExportRequest::default()
    };
    let exported = ExportService::new(conn)
        .export_to(&actor, &request, |content| std::fs::write(output, content))
        .with_context(|| format!("failed to export to `{}`", output.display()))?;
    println!(
        "exported {} record(s) to {}",
        exported.log.record_count,
        output.display()
    );
    Ok(())
}

pub fn settings_show(conn: &Connection) -> Result<()> {
    let settings = SettingsService::new(SqliteSettingsRepository::try_new(conn)?);
    for entry in settings.entries()? {
        println!("{} = {}", entry.key, entry.value.encode());
    }
    Ok(())
}

pub fn settings_set(conn: &Connection, as_user: Option<&str>, key: &str, value: &str) -> Result<()> {
    let actor = sign_in(conn, as_user)?;
    let settings = SettingsService::new(SqliteSettingsRepository::try_new(conn)?);
    let entry = settings.set_value(&actor, key, value)?;
    println!("{} = {}", entry.key, entry.value.encode());
    Ok(())
}

fn sign_in(conn: &Connection, as_user: Option<&str>) -> Result<Actor> {
    let Some(username) = as_user else {
        bail!("this command needs `--as <username>`");
    };
    let users = UserService::new(SqliteUserRepository::try_new(conn)?);
    Ok(users.sign_in(username)?)
}

fn parse_status(value: &str) -> Result<Option<ApplicationStatus>> {
    let value = value.trim().to_ascii_uppercase();
    if value == "ALL" {
        return Ok(None);
    }
    ApplicationStatus::parse(&value)
        .map(Some)
        .ok_or_else(|| anyhow!("unknown status `{value}`; expected PENDING|APPROVED|REJECTED|ALL"))
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}

/// Epoch milliseconds of `date` (`YYYY-MM-DD`, UTC) at `time`.
fn day_bound(date: &str, time: NaiveTime) -> Result<i64> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date `{date}`; expected YYYY-MM-DD"))?;
    Ok(date.and_time(time).and_utc().timestamp_millis())
}
