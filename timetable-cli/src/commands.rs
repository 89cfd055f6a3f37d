//! Command execution.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;
use timetable_core::{
    ApiClient, Database, LoginRequest, PdfDownload, RegisterRequest, ResourceService, Role,
    Settings, TimetableQuery, TimetableService, UserService,
};

use crate::cli::{ConfigAction, ConfigKey, Filters, ResourceAction, RoleArg, TimetableAction};

impl From<Filters> for TimetableQuery {
    fn from(filters: Filters) -> Self {
        Self {
            department: filters.department,
            semester: filters.semester,
            shift: filters.shift,
        }
    }
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Role::Admin,
            RoleArg::Student => Role::Student,
        }
    }
}

fn print_json(value: &JsonValue) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_payload(data: &str) -> Result<JsonValue> {
    let value: JsonValue = serde_json::from_str(data).context("Payload is not valid JSON")?;
    if !value.is_object() {
        bail!("Payload must be a JSON object");
    }
    Ok(value)
}

pub async fn login(client: &ApiClient, user: String, password: String) -> Result<()> {
    let session = UserService::new(client)
        .login(&LoginRequest {
            username_or_email: user,
            password,
        })
        .await?;
    println!("Logged in as {}", session.user.username);
    Ok(())
}

pub async fn register(client: &ApiClient, request: RegisterRequest) -> Result<()> {
    let session = UserService::new(client).register(&request).await?;
    println!("Registered {}", session.user.username);
    Ok(())
}

pub fn logout(client: &ApiClient) -> Result<()> {
    UserService::new(client).logout()?;
    println!("Logged out");
    Ok(())
}

pub fn whoami(client: &ApiClient) -> Result<()> {
    match UserService::new(client).current_user()? {
        Some(user) => print_json(&serde_json::to_value(user)?),
        None => {
            println!("Not logged in");
            Ok(())
        }
    }
}

pub async fn profile(client: &ApiClient) -> Result<()> {
    print_json(&UserService::new(client).profile().await?)
}

pub async fn resource(service: ResourceService<'_>, action: ResourceAction) -> Result<()> {
    let result = match action {
        ResourceAction::List => service.list().await?,
        ResourceAction::Get { id } => service.get(&id).await?,
        ResourceAction::Add { data } => service.create(parse_payload(&data)?).await?,
        ResourceAction::Update { id, data } => service.update(&id, parse_payload(&data)?).await?,
        ResourceAction::Delete { id } => service.delete(&id).await?,
    };
    print_json(&result)
}

pub async fn timetable(client: &ApiClient, action: TimetableAction) -> Result<()> {
    let service = TimetableService::new(client);
    let result = match action {
        TimetableAction::Generate { data } => service.generate(parse_payload(&data)?).await?,
        TimetableAction::Show { filters } => service.get(&filters.into()).await?,
        TimetableAction::Edit { id, data } => service.edit_entry(&id, parse_payload(&data)?).await?,
        TimetableAction::Download { filters, output } => {
            return save_pdf(service.download_pdf(&filters.into()).await?, &output);
        }
        TimetableAction::Send { data } => service.send_email(parse_payload(&data)?).await?,
        TimetableAction::SendAll => service.send_to_all().await?,
        TimetableAction::StudentShow { filters } => service.student_view(&filters.into()).await?,
        TimetableAction::StudentDownload { filters, output } => {
            return save_pdf(service.student_download_pdf(&filters.into()).await?, &output);
        }
    };
    print_json(&result)
}

fn save_pdf(pdf: PdfDownload, dir: &Path) -> Result<()> {
    let path = pdf
        .save_in(dir)
        .with_context(|| format!("Failed to write {}", dir.join(&pdf.filename).display()))?;
    println!("Saved {}", path.display());
    Ok(())
}

/// `config` works on stored settings and never touches the network.
pub fn config(db: &Database, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut value = serde_json::to_value(Settings::load(db))?;
            value["database"] = JsonValue::String(db.path().display().to_string());
            print_json(&value)
        }
        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load_stored(db);
            apply_setting(&mut settings, key, &value)?;
            settings.validate();
            settings.save(db)?;
            print_json(&serde_json::to_value(&settings)?)
        }
    }
}

fn apply_setting(settings: &mut Settings, key: ConfigKey, value: &str) -> Result<()> {
    match key {
        ConfigKey::BaseUrl => settings.base_url = value.to_string(),
        ConfigKey::RefreshPath => settings.refresh_path = value.to_string(),
        ConfigKey::RequestTimeout => settings.request_timeout_secs = Some(parse_secs(value)?),
        ConfigKey::RefreshTimeout => settings.refresh_timeout_secs = Some(parse_secs(value)?),
    }
    Ok(())
}

fn parse_secs(value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("Expected a number of seconds, got {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_requires_object() {
        assert!(parse_payload(r#"{"roomNumber": "B-12"}"#).is_ok());
        assert!(parse_payload("[1, 2]").is_err());
        assert!(parse_payload("{oops").is_err());
    }

    #[test]
    fn test_apply_setting() {
        let mut settings = Settings::default();

        apply_setting(&mut settings, ConfigKey::RefreshTimeout, "15").unwrap();
        apply_setting(&mut settings, ConfigKey::BaseUrl, "https://timetable.example.edu/").unwrap();
        settings.validate();

        assert_eq!(settings.refresh_timeout_secs, Some(15));
        assert_eq!(settings.base_url, "https://timetable.example.edu");
        assert!(apply_setting(&mut settings, ConfigKey::RequestTimeout, "soon").is_err());
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let mut settings = Settings::default();
        apply_setting(&mut settings, ConfigKey::RequestTimeout, "0").unwrap();
        settings.validate();
        assert_eq!(settings.request_timeout_secs, None);
    }

    #[test]
    fn test_config_set_persists() {
        let db = Database::open_in_memory().unwrap();

        config(
            &db,
            ConfigAction::Set {
                key: ConfigKey::RefreshPath,
                value: "users/refresh-token".to_string(),
            },
        )
        .unwrap();

        assert_eq!(Settings::load_stored(&db).refresh_path, "/users/refresh-token");
    }
}
