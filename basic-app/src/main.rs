use std::{env, path, time::Duration};

use serde_json::json;
use strata::prelude::*;
use strata::{FieldType, GroupDef, Invalid, RawSettings, SchemaNode, Settings, Watcher, group_check, init_settings};
use strata_storage_adapter_ini::FileStorage;

strata::settings_group! {
	/// Outgoing mail
	pub struct MailSettings("mail") {
		host: String = "localhost",
		port: i64 = 25,
		tls: bool = false,
	}
}

pub struct Config {
	pub settings: path::PathBuf,
	pub defaults: Option<path::PathBuf>,
	pub here: Option<String>,
	pub section: Option<String>,
	pub watch: Option<Duration>,
}

impl Config {
	fn from_env() -> Self {
		Self {
			settings: path::PathBuf::from(env::var("SETTINGS_FILE").unwrap_or_else(|_| "./settings.ini".to_string())),
			defaults: env::var("SETTINGS_DEFAULTS").ok().map(path::PathBuf::from),
			here: env::var("SETTINGS_HERE").ok(),
			section: env::var("SETTINGS_SECTION").ok(),
			watch: env::var("SETTINGS_WATCH").ok().and_then(|s| s.parse().ok()).map(Duration::from_secs),
		}
	}

	/// Application settings in the shape `FileStorage::from_app_settings` reads
	fn app_settings(&self) -> RawSettings {
		let mut app = RawSettings::new();
		app.insert("settings".into(), self.settings.display().to_string());
		if let Some(defaults) = &self.defaults {
			app.insert("defaultsettings".into(), defaults.display().to_string());
		}
		if let Some(here) = &self.here {
			app.insert("here".into(), here.clone());
		}
		app
	}
}

fn register_groups(settings: &Settings) -> StResult<MailSettings> {
	settings.register_group(
		GroupDef::new("site")
			.title("Site")
			.description("Site wide settings")
			.category("general")
			.field(SchemaNode::builder("title", FieldType::Str).default("Strata").title("Site title").build()?)
			.field(
				SchemaNode::builder("port", FieldType::Int)
					.default(8080i64)
					.check(|v| match v.as_int() {
						Some(1..=65535) => Ok(()),
						_ => Err("port must be between 1 and 65535".into()),
					})
					.build()?,
			)
			.field(SchemaNode::new("hosts", Vec::<String>::new()))
			.field(SchemaNode::new("debug", false))
			.check(group_check(|values| {
				let debug = values.get("debug").and_then(strata::Value::as_bool).unwrap_or(false);
				let public = values.get("hosts").and_then(strata::Value::as_lines).is_some_and(|h| !h.is_empty());
				if debug && public {
					Err(Invalid::new("debug", "debug mode cannot be enabled on public hosts"))
				} else {
					Ok(())
				}
			})),
	)?;
	MailSettings::register(settings)
}

fn main() -> StResult<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();

	let config = Config::from_env();
	let app = config.app_settings();
	let mut storage = FileStorage::from_app_settings(&app)?;
	if let Some(section) = &config.section {
		storage = storage.with_section(section);
	}

	let settings = Settings::new();
	let mail = register_groups(&settings)?;
	settings.subscribe(|event| debug!("settings event: {:?}", event));
	init_settings(&settings, &app, Some(std::sync::Arc::new(storage)))?;

	info!("mail relay: {}:{} (tls: {})", mail.host()?, mail.port()?, mail.tls()?);

	let Some(interval) = config.watch else {
		print_settings(&settings);
		return Ok(());
	};

	let mut watcher = Watcher::new(settings.clone(), interval);
	print_settings(&settings);
	loop {
		std::thread::sleep(interval);
		match watcher.check() {
			Ok(true) => print_settings(&settings),
			Ok(false) => {}
			Err(err) => warn!("cannot reload settings: {}", err),
		}
	}
}

fn print_settings(settings: &Settings) {
	let values: serde_json::Map<String, serde_json::Value> = settings
		.groups()
		.iter()
		.filter_map(|g| Some((g.name().to_string(), serde_json::to_value(g.values().ok()?).ok()?)))
		.collect();
	let out = json!({
		"file": settings.backend_path(),
		"values": values,
		"changed": settings.export_nested(false),
	});
	println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
}

// vim: ts=4
