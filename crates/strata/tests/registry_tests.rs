//! Registry lifecycle, layering and export tests

mod common;

use std::sync::Arc;

use common::{raw, site_settings};
use parking_lot::Mutex;
use strata::{
	Error, GroupDef, Invalid, MemoryStorage, SchemaNode, Settings, SettingsEvent, Value, group_check, init_settings,
};

#[test]
fn test_layering_order() {
	let settings = Settings::new();
	let g = settings.register("g", "", "");
	g.register(SchemaNode::new("a", 0i64)).expect("a registers");
	g.register(SchemaNode::new("b", 0i64)).expect("b registers");

	let backend = MemoryStorage::new(raw(&[("g.a", "4")])).with_defaults(raw(&[("g.a", "2"), ("g.b", "3")]));
	settings.init(Some(Arc::new(backend)), Some(&raw(&[("g.a", "1")]))).expect("init succeeds");

	assert_eq!(g.get("a").ok(), Some(Value::Int(4)));
	assert_eq!(g.get("b").ok(), Some(Value::Int(3)));
	assert_eq!(g.schema().ok().and_then(|s| s.get("a").map(|n| n.default.clone())), Some(Value::Int(2)));
	assert_eq!(settings.export(false), raw(&[("g.a", "4")]));
}

#[test]
fn test_export_suppresses_defaults_for_every_group() {
	let settings = site_settings();
	settings
		.register_group(
			GroupDef::new("mail")
				.field(SchemaNode::new("host", "localhost"))
				.field(SchemaNode::new("tls", false)),
		)
		.expect("mail registers");
	settings.init(None, None).expect("init succeeds");

	assert!(settings.export(false).is_empty());
	assert_eq!(settings.export(true).len(), 5);

	settings.group("mail").and_then(|g| g.set("tls", true)).expect("set");
	settings.group("site").and_then(|g| g.set("port", 8080i64)).expect("set");
	assert_eq!(settings.export(false), raw(&[("mail.tls", "true")]));

	// Back to its default: dropped again
	settings.group("mail").and_then(|g| g.set("tls", false)).expect("set");
	assert!(settings.export(false).is_empty());

	let nested = settings.export_nested(true);
	assert_eq!(nested["site"]["title"], "Untitled");
	assert_eq!(nested["mail"]["host"], "localhost");
}

#[test]
fn test_load_reloads_live_layer_only() {
	let settings = site_settings();
	let backend = Arc::new(
		MemoryStorage::new(raw(&[("site.port", "81")])).with_defaults(raw(&[("site.title", "Defaulted")])),
	);
	settings.init(Some(backend.clone()), None).expect("init succeeds");

	backend.replace(raw(&[("site.port", "82"), ("site.debug", "yes")]));
	settings.load().expect("reload");

	let site = settings.group("site").expect("site group");
	assert_eq!(site.get_int("port").ok(), Some(82));
	assert_eq!(site.get_bool("debug").ok(), Some(true));
	assert_eq!(site.get_str("title").ok().as_deref(), Some("Defaulted"));
	assert!(!settings.is_changed());
}

#[test]
fn test_init_settings_events_and_app_defaults() {
	let settings = site_settings();
	let log = Arc::new(Mutex::new(Vec::<String>::new()));

	let seen = log.clone();
	let observed = settings.clone();
	settings.subscribe(move |event| {
		let entry = match event {
			SettingsEvent::Initializing { app } => {
				// Nothing loaded yet
				let port = observed.group("site").and_then(|g| g.get_int("port")).unwrap_or_default();
				format!("initializing {} {}", app.len(), port)
			}
			SettingsEvent::Initialized { .. } => "initialized".to_string(),
			SettingsEvent::GroupModified { group, fields } => format!("modified {} {}", group, fields.join(",")),
		};
		seen.lock().push(entry);
	});

	let app = raw(&[("site.port", "3000"), ("unrelated", "x")]);
	init_settings(&settings, &app, Some(Arc::new(MemoryStorage::default()))).expect("init succeeds");

	assert_eq!(
		*log.lock(),
		vec!["initializing 2 8080".to_string(), "modified site port".to_string(), "initialized".to_string()]
	);
	// Application settings are defaults: nothing to export
	assert!(settings.export(false).is_empty());
	assert!(matches!(init_settings(&settings, &app, None), Err(Error::AlreadyInitialized)));
}

#[test]
fn test_invalid_main_file_reports_all_fields() {
	let settings = site_settings();
	let backend = MemoryStorage::new(raw(&[("site.port", "http"), ("site.debug", "sometimes"), ("site.title", "ok")]));

	match settings.init(Some(Arc::new(backend)), None) {
		Err(Error::Invalid(err)) => {
			assert_eq!(err.paths(), vec!["site.debug".to_string(), "site.port".to_string()]);
			assert!(err.to_string().contains("\"http\" is not a number"));
		}
		other => unreachable!("expected a validation error, got {:?}", other),
	}
}

#[test]
fn test_group_checks_span_layers() {
	let settings = Settings::new();
	let site = settings
		.register_group(
			GroupDef::new("site")
				.field(SchemaNode::new("hosts", Value::Lines(Vec::new())))
				.field(SchemaNode::new("debug", false))
				.check(group_check(|v| {
					let public = v.get("hosts").and_then(Value::as_lines).is_some_and(|h| !h.is_empty());
					if public && v.get("debug") == Some(&Value::Bool(true)) {
						Err(Invalid::new("debug", "debug mode cannot be enabled on public hosts"))
					} else {
						Ok(())
					}
				})),
		)
		.expect("site registers");

	let backend =
		MemoryStorage::new(raw(&[("site.debug", "true")])).with_defaults(raw(&[("site.hosts", "a.example")]));
	match settings.init(Some(Arc::new(backend)), None) {
		Err(Error::Invalid(err)) => assert_eq!(err.paths(), vec!["site.debug".to_string()]),
		other => unreachable!("expected a validation error, got {:?}", other),
	}
	// The rejected layer left nothing behind
	assert_eq!(site.get_bool("debug").ok(), Some(false));
}

#[test]
fn test_values_render_as_json() {
	let settings = site_settings();
	settings.init(None, None).expect("init succeeds");
	let values = settings.group("site").and_then(|g| g.values()).expect("values");

	assert_eq!(
		serde_json::to_value(&values).expect("values serialize"),
		serde_json::json!({ "debug": false, "port": 8080, "title": "Untitled" })
	);
	assert_eq!(
		serde_json::to_value(settings.export_nested(true)).expect("export serializes"),
		serde_json::json!({ "site": { "debug": "false", "port": "8080", "title": "Untitled" } })
	);
}

#[test]
fn test_group_outliving_registry() {
	let group = {
		let settings = site_settings();
		settings.group("site").expect("site group")
	};
	assert!(matches!(group.get("port"), Err(Error::ConfigError(_))));
}

// vim: ts=4
