//! Typed views over settings groups

/// Declares a typed view over one settings group
///
/// The generated `register` declares every field with its default and
/// returns the view; each field gets a getter returning its Rust type.
/// A field followed by `=> name` also gets a typed setter `name`, writing
/// through [`Group::set`](crate::Group::set).
///
/// ```ignore
/// settings_group! {
/// 	/// Outgoing mail
/// 	pub struct MailSettings("mail") {
/// 		host: String = "localhost" => set_host,
/// 		port: i64 = 25 => set_port,
/// 		tls: bool = false,
/// 	}
/// }
///
/// let mail = MailSettings::register(&settings)?;
/// mail.set_port(587)?;
/// assert_eq!(mail.port()?, 587);
/// ```
#[macro_export]
macro_rules! settings_group {
	(
		$(#[$meta:meta])*
		$vis:vis struct $view:ident ($group:literal) {
			$(
				$(#[$fmeta:meta])*
				$field:ident : $fty:ty = $default:expr $(=> $setter:ident)?
			),* $(,)?
		}
	) => {
		$(#[$meta])*
		#[derive(Debug, Clone)]
		$vis struct $view {
			group: ::std::sync::Arc<$crate::Group>,
		}

		impl $view {
			pub const NAME: &'static str = $group;

			pub fn register(settings: &$crate::Settings) -> $crate::StResult<Self> {
				let group = settings.register($group, "", "");
				$(
					let default: $fty = ::core::convert::Into::into($default);
					group.register(
						$crate::SchemaNode::builder(
							stringify!($field),
							<$fty as $crate::SettingType>::FIELD_TYPE,
						)
						.default($crate::SettingType::into_value(default))
						.build()?,
					)?;
				)*
				Ok(Self { group })
			}

			pub fn group(&self) -> &::std::sync::Arc<$crate::Group> {
				&self.group
			}

			$(
				$(#[$fmeta])*
				pub fn $field(&self) -> $crate::StResult<$fty> {
					self.group.get_as::<$fty>(stringify!($field))
				}

				$(
					#[doc = concat!("Writes `", stringify!($field), "`, returns whether it changed")]
					pub fn $setter(&self, value: $fty) -> $crate::StResult<bool> {
						self.group.set(stringify!($field), $crate::SettingType::into_value(value))
					}
				)?
			)*
		}
	};
}

#[cfg(test)]
mod tests {
	use crate::{Error, Settings};

	crate::settings_group! {
		/// Outgoing mail
		pub struct MailSettings("mail") {
			/// SMTP host
			host: String = "localhost" => set_host,
			port: i64 = 25 => set_port,
			tls: bool = false,
			relays: Vec<String> = Vec::new() => set_relays,
		}
	}

	#[test]
	fn test_typed_view() {
		let settings = Settings::new();
		let mail = MailSettings::register(&settings).expect("view registers");
		assert_eq!(MailSettings::NAME, "mail");
		assert_eq!(mail.host().ok().as_deref(), Some("localhost"));
		assert_eq!(mail.port().ok(), Some(25));
		assert_eq!(mail.tls().ok(), Some(false));
		assert_eq!(mail.relays().ok(), Some(Vec::new()));

		mail.group().set("port", 587i64).expect("set");
		assert_eq!(mail.port().ok(), Some(587));
		assert!(matches!(mail.group().set("tls", 1i64), Err(Error::TypeMismatch { .. })));
	}

	#[test]
	fn test_typed_setters() {
		let settings = Settings::new();
		let mail = MailSettings::register(&settings).expect("view registers");

		assert_eq!(mail.set_host("smtp.example".to_string()).ok(), Some(true));
		assert_eq!(mail.set_port(25).ok(), Some(false));
		mail.set_relays(vec!["a.example".into(), "b.example".into()]).expect("set relays");

		assert_eq!(mail.host().ok().as_deref(), Some("smtp.example"));
		assert_eq!(mail.relays().ok().map(|r| r.len()), Some(2));
		assert!(settings.is_changed());
	}
}

// vim: ts=4
