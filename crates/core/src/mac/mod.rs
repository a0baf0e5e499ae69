/// A macro that allows lazily parsing a value from the environment variable,
/// with a fallback default value if the variable is not set or parsing fails.
///
/// # Parameters
///
/// - `$key`: An expression representing the name of the environment variable.
/// - `$t`: The type of the value to be parsed.
/// - `$default`: The default value to fall back to if the environment variable is not set or
///   parsing fails.
///
/// # Return Value
///
/// A lazy static variable of type `std::sync::LazyLock`, which holds the parsed
/// value from the environment variable or the default value.
#[macro_export]
macro_rules! lazy_env_parse {
	// With no default specified
	($key:expr_2021, $t:ty) => {
		std::sync::LazyLock::new(|| {
			std::env::var($key).ok().and_then(|s| s.parse::<$t>().ok()).unwrap_or_default()
		})
	};
	// With a closure for the default value
	($key:expr_2021, $t:ty, || $default:expr_2021) => {
		std::sync::LazyLock::new(|| {
			std::env::var($key).ok().and_then(|s| s.parse::<$t>().ok()).unwrap_or_else(|| $default)
		})
	};
	// With a static expression for the default value
	($key:expr_2021, $t:ty, $default:expr_2021) => {
		std::sync::LazyLock::new(|| {
			std::env::var($key).ok().and_then(|s| s.parse::<$t>().ok()).unwrap_or($default)
		})
	};
}

/// Creates a new document from a list of field-value pairs.
///
/// Fields are kept in the order they are written, and
/// every value is converted with `Value::from`.
#[macro_export]
macro_rules! doc {
	($($k:expr_2021 => $v:expr_2021),* $(,)?) => {{
		let mut d = $crate::val::Document::default();
		$( d.insert($k, $crate::val::Value::from($v)); )*
		d
	}};
}

/// Creates a new key from a list of values.
#[macro_export]
macro_rules! key {
	($($v:expr_2021),* $(,)?) => {
		$crate::key::Key::from(vec![$($crate::val::Value::from($v)),*])
	};
}

/// Throws an unreachable error with location details
macro_rules! fail {
	($($arg:tt)+) => {
		return Err(::anyhow::Error::new($crate::err::Error::unreachable(format_args!($($arg)*))))
	};
}
