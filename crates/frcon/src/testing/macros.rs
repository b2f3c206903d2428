#![allow(unused_macros, unused_macro_rules)]

macro_rules! assert {
	($cond:expr $(,)?) => {
		anyhow::ensure!($cond, "assertion failed: `{}`", std::stringify!($cond))
	};
	($cond:expr, $msg:literal $(, $($fmt:tt)*)?) => {
		anyhow::ensure!(
			$cond,
			"assertion failed: `{}` ({})",
			std::stringify!($cond),
			std::format_args!($msg $(, $($fmt)*)?),
		)
	};
}

macro_rules! assert_eq {
	($lhs:expr, $rhs:expr $(,)?) => {
		match (&$lhs, &$rhs) {
			(lhs, rhs) => anyhow::ensure!(
				*lhs == *rhs,
				"assertion failed: `{}` == `{}`\n  lhs: {:?}\n  rhs: {:?}",
				std::stringify!($lhs),
				std::stringify!($rhs),
				lhs,
				rhs,
			),
		}
	};
	($lhs:expr, $rhs:expr, $msg:literal $(, $($fmt:tt)*)?) => {
		match (&$lhs, &$rhs) {
			(lhs, rhs) => anyhow::ensure!(
				*lhs == *rhs,
				"assertion failed: `{}` == `{}` ({})\n  lhs: {:?}\n  rhs: {:?}",
				std::stringify!($lhs),
				std::stringify!($rhs),
				std::format_args!($msg $(, $($fmt)*)?),
				lhs,
				rhs,
			),
		}
	};
}

macro_rules! assert_matches {
	($expr:expr, $pat:pat $(if $guard:expr)? $(,)?) => {
		match &$expr {
			value => anyhow::ensure!(
				std::matches!(value, $pat $(if $guard)?),
				"assertion failed: `{}` does not match `{}`\n  value: {:?}",
				std::stringify!($expr),
				std::stringify!($pat),
				value,
			),
		}
	};
}

pub(crate) use {assert, assert_eq, assert_matches};
