use std::fmt;

use crate::err::Error;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Reason {
	Canceled,
}

impl fmt::Display for Reason {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			Reason::Canceled => write!(f, "Context canceled"),
		}
	}
}

impl From<Reason> for Error {
	fn from(reason: Reason) -> Self {
		match reason {
			Reason::Canceled => Error::QueryCancelled,
		}
	}
}
