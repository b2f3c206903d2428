// This crate is part of the frcon project.
//
// Copyright (C) 2024  AlphaKeks <alphakeks@dawn>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see https://www.gnu.org/licenses.


#![doc = include_str!("../README.md")]
#![allow(non_ascii_idents, reason = "zerocopy derives expand to non-ASCII identifiers")]

#[macro_use(Debug, Display, Error, From)]
extern crate derive_more as _;

#[macro_use]
extern crate tracing;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod tests;

mod connection;
mod login;
mod pending;
mod reader;
mod retry;
mod tasks;

pub mod wire;

pub mod word;

#[doc(inline)]
pub use word::{Word, words};

pub mod event;

#[doc(inline)]
pub use event::{Event, EventKind, EventStream};

mod config;

#[doc(inline)]
pub use config::SessionConfig;

mod error;

#[doc(inline)]
pub use error::RequestError;

mod session;

#[doc(inline)]
pub use session::{Session, dial, dial_with_config};
