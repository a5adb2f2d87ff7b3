// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query operations over the conversation store.
//!
//! Every public function here is one transaction: the closure handed to
//! `connection().call()` runs to completion on the single writer thread, so
//! partial writes are never observable to other readers.

pub mod conversations;
pub mod followups;
pub mod leads;
pub mod messages;

/// Parse a TEXT column into a strum-backed enum, surfacing failures as a
/// rusqlite conversion error so `?` works inside row mappers.
pub(crate) fn parse_col<T: std::str::FromStr>(idx: usize, value: String) -> Result<T, rusqlite::Error>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
