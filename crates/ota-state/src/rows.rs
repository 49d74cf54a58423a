//! Row encoding and table scans shared by read and write transactions.

use redb::ReadableTable;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StateResult;

pub(crate) fn encode<T: Serialize>(row: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(row).map_err(map_err!(Encode))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Decode))
}

/// Point lookup by id.
pub(crate) fn get_row<T, R>(table: &R, id: u64) -> StateResult<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<u64, &'static [u8]>,
{
    match table.get(id).map_err(map_err!(Read))? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

/// Newest-first scan keeping at most `limit` rows accepted by `keep`.
pub(crate) fn scan_desc<T, R>(
    table: &R,
    limit: usize,
    mut keep: impl FnMut(&T) -> bool,
) -> StateResult<Vec<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<u64, &'static [u8]>,
{
    let mut results = Vec::new();
    if limit == 0 {
        return Ok(results);
    }
    for entry in table.iter().map_err(map_err!(Read))?.rev() {
        let (_, value) = entry.map_err(map_err!(Read))?;
        let row: T = decode(value.value())?;
        if keep(&row) {
            results.push(row);
            if results.len() >= limit {
                break;
            }
        }
    }
    Ok(results)
}
