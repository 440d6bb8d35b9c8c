use super::{load_all_ids, load_by_priority, load_by_status, load_by_type};
use crate::errors::AppResult;
use crate::models::{ListFilter, Record};
use std::path::Path;

/// Which shard set produced the candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Status,
    Type,
    Priority,
    AllTypes,
}

/// Picks the most selective single shard the filter allows: status, then type, then
/// priority. Without a dimension filter every type shard is unioned.
pub fn candidate_ids(root: &Path, filter: &ListFilter) -> AppResult<(Vec<String>, CandidateSource)> {
    if let Some(status) = filter.status {
        return Ok((load_by_status(root, status)?, CandidateSource::Status));
    }
    if let Some(item_type) = filter.item_type {
        return Ok((load_by_type(root, item_type)?, CandidateSource::Type));
    }
    if let Some(priority) = filter.priority {
        return Ok((load_by_priority(root, priority)?, CandidateSource::Priority));
    }
    Ok((load_all_ids(root)?, CandidateSource::AllTypes))
}

/// Loads candidates through `load` and applies the remaining predicates in memory.
///
/// IDs whose document has disappeared are skipped with a warning; any other load error
/// aborts the query.
pub fn query_records<F>(root: &Path, filter: &ListFilter, mut load: F) -> AppResult<Vec<Record>>
where
    F: FnMut(&str) -> AppResult<Record>,
{
    let (candidates, source) = candidate_ids(root, filter)?;
    tracing::debug!(candidates = candidates.len(), source = ?source, "index query");

    let mut records = Vec::with_capacity(candidates.len());
    for id in candidates {
        match load(&id) {
            Ok(record) => {
                if filter.matches(&record) {
                    records.push(record);
                }
            }
            Err(error) if error.is_not_found() => {
                tracing::warn!(id = %id, "index references a missing record; skipping");
            }
            Err(error) => return Err(error),
        }
    }
    Ok(records)
}
