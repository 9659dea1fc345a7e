//! Decide whether a local copy can be advanced chunk by chunk.
//!
//! Pure functions over already-loaded properties; no I/O.

use tracing::debug;

use crate::incremental::chunk_file_name;
use crate::properties::IndexProperties;

/// Sequence numbers to fetch, ascending, or `None` when only a full fetch
/// can bring the local copy up to date.
pub fn plan_sequences(local: Option<&IndexProperties>, remote: &IndexProperties) -> Option<Vec<u64>> {
    let local = local?;

    let local_chain = local.chain_id.as_deref().map(str::trim).unwrap_or("");
    let remote_chain = remote.chain_id.as_deref().map(str::trim).unwrap_or("");
    if local_chain.is_empty() || remote_chain.is_empty() || local_chain != remote_chain {
        debug!(local_chain, remote_chain, "Chain mismatch, full fetch required");
        return None;
    }

    let Some(local_counter) = local.counter else {
        debug!("Local counter missing, full fetch required");
        return None;
    };
    let Some(remote_counter) = remote.counter else {
        debug!("Remote counter missing, full fetch required");
        return None;
    };
    if remote_counter < local_counter {
        debug!(local_counter, remote_counter, "Remote counter behind local");
        return None;
    }

    let bridgeable = remote.advertises_chunk(local_counter)
        || remote.advertises_chunk(local_counter.saturating_add(1));
    if !bridgeable {
        debug!(local_counter, remote_counter, "Needed chunks no longer retained");
        return None;
    }

    Some((local_counter + 1..=remote_counter).collect())
}

/// Chunk file names to fetch, in order. See [`plan_sequences`].
pub fn plan(
    local: Option<&IndexProperties>,
    remote: &IndexProperties,
    file_prefix: &str,
) -> Option<Vec<String>> {
    plan_sequences(local, remote).map(|sequences| {
        sequences
            .into_iter()
            .map(|s| chunk_file_name(file_prefix, s))
            .collect()
    })
}
