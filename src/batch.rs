//! Batch assembly.
//!
//! Groups retrieval-sized chunks into larger batches for analysis calls,
//! packing greedily up to a character budget. Chunks within a batch are
//! joined with a single space, and the joining space counts against the
//! budget.

/// Greedily pack `chunks` into space-joined batches of at most
/// `max_batch_size` characters.
///
/// A single chunk longer than the budget becomes its own batch rather
/// than being split again; the downstream model call tolerates the
/// occasional oversized input.
pub fn assemble(chunks: &[String], max_batch_size: usize) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for chunk in chunks {
        let chunk_len = chunk.chars().count();
        let candidate_len = if current.is_empty() {
            chunk_len
        } else {
            current_len + 1 + chunk_len
        };

        if candidate_len <= max_batch_size {
            current.push(chunk);
            current_len = candidate_len;
        } else {
            if !current.is_empty() {
                batches.push(current.join(" "));
                current.clear();
            }
            current.push(chunk);
            current_len = chunk_len;
        }
    }

    if !current.is_empty() {
        batches.push(current.join(" "));
    }

    batches
}
