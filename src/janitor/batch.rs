//! Id batching for size-limited authority requests.

/// Split `items` into consecutive, non-overlapping batches of at most
/// `batch_size` elements, preserving order. A zero `batch_size` is treated as 1.
#[must_use]
pub fn batch_ids<T>(items: &[T], batch_size: usize) -> Vec<&[T]> {
    items.chunks(batch_size.max(1)).collect()
}
