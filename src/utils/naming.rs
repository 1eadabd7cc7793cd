//! Naming utilities for schema-patch
//!
//! Identifier shortening and the deterministic names of generated objects.

/// Shorten an identifier to fit a dialect's length limit.
///
/// Names within the limit pass through unchanged. Longer names keep a prefix
/// of the original and append an 8-character md5 suffix so shortening is
/// deterministic and collisions between distinct long names stay unlikely.
pub fn shorten_identifier(name: &str, max_length: usize) -> String {
    if name.len() <= max_length {
        return name.to_string();
    }

    // 8 hash characters plus the separating underscore
    let keep_length = max_length.saturating_sub(9);
    let hash = format!("{:x}", md5::compute(name.as_bytes()));
    let prefix: String = name.chars().take(keep_length).collect();

    format!("{}_{}", prefix, &hash[0..8])
}

/// Quote an identifier for SQL
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name)
}

/// The deterministic name of a generated constraint or companion object,
/// e.g. `orders_pkey` or `fk_orders_customer_idx`
pub fn constraint_name(owner: &str, suffix: &str) -> String {
    format!("{owner}_{suffix}")
}

/// Name of the temporary table used while rebuilding a table in place
pub fn temporary_table_name(table_name: &str) -> String {
    format!("{table_name}_")
}
