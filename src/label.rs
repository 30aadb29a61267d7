//! Label formatting
//!
//! Pure formatting rules for derived labels. Collecting the child labels is
//! the transaction's job (see `handlers::labels`).

/// Separator between the children of one cardinality-many slot
pub const CHILD_SEPARATOR: &str = ", ";

/// Separator between the contributions of different assoc defs
pub const CONTRIBUTION_SEPARATOR: &str = " ";

/// Join the labels of the children in one slot, skipping empty ones
pub fn join_child_labels<I, S>(labels: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    join_non_empty(labels, CHILD_SEPARATOR)
}

/// Build a label from per-assoc-def contributions in label-config order
pub fn build_label<I, S>(contributions: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    join_non_empty(contributions, CONTRIBUTION_SEPARATOR)
}

fn join_non_empty<I, S>(parts: I, separator: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut label = String::new();
    for part in parts {
        let part = part.as_ref();
        if part.is_empty() {
            continue;
        }
        if !label.is_empty() {
            label.push_str(separator);
        }
        label.push_str(part);
    }
    label
}
