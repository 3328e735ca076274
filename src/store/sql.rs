use crate::registry::TableTarget;

/// Quote a registry-validated name for use in SQL text.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn table_ref(target: &TableTarget) -> String {
    format!(
        "{}.{}",
        quote_identifier(&target.dataset),
        quote_identifier(&target.table)
    )
}

fn trimmed_id(target: &TableTarget) -> String {
    format!("btrim({}::text)", quote_identifier(&target.id_column))
}

/// Existence check. `$1` is the `text[]` of requested identifiers.
pub fn existence_statement(target: &TableTarget) -> String {
    let id = trimmed_id(target);
    format!(
        "SELECT DISTINCT {id} AS connect_id FROM {table} WHERE {id} = ANY($1)",
        id = id,
        table = table_ref(target)
    )
}

/// Scoped delete. `$1` is the `text[]` of confirmed identifiers.
pub fn delete_statement(target: &TableTarget) -> String {
    format!(
        "DELETE FROM {table} WHERE {id} = ANY($1)",
        table = table_ref(target),
        id = trimmed_id(target)
    )
}
