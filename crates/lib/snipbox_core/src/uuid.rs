// @awa-component: DB-UUIDv7
// Helper for generating UUIDv7 (timestamp-sortable UUIDs)
//
// Component ids are generated app-side; both repositories use the id as the
// listing tie-breaker on equal creation times.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
