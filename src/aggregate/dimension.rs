use crate::event::{Event, Severity};

/// Grouping key for windowed aggregation.
/// One row is emitted per distinct key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub error_code: i32,
    pub db_id: u32,
    pub user_id: u32,
    pub severity: Severity,
}

impl From<Event> for GroupKey {
    fn from(e: Event) -> Self {
        Self {
            error_code: e.error_code,
            db_id: e.db_id,
            user_id: e.user_id,
            severity: e.severity,
        }
    }
}

/// An aggregated row: a key, its resolved name and the number of stored
/// events that matched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedRow {
    pub key: GroupKey,
    pub name: &'static str,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_group_key_as_map_key() {
        let mut map: HashMap<GroupKey, u64> = HashMap::new();
        let base = Event {
            error_code: 1,
            db_id: 2,
            user_id: 3,
            severity: Severity::Error,
        };
        *map.entry(base.into()).or_default() += 1;
        *map.entry(base.into()).or_default() += 1;
        *map.entry(
            Event {
                severity: Severity::Warning,
                ..base
            }
            .into(),
        )
        .or_default() += 1;

        assert_eq!(map.len(), 2);
        assert_eq!(map[&GroupKey::from(base)], 2);
    }
}
