use std::{
    borrow::Cow,
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

/// A label value that is safe to export (bounded cardinality).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BoundedLabel(Cow<'static, str>);

impl BoundedLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0.into_owned()
    }
}

#[derive(Clone, Debug)]
pub struct LabelPolicy {
    /// Maximum distinct room buckets exported. Room ids are caller supplied
    /// and unbounded, so they are never exported raw.
    pub max_room_buckets: usize,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self { max_room_buckets: 50 }
    }
}

impl LabelPolicy {
    /// Hash a room id into one of `max_room_buckets` labels.
    pub fn room_bucket(&self, room_id: &str) -> BoundedLabel {
        let mut h = DefaultHasher::new();
        room_id.hash(&mut h);
        let bucket = (h.finish() as usize) % self.max_room_buckets.max(1);
        BoundedLabel(Cow::Owned(format!("room{:02}", bucket)))
    }

    pub fn reason(reason: &'static str) -> BoundedLabel {
        BoundedLabel(Cow::Borrowed(reason))
    }
}
