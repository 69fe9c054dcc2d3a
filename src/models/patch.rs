use serde::{Deserialize, Deserializer};

/// An update field that tells "not sent" apart from an explicit `null`.
///
/// Use with `#[serde(default)]` so an absent field becomes [`Patch::Missing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Missing,
    Null,
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Missing
    }
}

impl<T> Patch<T> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Patch::Missing)
    }

    /// Result of applying this patch on top of `current`.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Missing => current,
            Patch::Null => None,
            Patch::Value(v) => Some(v),
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(|value| match value {
            Some(v) => Patch::Value(v),
            None => Patch::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Body {
        #[serde(default)]
        lecturer_id: Patch<i64>,
    }

    #[test]
    fn test_absent_null_and_value() {
        let absent: Body = serde_json::from_str("{}").unwrap();
        let null: Body = serde_json::from_str(r#"{"lecturer_id": null}"#).unwrap();
        let value: Body = serde_json::from_str(r#"{"lecturer_id": 7}"#).unwrap();

        assert_eq!(absent.lecturer_id, Patch::Missing);
        assert_eq!(null.lecturer_id, Patch::Null);
        assert_eq!(value.lecturer_id, Patch::Value(7));
    }

    #[test]
    fn test_apply() {
        assert_eq!(Patch::Missing.apply(Some(3)), Some(3));
        assert_eq!(Patch::<i64>::Null.apply(Some(3)), None);
        assert_eq!(Patch::Value(9).apply(Some(3)), Some(9));
        assert_eq!(Patch::Value(9).apply(None), Some(9));
    }
}
