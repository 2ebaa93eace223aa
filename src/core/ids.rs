use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Uint(u64),
}

pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Uint(n) => n.to_string(),
    })
}

/// Like [`string_or_number`], but `null` becomes an empty string.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(s)) => s,
        Some(RawId::Int(n)) => n.to_string(),
        Some(RawId::Uint(n)) => n.to_string(),
        None => String::new(),
    })
}

/// Explicit `null` deserializes to `T::default()`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "super::string_or_number")]
        id: String,
    }

    #[derive(Deserialize)]
    struct Account {
        #[serde(default, deserialize_with = "super::opt_string_or_number")]
        user_id: String,
        #[serde(default, deserialize_with = "super::null_as_default")]
        cost: f64,
    }

    #[test]
    fn null_falls_back_to_default() {
        let a: Account = serde_json::from_str(r#"{"user_id": null, "cost": null}"#).unwrap();
        assert_eq!(a.user_id, "");
        assert_eq!(a.cost, 0.0);
        let b: Account = serde_json::from_str(r#"{"user_id": 9, "cost": 2.5}"#).unwrap();
        assert_eq!(b.user_id, "9");
        assert_eq!(b.cost, 2.5);
        let c: Account = serde_json::from_str("{}").unwrap();
        assert_eq!(c.user_id, "");
    }

    #[test]
    fn accepts_numeric_and_text_ids() {
        let a: Row = serde_json::from_str(r#"{"id": 42}"#).unwrap();
        let b: Row = serde_json::from_str(r#"{"id": "acc-7"}"#).unwrap();
        assert_eq!(a.id, "42");
        assert_eq!(b.id, "acc-7");
    }
}
