use crate::{
    dayz::{self, DAYZ_APP_ID},
    error::{ModError, ModResult},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fmt,
    hash::{Hash, Hasher},
    num::NonZeroU64,
    path::{Path, PathBuf},
};

/// A workshop mod reference in canonical form.
///
/// Identity is the workshop id alone: `name`, `enabled` and `update` never
/// take part in equality, hashing or path resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Mod {
    id: NonZeroU64,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    enabled: bool,
    update: bool,
}

/// The input shapes a mod can be built from.
#[derive(Debug, Clone)]
pub enum ModRef {
    /// Bare workshop id. A negative id means "installed but disabled".
    Id(i64),
    Record(ModRecord),
    Mod(Mod),
}

/// Structured settings entry. Only `id` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModRecord {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub update: Option<bool>,
}

impl Mod {
    /// `i64::MIN` has no positive counterpart and is rejected.
    pub fn from_id(ident: i64, name: Option<String>, update: bool) -> ModResult<Self> {
        let id = ident
            .checked_abs()
            .and_then(|id| NonZeroU64::new(id.unsigned_abs()))
            .ok_or_else(|| ModError::InvalidIdentity {
                value: ident.to_string(),
            })?;
        Ok(Self {
            id,
            name,
            enabled: ident > 0,
            update,
        })
    }

    pub fn from_record(record: ModRecord) -> ModResult<Self> {
        let ident = record.id.ok_or(ModError::MissingField { field: "id" })?;
        let update = record.update.unwrap_or(true);
        let mut value = Self::from_id(ident, record.name, update)?;
        // A negative id always disables, an explicit flag can only disable further.
        value.enabled = value.enabled && record.enabled.unwrap_or(true);
        Ok(value)
    }

    /// Builds a mod from a raw JSON settings entry: a bare integer or an object.
    pub fn from_value(value: &Value) -> ModResult<Self> {
        Self::try_from(ModRef::from_value(value)?)
    }

    pub fn id(&self) -> u64 {
        self.id.get()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn update(&self) -> bool {
        self.update
    }

    /// Link text: the display name, or the id when unnamed.
    pub fn text(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self.id.to_string(),
        }
    }

    pub fn url(&self) -> String {
        dayz::workshop_url(self.id())
    }

    /// Path of this mod relative to a workshop content directory.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(DAYZ_APP_ID.to_string()).join(self.id.to_string())
    }

    pub fn to_record(&self) -> ModRecord {
        ModRecord {
            id: i64::try_from(self.id()).ok(),
            name: self.name.clone(),
            enabled: Some(self.enabled),
            update: Some(self.update),
        }
    }
}

/// Install path of `value` under the workshop content directory `base_dir`.
pub fn resolve(value: &Mod, base_dir: &Path) -> PathBuf {
    base_dir.join(value.relative_path())
}

impl PartialEq for Mod {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Mod {}

impl Hash for Mod {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Mod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl TryFrom<ModRef> for Mod {
    type Error = ModError;

    fn try_from(value: ModRef) -> ModResult<Self> {
        match value {
            ModRef::Id(ident) => Mod::from_id(ident, None, true),
            ModRef::Record(record) => Mod::from_record(record),
            ModRef::Mod(value) => Ok(value),
        }
    }
}

impl TryFrom<Value> for Mod {
    type Error = ModError;

    fn try_from(value: Value) -> ModResult<Self> {
        Mod::from_value(&value)
    }
}

impl TryFrom<i64> for Mod {
    type Error = ModError;

    fn try_from(ident: i64) -> ModResult<Self> {
        Mod::from_id(ident, None, true)
    }
}

impl From<Mod> for ModRef {
    fn from(value: Mod) -> Self {
        ModRef::Mod(value)
    }
}

impl ModRef {
    pub fn from_value(value: &Value) -> ModResult<Self> {
        match value {
            Value::Number(number) => parse_id(number).map(ModRef::Id),
            Value::Object(map) => ModRecord::from_map(map).map(ModRef::Record),
            other => Err(ModError::UnsupportedType {
                found: describe(other),
            }),
        }
    }

    /// Parses a command-line token. Only integers are accepted here.
    pub fn from_token(token: &str) -> ModResult<Self> {
        token
            .trim()
            .parse::<i64>()
            .map(ModRef::Id)
            .map_err(|_| ModError::InvalidIdentity {
                value: token.to_string(),
            })
    }
}

impl ModRecord {
    fn from_map(map: &Map<String, Value>) -> ModResult<Self> {
        let id = match map.get("id") {
            Some(Value::Number(number)) => parse_id(number)?,
            Some(other) => {
                return Err(ModError::InvalidIdentity {
                    value: other.to_string(),
                })
            }
            None => return Err(ModError::MissingField { field: "id" }),
        };
        Ok(Self {
            id: Some(id),
            name: optional_field(map, "name", Value::as_str)?.map(str::to_string),
            enabled: optional_field(map, "enabled", Value::as_bool)?,
            update: optional_field(map, "update", Value::as_bool)?,
        })
    }
}

impl Serialize for ModRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = Map::new();
        if let Some(id) = self.id {
            map.insert("id".to_string(), Value::from(id));
        }
        if let Some(name) = &self.name {
            map.insert("name".to_string(), Value::from(name.as_str()));
        }
        if let Some(enabled) = self.enabled {
            map.insert("enabled".to_string(), Value::from(enabled));
        }
        if let Some(update) = self.update {
            map.insert("update".to_string(), Value::from(update));
        }
        map.serialize(serializer)
    }
}

fn parse_id(number: &serde_json::Number) -> ModResult<i64> {
    if let Some(value) = number.as_i64() {
        return Ok(value);
    }
    if number.is_u64() {
        return Err(ModError::InvalidIdentity {
            value: number.to_string(),
        });
    }
    Err(ModError::UnsupportedType {
        found: format!("non-integer number {number}"),
    })
}

fn optional_field<'a, T>(
    map: &'a Map<String, Value>,
    key: &'static str,
    get: impl Fn(&'a Value) -> Option<T>,
) -> ModResult<Option<T>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => get(value).map(Some).ok_or_else(|| ModError::UnsupportedType {
            found: format!("field `{key}` of type {}", describe(value)),
        }),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(text) => format!("string {text:?}"),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn positive_id_is_enabled() {
        let value = Mod::try_from(1559212036_i64).unwrap();
        assert_eq!(value.id(), 1559212036);
        assert!(value.enabled());
        assert!(value.update());
        assert_eq!(value.name(), None);
    }

    #[test]
    fn negative_id_disables() {
        for ident in [-1i64, -7, -1559212036, i64::MIN + 1] {
            let value = Mod::try_from(ident).unwrap();
            assert_eq!(value.id(), ident.unsigned_abs());
            assert!(!value.enabled());
        }
    }

    #[test]
    fn sign_decides_enablement() {
        for ident in [1i64, 2, 42, -42, 999_999_999, -3] {
            let value = Mod::try_from(ident).unwrap();
            assert_eq!(value.id(), ident.unsigned_abs());
            assert_eq!(value.enabled(), ident > 0);
        }
    }

    #[test]
    fn zero_is_rejected() {
        assert!(matches!(
            Mod::try_from(0_i64),
            Err(ModError::InvalidIdentity { .. })
        ));
        assert!(matches!(
            Mod::from_value(&json!(0)),
            Err(ModError::InvalidIdentity { .. })
        ));
        assert!(matches!(
            Mod::from_value(&json!({"id": 0})),
            Err(ModError::InvalidIdentity { .. })
        ));
    }

    #[test]
    fn i64_min_is_rejected() {
        assert!(matches!(
            Mod::try_from(i64::MIN),
            Err(ModError::InvalidIdentity { .. })
        ));
        assert!(matches!(
            Mod::from_value(&json!(i64::MIN)),
            Err(ModError::InvalidIdentity { .. })
        ));
    }

    #[test]
    fn largest_ids_survive_serialization() {
        for ident in [i64::MAX, i64::MIN + 1] {
            let value = Mod::try_from(ident).unwrap();
            let text = serde_json::to_string(&value).unwrap();
            let back: Mod = serde_json::from_str(&text).unwrap();
            assert_eq!(back.id(), value.id());
            assert_eq!(back.enabled(), value.enabled());
        }
    }

    #[test]
    fn record_round_trip() {
        let value = Mod::from_value(&json!({"id": 5, "name": "X", "update": false})).unwrap();
        assert_eq!(value.id(), 5);
        assert_eq!(value.name(), Some("X"));
        assert!(!value.update());
        assert!(value.enabled());

        let record = serde_json::to_value(value.to_record()).unwrap();
        assert_eq!(record["id"], json!(5));
        assert_eq!(record["name"], json!("X"));
        assert_eq!(record["update"], json!(false));
        assert_eq!(record["enabled"], json!(true));
    }

    #[test]
    fn record_without_id_is_missing_field() {
        let err = Mod::from_value(&json!({"name": "Foo"})).unwrap_err();
        assert!(matches!(err, ModError::MissingField { field: "id" }));
    }

    #[test]
    fn record_with_non_numeric_id_is_invalid() {
        let err = Mod::from_value(&json!({"id": "abc"})).unwrap_err();
        assert!(matches!(err, ModError::InvalidIdentity { .. }));
    }

    #[test]
    fn record_enabled_flag_can_disable() {
        let value = Mod::from_value(&json!({"id": 8, "enabled": false})).unwrap();
        assert!(!value.enabled());
        let value = Mod::from_value(&json!({"id": -8, "enabled": true})).unwrap();
        assert!(!value.enabled());
    }

    #[test]
    fn unsupported_shapes() {
        for value in [json!("123"), json!([1, 2]), json!(null), json!(true), json!(1.5)] {
            assert!(matches!(
                Mod::from_value(&value),
                Err(ModError::UnsupportedType { .. })
            ));
        }
        assert!(matches!(
            Mod::from_value(&json!({"id": 3, "update": "yes"})),
            Err(ModError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn canonical_passes_through() {
        let value = Mod::from_id(-11, Some("Eleven".to_string()), false).unwrap();
        let again = Mod::try_from(ModRef::from(value.clone())).unwrap();
        assert_eq!(again.id(), 11);
        assert_eq!(again.name(), Some("Eleven"));
        assert!(!again.enabled());
        assert!(!again.update());
    }

    #[test]
    fn equality_ignores_everything_but_id() {
        let a = Mod::from_id(9, Some("A".to_string()), true).unwrap();
        let b = Mod::from_id(-9, None, false).unwrap();
        assert_eq!(a, b);
        let set: std::collections::HashSet<Mod> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn resolve_depends_only_on_id_and_base() {
        let base = Path::new("/srv/dayz/steamapps/workshop/content");
        let a = Mod::from_id(1559212036, Some("CF".to_string()), true).unwrap();
        let b = Mod::from_id(-1559212036, None, false).unwrap();
        assert_eq!(resolve(&a, base), resolve(&a, base));
        assert_eq!(resolve(&a, base), resolve(&b, base));
        assert_eq!(
            resolve(&a, base),
            PathBuf::from("/srv/dayz/steamapps/workshop/content/221100/1559212036")
        );
    }

    #[test]
    fn token_parsing() {
        let value = Mod::try_from(ModRef::from_token("-7").unwrap()).unwrap();
        assert_eq!(value.id(), 7);
        assert!(!value.enabled());
        assert!(matches!(
            ModRef::from_token("seven"),
            Err(ModError::InvalidIdentity { .. })
        ));
    }

    #[test]
    fn deserializes_list_of_mixed_entries() {
        let mods: Vec<Mod> = serde_json::from_value(json!([6, -7, {"id": 8, "name": "Foo"}])).unwrap();
        let ids: Vec<u64> = mods.iter().map(Mod::id).collect();
        assert_eq!(ids, vec![6, 7, 8]);
        assert_eq!(mods[2].text(), "Foo");
        assert_eq!(mods[0].text(), "6");
    }
}
