//! サービス解決
//!
//! config.json の `services` を宣言順に読み、`template` とマージした上で
//! `{name}` 置換と環境変数展開を行って [`Service`] の列を作ります。

use crate::error::{ConfigError, Result};
use crate::service::Service;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// サービス名に置換されるプレースホルダ
pub const NAME_PLACEHOLDER: &str = "{name}";

/// 宣言順を保持したサービス一覧
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Vec<Service>,
}

impl ServiceRegistry {
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }

    /// 設定ファイルを読み込んで解決
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::ConfigFileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(config = %path.display(), "Loaded config file");
        Self::from_json(&content)
    }

    /// JSON文字列から解決
    pub fn from_json(content: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(content)?;
        Self::from_value(&raw)
    }

    /// パース済みJSONから解決
    ///
    /// マージ順序: `template` を土台に、サービス固有のキーで上書きする。
    /// その後すべての値に対して `{name}` 置換 → 環境変数展開の順で適用する。
    pub fn from_value(raw: &Value) -> Result<Self> {
        let services = raw
            .get("services")
            .and_then(Value::as_object)
            .ok_or(ConfigError::MissingServices)?;

        let template = match raw.get("template") {
            Some(Value::Object(map)) => Some(map),
            Some(Value::Null) | None => None,
            Some(_) => return Err(ConfigError::InvalidService("template".to_string())),
        };

        let mut resolved = Vec::with_capacity(services.len());
        for (name, entry) in services {
            let entry = entry
                .as_object()
                .ok_or_else(|| ConfigError::InvalidService(name.clone()))?;

            let mut merged: HashMap<String, String> = HashMap::new();
            if let Some(template) = template {
                collect_strings(name, template, &mut merged)?;
            }
            collect_strings(name, entry, &mut merged)?;

            let expanded: HashMap<String, String> = merged
                .into_iter()
                .map(|(key, value)| (key, expand_value(name, &value)))
                .collect();

            tracing::debug!(service = %name, values = ?expanded, "Resolved service");
            resolved.push(Service::from_values(name, &expanded));
        }

        Ok(Self { services: resolved })
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn get(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// 宣言順のサービス名
    pub fn names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a ServiceRegistry {
    type Item = &'a Service;
    type IntoIter = std::slice::Iter<'a, Service>;

    fn into_iter(self) -> Self::IntoIter {
        self.services.iter()
    }
}

/// オブジェクトの値を文字列として `out` に上書きコピーする
fn collect_strings(
    service: &str,
    map: &Map<String, Value>,
    out: &mut HashMap<String, String>,
) -> Result<()> {
    for (key, value) in map {
        let value = value.as_str().ok_or_else(|| ConfigError::InvalidValue {
            service: service.to_string(),
            key: key.clone(),
        })?;
        out.insert(key.clone(), value.to_string());
    }
    Ok(())
}

/// 1つの値を展開する
///
/// `{name}` をサービス名に置換してから `$VAR` / `${VAR}` を展開する。
/// 未設定の環境変数は空文字列になる。
pub fn expand_value(name: &str, value: &str) -> String {
    let substituted = value.replace(NAME_PLACEHOLDER, name);
    shellexpand::env_with_context_no_errors(&substituted, |var: &str| {
        Some(std::env::var(var).unwrap_or_default())
    })
    .into_owned()
}
