// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource declarations and resolved outputs.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};

/// Type-token prefix of provider instances.
pub const PROVIDER_TYPE_PREFIX: &str = "launchpad:providers:";

/// Extract the package from a type token (`aws:ec2/vpc:Vpc` → `aws`).
pub fn package_of(type_token: &str) -> Result<&str> {
    let mut parts = type_token.split(':');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(pkg), Some(module), Some(kind), None)
            if !pkg.is_empty() && !module.is_empty() && !kind.is_empty() =>
        {
            Ok(pkg)
        }
        _ => Err(EngineError::InvalidTypeToken(type_token.to_string())),
    }
}

/// Type token of a provider instance for a package.
pub fn provider_type(package: &str) -> String {
    format!("{}{}", PROVIDER_TYPE_PREFIX, package)
}

/// Returns true if the type token names a provider instance.
pub fn is_provider_type(type_token: &str) -> bool {
    type_token.starts_with(PROVIDER_TYPE_PREFIX)
}

/// Options that control how the engine treats a resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    /// Explicit dependencies (by resource name).
    pub depends_on: Vec<String>,
    /// Refuse to delete or replace the resource.
    pub protect: bool,
    /// Delete the old resource before creating its replacement.
    pub delete_before_replace: bool,
    /// Input paths excluded from diffing.
    pub ignore_changes: Vec<String>,
    /// Scoped provider instance used for this resource.
    pub provider: Option<ProviderRef>,
}

/// A resource declaration.
#[derive(Debug, Clone)]
pub struct Resource {
    pub(crate) type_token: String,
    pub(crate) name: String,
    pub(crate) inputs: Map<String, Value>,
    pub(crate) options: ResourceOptions,
}

impl Resource {
    /// Declare a resource of the given type with a stack-unique name.
    pub fn new(type_token: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_token: type_token.into(),
            name: name.into(),
            inputs: Map::new(),
            options: ResourceOptions::default(),
        }
    }

    /// Set one input property.
    pub fn input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    /// Merge an object of input properties.
    ///
    /// Non-object values are ignored.
    pub fn inputs(mut self, values: Value) -> Self {
        if let Value::Object(map) = values {
            self.inputs.extend(map);
        }
        self
    }

    /// Depend on a previously registered resource.
    pub fn depends_on(mut self, resource: &ResourceOutputs) -> Self {
        self.options.depends_on.push(resource.name.clone());
        self
    }

    /// Depend on a previously registered resource by name.
    pub fn depends_on_name(mut self, name: impl Into<String>) -> Self {
        self.options.depends_on.push(name.into());
        self
    }

    /// Use a scoped provider instance.
    pub fn provider(mut self, provider: &ProviderRef) -> Self {
        self.options.provider = Some(provider.clone());
        self
    }

    /// Protect the resource against deletion.
    pub fn protect(mut self, protect: bool) -> Self {
        self.options.protect = protect;
        self
    }

    /// Delete before creating the replacement.
    pub fn delete_before_replace(mut self) -> Self {
        self.options.delete_before_replace = true;
        self
    }

    /// Exclude an input path from diffing.
    pub fn ignore_changes(mut self, path: impl Into<String>) -> Self {
        self.options.ignore_changes.push(path.into());
        self
    }

    /// Resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource type token.
    pub fn type_token(&self) -> &str {
        &self.type_token
    }

    /// Declared inputs as a JSON object.
    pub fn input_value(&self) -> Value {
        Value::Object(self.inputs.clone())
    }
}

/// A registered provider instance (e.g. AWS bound to a role and region).
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRef {
    /// Resource name of the provider instance.
    pub name: String,
    /// Package served by the provider.
    pub package: String,
    /// Settings passed with every call made through this instance.
    pub settings: Value,
}

/// Outputs of a registered resource. All values are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceOutputs {
    /// Resource name.
    pub name: String,
    /// Resource type token.
    pub type_token: String,
    /// Provider-assigned identifier.
    pub id: String,
    /// Output properties.
    pub outputs: Value,
}

impl ResourceOutputs {
    /// Provider-assigned identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Look up an output by dotted path.
    pub fn get_value(&self, path: &str) -> Result<&Value> {
        path.split('.')
            .try_fold(&self.outputs, |value, key| value.get(key))
            .filter(|v| !v.is_null())
            .ok_or_else(|| EngineError::MissingOutput {
                resource: self.name.clone(),
                key: path.to_string(),
            })
    }

    /// String output.
    pub fn get_str(&self, path: &str) -> Result<String> {
        self.get_value(path)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.type_error(path, "a string"))
    }

    /// Integer output.
    pub fn get_i64(&self, path: &str) -> Result<i64> {
        self.get_value(path)?
            .as_i64()
            .ok_or_else(|| self.type_error(path, "an integer"))
    }

    /// List-of-strings output.
    pub fn get_strings(&self, path: &str) -> Result<Vec<String>> {
        let items = self
            .get_value(path)?
            .as_array()
            .ok_or_else(|| self.type_error(path, "an array"))?;
        items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.type_error(path, "an array of strings"))
            })
            .collect()
    }

    /// Deserialize an output into a typed value.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.get_value(path)?.clone();
        serde_json::from_value(value).map_err(|_| self.type_error(path, "the requested type"))
    }

    /// The `arn` output.
    pub fn arn(&self) -> Result<String> {
        self.get_str("arn")
    }

    fn type_error(&self, path: &str, expected: &'static str) -> EngineError {
        EngineError::OutputType {
            resource: self.name.clone(),
            key: path.to_string(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_package_of() {
        assert_eq!(package_of("aws:ec2/vpc:Vpc").unwrap(), "aws");
        assert_eq!(package_of("helm:v3:Release").unwrap(), "helm");
        assert!(package_of("aws:vpc").is_err());
        assert!(package_of("::x").is_err());
        assert!(package_of("a:b:c:d").is_err());
    }

    #[test]
    fn test_builder_collects_inputs_and_options() {
        let dep = ResourceOutputs {
            name: "vpc".into(),
            type_token: "aws:ec2/vpc:Vpc".into(),
            id: "vpc-1".into(),
            outputs: json!({}),
        };
        let res = Resource::new("aws:ec2/subnet:Subnet", "subnet-a")
            .input("cidrBlock", "10.0.0.0/20")
            .inputs(json!({"vpcId": "vpc-1", "tags": {"Name": "a"}}))
            .depends_on(&dep)
            .protect(true);

        assert_eq!(res.input_value()["cidrBlock"], "10.0.0.0/20");
        assert_eq!(res.input_value()["tags"]["Name"], "a");
        assert_eq!(res.options.depends_on, vec!["vpc"]);
        assert!(res.options.protect);
    }

    #[test]
    fn test_outputs_accessors() {
        let out = ResourceOutputs {
            name: "cluster".into(),
            type_token: "aws:eks/cluster:Cluster".into(),
            id: "c-1".into(),
            outputs: json!({
                "endpoint": "https://x",
                "port": 443,
                "subnets": ["a", "b"],
                "nested": {"issuer": "https://oidc"},
                "empty": null,
            }),
        };
        assert_eq!(out.get_str("endpoint").unwrap(), "https://x");
        assert_eq!(out.get_i64("port").unwrap(), 443);
        assert_eq!(out.get_strings("subnets").unwrap(), vec!["a", "b"]);
        assert_eq!(out.get_str("nested.issuer").unwrap(), "https://oidc");
        assert!(matches!(
            out.get_str("empty"),
            Err(EngineError::MissingOutput { .. })
        ));
        assert!(matches!(
            out.get_i64("endpoint"),
            Err(EngineError::OutputType { .. })
        ));
    }
}
