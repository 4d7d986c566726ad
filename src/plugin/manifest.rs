//! Plugin manifests: the functions a plugin declares to its host.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    pub functions: Vec<FunctionDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDescriptor {
    pub name: String,
    /// Human-readable summary shown to the assistant.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    pub return_parameter: ReturnParameter,
    /// True when the function talks to the user itself rather than relying
    /// on the host to relay its message.
    pub will_handle_user_response: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub name: String,
    pub description: String,
    /// JSON schema type name, e.g. `string`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnParameter {
    #[serde(rename = "type")]
    pub kind: String,
}

impl FunctionDescriptor {
    /// JSON schema object describing this function's parameters.
    pub fn input_schema(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                serde_json::json!({
                    "type": param.kind,
                    "description": param.description,
                }),
            );
            if param.required {
                required.push(serde_json::Value::String(param.name.clone()));
            }
        }

        let mut schema = serde_json::Map::new();
        schema.insert("type".to_string(), "object".into());
        schema.insert("properties".to_string(), properties.into());
        if !required.is_empty() {
            schema.insert("required".to_string(), required.into());
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn function(parameters: Vec<ParameterDescriptor>) -> FunctionDescriptor {
        FunctionDescriptor {
            name: "setClusterContext".to_string(),
            description: String::new(),
            parameters,
            return_parameter: ReturnParameter {
                kind: "string".to_string(),
            },
            will_handle_user_response: false,
        }
    }

    #[test]
    fn test_manifest_wire_shape() {
        let manifest = PluginManifest {
            name: "manageClusterContextPlugin".to_string(),
            version: "1.0.0".to_string(),
            functions: vec![function(vec![])],
        };
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["functions"][0]["returnParameter"], json!({"type": "string"}));
        assert_eq!(value["functions"][0]["willHandleUserResponse"], json!(false));
    }

    #[test]
    fn test_input_schema_without_parameters() {
        let schema = function(vec![]).input_schema();
        assert_eq!(
            serde_json::Value::Object(schema),
            json!({"type": "object", "properties": {}})
        );
    }

    #[test]
    fn test_input_schema_with_required_parameter() {
        let schema = function(vec![ParameterDescriptor {
            name: "clusterName".to_string(),
            description: "Cluster to select".to_string(),
            kind: "string".to_string(),
            required: true,
        }])
        .input_schema();
        assert_eq!(schema["properties"]["clusterName"]["type"], "string");
        assert_eq!(schema["required"], json!(["clusterName"]));
    }
}
