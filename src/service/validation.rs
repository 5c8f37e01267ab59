//! Request validation against JSON-schema fragments taken from an OpenAPI document.

use crate::config::ResolvedResource;
use crate::error::{AppError, ConfigError};
use serde_json::{json, Map, Value};
use std::sync::Arc;

const COMPONENTS_PREFIX: &str = "#/components/schemas/";
const DEFS_PREFIX: &str = "#/$defs/";

/// Rewrite every `$ref` pointing into `components.schemas` so it points into `$defs`.
pub fn change_refs_to_defs(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = match (k.as_str(), v) {
                        ("$ref", Value::String(r)) => Value::String(r.replacen(COMPONENTS_PREFIX, DEFS_PREFIX, 1)),
                        _ => change_refs_to_defs(v),
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(change_refs_to_defs).collect()),
        other => other.clone(),
    }
}

/// Called with the schema name and the violation messages each time a request fails validation,
/// after the failure is logged and before the 400 is returned.
pub type ValidationErrorHandler = Arc<dyn Fn(&str, &[String]) + Send + Sync>;

/// One compiled schema fragment.
pub struct SchemaValidator {
    name: String,
    validator: jsonschema::Validator,
    on_errors: Option<ValidationErrorHandler>,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator").field("name", &self.name).finish()
    }
}

impl SchemaValidator {
    /// Compile `components.schemas[name]`, with every component schema reachable under `$defs`.
    pub fn from_openapi(openapi: &Value, name: &str) -> Result<Self, ConfigError> {
        let schemas = openapi
            .pointer("/components/schemas")
            .and_then(Value::as_object)
            .ok_or_else(|| ConfigError::MissingSchema(name.to_string()))?;
        let defs = change_refs_to_defs(&Value::Object(schemas.clone()));
        let fragment = defs
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::MissingSchema(name.to_string()))?;
        let mut schema = match fragment {
            Value::Object(m) => m,
            _ => {
                return Err(ConfigError::InvalidSchema {
                    name: name.to_string(),
                    reason: "schema must be an object".into(),
                })
            }
        };
        schema.insert("$defs".into(), defs);
        Self::compile(name, &Value::Object(schema))
    }

    pub fn compile(name: &str, schema: &Value) -> Result<Self, ConfigError> {
        let validator = jsonschema::validator_for(schema).map_err(|e| ConfigError::InvalidSchema {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(SchemaValidator {
            name: name.to_string(),
            validator,
            on_errors: None,
        })
    }

    pub fn with_on_errors(mut self, handler: ValidationErrorHandler) -> Self {
        self.on_errors = Some(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All violations at once, so the client can fix the request in one round trip.
    pub fn validate(&self, input: &Value) -> Result<(), AppError> {
        let details: Vec<String> = self.validator.iter_errors(input).map(|e| e.to_string()).collect();
        if details.is_empty() {
            return Ok(());
        }
        tracing::warn!(schema = %self.name, errors = ?details, "request failed schema validation");
        if let Some(handler) = &self.on_errors {
            handler(&self.name, &details);
        }
        Err(AppError::Validation {
            message: format!("request does not match schema {}", self.name),
            details,
        })
    }
}

/// Validators for the three operations that take client input.
#[derive(Debug)]
pub struct ResourceValidator {
    pub insert_one: SchemaValidator,
    pub update_one: SchemaValidator,
    pub select_many: SchemaValidator,
}

impl ResourceValidator {
    /// `None` when the resource has no `schemas` configured.
    pub fn for_resource(openapi: &Value, resource: &ResolvedResource) -> Result<Option<Self>, ConfigError> {
        let Some(names) = &resource.schemas else {
            return Ok(None);
        };
        let table = &resource.table_name;
        let insert = names.insert_one.clone().unwrap_or_else(|| format!("RequestToInsert{}", table));
        let update = names.update_one.clone().unwrap_or_else(|| format!("RequestToUpdate{}", table));
        let select = names.select_many.clone().unwrap_or_else(|| format!("RequestToSelectMany{}", table));
        Ok(Some(ResourceValidator {
            insert_one: SchemaValidator::from_openapi(openapi, &insert)?,
            update_one: SchemaValidator::from_openapi(openapi, &update)?,
            select_many: SchemaValidator::from_openapi(openapi, &select)?,
        }))
    }

    /// Report every validation failure of this resource to `handler`.
    pub fn with_on_errors(self, handler: ValidationErrorHandler) -> Self {
        ResourceValidator {
            insert_one: self.insert_one.with_on_errors(handler.clone()),
            update_one: self.update_one.with_on_errors(handler.clone()),
            select_many: self.select_many.with_on_errors(handler),
        }
    }
}

/// One search criterion as it arrives in a query string.
pub fn search_criterion_schema() -> Value {
    json!({
        "type": "object",
        "required": ["k"],
        "properties": {
            "k": {
                "type": "string",
                "description": "Name of the column",
                "minLength": 1
            },
            "o": {
                "type": "string",
                "description": "Operation",
                "enum": [
                    "$eq", "$neq", "$gt", "$gte", "$lt", "$lte",
                    "$nil", "$nnil", "$like", "$ilike", "$in", "$nin"
                ],
                "default": "$eq"
            },
            "v": {
                "type": "string",
                "description": "Value to compare the column with",
                "minLength": 1
            },
            "vlist": {
                "type": "array",
                "description": "Values for $in and $nin",
                "items": { "type": "string", "minLength": 1 }
            }
        }
    })
}

/// Search parameters of a list request; every leaf is a string because it comes from the URL.
pub fn search_params_schema() -> Value {
    let mut properties = Map::new();
    properties.insert(
        "columns".into(),
        json!({
            "type": "array",
            "description": "Names of the columns to return",
            "items": { "type": "string", "minLength": 1 }
        }),
    );
    for key in ["limit", "offset"] {
        properties.insert(
            key.into(),
            json!({ "type": "string", "pattern": "^[0-9]+$", "minLength": 1 }),
        );
    }
    properties.insert(
        "criteria".into(),
        json!({ "type": "array", "items": search_criterion_schema() }),
    );
    properties.insert(
        "orderBy".into(),
        json!({ "type": "string", "description": "Column to order by", "default": "id", "minLength": 1 }),
    );
    properties.insert(
        "orderDir".into(),
        json!({ "type": "string", "enum": ["asc", "desc"] }),
    );
    json!({ "type": "object", "properties": properties })
}
