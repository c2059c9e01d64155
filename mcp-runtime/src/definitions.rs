use serde_json::{Value, json};
use url::Url;

pub const RESOLVE_POINTS: &str = "resolve_points";
pub const SUMMARIZE_STAYS: &str = "summarize_stays";
pub const MANIFEST_NAME: &str = "Galuchat MCP Server";

#[derive(Debug)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub output_schema: Value,
}

impl ToolDefinition {
    /// Shape used by `tools/list`.
    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "title": self.title,
            "description": self.description,
            "inputSchema": self.input_schema,
            "outputSchema": self.output_schema,
        })
    }
}

fn rejected_point_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "index": { "type": "integer", "minimum": 0 },
            "ref": { "type": ["string", "null"] },
            "lat": {},
            "lon": {},
            "timestamp": {},
            "reason": {
                "type": "string",
                "enum": ["INVALID_COORD", "INVALID_REF", "INVALID_T", "INVALID_TIMESTAMP", "OUT_OF_COVERAGE"]
            }
        },
        "required": ["index", "lat", "lon", "reason"]
    })
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: RESOLVE_POINTS,
            title: "Resolve points",
            description: "Resolve coordinates to district code and address. Invalid or uncovered points are reported per index; the rest still resolve.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "granularity": {
                        "type": "string",
                        "enum": ["admin", "estat", "jarl"],
                        "default": "admin"
                    },
                    "points": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "ref": { "type": ["string", "null"], "pattern": "^[A-Za-z0-9._:-]{1,128}$" },
                                "lat": { "type": ["number", "string"] },
                                "lon": { "type": ["number", "string"] },
                                "t": { "type": ["string", "null"], "format": "date-time" }
                            },
                            "required": ["lat", "lon"]
                        }
                    },
                    "strict": { "type": "boolean", "default": false }
                },
                "required": ["points"]
            }),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "granularity": { "type": "string", "enum": ["admin", "estat", "jarl"] },
                    "results": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "index": { "type": "integer", "minimum": 0 },
                                "ref": { "type": ["string", "null"] },
                                "payload": {
                                    "type": ["object", "null"],
                                    "properties": {
                                        "code": { "type": ["string", "null"] },
                                        "address": { "type": ["string", "null"] }
                                    },
                                    "required": ["code", "address"]
                                },
                                "reason": { "type": "string" }
                            },
                            "required": ["index", "payload"]
                        }
                    },
                    "errors": { "type": "array", "items": rejected_point_schema() }
                },
                "required": ["granularity", "results", "errors"]
            }),
        },
        ToolDefinition {
            name: SUMMARIZE_STAYS,
            title: "Summarize stays",
            description: "Group consecutive positions by region code, or by distance and duration thresholds when params are given.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "positions": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "timestamp": { "type": "integer" },
                                "lat": { "type": ["number", "string"] },
                                "lon": { "type": ["number", "string"] }
                            },
                            "required": ["timestamp", "lat", "lon"]
                        }
                    },
                    "params": {
                        "type": "object",
                        "properties": {
                            "distance_threshold_m": { "type": "number", "minimum": 0 },
                            "duration_threshold_sec": { "type": "integer", "minimum": 0 }
                        }
                    },
                    "strict": { "type": "boolean", "default": false }
                },
                "required": ["positions"]
            }),
            output_schema: json!({
                "type": "object",
                "properties": {
                    "results": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "start_ts": { "type": "integer" },
                                "end_ts": { "type": "integer" },
                                "code": { "type": ["string", "null"] },
                                "address": { "type": ["string", "null"] },
                                "lat": { "type": "number" },
                                "lon": { "type": "number" },
                                "duration_sec": { "type": "integer", "minimum": 0 },
                                "count": { "type": "integer", "minimum": 1 }
                            },
                            "required": ["start_ts", "end_ts", "duration_sec", "count"]
                        }
                    },
                    "errors": { "type": "array", "items": rejected_point_schema() }
                },
                "required": ["results", "errors"]
            }),
        },
    ]
}

/// Tool manifest with endpoints resolved against the URL the manifest was
/// fetched from, so `…/mcp/manifest.json` points at `…/mcp/tools/<name>`.
pub fn manifest(manifest_url: &Url) -> Value {
    let mut base = manifest_url.clone();
    base.set_query(None);
    base.set_fragment(None);

    let tools: Vec<Value> = tool_definitions()
        .iter()
        .map(|tool| {
            let mut entry = tool.to_value();
            let endpoint = base
                .join(&format!("tools/{}", tool.name))
                .map(String::from)
                .unwrap_or_else(|_| format!("tools/{}", tool.name));
            entry["endpoint"] = Value::String(endpoint);
            let (example_input, example_output) = manifest_examples(tool.name);
            entry["example_input"] = example_input;
            entry["example_output"] = example_output;
            entry
        })
        .collect();

    json!({
        "name": MANIFEST_NAME,
        "description": "Reverse geocoding utilities exposed as MCP tools.",
        "tools": tools,
    })
}

fn manifest_examples(name: &str) -> (Value, Value) {
    match name {
        RESOLVE_POINTS => (
            json!({
                "granularity": "admin",
                "points": [{ "ref": "p1", "lat": 35.0, "lon": 135.0 }]
            }),
            json!({
                "granularity": "admin",
                "results": [{
                    "index": 0,
                    "ref": "p1",
                    "payload": { "code": "00000", "address": "Example" }
                }],
                "errors": []
            }),
        ),
        SUMMARIZE_STAYS => (
            json!({
                "positions": [
                    { "timestamp": 0, "lat": 35.0, "lon": 135.0 },
                    { "timestamp": 60, "lat": 35.0, "lon": 135.0 }
                ]
            }),
            json!({
                "results": [{
                    "start_ts": 0,
                    "end_ts": 60,
                    "code": "00000",
                    "address": "Example",
                    "duration_sec": 60,
                    "count": 2
                }],
                "errors": []
            }),
        ),
        _ => (Value::Null, Value::Null),
    }
}
