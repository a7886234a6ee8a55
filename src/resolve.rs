//! Reference resolution
//!
//! Before extraction every document is walked once: `$id` bases are
//! tracked, each `$ref` is rewritten to an absolute URI, and resources,
//! anchors and JSON-pointer targets become reachable through a
//! [`SchemaIndex`]. Extraction then only ever dereferences absolute URIs.
//!
//! A document without a root `$id` is registered under a private identity
//! (`urn:familiar-logic:document:N`), so two inputs sharing a base URI never
//! see each other's `#/...` fragments.

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;
use url::Url;

use crate::error::{LogicError, Result};

/// Keywords whose values are data, not schemas.
const DATA_KEYWORDS: [&str; 4] = ["const", "enum", "examples", "default"];

/// Keywords whose values map names to schemas.
const SCHEMA_MAPS: [&str; 6] = [
    "properties",
    "patternProperties",
    "$defs",
    "definitions",
    "dependentSchemas",
    "dependencies",
];

/// Absolute-URI index over every registered schema resource.
#[derive(Debug, Default, Clone)]
pub struct SchemaIndex {
    /// Resource URI (no fragment) to its rewritten schema
    resources: HashMap<String, Value>,
    /// `resource#anchor` to (resource, JSON pointer)
    anchors: HashMap<String, (String, String)>,
    documents: usize,
}

/// Walk state for one document.
struct Walk<'a> {
    /// Nominal base of the document, if the caller supplied one
    nominal: Option<String>,
    /// Identity standing in for `nominal` when the document has no `$id`
    identity: Option<String>,
    index: &'a mut SchemaIndex,
}

impl SchemaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an input document under a private identity and return its
    /// rewritten form.
    pub fn add_document(&mut self, schema: &Value, base_uri: Option<&str>) -> Result<Value> {
        self.documents += 1;
        let identity = format!("urn:familiar-logic:document:{}", self.documents);
        let base = match base_uri {
            Some(uri) => Some(Url::parse(uri).map_err(|_| LogicError::unresolvable(uri, "base URI"))?),
            None => None,
        };
        let has_root_id = root_id(schema).is_some();

        let mut walk = Walk {
            nominal: base.as_ref().map(|b| without_fragment(b).to_string()),
            identity: if has_root_id { None } else { Some(identity.clone()) },
            index: self,
        };
        let rewritten = walk.rewrite(schema, base.as_ref(), &identity, "")?;
        if !has_root_id {
            self.resources.insert(identity.clone(), rewritten.clone());
        }
        debug!(document = %identity, resources = self.resources.len(), "registered schema document");
        Ok(rewritten)
    }

    /// Register a shared definition reachable at `uri` (and at its own `$id`).
    pub fn add_definition(&mut self, uri: &str, schema: &Value) -> Result<()> {
        let base = Url::parse(uri).map_err(|_| LogicError::unresolvable(uri, "definitions"))?;
        let key = without_fragment(&base).to_string();
        let mut walk = Walk {
            nominal: None,
            identity: None,
            index: self,
        };
        let rewritten = walk.rewrite(schema, Some(&base), &key, "")?;
        self.resources.entry(key).or_insert(rewritten);
        Ok(())
    }

    /// Schema at an absolute URI: a resource, a JSON pointer into one, or
    /// a named anchor.
    pub fn lookup(&self, uri: &str) -> Option<&Value> {
        let (resource, fragment) = match uri.split_once('#') {
            Some((resource, fragment)) => (resource, fragment),
            None => (uri, ""),
        };
        if fragment.is_empty() {
            return self.resources.get(resource);
        }
        let fragment = percent_decode(fragment);
        if fragment.starts_with('/') {
            return pointer(self.resources.get(resource)?, &fragment);
        }
        let (owner, path) = self.anchors.get(&format!("{}#{}", resource, fragment))?;
        pointer(self.resources.get(owner)?, path)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Walk<'_> {
    /// Rewrite one schema node. `resource` is the URI key of the nearest
    /// enclosing resource and `path` the JSON pointer from it.
    fn rewrite(&mut self, node: &Value, base: Option<&Url>, resource: &str, path: &str) -> Result<Value> {
        let map = match node {
            Value::Object(map) => map,
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.rewrite(item, base, resource, &format!("{}/{}", path, i))?);
                }
                return Ok(Value::Array(out));
            }
            other => return Ok(other.clone()),
        };

        // A nested `$id` opens a new resource.
        let mut own_base = base.cloned();
        let mut resource = resource.to_string();
        let mut path = path.to_string();
        let mut opened = false;
        let mut anchor = map.get("$anchor").and_then(Value::as_str);
        match map.get("$id").and_then(Value::as_str) {
            // draft-07 plain-name fragment
            Some(id) if id.starts_with('#') => anchor = anchor.or(Some(&id[1..])),
            Some(id) => {
                let url = join(base, id)?;
                resource = without_fragment(&url).to_string();
                path = String::new();
                own_base = Some(url);
                opened = true;
            }
            None => {}
        }

        if let Some(anchor) = anchor.filter(|a| !a.is_empty()) {
            self.index
                .anchors
                .insert(format!("{}#{}", resource, anchor), (resource.clone(), path.clone()));
        }

        let mut out = Map::new();
        for (key, value) in map {
            let rewritten = match (key.as_str(), value) {
                ("$ref", Value::String(reference)) => Value::String(self.absolute(own_base.as_ref(), &resource, reference)?),
                (k, _) if DATA_KEYWORDS.contains(&k) => value.clone(),
                (k, Value::Object(entries)) if SCHEMA_MAPS.contains(&k) => {
                    let prefix = format!("{}/{}", path, escape(key));
                    let mut rewritten = Map::new();
                    for (name, entry) in entries {
                        let entry_path = format!("{}/{}", prefix, escape(name));
                        rewritten.insert(name.clone(), self.rewrite(entry, own_base.as_ref(), &resource, &entry_path)?);
                    }
                    Value::Object(rewritten)
                }
                _ => self.rewrite(value, own_base.as_ref(), &resource, &format!("{}/{}", path, escape(key)))?,
            };
            out.insert(key.clone(), rewritten);
        }

        let out = Value::Object(out);
        if opened {
            self.index.resources.insert(resource, out.clone());
        }
        Ok(out)
    }

    fn absolute(&self, base: Option<&Url>, resource: &str, reference: &str) -> Result<String> {
        if let Some(fragment) = reference.strip_prefix('#') {
            return Ok(if fragment.is_empty() {
                resource.to_string()
            } else {
                format!("{}#{}", resource, fragment)
            });
        }
        let url = join(base, reference)?;
        let mut key = without_fragment(&url).to_string();
        if let (Some(nominal), Some(identity)) = (&self.nominal, &self.identity) {
            if &key == nominal {
                key = identity.clone();
            }
        }
        Ok(match url.fragment() {
            Some(fragment) if !fragment.is_empty() => format!("{}#{}", key, fragment),
            _ => key,
        })
    }
}

fn root_id(schema: &Value) -> Option<&str> {
    schema
        .get("$id")
        .and_then(Value::as_str)
        .filter(|id| !id.starts_with('#'))
}

fn join(base: Option<&Url>, reference: &str) -> Result<Url> {
    match base {
        Some(base) => base
            .join(reference)
            .map_err(|_| LogicError::unresolvable(reference, base.as_str())),
        None => Url::parse(reference).map_err(|_| LogicError::unresolvable(reference, "no base URI")),
    }
}

fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn pointer<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = root;
    for token in path.split('/').skip(1) {
        let token = token.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Object(map) => map.get(&token)?,
            Value::Array(items) => items.get(token.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn hex(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push(high * 16 + low);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
