//! Python Code Emitter
//!
//! pydantic v2 models. Classes are declared dependencies-first because base
//! classes and union aliases are evaluated at import time; annotations are
//! deferred with `from __future__ import annotations`, and every class on a
//! reference cycle gets a `model_rebuild()` once all of them exist.

use serde_json::Value;

use crate::diagnostics::DiagnosticCode;
use crate::model::{GeneratedProperty, GeneratedType, TypeKind, TypeReference};
use crate::naming::{sanitize_identifier, to_screaming_snake_case, to_snake_case};
use crate::settings::GenerationSettings;

use super::{DeclarationOrder, Language, LanguageEmitter, RenderContext, RenderProfile, ScopedNames};

const HEADER: &str = "# Generated by schema-typegen. Do not edit.\n";

const RESERVED: &[&str] = &[
    "Annotated", "Any", "BaseModel", "ConfigDict", "Enum", "Field", "Literal", "Nullable", "Optional", "T",
    "TYPE_CHECKING", "TypeVar", "Union", "datetime", "decimal", "uuid",
];

/// Attributes pydantic reserves on every model
const MODEL_ATTRIBUTES: &[&str] = &["model_config", "model_fields", "model_computed_fields"];

const STDLIB_MODULES: &[&str] = &["datetime", "decimal", "uuid"];

pub struct PythonEmitter {
    profile: RenderProfile,
}

impl PythonEmitter {
    pub fn new() -> Self {
        Self::with_profile(RenderProfile::python())
    }

    pub fn with_profile(profile: RenderProfile) -> Self {
        Self { profile }
    }

    fn field(&self, ident: &str, prop: &GeneratedProperty, ctx: &RenderContext<'_>) -> String {
        let mut annotation = self.render_type(&prop.type_ref, ctx);
        if prop.nullable && !matches!(prop.type_ref, TypeReference::Nullable(_)) {
            annotation = ctx.nullable(&self.profile, &annotation);
        }

        let mut args: Vec<String> = Vec::new();
        if !prop.required {
            let default = prop.metadata.default.as_ref().map(literal).unwrap_or_else(|| "None".to_string());
            args.push(format!("default={}", default));
        }
        if ident != prop.name {
            args.push(format!("alias={}", quote(&prop.name)));
        }
        if let Some(description) = &prop.metadata.description {
            args.push(format!("description={}", quote(description)));
        }
        if prop.metadata.deprecated {
            args.push("deprecated=True".to_string());
        }

        match args.as_slice() {
            [] => format!("    {}: {}\n", ident, annotation),
            [only] if only.starts_with("default=") => {
                format!("    {}: {} = {}\n", ident, annotation, &only["default=".len()..])
            }
            _ => format!("    {}: {} = Field({})\n", ident, annotation, args.join(", ")),
        }
    }

    fn tag_field(&self, ident: &str, property: &str, tag: &str) -> String {
        let value = quote(tag);
        if ident == property {
            format!("    {}: Literal[{}] = {}\n", ident, value, value)
        } else {
            format!(
                "    {}: Literal[{}] = Field(default={}, alias={})\n",
                ident,
                value,
                value,
                quote(property)
            )
        }
    }

    fn property_ident(&self, name: &str, settings: &GenerationSettings) -> String {
        let cased = match settings.naming_strategy {
            Some(strategy) => strategy.apply(name),
            None => to_snake_case(name),
        };
        let mut ident = sanitize_identifier(&cased);
        if ident.is_empty() {
            return ident;
        }
        // pydantic treats underscore-prefixed attributes as private.
        if ident.starts_with('_') {
            ident = format!("field{}", ident);
        }
        if MODEL_ATTRIBUTES.contains(&ident.as_str()) {
            ident.push('_');
        }
        self.profile.escape_keyword(&ident)
    }

    /// Standard modules the rendered annotations of `unit` refer to
    fn stdlib_imports(&self, unit: &[&GeneratedType], ctx: &RenderContext<'_>) -> Vec<&'static str> {
        let mut rendered = String::new();
        for ty in unit {
            for prop in &ty.properties {
                rendered.push_str(&self.render_type(&prop.type_ref, ctx));
                rendered.push('\n');
            }
            if let Some(extra) = &ty.additional_properties {
                rendered.push_str(&self.render_type(extra, ctx));
            }
        }
        STDLIB_MODULES
            .iter()
            .copied()
            .filter(|module| rendered.contains(&format!("{}.", module)))
            .collect()
    }

    fn union_member(&self, union: &GeneratedType, member: &GeneratedType, ctx: &RenderContext<'_>) -> String {
        let name = ctx.type_name(member.id);
        if ctx.same_cycle(union.id, member.id) {
            quote(name)
        } else {
            name.to_string()
        }
    }
}

impl Default for PythonEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageEmitter for PythonEmitter {
    fn language(&self) -> Language {
        Language::Python
    }

    fn profile(&self) -> &RenderProfile {
        &self.profile
    }

    fn file_extension(&self) -> &'static str {
        "py"
    }

    fn declaration_order(&self) -> DeclarationOrder {
        DeclarationOrder::DependenciesFirst
    }

    fn reserved_type_names(&self) -> &'static [&'static str] {
        RESERVED
    }

    fn name_for_type(&self, ty: &GeneratedType) -> String {
        let name = sanitize_identifier(&ty.name);
        if name.is_empty() {
            return name;
        }
        self.profile.escape_keyword(&name)
    }

    fn name_for_property(&self, property: &GeneratedProperty, settings: &GenerationSettings) -> String {
        self.property_ident(&property.name, settings)
    }

    fn render_type(&self, reference: &TypeReference, ctx: &RenderContext<'_>) -> String {
        match reference {
            TypeReference::Primitive(p) => self.profile.primitive(p).to_string(),
            TypeReference::Generated(id) => ctx.type_name(*id).to_string(),
            TypeReference::Array(inner) => self.profile.wrap_array(&self.render_type(inner, ctx)),
            TypeReference::Map(inner) => self.profile.wrap_map(&self.render_type(inner, ctx)),
            TypeReference::Tuple(items) => {
                let items: Vec<String> = items.iter().map(|i| self.render_type(i, ctx)).collect();
                self.profile.wrap_tuple(&items)
            }
            TypeReference::Nullable(inner) => ctx.nullable(&self.profile, &self.render_type(inner, ctx)),
        }
    }

    fn render_class(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> String {
        let name = ctx.type_name(ty.id);
        let bases: Vec<&str> = ctx.class_bases(ty).iter().map(|b| ctx.type_name(b.id)).collect();
        let parents = if bases.is_empty() {
            "BaseModel".to_string()
        } else {
            bases.join(", ")
        };

        let mut out = format!("class {}({}):\n", name, parents);
        if let Some(description) = &ty.description {
            out.push_str(&format!("    {}\n\n", docstring(description)));
        }
        if ty.additional_properties.is_some() {
            out.push_str("    model_config = ConfigDict(populate_by_name=True, extra=\"allow\")\n");
        } else {
            out.push_str("    model_config = ConfigDict(populate_by_name=True)\n");
        }

        let mut fields = ScopedNames::new();
        let tag = ctx.union_tag(ty);
        if let Some((property, value)) = tag.filter(|(p, _)| ty.property(p).is_none()) {
            let (ident, _) = fields.claim(&self.property_ident(property, ctx.settings));
            out.push('\n');
            out.push_str(&self.tag_field(&ident, property, value));
        }

        if !ty.properties.is_empty() {
            out.push('\n');
        }
        for prop in &ty.properties {
            let (ident, renamed) = fields.claim(&self.name_for_property(prop, ctx.settings));
            if renamed {
                ctx.warn(
                    &ty.pointer,
                    DiagnosticCode::IdentifierCollision,
                    format!("field '{}' of {} renamed to '{}'", prop.name, ty.name, ident),
                );
            }
            match tag {
                Some((property, value)) if property == prop.name => {
                    out.push_str(&self.tag_field(&ident, property, value));
                }
                _ => out.push_str(&self.field(&ident, prop, ctx)),
            }
        }
        out
    }

    fn render_enum(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> String {
        let name = ctx.type_name(ty.id);
        let mixin = if ty.enum_members.iter().all(Value::is_string) { "str" } else { "int" };
        let mut out = format!("class {}({}, Enum):\n", name, mixin);
        if let Some(description) = &ty.description {
            out.push_str(&format!("    {}\n\n", docstring(description)));
        }

        let mut members = ScopedNames::new();
        for (i, value) in ty.enum_members.iter().enumerate() {
            let raw = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let candidate = match to_screaming_snake_case(&raw) {
                s if s.is_empty() => format!("VALUE_{}", i + 1),
                s if s.starts_with('_') => format!("VALUE{}", s),
                s => s,
            };
            let (member, renamed) = members.claim(&candidate);
            if renamed {
                ctx.warn(
                    &ty.pointer,
                    DiagnosticCode::EnumMemberConflict,
                    format!("enum value {} renamed to '{}'", value, member),
                );
            }
            out.push_str(&format!("    {} = {}\n", member, literal(value)));
        }
        out
    }

    fn render_interface(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> String {
        let name = ctx.type_name(ty.id);
        let mut members: Vec<String> = Vec::new();
        for (_, id) in ty.discriminator.iter().flat_map(|d| d.mapping.iter()) {
            if let Some(member) = ctx.get(*id) {
                let spelled = self.union_member(ty, member, ctx);
                if !members.contains(&spelled) {
                    members.push(spelled);
                }
            }
        }

        let mut out = String::new();
        if let Some(description) = &ty.description {
            for line in description.lines() {
                out.push_str(&format!("# {}\n", line.trim_end()).replace("# \n", "#\n"));
            }
        }
        match (members.as_slice(), &ty.discriminator) {
            ([], _) | (_, None) => {
                let rendered = self.profile.types.any.clone();
                ctx.fallback(&ty.pointer, "union without members", &rendered);
                out.push_str(&format!("{} = {}\n", name, rendered));
            }
            ([single], _) => out.push_str(&format!("{} = {}\n", name, single)),
            (many, Some(disc)) => out.push_str(&format!(
                "{} = Annotated[Union[{}], Field(discriminator={})]\n",
                name,
                many.join(", "),
                quote(&self.property_ident(&disc.property, ctx.settings))
            )),
        }
        out
    }

    fn prelude(&self, unit: &[&GeneratedType], imports: &[&GeneratedType], ctx: &RenderContext<'_>) -> String {
        let mut out = String::from(HEADER);
        out.push_str("\nfrom __future__ import annotations\n\n");
        for module in self.stdlib_imports(unit, ctx) {
            out.push_str(&format!("import {}\n", module));
        }
        out.push_str("from enum import Enum\n");
        out.push_str("from typing import TYPE_CHECKING, Annotated, Any, Literal, Optional, TypeVar, Union\n\n");
        out.push_str("from pydantic import BaseModel, ConfigDict, Field\n");

        if imports.is_empty() {
            return out;
        }

        // Class bases are needed at runtime; other cycle peers only for checking.
        let runtime = |import: &GeneratedType| {
            unit.iter().any(|ty| ty.base_types.contains(&import.id) && import.kind == TypeKind::Class)
                || !unit.iter().any(|ty| ctx.same_cycle(ty.id, import.id))
        };
        let line = |import: &GeneratedType| {
            let name = ctx.type_name(import.id);
            format!("from .{} import {}\n", self.module_name(name), name)
        };

        out.push('\n');
        for import in imports.iter().filter(|i| runtime(i)) {
            out.push_str(&line(import));
        }
        let deferred: Vec<&&GeneratedType> = imports.iter().filter(|i| !runtime(i)).collect();
        if !deferred.is_empty() {
            out.push_str("\nif TYPE_CHECKING:\n");
            for import in deferred {
                out.push_str(&format!("    {}", line(import)));
            }
        }
        out
    }

    fn nullable_helper(&self, _ctx: &RenderContext<'_>) -> String {
        "T = TypeVar(\"T\")\nNullable = Union[T, None]\n".to_string()
    }

    fn epilogue(&self, unit: &[&GeneratedType], ctx: &RenderContext<'_>) -> String {
        unit.iter()
            .filter(|ty| ty.kind == TypeKind::Class && ctx.in_cycle(ty.id))
            .map(|ty| format!("{}.model_rebuild()\n", ctx.type_name(ty.id)))
            .collect()
    }

    fn module_name(&self, name: &str) -> String {
        self.profile.escape_keyword(&to_snake_case(name))
    }

    fn index(&self, types: &[&GeneratedType], ctx: &RenderContext<'_>) -> (String, String) {
        let mut entries: Vec<(String, &str)> = types
            .iter()
            .map(|t| {
                let name = ctx.type_name(t.id);
                (self.module_name(name), name)
            })
            .collect();
        entries.sort();

        let mut out = String::from(HEADER);
        out.push('\n');
        for (module, name) in &entries {
            out.push_str(&format!("from .{} import {}\n", module, name));
        }

        let rebuild = self.epilogue(types, ctx);
        if !rebuild.is_empty() {
            out.push('\n');
            out.push_str(&rebuild);
        }

        out.push_str("\n__all__ = [\n");
        for (_, name) in &entries {
            out.push_str(&format!("    {},\n", quote(name)));
        }
        out.push_str("]\n");
        ("__init__.py".to_string(), out)
    }
}

fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Python literal for a scalar default; anything structured defaults to `None`
fn literal(value: &Value) -> String {
    match value {
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Null | Value::Array(_) | Value::Object(_) => "None".to_string(),
    }
}

fn docstring(text: &str) -> String {
    let text = text.trim().replace("\"\"\"", "\\\"\\\"\\\"");
    if text.contains('\n') {
        format!("\"\"\"\n    {}\n    \"\"\"", text.lines().collect::<Vec<_>>().join("\n    "))
    } else {
        format!("\"\"\"{}\"\"\"", text)
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen::{generate_for, Language};
    use crate::model::build;
    use crate::resolve::ResolutionSession;
    use crate::schema::parse_str;
    use crate::settings::GenerationSettings;

    fn py(text: &str) -> String {
        let doc = parse_str(text, "file:///api.json").unwrap();
        let resolved = ResolutionSession::offline().resolve_local(doc).unwrap();
        let settings = GenerationSettings::default();
        let model = build(&resolved, &settings).unwrap();
        let out = generate_for(&model, Language::Python, &settings).unwrap();
        out.file("generated.py").unwrap().to_string()
    }

    #[test]
    fn test_model_fields() {
        let code = py(
            r#"{"title":"User","description":"A user.","properties":{
                "userId":{"type":"string","format":"uuid"},
                "nick":{"type":["string","null"]},
                "active":{"type":"boolean","default":true},
                "class":{"type":"string"}},
              "required":["userId","nick"]}"#,
        );
        assert!(code.contains("import uuid\n"));
        assert!(!code.contains("import datetime"));
        assert!(code.contains("class User(BaseModel):\n    \"\"\"A user.\"\"\"\n\n    model_config = ConfigDict(populate_by_name=True)\n"));
        assert!(code.contains("    user_id: uuid.UUID = Field(alias=\"userId\")\n"));
        assert!(code.contains("    nick: Optional[str]\n"));
        assert!(code.contains("    active: Optional[bool] = True\n"));
        assert!(code.contains("    class_: Optional[str] = Field(default=None, alias=\"class\")\n"));
    }

    #[test]
    fn test_discriminated_union() {
        let code = py(
            r##"{"definitions":{
                "Shape":{"oneOf":[{"$ref":"#/definitions/Circle"},{"$ref":"#/definitions/Square"}],
                         "discriminator":{"propertyName":"kind","mapping":{"circle":"#/definitions/Circle","square":"#/definitions/Square"}}},
                "Circle":{"type":"object","properties":{"kind":{"type":"string"},"r":{"type":"number"}},"required":["kind"]},
                "Square":{"type":"object","properties":{"side":{"type":"number"}}}}}"##,
        );
        assert!(code.contains("    kind: Literal[\"circle\"] = \"circle\"\n"));
        assert!(code.contains("    kind: Literal[\"square\"] = \"square\"\n"));
        assert!(code.contains("Shape = Annotated[Union[Circle, Square], Field(discriminator=\"kind\")]\n"));
        let circle = code.find("class Circle(").unwrap();
        let shape = code.find("Shape = ").unwrap();
        assert!(circle < shape);
    }

    #[test]
    fn test_dependencies_declared_first_and_cycles_rebuilt() {
        let code = py(
            r##"{"definitions":{
                "Tree":{"type":"object","properties":{"root":{"$ref":"#/definitions/Node"}}},
                "Node":{"type":"object","properties":{"children":{"type":"array","items":{"$ref":"#/definitions/Node"}}}}}}"##,
        );
        assert!(code.find("class Node(").unwrap() < code.find("class Tree(").unwrap());
        assert!(code.contains("    children: Optional[list[Node]] = None\n"));
        assert!(code.ends_with("Node.model_rebuild()\n"));
        assert!(!code.contains("Tree.model_rebuild()"));
    }

    #[test]
    fn test_enums() {
        let code = py(r#"{"properties":{"color":{"enum":["red","dark-blue"]},"level":{"enum":[1,2]}}}"#);
        assert!(code.contains("class ApiColor(str, Enum):\n    RED = \"red\"\n    DARK_BLUE = \"dark-blue\"\n"));
        assert!(code.contains("class ApiLevel(int, Enum):\n    VALUE_1 = 1\n    VALUE_2 = 2\n"));
    }
}
