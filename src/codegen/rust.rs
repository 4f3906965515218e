//! Rust Code Emitter
//!
//! serde-derived structs and enums:
//! - class bases are embedded with `#[serde(flatten)]`
//! - union bases become internally tagged enums, one newtype variant per member
//! - a direct reference to a type on the same reference cycle is boxed
//! - integer enums have no serde spelling without extra crates and fall back
//!   to the integer type

use serde_json::Value;

use crate::diagnostics::DiagnosticCode;
use crate::model::{GeneratedProperty, GeneratedType, TypeReference};
use crate::naming::{sanitize_identifier, to_pascal_case, to_snake_case};
use crate::settings::GenerationSettings;

use super::{DeclarationOrder, Language, LanguageEmitter, RenderContext, RenderProfile, ScopedNames};

const HEADER: &str = "//! Generated by schema-typegen. Do not edit.\n";

/// Names the generated code itself spells unqualified
const RESERVED: &[&str] = &[
    "Option", "Result", "String", "Vec", "Box", "Nullable", "Serialize", "Deserialize",
];

pub struct RustEmitter {
    profile: RenderProfile,
}

impl RustEmitter {
    pub fn new() -> Self {
        Self::with_profile(RenderProfile::rust())
    }

    pub fn with_profile(profile: RenderProfile) -> Self {
        Self { profile }
    }

    fn field_type(&self, owner: &GeneratedType, prop: &GeneratedProperty, ctx: &RenderContext<'_>) -> String {
        let inner = prop.type_ref.non_null();
        let mut rendered = self.render_type(inner, ctx);
        if let Some(target) = inner.direct() {
            if ctx.same_cycle(owner.id, target) {
                rendered = self.profile.wrap_box(&rendered);
            }
        }
        if prop.nullable || matches!(prop.type_ref, TypeReference::Nullable(_)) {
            ctx.nullable(&self.profile, &rendered)
        } else {
            rendered
        }
    }
}

impl Default for RustEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageEmitter for RustEmitter {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn profile(&self) -> &RenderProfile {
        &self.profile
    }

    fn file_extension(&self) -> &'static str {
        "rs"
    }

    fn declaration_order(&self) -> DeclarationOrder {
        DeclarationOrder::BasesFirst
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
        let cased = match settings.naming_strategy {
            Some(strategy) => strategy.apply(&property.name),
            None => to_snake_case(&property.name),
        };
        let name = sanitize_identifier(&cased);
        if name.is_empty() {
            return name;
        }
        self.profile.escape_keyword(&name)
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
        let mut out = String::new();
        push_docs(&mut out, "", ty.description.as_deref());
        out.push_str("#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n");
        out.push_str(&format!("pub struct {} {{\n", ctx.type_name(ty.id)));

        let mut fields = ScopedNames::new();
        for base in ctx.class_bases(ty) {
            let (field, _) = fields.claim(&self.profile.escape_keyword(&to_snake_case(&base.name)));
            out.push_str("    #[serde(flatten)]\n");
            out.push_str(&format!("    pub {}: {},\n", field, ctx.type_name(base.id)));
        }

        // The enum's tag carries the discriminator for union members.
        let tag = ctx.union_tag(ty).map(|(property, _)| property);
        for prop in ty.properties.iter().filter(|p| Some(p.name.as_str()) != tag) {
            let (ident, renamed) = fields.claim(&self.name_for_property(prop, ctx.settings));
            if renamed {
                ctx.warn(
                    &ty.pointer,
                    DiagnosticCode::IdentifierCollision,
                    format!("field '{}' of {} renamed to '{}'", prop.name, ty.name, ident),
                );
            }

            push_docs(&mut out, "    ", prop.metadata.description.as_deref());
            if prop.metadata.deprecated {
                out.push_str("    /// Deprecated.\n");
            }
            if ident.trim_start_matches("r#") != prop.name {
                out.push_str(&format!("    #[serde(rename = \"{}\")]\n", escape(&prop.name)));
            }
            if !prop.required {
                out.push_str("    #[serde(default, skip_serializing_if = \"Option::is_none\")]\n");
            }
            out.push_str(&format!("    pub {}: {},\n", ident, self.field_type(ty, prop, ctx)));
        }

        if let Some(extra) = &ty.additional_properties {
            let (ident, _) = fields.claim("additional_properties");
            out.push_str("    #[serde(flatten)]\n");
            out.push_str(&format!(
                "    pub {}: {},\n",
                ident,
                self.profile.wrap_map(&self.render_type(extra, ctx))
            ));
        }

        out.push_str("}\n");
        out
    }

    fn render_enum(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> String {
        let name = ctx.type_name(ty.id);
        let mut out = String::new();
        push_docs(&mut out, "", ty.description.as_deref());

        if !ty.enum_members.iter().all(Value::is_string) {
            let rendered = self.profile.types.integer.clone();
            ctx.fallback(&ty.pointer, "integer enum", &rendered);
            let values: Vec<String> = ty.enum_members.iter().map(Value::to_string).collect();
            out.push_str(&format!("/// One of: {}\n", values.join(", ")));
            out.push_str(&format!("pub type {} = {};\n", name, rendered));
            return out;
        }

        out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]\n");
        out.push_str(&format!("pub enum {} {{\n", name));
        let mut variants = ScopedNames::new();
        for (i, member) in ty.enum_members.iter().enumerate() {
            let value = member.as_str().unwrap_or_default();
            let candidate = match to_pascal_case(value) {
                v if v.is_empty() => format!("Value{}", i + 1),
                v => self.profile.escape_keyword(&v),
            };
            let (variant, renamed) = variants.claim(&candidate);
            if renamed {
                ctx.warn(
                    &ty.pointer,
                    DiagnosticCode::EnumMemberConflict,
                    format!("enum value '{}' renamed to '{}'", value, variant),
                );
            }
            if variant != value {
                out.push_str(&format!("    #[serde(rename = \"{}\")]\n", escape(value)));
            }
            out.push_str(&format!("    {},\n", variant));
        }
        out.push_str("}\n");
        out
    }

    fn render_interface(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> String {
        let name = ctx.type_name(ty.id);
        let mut out = String::new();
        push_docs(&mut out, "", ty.description.as_deref());

        let Some(disc) = ty.discriminator.as_ref().filter(|d| !d.mapping.is_empty()) else {
            let rendered = self.profile.types.any.clone();
            ctx.fallback(&ty.pointer, "union without members", &rendered);
            out.push_str(&format!("pub type {} = {};\n", name, rendered));
            return out;
        };

        out.push_str("#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n");
        out.push_str(&format!("#[serde(tag = \"{}\")]\n", escape(&disc.property)));
        out.push_str(&format!("pub enum {} {{\n", name));
        for (tag, member) in &disc.mapping {
            let variant = ctx.type_name(*member);
            if variant != tag {
                out.push_str(&format!("    #[serde(rename = \"{}\")]\n", escape(tag)));
            }
            out.push_str(&format!("    {}({}),\n", variant, variant));
        }
        out.push_str("}\n");
        out
    }

    fn prelude(&self, _unit: &[&GeneratedType], imports: &[&GeneratedType], ctx: &RenderContext<'_>) -> String {
        let mut out = String::from(HEADER);
        out.push('\n');
        out.push_str("use serde::{Deserialize, Serialize};\n");
        if !imports.is_empty() {
            let names: Vec<&str> = imports.iter().map(|t| ctx.type_name(t.id)).collect();
            out.push_str(&format!("\nuse super::{{{}}};\n", names.join(", ")));
        }
        out
    }

    fn nullable_helper(&self, _ctx: &RenderContext<'_>) -> String {
        "pub type Nullable<T> = Option<T>;\n".to_string()
    }

    fn module_name(&self, name: &str) -> String {
        to_snake_case(name)
    }

    fn index(&self, types: &[&GeneratedType], ctx: &RenderContext<'_>) -> (String, String) {
        let mut out = String::from(HEADER);
        let mut modules: Vec<(String, &str)> = types
            .iter()
            .map(|t| {
                let name = ctx.type_name(t.id);
                (self.module_name(name), name)
            })
            .collect();
        modules.sort();

        out.push('\n');
        for (module, _) in &modules {
            out.push_str(&format!("mod {};\n", self.profile.escape_keyword(module)));
        }
        out.push('\n');
        for (module, name) in &modules {
            out.push_str(&format!("pub use {}::{};\n", self.profile.escape_keyword(module), name));
        }
        ("mod.rs".to_string(), out)
    }
}

fn push_docs(out: &mut String, indent: &str, text: Option<&str>) {
    if let Some(text) = text {
        for line in text.lines() {
            if line.trim().is_empty() {
                out.push_str(&format!("{}///\n", indent));
            } else {
                out.push_str(&format!("{}/// {}\n", indent, line.trim_end()));
            }
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use crate::codegen::{generate_for, Language};
    use crate::model::build;
    use crate::resolve::ResolutionSession;
    use crate::schema::parse_str;
    use crate::settings::GenerationSettings;

    fn rust(text: &str) -> String {
        let doc = parse_str(text, "file:///api.json").unwrap();
        let resolved = ResolutionSession::offline().resolve_local(doc).unwrap();
        let settings = GenerationSettings::default();
        let model = build(&resolved, &settings).unwrap();
        let out = generate_for(&model, Language::Rust, &settings).unwrap();
        out.file("generated.rs").unwrap().to_string()
    }

    #[test]
    fn test_struct_fields_and_renames() {
        let code = rust(
            r#"{"title":"User","properties":{
                "userId":{"type":"string","format":"uuid"},
                "type":{"type":"string"},
                "age":{"type":"integer"}},
              "required":["userId","type"]}"#,
        );
        assert!(code.contains("pub struct User {"));
        assert!(code.contains("    #[serde(rename = \"userId\")]\n    pub user_id: uuid::Uuid,\n"));
        assert!(code.contains("    pub r#type: String,\n"));
        assert!(!code.contains("rename = \"type\""));
        assert!(code.contains(
            "    #[serde(default, skip_serializing_if = \"Option::is_none\")]\n    pub age: Option<i64>,\n"
        ));
    }

    #[test]
    fn test_cycle_members_boxed() {
        let code = rust(
            r##"{"definitions":{
                "Node":{"type":"object","properties":{"next":{"$ref":"#/definitions/Node"},"children":{"type":"array","items":{"$ref":"#/definitions/Node"}}}}}}"##,
        );
        assert!(code.contains("pub next: Option<Box<Node>>,"));
        assert!(code.contains("pub children: Option<Vec<Node>>,"));
    }

    #[test]
    fn test_base_flattened() {
        let code = rust(
            r##"{"definitions":{
                "Base":{"type":"object","properties":{"id":{"type":"string"}}},
                "Derived":{"allOf":[{"$ref":"#/definitions/Base"}],"properties":{"extra":{"type":"integer"}}}}}"##,
        );
        assert!(code.contains("pub struct Derived {\n    #[serde(flatten)]\n    pub base: Base,\n"));
    }

    #[test]
    fn test_union_is_tagged_enum() {
        let code = rust(
            r##"{"definitions":{
                "Shape":{"oneOf":[{"$ref":"#/definitions/Circle"},{"$ref":"#/definitions/Square"}],
                         "discriminator":{"propertyName":"kind","mapping":{"circle":"#/definitions/Circle","square":"#/definitions/Square"}}},
                "Circle":{"type":"object","properties":{"kind":{"type":"string"},"r":{"type":"number"}},"required":["kind"]},
                "Square":{"type":"object","properties":{"kind":{"type":"string"},"side":{"type":"number"}},"required":["kind"]}}}"##,
        );
        assert!(code.contains("#[serde(tag = \"kind\")]\npub enum Shape {\n    #[serde(rename = \"circle\")]\n    Circle(Circle),"));
        // the tag lives on the enum, not the member
        assert!(!code.contains("pub kind: String"));
    }

    #[test]
    fn test_string_and_integer_enums() {
        let code = rust(r#"{"properties":{"color":{"enum":["light-red","BLUE"]},"level":{"enum":[1,2]}}}"#);
        assert!(code.contains("pub enum ApiColor {\n    #[serde(rename = \"light-red\")]\n    LightRed,\n    #[serde(rename = \"BLUE\")]\n    Blue,\n}"));
        assert!(code.contains("pub type ApiLevel = i64;"));
    }
}
