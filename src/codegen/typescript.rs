//! TypeScript Code Emitter
//!
//! Interfaces by default; classes with a `Partial<T>` constructor when
//! default constructors are requested. Discriminated unions become type
//! aliases over their members, each member pinning the tag to a literal.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::diagnostics::DiagnosticCode;
use crate::model::{GeneratedProperty, GeneratedType, TypeKind, TypeReference};
use crate::naming::{sanitize_identifier, to_pascal_case};
use crate::settings::{GenerationSettings, OutputLayout};

use super::{DeclarationOrder, Language, LanguageEmitter, RenderContext, RenderProfile, ScopedNames};

const HEADER: &str = "// Generated by schema-typegen. Do not edit.\n";

const RESERVED: &[&str] = &[
    "Array", "Date", "Error", "Map", "Nullable", "Object", "Partial", "Promise", "Record", "Set", "String",
];

fn plain_identifier() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("static regex"))
}

pub struct TypeScriptEmitter {
    profile: RenderProfile,
}

impl TypeScriptEmitter {
    pub fn new() -> Self {
        Self::with_profile(RenderProfile::typescript())
    }

    pub fn with_profile(profile: RenderProfile) -> Self {
        Self { profile }
    }

    /// Property key as written in a declaration, quoted when not an identifier
    fn key(&self, prop: &GeneratedProperty, settings: &GenerationSettings) -> String {
        let name = self.name_for_property(prop, settings);
        if plain_identifier().is_match(&name) {
            name
        } else {
            Value::String(name).to_string()
        }
    }

    fn member(&self, ty: &GeneratedType, prop: &GeneratedProperty, ctx: &RenderContext<'_>, class: bool) -> String {
        let mut out = String::new();
        push_doc(&mut out, "  ", prop.metadata.description.as_deref(), prop.metadata.deprecated);

        let key = self.key(prop, ctx.settings);
        let readonly = if prop.metadata.read_only { "readonly " } else { "" };

        if let Some((_, tag)) = ctx.union_tag(ty).filter(|(p, _)| *p == prop.name) {
            let literal = Value::String(tag.to_string()).to_string();
            if class {
                out.push_str(&format!("  {}{}: {} = {};\n", readonly, key, literal, literal));
            } else {
                out.push_str(&format!("  {}{}: {};\n", readonly, key, literal));
            }
            return out;
        }

        let mut rendered = self.render_type(&prop.type_ref, ctx);
        if prop.metadata.nullable && !matches!(prop.type_ref, TypeReference::Nullable(_)) {
            rendered = ctx.nullable(&self.profile, &rendered);
        }
        let marker = match (prop.required, class) {
            (false, _) => "?",
            (true, true) => "!",
            (true, false) => "",
        };
        out.push_str(&format!("  {}{}{}: {};\n", readonly, key, marker, rendered));
        out
    }

    /// The tag member when the type does not declare the tag property itself
    fn missing_tag(&self, ty: &GeneratedType, ctx: &RenderContext<'_>, class: bool) -> Option<String> {
        let (property, tag) = ctx.union_tag(ty)?;
        if ty.property(property).is_some() {
            return None;
        }
        let key = if plain_identifier().is_match(property) {
            property.to_string()
        } else {
            Value::String(property.to_string()).to_string()
        };
        let literal = Value::String(tag.to_string()).to_string();
        Some(if class {
            format!("  {}: {} = {};\n", key, literal, literal)
        } else {
            format!("  {}: {};\n", key, literal)
        })
    }

    fn index_signature(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> Option<String> {
        let extra = ty.additional_properties.as_ref()?;
        // A typed signature must admit every declared member, so only a bare map gets one.
        let value = if ty.properties.is_empty() && ty.base_types.is_empty() {
            self.render_type(extra, ctx)
        } else {
            self.profile.types.any.clone()
        };
        Some(format!("  [key: string]: {};\n", value))
    }

    fn render_declared_interface(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> String {
        let name = ctx.type_name(ty.id);
        let mut out = String::new();
        push_doc(&mut out, "", ty.description.as_deref(), false);

        let bases: Vec<&str> = ctx.class_bases(ty).iter().map(|b| ctx.type_name(b.id)).collect();
        if bases.is_empty() {
            out.push_str(&format!("export interface {} {{\n", name));
        } else {
            out.push_str(&format!("export interface {} extends {} {{\n", name, bases.join(", ")));
        }
        self.push_members(&mut out, ty, &ty.properties, ctx, false);
        out.push_str("}\n");
        out
    }

    fn render_declared_class(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> String {
        let name = ctx.type_name(ty.id);
        let mut out = String::new();
        push_doc(&mut out, "", ty.description.as_deref(), false);

        let bases = ctx.class_bases(ty);
        let mut properties: Vec<GeneratedProperty> = Vec::new();
        // A class has one superclass; further bases are inlined.
        for extra in bases.iter().skip(1) {
            for prop in &extra.properties {
                if ty.property(&prop.name).is_none() && !properties.iter().any(|p| p.name == prop.name) {
                    properties.push(prop.clone());
                }
            }
        }
        if let Some(first) = bases.first().filter(|_| bases.len() > 1) {
            ctx.fallback(&ty.pointer, "multiple inheritance", &format!("extends {}", ctx.type_name(first.id)));
        }
        properties.extend(ty.properties.iter().cloned());

        let modifier = if ty.is_abstract { "abstract " } else { "" };
        match bases.first() {
            Some(base) => out.push_str(&format!(
                "export {}class {} extends {} {{\n",
                modifier,
                name,
                ctx.type_name(base.id)
            )),
            None => out.push_str(&format!("export {}class {} {{\n", modifier, name)),
        }
        self.push_members(&mut out, ty, &properties, ctx, true);

        out.push('\n');
        out.push_str(&format!("  constructor(init?: Partial<{}>) {{\n", name));
        if !bases.is_empty() {
            out.push_str("    super(init);\n");
        }
        out.push_str("    Object.assign(this, init);\n");
        out.push_str("  }\n");
        out.push_str("}\n");
        out
    }

    fn push_members(
        &self,
        out: &mut String,
        ty: &GeneratedType,
        properties: &[GeneratedProperty],
        ctx: &RenderContext<'_>,
        class: bool,
    ) {
        let mut keys = ScopedNames::new();
        if let Some(tag) = self.missing_tag(ty, ctx, class) {
            out.push_str(&tag);
        }
        for prop in properties {
            let (_, clashed) = keys.claim(&self.key(prop, ctx.settings));
            if clashed {
                // Two JSON names mapped to one key; keep the first.
                ctx.warn(
                    &ty.pointer,
                    DiagnosticCode::IdentifierCollision,
                    format!("property '{}' of {} dropped: key already declared", prop.name, ty.name),
                );
                continue;
            }
            out.push_str(&self.member(ty, prop, ctx, class));
        }
        if let Some(signature) = self.index_signature(ty, ctx) {
            out.push_str(&signature);
        }
    }
}

impl Default for TypeScriptEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageEmitter for TypeScriptEmitter {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn profile(&self) -> &RenderProfile {
        &self.profile
    }

    fn file_extension(&self) -> &'static str {
        "ts"
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

    /// JSON names are kept unless a naming strategy is configured
    fn name_for_property(&self, property: &GeneratedProperty, settings: &GenerationSettings) -> String {
        match settings.naming_strategy {
            Some(strategy) => strategy.apply(&property.name),
            None => property.name.clone(),
        }
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
        if ctx.settings.generate_default_constructors {
            self.render_declared_class(ty, ctx)
        } else {
            self.render_declared_interface(ty, ctx)
        }
    }

    fn render_enum(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> String {
        let mut out = String::new();
        push_doc(&mut out, "", ty.description.as_deref(), false);
        out.push_str(&format!("export enum {} {{\n", ctx.type_name(ty.id)));

        let mut members = ScopedNames::new();
        for (i, value) in ty.enum_members.iter().enumerate() {
            let candidate = match value {
                Value::String(s) => match to_pascal_case(s) {
                    v if v.is_empty() => format!("Value{}", i + 1),
                    v => v,
                },
                Value::Number(n) if n.as_u64().is_some() => format!("Value{}", n),
                _ => format!("Value{}", i + 1),
            };
            let (member, renamed) = members.claim(&candidate);
            if renamed {
                ctx.warn(
                    &ty.pointer,
                    DiagnosticCode::EnumMemberConflict,
                    format!("enum value {} renamed to '{}'", value, member),
                );
            }
            out.push_str(&format!("  {} = {},\n", member, value));
        }
        out.push_str("}\n");
        out
    }

    fn render_interface(&self, ty: &GeneratedType, ctx: &RenderContext<'_>) -> String {
        let name = ctx.type_name(ty.id);
        let mut out = String::new();
        push_doc(&mut out, "", ty.description.as_deref(), false);

        let members: Vec<&str> = ty
            .discriminator
            .iter()
            .flat_map(|d| d.mapping.iter())
            .map(|(_, member)| ctx.type_name(*member))
            .collect();
        if members.is_empty() {
            let rendered = self.profile.types.any.clone();
            ctx.fallback(&ty.pointer, "union without members", &rendered);
            out.push_str(&format!("export type {} = {};\n", name, rendered));
        } else {
            let mut unique: Vec<&str> = Vec::with_capacity(members.len());
            for m in members {
                if !unique.contains(&m) {
                    unique.push(m);
                }
            }
            out.push_str(&format!("export type {} = {};\n", name, unique.join(" | ")));
        }
        out
    }

    fn prelude(&self, _unit: &[&GeneratedType], imports: &[&GeneratedType], ctx: &RenderContext<'_>) -> String {
        let mut out = String::from(HEADER);
        if imports.is_empty() {
            return out;
        }
        out.push('\n');
        for import in imports {
            let name = ctx.type_name(import.id);
            // Classes extend and construct their bases at runtime.
            let value_import = ctx.settings.generate_default_constructors && import.kind != TypeKind::Interface;
            let keyword = if value_import { "import" } else { "import type" };
            out.push_str(&format!("{} {{ {} }} from \"./{}\";\n", keyword, name, self.module_name(name)));
        }
        out
    }

    fn nullable_helper(&self, ctx: &RenderContext<'_>) -> String {
        match ctx.settings.layout {
            OutputLayout::SingleFile => "export type Nullable<T> = T | null;\n".to_string(),
            OutputLayout::FilePerType => "type Nullable<T> = T | null;\n".to_string(),
        }
    }

    fn module_name(&self, name: &str) -> String {
        name.to_string()
    }

    fn index(&self, types: &[&GeneratedType], ctx: &RenderContext<'_>) -> (String, String) {
        let mut modules: Vec<String> = types.iter().map(|t| self.module_name(ctx.type_name(t.id))).collect();
        modules.sort();
        let mut out = String::from(HEADER);
        out.push('\n');
        for module in modules {
            out.push_str(&format!("export * from \"./{}\";\n", module));
        }
        ("index.ts".to_string(), out)
    }
}

fn push_doc(out: &mut String, indent: &str, text: Option<&str>, deprecated: bool) {
    let mut lines: Vec<String> = text
        .map(|t| t.lines().map(|l| l.trim_end().replace("*/", "*\\/")).collect())
        .unwrap_or_default();
    if deprecated {
        lines.push("@deprecated".to_string());
    }
    match lines.as_slice() {
        [] => {}
        [line] => out.push_str(&format!("{}/** {} */\n", indent, line)),
        _ => {
            out.push_str(&format!("{}/**\n", indent));
            for line in &lines {
                if line.is_empty() {
                    out.push_str(&format!("{} *\n", indent));
                } else {
                    out.push_str(&format!("{} * {}\n", indent, line));
                }
            }
            out.push_str(&format!("{} */\n", indent));
        }
    }
}
