//! Property compatibility and merging for `allOf` composition
//!
//! Two declarations of one property are compatible when their types agree
//! after removing nullability, when one side is open (`Any`), when only one
//! side carries a format, when both are enums and one member set is a
//! subset of the other, or when one named object type refines the other.
//! The merged declaration keeps the more specific side and is non-nullable /
//! required if either side is.

use serde_json::Value;

use super::{GeneratedProperty, PrimitiveType, TypeId, TypeReference};

/// A property before its final nullability is computed
#[derive(Debug, Clone)]
pub(crate) struct PropertyDraft {
    pub property: GeneratedProperty,
    /// The property's schema itself admits `null`
    pub type_nullable: bool,
}

/// Incompatible declarations, described for the error message
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Conflict {
    pub left: String,
    pub right: String,
}

/// Lookup the merge needs into types being built
pub(crate) trait TypeFacts {
    fn enum_members(&self, id: TypeId) -> Option<&[Value]>;
    fn type_name(&self, id: TypeId) -> String;
    /// Every instance of `sub` is also a valid `sup`: `sup` is among its
    /// `allOf` ancestors, or `sub` declares all of `sup`'s properties with the
    /// same schemas and requires at least what `sup` requires
    fn refines(&self, sub: TypeId, sup: TypeId) -> bool;
}

/// Unify two references, or describe why they conflict
pub(crate) fn unify(a: &TypeReference, b: &TypeReference, facts: &dyn TypeFacts) -> Result<TypeReference, Conflict> {
    let nullable = matches!(a, TypeReference::Nullable(_)) && matches!(b, TypeReference::Nullable(_));
    let merged = unify_inner(a.non_null(), b.non_null(), facts).ok_or_else(|| Conflict {
        left: describe(a, facts),
        right: describe(b, facts),
    })?;
    Ok(if nullable {
        TypeReference::Nullable(Box::new(merged))
    } else {
        merged
    })
}

fn unify_inner(a: &TypeReference, b: &TypeReference, facts: &dyn TypeFacts) -> Option<TypeReference> {
    use PrimitiveType as P;
    use TypeReference as R;

    if a == b {
        return Some(a.clone());
    }
    match (a, b) {
        (R::Primitive(P::Any), other) | (other, R::Primitive(P::Any)) => Some(other.clone()),
        (R::Primitive(P::String { format: fa }), R::Primitive(P::String { format: fb })) => {
            narrower_format(fa, fb).map(|format| R::Primitive(P::String { format }))
        }
        (R::Primitive(P::Integer { format: fa }), R::Primitive(P::Integer { format: fb })) => {
            narrower_format(fa, fb).map(|format| R::Primitive(P::Integer { format }))
        }
        (R::Primitive(P::Number { format: fa }), R::Primitive(P::Number { format: fb })) => {
            narrower_format(fa, fb).map(|format| R::Primitive(P::Number { format }))
        }
        // Integers are a subset of numbers.
        (R::Primitive(P::Integer { .. }), R::Primitive(P::Number { .. })) => Some(a.clone()),
        (R::Primitive(P::Number { .. }), R::Primitive(P::Integer { .. })) => Some(b.clone()),
        (R::Generated(x), R::Generated(y)) => match (facts.enum_members(*x), facts.enum_members(*y)) {
            (Some(mx), Some(my)) if mx.iter().all(|m| my.contains(m)) => Some(a.clone()),
            (Some(mx), Some(my)) if my.iter().all(|m| mx.contains(m)) => Some(b.clone()),
            (Some(_), Some(_)) => None,
            _ if facts.refines(*x, *y) => Some(a.clone()),
            _ if facts.refines(*y, *x) => Some(b.clone()),
            _ => None,
        },
        (R::Array(x), R::Array(y)) => unify(x, y, facts).ok().map(|t| R::Array(Box::new(t))),
        (R::Map(x), R::Map(y)) => unify(x, y, facts).ok().map(|t| R::Map(Box::new(t))),
        (R::Tuple(xs), R::Tuple(ys)) if xs.len() == ys.len() => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| unify(x, y, facts).ok())
            .collect::<Option<Vec<_>>>()
            .map(R::Tuple),
        _ => None,
    }
}

fn narrower_format(a: &Option<String>, b: &Option<String>) -> Option<Option<String>> {
    match (a, b) {
        (x, y) if x == y => Some(x.clone()),
        (None, y) => Some(y.clone()),
        (x, None) => Some(x.clone()),
        _ => None,
    }
}

/// Merge `incoming` into an earlier declaration of the same property
pub(crate) fn merge_property(
    existing: &PropertyDraft,
    incoming: &PropertyDraft,
    facts: &dyn TypeFacts,
) -> Result<PropertyDraft, Conflict> {
    let type_ref = unify(&existing.property.type_ref, &incoming.property.type_ref, facts)?;

    let mut merged = existing.clone();
    merged.property.type_ref = type_ref;
    merged.type_nullable = existing.type_nullable && incoming.type_nullable;
    merged.property.required = existing.property.required || incoming.property.required;

    let meta = &mut merged.property.metadata;
    let other = &incoming.property.metadata;
    meta.description = meta.description.take().or_else(|| other.description.clone());
    meta.default = meta.default.take().or_else(|| other.default.clone());
    meta.format = meta.format.take().or_else(|| other.format.clone());
    meta.read_only |= other.read_only;
    meta.write_only |= other.write_only;
    meta.deprecated |= other.deprecated;
    Ok(merged)
}

/// Append `incoming`, merging with an existing declaration of the same name
pub(crate) fn merge_into(
    drafts: &mut Vec<PropertyDraft>,
    incoming: PropertyDraft,
    facts: &dyn TypeFacts,
) -> Result<(), (String, Conflict)> {
    match drafts.iter().position(|d| d.property.name == incoming.property.name) {
        Some(pos) => {
            let merged = merge_property(&drafts[pos], &incoming, facts)
                .map_err(|c| (incoming.property.name.clone(), c))?;
            drafts[pos] = merged;
        }
        None => drafts.push(incoming),
    }
    Ok(())
}

/// Human-readable spelling of a reference, for messages
pub(crate) fn describe(r: &TypeReference, facts: &dyn TypeFacts) -> String {
    match r {
        TypeReference::Primitive(p) => match p {
            PrimitiveType::String { format: Some(f) } => format!("string({})", f),
            PrimitiveType::String { format: None } => "string".into(),
            PrimitiveType::Integer { .. } => "integer".into(),
            PrimitiveType::Number { .. } => "number".into(),
            PrimitiveType::Boolean => "boolean".into(),
            PrimitiveType::Null => "null".into(),
            PrimitiveType::Any => "any".into(),
        },
        TypeReference::Generated(id) => facts.type_name(*id),
        TypeReference::Array(inner) => format!("array<{}>", describe(inner, facts)),
        TypeReference::Map(inner) => format!("map<{}>", describe(inner, facts)),
        TypeReference::Nullable(inner) => format!("{}?", describe(inner, facts)),
        TypeReference::Tuple(items) => format!(
            "[{}]",
            items.iter().map(|i| describe(i, facts)).collect::<Vec<_>>().join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyMetadata;
    use serde_json::json;

    struct Enums(Vec<Vec<Value>>);

    impl TypeFacts for Enums {
        fn enum_members(&self, id: TypeId) -> Option<&[Value]> {
            self.0.get(id.0).map(Vec::as_slice)
        }
        fn type_name(&self, id: TypeId) -> String {
            format!("Enum{}", id.0)
        }
        fn refines(&self, _sub: TypeId, _sup: TypeId) -> bool {
            false
        }
    }

    /// Objects where type 1 refines type 0
    struct Refined;

    impl TypeFacts for Refined {
        fn enum_members(&self, _id: TypeId) -> Option<&[Value]> {
            None
        }
        fn type_name(&self, id: TypeId) -> String {
            format!("Object{}", id.0)
        }
        fn refines(&self, sub: TypeId, sup: TypeId) -> bool {
            (sub.0, sup.0) == (1, 0)
        }
    }

    fn draft(name: &str, type_ref: TypeReference, type_nullable: bool, required: bool) -> PropertyDraft {
        PropertyDraft {
            property: GeneratedProperty {
                name: name.into(),
                type_ref,
                nullable: false,
                required,
                metadata: PropertyMetadata::default(),
            },
            type_nullable,
        }
    }

    #[test]
    fn test_non_nullable_and_required_win() {
        let facts = Enums(vec![]);
        let a = draft("id", TypeReference::string(), true, false);
        let b = draft("id", TypeReference::string(), false, true);
        let merged = merge_property(&a, &b, &facts).unwrap();
        assert!(!merged.type_nullable);
        assert!(merged.property.required);
    }

    #[test]
    fn test_enum_subset_wins() {
        let facts = Enums(vec![
            vec![json!("a"), json!("b"), json!("c")],
            vec![json!("b")],
        ]);
        let merged = unify(
            &TypeReference::Generated(TypeId(0)),
            &TypeReference::Generated(TypeId(1)),
            &facts,
        )
        .unwrap();
        assert_eq!(merged, TypeReference::Generated(TypeId(1)));
    }

    #[test]
    fn test_string_vs_integer_conflicts() {
        let facts = Enums(vec![]);
        let conflict = unify(&TypeReference::string(), &TypeReference::integer(), &facts).unwrap_err();
        assert_eq!(conflict, Conflict { left: "string".into(), right: "integer".into() });
    }

    #[test]
    fn test_format_and_any_are_narrowed() {
        let facts = Enums(vec![]);
        let dated = TypeReference::Primitive(PrimitiveType::String { format: Some("date".into()) });
        assert_eq!(unify(&TypeReference::string(), &dated, &facts).unwrap(), dated);
        assert_eq!(unify(&TypeReference::any(), &dated, &facts).unwrap(), dated);
    }

    #[test]
    fn test_refining_object_wins() {
        let (base, refined) = (TypeReference::Generated(TypeId(0)), TypeReference::Generated(TypeId(1)));
        assert_eq!(unify(&base, &refined, &Refined).unwrap(), refined);
        assert_eq!(unify(&refined, &base, &Refined).unwrap(), refined);

        let unrelated = TypeReference::Generated(TypeId(2));
        let conflict = unify(&base, &unrelated, &Refined).unwrap_err();
        assert_eq!(conflict, Conflict { left: "Object0".into(), right: "Object2".into() });
    }
}
