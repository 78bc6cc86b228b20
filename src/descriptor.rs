use anyhow::{Context, Result};
use serde::Serialize;

/// Primitive JVM type codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum PrimitiveKind {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    Void,
}

impl PrimitiveKind {
    pub(crate) fn from_code(code: char) -> Option<Self> {
        let kind = match code {
            'B' => PrimitiveKind::Byte,
            'C' => PrimitiveKind::Char,
            'D' => PrimitiveKind::Double,
            'F' => PrimitiveKind::Float,
            'I' => PrimitiveKind::Int,
            'J' => PrimitiveKind::Long,
            'S' => PrimitiveKind::Short,
            'Z' => PrimitiveKind::Boolean,
            'V' => PrimitiveKind::Void,
            _ => return None,
        };
        Some(kind)
    }

    pub(crate) fn keyword(self) -> &'static str {
        match self {
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Void => "void",
        }
    }
}

/// Base classification of a decoded type. For arrays this is the element type.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TypeKind {
    Primitive(PrimitiveKind),
    /// Slash-separated fully qualified class name.
    Class(String),
}

/// Type decoded from a field descriptor fragment such as `[[Ljava/lang/String;`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct Type {
    pub(crate) raw: String,
    pub(crate) kind: TypeKind,
    pub(crate) pretty: String,
    pub(crate) array_dimensions: usize,
}

impl Type {
    pub(crate) fn decode(fragment: &str) -> Result<Self> {
        let array_dimensions = fragment.bytes().take_while(|b| *b == b'[').count();
        let element = &fragment[array_dimensions..];

        let (kind, mut pretty) = if let Some(body) = element.strip_prefix('L') {
            let class_name = body
                .strip_suffix(';')
                .with_context(|| format!("unterminated class descriptor: {fragment}"))?;
            if class_name.is_empty() || class_name.contains(';') {
                anyhow::bail!("invalid class descriptor: {fragment}");
            }
            let simple = class_name.rsplit('/').next().unwrap_or(class_name);
            (TypeKind::Class(class_name.to_string()), simple.to_string())
        } else {
            let mut chars = element.chars();
            let kind = match (chars.next(), chars.next()) {
                (Some(code), None) => PrimitiveKind::from_code(code),
                _ => None,
            }
            .with_context(|| format!("invalid type descriptor: {fragment:?}"))?;
            if kind == PrimitiveKind::Void && array_dimensions > 0 {
                anyhow::bail!("array of void: {fragment}");
            }
            (TypeKind::Primitive(kind), kind.keyword().to_string())
        };

        pretty.push_str(&"[]".repeat(array_dimensions));
        Ok(Self {
            raw: fragment.to_string(),
            kind,
            pretty,
            array_dimensions,
        })
    }

    pub(crate) fn primitive(&self) -> Option<PrimitiveKind> {
        match &self.kind {
            TypeKind::Primitive(kind) => Some(*kind),
            TypeKind::Class(_) => None,
        }
    }

    pub(crate) fn class_name(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::Class(name) => Some(name),
            TypeKind::Primitive(_) => None,
        }
    }

    pub(crate) fn is_void(&self) -> bool {
        self.array_dimensions == 0 && self.primitive() == Some(PrimitiveKind::Void)
    }

    /// Scalar `long` and `double` occupy two local variable slots.
    pub(crate) fn slot_width(&self) -> u16 {
        match (self.array_dimensions, self.primitive()) {
            (0, Some(PrimitiveKind::Long | PrimitiveKind::Double)) => 2,
            _ => 1,
        }
    }
}

/// Split a method descriptor into its parameter section and return type fragment.
pub(crate) fn split_method_descriptor(descriptor: &str) -> Result<(&str, &str)> {
    let body = descriptor
        .strip_prefix('(')
        .with_context(|| format!("method descriptor must start with '(': {descriptor}"))?;
    let close = body
        .find(')')
        .with_context(|| format!("method descriptor missing ')': {descriptor}"))?;
    Ok((&body[..close], &body[close + 1..]))
}

/// Decode the return type of a method descriptor.
pub(crate) fn method_return_type(descriptor: &str) -> Result<Type> {
    let (_, ret) = split_method_descriptor(descriptor)?;
    Type::decode(ret).with_context(|| format!("decode return type of {descriptor}"))
}
