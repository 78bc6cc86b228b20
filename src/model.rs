use std::path::PathBuf;

use serde::Serialize;

use crate::constant_pool::ConstantValue;
use crate::descriptor::Type;
use crate::params::MethodParam;

pub(crate) const ACC_PUBLIC: u16 = 0x0001;
pub(crate) const ACC_PRIVATE: u16 = 0x0002;
pub(crate) const ACC_PROTECTED: u16 = 0x0004;
pub(crate) const ACC_STATIC: u16 = 0x0008;
pub(crate) const ACC_FINAL: u16 = 0x0010;
pub(crate) const ACC_INTERFACE: u16 = 0x0200;
pub(crate) const ACC_ABSTRACT: u16 = 0x0400;
pub(crate) const ACC_ENUM: u16 = 0x4000;

const OBJECT_CLASS: &str = "java/lang/Object";
const ENUM_CLASS: &str = "java/lang/Enum";

/// Java visibility derived from access flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Scope {
    Private,
    Default,
    Protected,
    Public,
}

impl Scope {
    pub(crate) fn from_access(flags: u16) -> Self {
        if flags & ACC_PRIVATE != 0 {
            Scope::Private
        } else if flags & ACC_PROTECTED != 0 {
            Scope::Protected
        } else if flags & ACC_PUBLIC != 0 {
            Scope::Public
        } else {
            Scope::Default
        }
    }

    /// Source keyword; package-private has none.
    pub(crate) fn keyword(self) -> Option<&'static str> {
        match self {
            Scope::Private => Some("private"),
            Scope::Default => None,
            Scope::Protected => Some("protected"),
            Scope::Public => Some("public"),
        }
    }
}

/// Class classification. Enums are compiled as final but classify as `Enum`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ClassKind {
    Normal,
    Final,
    Interface,
    Abstract,
    Enum,
}

impl ClassKind {
    pub(crate) fn from_access(flags: u16) -> Self {
        if flags & ACC_ENUM != 0 {
            ClassKind::Enum
        } else if flags & ACC_FINAL != 0 {
            ClassKind::Final
        } else if flags & ACC_INTERFACE != 0 {
            ClassKind::Interface
        } else if flags & ACC_ABSTRACT != 0 {
            ClassKind::Abstract
        } else {
            ClassKind::Normal
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            ClassKind::Interface => "interface",
            ClassKind::Enum => "enum",
            ClassKind::Abstract => "abstract class",
            ClassKind::Normal | ClassKind::Final => "class",
        }
    }
}

/// Decomposition of a slash separated, optionally `$` nested, class name.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct ClassDetail {
    pub(crate) package: String,
    pub(crate) name: String,
    pub(crate) outer: Option<String>,
    pub(crate) full: String,
}

impl ClassDetail {
    pub(crate) fn parse(full: &str) -> Self {
        let (package, local) = match full.rfind('/') {
            Some(split) => (&full[..split], &full[split + 1..]),
            None => ("", full),
        };
        let (outer, name) = match local.rfind('$') {
            Some(split) => {
                let outer_len = full.len() - local.len() + split;
                (Some(full[..outer_len].to_string()), &local[split + 1..])
            }
            None => (None, local),
        };
        Self {
            package: package.to_string(),
            name: name.to_string(),
            outer,
            full: full.to_string(),
        }
    }

    /// Rebuild the descriptor from its parts.
    #[allow(dead_code)]
    pub(crate) fn reconstruct(&self) -> String {
        match (&self.outer, self.package.is_empty()) {
            (Some(outer), _) => format!("{outer}${}", self.name),
            (None, true) => self.name.clone(),
            (None, false) => format!("{}/{}", self.package, self.name),
        }
    }

    pub(crate) fn dotted(&self) -> String {
        dotted(&self.full)
    }
}

pub(crate) fn dotted(descriptor: &str) -> String {
    descriptor.replace('/', ".")
}

/// Identity and modifiers shared by fields and methods.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct ElementInfo {
    pub(crate) name: String,
    pub(crate) descriptor: String,
    /// Descriptor of the declaring class.
    pub(crate) owner: String,
    pub(crate) scope: Scope,
    pub(crate) is_static: bool,
    pub(crate) is_final: bool,
    pub(crate) javadoc: String,
}

impl ElementInfo {
    pub(crate) fn from_access(name: String, descriptor: String, owner: &str, flags: u16) -> Self {
        Self {
            name,
            descriptor,
            owner: owner.to_string(),
            scope: Scope::from_access(flags),
            is_static: flags & ACC_STATIC != 0,
            is_final: flags & ACC_FINAL != 0,
            javadoc: String::new(),
        }
    }

    /// `com.example.Point.xI`
    #[allow(dead_code)]
    pub(crate) fn qualified_name(&self) -> String {
        format!("{}.{}{}", dotted(&self.owner), self.name, self.descriptor)
    }

    #[allow(dead_code)]
    pub(crate) fn is(&self, owner: &str, name: &str, descriptor: &str) -> bool {
        self.owner == owner && self.name == name && self.descriptor == descriptor
    }

    pub(crate) fn modifiers(&self, include_class: bool) -> String {
        let mut out = String::new();
        if include_class {
            out.push_str(&dotted(&self.owner));
            out.push('/');
        }
        if let Some(keyword) = self.scope.keyword() {
            out.push_str(keyword);
            out.push(' ');
        }
        if self.is_static {
            out.push_str("static ");
        }
        if self.is_final {
            out.push_str("final ");
        }
        out
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct FieldModel {
    #[serde(flatten)]
    pub(crate) element: ElementInfo,
    #[serde(rename = "type")]
    pub(crate) ty: Type,
    /// Set only for final fields carrying a `ConstantValue` attribute.
    pub(crate) constant_value: Option<ConstantValue>,
}

impl FieldModel {
    pub(crate) fn pretty_name(&self) -> String {
        let mut out = format!("{} {}", self.ty.pretty, self.element.name);
        if let Some(value) = &self.constant_value {
            out.push('=');
            out.push_str(&value.to_string());
        }
        out
    }

    pub(crate) fn declaration(&self) -> String {
        format!(
            "{}{} {}",
            self.element.modifiers(false),
            self.ty.pretty,
            self.element.name
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct MethodModel {
    #[serde(flatten)]
    pub(crate) element: ElementInfo,
    pub(crate) is_abstract: bool,
    pub(crate) return_type: Type,
    pub(crate) params: Vec<MethodParam>,
    /// Line before the first instruction; absent without a `LineNumberTable`.
    pub(crate) start_line: Option<u32>,
}

impl MethodModel {
    pub(crate) fn is_constructor(&self) -> bool {
        self.element.name == "<init>"
    }

    pub(crate) fn is_static_initializer(&self) -> bool {
        self.element.name == "<clinit>"
    }

    /// `add(int, int)=>int`
    pub(crate) fn pretty_signature(&self) -> String {
        let types: Vec<&str> = self.params.iter().map(|p| p.ty.pretty.as_str()).collect();
        let mut out = format!("{}({})", self.element.name, types.join(", "));
        if !self.return_type.is_void() {
            out.push_str("=>");
            out.push_str(&self.return_type.pretty);
        }
        out
    }

    pub(crate) fn declaration(&self) -> String {
        if self.is_static_initializer() {
            return "static".to_string();
        }
        let mut out = self.element.modifiers(false);
        if self.is_abstract {
            out.push_str("abstract ");
        }
        if self.is_constructor() {
            out.push_str(&ClassDetail::parse(&self.element.owner).name);
        } else {
            out.push_str(&self.return_type.pretty);
            out.push(' ');
            out.push_str(&self.element.name);
        }
        let params: Vec<String> = self
            .params
            .iter()
            .map(|param| {
                if param.name.is_empty() {
                    param.ty.pretty.clone()
                } else {
                    format!("{} {}", param.ty.pretty, param.name)
                }
            })
            .collect();
        out.push('(');
        out.push_str(&params.join(", "));
        out.push(')');
        out
    }
}

/// Borrowed view over either kind of class member.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Member<'a> {
    Field(&'a FieldModel),
    Method(&'a MethodModel),
}

impl<'a> Member<'a> {
    #[allow(dead_code)]
    pub(crate) fn element(&self) -> &'a ElementInfo {
        match self {
            Member::Field(field) => &field.element,
            Member::Method(method) => &method.element,
        }
    }

    pub(crate) fn pretty_name(&self) -> String {
        match self {
            Member::Field(field) => field.pretty_name(),
            Member::Method(method) => method.pretty_signature(),
        }
    }

    #[allow(dead_code)]
    pub(crate) fn full_pretty_name(&self, include_class: bool) -> String {
        format!(
            "{}{}",
            self.element().modifiers(include_class),
            self.pretty_name()
        )
    }

    pub(crate) fn declaration(&self) -> String {
        match self {
            Member::Field(field) => field.declaration(),
            Member::Method(method) => method.declaration(),
        }
    }
}

/// Model of one compiled class and, recursively, its member classes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct ClassModel {
    pub(crate) name: String,
    pub(crate) descriptor: String,
    pub(crate) package: String,
    pub(crate) scope: Scope,
    pub(crate) is_final: bool,
    pub(crate) kind: ClassKind,
    pub(crate) super_class: Option<ClassDetail>,
    pub(crate) interfaces: Vec<ClassDetail>,
    /// Descriptor of the enclosing class for nested classes.
    pub(crate) outer_class: Option<String>,
    pub(crate) source_file: Option<PathBuf>,
    #[serde(skip)]
    pub(crate) source_text: Option<String>,
    pub(crate) javadoc: String,
    pub(crate) fields: Vec<FieldModel>,
    pub(crate) methods: Vec<MethodModel>,
    pub(crate) inner_classes: Vec<ClassModel>,
}

impl ClassModel {
    pub(crate) fn pretty_name(&self) -> String {
        match (&self.outer_class, self.package.is_empty()) {
            (Some(outer), _) => format!("{}${}", dotted(outer), self.name),
            (None, true) => self.name.clone(),
            (None, false) => format!("{}.{}", dotted(&self.package), self.name),
        }
    }

    /// Superclass shown in declarations; `Object`, and `Enum` for enums, are implied.
    fn shown_super(&self) -> Option<&ClassDetail> {
        let detail = self.super_class.as_ref()?;
        let implied = detail.full == OBJECT_CLASS
            || (detail.full == ENUM_CLASS && self.kind == ClassKind::Enum);
        (!implied).then_some(detail)
    }

    #[allow(dead_code)]
    pub(crate) fn full_pretty_name(&self, include_package: bool) -> String {
        let pretty = self.pretty_name();
        match self.shown_super() {
            Some(detail) if include_package => format!("{pretty} extends {}", detail.dotted()),
            Some(detail) => format!("{pretty} extends {}", detail.name),
            None => pretty,
        }
    }

    pub(crate) fn declaration(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(keyword) = self.scope.keyword() {
            parts.push(keyword.to_string());
        }
        if self.is_final && !matches!(self.kind, ClassKind::Enum | ClassKind::Interface) {
            parts.push("final".to_string());
        }
        parts.push(self.kind.keyword().to_string());
        parts.push(self.name.clone());
        if let Some(detail) = self.shown_super() {
            parts.push(format!("extends {}", detail.dotted()));
        }
        parts.join(" ").trim().to_string()
    }

    pub(crate) fn members(&self) -> impl Iterator<Item = Member<'_>> {
        self.fields
            .iter()
            .map(Member::Field)
            .chain(self.methods.iter().map(Member::Method))
    }

    /// This class followed by its nested classes, depth first.
    pub(crate) fn flatten(&self) -> Vec<&ClassModel> {
        let mut out = vec![self];
        for inner in &self.inner_classes {
            out.extend(inner.flatten());
        }
        out
    }
}
