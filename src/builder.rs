use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::attributes::AttributeHandlers;
use crate::classfile::{
    ClassFile, CodeAttribute, InnerClassEntry, LineNumber, LocalVariable, MemberInfo,
    parse_inner_classes, parse_line_numbers, parse_local_variables, single_index,
};
use crate::config::ModelConfig;
use crate::constant_pool::ConstantPool;
use crate::descriptor::{Type, method_return_type};
use crate::javadoc::{class_pattern, field_pattern, find_javadoc, method_pattern};
use crate::model::{
    ACC_ABSTRACT, ACC_FINAL, ClassDetail, ClassKind, ClassModel, ElementInfo, FieldModel,
    MethodModel, Scope,
};
use crate::params::synthesize_params;
use crate::telemetry::class_span;

/// Builds class models, reading companion sources and nested class files as configured.
pub(crate) struct ClassModelBuilder<'a> {
    config: &'a ModelConfig,
}

/// Class-level attributes collected before the model is assembled.
#[derive(Default)]
struct ClassAttributes {
    source_file: Option<String>,
    inner_classes: Vec<InnerClassEntry>,
}

impl<'a> ClassModelBuilder<'a> {
    pub(crate) fn new(config: &'a ModelConfig) -> Self {
        Self { config }
    }

    /// Read and build the class file at `path`, including its nested classes.
    pub(crate) fn build_file(&self, path: &Path) -> Result<ClassModel> {
        let _guard = class_span(path).entered();
        let class_file = ClassFile::read(path)?;
        self.build(&class_file)
            .with_context(|| format!("failed to build model for {}", path.display()))
    }

    pub(crate) fn build(&self, class_file: &ClassFile) -> Result<ClassModel> {
        let pool = &class_file.constant_pool;
        let descriptor = pool
            .resolve_string(class_file.this_class)
            .context("unresolvable this_class entry")?;
        let detail = ClassDetail::parse(&descriptor);

        let mut attributes = ClassAttributes::default();
        AttributeHandlers::new()
            .on("SourceFile", |info| {
                attributes.source_file = pool.resolve_string(single_index(info)?);
                Ok(())
            })
            .on("InnerClasses", |info| {
                attributes.inner_classes.extend(parse_inner_classes(info)?);
                Ok(())
            })
            .dispatch(pool, &class_file.attributes)?;

        // Nested classes list themselves with their declared modifiers.
        let declared_flags = attributes
            .inner_classes
            .iter()
            .find(|entry| entry.inner_class_index == class_file.this_class)
            .map(|entry| entry.access_flags)
            .unwrap_or(class_file.access_flags);
        let kind = ClassKind::from_access(declared_flags);

        let super_class = match class_file.super_class {
            0 => None,
            index => pool.resolve_string(index).map(|name| ClassDetail::parse(&name)),
        };
        let interfaces = class_file
            .interfaces
            .iter()
            .filter_map(|index| pool.resolve_string(*index))
            .map(|name| ClassDetail::parse(&name))
            .collect();

        let mut fields = class_file
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| {
                build_field(pool, &descriptor, field).with_context(|| format!("field {index}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut methods = class_file
            .methods
            .iter()
            .enumerate()
            .map(|(index, method)| {
                build_method(pool, &descriptor, method).with_context(|| format!("method {index}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let (source_file, source_text) = match &attributes.source_file {
            Some(file_name) => {
                let path = self.config.source_path(&detail.package, file_name);
                let text = self.read_source(&path)?;
                (Some(path), text)
            }
            None => (None, None),
        };

        let mut javadoc = String::new();
        if let (Some(text), true) = (&source_text, self.config.include_javadoc) {
            javadoc = find_javadoc(text, &class_pattern(&detail.name, kind));
            for field in &mut fields {
                field.element.javadoc = find_javadoc(text, &field_pattern(field));
            }
            for method in &mut methods {
                if let Some(pattern) = method_pattern(method) {
                    method.element.javadoc = find_javadoc(text, &pattern);
                }
            }
        }

        let mut inner_classes = Vec::new();
        for entry in &attributes.inner_classes {
            let Some(inner_name) = pool.resolve_string(entry.inner_class_index) else {
                continue;
            };
            if !is_direct_member(&descriptor, class_file.this_class, entry, &inner_name) {
                continue;
            }
            let path = self.config.class_path(&inner_name);
            if !path.is_file() {
                warn!(
                    class = %descriptor,
                    inner = %inner_name,
                    path = %path.display(),
                    "inner class file not found, skipping"
                );
                continue;
            }
            inner_classes.push(self.build_file(&path)?);
        }

        debug!(
            class = %descriptor,
            version = format!("{}.{}", class_file.major_version, class_file.minor_version),
            fields = fields.len(),
            methods = methods.len(),
            inner_classes = inner_classes.len(),
            "built class model"
        );

        Ok(ClassModel {
            name: detail.name,
            package: detail.package,
            scope: Scope::from_access(declared_flags),
            is_final: declared_flags & ACC_FINAL != 0,
            kind,
            super_class,
            interfaces,
            outer_class: detail.outer,
            source_file,
            source_text,
            javadoc,
            fields,
            methods,
            inner_classes,
            descriptor,
        })
    }

    fn read_source(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if self.config.require_sources => Err(err)
                .with_context(|| format!("failed to read source {}", path.display())),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "source file unavailable");
                Ok(None)
            }
        }
    }
}

/// Only classes declared directly inside `descriptor` are descended into, which keeps
/// the nesting a tree: the class itself, its enclosing classes and siblings are skipped.
fn is_direct_member(
    descriptor: &str,
    this_class: u16,
    entry: &InnerClassEntry,
    inner_name: &str,
) -> bool {
    if entry.inner_class_index == this_class || inner_name == descriptor {
        return false;
    }
    if entry.outer_class_index == this_class {
        return true;
    }
    // Anonymous and local classes record no outer class.
    entry.outer_class_index == 0
        && inner_name
            .strip_prefix(descriptor)
            .and_then(|rest| rest.strip_prefix('$'))
            .is_some_and(|local| !local.is_empty() && !local.contains('$'))
}

fn member_names(pool: &ConstantPool, member: &MemberInfo) -> Result<(String, String)> {
    let name = pool
        .resolve_string(member.name_index)
        .context("unresolvable member name")?;
    let descriptor = pool
        .resolve_string(member.descriptor_index)
        .with_context(|| format!("unresolvable descriptor for {name}"))?;
    Ok((name, descriptor))
}

fn build_field(pool: &ConstantPool, owner: &str, field: &MemberInfo) -> Result<FieldModel> {
    let (name, descriptor) = member_names(pool, field)?;
    let ty = Type::decode(&descriptor).with_context(|| format!("field {name}"))?;

    let mut constant = None;
    AttributeHandlers::new()
        .on("ConstantValue", |info| {
            constant = pool.resolve_value(single_index(info)?);
            Ok(())
        })
        .dispatch(pool, &field.attributes)?;

    let element = ElementInfo::from_access(name, descriptor, owner, field.access_flags);
    let constant_value = if element.is_final {
        constant.map(|value| value.for_type(&ty))
    } else {
        None
    };
    Ok(FieldModel {
        element,
        ty,
        constant_value,
    })
}

fn build_method(pool: &ConstantPool, owner: &str, method: &MemberInfo) -> Result<MethodModel> {
    let (name, descriptor) = member_names(pool, method)?;
    let return_type = method_return_type(&descriptor).with_context(|| format!("method {name}"))?;

    let mut code = None;
    AttributeHandlers::new()
        .on("Code", |info| {
            code = Some(CodeAttribute::parse(info)?);
            Ok(())
        })
        .dispatch(pool, &method.attributes)?;

    let mut line_numbers: Option<Vec<LineNumber>> = None;
    let mut local_variables: Option<Vec<LocalVariable>> = None;
    if let Some(code) = &code {
        AttributeHandlers::new()
            .on("LineNumberTable", |info| {
                line_numbers
                    .get_or_insert_with(Vec::new)
                    .extend(parse_line_numbers(info)?);
                Ok(())
            })
            .on("LocalVariableTable", |info| {
                local_variables
                    .get_or_insert_with(Vec::new)
                    .extend(parse_local_variables(info, pool)?);
                Ok(())
            })
            .dispatch(pool, &code.attributes)?;
    }

    let element = ElementInfo::from_access(name, descriptor, owner, method.access_flags);
    let params = synthesize_params(
        &element.descriptor,
        local_variables.as_deref(),
        element.is_static,
    )
    .with_context(|| format!("parameters of {}", element.name))?;
    let start_line = line_numbers.and_then(|lines| {
        lines
            .iter()
            .min_by_key(|line| line.start_pc)
            .map(|line| u32::from(line.line).saturating_sub(1))
    });

    Ok(MethodModel {
        is_abstract: method.access_flags & ACC_ABSTRACT != 0,
        element,
        return_type,
        params,
        start_line,
    })
}
